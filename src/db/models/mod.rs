pub mod event_models;
pub mod occupancy_models;
pub mod store_models;
pub mod zone_models;

pub use event_models::*;
pub use occupancy_models::*;
pub use store_models::*;
pub use zone_models::*;
