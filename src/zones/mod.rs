pub mod repository;
pub mod snapshot;

pub use repository::{CacheStats, ZoneCache, ZoneRepository, ZoneSource};
pub use snapshot::{SeatEntry, ZoneConfig};
