pub mod events;
pub mod occupancy;
pub mod stores;
pub mod system_logs;
pub mod zones;

pub use events::EventsRepository;
pub use occupancy::OccupancyRepository;
pub use stores::StoresRepository;
pub use system_logs::SystemLogsRepository;
pub use zones::ZonesRepository;
