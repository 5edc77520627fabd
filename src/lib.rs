pub mod analytics;
pub mod capture;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod shutdown;
pub mod worker;
pub mod zones;

#[cfg(test)]
mod testing;

pub use error::Error;
