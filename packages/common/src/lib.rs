pub mod config;
pub mod epoch;
pub mod storage;

pub use config::StorageAppConfig;
