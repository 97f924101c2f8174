pub mod config;

pub use config::{DatabaseConfig, KeystoneConfig, ServerConfig, UtilityConfig};
