pub mod config;

pub use config::{FramingConfig, MathcpConfig, PoolSettings, SchedulerConfig, ServerConfig};
