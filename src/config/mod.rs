pub mod environment;
pub mod state_store;

pub use environment::{Config, ConfigError};
pub use state_store::init_state_store;
