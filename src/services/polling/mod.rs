pub mod congestion;
pub mod controller;
pub mod sink;
pub mod store;
pub mod types;

pub use congestion::CongestionDetector;
pub use controller::{PollingController, PollingOptions};
pub use sink::ResultSink;
pub use store::{InMemoryStateStore, StateStore, StoreError};
pub use types::*;
