pub mod client;
pub mod query_builder;
pub mod types;

pub use client::*;
pub use query_builder::*;
pub use types::*;
