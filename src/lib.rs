pub mod analysis;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod job;
pub mod logging;
pub mod match_source;
pub mod model;
pub mod state;
pub mod store;
