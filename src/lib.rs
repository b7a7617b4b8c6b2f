pub mod automation;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod feature;
pub mod matcher;
mod metrics;
pub mod server;
pub mod store;
pub mod utils;

pub use config::Opts;
pub use engine::{CommandReport, RecognitionEngine, Resolution};
pub use error::{DeviceError, Result};
pub use store::{DeviceStore, DeviceStoreBuilder};
