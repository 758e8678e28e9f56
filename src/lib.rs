pub mod api_server;
pub mod classifier;
pub mod config;
pub mod error;
pub mod execution;
pub mod llm;
pub mod logging;
pub mod pipeline;
pub mod plot;
pub mod prompts;
pub mod resources;
pub mod retrieval;
pub mod sql;

pub use error::{OceanError, Result};
