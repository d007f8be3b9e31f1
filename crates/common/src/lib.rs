pub mod config;
pub mod error;
pub mod types;

pub use config::{AdvisorConfig, Config};
pub use error::{Error, Result};
pub use types::*;
