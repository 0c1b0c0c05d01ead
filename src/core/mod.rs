pub mod config;
pub mod error;
pub mod rng;
pub mod types;

pub use config::FiringConfig;
pub use error::{ArmsError, Result};
