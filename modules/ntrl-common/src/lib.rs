pub mod config;
pub mod error;
pub mod taxonomy;
pub mod telemetry;
pub mod types;

pub use config::Config;
pub use error::NtrlError;
pub use taxonomy::{ManipulationType, Taxonomy};
pub use types::*;
