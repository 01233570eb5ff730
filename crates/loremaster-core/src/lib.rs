pub mod config;
pub mod error;
pub mod extract;
pub mod types;

pub use config::LoreConfig;
pub use error::{LoreError, Result};
pub use extract::{first_balanced_object, parse_first_object};
pub use types::*;
