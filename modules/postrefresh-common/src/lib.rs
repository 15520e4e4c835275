pub mod config;
pub mod error;
pub mod text;
pub mod types;

pub use config::{FileConfig, FilterConfig, RefreshConfig};
pub use error::{RefreshError, RefreshResult};
pub use types::*;
