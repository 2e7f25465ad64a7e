pub mod config;
pub mod error;
pub mod error_utils;
pub mod shutdown;
pub mod types;

pub use config::*;
pub use error::*;
pub use error_utils::*;
pub use shutdown::sleep_or_cancel;
pub use types::*;
