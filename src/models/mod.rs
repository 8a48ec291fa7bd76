pub mod config;
pub mod raw;
pub mod reports;

pub use config::*;
pub use raw::*;
pub use reports::*;
