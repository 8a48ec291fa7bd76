pub mod build;
pub mod package;
pub mod pipeline;

pub use build::*;
pub use package::*;
pub use pipeline::*;
