mod canonical;
mod catalog;
mod error;
mod ports;
mod prompt;
pub mod safety;
mod sanitize;
mod types;

pub use canonical::*;
pub use catalog::*;
pub use error::*;
pub use ports::*;
pub use prompt::*;
pub use safety::*;
pub use sanitize::*;
pub use types::*;
