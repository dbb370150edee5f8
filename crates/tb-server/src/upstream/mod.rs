pub mod openrouter;
pub mod streaming;

pub use openrouter::OpenRouterUpstream;
