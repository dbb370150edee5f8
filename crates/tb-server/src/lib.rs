pub mod bootstrap;
pub mod config;
pub mod handler;
pub mod logging;
pub mod orchestrator;
pub mod prompts;
pub mod relay;
pub mod upstream;

#[cfg(test)]
pub(crate) mod test_support;
