pub mod config;
pub mod contract;
pub mod errors;
pub mod gates;
pub mod logging;
pub mod orchestrator;
pub mod runtime;
pub mod tandem_config;
pub mod tracker;
pub mod ui;
pub mod util;

#[cfg(test)]
mod test_support;
