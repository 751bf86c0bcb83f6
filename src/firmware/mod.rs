pub mod app;
pub mod broker;
pub mod config;
pub mod link;
pub mod logging;
#[cfg(feature = "esp32")]
pub mod platform;
pub mod runtime;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;
