//! Personal device-usage limiter.
//!
//! Accumulates foreground time spent in one target app and locks the screen
//! behind an overlay once a configured budget is used up. The overlay is
//! dismissed by a volume-key sequence or an external stop signal.

pub mod accumulator;
pub mod clock;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod host;
pub mod lock;
pub mod matcher;
pub mod models;
pub mod platform;
pub mod probe;
pub mod service;
pub mod session;
pub mod tracker;
pub mod validation;

#[cfg(test)]
mod test_utils;

pub use error::AppError;
