//! Configuration loading and process-level wiring.

pub mod config;
