//! Skiff command-line support: configuration file and progress display.

#![warn(missing_docs)]

pub mod config;
pub mod progress;
