//! # Eligo Library
//!
//! This library exposes the Eligo server modules for testing and integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod api;
pub mod cli;
pub mod config;

// Re-export eligo_core for convenience
pub use eligo_core;
