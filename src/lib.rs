//! Burnsight - satellite imagery fetching and VLM analysis backend
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod copernicus;
pub mod error;
pub mod imagery;
pub mod server;
pub mod state;
pub mod video;
pub mod vlm;
