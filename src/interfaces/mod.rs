//! Boundary adapters: CSV event stream, CSV reporting, and the JSON setup
//! file.

pub mod config;
pub mod csv;
