//! Vigil daemon library.
//!
//! This library exposes internal modules for integration testing.
//! In production, `vigil-daemon` is used as a binary (main.rs).

pub mod app;
pub mod cli;
pub mod logging;
