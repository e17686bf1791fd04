//! vforge: generate, simulate and self-repair Verilog modules
//!
//! The binary is a thin shell over the `coordination` crate. This library
//! half holds the pieces worth testing on their own: configuration, console
//! rendering, design persistence and the interactive gate.

pub mod app;
pub mod config;
pub mod diff;
pub mod gate;
pub mod persist;
pub mod render;

pub use app::{run_design, Collaborators, DesignRun};
pub use config::AppConfig;
