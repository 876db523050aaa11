pub mod backend;
pub mod config;
pub mod controller;
pub mod core;
pub mod error;
pub mod event;
pub mod logging;
pub mod size;
pub mod view;

#[cfg(feature = "gui")]
pub mod gui;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{Error, Result};

#[cfg(all(not(feature = "gui"), not(feature = "cli")))]
compile_error!("Enable either the `gui` or `cli` feature.");

#[cfg(all(feature = "gui", feature = "cli"))]
compile_error!("Select only one of `gui` or `cli` features at a time.");
