#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod app;
pub mod browser;
pub mod carousel;
pub mod config;
pub mod data;
pub mod forms;
pub mod loader;
pub mod log;
pub mod session;
pub mod storage;
pub mod toast;
pub mod ui;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
