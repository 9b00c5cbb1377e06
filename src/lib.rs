#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod app;
pub mod composer;
pub mod config;
pub mod credentials;
pub mod data;
pub mod detail;
pub mod dispatch;
pub mod event;
pub mod feed;
pub mod layout;
pub mod logging;
pub mod pagination;
pub mod profile;
pub mod session;
pub mod ui;
pub mod viewport;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
