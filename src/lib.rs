pub mod config;
pub mod drag;
pub mod format;
pub mod mirror;
pub mod model;
pub mod panel;
pub mod selection;
