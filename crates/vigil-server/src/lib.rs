pub mod api;
pub mod app;
pub mod config;
pub mod logging;
pub mod retention;
pub mod scheduler;
pub mod seed;
pub mod state;
