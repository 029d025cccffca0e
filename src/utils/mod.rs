pub mod config;
pub mod exec;
pub mod logging;
pub mod path;
