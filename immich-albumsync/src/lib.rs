pub mod config;
pub mod logging;
pub mod rules;
pub mod sync;
