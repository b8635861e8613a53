pub mod config;
pub mod logging;

pub mod commands;
pub mod engine;
pub mod instance;
pub mod queue;
pub mod resume_store;
pub mod scheduler;
