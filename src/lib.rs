pub mod broker;
pub mod cli;
pub mod commands;
pub mod config;
pub mod orchestrator;
pub mod prompt;
pub mod shared;
