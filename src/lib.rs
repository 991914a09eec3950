pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod report;
pub mod task;
