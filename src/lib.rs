pub mod analytics;
pub mod category_manager;
pub mod cli;
pub mod commands;
pub mod config;
pub mod interchange;
pub mod models;
pub mod query;
pub mod reminders;
pub mod storage;
pub mod task_manager;
pub mod timestamp;
