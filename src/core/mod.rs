pub mod bulk;
pub mod config;
pub mod engine;
pub mod forms;
pub mod history;
pub mod lifecycle;
pub mod tasks;
pub mod terminal;
