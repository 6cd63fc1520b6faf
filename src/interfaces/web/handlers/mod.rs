pub mod bulk;
pub mod content;
pub mod dashboard;
pub mod process;
pub mod tasks;
