pub mod config;
pub mod document;
pub mod execution_config;
pub mod rubric;
pub mod submission;
