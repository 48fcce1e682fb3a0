pub mod handlers;
pub mod prompts;
pub mod tasks;
