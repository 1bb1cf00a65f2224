pub mod brain;
pub mod config;
pub mod dispatch;
pub mod llm;
pub mod session;
pub mod store;
pub mod terminal;
pub mod tools;
