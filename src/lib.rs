pub mod changes;
pub mod config;
pub mod enrich;
pub mod error;
pub mod exec;
pub mod github;
pub mod handlers;
pub mod llm;
pub mod models;
pub mod session;
pub mod tree;
