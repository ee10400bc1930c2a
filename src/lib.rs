pub mod aggregate;
pub mod app;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod errors;
pub mod notify;
pub mod scorer;
pub mod storage;
pub mod tokenizer;
pub mod types;
