pub mod cli;
pub mod config;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod repository;
pub mod session;
pub mod sort;
pub mod storage;
