pub mod app;
pub mod config;
pub mod details;
pub mod error;
pub mod models;
pub mod normalize;
pub mod search;
pub mod search_log;
pub mod store;
pub mod tmdb;
