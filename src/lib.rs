pub mod analysis;
pub mod api;
pub mod app;
pub mod config;
pub mod fetch_error;
pub mod fetcher;
pub mod importers;
pub mod models;
pub mod services;
