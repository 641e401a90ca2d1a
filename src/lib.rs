pub mod app;
pub mod config;
pub mod crawler;
pub mod domain;
pub mod endpoints;
pub mod error;
pub mod fetcher;
pub mod limiter;
pub mod output;
pub mod registry;
pub mod submission;
