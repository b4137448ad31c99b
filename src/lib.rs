//! Tokengate — library crate for the binary and integration tests.

pub mod admin;
pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod errors;
pub mod generator;
pub mod jobs;
pub mod lifecycle;
pub mod models;
pub mod store;
