//! Route handlers for the HTTP API.

pub mod admin;
pub mod browse;
pub mod config;
pub mod dash;
pub mod health;
pub mod streaming;
pub mod video;
pub mod videos;
