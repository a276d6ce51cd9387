//! Vidstream Gateway
//!
//! Single entry point for the video platform: accepts uploads, hands them to
//! the external transcoding worker over the job queue, serves finished videos
//! and preview images with byte-range support, and pushes live catalog
//! updates to connected clients.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod kafka;
pub mod models;
pub mod services;
pub mod websocket;

// Public re-exports
pub use config::Config;
pub use error::{AppError, Result};
