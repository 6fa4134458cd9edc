// Service configuration
pub mod config;

// Error taxonomy
pub mod error;

// Atomic JSON persistence
pub mod storage;

// Cookie-keyed sessions and OAuth state
pub mod session;

// OAuth authorization-code flows
pub mod oauth;

// Upload credential and its store
pub mod credentials;

// Daily-rotated user registry
pub mod users;

// Resumable video upload
pub mod upload;

// Social-media content generation
pub mod content;

// HTTP API
pub mod api;

pub use error::{Error, Result};
