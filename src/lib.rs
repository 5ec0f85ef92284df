// Theory Social - friend graph, profiles and contact lists over a document store

// Core types and primitives
pub mod core;

// Infrastructure - document store backends, subscriptions, session
pub mod infrastructure;

// Typed records over user and theory documents
pub mod models;

// Profile loading, relationship management, contact lists
pub mod services;

// Navigation targets handed back to the host application
pub mod navigation;

// HTTP surface
pub mod app_state;
pub mod social_interface;

// Common utilities
pub mod config;
pub mod error;
pub mod data_seeder;

// Re-exports for convenience
pub use crate::core::{Uid, UidSet};
pub use error::{AppError, AppResult};
