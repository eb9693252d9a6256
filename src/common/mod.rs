// Common utilities and shared types used across the application

pub mod config;
pub mod constants;
pub mod error;
