//! Command handlers

pub mod config;
pub mod habit;
pub mod note;
pub mod status;
pub mod sync;
