//! Core types, config, errors, and the report model for AxeLens.

pub mod config;
pub mod error;
pub mod protocol;
pub mod report;
