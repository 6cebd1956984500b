//! Core module - shared building blocks
//!
//! This module provides:
//! - Unified result model (ResultItem) and its renderers
//! - Configuration and the error taxonomy
//! - Path normalization and safe file reading
//! - The per-workspace session

pub mod config;
pub mod error;
pub mod file_reader;
pub mod model;
pub mod paths;
pub mod render;
pub mod session;
pub mod util;
