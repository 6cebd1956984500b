//! Index module - where bound markers occur across the workspace

pub mod api;
pub mod references;
pub mod walk;
