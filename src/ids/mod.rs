//! IDs module - minting identifiers for new markers

pub mod allocator;
pub mod api;
