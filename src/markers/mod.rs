//! Markers module - comment tokens that bind source lines to fragments
//!
//! - `grammar`: line-local marker recognition and ID extraction
//! - `rewrite`: binding unbound markers in response to edits
//! - `upgrade`: legacy to canonical batch rewrite
//! - `api`: command handlers

pub mod api;
pub mod grammar;
pub mod rewrite;
pub mod upgrade;
