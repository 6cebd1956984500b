//! Store module - persistent fragment records
//!
//! Layout under the cms folder:
//! - `<set>/<id>.md` fragment records (header + body)
//! - `<id>.md` legacy flat records, read-only fallback
//! - `session.json` remembered active set

pub mod api;
pub mod fragment;
pub mod header;
pub mod sets;
