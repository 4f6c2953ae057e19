//! Personal Library Module
//!
//! Per-user bookmarks (latest unique list via a datastore function, plus
//! inserts from the reader) and the caller's purchase list.

mod handler;
mod routes;

pub use routes::routes;
