//! Book Catalog Module
//!
//! Catalog browsing, per-book detail with reading-history logging, secure
//! file streaming (open proxy for approved books, access-checked download
//! for paid ones), book submission, and per-user ratings.

mod handler;
mod routes;

pub use handler::backfill_summary;
pub use routes::routes;
