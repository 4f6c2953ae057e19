//! Admin Moderation Module
//!
//! Pending-book review, approval/rejection with uploader notification and
//! AI summary backfill, auth-service user listing, and the stats routes
//! feeding the admin dashboard. Every route requires the admin role.

mod handler;
mod routes;

pub use routes::routes;
