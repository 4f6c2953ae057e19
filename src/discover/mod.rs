//! AI Recommendation Module
//!
//! Builds prompts over the approved catalog (history-based recommendations
//! and free-form discovery), parses the model's comma-separated reply back
//! into titles, and returns the matching catalog rows. An unusable model
//! reply always degrades to an empty recommendation list.

mod handler;
mod routes;

pub use routes::routes;
