pub mod access;
pub mod admin;
pub mod auth;
pub mod books;
pub mod config;
pub mod discover;
pub mod error;
pub mod gemini;
pub mod handler;
pub mod library;
pub mod mailer;
pub mod model;
pub mod payment;
pub mod pdf_extract;
pub mod razorpay;
pub mod supabase;
