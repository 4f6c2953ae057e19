//! Purchase Flow Module
//!
//! Creates payment-gateway orders for paid books and records a purchase
//! after the gateway's signature checks out.

mod handler;
mod routes;

pub use routes::routes;
