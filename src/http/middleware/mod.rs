//! Request interception middleware.

pub mod gatekeeper;

pub use gatekeeper::{gatekeeper_middleware, Gatekeeper};
