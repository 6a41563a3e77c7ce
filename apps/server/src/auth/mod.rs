//! Caller identity.
//!
//! Authentication happens upstream (gateway or reverse proxy); by the time a
//! request reaches this server the authenticated user id is in a header.

pub mod extractors;

pub use extractors::{CallerIdentity, USER_ID_HEADER};
