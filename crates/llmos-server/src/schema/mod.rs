//! Request/response types for the HTTP API.

pub mod approvals;
pub mod permissions;
pub mod plans;
pub mod security;
