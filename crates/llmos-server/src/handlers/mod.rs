//! HTTP request handlers, one module per resource.

pub mod approvals;
pub mod capabilities;
pub mod events;
pub mod permissions;
pub mod plans;
pub mod security;
