//! HTTP/JSON daemon exposing host capabilities to language-model agents.
//!
//! Clients submit declarative plans; the daemon validates, authorizes,
//! schedules, executes, and reports results. This crate contains the
//! server framework, the plan executor and its collaborators (approval
//! gate, permission manager, rollback engine, event bus, security
//! pipeline), the capability registry with the builtin capability set,
//! API schema types, error handling, and route definitions.

pub mod approval;
pub mod capabilities;
pub mod capability;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod handlers;
pub mod memory_store;
pub mod permissions;
pub mod pipeline;
pub mod registry;
pub mod rollback;
pub mod router;
pub mod schema;
pub mod state;
pub mod verifier;
