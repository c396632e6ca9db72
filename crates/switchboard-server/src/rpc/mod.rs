//! Action routing: error taxonomy, handler registry, per-connection router.

pub mod context;
pub mod errors;
pub mod handlers;
pub mod registry;
pub mod router;
pub mod validation;
