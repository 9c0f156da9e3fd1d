//! Business logic sitting between the HTTP handlers and the repository.
//!
//! Services take their collaborators (repository, predictor, config) as plain
//! references so they can be driven directly from tests.

pub mod auth;
pub mod nodes;
