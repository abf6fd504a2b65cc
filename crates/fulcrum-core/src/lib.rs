//! Core domain types for Fulcrum: models, errors, authorization policy
//! and the repository traits implemented by the storage layer.

pub mod auth;
pub mod authz;
pub mod error;
pub mod models;
pub mod repository;
