//! Domain models for Fulcrum.
//!
//! These are the core types shared across all crates.

use std::collections::BTreeMap;

use crate::error::{FulcrumError, FulcrumResult};

pub mod agent;
pub mod agent_type;
pub mod audit;
pub mod job;
pub mod metric;
pub mod provider;
pub mod service;
pub mod service_group;
pub mod service_type;
pub mod token;

/// Free-form labels attached to providers, agents and services.
pub type Attributes = BTreeMap<String, Vec<String>>;

/// Every key must be non-empty and carry at least one non-empty value.
pub fn validate_attributes(attributes: &Attributes) -> FulcrumResult<()> {
    for (key, values) in attributes {
        if key.trim().is_empty() {
            return Err(FulcrumError::validation("attribute keys cannot be empty"));
        }
        if values.is_empty() || values.iter().any(|v| v.trim().is_empty()) {
            return Err(FulcrumError::validation(format!(
                "attribute '{key}' must have non-empty values"
            )));
        }
    }
    Ok(())
}

/// ISO 3166-1 alpha-2, upper case.
pub fn validate_country_code(code: &str) -> FulcrumResult<()> {
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(FulcrumError::validation(format!(
            "invalid country code '{code}'"
        )))
    }
}

pub fn validate_name(entity: &str, name: &str) -> FulcrumResult<()> {
    if name.trim().is_empty() {
        return Err(FulcrumError::validation(format!(
            "{entity} name cannot be empty"
        )));
    }
    if name.len() > 255 {
        return Err(FulcrumError::validation(format!(
            "{entity} name exceeds 255 characters"
        )));
    }
    Ok(())
}

/// Properties, resources and job payloads must be JSON objects.
pub fn validate_json_object(field: &str, value: &serde_json::Value) -> FulcrumResult<()> {
    if value.is_object() {
        Ok(())
    } else {
        Err(FulcrumError::validation(format!(
            "{field} must be a JSON object"
        )))
    }
}
