//! Common types module for the order lifecycle system.
//!
//! This module defines the data model shared by the order store, the
//! existence directories, the wallet and catalog clients and the HTTP layer.
//! Keeping the types in one crate keeps status parsing and the transition
//! table identical everywhere.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Catalog snapshot types consumed when building order items.
pub mod catalog;
/// Order header, item and accept types.
pub mod order;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Redacting wrapper for credentials read from configuration.
pub mod secret_string;
/// The closed order status model and its transition table.
pub mod status;
/// Utility functions for display formatting.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use api::*;
pub use catalog::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use status::{OrderStatus, StatusParseError};
pub use utils::truncate_id;
pub use validation::*;
