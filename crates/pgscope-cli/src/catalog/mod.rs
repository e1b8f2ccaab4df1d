//! Live catalog access for the extraction engine.
//!
//! The core crate only knows the [`pgscope_core::ConnectionFactory`] seam.
//! This module backs it with real PostgreSQL connections.

mod sqlx_provider;

pub use sqlx_provider::{ProviderError, SqlxCatalogConnection, SqlxConnectionFactory};
