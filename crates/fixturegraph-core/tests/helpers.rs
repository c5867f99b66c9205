//! Test helpers for fixturegraph-core tests.
//!
//! This module provides the models shared by the
//! integration tests.

#[path = "helpers/models.rs"]
pub mod models;
