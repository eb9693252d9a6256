//! Budget data package catalog.
//!
//! Projects own data packages, data packages own datasets. Ingesting a data
//! package description creates the records and drives every dataset through
//! the publication chain: preprocess, generate model, publish to OpenSpending.

pub mod app;
pub mod common;
pub mod domain;
pub mod infra;
pub mod observability;
pub mod pipeline;
pub mod storage;

pub use common::error::{CatalogError, Result};
