//! Core types and trait definitions for the tagbook fact store.
//!
//! Facts are timestamped `(tag_name, value)` observations kept in a single
//! entity-attribute-value table. This crate holds the data model, the
//! [`store::FactStore`] contract, and the pure engines that derive tables from
//! stored facts (pivot, reconciliation, the edit workflow). It has no database
//! or HTTP dependencies.

pub mod edit;
pub mod error;
pub mod fact;
pub mod form;
pub mod pivot;
pub mod reconcile;
pub mod report;
pub mod store;

pub use error::{Error, Result, Warning};
