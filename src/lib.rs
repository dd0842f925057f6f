//! crudkit - permissions and view-model mapping for CRUD services
//!
//! Declarative role and user-relation permissions evaluated against single
//! entities or pushed down into queries, plus convention-based copying
//! between entities and view-models.

#![allow(missing_docs)]

pub mod auth;
pub mod config;
pub mod environment;
pub mod mapping;
pub mod permissions;
pub mod predicate;
pub mod query;
pub mod reflect;
pub mod setup_tracing;
pub mod value;
