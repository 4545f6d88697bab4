//! Core types and trait definitions for the provgraph supply-chain graph.
//!
//! This crate is free of HTTP and database dependencies. Every other crate
//! depends on it.

// Native `async fn` in traits; the `Send` bounds are spelled out in
// `store::GraphStore` where they matter.
#![allow(async_fn_in_trait)]

pub mod artifact;
pub mod dependency;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod id;
pub mod occurrence;
pub mod package;
pub mod purl;
pub mod sbom;
pub mod source;
pub mod store;
pub mod subject;

pub use error::{Classify, Error, ErrorKind, Result};
pub use id::{Id, IdOr};
pub use store::GraphStore;
