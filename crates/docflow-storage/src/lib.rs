//! Object storage client for job artifacts.
//!
//! This crate provides:
//! - Parsing of `s3://` and `https://` artifact references
//! - The `ArtifactStore` interface used by workers
//! - An S3 backend and an in-memory backend

pub mod client;
pub mod error;
pub mod memory;
pub mod reference;
pub mod store;

pub use client::{S3ArtifactStore, S3Config};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryArtifactStore;
pub use reference::{ArtifactRef, DEFAULT_PUBLIC_HOST};
pub use store::{content_type_for, ArtifactStore};
