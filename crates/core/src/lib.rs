//! Core relay logic for docrelay.
//!
//! This crate contains the relay pipeline with ZERO web framework
//! dependencies. HTTP responses are the api crate's concern; everything here
//! reports failures as [`docrelay_shared::AppError`].
//!
//! # Modules
//!
//! - `relay` - Validation, bounded download, staging, extraction, orchestration
//! - `storage` - Publishing extraction results to object storage

pub mod relay;
pub mod storage;
