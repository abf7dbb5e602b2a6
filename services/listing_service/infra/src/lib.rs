//! Listing Service Infrastructure
//!
//! PostgreSQL repositories, HTTP clients (upstream marketplace, DeepL,
//! OpenAI, Rakuten RMS), the S3-backed image pipeline and the background
//! refresh task. Everything here implements a trait defined in
//! `listing_service_core`.

pub mod bootstrap;
pub mod repositories;
pub mod services;
pub mod storage;

pub use bootstrap::{init, Pipeline};
