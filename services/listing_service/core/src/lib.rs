//! Listing Service Core
//!
//! Business logic, domain models and trait definitions for the product
//! materialization pipeline: origin-product storage, variant translation,
//! SKU pricing, image republication and the marketplace registration state
//! machine. This crate has no infrastructure dependencies.
//!
//! ## Architecture
//!
//! - `models`: persisted entities and status enums
//! - `dto/`: payload types shared between pipeline stages
//! - `repositories/`: repository trait definitions (no implementations)
//! - `services/`: domain services and the traits infra implements

pub mod dto;
pub mod models;
pub mod repositories;
pub mod services;

// Re-export commonly used types
pub use dto::listing::{BatchOutcome, ItemOutcome, ListQuery};
pub use models::{CanonicalProduct, OriginProduct, RakutenStatus, RegistrationStatus};
pub use repositories::{
    CanonicalProductRepository, CategoryRepository, OriginProductRepository, SettingsRepository,
};
pub use services::materializer::Materializer;
pub use services::orchestrator::Orchestrator;

// Re-export shared error types
pub use shared_error::AppError;

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
