//! Repository trait definitions (no implementations).

pub mod canonical_product;
pub mod category;
pub mod origin_product;
pub mod settings;

pub use canonical_product::CanonicalProductRepository;
pub use category::CategoryRepository;
pub use origin_product::OriginProductRepository;
pub use settings::SettingsRepository;
