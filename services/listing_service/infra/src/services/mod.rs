//! Infrastructure service implementations.

pub mod deepl;
pub mod image_pipeline;
pub mod openai_content;
pub mod quota;
pub mod rakumart;
pub mod rakuten;
pub mod refresh;

pub use deepl::DeepLTranslator;
pub use image_pipeline::StorageImagePipeline;
pub use openai_content::OpenAiContentGenerator;
pub use quota::QuotaState;
pub use rakumart::RakumartClient;
pub use rakuten::RakutenClient;
pub use refresh::AutoRefreshTask;
