//! Listing copy generation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Fixed shipping disclaimer. It must appear exactly once in the sales
/// description and never in the product descriptions.
pub const DELIVERY_MESSAGE: &str = "※こちらの商品は海外取り寄せ商品のため、お届けまでに2〜3週間ほどお時間をいただきます。あらかじめご了承ください。";

/// Target lengths for generated copy, in characters.
pub const TITLE_MIN_CHARS: usize = 100;
pub const TITLE_MAX_CHARS: usize = 110;
pub const TAGLINE_MAX_CHARS: usize = 80;
pub const DESCRIPTION_PC_MAX_CHARS: usize = 800;
pub const DESCRIPTION_SP_MAX_CHARS: usize = 400;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentInput {
    pub title_c: Option<String>,
    pub title_t: Option<String>,
    pub category_name: Option<String>,
    pub attribute_hints: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeneratedContent {
    pub title: String,
    pub catchphrase: String,
    pub description: String,
    pub sales_description: String,
}

/// External copy generator (the production backend is an LLM).
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, input: &ContentInput) -> Result<GeneratedContent>;
}

/// Enforce the delivery-message placement: strip every occurrence from the
/// description, then append exactly one to the sales description.
pub fn place_delivery_message(description: &str, sales_description: &str) -> (String, String) {
    let cleaned_description = description.replace(DELIVERY_MESSAGE, "");
    let cleaned_description = cleaned_description.trim().to_string();

    let base = sales_description.replace(DELIVERY_MESSAGE, "");
    let base = base.trim();
    let sales = if base.is_empty() {
        DELIVERY_MESSAGE.to_string()
    } else {
        format!("{}\n{}", base, DELIVERY_MESSAGE)
    };

    (cleaned_description, sales)
}

/// Truncate to a character budget, character-wise.
pub fn cap_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_message_appended_once() {
        let (description, sales) = place_delivery_message("良い商品です。", "セール中！");
        assert!(!description.contains(DELIVERY_MESSAGE));
        assert_eq!(sales.matches(DELIVERY_MESSAGE).count(), 1);
        assert!(sales.starts_with("セール中！"));
    }

    #[test]
    fn test_delivery_message_stripped_from_description() {
        let description = format!("良い商品です。{}", DELIVERY_MESSAGE);
        let (cleaned, _) = place_delivery_message(&description, "");
        assert_eq!(cleaned, "良い商品です。");
    }

    #[test]
    fn test_delivery_message_not_duplicated_in_sales() {
        let sales = format!("{}\n{}", DELIVERY_MESSAGE, DELIVERY_MESSAGE);
        let (_, placed) = place_delivery_message("", &sales);
        assert_eq!(placed.matches(DELIVERY_MESSAGE).count(), 1);
    }

    #[test]
    fn test_cap_chars_counts_characters_not_bytes() {
        let text = "あいうえお";
        assert_eq!(cap_chars(text, 3), "あいう");
        assert_eq!(cap_chars(text, 10), text);
    }
}
