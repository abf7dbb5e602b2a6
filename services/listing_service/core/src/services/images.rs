//! Image pipeline interface and the stable naming rules.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Image type recorded on canonical rows; all pipeline output lands in the
/// marketplace Cabinet.
pub const IMAGE_TYPE_CABINET: &str = "CABINET";

/// Outcome for one source image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedImageOutcome {
    pub original_url: String,
    /// Object-store URL of the transformed image, when the transform ran
    pub processed_url: Option<String>,
    /// Stable relative path recorded on the canonical row
    pub relative_path: String,
}

/// Download, transform and republish product images.
#[async_trait]
pub trait ImagePipeline: Send + Sync {
    /// Process every source URL for one product. Images that fail the
    /// content transform are kept in their original form; an image is only
    /// missing from the result if it could not be fetched or stored at all.
    async fn process_images(
        &self,
        urls: &[String],
        product_image_code: &str,
    ) -> Result<Vec<ProcessedImageOutcome>>;
}

/// Read back stored image bytes by their relative location.
#[async_trait]
pub trait StoredImageReader: Send + Sync {
    async fn read(&self, location: &str) -> Result<Vec<u8>>;
}

/// Derive the stable 8-digit image code for a product id.
///
/// Uses the trailing digits of the id, zero-padded; ids without digits hash
/// deterministically into the same 8-digit space.
pub fn product_image_code(product_id: &str) -> String {
    let digits: String = product_id.chars().filter(|c| c.is_ascii_digit()).collect();
    if !digits.is_empty() {
        let tail: String = digits
            .chars()
            .rev()
            .take(8)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        return format!("{:0>8}", tail);
    }

    // FNV-1a keeps the code stable across runs for digit-free ids
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in product_id.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    format!("{:08}", hash % 100_000_000)
}

/// Map a stored object URL or key to the location recorded on the canonical
/// row: everything after `products/`, with a purely numeric first segment
/// prefixed by `img` to match the marketplace folder naming.
pub fn relative_location(stored: &str) -> String {
    let after_products = match stored.find("products/") {
        Some(idx) => &stored[idx + "products/".len()..],
        None => stored.trim_start_matches('/'),
    };

    let segments: Vec<&str> = after_products.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return "/".to_string();
    }
    let numeric_folder = segments[0].chars().all(|c| c.is_ascii_digit());
    if numeric_folder {
        format!("/img{}", segments.join("/"))
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Object key for the n-th image of a product.
pub fn object_key(product_image_code: &str, index: usize, extension: &str) -> String {
    format!(
        "products/{}/{}_{}.{}",
        product_image_code, product_image_code, index, extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_location_prefixes_numeric_folder() {
        assert_eq!(
            relative_location("https://bucket.s3/products/01306503/01306503_4.jpg"),
            "/img01306503/01306503_4.jpg"
        );
    }

    #[test]
    fn test_relative_location_from_bare_key() {
        assert_eq!(
            relative_location("products/00123456/00123456_0.png"),
            "/img00123456/00123456_0.png"
        );
    }

    #[test]
    fn test_relative_location_non_numeric_folder_unchanged() {
        assert_eq!(
            relative_location("products/banners/top.jpg"),
            "/banners/top.jpg"
        );
    }

    #[test]
    fn test_product_image_code_uses_trailing_digits() {
        assert_eq!(product_image_code("goods-1306503"), "01306503");
        assert_eq!(product_image_code("654321987654321"), "87654321");
        assert_eq!(product_image_code("42"), "00000042");
    }

    #[test]
    fn test_product_image_code_stable_without_digits() {
        let a = product_image_code("no-digits-here");
        let b = product_image_code("no-digits-here");
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_object_key_layout() {
        assert_eq!(
            object_key("01306503", 4, "jpg"),
            "products/01306503/01306503_4.jpg"
        );
    }
}
