//! Translation support for variant metadata.
//!
//! Machine translation sits behind the [`Translator`] trait; everything
//! deterministic lives here: language detection, the curated color/size
//! normalization table, marketplace text cleaning and the 32-byte cap on
//! selector display values. The normalization table is authoritative: it is
//! consulted before any MT call so color names come out the same regardless
//! of MT drift.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

use crate::Result;

/// Byte budget for a selector display value on the marketplace.
pub const SELECTOR_VALUE_MAX_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    Japanese,
    Chinese,
    English,
    Other,
}

impl Lang {
    pub fn code(self) -> &'static str {
        match self {
            Lang::Japanese => "JA",
            Lang::Chinese => "ZH",
            Lang::English => "EN",
            Lang::Other => "",
        }
    }
}

/// Detect the dominant script of a text.
///
/// Kana anywhere means Japanese; Han without kana means Chinese; otherwise
/// ASCII letters mean English.
pub fn detect_language(text: &str) -> Lang {
    let mut has_han = false;
    let mut has_ascii_alpha = false;
    for c in text.chars() {
        let cp = c as u32;
        if (0x3040..=0x309F).contains(&cp) || (0x30A0..=0x30FF).contains(&cp) {
            return Lang::Japanese;
        }
        if (0x4E00..=0x9FFF).contains(&cp) || (0x3400..=0x4DBF).contains(&cp) {
            has_han = true;
        }
        if c.is_ascii_alphabetic() {
            has_ascii_alpha = true;
        }
    }
    if has_han {
        Lang::Chinese
    } else if has_ascii_alpha {
        Lang::English
    } else {
        Lang::Other
    }
}

/// Curated source-token -> Japanese display value table for variant values.
static NORMALIZATION_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // colors
        ("黑色", "ブラック"),
        ("黑", "ブラック"),
        ("白色", "ホワイト"),
        ("白", "ホワイト"),
        ("红色", "レッド"),
        ("红", "レッド"),
        ("蓝色", "ブルー"),
        ("蓝", "ブルー"),
        ("绿色", "グリーン"),
        ("黄色", "イエロー"),
        ("粉色", "ピンク"),
        ("粉红色", "ピンク"),
        ("灰色", "グレー"),
        ("灰", "グレー"),
        ("紫色", "パープル"),
        ("橙色", "オレンジ"),
        ("橘色", "オレンジ"),
        ("棕色", "ブラウン"),
        ("咖啡色", "ブラウン"),
        ("米色", "ベージュ"),
        ("米白色", "オフホワイト"),
        ("卡其色", "カーキ"),
        ("军绿色", "カーキグリーン"),
        ("藏青色", "ネイビー"),
        ("深蓝色", "ダークブルー"),
        ("浅蓝色", "ライトブルー"),
        ("天蓝色", "スカイブルー"),
        ("银色", "シルバー"),
        ("金色", "ゴールド"),
        ("酒红色", "ワインレッド"),
        ("玫红色", "ローズレッド"),
        ("墨绿色", "ダークグリーン"),
        ("浅绿色", "ライトグリーン"),
        ("杏色", "アプリコット"),
        ("驼色", "キャメル"),
        ("青色", "シアン"),
        ("透明", "クリア"),
        ("花色", "柄"),
        ("彩色", "マルチカラー"),
        // sizes
        ("均码", "フリーサイズ"),
        ("一码", "フリーサイズ"),
        ("大码", "大きいサイズ"),
        ("加大", "大きいサイズ"),
        ("小码", "小さいサイズ"),
    ])
});

/// Look up a token in the normalization table, tolerating surrounding
/// whitespace.
pub fn normalize_variant_token(token: &str) -> Option<&'static str> {
    NORMALIZATION_MAP.get(token.trim()).copied()
}

fn is_half_width_kana(c: char) -> bool {
    let cp = c as u32;
    (0xFF61..=0xFF9F).contains(&cp)
}

fn is_allowed_strict(c: char) -> bool {
    if c.is_alphanumeric() || c.is_whitespace() {
        return true;
    }
    matches!(
        c,
        '・' | 'ー' | '、' | '。' | '(' | ')' | '（' | '）' | '/' | '&' | '%' | '+' | '.' | ','
            | '-' | '_' | '×' | '〜' | '~' | ':' | '：'
    )
}

/// Clean a text for the marketplace: strip control characters and half-width
/// kana, NFKC-normalize, collapse whitespace. Strict mode additionally drops
/// punctuation outside the allowed set (used for selector display values).
pub fn clean_text_for_rakuten(text: &str, strict: bool) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| !c.is_control() && !is_half_width_kana(*c))
        .collect();
    let normalized: String = stripped.nfkc().collect();
    let filtered: String = if strict {
        normalized.chars().filter(|c| is_allowed_strict(*c)).collect()
    } else {
        normalized
    };
    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Enforce a UTF-8 byte cap by removing one character at a time from the
/// end, never splitting a code point.
pub fn trim_to_byte_limit(text: &str, max_bytes: usize) -> String {
    let mut out = text.to_string();
    while out.len() > max_bytes {
        out.pop();
    }
    out
}

/// Snake-case fallback for selector keys when MT is unavailable or returns
/// something unusable: strip non-alphanumerics, keep the first three words.
pub fn fallback_key(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    cleaned
        .split_whitespace()
        .take(3)
        .collect::<Vec<_>>()
        .join("_")
}

fn snake_case(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Machine translation backend.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into `target`. `source = None` requests autodetect.
    async fn translate(&self, text: &str, source: Option<Lang>, target: Lang) -> Result<String>;
}

/// Translate a selector key into a normalized snake_case English identifier.
///
/// MT output is snake-cased; when MT fails or yields nothing usable the
/// deterministic fallback applies.
pub async fn translate_key_to_english(translator: &dyn Translator, key: &str) -> String {
    let key = key.trim();
    if key.is_empty() {
        return String::new();
    }
    if detect_language(key) == Lang::English {
        return snake_case(key);
    }
    match translator.translate(key, None, Lang::English).await {
        Ok(translated) => {
            let snake = snake_case(&translated);
            if snake.is_empty() {
                fallback_key(key)
            } else {
                snake
            }
        }
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "key translation failed, using fallback");
            fallback_key(key)
        }
    }
}

/// Derive the Japanese display name of a selector. Chinese source text is
/// machine-translated; Japanese and anything else passes through verbatim.
pub async fn translate_display_name(translator: &dyn Translator, text: &str) -> Result<String> {
    let text = text.trim();
    match detect_language(text) {
        Lang::Chinese => {
            if let Some(mapped) = normalize_variant_token(text) {
                return Ok(mapped.to_string());
            }
            translator.translate(text, Some(Lang::Chinese), Lang::Japanese).await
        }
        _ => Ok(text.to_string()),
    }
}

/// Translate one variant value into its Japanese display form.
///
/// Resolution order: normalization table, then MT, then strict cleaning and
/// the byte cap. Values already in Japanese skip MT but still get cleaned and
/// capped.
pub async fn translate_variant_value(
    translator: &dyn Translator,
    value: &str,
    max_bytes: usize,
) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(String::new());
    }

    if let Some(mapped) = normalize_variant_token(value) {
        return Ok(trim_to_byte_limit(mapped, max_bytes));
    }

    let translated = match detect_language(value) {
        Lang::Chinese => translator
            .translate(value, Some(Lang::Chinese), Lang::Japanese)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(value = %value, error = %e, "variant value translation failed");
                value.to_string()
            }),
        _ => value.to_string(),
    };

    let cleaned = clean_text_for_rakuten(&translated, true);
    Ok(trim_to_byte_limit(&cleaned, max_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTranslator;

    #[async_trait]
    impl Translator for EchoTranslator {
        async fn translate(
            &self,
            text: &str,
            _source: Option<Lang>,
            _target: Lang,
        ) -> Result<String> {
            Ok(format!("mt:{}", text))
        }
    }

    struct FailingTranslator;

    #[async_trait]
    impl Translator for FailingTranslator {
        async fn translate(
            &self,
            _text: &str,
            _source: Option<Lang>,
            _target: Lang,
        ) -> Result<String> {
            Err(shared_error::AppError::Transient("offline".into()))
        }
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("ブラック"), Lang::Japanese);
        assert_eq!(detect_language("黑色"), Lang::Chinese);
        assert_eq!(detect_language("black"), Lang::English);
        assert_eq!(detect_language("1234"), Lang::Other);
        // Han plus kana counts as Japanese
        assert_eq!(detect_language("色はブラック"), Lang::Japanese);
    }

    #[test]
    fn test_normalization_map_is_authoritative() {
        assert_eq!(normalize_variant_token("黑色"), Some("ブラック"));
        assert_eq!(normalize_variant_token(" 白色 "), Some("ホワイト"));
        assert_eq!(normalize_variant_token("謎の色"), None);
    }

    #[test]
    fn test_clean_text_strips_control_and_half_width_kana() {
        let cleaned = clean_text_for_rakuten("ﾌﾞﾗｯｸ\u{0007} black", false);
        assert!(!cleaned.contains('\u{0007}'));
        for c in cleaned.chars() {
            assert!(!is_half_width_kana(c));
        }
        assert!(cleaned.contains("black"));
    }

    #[test]
    fn test_clean_text_nfkc_normalizes_full_width() {
        assert_eq!(clean_text_for_rakuten("ＡＢＣ１２３", false), "ABC123");
    }

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text_for_rakuten("a   b\t c", false), "a b c");
    }

    #[test]
    fn test_strict_mode_drops_disallowed_punctuation() {
        let cleaned = clean_text_for_rakuten("赤【特価】!★", true);
        assert_eq!(cleaned, "赤特価");
    }

    #[test]
    fn test_trim_to_byte_limit_never_splits_utf8() {
        // each katakana is 3 bytes; 12 chars = 36 bytes
        let long = "アイウエオカキクケコサシ";
        let trimmed = trim_to_byte_limit(long, SELECTOR_VALUE_MAX_BYTES);
        assert!(trimmed.len() <= SELECTOR_VALUE_MAX_BYTES);
        assert_eq!(trimmed, "アイウエオカキクケコ");
        assert!(std::str::from_utf8(trimmed.as_bytes()).is_ok());
    }

    #[test]
    fn test_fallback_key_takes_first_three_words() {
        assert_eq!(fallback_key("Main Color Of Item"), "main_color_of");
        assert_eq!(fallback_key("颜色"), "");
        assert_eq!(fallback_key("color-group 2"), "color_group_2");
    }

    #[tokio::test]
    async fn test_translate_key_prefers_mt_then_falls_back() {
        // the echo backend prefixes "mt:"; snake-casing keeps the ascii part
        let key = translate_key_to_english(&EchoTranslator, "颜色").await;
        assert_eq!(key, "mt");

        let key = translate_key_to_english(&FailingTranslator, "Size Group").await;
        assert_eq!(key, "size_group");
    }

    #[tokio::test]
    async fn test_translate_variant_value_uses_map_before_mt() {
        let value = translate_variant_value(&EchoTranslator, "黑色", 32)
            .await
            .unwrap();
        assert_eq!(value, "ブラック");
    }

    #[tokio::test]
    async fn test_translate_variant_value_caps_bytes() {
        let value = translate_variant_value(&FailingTranslator, "アイウエオカキクケコサシス", 32)
            .await
            .unwrap();
        assert!(value.len() <= 32);
    }

    #[tokio::test]
    async fn test_display_name_passthrough_for_japanese() {
        let name = translate_display_name(&EchoTranslator, "カラー").await.unwrap();
        assert_eq!(name, "カラー");
    }

    #[tokio::test]
    async fn test_display_name_translates_chinese() {
        let name = translate_display_name(&EchoTranslator, "尺码").await.unwrap();
        assert_eq!(name, "mt:尺码");
    }
}
