//! Cabinet (file storage) endpoints: folder insert and file insert.
//!
//! These two endpoints still speak XML. Requests are small enough to build
//! by hand; responses are scanned with quick-xml for the status and result
//! elements.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::Cursor;

use listing_service_core::services::marketplace::CabinetResult;

use super::{RakutenClient, CABINET_BASE_URL};

/// Upload cap enforced by the Cabinet API.
const MAX_FILE_BYTES: usize = 2 * 1024 * 1024;

/// Maximum image edge length accepted by the Cabinet API.
const MAX_DIMENSION: u32 = 3840;

/// Byte cap on the registered image name.
const MAX_FILE_NAME_BYTES: usize = 50;

/// Byte cap on the registration file name.
const MAX_FILE_PATH_BYTES: usize = 20;

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// First text content of `tag` anywhere in the document.
fn xml_text(xml: &str, tag: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let mut inside = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                inside = start.name().as_ref() == tag.as_bytes();
            }
            Ok(Event::Text(text)) if inside => {
                return text.unescape().ok().map(|t| t.trim().to_string());
            }
            Ok(Event::End(_)) => inside = false,
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

fn parse_cabinet_response(status: u16, body: &str, id_tag: &str) -> CabinetResult {
    let system_status = xml_text(body, "systemStatus");
    let result_code = xml_text(body, "resultCode").and_then(|code| code.parse::<i32>().ok());
    let id = xml_text(body, id_tag).and_then(|id| id.parse::<i64>().ok());

    if status == 200 && system_status.as_deref() == Some("OK") && result_code == Some(0) {
        return CabinetResult {
            success: true,
            id,
            result_code,
            error: None,
        };
    }

    let message = xml_text(body, "message")
        .or_else(|| result_code.map(|code| format!("API returned error code: {}", code)))
        .unwrap_or_else(|| format!("Cabinet request failed with status {}", status));
    CabinetResult {
        success: false,
        id,
        result_code,
        error: Some(message),
    }
}

/// Sniff the upload format from magic bytes; the Cabinet accepts JPEG, GIF,
/// PNG, TIFF and BMP.
fn sniff_content_type(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        Some("image/png")
    } else if data.starts_with(b"GIF8") {
        Some("image/gif")
    } else if data.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]) {
        Some("image/tiff")
    } else if data.starts_with(b"BM") {
        Some("image/bmp")
    } else {
        None
    }
}

fn validate_upload(
    file_name: &str,
    file_path_name: Option<&str>,
    data: &[u8],
) -> Result<&'static str, String> {
    if file_name.trim().is_empty() {
        return Err("File name cannot be empty or spaces only".to_string());
    }
    if file_name.len() > MAX_FILE_NAME_BYTES {
        return Err(format!("File name exceeds {} bytes", MAX_FILE_NAME_BYTES));
    }
    if let Some(path_name) = file_path_name {
        if path_name.len() > MAX_FILE_PATH_BYTES {
            return Err(format!("File path name exceeds {} bytes", MAX_FILE_PATH_BYTES));
        }
    }
    if data.len() > MAX_FILE_BYTES {
        return Err(format!(
            "File size ({} bytes) exceeds maximum (2MB)",
            data.len()
        ));
    }

    let content_type = sniff_content_type(data).ok_or_else(|| {
        "Invalid file format. Supported: jpg, gif, png, tiff, bmp".to_string()
    })?;

    match image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok())
    {
        Some((width, height)) if width > MAX_DIMENSION || height > MAX_DIMENSION => {
            return Err(format!(
                "Image dimensions {}x{} exceed maximum {}x{}",
                width, height, MAX_DIMENSION, MAX_DIMENSION
            ));
        }
        _ => {}
    }

    Ok(content_type)
}

impl RakutenClient {
    pub async fn cabinet_create_folder(
        &self,
        folder_name: &str,
        directory_name: Option<&str>,
        upper_folder_id: Option<i64>,
    ) -> CabinetResult {
        let url = format!("{}/folder/insert", CABINET_BASE_URL);

        let mut folder = format!("<folderName>{}</folderName>", xml_escape(folder_name));
        if let Some(directory) = directory_name {
            folder.push_str(&format!(
                "<directoryName>{}</directoryName>",
                xml_escape(directory)
            ));
        }
        if let Some(upper) = upper_folder_id {
            folder.push_str(&format!("<upperFolderId>{}</upperFolderId>", upper));
        }
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<request><folderInsertRequest><folder>{}</folder></folderInsertRequest></request>",
            folder
        );

        let response = self
            .cabinet_http
            .post(&url)
            .header("Authorization", self.auth_header())
            .header("Content-Type", "text/xml; charset=utf-8")
            .body(xml)
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                parse_cabinet_response(status, &body, "FolderId")
            }
            Err(e) => CabinetResult {
                success: false,
                id: None,
                result_code: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub async fn cabinet_upload_file(
        &self,
        file_name: &str,
        file_path_name: Option<&str>,
        folder_id: i64,
        data: &[u8],
        overwrite: bool,
    ) -> CabinetResult {
        let url = format!("{}/file/insert", CABINET_BASE_URL);

        let content_type = match validate_upload(file_name, file_path_name, data) {
            Ok(content_type) => content_type,
            Err(reason) => {
                return CabinetResult {
                    success: false,
                    id: None,
                    result_code: None,
                    error: Some(reason),
                }
            }
        };

        let mut file_elem = format!(
            "<fileName>{}</fileName><folderId>{}</folderId>",
            xml_escape(file_name),
            folder_id
        );
        if let Some(path_name) = file_path_name {
            file_elem.push_str(&format!("<filePath>{}</filePath>", xml_escape(path_name)));
        }
        if overwrite {
            file_elem.push_str("<overWrite>true</overWrite>");
        }
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<request><fileInsertRequest><file>{}</file></fileInsertRequest></request>",
            file_elem
        );

        let part = match reqwest::multipart::Part::bytes(data.to_vec())
            .file_name(file_name.to_string())
            .mime_str(content_type)
        {
            Ok(part) => part,
            Err(e) => {
                return CabinetResult {
                    success: false,
                    id: None,
                    result_code: None,
                    error: Some(e.to_string()),
                }
            }
        };
        let form = reqwest::multipart::Form::new()
            .text("xml", xml)
            .part("file", part);

        let response = self
            .cabinet_http
            .post(&url)
            .header("Authorization", self.auth_header())
            .multipart(form)
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                parse_cabinet_response(status, &body, "FileId")
            }
            Err(e) => CabinetResult {
                success: false,
                id: None,
                result_code: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOLDER_OK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<result>
  <status><interfaceId>cabinet.folder.insert</interfaceId><systemStatus>OK</systemStatus><message>OK</message></status>
  <cabinetFolderInsertResult><resultCode>0</resultCode><FolderId>19946</FolderId></cabinetFolderInsertResult>
</result>"#;

    const FOLDER_ERROR: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<result>
  <status><systemStatus>NG</systemStatus><message>AuthError</message></status>
</result>"#;

    #[test]
    fn test_parse_successful_folder_insert() {
        let result = parse_cabinet_response(200, FOLDER_OK, "FolderId");
        assert!(result.success);
        assert_eq!(result.id, Some(19946));
        assert_eq!(result.result_code, Some(0));
    }

    #[test]
    fn test_parse_failed_folder_insert() {
        let result = parse_cabinet_response(401, FOLDER_ERROR, "FolderId");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("AuthError"));
    }

    #[test]
    fn test_parse_error_result_code() {
        let body = FOLDER_OK.replace("<resultCode>0</resultCode>", "<resultCode>3012</resultCode>");
        let result = parse_cabinet_response(200, &body, "FolderId");
        assert!(!result.success);
        assert_eq!(result.result_code, Some(3012));
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("a&b<c>"), "a&amp;b&lt;c&gt;");
    }

    fn tiny_png() -> Vec<u8> {
        let img = image::DynamicImage::new_rgb8(4, 4);
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_validate_upload_accepts_small_png() {
        let data = tiny_png();
        assert_eq!(validate_upload("item.png", None, &data), Ok("image/png"));
    }

    #[test]
    fn test_validate_upload_rejects_oversized_payload() {
        let mut data = tiny_png();
        data.resize(MAX_FILE_BYTES + 1, 0);
        assert!(validate_upload("item.png", None, &data)
            .unwrap_err()
            .contains("2MB"));
    }

    #[test]
    fn test_validate_upload_rejects_unknown_format() {
        let data = vec![0u8; 64];
        assert!(validate_upload("item.bin", None, &data)
            .unwrap_err()
            .contains("Invalid file format"));
    }

    #[test]
    fn test_validate_upload_rejects_long_names() {
        let data = tiny_png();
        let long_name = "あ".repeat(20); // 60 bytes
        assert!(validate_upload(&long_name, None, &data)
            .unwrap_err()
            .contains("50 bytes"));
        assert!(validate_upload("ok.png", Some("this-path-name-is-way-too-long"), &data)
            .unwrap_err()
            .contains("20 bytes"));
    }
}
