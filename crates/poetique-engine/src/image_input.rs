use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// A poem photo encoded for transport.
///
/// The payload is base64-encoded exactly once, at construction, and carries
/// an explicit media type so the service never has to sniff it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    mime_type: String,
    data_base64: String,
    sha256: String,
}

impl ImagePayload {
    pub fn from_bytes(bytes: &[u8], mime_type: &str) -> Result<Self> {
        let mime_type = normalize_image_mime(mime_type)?;
        if bytes.is_empty() {
            bail!("image is empty");
        }
        Ok(Self {
            mime_type,
            data_base64: BASE64.encode(bytes),
            sha256: sha256_hex(bytes),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        let mime_type = mime_for_path(path)
            .map(str::to_string)
            .or_else(|| sniff_mime(&bytes))
            .with_context(|| format!("{} is not a recognised image", path.display()))?;
        Self::from_bytes(&bytes, &mime_type)
    }

    /// Accepts `data:<mime>;base64,<payload>`, keeping the payload as-is and
    /// taking the media type from the header.
    pub fn from_data_url(data_url: &str) -> Result<Self> {
        let trimmed = data_url.trim();
        let Some((header, payload)) = trimmed.split_once(',') else {
            bail!("data URL has no payload separator");
        };
        let Some(meta) = header.strip_prefix("data:") else {
            bail!("data URL must start with `data:`");
        };
        let Some(mime_type) = meta.strip_suffix(";base64") else {
            bail!("data URL payload must be base64-encoded");
        };
        let mime_type = normalize_image_mime(mime_type)?;
        let bytes = BASE64
            .decode(payload.as_bytes())
            .context("data URL payload is not valid base64")?;
        if bytes.is_empty() {
            bail!("image is empty");
        }
        Ok(Self {
            mime_type,
            data_base64: payload.to_string(),
            sha256: sha256_hex(&bytes),
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data_base64(&self) -> &str {
        &self.data_base64
    }

    /// Hex SHA-256 of the raw image bytes, for diagnostics.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// The `inlineData` part of a `generateContent` request.
    pub fn to_inline_part(&self) -> Value {
        json!({
            "inlineData": {
                "mimeType": self.mime_type,
                "data": self.data_base64,
            }
        })
    }
}

/// What the terminal shows while the analysis runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePreview {
    pub path: PathBuf,
    pub mime_type: Option<String>,
    pub width: u32,
    pub height: u32,
    pub byte_len: u64,
}

impl ImagePreview {
    pub fn load(path: &Path) -> Result<Self> {
        let byte_len = fs::metadata(path)
            .with_context(|| format!("failed reading {}", path.display()))?
            .len();
        let (width, height) = image::image_dimensions(path)
            .with_context(|| format!("failed decoding dimensions of {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            mime_type: mime_for_path(path).map(str::to_string),
            width,
            height,
            byte_len,
        })
    }

    pub fn describe(&self) -> String {
        let name = self
            .path
            .file_name()
            .and_then(|value| value.to_str())
            .unwrap_or("image");
        format!(
            "{name} ({}x{}, {} KiB)",
            self.width,
            self.height,
            self.byte_len.div_ceil(1024)
        )
    }
}

pub(crate) fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<String> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type().to_string())
}

fn normalize_image_mime(raw: &str) -> Result<String> {
    let mime = raw.trim().to_ascii_lowercase();
    if mime == "image/jpg" {
        return Ok("image/jpeg".to_string());
    }
    match mime.strip_prefix("image/") {
        Some(subtype) if !subtype.is_empty() => Ok(mime),
        _ => bail!("unsupported media type `{raw}`; an image is required"),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use base64::Engine as _;
    use image::{Rgb, RgbImage};
    use serde_json::json;

    use super::{ImagePayload, ImagePreview, BASE64};

    #[test]
    fn from_bytes_encodes_once_with_explicit_mime() -> anyhow::Result<()> {
        let payload = ImagePayload::from_bytes(b"\xff\xd8\xffpoem", "image/jpg")?;
        assert_eq!(payload.mime_type(), "image/jpeg");
        assert_eq!(BASE64.decode(payload.data_base64())?, b"\xff\xd8\xffpoem");
        assert_eq!(payload.sha256().len(), 64);
        assert_eq!(
            payload.to_inline_part(),
            json!({"inlineData": {"mimeType": "image/jpeg", "data": payload.data_base64()}})
        );
        Ok(())
    }

    #[test]
    fn data_url_header_is_split_off_and_type_kept() -> anyhow::Result<()> {
        let encoded = BASE64.encode(b"png-bytes");
        let payload = ImagePayload::from_data_url(&format!("data:image/png;base64,{encoded}"))?;
        assert_eq!(payload.mime_type(), "image/png");
        assert_eq!(payload.data_base64(), encoded);
        Ok(())
    }

    #[test]
    fn rejects_non_images_and_malformed_data_urls() {
        assert!(ImagePayload::from_bytes(b"%PDF", "application/pdf").is_err());
        assert!(ImagePayload::from_bytes(b"", "image/png").is_err());
        assert!(ImagePayload::from_data_url("image/png;base64,AAAA").is_err());
        assert!(ImagePayload::from_data_url("data:image/png,AAAA").is_err());
        assert!(ImagePayload::from_data_url("data:image/png;base64,@@@").is_err());
        assert!(ImagePayload::from_data_url("data:text/plain;base64,QUJD").is_err());
    }

    #[test]
    fn from_path_sniffs_unknown_extensions() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("poem.upload");
        RgbImage::from_pixel(4, 3, Rgb([10, 20, 30]))
            .save_with_format(&path, image::ImageFormat::Png)?;
        let payload = ImagePayload::from_path(&path)?;
        assert_eq!(payload.mime_type(), "image/png");

        let text = temp.path().join("notes.txt");
        fs::write(&text, "not an image")?;
        assert!(ImagePayload::from_path(&text).is_err());
        Ok(())
    }

    #[test]
    fn preview_reads_dimensions() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("tyger.png");
        RgbImage::from_pixel(12, 7, Rgb([255, 255, 255])).save(&path)?;
        let preview = ImagePreview::load(&path)?;
        assert_eq!((preview.width, preview.height), (12, 7));
        assert_eq!(preview.mime_type.as_deref(), Some("image/png"));
        assert!(preview.describe().starts_with("tyger.png (12x7"));
        Ok(())
    }
}
