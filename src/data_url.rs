//! Converting binary data to and from `data:` URLs.

use std::sync::LazyLock;

use base64::{
    Engine as _, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    prelude::BASE64_STANDARD,
};
use regex::Regex;

use crate::prelude::*;

/// Convert binary data to a `data:` URL.
pub fn data_url(mime_type: &str, data: &[u8]) -> String {
    let base64_data = BASE64_STANDARD.encode(data);
    // Some sources indicate that the Base64 data should be percent-encoded, but
    // in practice this breaks Gemini and probably several other LLMs.
    format!("data:{};base64,{}", mime_type, base64_data)
}

/// Regex for parsing a `data:` URL. Browsers accept `;BASE64` in any case,
/// and data wrapped across lines.
pub const DATA_URL_RE: &str =
    r"^data:(?P<mime_type>[^;,]+)(?:;[^;,]+)*(?i:;base64),(?P<data>(?s:.+))$";

/// Decodes Base64 with or without trailing `=` padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Parse a `data:` URL into a MIME type and Base64-encoded data.
pub fn parse_data_url(data_url: &str) -> Option<(String, &str)> {
    static RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(DATA_URL_RE).expect("invalid data URL regex"));
    let caps = RE.captures(data_url.trim())?;
    let mime_type = caps.name("mime_type")?.as_str().to_ascii_lowercase();
    let data = caps.name("data")?.as_str();
    Some((mime_type, data))
}

/// Raster image formats we're willing to pass along to a recognition provider.
pub const SUPPORTED_IMAGE_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
    "image/bmp",
    "image/tiff",
];

/// A decoded image, ready to send to an extraction provider.
#[derive(Clone)]
pub struct ImagePayload {
    /// The MIME type, as detected from the image bytes.
    pub mime_type: String,

    /// The raw image bytes.
    pub data: Vec<u8>,
}

impl ImagePayload {
    /// Decode a `data:` URL, checking that it contains a supported raster
    /// image. The declared MIME type must be an image type, but the format we
    /// report is sniffed from the bytes themselves.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let (declared_mime_type, base64_data) =
            parse_data_url(url).ok_or_else(|| anyhow!("not a base64 `data:` URL"))?;
        if !declared_mime_type.starts_with("image/") {
            return Err(anyhow!(
                "`data:` URL declares {declared_mime_type:?}, not an image"
            ));
        }
        let base64_data = base64_data
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect::<Vec<_>>();
        let data = LENIENT_BASE64
            .decode(base64_data)
            .context("could not decode base64 image data")?;
        Self::from_bytes(data)
    }

    /// Wrap raw image bytes, checking that they're a supported raster format.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let mime_type = infer::get(&data)
            .map(|kind| kind.mime_type())
            .ok_or_else(|| anyhow!("could not recognize image format"))?;
        if !SUPPORTED_IMAGE_TYPES.contains(&mime_type) {
            return Err(anyhow!("unsupported image format {mime_type:?}"));
        }
        Ok(Self {
            mime_type: mime_type.to_owned(),
            data,
        })
    }

    /// Re-encode as a `data:` URL using the sniffed MIME type.
    pub fn to_data_url(&self) -> String {
        data_url(&self.mime_type, &self.data)
    }
}

// Don't dump megabytes of image data into our logs.
impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// The PNG signature plus the start of an IHDR chunk. Enough for format
    /// sniffing, which is all we do locally.
    pub(crate) const TINY_PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49,
        0x48, 0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02,
        0x00, 0x00, 0x00,
    ];

    /// A PNG `data:` URL.
    pub(crate) fn png_data_url() -> String {
        data_url("image/png", TINY_PNG)
    }

    #[test]
    fn parses_data_url_with_parameters() {
        let (mime_type, data) =
            parse_data_url("data:Image/JPEG;name=scan.jpg;base64,AAAA").unwrap();
        assert_eq!(mime_type, "image/jpeg");
        assert_eq!(data, "AAAA");
    }

    #[test]
    fn accepts_base64_token_in_any_case() {
        let url = png_data_url().replacen(";base64,", ";BASE64,", 1);
        let payload = ImagePayload::from_data_url(&url).unwrap();
        assert_eq!(payload.data, TINY_PNG);
    }

    #[test]
    fn accepts_line_wrapped_base64() {
        let url = png_data_url();
        let (head, body) = url.split_at(url.find(',').unwrap() + 1);
        let wrapped = body
            .as_bytes()
            .chunks(8)
            .map(|chunk| std::str::from_utf8(chunk).unwrap())
            .collect::<Vec<_>>()
            .join("\r\n");
        let payload = ImagePayload::from_data_url(&format!("{head}{wrapped}")).unwrap();
        assert_eq!(payload.mime_type, "image/png");
        assert_eq!(payload.data, TINY_PNG);
    }

    #[test]
    fn accepts_unpadded_base64() {
        let url = png_data_url();
        assert!(url.ends_with('='));
        let payload = ImagePayload::from_data_url(url.trim_end_matches('=')).unwrap();
        assert_eq!(payload.data, TINY_PNG);
    }

    #[test]
    fn rejects_urls_without_base64() {
        assert!(parse_data_url("data:image/png,rawdata").is_none());
        assert!(parse_data_url("https://example.com/image.png").is_none());
    }

    #[test]
    fn sniffs_format_from_bytes() {
        // Declared as JPEG, but it's really a PNG.
        let url = data_url("image/jpeg", TINY_PNG);
        let payload = ImagePayload::from_data_url(&url).unwrap();
        assert_eq!(payload.mime_type, "image/png");
        assert_eq!(payload.to_data_url(), png_data_url());
    }

    #[test]
    fn rejects_bad_payloads() {
        let cases = [
            ("data:image/png;base64,!!!not-base64!!!".to_owned(), "base64"),
            (data_url("text/plain", b"hello"), "not an image"),
            (data_url("image/png", b"hello"), "recognize"),
            // A PDF is a document, not a raster image.
            (data_url("image/png", b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n"), "unsupported"),
        ];
        for (url, expected) in cases {
            let err = ImagePayload::from_data_url(&url).unwrap_err().to_string();
            assert!(err.contains(expected), "{expected:?} not in {err:?}");
        }
    }
}
