//! Content sniffing and file-type classification.
//!
//! A file is accepted when the first allowed policy that knows its extension
//! also lists its sniffed content signature.

use crate::upload::UploadFailure;
use mediadrop_core::{AllowedTypes, FileTypePolicy};

/// Leading bytes inspected when sniffing a content signature.
pub const SNIFF_LEN: usize = 512;

const TEXT_XML: &str = "text/xml; charset=utf-8";
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

/// Derive a content signature from the leading bytes of a file.
///
/// Magic numbers are matched first; anything without one is treated as XML
/// (which covers SVG), plain UTF-8 text, or opaque binary, in that order.
pub fn sniff_content_type(prefix: &[u8]) -> String {
    let prefix = &prefix[..prefix.len().min(SNIFF_LEN)];

    if let Some(kind) = infer::get(prefix) {
        if kind.matcher_type() != infer::MatcherType::Text {
            return canonical_mime(kind.mime_type()).to_string();
        }
    }

    if looks_like_text(prefix) {
        let body = trim_text_start(prefix);
        if starts_with_ignore_case(body, b"<?xml") || starts_with_ignore_case(body, b"<svg") {
            return TEXT_XML.to_string();
        }
        return TEXT_PLAIN.to_string();
    }

    OCTET_STREAM.to_string()
}

/// Lowercase extension of `name` including the leading dot, or `""`.
///
/// Only the final component is considered: `archive.tar.GZ` gives `.gz` and
/// `dir.d/README` gives `""`.
pub fn extension_of(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match base.rfind('.') {
        Some(idx) => base[idx..].to_lowercase(),
        None => String::new(),
    }
}

/// Match a sniffed signature and extension against the allow-list.
///
/// Policies are consulted in allow-list order and the first one that knows the
/// extension decides the outcome.
pub fn classify(
    content_type: &str,
    extension: &str,
    allowed: &AllowedTypes,
) -> Result<&'static FileTypePolicy, UploadFailure> {
    match allowed
        .policies()
        .find(|policy| policy.accepts_extension(extension))
    {
        Some(policy) if policy.accepts_content_type(content_type) => Ok(policy),
        Some(_) => Err(UploadFailure::InvalidFileType {
            extension: extension.to_string(),
            content_type: content_type.to_string(),
        }),
        None => Err(UploadFailure::UnsupportedFileType {
            extension: extension.to_string(),
        }),
    }
}

/// Sniffed content signature plus the policy it was accepted under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedType {
    pub content_type: String,
    /// `None` until classified, and after a rejected classification.
    pub policy: Option<&'static FileTypePolicy>,
}

impl DetectedType {
    pub fn sniff(prefix: &[u8]) -> Self {
        Self {
            content_type: sniff_content_type(prefix),
            policy: None,
        }
    }

    /// Classify against the allow-list and remember the matched policy.
    pub fn classify(
        &mut self,
        extension: &str,
        allowed: &AllowedTypes,
    ) -> Result<&'static FileTypePolicy, UploadFailure> {
        let policy = classify(&self.content_type, extension, allowed)?;
        self.policy = Some(policy);
        Ok(policy)
    }

    /// Whether the file was accepted under a policy that gets derivatives.
    pub fn is_image(&self) -> bool {
        self.policy.is_some_and(FileTypePolicy::is_image)
    }
}

/// Map signatures with several spellings onto the one the policies list.
fn canonical_mime(mime: &str) -> &str {
    match mime {
        "audio/x-wav" | "audio/wave" => "audio/wav",
        "audio/x-flac" => "audio/flac",
        other => other,
    }
}

fn looks_like_text(prefix: &[u8]) -> bool {
    let valid = match std::str::from_utf8(prefix) {
        Ok(_) => true,
        // A multi-byte character cut off by the sniff window is still text.
        Err(e) => e.error_len().is_none(),
    };
    valid
        && !prefix
            .iter()
            .any(|&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0c))
}

fn trim_text_start(prefix: &[u8]) -> &[u8] {
    let prefix = prefix.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(prefix);
    let start = prefix
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(prefix.len());
    &prefix[start..]
}

fn starts_with_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len() && haystack[..needle.len()].eq_ignore_ascii_case(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediadrop_core::FileCategory;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const PDF_MAGIC: &[u8] = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n";

    fn images() -> AllowedTypes {
        AllowedTypes::only(FileCategory::Image)
    }

    #[test]
    fn test_sniff_magic_numbers() {
        assert_eq!(sniff_content_type(PNG_MAGIC), "image/png");
        assert_eq!(sniff_content_type(PDF_MAGIC), "application/pdf");
        assert_eq!(sniff_content_type(b"\xFF\xD8\xFF\xE0\0\x10JFIF\0"), "image/jpeg");
        assert_eq!(sniff_content_type(b"GIF89a\x01\0\x01\0"), "image/gif");
    }

    #[test]
    fn test_sniff_text_and_fallback() {
        assert_eq!(
            sniff_content_type(b"  <?xml version=\"1.0\"?><svg/>"),
            "text/xml; charset=utf-8"
        );
        assert_eq!(
            sniff_content_type(b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>"),
            "text/xml; charset=utf-8"
        );
        assert_eq!(sniff_content_type(b"hello world\n"), "text/plain; charset=utf-8");
        assert_eq!(sniff_content_type(b""), "text/plain; charset=utf-8");
        assert_eq!(
            sniff_content_type(b"\x00\x01\x02\x03garbage"),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_sniff_reads_at_most_window() {
        let mut data = vec![b'a'; SNIFF_LEN];
        data.extend_from_slice(&[0u8; 64]);
        assert_eq!(sniff_content_type(&data), "text/plain; charset=utf-8");
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("Photo.JPG"), ".jpg");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of("dir.d/README"), "");
        assert_eq!(extension_of("C:\\tmp\\scan.PDF"), ".pdf");
    }

    #[test]
    fn test_classify_accepts_matching_image() {
        let policy = classify("image/png", ".png", &images()).unwrap();
        assert_eq!(policy.category, FileCategory::Image);
    }

    #[test]
    fn test_classify_rejects_mismatched_signature() {
        let result = classify("application/pdf", ".png", &images());
        assert!(matches!(
            result,
            Err(UploadFailure::InvalidFileType { ref extension, ref content_type })
                if extension == ".png" && content_type == "application/pdf"
        ));
    }

    #[test]
    fn test_classify_unknown_extension() {
        let result = classify("image/png", ".exe", &images());
        assert!(matches!(result, Err(UploadFailure::UnsupportedFileType { .. })));
    }

    #[test]
    fn test_detected_type_records_policy() {
        let mut detected = DetectedType::sniff(PNG_MAGIC);
        assert_eq!(detected.content_type, "image/png");
        assert!(detected.policy.is_none());

        let policy = detected.classify(".png", &images()).unwrap();
        assert_eq!(detected.policy, Some(policy));
        assert!(detected.is_image());

        let mut rejected = DetectedType::sniff(PDF_MAGIC);
        assert!(rejected.classify(".png", &images()).is_err());
        assert!(rejected.policy.is_none());
        assert!(!rejected.is_image());
    }

    #[test]
    fn test_classify_first_extension_match_decides() {
        // `.svg` is only known to the svg policy, so an image-first list
        // still falls through to it.
        let allowed: AllowedTypes = "image|svg".parse().unwrap();
        let policy = classify("text/xml; charset=utf-8", ".svg", &allowed).unwrap();
        assert_eq!(policy.category, FileCategory::Svg);

        let allowed = AllowedTypes::new(vec![FileCategory::Pdf, FileCategory::Document]);
        let result = classify("text/plain; charset=utf-8", ".pdf", &allowed);
        assert!(matches!(result, Err(UploadFailure::InvalidFileType { .. })));
    }

    #[test]
    fn test_classify_never_tries_a_later_policy_with_the_same_extension() {
        // `.m3u8` is known to both audio and video; only video lists the
        // `application/x-mpegurl` signature.
        let audio_first = AllowedTypes::new(vec![FileCategory::Audio, FileCategory::Video]);
        let result = classify("application/x-mpegurl", ".m3u8", &audio_first);
        assert!(matches!(
            result,
            Err(UploadFailure::InvalidFileType { ref extension, ref content_type })
                if extension == ".m3u8" && content_type == "application/x-mpegurl"
        ));

        let video_first = AllowedTypes::new(vec![FileCategory::Video, FileCategory::Audio]);
        let policy = classify("application/x-mpegurl", ".m3u8", &video_first).unwrap();
        assert_eq!(policy.category, FileCategory::Video);

        // Same overlap for `.m4a`, this time accepted by the first policy.
        let policy = classify("audio/mp4", ".m4a", &audio_first).unwrap();
        assert_eq!(policy.category, FileCategory::Audio);
        let result = classify("audio/mp4", ".m4a", &video_first);
        assert!(matches!(result, Err(UploadFailure::InvalidFileType { .. })));
    }
}
