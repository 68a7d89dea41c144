use mediadrop_core::{CropPolicy, ImageSizeSelection, UploadedFileRecord};
use mediadrop_processing::{UploadErrorSummary, UploadOutcome, Uploader};
use serde::Serialize;
use std::collections::BTreeMap;

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mediadrop=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Build the size selection from command-line flags.
///
/// No category means no derivatives. Sizes may be repeated or comma separated.
pub fn size_selection(
    category: Option<String>,
    sizes: &[String],
    fit: bool,
) -> Option<ImageSizeSelection> {
    let category = category?;
    let sizes = sizes
        .iter()
        .flat_map(|s| s.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let crop = if fit {
        CropPolicy::fit_on_white()
    } else {
        CropPolicy::CropToFill
    };
    Some(ImageSizeSelection::new(category, sizes).with_crop(crop))
}

#[derive(Debug, Serialize)]
pub struct UploadedEntry {
    #[serde(flatten)]
    pub record: UploadedFileRecord,
    pub url: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variants: BTreeMap<String, String>,
}

/// JSON report printed after a batch.
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub uploaded: Vec<UploadedEntry>,
    pub failed: Vec<UploadErrorSummary>,
}

impl BatchReport {
    pub fn new(uploader: &Uploader, outcome: &UploadOutcome, variants: &[String]) -> Self {
        let uploaded = outcome
            .uploaded
            .iter()
            .map(|record| UploadedEntry {
                url: uploader.url_of_file(&record.name, None),
                variants: match record.dimensions {
                    Some(_) => variants
                        .iter()
                        .map(|v| (v.clone(), uploader.url_of_file(&record.name, Some(v))))
                        .collect(),
                    None => BTreeMap::new(),
                },
                record: record.clone(),
            })
            .collect();

        Self {
            uploaded,
            failed: outcome.failed.iter().map(|e| e.summary()).collect(),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediadrop_core::{Config, FileCategory};
    use mediadrop_processing::{UploadError, UploadFailure};

    #[test]
    fn test_size_selection_from_flags() {
        assert!(size_selection(None, &["thumb".to_string()], false).is_none());

        let selection = size_selection(
            Some("avatar".to_string()),
            &["thumb, medium".to_string(), "large".to_string()],
            true,
        )
        .unwrap();
        assert_eq!(selection.category, "avatar");
        assert_eq!(selection.sizes, vec!["thumb", "medium", "large"]);
        assert_eq!(selection.crop, CropPolicy::fit_on_white());
    }

    #[tokio::test]
    async fn test_report_lists_urls_and_failures() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = Uploader::from_config(Config::local(
            dir.path().display().to_string(),
            "http://localhost:3000/uploads",
        ))
        .await
        .unwrap()
        .with_upload_directory("avatars");

        let outcome = UploadOutcome {
            uploaded: vec![UploadedFileRecord {
                name: "1700000000-ab.png".to_string(),
                original_name: "cat.png".to_string(),
                content_type: "image/png".to_string(),
                category: FileCategory::Image,
                size_bytes: 42,
                dimensions: Some(mediadrop_core::ImageDimensions::new(4, 4)),
            }],
            failed: vec![UploadError::new(
                "tool.exe",
                UploadFailure::UnsupportedFileType {
                    extension: ".exe".to_string(),
                },
            )],
        };

        let report = BatchReport::new(&uploader, &outcome, &["thumb".to_string()]);
        assert!(report.has_failures());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["uploaded"][0]["original_name"], "cat.png");
        assert_eq!(
            json["uploaded"][0]["url"],
            "http://localhost:3000/uploads/avatars/1700000000-ab.png"
        );
        assert_eq!(
            json["uploaded"][0]["variants"]["thumb"],
            "http://localhost:3000/uploads/avatars/thumb/1700000000-ab.png"
        );
        assert_eq!(json["failed"][0]["code"], "unsupported_file_type");
    }
}
