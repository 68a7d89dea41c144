//! File-type policies
//!
//! A policy is a named pair of accepted content signatures and accepted
//! extensions. The tables are static; callers pick an ordered subset per upload
//! call through [`AllowedTypes`].

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// File-type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Document,
    Pdf,
    Svg,
    Audio,
    Video,
}

impl FileCategory {
    pub const ALL: [FileCategory; 6] = [
        FileCategory::Image,
        FileCategory::Audio,
        FileCategory::Video,
        FileCategory::Svg,
        FileCategory::Document,
        FileCategory::Pdf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Image => "image",
            FileCategory::Document => "document",
            FileCategory::Pdf => "pdf",
            FileCategory::Svg => "svg",
            FileCategory::Audio => "audio",
            FileCategory::Video => "video",
        }
    }

    /// The static policy table for this category.
    pub fn policy(&self) -> &'static FileTypePolicy {
        match self {
            FileCategory::Image => &IMAGE_POLICY,
            FileCategory::Document => &DOCUMENT_POLICY,
            FileCategory::Pdf => &PDF_POLICY,
            FileCategory::Svg => &SVG_POLICY,
            FileCategory::Audio => &AUDIO_POLICY,
            FileCategory::Video => &VIDEO_POLICY,
        }
    }
}

impl FromStr for FileCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "image" => Ok(FileCategory::Image),
            "document" => Ok(FileCategory::Document),
            "pdf" => Ok(FileCategory::Pdf),
            "svg" => Ok(FileCategory::Svg),
            "audio" => Ok(FileCategory::Audio),
            "video" => Ok(FileCategory::Video),
            _ => Err(anyhow::anyhow!("Unknown file type: {}", s)),
        }
    }
}

impl Display for FileCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Accepted content signatures and extensions for one category.
#[derive(Debug, PartialEq, Eq)]
pub struct FileTypePolicy {
    pub category: FileCategory,
    pub content_types: &'static [&'static str],
    /// Lowercase, with the leading dot.
    pub extensions: &'static [&'static str],
}

impl FileTypePolicy {
    pub fn accepts_extension(&self, extension: &str) -> bool {
        self.extensions.contains(&extension)
    }

    pub fn accepts_content_type(&self, content_type: &str) -> bool {
        self.content_types.contains(&content_type)
    }

    pub fn is_image(&self) -> bool {
        self.category == FileCategory::Image
    }
}

pub static IMAGE_POLICY: FileTypePolicy = FileTypePolicy {
    category: FileCategory::Image,
    content_types: &["image/jpeg", "image/jpg", "image/gif", "image/png"],
    extensions: &[".jpeg", ".jpg", ".gif", ".png"],
};

pub static AUDIO_POLICY: FileTypePolicy = FileTypePolicy {
    category: FileCategory::Audio,
    content_types: &[
        "audio/flac",
        "audio/webm",
        "audio/mpegurl",
        "text/plain",
        "audio/mp4",
        "audio/mpeg",
        "audio/ogg",
        "audio/x-scpls",
        "audio/wav",
    ],
    extensions: &[
        ".flac", ".m3u", ".m3u8", ".m4a", ".m4b", ".mp3", ".ogg", ".opus", ".pls", ".wav",
    ],
};

pub static VIDEO_POLICY: FileTypePolicy = FileTypePolicy {
    category: FileCategory::Video,
    content_types: &[
        "video/mp4",
        "application/mp4",
        "application/x-mpegurl",
        "video/mp2t",
        "video/3gpp",
        "video/quicktime",
        "video/x-msvideo",
        "video/x-ms-wmv",
    ],
    extensions: &[
        ".mp4", ".m3u8", ".ts", ".3gp", ".mov", ".avi", ".wmv", ".ogv", ".m4a", ".m4p", ".m4b",
        ".m4r", ".m4v",
    ],
};

pub static SVG_POLICY: FileTypePolicy = FileTypePolicy {
    category: FileCategory::Svg,
    content_types: &[
        "image/svg+xml",
        "text/xml",
        "text/xml; charset=utf-8",
        "text/plain; charset=utf-8",
    ],
    extensions: &[".svg", ".svgz"],
};

pub static DOCUMENT_POLICY: FileTypePolicy = FileTypePolicy {
    category: FileCategory::Document,
    content_types: &[
        "application/zip",
        "application/msword",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.template",
        "application/vnd.ms-word.document.macroEnabled.12",
        "application/vnd.ms-word.template.macroEnabled.12",
    ],
    extensions: &[".doc", ".dot", ".docx", ".dotx", ".docm", ".dotm"],
};

pub static PDF_POLICY: FileTypePolicy = FileTypePolicy {
    category: FileCategory::Pdf,
    content_types: &[
        "application/pdf",
        "application/x-pdf",
        "application/acrobat",
        "applications/vnd.pdf",
        "text/pdf",
        "text/x-pdf",
    ],
    extensions: &[".pdf"],
};

/// Ordered allow-list of categories for one upload call.
///
/// Order matters: the classifier stops at the first category whose extension
/// set contains the file's extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedTypes(Vec<FileCategory>);

impl AllowedTypes {
    pub fn new(categories: Vec<FileCategory>) -> Self {
        let mut unique = Vec::with_capacity(categories.len());
        for category in categories {
            if !unique.contains(&category) {
                unique.push(category);
            }
        }
        AllowedTypes(unique)
    }

    pub fn only(category: FileCategory) -> Self {
        AllowedTypes(vec![category])
    }

    pub fn policies(&self) -> impl Iterator<Item = &'static FileTypePolicy> + '_ {
        self.0.iter().map(|category| category.policy())
    }

    pub fn categories(&self) -> &[FileCategory] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parses the pipe-separated form used by form handlers, e.g. `"image | pdf"`.
impl FromStr for AllowedTypes {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let categories = s
            .split('|')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(FileCategory::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        if categories.is_empty() {
            return Err(anyhow::anyhow!("At least one file type must be allowed"));
        }
        Ok(AllowedTypes::new(categories))
    }
}

impl From<FileCategory> for AllowedTypes {
    fn from(category: FileCategory) -> Self {
        AllowedTypes::only(category)
    }
}
