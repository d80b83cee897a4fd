//! Type-based classification of files.
//!
//! A file's [`Category`] drives the `category` rule condition and the
//! `{category}` destination placeholder. Content sniffing (via `infer`) is
//! tried first; the extension is the fallback.
//!
//! ```
//! use tidybot::file_category::{Category, FileMapper};
//!
//! let mapper = FileMapper::default();
//! assert_eq!(mapper.categorize(Some("image/png"), None), Category::Image);
//! assert_eq!(mapper.categorize(None, Some("PDF")), Category::Document);
//! assert_eq!(mapper.categorize(None, None), Category::Other);
//! ```

use std::collections::HashMap;
use std::path::Path;

/// Broad file category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Image files (PNG, JPEG, GIF, ...)
    Image,
    /// Audio files (MP3, WAV, FLAC, ...)
    Audio,
    /// Video files (MP4, MKV, AVI, ...)
    Video,
    /// Text and word-processor documents, PDFs
    Document,
    /// Compressed archives and disk images
    Archive,
    /// Source code and structured text (Rust, Python, JSON, YAML, ...)
    Code,
    /// Spreadsheets and CSV
    Spreadsheet,
    /// Slide decks
    Presentation,
    /// Font files (TTF, OTF, WOFF, ...)
    Font,
    /// Anything not recognized
    Other,
}

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Category; 10] = [
        Category::Image,
        Category::Audio,
        Category::Video,
        Category::Document,
        Category::Archive,
        Category::Code,
        Category::Spreadsheet,
        Category::Presentation,
        Category::Font,
        Category::Other,
    ];

    /// Directory-style name used in templates and configuration.
    ///
    /// ```
    /// use tidybot::file_category::Category;
    ///
    /// assert_eq!(Category::Image.dir_name(), "images");
    /// assert_eq!(Category::Other.dir_name(), "other");
    /// ```
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Image => "images",
            Category::Audio => "audio",
            Category::Video => "videos",
            Category::Document => "documents",
            Category::Archive => "archives",
            Category::Code => "code",
            Category::Spreadsheet => "spreadsheets",
            Category::Presentation => "presentations",
            Category::Font => "fonts",
            Category::Other => "other",
        }
    }

    /// Parses a category name as written in a config file.
    ///
    /// Accepts the directory name (`images`) as well as the singular form
    /// (`image`), case-insensitively.
    pub fn from_name(name: &str) -> Option<Category> {
        let wanted = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|category| {
            let dir = category.dir_name();
            dir == wanted || dir.strip_suffix('s') == Some(wanted.as_str())
        })
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

const MIME_TABLE: &[(Category, &[&str])] = &[
    (
        Category::Image,
        &[
            "image/png",
            "image/jpeg",
            "image/gif",
            "image/webp",
            "image/svg+xml",
            "image/bmp",
            "image/tiff",
            "image/heic",
            "image/heif",
            "image/vnd.microsoft.icon",
        ],
    ),
    (
        Category::Audio,
        &[
            "audio/mpeg",
            "audio/x-wav",
            "audio/wav",
            "audio/ogg",
            "audio/x-flac",
            "audio/flac",
            "audio/aac",
            "audio/x-m4a",
            "audio/m4a",
        ],
    ),
    (
        Category::Video,
        &[
            "video/mp4",
            "video/mpeg",
            "video/quicktime",
            "video/x-msvideo",
            "video/x-matroska",
            "video/webm",
            "video/x-flv",
            "video/3gpp",
        ],
    ),
    (
        Category::Document,
        &[
            "application/pdf",
            "text/plain",
            "application/msword",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "application/rtf",
            "application/vnd.oasis.opendocument.text",
            "application/epub+zip",
        ],
    ),
    (
        Category::Archive,
        &[
            "application/zip",
            "application/vnd.rar",
            "application/x-rar-compressed",
            "application/x-7z-compressed",
            "application/x-tar",
            "application/gzip",
            "application/x-bzip2",
            "application/x-xz",
        ],
    ),
    (
        Category::Code,
        &["application/wasm", "application/x-executable", "text/x-shellscript"],
    ),
    (
        Category::Spreadsheet,
        &[
            "text/csv",
            "application/vnd.ms-excel",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "application/vnd.oasis.opendocument.spreadsheet",
        ],
    ),
    (
        Category::Presentation,
        &[
            "application/vnd.ms-powerpoint",
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            "application/vnd.oasis.opendocument.presentation",
        ],
    ),
    (
        Category::Font,
        &["font/ttf", "font/otf", "font/woff", "font/woff2"],
    ),
];

const EXTENSION_TABLE: &[(Category, &[&str])] = &[
    (
        Category::Image,
        &["png", "jpg", "jpeg", "gif", "webp", "svg", "bmp", "tiff", "ico", "heic"],
    ),
    (
        Category::Audio,
        &["mp3", "wav", "ogg", "flac", "aac", "m4a", "wma"],
    ),
    (
        Category::Video,
        &["mp4", "mkv", "avi", "mov", "flv", "wmv", "webm", "3gp"],
    ),
    (
        Category::Document,
        &["pdf", "txt", "doc", "docx", "html", "htm", "md", "rtf", "odt", "epub"],
    ),
    (
        Category::Archive,
        &["zip", "rar", "7z", "tar", "gz", "bz2", "xz", "tgz"],
    ),
    (
        Category::Code,
        &[
            "py", "java", "c", "cpp", "h", "hpp", "js", "ts", "rs", "go", "sh", "json", "xml",
            "yaml", "yml", "toml",
        ],
    ),
    (Category::Spreadsheet, &["csv", "xls", "xlsx", "ods"]),
    (Category::Presentation, &["ppt", "pptx", "odp", "key"]),
    (Category::Font, &["ttf", "otf", "woff", "woff2"]),
];

/// Maps MIME types and extensions to categories.
#[derive(Debug, Clone)]
pub struct FileMapper {
    mime_map: HashMap<String, Category>,
    extension_map: HashMap<String, Category>,
}

impl FileMapper {
    /// A mapper preloaded with the built-in MIME and extension tables.
    pub fn new() -> Self {
        let mut mapper = Self {
            mime_map: HashMap::new(),
            extension_map: HashMap::new(),
        };
        for (category, mimes) in MIME_TABLE {
            for mime in *mimes {
                mapper.add_mime_mapping(mime, *category);
            }
        }
        for (category, extensions) in EXTENSION_TABLE {
            for ext in *extensions {
                mapper.add_extension_mapping(ext, *category);
            }
        }
        mapper
    }

    /// Adds or replaces the category for a MIME type (case-insensitive).
    pub fn add_mime_mapping(&mut self, mime: &str, category: Category) {
        self.mime_map.insert(mime.to_lowercase(), category);
    }

    /// Adds or replaces the category for an extension; a leading dot is
    /// ignored.
    pub fn add_extension_mapping(&mut self, ext: &str, category: Category) {
        self.extension_map
            .insert(ext.trim_start_matches('.').to_lowercase(), category);
    }

    /// Looks up a MIME type, `None` if it is unknown.
    pub fn mime_to_category(&self, mime_type: &str) -> Option<Category> {
        self.mime_map.get(&mime_type.to_lowercase()).copied()
    }

    /// Looks up an extension, with or without its leading dot.
    pub fn extension_to_category(&self, ext: &str) -> Option<Category> {
        self.extension_map
            .get(&ext.trim_start_matches('.').to_lowercase())
            .copied()
    }

    /// MIME type first, extension second, [`Category::Other`] last.
    pub fn categorize(&self, mime_type: Option<&str>, ext: Option<&str>) -> Category {
        if let Some(mime) = mime_type
            && let Some(category) = self.mime_to_category(mime)
        {
            return category;
        }

        if let Some(extension) = ext
            && let Some(category) = self.extension_to_category(extension)
        {
            return category;
        }

        Category::Other
    }

    /// Classifies a file on disk.
    ///
    /// Only the leading bytes are read for content sniffing; unreadable files
    /// fall back to their extension.
    pub fn detect(&self, path: &Path) -> Category {
        let mime = infer::get_from_path(path)
            .ok()
            .flatten()
            .map(|kind| kind.mime_type());
        let ext = path.extension().and_then(|e| e.to_str());
        self.categorize(mime, ext)
    }
}

impl Default for FileMapper {
    fn default() -> Self {
        Self::new()
    }
}
