//! Document loading for the two supported source formats.
//!
//! PDF files are read page by page with `lopdf`; DOCX files are opened as a
//! zip archive and the body text is taken from `word/document.xml`. Both
//! produce an ordered list of [`Page`]s for the chunker.

use async_trait::async_trait;
use regex::Regex;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while loading a document.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unsupported format: {} (only PDF and DOCX are supported)", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LoaderError>;

/// A run of raw text from a source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub text: String,
    /// 1-based page number; DOCX bodies are reported as a single page
    pub page_number: u32,
}

/// Supported document formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }
}

/// Source of raw document text.
///
/// The session only depends on this trait, so ingestion can be driven from
/// anything that yields pages.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn load(&self, path: &Path) -> Result<Vec<Page>>;
}

/// Loads PDF and DOCX files from the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct FileLoader;

impl FileLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentSource for FileLoader {
    async fn load(&self, path: &Path) -> Result<Vec<Page>> {
        if !tokio::fs::try_exists(path).await? {
            return Err(LoaderError::NotFound(path.to_path_buf()));
        }

        let format = DocumentFormat::from_path(path)
            .ok_or_else(|| LoaderError::UnsupportedFormat(path.to_path_buf()))?;

        let owned = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || match format {
            DocumentFormat::Pdf => load_pdf(&owned),
            DocumentFormat::Docx => load_docx(&owned),
        })
        .await
        .map_err(|e| LoaderError::Parse {
            path: path.to_path_buf(),
            message: format!("loader task failed: {}", e),
        })??;

        debug!(path = %path.display(), pages = pages.len(), "Document loaded");
        Ok(pages)
    }
}

fn load_pdf(path: &Path) -> Result<Vec<Page>> {
    let doc = lopdf::Document::load(path).map_err(|e| LoaderError::Parse {
        path: path.to_path_buf(),
        message: format!("Failed to load PDF: {}", e),
    })?;

    let mut pages = Vec::new();
    for page_number in doc.get_pages().keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) => pages.push(Page {
                text,
                page_number: *page_number,
            }),
            Err(e) => {
                warn!(page = page_number, error = %e, "Failed to extract text from page, skipping");
            }
        }
    }

    Ok(pages)
}

fn load_docx(path: &Path) -> Result<Vec<Page>> {
    let parse_err = |message: String| LoaderError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| parse_err(format!("not a DOCX archive: {}", e)))?;
    let mut entry = archive
        .by_name("word/document.xml")
        .map_err(|e| parse_err(format!("missing word/document.xml: {}", e)))?;

    let mut xml = String::new();
    entry.read_to_string(&mut xml)?;

    Ok(vec![Page {
        text: docx_xml_to_text(&xml),
        page_number: 1,
    }])
}

fn paragraph_end() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"</w:p>|<w:br\s*/>|<w:cr\s*/>").expect("valid regex"))
}

fn text_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab\s*/>").expect("valid regex"))
}

/// Flattens WordprocessingML into plain text, one line per paragraph.
fn docx_xml_to_text(xml: &str) -> String {
    let mut lines = Vec::new();

    for paragraph in paragraph_end().split(xml) {
        let mut line = String::new();
        for run in text_run().captures_iter(paragraph) {
            match run.get(1) {
                Some(text) => line.push_str(&decode_entities(text.as_str())),
                None => line.push('\t'),
            }
        }
        lines.push(line);
    }

    // Drop the empty remainder after the last paragraph.
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}

fn entity() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&(#[xX][0-9A-Fa-f]+|#[0-9]+|lt|gt|quot|apos|amp);").expect("valid regex"))
}

/// Decodes the predefined XML entities and numeric character references in
/// one pass. References to invalid code points are left as written.
fn decode_entities(text: &str) -> String {
    entity()
        .replace_all(text, |caps: &regex::Captures| {
            let name = &caps[1];
            let decoded = match name {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "amp" => Some('&'),
                _ => {
                    let code = match name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => name[1..].parse::<u32>().ok(),
                    };
                    code.and_then(char::from_u32)
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    /// Writes a minimal DOCX whose body has one paragraph per entry.
    pub(crate) fn write_docx(path: &Path, paragraphs: &[&str]) {
        let mut body = String::new();
        for p in paragraphs {
            let escaped = p.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;");
            body.push_str(&format!(
                r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
                escaped
            ));
        }
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );

        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(DocumentFormat::from_path(Path::new("law.pdf")), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_path(Path::new("LAW.DOCX")), Some(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::from_path(Path::new("law.txt")), None);
        assert_eq!(DocumentFormat::from_path(Path::new("law")), None);
    }

    #[test]
    fn test_docx_xml_to_text() {
        let xml = r#"<w:body><w:p><w:r><w:t>Article 1</w:t></w:r></w:p><w:p><w:r><w:t xml:space="preserve">Scope &amp; </w:t></w:r><w:r><w:t>purpose</w:t></w:r></w:p></w:body>"#;
        assert_eq!(docx_xml_to_text(xml), "Article 1\nScope & purpose");
    }

    #[test]
    fn test_numeric_character_references() {
        let xml = "<w:p><w:r><w:t>Đi&#7873;u 1 &#x110;i&#x1EC1;u 2</w:t></w:r></w:p>";
        assert_eq!(docx_xml_to_text(xml), "Điều 1 Điều 2");
    }

    #[test]
    fn test_entities_decode_once() {
        assert_eq!(decode_entities("&amp;lt; &#38; &#xD800; &nbsp;"), "&lt; & &#xD800; &nbsp;");
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = FileLoader::new()
            .load(Path::new("/no/such/dir/law.docx"))
            .await
            .unwrap_err();
        assert!(matches!(err, LoaderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_load_unsupported_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("law.txt");
        std::fs::write(&path, "Article 1 text").unwrap();

        let err = FileLoader::new().load(&path).await.unwrap_err();
        assert!(matches!(err, LoaderError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn test_load_docx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("law.docx");
        write_docx(&path, &["Article 1. Scope", "This law governs <identity> cards."]);

        let pages = FileLoader::new().load(&path).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_number, 1);
        assert_eq!(pages[0].text, "Article 1. Scope\nThis law governs <identity> cards.");
    }

    #[tokio::test]
    async fn test_load_corrupt_docx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, b"not a zip archive").unwrap();

        let err = FileLoader::new().load(&path).await.unwrap_err();
        assert!(matches!(err, LoaderError::Parse { .. }));
    }
}
