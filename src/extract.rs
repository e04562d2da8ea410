use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use thiserror::Error;
use tracing::{debug, error};

const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
/// Main story of a word-processing package.
const DOCX_BODY_PART: &str = "word/document.xml";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported document type: {0}")]
    Unsupported(String),
    #[error("could not read pdf: {0}")]
    Pdf(String),
    #[error("could not read docx: {0}")]
    Docx(String),
    #[error("document contains no text")]
    Empty,
    #[error("extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    PlainText,
}

impl DocumentFormat {
    /// Pick a format from the upload's content type, falling back to the file extension when the
    /// client sent a generic type.
    pub fn detect(content_type: Option<&str>, filename: Option<&str>) -> Result<Self, ExtractError> {
        let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
        match content_type.split(';').next().unwrap_or_default().trim() {
            "application/pdf" => return Ok(DocumentFormat::Pdf),
            DOCX_CONTENT_TYPE => return Ok(DocumentFormat::Docx),
            "text/plain" => return Ok(DocumentFormat::PlainText),
            "" | "application/octet-stream" => {}
            other => return Err(ExtractError::Unsupported(other.to_string())),
        }

        let extension = filename
            .and_then(|f| f.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            "txt" => Ok(DocumentFormat::PlainText),
            _ => Err(ExtractError::Unsupported(
                filename.unwrap_or("unnamed upload").to_string(),
            )),
        }
    }
}

/// Pull plain text out of an uploaded document.
pub async fn extract_text(bytes: Vec<u8>, format: DocumentFormat) -> Result<String, ExtractError> {
    let text = match format {
        DocumentFormat::PlainText => String::from_utf8_lossy(&bytes).into_owned(),
        // pdf parsing is cpu bound
        DocumentFormat::Pdf => tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&bytes).map_err(|e| {
                error!(error=%e, "failed to extract pdf text");
                ExtractError::Pdf(e.to_string())
            })
        })
        .await??,
        DocumentFormat::Docx => tokio::task::spawn_blocking(move || {
            docx_text(&bytes).map_err(|e| {
                error!(error=%e, "failed to extract docx text");
                e
            })
        })
        .await??,
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(ExtractError::Empty);
    }
    debug!(chars = text.len(), ?format, "extracted document text");
    Ok(text)
}

/// Paragraph text of a .docx package, one line per paragraph.
fn docx_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Docx(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY_PART)
        .map_err(|e| ExtractError::Docx(e.to_string()))?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;

    let mut reader = Reader::from_str(&xml);
    let mut text = String::new();
    let mut in_run_text = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_run_text = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_run_text = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" | b"w:p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_run_text => {
                let unescaped = t.unescape().map_err(|e| ExtractError::Docx(e.to_string()))?;
                text.push_str(&unescaped);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
    }
    Ok(text)
}
