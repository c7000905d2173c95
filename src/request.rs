//! Analysis request builder.
//!
//! Turns uploaded files, clinical notes and a patient id into one Gemini
//! `generateContent` request: a single message whose first part is the
//! instruction text and whose remaining parts are the base64-encoded images.
//!
//! Only `image/*` files are sent. Documents (PDF, text, DICOM without an image
//! MIME type) are accepted by the upload surface but left out of the payload;
//! their names are reported in [`AnalysisRequest::excluded_files`].

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::GenerationConfig;

/// Placeholder used when no notes were entered
pub const NO_NOTES_PLACEHOLDER: &str = "No clinical notes provided.";

/// File content, either already in memory or read when the request is built
#[derive(Debug, Clone)]
enum FileContent {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

/// A file attached to a submission
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub mime_type: String,
    content: FileContent,
}

impl UploadedFile {
    pub fn from_bytes(name: &str, mime_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            content: FileContent::Bytes(bytes),
        }
    }

    /// Reference a file on disk. The MIME type is guessed from the extension
    /// and the content is read only when the request is built.
    pub fn from_path(path: &Path) -> Self {
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            mime_type,
            content: FileContent::Path(path.to_path_buf()),
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    fn read(&self) -> std::io::Result<Cow<'_, [u8]>> {
        match &self.content {
            FileContent::Bytes(bytes) => Ok(Cow::Borrowed(bytes)),
            FileContent::Path(path) => std::fs::read(path).map(Cow::Owned),
        }
    }
}

/// A file that could not be read or encoded
#[derive(Debug, thiserror::Error)]
#[error("Failed to convert '{file}' for upload: {source}")]
pub struct TranscodeError {
    pub file: String,
    #[source]
    pub source: std::io::Error,
}

// -- Wire types --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    InlineData(InlineData),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

/// Output of the builder
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub payload: GenerateContentRequest,
    /// Number of image parts in the payload
    pub image_count: usize,
    /// Names of attachments left out because they are not images
    pub excluded_files: Vec<String>,
}

impl AnalysisRequest {
    pub fn prompt(&self) -> Option<&str> {
        self.payload
            .contents
            .first()
            .and_then(|c| c.parts.first())
            .and_then(|p| match p {
                Part::Text(text) => Some(text.as_str()),
                Part::InlineData(_) => None,
            })
    }
}

/// Compose the instruction text
pub fn build_prompt(patient_id: &str, notes: &str) -> String {
    let notes = if notes.trim().is_empty() {
        NO_NOTES_PLACEHOLDER
    } else {
        notes.trim()
    };

    format!(
        "You are an expert medical diagnostic assistant analyzing medical data.\n\
         \n\
         Patient ID: {patient_id}\n\
         \n\
         Clinical Information:\n\
         {notes}\n\
         \n\
         Based on the provided images and clinical information, please analyze the medical data and provide:\n\
         1. Primary diagnosis with confidence score\n\
         2. Alternative diagnoses to consider\n\
         3. Key findings that support your diagnosis\n\
         4. Recommended follow-up tests or actions\n\
         5. Detailed explanation of your reasoning\n\
         \n\
         Maintain a professional, clinical tone and provide evidence-based assessments."
    )
}

/// Build the outbound request.
///
/// Fails as a whole if any image can't be read; no partial request is
/// returned.
pub fn build_request(
    files: &[UploadedFile],
    notes: &str,
    patient_id: &str,
    generation: &GenerationConfig,
) -> Result<AnalysisRequest, TranscodeError> {
    let mut parts = vec![Part::Text(build_prompt(patient_id, notes))];
    let mut excluded_files = Vec::new();

    for file in files {
        if !file.is_image() {
            debug!(file = %file.name, mime = %file.mime_type, "Excluding non-image attachment");
            excluded_files.push(file.name.clone());
            continue;
        }

        let bytes = file.read().map_err(|source| TranscodeError {
            file: file.name.clone(),
            source,
        })?;

        parts.push(Part::InlineData(InlineData {
            mime_type: file.mime_type.clone(),
            data: STANDARD.encode(bytes.as_ref()),
        }));
    }

    let image_count = parts.len() - 1;
    Ok(AnalysisRequest {
        payload: GenerateContentRequest {
            contents: vec![Content { parts }],
            generation_config: generation.clone(),
        },
        image_count,
        excluded_files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(name: &str) -> UploadedFile {
        UploadedFile::from_bytes(name, "image/png", vec![0x89, b'P', b'N', b'G'])
    }

    fn pdf(name: &str) -> UploadedFile {
        UploadedFile::from_bytes(name, "application/pdf", b"%PDF-1.7".to_vec())
    }

    #[test]
    fn test_prompt_contains_patient_and_notes() {
        let prompt = build_prompt("P-10234", "Cough for 5 days, fever");
        assert!(prompt.contains("Patient ID: P-10234"));
        assert!(prompt.contains("Cough for 5 days, fever"));
        assert!(!prompt.contains(NO_NOTES_PLACEHOLDER));
        for section in [
            "1. Primary diagnosis with confidence score",
            "2. Alternative diagnoses to consider",
            "3. Key findings",
            "4. Recommended follow-up",
            "5. Detailed explanation of your reasoning",
        ] {
            assert!(prompt.contains(section), "missing section: {}", section);
        }
    }

    #[test]
    fn test_empty_notes_use_placeholder() {
        let prompt = build_prompt("P-1", "");
        assert!(prompt.contains(NO_NOTES_PLACEHOLDER));

        let whitespace = build_prompt("P-1", "  \n ");
        assert!(whitespace.contains(NO_NOTES_PLACEHOLDER));
    }

    #[test]
    fn test_non_images_are_excluded() {
        let files = vec![png("chest.png"), pdf("labs.pdf"), png("lateral.png")];
        let request = build_request(&files, "", "P-1", &GenerationConfig::default()).unwrap();

        assert_eq!(request.payload.contents.len(), 1);
        let parts = &request.payload.contents[0].parts;
        assert_eq!(parts.len(), 3);
        assert!(matches!(parts[0], Part::Text(_)));
        assert_eq!(
            parts
                .iter()
                .filter(|p| matches!(p, Part::InlineData(_)))
                .count(),
            2
        );
        assert_eq!(request.image_count, 2);
        assert_eq!(request.excluded_files, vec!["labs.pdf".to_string()]);
    }

    #[test]
    fn test_only_documents_gives_text_only_request() {
        let request =
            build_request(&[pdf("report.pdf")], "notes", "P-1", &GenerationConfig::default())
                .unwrap();
        assert_eq!(request.image_count, 0);
        assert_eq!(request.payload.contents[0].parts.len(), 1);
    }

    #[test]
    fn test_image_is_base64_encoded() {
        let files = vec![UploadedFile::from_bytes("a.jpg", "image/jpeg", b"hello".to_vec())];
        let request = build_request(&files, "", "P-1", &GenerationConfig::default()).unwrap();

        match &request.payload.contents[0].parts[1] {
            Part::InlineData(data) => {
                assert_eq!(data.mime_type, "image/jpeg");
                assert_eq!(data.data, "aGVsbG8=");
            }
            other => panic!("expected inline data, got {:?}", other),
        }
    }

    #[test]
    fn test_wire_format() {
        let files = vec![png("chest.png")];
        let request = build_request(&files, "", "P-1", &GenerationConfig::default()).unwrap();
        let json = serde_json::to_value(&request.payload).unwrap();

        assert!(json["contents"][0]["parts"][0]["text"].is_string());
        assert_eq!(
            json["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/png"
        );
        assert!(json["contents"][0]["parts"][1]["inlineData"]["data"].is_string());
        assert_eq!(json["generationConfig"]["topK"], 40);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn test_unreadable_image_fails_whole_request() {
        let dir = tempfile::tempdir().unwrap();
        let missing = UploadedFile::from_path(&dir.path().join("gone.png"));
        assert!(missing.is_image());

        let files = vec![png("ok.png"), missing];
        let err = build_request(&files, "", "P-1", &GenerationConfig::default()).unwrap_err();
        assert_eq!(err.file, "gone.png");
        assert_eq!(err.source.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_unreadable_document_is_ignored() {
        // Excluded files are never read
        let dir = tempfile::tempdir().unwrap();
        let files = vec![png("ok.png"), UploadedFile::from_path(&dir.path().join("gone.pdf"))];
        let request = build_request(&files, "", "P-1", &GenerationConfig::default()).unwrap();
        assert_eq!(request.excluded_files, vec!["gone.pdf".to_string()]);
    }

    #[test]
    fn test_from_path_guesses_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.jpg");
        std::fs::write(&path, b"jpeg").unwrap();

        let file = UploadedFile::from_path(&path);
        assert_eq!(file.name, "scan.jpg");
        assert_eq!(file.mime_type, "image/jpeg");

        let unknown = UploadedFile::from_path(&dir.path().join("blob"));
        assert_eq!(unknown.mime_type, "application/octet-stream");
        assert!(!unknown.is_image());
    }

    #[test]
    fn test_prompt_accessor() {
        let request =
            build_request(&[png("a.png")], "", "P-77", &GenerationConfig::default()).unwrap();
        assert!(request.prompt().unwrap().contains("Patient ID: P-77"));
    }
}
