//! Status vocabulary of a converter widget.
//!
//! Messages are carried as stable keys plus parameters; translating them is
//! the host's business. [`StatusMessage`]'s `Display` gives the English text
//! used by the CLI and in logs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a converter widget is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConversionStatus {
    /// Idle; a file may or may not be armed.
    #[default]
    Ready,
    /// The PDF is being sent to the server.
    Uploading,
    /// The server accepted the upload; the result is being finalised.
    Converting,
    /// A result is available.
    Success,
    /// The last attempt failed.
    Error,
    /// No usable file: either nothing was selected or the selection was rejected.
    NoFile,
}

impl ConversionStatus {
    /// `true` while a request is outstanding.
    pub fn is_busy(&self) -> bool {
        matches!(self, ConversionStatus::Uploading | ConversionStatus::Converting)
    }

    /// `true` for the states "convert another" leaves from.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConversionStatus::Success | ConversionStatus::Error | ConversionStatus::NoFile
        )
    }
}

/// Translation key of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKey {
    StatusReady,
    StatusUploading,
    StatusConverting,
    StatusSuccess,
    StatusError,
    StatusNoFile,
    InvalidFileType,
}

impl MessageKey {
    /// The key as used by translation tables.
    pub fn as_key(&self) -> &'static str {
        match self {
            MessageKey::StatusReady => "statusReady",
            MessageKey::StatusUploading => "statusUploading",
            MessageKey::StatusConverting => "statusConverting",
            MessageKey::StatusSuccess => "statusSuccess",
            MessageKey::StatusError => "statusError",
            MessageKey::StatusNoFile => "statusNoFile",
            MessageKey::InvalidFileType => "invalidFileType",
        }
    }

    /// Default English text.
    pub fn english(&self) -> &'static str {
        match self {
            MessageKey::StatusReady => "Ready to convert",
            MessageKey::StatusUploading => "Uploading",
            MessageKey::StatusConverting => "Converting",
            MessageKey::StatusSuccess => "Conversion complete",
            MessageKey::StatusError => "Conversion failed",
            MessageKey::StatusNoFile => "Please select a PDF file first",
            MessageKey::InvalidFileType => "Invalid file type. Please select a PDF file.",
        }
    }
}

/// The status line shown under a converter widget.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusMessage {
    /// `None` means the line is blank.
    pub key: Option<MessageKey>,
    /// Progress shown in parentheses while uploading/converting.
    pub progress: Option<u8>,
    /// Free text that replaces the keyed text (server error messages).
    pub detail: Option<String>,
}

impl StatusMessage {
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn keyed(key: MessageKey) -> Self {
        Self {
            key: Some(key),
            ..Self::default()
        }
    }

    pub fn with_progress(key: MessageKey, progress: u8) -> Self {
        Self {
            key: Some(key),
            progress: Some(progress),
            detail: None,
        }
    }

    /// A failure line; `detail` is shown verbatim.
    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            key: Some(MessageKey::StatusError),
            progress: None,
            detail: Some(detail.into()),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.key.is_none() && self.detail.is_none()
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref detail) = self.detail {
            return f.write_str(detail);
        }
        let Some(key) = self.key else {
            return Ok(());
        };
        match self.progress {
            Some(p) => write!(f, "{} ({}%)", key.english(), p),
            None => f.write_str(key.english()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_and_terminal() {
        assert!(ConversionStatus::Uploading.is_busy());
        assert!(ConversionStatus::Converting.is_busy());
        assert!(!ConversionStatus::Ready.is_busy());
        assert!(ConversionStatus::NoFile.is_terminal());
        assert!(!ConversionStatus::Uploading.is_terminal());
    }

    #[test]
    fn message_display() {
        assert_eq!(
            StatusMessage::with_progress(MessageKey::StatusUploading, 42).to_string(),
            "Uploading (42%)"
        );
        assert_eq!(
            StatusMessage::failure("OCR engine unavailable").to_string(),
            "OCR engine unavailable"
        );
        assert_eq!(StatusMessage::blank().to_string(), "");
        assert!(StatusMessage::blank().is_blank());
    }

    #[test]
    fn keys_match_translation_tables() {
        assert_eq!(MessageKey::StatusNoFile.as_key(), "statusNoFile");
        assert_eq!(MessageKey::InvalidFileType.as_key(), "invalidFileType");
    }

    #[test]
    fn status_serialises_camel_case() {
        assert_eq!(
            serde_json::to_string(&ConversionStatus::NoFile).unwrap(),
            "\"noFile\""
        );
    }
}
