use tracing::warn;

use crate::application::services::{ValidationSink, ACCEPTED_MIMETYPES, MAX_FILESIZE};

/// Leading bytes read from disk when sniffing a stored file.
pub const SNIFF_LENGTH: usize = 8192;

const OCTET_STREAM: &str = "application/octet-stream";

/// Content type inferred from bytes, plus its canonical extension when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sniffed {
    pub mimetype: String,
    pub extension: Option<String>,
}

/// Infers a MIME type from magic bytes.
///
/// Unrecognized content is reported as `text/plain` when it is NUL-free
/// UTF-8, `application/x-empty` when empty, `application/octet-stream`
/// otherwise.
pub fn sniff_mimetype(bytes: &[u8]) -> Sniffed {
    if let Some(kind) = infer::get(bytes) {
        return Sniffed {
            mimetype: kind.mime_type().to_string(),
            extension: Some(kind.extension().to_string()),
        };
    }

    if bytes.is_empty() {
        return Sniffed {
            mimetype: "application/x-empty".to_string(),
            extension: None,
        };
    }

    if std::str::from_utf8(bytes).is_ok() && !bytes.contains(&0) {
        Sniffed {
            mimetype: "text/plain".to_string(),
            extension: Some("txt".to_string()),
        }
    } else {
        Sniffed {
            mimetype: OCTET_STREAM.to_string(),
            extension: None,
        }
    }
}

/// MIME and size checks for one candidate.
#[derive(Debug, Clone)]
pub struct ValidationGate {
    accepted_mimetypes: Vec<String>,
    max_filesize: u64,
}

impl ValidationGate {
    /// `max_filesize` of zero disables the size check.
    pub fn new(accepted_mimetypes: Vec<String>, max_filesize: u64) -> Self {
        Self {
            accepted_mimetypes,
            max_filesize,
        }
    }

    pub fn validate_accepted_mimetypes(
        &self,
        mimetype: &str,
        sink: &mut dyn ValidationSink,
    ) -> bool {
        if self.accepted_mimetypes.is_empty() {
            return true;
        }

        let valid = self.accepted_mimetypes.iter().any(|m| m == mimetype);
        if !valid {
            sink.error("Accepted mimetypes error", ACCEPTED_MIMETYPES);
        }
        valid
    }

    pub fn validate_max_filesize(&self, size: u64, sink: &mut dyn ValidationSink) -> bool {
        if self.max_filesize == 0 {
            return true;
        }

        let valid = size <= self.max_filesize;
        if !valid {
            sink.error("Max filesize error", MAX_FILESIZE);
        }
        valid
    }

    /// Runs the MIME check, then the size check; stops at the first failure.
    pub fn check(&self, mimetype: &str, size: u64, sink: &mut dyn ValidationSink) -> bool {
        let valid = self.validate_accepted_mimetypes(mimetype, sink)
            && self.validate_max_filesize(size, sink);
        if !valid {
            warn!(
                mimetype = %mimetype,
                size,
                max_filesize = self.max_filesize,
                "Rejected upload candidate"
            );
        }
        valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::ValidationErrors;

    const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];

    #[test]
    fn sniffs_magic_bytes_and_text() {
        assert_eq!(sniff_mimetype(PNG_MAGIC).mimetype, "image/png");
        assert_eq!(sniff_mimetype(PNG_MAGIC).extension.as_deref(), Some("png"));
        assert_eq!(sniff_mimetype(JPEG_MAGIC).mimetype, "image/jpeg");
        assert_eq!(sniff_mimetype(b"hello").mimetype, "text/plain");
        assert_eq!(sniff_mimetype(&[0, 159, 146, 150]).mimetype, OCTET_STREAM);
        assert_eq!(sniff_mimetype(b"").mimetype, "application/x-empty");
    }

    #[test]
    fn rejects_mimetypes_outside_the_accepted_set() {
        let gate = ValidationGate::new(vec!["image/png".into()], 0);
        let mut errors = ValidationErrors::new();

        assert!(!gate.check("image/jpeg", 10, &mut errors));
        assert!(errors.has(ACCEPTED_MIMETYPES));
        assert!(!errors.has(MAX_FILESIZE));
    }

    #[test]
    fn empty_accepted_set_passes_everything() {
        let gate = ValidationGate::new(Vec::new(), 0);
        let mut errors = ValidationErrors::new();

        assert!(gate.check("application/x-msdownload", u64::MAX, &mut errors));
        assert!(errors.is_empty());
    }

    #[test]
    fn enforces_the_size_ceiling() {
        let gate = ValidationGate::new(Vec::new(), 1024);
        let mut errors = ValidationErrors::new();

        assert!(gate.check("image/png", 1024, &mut errors));
        assert!(!gate.check("image/png", 2048, &mut errors));
        assert!(errors.has(MAX_FILESIZE));
        assert_eq!(errors.failures().len(), 1);
    }
}
