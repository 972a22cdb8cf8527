use serde::Serialize;

pub const ACCEPTED_MIMETYPES: &str = "acceptedMimetypes";
pub const MAX_FILESIZE: &str = "maxFilesize";

/// Receives field-level validation failures raised while saving.
pub trait ValidationSink: Send {
    fn error(&mut self, message: &str, ident: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    pub ident: String,
    pub message: String,
}

/// Default sink: keeps every failure in order.
#[derive(Debug, Default, Clone)]
pub struct ValidationErrors {
    failures: Vec<ValidationFailure>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }

    pub fn has(&self, ident: &str) -> bool {
        self.failures.iter().any(|f| f.ident == ident)
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl ValidationSink for ValidationErrors {
    fn error(&mut self, message: &str, ident: &str) {
        self.failures.push(ValidationFailure {
            ident: ident.to_string(),
            message: message.to_string(),
        });
    }
}
