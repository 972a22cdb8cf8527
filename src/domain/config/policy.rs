use serde::{Deserialize, Serialize};
use thiserror::Error;

const SIZE_UNITS: &str = "bkmgtpezy";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SizeParseError {
    #[error("Invalid size numeral in '{0}'")]
    InvalidNumber(String),

    #[error("Unknown size unit in '{0}'")]
    InvalidUnit(String),
}

/// Parses an ini-style size such as `512`, `128M` or `2g` into bytes.
///
/// The numeral is optional and may carry a decimal part. The unit is one of
/// `b k m g t p e z y` (case-insensitive), each step worth 1024 of the
/// previous one, and may be followed by a redundant `b`/`ib` suffix.
pub fn parse_ini_size(raw: &str) -> Result<u64, SizeParseError> {
    let value = raw.trim();
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (numeral, unit) = (&value[..split], value[split..].trim());

    let number = if numeral.is_empty() {
        0.0
    } else {
        numeral
            .parse::<f64>()
            .map_err(|_| SizeParseError::InvalidNumber(raw.to_string()))?
    };

    let exponent = match unit.chars().next() {
        None => 0,
        Some(letter) => {
            let suffix = unit[letter.len_utf8()..].to_ascii_lowercase();
            if !(suffix.is_empty() || suffix == "b" || suffix == "ib") {
                return Err(SizeParseError::InvalidUnit(raw.to_string()));
            }
            SIZE_UNITS
                .find(letter.to_ascii_lowercase())
                .ok_or_else(|| SizeParseError::InvalidUnit(raw.to_string()))?
        }
    };

    // `as` saturates, so the largest units clamp to u64::MAX.
    Ok((number * 1024f64.powi(exponent as i32)).round() as u64)
}

/// Which platform directive produced the effective ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeDirective {
    PostMaxSize,
    UploadMaxFilesize,
}

impl SizeDirective {
    pub fn name(&self) -> &'static str {
        match self {
            SizeDirective::PostMaxSize => "post_max_size",
            SizeDirective::UploadMaxFilesize => "upload_max_filesize",
        }
    }
}

/// Request-wide and per-file ceilings imposed by the hosting platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformLimits {
    #[serde(rename = "postMaxSize")]
    pub post_max_size: String,
    #[serde(rename = "uploadMaxFilesize")]
    pub upload_max_filesize: String,
}

impl Default for PlatformLimits {
    fn default() -> Self {
        Self {
            post_max_size: "8M".to_string(),
            upload_max_filesize: "2M".to_string(),
        }
    }
}

impl PlatformLimits {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            post_max_size: std::env::var("POST_MAX_SIZE").unwrap_or(defaults.post_max_size),
            upload_max_filesize: std::env::var("UPLOAD_MAX_FILESIZE")
                .unwrap_or(defaults.upload_max_filesize),
        }
    }

    /// The lesser of the two ceilings, with the directive that produced it.
    pub fn ceiling(&self) -> Result<(u64, SizeDirective), SizeParseError> {
        let post = parse_ini_size(&self.post_max_size)?;
        let upload = parse_ini_size(&self.upload_max_filesize)?;

        if post < upload {
            Ok((post, SizeDirective::PostMaxSize))
        } else {
            Ok((upload, SizeDirective::UploadMaxFilesize))
        }
    }
}

/// MIME and size constraints for one save operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationPolicy {
    #[serde(rename = "acceptedMimetypes", default)]
    pub accepted_mimetypes: Vec<String>,
    #[serde(rename = "maxFilesize", default)]
    pub max_filesize: Option<u64>,
}

impl ValidationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accepted_mimetypes<I, S>(mut self, mimetypes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_mimetypes = mimetypes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_filesize(mut self, bytes: u64) -> Self {
        self.max_filesize = Some(bytes);
        self
    }

    pub fn with_max_filesize_str(mut self, size: &str) -> Result<Self, SizeParseError> {
        self.max_filesize = Some(parse_ini_size(size)?);
        Ok(self)
    }

    /// The ceiling to enforce: the explicit one, or the platform's when unset.
    pub fn effective_max_filesize(&self, limits: &PlatformLimits) -> Result<u64, SizeParseError> {
        match self.max_filesize {
            Some(size) => Ok(size),
            None => limits.ceiling().map(|(size, _)| size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ini_sizes() {
        assert_eq!(parse_ini_size("1M"), Ok(1_048_576));
        assert_eq!(parse_ini_size("2G"), Ok(2_147_483_648));
        assert_eq!(parse_ini_size("512"), Ok(512));
        assert_eq!(parse_ini_size("128m"), Ok(134_217_728));
        assert_eq!(parse_ini_size("1.5K"), Ok(1536));
        assert_eq!(parse_ini_size("10b"), Ok(10));
        assert_eq!(parse_ini_size("64MB"), Ok(67_108_864));
        assert_eq!(parse_ini_size(""), Ok(0));
    }

    #[test]
    fn huge_units_saturate() {
        assert_eq!(parse_ini_size("1Y"), Ok(u64::MAX));
    }

    #[test]
    fn rejects_unknown_units() {
        assert!(matches!(
            parse_ini_size("12Q"),
            Err(SizeParseError::InvalidUnit(_))
        ));
        assert!(matches!(
            parse_ini_size("1.2.3"),
            Err(SizeParseError::InvalidNumber(_))
        ));
    }

    #[test]
    fn platform_ceiling_takes_the_lesser_directive() {
        let limits = PlatformLimits {
            post_max_size: "8M".into(),
            upload_max_filesize: "2M".into(),
        };
        assert_eq!(
            limits.ceiling(),
            Ok((2_097_152, SizeDirective::UploadMaxFilesize))
        );

        let limits = PlatformLimits {
            post_max_size: "1M".into(),
            upload_max_filesize: "2M".into(),
        };
        let (size, directive) = limits.ceiling().unwrap();
        assert_eq!(size, 1_048_576);
        assert_eq!(directive.name(), "post_max_size");
    }

    #[test]
    fn explicit_ceiling_wins_over_platform() {
        let limits = PlatformLimits::default();
        let policy = ValidationPolicy::new().with_max_filesize(0);
        assert_eq!(policy.effective_max_filesize(&limits), Ok(0));

        let policy = ValidationPolicy::new();
        assert_eq!(policy.effective_max_filesize(&limits), Ok(2_097_152));
    }
}
