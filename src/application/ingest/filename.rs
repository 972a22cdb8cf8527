use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Local, TimeZone};
use uuid::Uuid;

use crate::{
    application::error::IngestError,
    domain::models::{attribute::AttributeConfig, file::PathParts},
};

const BLOCKLIST: [char; 15] = [
    '/', '\\', '\0', '*', ':', '?', '"', '<', '>', '|', '#', '&', '!', '`', ' ',
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H-%M-%S";

/// Produces the short token appended to colliding filenames.
pub type TokenSource = Arc<dyn Fn() -> String + Send + Sync>;

pub fn default_token_source() -> TokenSource {
    Arc::new(|| {
        let mut token = Uuid::new_v4().simple().to_string();
        token.truncate(13);
        token
    })
}

/// Replaces blocked characters with `_` and strips leading dots.
pub fn sanitize_filename(filename: &str) -> String {
    let replaced: String = filename
        .chars()
        .map(|c| if BLOCKLIST.contains(&c) { '_' } else { c })
        .collect();
    replaced.trim_start_matches('.').to_string()
}

/// `<label> <YYYY-MM-DD HH-MM-SS>[.<extension>]`, stamped with local time.
pub fn generate_filename(label: &str, extension: Option<&str>) -> String {
    generate_filename_at(label, extension, &Local::now())
}

pub fn generate_filename_at<Tz: TimeZone>(
    label: &str,
    extension: Option<&str>,
    at: &DateTime<Tz>,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let label = label.replace(['/', '\\', '\0'], "_");
    let filename = format!("{} {}", label, at.format(TIMESTAMP_FORMAT));

    match extension {
        Some(ext) if !ext.is_empty() => format!("{}.{}", filename, ext),
        _ => filename,
    }
}

/// Appends `-<token>` to the stem, keeping the extension.
pub fn unique_filename(filename: &str, token: &str) -> String {
    let parts = PathParts::parse(filename);
    parts.with_stem(&format!("{}-{}", parts.filename, token))
}

/// Derives rename tokens from the parsed source path and the attribute.
pub type RenameArgsFn = dyn Fn(&PathParts, &AttributeConfig) -> BTreeMap<String, String>;

/// Caller-supplied tokens that take precedence over the defaults.
pub enum RenameArgs {
    Static(BTreeMap<String, String>),
    Derived(Box<RenameArgsFn>),
}

impl RenameArgs {
    fn resolve(&self, parts: &PathParts, attribute: &AttributeConfig) -> BTreeMap<String, String> {
        match self {
            RenameArgs::Static(map) => map.clone(),
            RenameArgs::Derived(derive) => derive(parts, attribute),
        }
    }
}

fn token_key(key: &str) -> String {
    if key.starts_with("{{") && key.ends_with("}}") {
        key.to_string()
    } else {
        format!("{{{{{}}}}}", key)
    }
}

fn rename_tokens(
    parts: &PathParts,
    attribute: &AttributeConfig,
    args: Option<&RenameArgs>,
) -> Result<BTreeMap<String, String>, IngestError> {
    if parts.basename.is_empty() {
        return Err(IngestError::InvalidRenameTarget(
            "The basename is missing from the target".to_string(),
        ));
    }
    if parts.filename.is_empty() {
        return Err(IngestError::InvalidRenameTarget(
            "The filename is missing from the target".to_string(),
        ));
    }

    let mut tokens = BTreeMap::from([
        ("{{property}}".to_string(), attribute.ident.clone()),
        ("{{label}}".to_string(), attribute.label.clone()),
        (
            "{{extension}}".to_string(),
            parts.extension.clone().unwrap_or_default(),
        ),
        ("{{basename}}".to_string(), parts.basename.clone()),
        ("{{filename}}".to_string(), parts.filename.clone()),
    ]);

    if let Some(args) = args {
        for (key, value) in args.resolve(parts, attribute) {
            tokens.insert(token_key(&key), value);
        }
    }

    Ok(tokens)
}

/// Single-pass substitution; replaced text is never rescanned.
fn substitute(pattern: &str, tokens: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        let replaced = rest
            .find("}}")
            .and_then(|end| tokens.get(&rest[..end + 2]).map(|value| (end + 2, value)));

        match replaced {
            Some((len, value)) => {
                out.push_str(value);
                rest = &rest[len..];
            }
            None => {
                out.push('{');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn leftover_tokens(rendered: &str) -> Vec<String> {
    let mut leftovers = Vec::new();
    let mut rest = rendered;

    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                leftovers.push(after[..end].trim().to_string());
                rest = &after[end + 2..];
            }
            None => {
                leftovers.push(after.trim().to_string());
                break;
            }
        }
    }

    leftovers
}

/// Renders `pattern` for the file at `from`, replacing only its last component.
///
/// Nothing is renamed on disk.
pub fn render_rename_pattern(
    from: &str,
    pattern: &str,
    attribute: &AttributeConfig,
    args: Option<&RenameArgs>,
) -> Result<String, IngestError> {
    let parts = PathParts::parse(from);
    let tokens = rename_tokens(&parts, attribute, args)?;

    let rendered = substitute(pattern, &tokens);
    if rendered.contains("{{") {
        return Err(IngestError::UnresolvedRenameToken(leftover_tokens(&rendered)));
    }

    Ok(match parts.dirname.as_str() {
        "" => rendered,
        "/" => format!("/{}", rendered),
        dir => format!("{}/{}", dir, rendered),
    })
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;

    fn attribute() -> AttributeConfig {
        AttributeConfig::new("hero_image", "Hero image")
    }

    #[test]
    fn sanitizes_blocked_characters_and_hidden_prefix() {
        assert_eq!(sanitize_filename("my file?.png"), "my_file_.png");
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename("...hidden"), "hidden");
        assert_eq!(sanitize_filename("a\0b#c&d!e`f"), "a_b_c_d_e_f");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for input in ["..a b", "x:y|z", ". .dot", "plain.txt", "\\\\server\\share"] {
            let once = sanitize_filename(input);
            assert_eq!(sanitize_filename(&once), once);
        }
    }

    #[test]
    fn default_filename_uses_label_and_timestamp() {
        let at = Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(2024, 3, 9)
                .unwrap()
                .and_hms_opt(14, 5, 7)
                .unwrap(),
        );
        assert_eq!(
            generate_filename_at("Hero image", Some("png"), &at),
            "Hero image 2024-03-09 14-05-07.png"
        );
        assert_eq!(
            generate_filename_at("a/b", None, &at),
            "a_b 2024-03-09 14-05-07"
        );
    }

    #[test]
    fn unique_filename_keeps_extension() {
        assert_eq!(unique_filename("photo.jpg", "abc"), "photo-abc.jpg");
        assert_eq!(unique_filename("README", "abc"), "README-abc");
        assert_ne!(
            unique_filename("photo.jpg", &default_token_source()()),
            unique_filename("photo.jpg", &default_token_source()())
        );
    }

    #[test]
    fn renders_default_tokens() {
        let rendered = render_rename_pattern(
            "uploads/photo.jpg",
            "{{filename}}-v2.{{extension}}",
            &attribute(),
            None,
        )
        .unwrap();
        assert_eq!(rendered, "uploads/photo-v2.jpg");

        let rendered =
            render_rename_pattern("photo.jpg", "{{property}}_{{basename}}", &attribute(), None)
                .unwrap();
        assert_eq!(rendered, "hero_image_photo.jpg");
    }

    #[test]
    fn static_overrides_take_precedence() {
        let args = RenameArgs::Static(BTreeMap::from([
            ("filename".to_string(), "cover".to_string()),
            ("{{size}}".to_string(), "large".to_string()),
        ]));
        let rendered = render_rename_pattern(
            "/srv/photo.jpg",
            "{{filename}}@{{size}}.{{extension}}",
            &attribute(),
            Some(&args),
        )
        .unwrap();
        assert_eq!(rendered, "/srv/cover@large.jpg");
    }

    #[test]
    fn derived_overrides_see_path_parts() {
        let args = RenameArgs::Derived(Box::new(|parts: &PathParts, attribute: &AttributeConfig| {
            BTreeMap::from([(
                "slug".to_string(),
                format!("{}-{}", attribute.ident, parts.filename.to_lowercase()),
            )])
        }));
        let rendered =
            render_rename_pattern("img/Photo.PNG", "{{slug}}.png", &attribute(), Some(&args))
                .unwrap();
        assert_eq!(rendered, "img/hero_image-photo.png");
    }

    #[test]
    fn unresolved_tokens_are_reported() {
        let err = render_rename_pattern("photo.jpg", "{{missing}}", &attribute(), None)
            .unwrap_err();
        match err {
            IngestError::UnresolvedRenameToken(tokens) => assert_eq!(tokens, vec!["missing"]),
            other => panic!("unexpected error: {other}"),
        }

        let err = render_rename_pattern("photo.jpg", "{{ a }}-{{b}}", &attribute(), None)
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::UnresolvedRenameToken(ref t) if t == &vec!["a".to_string(), "b".to_string()]
        ));
    }

    #[test]
    fn rejects_targets_without_a_filename() {
        assert!(matches!(
            render_rename_pattern(".htaccess", "x", &attribute(), None),
            Err(IngestError::InvalidRenameTarget(_))
        ));
    }
}
