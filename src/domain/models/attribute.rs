use serde::{Deserialize, Serialize};

/// The slice of the owning attribute's configuration the engine reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeConfig {
    pub ident: String,
    pub label: String,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub l10n: bool,
    #[serde(default)]
    pub locales: Vec<String>,
}

impl AttributeConfig {
    pub fn new(ident: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            ident: ident.into(),
            label: label.into(),
            multiple: false,
            l10n: false,
            locales: Vec::new(),
        }
    }

    pub fn multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    pub fn localized<I, S>(mut self, locales: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.l10n = true;
        self.locales = locales.into_iter().map(Into::into).collect();
        self
    }

    /// Column type hint for the storage mapping layer.
    pub fn sql_type(&self) -> &'static str {
        if self.multiple {
            "TEXT"
        } else {
            "VARCHAR(255)"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_type_follows_cardinality() {
        let attribute = AttributeConfig::new("file", "File");
        assert_eq!(attribute.sql_type(), "VARCHAR(255)");
        assert_eq!(attribute.multiple(true).sql_type(), "TEXT");
    }

    #[test]
    fn localized_attributes_list_their_locales() {
        let attribute = AttributeConfig::new("file", "File").localized(["en", "fr"]);
        assert!(attribute.l10n);
        assert_eq!(attribute.locales, vec!["en", "fr"]);
    }
}
