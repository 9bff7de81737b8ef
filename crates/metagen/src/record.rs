//! Canonical product records and the generated SEO fields attached to them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Canonical column name for the unique product key.
pub const KEY_COLUMN: &str = "SKU";

/// Canonical column name for the product display name.
pub const NAME_COLUMN: &str = "Product Name";

/// Placed in every generated field when the service answered a batch but
/// left this product out.
pub const NO_RESPONSE_SENTINEL: &str = "Error: No AI response";

/// Placed in every generated field when a single-row regenerate call failed.
pub const REGENERATE_FAILED_SENTINEL: &str = "Error: Regeneration failed";

/// One product row. `key` and `display_name` are required; every other
/// column is carried through untouched, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub key: String,
    pub display_name: String,
    #[serde(default)]
    pub extra: Vec<(String, String)>,
}

impl Record {
    pub fn new(key: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            display_name: display_name.into(),
            extra: Vec::new(),
        }
    }

    /// Builder-style helper for adding a pass-through column.
    pub fn with_column(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_column(&column.into(), value.into());
        self
    }

    /// Looks up a pass-through column by exact name.
    pub fn column(&self, column: &str) -> Option<&str> {
        self.extra
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Sets a pass-through column, appending it if absent.
    pub fn set_column(&mut self, column: &str, value: String) {
        match self.extra.iter_mut().find(|(name, _)| name == column) {
            Some((_, existing)) => *existing = value,
            None => self.extra.push((column.to_string(), value)),
        }
    }

    /// Returns a copy without any pass-through column whose name is a
    /// generated field column. Used so the service never sees its own output.
    pub fn stripped(&self) -> Record {
        Record {
            key: self.key.clone(),
            display_name: self.display_name.clone(),
            extra: self
                .extra
                .iter()
                .filter(|(name, _)| GeneratedField::from_column(name).is_none())
                .cloned()
                .collect(),
        }
    }
}

/// A single generated text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratedField {
    MetaTitle,
    MetaDescription,
    MetaTitleAr,
    MetaDescriptionAr,
}

impl GeneratedField {
    pub const ALL: [GeneratedField; 4] = [
        GeneratedField::MetaTitle,
        GeneratedField::MetaDescription,
        GeneratedField::MetaTitleAr,
        GeneratedField::MetaDescriptionAr,
    ];

    /// Column header used in exports.
    pub fn column(&self) -> &'static str {
        match self {
            GeneratedField::MetaTitle => "Meta Title",
            GeneratedField::MetaDescription => "Meta Description",
            GeneratedField::MetaTitleAr => "Meta Title (AR)",
            GeneratedField::MetaDescriptionAr => "Meta Description (AR)",
        }
    }

    /// JSON property name the service is asked to produce.
    pub fn json_key(&self) -> &'static str {
        match self {
            GeneratedField::MetaTitle => "meta_title",
            GeneratedField::MetaDescription => "meta_description",
            GeneratedField::MetaTitleAr => "meta_title_ar",
            GeneratedField::MetaDescriptionAr => "meta_description_ar",
        }
    }

    /// Case-insensitive match against export column headers.
    pub fn from_column(column: &str) -> Option<Self> {
        let wanted = column.trim();
        Self::ALL
            .into_iter()
            .find(|field| field.column().eq_ignore_ascii_case(wanted))
    }
}

impl std::fmt::Display for GeneratedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.column())
    }
}

/// Which language(s) the generated meta content is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLanguage {
    #[default]
    English,
    Arabic,
    Bilingual,
}

impl OutputLanguage {
    /// Generated fields a complete result must carry for this language.
    pub fn fields(&self) -> &'static [GeneratedField] {
        match self {
            OutputLanguage::English | OutputLanguage::Arabic => {
                &[GeneratedField::MetaTitle, GeneratedField::MetaDescription]
            }
            OutputLanguage::Bilingual => &GeneratedField::ALL,
        }
    }
}

impl std::str::FromStr for OutputLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "english" | "en" => Ok(OutputLanguage::English),
            "arabic" | "ar" => Ok(OutputLanguage::Arabic),
            "bilingual" | "both" => Ok(OutputLanguage::Bilingual),
            other => Err(format!("unknown output language '{}'", other)),
        }
    }
}

/// Generated values keyed by field, iterated in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratedFields(BTreeMap<GeneratedField, String>);

impl GeneratedFields {
    /// Every field required by `language` set to `sentinel`.
    pub fn sentinel(language: OutputLanguage, sentinel: &str) -> Self {
        let mut fields = Self::default();
        for field in language.fields() {
            fields.set(*field, sentinel.to_string());
        }
        fields
    }

    pub fn get(&self, field: GeneratedField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn set(&mut self, field: GeneratedField, value: String) {
        self.0.insert(field, value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GeneratedField, &str)> {
        self.0.iter().map(|(field, value)| (*field, value.as_str()))
    }

    /// True if any field holds one of the error sentinels.
    pub fn has_error(&self) -> bool {
        self.0
            .values()
            .any(|v| v == NO_RESPONSE_SENTINEL || v == REGENERATE_FAILED_SENTINEL)
    }
}

/// A record together with its generated content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedRecord {
    pub record: Record,
    pub generated: GeneratedFields,
}

impl ProcessedRecord {
    pub fn new(record: Record, generated: GeneratedFields) -> Self {
        Self { record, generated }
    }

    pub fn key(&self) -> &str {
        &self.record.key
    }
}
