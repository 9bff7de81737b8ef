//! Prompt text sent to the generation service.

use std::fmt::Write;

use serde_json::{Map, Value};

use crate::record::{OutputLanguage, Record};

use super::GenerationRequest;

/// Built-in instructions used until the user supplies their own.
pub const DEFAULT_INSTRUCTIONS: &str = "You are an SEO copywriter for an e-commerce store. \
For each product below, write a compelling meta title (at most 60 characters) and a \
meta description (at most 160 characters). Use the product name and any useful \
attributes such as brand, category, color, size, or material. Do not invent \
specifications that are not present in the data. Avoid keyword stuffing, all-caps, \
and promotional claims you cannot verify.";

/// User-editable instruction text. `None` means the built-in default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Instructions {
    custom: Option<String>,
}

impl Instructions {
    pub fn custom(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            return Self::default();
        }
        Self { custom: Some(text) }
    }

    pub fn text(&self) -> &str {
        self.custom.as_deref().unwrap_or(DEFAULT_INSTRUCTIONS)
    }

    pub fn is_default(&self) -> bool {
        self.custom.is_none()
    }

    pub fn set(&mut self, text: impl Into<String>) {
        *self = Self::custom(text);
    }

    pub fn reset(&mut self) {
        self.custom = None;
    }
}

fn language_directive(language: OutputLanguage) -> &'static str {
    match language {
        OutputLanguage::English => "Write all meta content in English.",
        OutputLanguage::Arabic => "Write all meta content in Modern Standard Arabic.",
        OutputLanguage::Bilingual => {
            "Write meta_title and meta_description in English, and meta_title_ar and \
             meta_description_ar in Modern Standard Arabic."
        }
    }
}

fn record_to_json(record: &Record) -> Value {
    let mut object = Map::new();
    object.insert("sku".to_string(), Value::String(record.key.clone()));
    object.insert("name".to_string(), Value::String(record.display_name.clone()));
    for (column, value) in &record.extra {
        if !value.trim().is_empty() {
            object.insert(column.clone(), Value::String(value.clone()));
        }
    }
    Value::Object(object)
}

/// Renders the full prompt for a request.
pub fn build_prompt(request: &GenerationRequest) -> String {
    let keys: Vec<String> = request
        .language
        .fields()
        .iter()
        .map(|f| format!("\"{}\"", f.json_key()))
        .collect();

    let products = Value::Array(request.records.iter().map(record_to_json).collect());
    let products = serde_json::to_string_pretty(&products).unwrap_or_else(|_| "[]".to_string());

    let mut prompt = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(prompt, "{}", request.instructions.trim());
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "{}", language_directive(request.language));
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "Return ONLY a JSON array with exactly one object per product. Each object must \
         have the string properties \"sku\", {}. Copy each product's sku unchanged.",
        keys.join(", ")
    );
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Products:");
    prompt.push_str(&products);
    prompt
}
