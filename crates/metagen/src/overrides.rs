//! Per-row edits and single-row regeneration on top of the bulk results.
//!
//! A key is written by at most one path at a time: the bulk run owns the
//! keys of its in-flight chunk, and a regenerate owns its key until the call
//! settles. Neither an edit nor a regenerate touches the job state, the
//! progress ratio or the resumable flag.

use tracing::{info, info_span, warn, Instrument};

use crate::error::OverrideError;
use crate::generation::{GenerationClient, GenerationError};
use crate::record::{GeneratedField, GeneratedFields, KEY_COLUMN, NAME_COLUMN, REGENERATE_FAILED_SENTINEL};
use crate::session::{SessionSnapshot, SessionStore};
use crate::workspace::{self, SharedWorkspace};

/// What a column name in an edit refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EditTarget {
    DisplayName,
    Generated(GeneratedField),
    Extra(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditOutcome {
    /// `false` when the cell already held the value.
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegenerateOutcome {
    Regenerated { tokens_used: u64 },
    /// The row was left unchanged.
    QuotaExceeded { message: String },
    /// The row now carries [`REGENERATE_FAILED_SENTINEL`].
    Failed { detail: String },
}

/// Clears a key's in-flight status when dropped, whatever the outcome.
struct InFlightGuard {
    workspace: SharedWorkspace,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        workspace::lock(&self.workspace).clear_regenerating(&self.key);
    }
}

pub struct RowOverrideController {
    client: GenerationClient,
    store: SessionStore,
    workspace: SharedWorkspace,
}

impl RowOverrideController {
    pub fn new(client: GenerationClient, store: SessionStore, workspace: SharedWorkspace) -> Self {
        Self {
            client,
            store,
            workspace,
        }
    }

    pub fn is_regenerating(&self, key: &str) -> bool {
        workspace::lock(&self.workspace).is_regenerating(key)
    }

    /// Replaces one cell of a processed row. Persists only when the value
    /// actually changed.
    pub fn edit(&self, key: &str, column: &str, value: &str) -> Result<EditOutcome, OverrideError> {
        let snapshot = {
            let mut ws = workspace::lock(&self.workspace);
            if ws.is_bulk_owned(key) || ws.is_regenerating(key) {
                return Err(OverrideError::KeyBusy(key.to_string()));
            }
            let Some(row) = ws.processed_mut(key) else {
                return Err(OverrideError::UnknownKey(key.to_string()));
            };

            let target = resolve_target(column, &row.record.extra)?;
            let current = match &target {
                EditTarget::DisplayName => Some(row.record.display_name.as_str()),
                EditTarget::Generated(field) => row.generated.get(*field),
                EditTarget::Extra(name) => row.record.column(name),
            };
            if current == Some(value) {
                return Ok(EditOutcome { changed: false });
            }

            match target {
                EditTarget::DisplayName => row.record.display_name = value.to_string(),
                EditTarget::Generated(field) => row.generated.set(field, value.to_string()),
                EditTarget::Extra(name) => row.record.set_column(&name, value.to_string()),
            }
            ws.snapshot()
        };

        self.persist(&snapshot);
        Ok(EditOutcome { changed: true })
    }

    /// Regenerates one processed row's generated fields with a single-record
    /// call. Keys without a processed row are unknown here.
    pub async fn regenerate(
        &self,
        key: &str,
        instructions: &str,
    ) -> Result<RegenerateOutcome, OverrideError> {
        let record = {
            let mut ws = workspace::lock(&self.workspace);
            if ws.is_bulk_owned(key) || ws.is_regenerating(key) {
                return Err(OverrideError::KeyBusy(key.to_string()));
            }
            let Some(record) = ws.processed(key).map(|row| row.record.clone()) else {
                return Err(OverrideError::UnknownKey(key.to_string()));
            };
            ws.mark_regenerating(key);
            record
        };
        let _guard = InFlightGuard {
            workspace: self.workspace.clone(),
            key: key.to_string(),
        };

        let result = self
            .client
            .generate_one(&record, instructions)
            .instrument(info_span!("regenerate", key = %key))
            .await;

        let outcome = match result {
            Ok(single) => {
                self.write(key, single.generated);
                info!(key = %key, tokens_used = single.tokens_used, "Regenerated product");
                RegenerateOutcome::Regenerated {
                    tokens_used: single.tokens_used,
                }
            }
            Err(GenerationError::QuotaExceeded(detail)) => {
                warn!(key = %key, detail = %detail, "Quota exceeded while regenerating");
                RegenerateOutcome::QuotaExceeded {
                    message: "API quota exceeded. Please try again later.".to_string(),
                }
            }
            Err(GenerationError::Failed(detail)) => {
                warn!(key = %key, detail = %detail, "Regeneration failed");
                let language = self.client.language();
                self.write(
                    key,
                    GeneratedFields::sentinel(language, REGENERATE_FAILED_SENTINEL),
                );
                RegenerateOutcome::Failed { detail }
            }
        };
        Ok(outcome)
    }

    fn write(&self, key: &str, generated: GeneratedFields) {
        let snapshot = {
            let mut ws = workspace::lock(&self.workspace);
            if !ws.set_generated(key, generated) {
                // Session was replaced while the call was in flight.
                return;
            }
            ws.snapshot()
        };
        self.persist(&snapshot);
    }

    fn persist(&self, snapshot: &SessionSnapshot) {
        if let Err(e) = self.store.save(snapshot) {
            warn!(error = %e, "Failed to persist session snapshot");
        }
    }
}

fn resolve_target(column: &str, extra: &[(String, String)]) -> Result<EditTarget, OverrideError> {
    let wanted = column.trim();
    if wanted.eq_ignore_ascii_case(KEY_COLUMN) {
        return Err(OverrideError::KeyNotEditable);
    }
    if wanted.eq_ignore_ascii_case(NAME_COLUMN) {
        return Ok(EditTarget::DisplayName);
    }
    if let Some(field) = GeneratedField::from_column(wanted) {
        return Ok(EditTarget::Generated(field));
    }
    extra
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
        .map(|(name, _)| EditTarget::Extra(name.clone()))
        .ok_or_else(|| OverrideError::UnknownField(column.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_target() {
        let extra = vec![("Brand".to_string(), "Acme".to_string())];
        assert_eq!(
            resolve_target("sku", &extra),
            Err(OverrideError::KeyNotEditable)
        );
        assert_eq!(
            resolve_target("Product Name", &extra),
            Ok(EditTarget::DisplayName)
        );
        assert_eq!(
            resolve_target("meta title", &extra),
            Ok(EditTarget::Generated(GeneratedField::MetaTitle))
        );
        assert_eq!(
            resolve_target("brand", &extra),
            Ok(EditTarget::Extra("Brand".to_string()))
        );
        assert_eq!(
            resolve_target("Color", &extra),
            Err(OverrideError::UnknownField("Color".to_string()))
        );
    }
}
