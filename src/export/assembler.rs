//! Merging validated sequences into a task result.

use serde::{Deserialize, Serialize};

use crate::validation::{Record, SchemaKind, ValidatedSequence};

/// Advisory note attached when a run produced no usable records at all.
pub const NO_DATA_NOTE: &str = "No valid data was generated. Check the conversation flow.";

/// Assembled output of one pipeline run.
///
/// A kind that produced no valid sequence is `None`; it is never an empty list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub leads: Option<Vec<Record>>,
    pub emails: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl GenerationResult {
    /// Store a validated sequence under its kind, replacing any earlier one.
    pub fn insert(&mut self, sequence: ValidatedSequence) {
        let kind = sequence.kind();
        let records = sequence.into_records();
        match kind {
            SchemaKind::Lead => self.leads = Some(records),
            SchemaKind::Email => self.emails = Some(records),
        }
    }

    pub fn get(&self, kind: SchemaKind) -> Option<&[Record]> {
        match kind {
            SchemaKind::Lead => self.leads.as_deref(),
            SchemaKind::Email => self.emails.as_deref(),
        }
    }

    /// Kinds with records present, in canonical order.
    pub fn present_kinds(&self) -> Vec<SchemaKind> {
        SchemaKind::all()
            .into_iter()
            .filter(|kind| self.get(*kind).is_some())
            .collect()
    }

    /// True when no kind is present.
    pub fn is_empty(&self) -> bool {
        self.leads.is_none() && self.emails.is_none()
    }

    pub fn record_count(&self) -> usize {
        SchemaKind::all()
            .into_iter()
            .filter_map(|kind| self.get(kind))
            .map(<[Record]>::len)
            .sum()
    }
}

/// Accumulates validated sequences for a single run.
#[derive(Debug, Default)]
pub struct ResultAssembler {
    result: GenerationResult,
    absent: Vec<SchemaKind>,
}

impl ResultAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sequence: ValidatedSequence) {
        tracing::debug!(kind = %sequence.kind(), records = sequence.len(), "Sequence accepted");
        self.result.insert(sequence);
    }

    /// Record that no turn produced a valid sequence for `kind`.
    pub fn mark_absent(&mut self, kind: SchemaKind) {
        if !self.absent.contains(&kind) {
            self.absent.push(kind);
        }
    }

    pub fn absent_kinds(&self) -> &[SchemaKind] {
        &self.absent
    }

    /// Finish assembly. An entirely empty result carries [`NO_DATA_NOTE`].
    pub fn finish(self) -> GenerationResult {
        let mut result = self.result;
        if result.is_empty() {
            result.note = Some(NO_DATA_NOTE.to_string());
        }
        result
    }
}
