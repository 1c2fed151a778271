//! Deterministic fixture dataset and its simulated run.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::ConfigError;
use crate::error::RegistryError;
use crate::export::{GenerationResult, ResultAssembler};
use crate::registry::TaskHandle;
use crate::validation::{SchemaKind, SchemaValidator};

/// Steps reported while a fixture run replays.
pub const FIXTURE_STEPS: [&str; 5] = [
    "Initializing agents",
    "Researching companies",
    "Matching solutions",
    "Generating leads",
    "Creating emails",
];

/// Records returned by fixture runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureDataset {
    #[serde(default)]
    pub leads: Vec<Value>,
    #[serde(default)]
    pub emails: Vec<Value>,
}

impl FixtureDataset {
    /// The built-in dataset: two leads and one email draft.
    pub fn builtin() -> Self {
        Self {
            leads: vec![
                json!({
                    "company": "Texas Instruments",
                    "website": "ti.com",
                    "description": "Leading semiconductor manufacturer with global operations",
                    "products": "Microcontrollers, processors, analog chips",
                    "match": "Vision AI for quality control in semiconductor fabrication processes"
                }),
                json!({
                    "company": "Dell Technologies",
                    "website": "dell.com",
                    "description": "Multinational computer technology company",
                    "products": "Laptops, servers, storage solutions",
                    "match": "Automation for assembly line optimization and component inspection"
                }),
            ],
            emails: vec![json!({
                "company": "Texas Instruments",
                "subject": "Partnership Opportunity - Vision AI for Semiconductor Manufacturing",
                "email": "Subject: Partnership Opportunity - Vision AI for Semiconductor Manufacturing\n\nDear Texas Instruments Team,\n\nI hope this email finds you well..."
            })],
        }
    }

    /// Load a dataset from a YAML file with `leads` and `emails` lists.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let dataset: Self = serde_yaml::from_str(&text)?;
        tracing::info!(
            path = %path.display(),
            leads = dataset.leads.len(),
            emails = dataset.emails.len(),
            "Loaded fixture dataset"
        );
        Ok(dataset)
    }

    /// Load from `path` when given, otherwise use the built-in dataset.
    pub fn from_path(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::builtin()),
        }
    }

    /// Assemble the dataset the way a live run would.
    ///
    /// Lists that fail validation are left absent.
    pub fn to_result(&self) -> GenerationResult {
        let mut assembler = ResultAssembler::new();
        for (kind, records) in [
            (SchemaKind::Lead, &self.leads),
            (SchemaKind::Email, &self.emails),
        ] {
            match SchemaValidator::validate_sequence(records.clone(), kind) {
                Some(sequence) => assembler.add(sequence),
                None => {
                    tracing::warn!(kind = %kind, "Fixture {} do not validate", kind.plural());
                    assembler.mark_absent(kind);
                }
            }
        }
        assembler.finish()
    }
}

impl Default for FixtureDataset {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Replay the fixture steps on `handle`, then complete it with `dataset`.
///
/// `delay` is slept after each progress update.
pub async fn replay(
    handle: &TaskHandle,
    dataset: &FixtureDataset,
    delay: Duration,
) -> Result<GenerationResult, RegistryError> {
    handle.begin().await?;

    let total = FIXTURE_STEPS.len() as u32;
    for (i, step) in FIXTURE_STEPS.iter().enumerate() {
        handle.update_progress(*step, i as u32 + 1, total).await?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    let result = dataset.to_result();
    handle.complete(result.clone()).await?;
    tracing::info!(task_id = %handle.task_id(), "Fixture run completed");
    Ok(result)
}
