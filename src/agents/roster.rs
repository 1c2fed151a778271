//! Declared collaborator roster.
//!
//! The exchange is driven by a fixed, ordered table of collaborators. Each
//! entry carries an explicit role: one seed that opens and can close the
//! exchange, and specialists that speak in round-robin order. A specialist
//! may be the authoritative source for exactly one schema kind.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::error::{AgentError, AgentResult};
use crate::validation::SchemaKind;

/// Role of a collaborator in the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CollaboratorRole {
    /// Opens the exchange with the prompt and decides when it is over.
    Seed,
    /// Speaks once per round.
    Specialist {
        authoritative_for: Option<SchemaKind>,
    },
}

/// One entry of the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaboratorSpec {
    pub name: String,
    pub role: CollaboratorRole,
    pub system_prompt: String,
}

impl CollaboratorSpec {
    pub fn seed(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: CollaboratorRole::Seed,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn specialist(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: CollaboratorRole::Specialist {
                authoritative_for: None,
            },
            system_prompt: system_prompt.into(),
        }
    }

    /// A specialist whose turns are the source of truth for `kind`.
    pub fn authoritative(
        name: impl Into<String>,
        kind: SchemaKind,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            role: CollaboratorRole::Specialist {
                authoritative_for: Some(kind),
            },
            system_prompt: system_prompt.into(),
        }
    }

    pub fn is_seed(&self) -> bool {
        matches!(self.role, CollaboratorRole::Seed)
    }

    pub fn authoritative_for(&self) -> Option<SchemaKind> {
        match self.role {
            CollaboratorRole::Specialist { authoritative_for } => authoritative_for,
            CollaboratorRole::Seed => None,
        }
    }
}

pub const USER_PROMPT: &str = "You are the founder of Replicant Systems, a company building \
industrial automation solutions with AI and vision systems.";

pub const RESEARCHER_PROMPT: &str = r#"You are a business researcher. From the user's request (industry, location, need), identify 3-5 relevant companies.

Return ONLY a JSON array shaped like:
[
  {
    "company": "Company Name",
    "website": "https://example.com or N/A",
    "description": "Brief company description",
    "products": "Main products or services"
  }
]
No text before or after the array."#;

pub const MATCHER_PROMPT: &str = r#"You study each researched company and propose how Replicant Systems (vision AI and industrial automation) could help it.

Return ONLY a JSON array shaped like:
[
  {
    "company": "Company Name",
    "match": "Concrete way Replicant Systems can help"
  }
]
No text before or after the array."#;

pub const LEAD_LOGGER_PROMPT: &str = r#"You merge the researched companies with the match suggestions into the final lead list.

Return ONLY a JSON array with exactly this structure:
[
  {
    "company": "Company Name",
    "website": "Website URL or N/A",
    "description": "Company description",
    "products": "Products or services",
    "match": "How Replicant Systems can help"
  }
]
No text before or after the array."#;

pub const EMAIL_AGENT_PROMPT: &str = r#"You draft a personalized outreach email for every lead, using the company details and Replicant Systems' capabilities.

Return ONLY a JSON array, with no markdown and no commentary:
[
  {
    "company": "ABC Manufacturing",
    "email": "Subject: Partnership Opportunity\n\nDear ABC Manufacturing Team,\n\n...\n\nBest regards,\nReplicant Systems Team"
  }
]
Once every lead has an email, write TERMINATE on its own line after the array."#;

/// Ordered table of collaborators for one pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    collaborators: Vec<CollaboratorSpec>,
}

impl Roster {
    pub fn new(collaborators: Vec<CollaboratorSpec>) -> Self {
        Self { collaborators }
    }

    /// The lead-generation roster: requester, researcher, matcher, lead
    /// logger (authoritative for leads) and email writer (authoritative for
    /// emails).
    pub fn lead_generation() -> Self {
        Self::new(vec![
            CollaboratorSpec::seed("User", USER_PROMPT),
            CollaboratorSpec::specialist("Researcher", RESEARCHER_PROMPT),
            CollaboratorSpec::specialist("Matcher", MATCHER_PROMPT),
            CollaboratorSpec::authoritative("LeadLogger", SchemaKind::Lead, LEAD_LOGGER_PROMPT),
            CollaboratorSpec::authoritative("EmailAgent", SchemaKind::Email, EMAIL_AGENT_PROMPT),
        ])
    }

    /// Check the roster can drive a run.
    ///
    /// # Errors
    ///
    /// `ConfigurationError` unless there is exactly one seed, at least one
    /// specialist, no duplicate names, and exactly one authoritative
    /// specialist for every schema kind.
    pub fn validate(&self) -> AgentResult<()> {
        let seeds = self.collaborators.iter().filter(|c| c.is_seed()).count();
        if seeds != 1 {
            return Err(AgentError::ConfigurationError(format!(
                "roster needs exactly one seed collaborator, found {}",
                seeds
            )));
        }

        if self.specialists().next().is_none() {
            return Err(AgentError::ConfigurationError(
                "roster needs at least one specialist".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for spec in &self.collaborators {
            if spec.name.trim().is_empty() {
                return Err(AgentError::ConfigurationError(
                    "collaborator name cannot be empty".to_string(),
                ));
            }
            if !names.insert(spec.name.as_str()) {
                return Err(AgentError::ConfigurationError(format!(
                    "duplicate collaborator name '{}'",
                    spec.name
                )));
            }
        }

        for kind in SchemaKind::all() {
            let count = self
                .collaborators
                .iter()
                .filter(|c| c.authoritative_for() == Some(kind))
                .count();
            if count != 1 {
                return Err(AgentError::ConfigurationError(format!(
                    "kind '{}' needs exactly one authoritative collaborator, found {}",
                    kind, count
                )));
            }
        }

        Ok(())
    }

    pub fn seed(&self) -> Option<&CollaboratorSpec> {
        self.collaborators.iter().find(|c| c.is_seed())
    }

    /// Specialists in speaking order.
    pub fn specialists(&self) -> impl Iterator<Item = &CollaboratorSpec> {
        self.collaborators.iter().filter(|c| !c.is_seed())
    }

    pub fn authoritative_for(&self, kind: SchemaKind) -> Option<&CollaboratorSpec> {
        self.collaborators
            .iter()
            .find(|c| c.authoritative_for() == Some(kind))
    }

    pub fn get(&self, name: &str) -> Option<&CollaboratorSpec> {
        self.collaborators.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollaboratorSpec> {
        self.collaborators.iter()
    }

    pub fn len(&self) -> usize {
        self.collaborators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collaborators.is_empty()
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self::lead_generation()
    }
}
