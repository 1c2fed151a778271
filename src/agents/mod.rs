//! Collaborator pipeline: roster, transcript, collaborators and the
//! coordinator that drives them.

pub mod collaborator;
pub mod coordinator;
pub mod error;
pub mod roster;
pub mod transcript;

pub use collaborator::{
    Collaborator, LlmCollaborator, Reply, RequesterSeed, ScriptedCollaborator,
    TERMINATION_KEYWORD,
};
pub use coordinator::{CoordinatorConfig, PipelineCoordinator, PipelineEvent, Resolution};
pub use error::{AgentError, AgentResult};
pub use roster::{CollaboratorRole, CollaboratorSpec, Roster};
pub use transcript::{Transcript, Turn};
