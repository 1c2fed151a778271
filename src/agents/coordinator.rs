//! Pipeline coordinator for the collaborator exchange.
//!
//! Drives a bounded round-robin exchange among the roster's specialists,
//! records every turn in a [`Transcript`], then resolves each schema kind by
//! scanning the transcript from the most recent turn backwards. The first
//! turn from the kind's authoritative collaborator that extracts and
//! validates wins.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::collaborator::{Collaborator, LlmCollaborator, Reply, RequesterSeed};
use super::error::{AgentError, AgentResult};
use super::roster::{CollaboratorSpec, Roster};
use super::transcript::{Transcript, Turn};
use crate::config::AppConfig;
use crate::export::{GenerationResult, ResultAssembler};
use crate::llm::LlmProvider;
use crate::metrics::MetricsCollector;
use crate::registry::TaskHandle;
use crate::utils::json_extraction::{try_extract_records, ExtractionResult};
use crate::validation::{SchemaKind, SchemaValidator, ValidatedSequence};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the pipeline coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Upper bound on exchange rounds.
    pub max_rounds: u32,
    /// Cap on a single collaborator turn.
    pub turn_timeout: Duration,
    /// End early once every kind resolves from the transcript.
    pub stop_when_satisfied: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            turn_timeout: Duration::from_secs(120),
            stop_when_satisfied: true,
        }
    }
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_rounds: config.max_rounds.max(1),
            turn_timeout: config.turn_timeout,
            stop_when_satisfied: config.stop_when_satisfied,
        }
    }

    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds.max(1);
        self
    }

    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }

    pub fn with_stop_when_satisfied(mut self, enabled: bool) -> Self {
        self.stop_when_satisfied = enabled;
        self
    }

    /// Progress steps reported for one run: each round plus assembly.
    pub fn total_steps(&self) -> u32 {
        self.max_rounds + 1
    }
}

// ============================================================================
// Events
// ============================================================================

/// Events emitted during a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    RunStarted {
        task_id: String,
        participant_count: usize,
        planned_rounds: u32,
        timestamp: DateTime<Utc>,
    },
    RoundStarted {
        round: u32,
        timestamp: DateTime<Utc>,
    },
    TurnReceived {
        round: u32,
        speaker: String,
        preview: String,
        timestamp: DateTime<Utc>,
    },
    RoundCompleted {
        round: u32,
        turns: usize,
        timestamp: DateTime<Utc>,
    },
    KindResolved {
        kind: SchemaKind,
        speaker: String,
        records: usize,
        timestamp: DateTime<Utc>,
    },
    KindAbsent {
        kind: SchemaKind,
        timestamp: DateTime<Utc>,
    },
    RunCompleted {
        rounds: u32,
        turns: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

impl PipelineEvent {
    pub fn run_started(task_id: impl Into<String>, participant_count: usize, planned_rounds: u32) -> Self {
        Self::RunStarted {
            task_id: task_id.into(),
            participant_count,
            planned_rounds,
            timestamp: Utc::now(),
        }
    }

    pub fn round_started(round: u32) -> Self {
        Self::RoundStarted {
            round,
            timestamp: Utc::now(),
        }
    }

    pub fn turn_received(round: u32, turn: &Turn) -> Self {
        Self::TurnReceived {
            round,
            speaker: turn.speaker.clone(),
            preview: turn.preview(),
            timestamp: Utc::now(),
        }
    }

    pub fn round_completed(round: u32, turns: usize) -> Self {
        Self::RoundCompleted {
            round,
            turns,
            timestamp: Utc::now(),
        }
    }

    pub fn kind_resolved(kind: SchemaKind, speaker: impl Into<String>, records: usize) -> Self {
        Self::KindResolved {
            kind,
            speaker: speaker.into(),
            records,
            timestamp: Utc::now(),
        }
    }

    pub fn kind_absent(kind: SchemaKind) -> Self {
        Self::KindAbsent {
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn run_completed(rounds: u32, turns: usize, duration_ms: u64) -> Self {
        Self::RunCompleted {
            rounds,
            turns,
            duration_ms,
            timestamp: Utc::now(),
        }
    }
}

// ============================================================================
// Coordinator
// ============================================================================

struct Participant {
    spec: CollaboratorSpec,
    collaborator: Arc<dyn Collaborator>,
}

/// A sequence resolved for one kind, with the turn it came from.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub speaker: String,
    pub sequence: ValidatedSequence,
}

/// Coordinator for one roster of collaborators.
///
/// The coordinator itself is stateless between runs; each call to
/// [`PipelineCoordinator::run`] owns its own transcript.
pub struct PipelineCoordinator {
    roster: Roster,
    seed: Participant,
    specialists: Vec<Participant>,
    config: CoordinatorConfig,
    event_tx: Option<mpsc::Sender<PipelineEvent>>,
    metrics: MetricsCollector,
}

impl PipelineCoordinator {
    /// Create a coordinator from a roster and one collaborator per entry.
    ///
    /// # Errors
    ///
    /// `ConfigurationError` if the roster is invalid or an entry has no
    /// collaborator with a matching name.
    pub fn new(
        roster: Roster,
        collaborators: Vec<Arc<dyn Collaborator>>,
        config: CoordinatorConfig,
    ) -> AgentResult<Self> {
        roster.validate()?;

        let bind = |spec: &CollaboratorSpec| -> AgentResult<Participant> {
            let collaborator = collaborators
                .iter()
                .find(|c| c.name() == spec.name)
                .cloned()
                .ok_or_else(|| {
                    AgentError::ConfigurationError(format!(
                        "no collaborator provided for '{}'",
                        spec.name
                    ))
                })?;
            Ok(Participant {
                spec: spec.clone(),
                collaborator,
            })
        };

        let seed_spec = roster.seed().ok_or_else(|| {
            AgentError::ConfigurationError("roster has no seed collaborator".to_string())
        })?;
        let seed = bind(seed_spec)?;
        let specialists = roster
            .specialists()
            .map(bind)
            .collect::<AgentResult<Vec<_>>>()?;

        Ok(Self {
            roster,
            seed,
            specialists,
            config,
            event_tx: None,
            metrics: MetricsCollector::new(),
        })
    }

    /// Create a coordinator whose specialists call `provider`.
    ///
    /// The seed becomes a [`RequesterSeed`].
    pub fn with_provider(
        roster: Roster,
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        temperature: f64,
        config: CoordinatorConfig,
    ) -> AgentResult<Self> {
        let model = model.into();
        let collaborators = roster
            .iter()
            .map(|spec| -> Arc<dyn Collaborator> {
                if spec.is_seed() {
                    Arc::new(RequesterSeed::new(spec.name.clone()))
                } else {
                    Arc::new(
                        LlmCollaborator::new(spec.clone(), Arc::clone(&provider))
                            .with_model(model.clone())
                            .with_temperature(temperature),
                    )
                }
            })
            .collect();
        Self::new(roster, collaborators, config)
    }

    /// Emit events on `event_tx` during runs.
    pub fn with_events(mut self, event_tx: mpsc::Sender<PipelineEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Conduct a full run for the task behind `handle`.
    ///
    /// Marks the task running, drives the exchange, and completes the task
    /// with the assembled result. Hard failures are recorded on the task
    /// with `fail` and returned. A registry rejection (task deleted or not
    /// queued) is returned without touching the task.
    pub async fn run(&self, handle: &TaskHandle, prompt: &str) -> AgentResult<GenerationResult> {
        handle.begin().await?;

        let in_flight = self.metrics.track_run();
        let outcome = self.execute(handle, prompt).await;
        drop(in_flight);

        match outcome {
            Ok(result) => {
                handle.complete(result.clone()).await?;
                tracing::info!(
                    task_id = %handle.task_id(),
                    records = result.record_count(),
                    "Pipeline run completed"
                );
                Ok(result)
            }
            Err(err) if err.is_recorded_on_task() => {
                tracing::warn!(task_id = %handle.task_id(), error = %err, "Pipeline run failed");
                handle.fail(err.to_string()).await?;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    async fn execute(&self, handle: &TaskHandle, prompt: &str) -> AgentResult<GenerationResult> {
        let start_time = Instant::now();
        let total_steps = self.config.total_steps();

        handle
            .update_progress("Initializing agents", 0, total_steps)
            .await?;

        self.send_event(PipelineEvent::run_started(
            handle.task_id(),
            self.specialists.len() + 1,
            self.config.max_rounds,
        ))
        .await;

        let (transcript, rounds) = self.converse(prompt, Some(handle)).await?;

        handle
            .update_progress("Assembling results", total_steps, total_steps)
            .await?;

        let result = self.assemble(&transcript).await;

        self.send_event(PipelineEvent::run_completed(
            rounds,
            transcript.len(),
            start_time.elapsed().as_millis() as u64,
        ))
        .await;

        Ok(result)
    }

    /// Drive the exchange and return the transcript with the number of
    /// completed rounds. Progress is written once per completed round when
    /// a handle is given.
    pub async fn converse(
        &self,
        prompt: &str,
        handle: Option<&TaskHandle>,
    ) -> AgentResult<(Transcript, u32)> {
        let mut transcript = Transcript::new();
        transcript.push(Turn::new(self.seed.spec.name.clone(), prompt));

        let mut rounds_completed = 0;

        for round in 1..=self.config.max_rounds {
            self.send_event(PipelineEvent::round_started(round)).await;
            let turns_before = transcript.len();
            let mut stopped = false;

            for participant in &self.specialists {
                let reply = self.take_turn(participant, &transcript).await?;
                self.record_reply(round, participant, reply.content, &mut transcript)
                    .await;
                if reply.done {
                    tracing::info!(
                        round = round,
                        speaker = %participant.spec.name,
                        "Collaborator ended the exchange"
                    );
                    stopped = true;
                    break;
                }
            }

            if stopped {
                break;
            }

            rounds_completed = round;
            if let Some(handle) = handle {
                handle
                    .update_progress(
                        format!("Round {} of {} completed", round, self.config.max_rounds),
                        round,
                        self.config.total_steps(),
                    )
                    .await?;
            }
            self.send_event(PipelineEvent::round_completed(
                round,
                transcript.len() - turns_before,
            ))
            .await;
            tracing::info!(round = round, turns = transcript.len(), "Round completed");

            let seed_reply = self.take_turn(&self.seed, &transcript).await?;
            self.record_reply(round, &self.seed, seed_reply.content, &mut transcript)
                .await;
            if seed_reply.done {
                tracing::info!(round = round, "Requester ended the exchange");
                break;
            }

            if self.config.stop_when_satisfied
                && round < self.config.max_rounds
                && self.all_kinds_resolve(&transcript)
            {
                tracing::info!(round = round, "Every kind resolved, stopping early");
                break;
            }
        }

        Ok((transcript, rounds_completed))
    }

    async fn take_turn(&self, participant: &Participant, transcript: &Transcript) -> AgentResult<Reply> {
        let started = Instant::now();
        let reply = tokio::time::timeout(
            self.config.turn_timeout,
            participant.collaborator.respond(transcript),
        )
        .await
        .map_err(|_| {
            tracing::warn!(
                speaker = %participant.spec.name,
                timeout_secs = self.config.turn_timeout.as_secs(),
                "Collaborator turn timed out"
            );
            AgentError::Timeout {
                seconds: self.config.turn_timeout.as_secs(),
            }
        })??;
        self.metrics
            .record_turn(&participant.spec.name, started.elapsed());
        Ok(reply)
    }

    async fn record_reply(
        &self,
        round: u32,
        participant: &Participant,
        content: Option<String>,
        transcript: &mut Transcript,
    ) {
        let Some(content) = content else {
            return;
        };
        let turn = Turn::new(participant.spec.name.clone(), content);
        tracing::debug!(round = round, speaker = %turn.speaker, preview = %turn.preview(), "Turn received");
        self.send_event(PipelineEvent::turn_received(round, &turn)).await;
        transcript.push(turn);
    }

    fn all_kinds_resolve(&self, transcript: &Transcript) -> bool {
        SchemaKind::all()
            .into_iter()
            .all(|kind| self.scan(transcript, kind, false).is_some())
    }

    /// Resolve `kind` from the transcript.
    ///
    /// Turns by the kind's authoritative collaborator are inspected most
    /// recent first; the first one that extracts and validates wins.
    pub fn resolve(&self, transcript: &Transcript, kind: SchemaKind) -> Option<Resolution> {
        self.scan(transcript, kind, true)
    }

    fn scan(&self, transcript: &Transcript, kind: SchemaKind, observe: bool) -> Option<Resolution> {
        let authority = self.roster.authoritative_for(kind)?;

        for turn in transcript.latest_by(&authority.name) {
            if observe {
                tracing::debug!(
                    kind = %kind,
                    speaker = %turn.speaker,
                    preview = %turn.preview(),
                    "Inspecting candidate turn"
                );
            }

            let outcome = match try_extract_records(turn.content.trim()) {
                ExtractionResult::Success(candidates) => {
                    match SchemaValidator::validate_sequence(candidates, kind) {
                        Some(sequence) => {
                            if observe {
                                self.metrics.record_extraction(kind.as_str(), "valid");
                            }
                            return Some(Resolution {
                                speaker: turn.speaker.clone(),
                                sequence,
                            });
                        }
                        None => "invalid",
                    }
                }
                other => other.outcome(),
            };

            if observe {
                self.metrics.record_extraction(kind.as_str(), outcome);
                tracing::warn!(
                    kind = %kind,
                    speaker = %turn.speaker,
                    outcome = outcome,
                    "Invalid {} structure from {}",
                    kind,
                    turn.speaker
                );
            }
        }

        None
    }

    /// Build the result for a finished transcript.
    pub async fn assemble(&self, transcript: &Transcript) -> GenerationResult {
        let mut assembler = ResultAssembler::new();

        for kind in SchemaKind::all() {
            match self.resolve(transcript, kind) {
                Some(resolution) => {
                    tracing::info!(
                        kind = %kind,
                        speaker = %resolution.speaker,
                        records = resolution.sequence.len(),
                        "Resolved structured records"
                    );
                    self.send_event(PipelineEvent::kind_resolved(
                        kind,
                        resolution.speaker.clone(),
                        resolution.sequence.len(),
                    ))
                    .await;
                    assembler.add(resolution.sequence);
                }
                None => {
                    tracing::warn!(kind = %kind, "No valid {} output in transcript", kind.plural());
                    self.send_event(PipelineEvent::kind_absent(kind)).await;
                    assembler.mark_absent(kind);
                }
            }
        }

        let result = assembler.finish();
        if let Some(note) = &result.note {
            tracing::warn!(note = %note, "Run produced no structured data");
        }
        result
    }

    async fn send_event(&self, event: PipelineEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}
