//! Collaborators that produce turns for the exchange.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::error::{AgentError, AgentResult};
use super::roster::CollaboratorSpec;
use super::transcript::Transcript;
use crate::llm::{GenerationRequest, LlmProvider, Message};

/// Keyword a requester uses to close the exchange.
pub const TERMINATION_KEYWORD: &str = "TERMINATE";

/// What a collaborator contributes when asked for its turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Text appended to the transcript, if any.
    pub content: Option<String>,
    /// The collaborator asks to end the exchange.
    pub done: bool,
}

impl Reply {
    pub fn say(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            done: false,
        }
    }

    /// Say something and end the exchange.
    pub fn finish(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            done: true,
        }
    }

    /// End the exchange without speaking.
    pub fn done() -> Self {
        Self {
            content: None,
            done: true,
        }
    }

    /// Stay silent and let the exchange continue.
    pub fn pass() -> Self {
        Self {
            content: None,
            done: false,
        }
    }
}

/// A text-producing participant in the exchange.
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// Name matching the collaborator's roster entry.
    fn name(&self) -> &str;

    /// Produce the next turn given everything said so far.
    async fn respond(&self, transcript: &Transcript) -> AgentResult<Reply>;
}

/// Collaborator backed by a text-generation provider.
pub struct LlmCollaborator {
    spec: CollaboratorSpec,
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl LlmCollaborator {
    pub fn new(spec: CollaboratorSpec, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            spec,
            provider,
            model: String::new(),
            temperature: 0.4,
            max_tokens: 2000,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Render the transcript as chat messages from this collaborator's view.
    ///
    /// Own turns become assistant messages; everyone else's become user
    /// messages prefixed with the speaker's name.
    pub fn build_messages(&self, transcript: &Transcript) -> Vec<Message> {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(Message::system(self.spec.system_prompt.clone()));
        for turn in transcript.turns() {
            if turn.speaker == self.spec.name {
                messages.push(Message::assistant(turn.content.clone()));
            } else {
                messages.push(Message::user(format!("{}: {}", turn.speaker, turn.content)));
            }
        }
        messages
    }
}

#[async_trait]
impl Collaborator for LlmCollaborator {
    fn name(&self) -> &str {
        &self.spec.name
    }

    async fn respond(&self, transcript: &Transcript) -> AgentResult<Reply> {
        let request = GenerationRequest::new(self.model.clone(), self.build_messages(transcript))
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        let response = self.provider.generate(request).await?;

        let content = response.first_content().ok_or_else(|| {
            AgentError::ResponseParseError(format!("Empty response for {}", self.spec.name))
        })?;

        Ok(Reply::say(content))
    }
}

/// Seed collaborator standing in for the requesting user.
///
/// Stays silent after the opening prompt and ends the exchange once a
/// specialist says the termination keyword.
pub struct RequesterSeed {
    name: String,
}

impl RequesterSeed {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Collaborator for RequesterSeed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, transcript: &Transcript) -> AgentResult<Reply> {
        let terminated = transcript
            .since_last(&self.name)
            .iter()
            .any(|turn| turn.content.contains(TERMINATION_KEYWORD));

        Ok(if terminated { Reply::done() } else { Reply::pass() })
    }
}

enum ScriptStep {
    Reply(Reply),
    Fail(String),
}

/// Collaborator replaying a fixed script, one step per turn.
///
/// Once the script runs out it passes silently.
pub struct ScriptedCollaborator {
    name: String,
    script: Mutex<VecDeque<ScriptStep>>,
    delay: Option<Duration>,
}

impl ScriptedCollaborator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            delay: None,
        }
    }

    /// Script made of plain replies, one per turn.
    pub fn with_replies<I, S>(name: impl Into<String>, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let collaborator = Self::new(name);
        for reply in replies {
            collaborator.push(ScriptStep::Reply(Reply::say(reply)));
        }
        collaborator
    }

    pub fn then_reply(self, reply: Reply) -> Self {
        self.push(ScriptStep::Reply(reply));
        self
    }

    /// Fail the next unscripted turn with an external call failure.
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.push(ScriptStep::Fail(message.into()));
        self
    }

    /// Wait before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push(&self, step: ScriptStep) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(step);
        }
    }
}

#[async_trait]
impl Collaborator for ScriptedCollaborator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, _transcript: &Transcript) -> AgentResult<Reply> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let step = self
            .script
            .lock()
            .map_err(|_| AgentError::ExternalCallFailure(format!("{} script poisoned", self.name)))?
            .pop_front();

        match step {
            Some(ScriptStep::Reply(reply)) => Ok(reply),
            Some(ScriptStep::Fail(message)) => Err(AgentError::ExternalCallFailure(message)),
            None => Ok(Reply::pass()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::transcript::Turn;
    use crate::error::LlmError;
    use crate::llm::{Choice, GenerationResponse, Usage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock LLM provider for testing.
    struct MockLlmProvider {
        content: Option<String>,
        calls: AtomicUsize,
        last_messages: Mutex<Vec<Message>>,
    }

    impl MockLlmProvider {
        fn new(content: Option<&str>) -> Self {
            Self {
                content: content.map(str::to_string),
                calls: AtomicUsize::new(0),
                last_messages: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlmProvider {
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_messages.lock().unwrap() = request.messages;
            let choices = self
                .content
                .iter()
                .map(|content| Choice {
                    index: 0,
                    message: Message::assistant(content.clone()),
                    finish_reason: Some("stop".to_string()),
                })
                .collect();
            Ok(GenerationResponse {
                id: "mock".to_string(),
                model: "mock-model".to_string(),
                choices,
                usage: Usage::default(),
            })
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl LlmProvider for FailingProvider {
        async fn generate(&self, _: GenerationRequest) -> Result<GenerationResponse, LlmError> {
            Err(LlmError::RequestFailed("connection refused".to_string()))
        }
    }

    fn transcript() -> Transcript {
        [
            Turn::new("User", "find leads in Texas"),
            Turn::new("Researcher", "[...]"),
            Turn::new("LeadLogger", "[{\"company\": \"Acme\"}]"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_build_messages_roles() {
        let provider = Arc::new(MockLlmProvider::new(Some("ok")));
        let collaborator = LlmCollaborator::new(
            CollaboratorSpec::specialist("LeadLogger", "system prompt"),
            provider,
        );
        let messages = collaborator.build_messages(&transcript());
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], Message::system("system prompt"));
        assert_eq!(messages[1], Message::user("User: find leads in Texas"));
        assert_eq!(messages[3].role, "assistant");
    }

    #[tokio::test]
    async fn test_llm_collaborator_reply() {
        let provider = Arc::new(MockLlmProvider::new(Some("[{\"company\": \"Acme\"}]")));
        let collaborator = LlmCollaborator::new(
            CollaboratorSpec::specialist("Researcher", "p"),
            provider.clone(),
        );
        let reply = collaborator.respond(&transcript()).await.unwrap();
        assert_eq!(reply, Reply::say("[{\"company\": \"Acme\"}]"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.last_messages.lock().unwrap()[0].content, "p");
    }

    #[tokio::test]
    async fn test_llm_collaborator_empty_response() {
        let provider = Arc::new(MockLlmProvider::new(None));
        let collaborator =
            LlmCollaborator::new(CollaboratorSpec::specialist("Researcher", "p"), provider);
        let err = collaborator.respond(&transcript()).await.unwrap_err();
        assert!(matches!(err, AgentError::ResponseParseError(_)));
    }

    #[tokio::test]
    async fn test_llm_collaborator_provider_failure() {
        let collaborator = LlmCollaborator::new(
            CollaboratorSpec::specialist("Researcher", "p"),
            Arc::new(FailingProvider),
        );
        let err = collaborator.respond(&transcript()).await.unwrap_err();
        assert!(matches!(err, AgentError::ExternalCallFailure(_)));
    }

    #[tokio::test]
    async fn test_requester_terminates_on_keyword() {
        let seed = RequesterSeed::new("User");
        let mut transcript = transcript();
        assert_eq!(seed.respond(&transcript).await.unwrap(), Reply::pass());

        transcript.push(Turn::new("EmailAgent", "All done. TERMINATE"));
        assert_eq!(seed.respond(&transcript).await.unwrap(), Reply::done());
    }

    #[tokio::test]
    async fn test_requester_ignores_keyword_before_its_last_turn() {
        let seed = RequesterSeed::new("User");
        let transcript: Transcript = [
            Turn::new("EmailAgent", "TERMINATE"),
            Turn::new("User", "keep going"),
            Turn::new("Researcher", "more"),
        ]
        .into_iter()
        .collect();
        assert!(!seed.respond(&transcript).await.unwrap().done);
    }

    #[tokio::test]
    async fn test_scripted_collaborator_sequence() {
        let scripted = ScriptedCollaborator::with_replies("Matcher", ["one", "two"])
            .then_reply(Reply::finish("three"))
            .then_fail("boom");
        let t = Transcript::new();
        assert_eq!(scripted.respond(&t).await.unwrap(), Reply::say("one"));
        assert_eq!(scripted.respond(&t).await.unwrap(), Reply::say("two"));
        assert!(scripted.respond(&t).await.unwrap().done);
        assert!(scripted.respond(&t).await.is_err());
        assert_eq!(scripted.respond(&t).await.unwrap(), Reply::pass());
    }
}
