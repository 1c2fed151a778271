use serde::{Deserialize, Serialize};

/// One collaborator's contribution to the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: String,
    pub content: String,
}

impl Turn {
    pub fn new(speaker: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            content: content.into(),
        }
    }

    /// First 100 characters of the content, for logs and events.
    pub fn preview(&self) -> String {
        let trimmed = self.content.trim();
        if trimmed.chars().count() > 100 {
            format!("{}...", trimmed.chars().take(100).collect::<String>())
        } else {
            trimmed.to_string()
        }
    }
}

/// Append-only record of a single pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Turns by `speaker`, most recent first.
    pub fn latest_by<'a>(&'a self, speaker: &'a str) -> impl Iterator<Item = &'a Turn> + 'a {
        self.turns.iter().rev().filter(move |turn| turn.speaker == speaker)
    }

    /// Turns appended after the most recent turn by `speaker`.
    pub fn since_last(&self, speaker: &str) -> &[Turn] {
        match self.turns.iter().rposition(|turn| turn.speaker == speaker) {
            Some(index) => &self.turns[index + 1..],
            None => &self.turns,
        }
    }
}

impl FromIterator<Turn> for Transcript {
    fn from_iter<I: IntoIterator<Item = Turn>>(iter: I) -> Self {
        Self {
            turns: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transcript {
        [
            Turn::new("User", "find leads"),
            Turn::new("Researcher", "r1"),
            Turn::new("LeadLogger", "l1"),
            Turn::new("User", ""),
            Turn::new("Researcher", "r2"),
            Turn::new("LeadLogger", "l2"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_latest_by_is_reverse_order() {
        let transcript = sample();
        let contents: Vec<_> = transcript
            .latest_by("LeadLogger")
            .map(|t| t.content.as_str())
            .collect();
        assert_eq!(contents, vec!["l2", "l1"]);
    }

    #[test]
    fn test_since_last() {
        let transcript = sample();
        assert_eq!(transcript.since_last("User").len(), 2);
        assert_eq!(transcript.since_last("Nobody").len(), 6);
        assert!(transcript.since_last("LeadLogger").is_empty());
    }

    #[test]
    fn test_preview_is_char_safe() {
        let turn = Turn::new("EmailAgent", "é".repeat(150));
        let preview = turn.preview();
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 103);
    }
}
