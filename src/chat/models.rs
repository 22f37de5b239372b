//! The core models for keeping a conversation with an LLM in memory.
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in a conversation. Turns are never edited once they
/// are part of a `Conversation`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn new(role: Role, text: &str) -> Self {
        Self {
            role,
            text: text.to_string(),
        }
    }

    pub fn user(text: &str) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: &str) -> Self {
        Self::new(Role::Assistant, text)
    }
}

/// Append-only list of turns in chronological order. The only other
/// mutation allowed is dropping the oldest turns to stay under the
/// retention ceiling, or clearing everything.
#[derive(Default, Clone, Debug)]
pub struct Conversation {
    turns: Vec<Turn>,
    limit: Option<usize>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// A conversation that keeps at most `limit` of the most recent
    /// turns.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            turns: Vec::new(),
            limit: Some(limit),
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.truncate();
    }

    /// Append several turns and only then apply the retention ceiling
    /// so that a user/assistant pair is never split by truncation
    /// partway through.
    pub fn extend(&mut self, turns: impl IntoIterator<Item = Turn>) {
        self.turns.extend(turns);
        self.truncate();
    }

    fn truncate(&mut self) {
        if let Some(limit) = self.limit
            && self.turns.len() > limit
        {
            let excess = self.turns.len() - limit;
            self.turns.drain(..excess);
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_serialization() {
        let turn = Turn::user("hello");
        assert_eq!(
            serde_json::to_string(&turn).unwrap(),
            r#"{"role":"user","text":"hello"}"#
        );
        let turn: Turn = serde_json::from_str(r#"{"role":"assistant","text":"hi"}"#).unwrap();
        assert_eq!(turn, Turn::assistant("hi"));
    }

    #[test]
    fn test_unbounded_conversation_keeps_everything() {
        let mut convo = Conversation::new();
        for i in 0..100 {
            convo.push(Turn::user(&i.to_string()));
        }
        assert_eq!(convo.len(), 100);
        assert_eq!(convo.turns()[0].text, "0");
    }

    #[test]
    fn test_limit_drops_oldest_first() {
        let mut convo = Conversation::with_limit(4);
        for i in 0..6 {
            convo.push(Turn::user(&i.to_string()));
        }
        let texts: Vec<&str> = convo.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["2", "3", "4", "5"]);
    }

    #[test]
    fn test_extend_truncates_once() {
        let mut convo = Conversation::with_limit(3);
        convo.extend(vec![Turn::user("a"), Turn::assistant("b")]);
        convo.extend(vec![Turn::user("c"), Turn::assistant("d")]);
        assert_eq!(convo.len(), 3);
        assert_eq!(convo.turns()[0], Turn::assistant("b"));
        assert_eq!(convo.last(), Some(&Turn::assistant("d")));
    }

    #[test]
    fn test_recent() {
        let mut convo = Conversation::new();
        convo.extend(vec![Turn::user("a"), Turn::assistant("b"), Turn::user("c")]);
        assert_eq!(convo.recent(2), &[Turn::assistant("b"), Turn::user("c")]);
        assert_eq!(convo.recent(10).len(), 3);
        assert!(convo.recent(0).is_empty());
    }

    #[test]
    fn test_clear() {
        let mut convo = Conversation::with_limit(20);
        convo.push(Turn::user("a"));
        convo.clear();
        assert!(convo.is_empty());
    }
}
