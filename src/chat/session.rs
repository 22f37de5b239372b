//! A single interactive chat session kept entirely in memory.
//!
//! Each call to `Session::submit` appends the user's turn, asks the
//! backend for a reply and appends that reply. Failures of the
//! backend never escape `submit`: the error text becomes the
//! assistant's turn so the session stays usable.

use anyhow::{Error, Result};
use futures_util::StreamExt;

use super::models::{Conversation, Turn};
use crate::llm::{GenerationRequest, StreamingGenerator, TextGenerator};

pub enum Backend {
    /// Fragments are rendered as they arrive
    Streaming(Box<dyn StreamingGenerator>),
    /// One complete reply per call
    Complete(Box<dyn TextGenerator>),
}

impl Backend {
    pub fn model(&self) -> &str {
        match self {
            Backend::Streaming(g) => g.model(),
            Backend::Complete(g) => g.model(),
        }
    }
}

/// How much of the transcript is sent with each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    Full,
    LatestOnly,
}

pub struct Session {
    backend: Backend,
    conversation: Conversation,
    system: Option<String>,
    history_mode: HistoryMode,
}

impl Session {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            conversation: Conversation::new(),
            system: None,
            history_mode: HistoryMode::Full,
        }
    }

    pub fn system(mut self, system: &str) -> Self {
        self.system = Some(system.to_string());
        self
    }

    pub fn history_mode(mut self, mode: HistoryMode) -> Self {
        self.history_mode = mode;
        self
    }

    pub fn retention(mut self, limit: usize) -> Self {
        self.conversation = Conversation::with_limit(limit);
        self
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }

    pub fn turns(&self) -> &[Turn] {
        self.conversation.turns()
    }

    pub fn clear(&mut self) {
        self.conversation.clear();
    }

    fn request(&self) -> GenerationRequest {
        let turns = match self.history_mode {
            HistoryMode::Full => self.conversation.turns().to_vec(),
            HistoryMode::LatestOnly => self.conversation.recent(1).to_vec(),
        };
        GenerationRequest {
            system: self.system.clone(),
            turns,
        }
    }

    /// Send `text` and return the committed assistant turn.
    /// `on_update` receives the accumulated reply each time it grows,
    /// with the final text last.
    pub async fn submit<F>(&mut self, text: &str, mut on_update: F) -> Turn
    where
        F: FnMut(&str),
    {
        self.conversation.push(Turn::user(text));
        let request = self.request();

        let mut reply = String::new();
        let result = match &self.backend {
            Backend::Streaming(generator) => {
                stream_into(generator.as_ref(), &request, &mut reply, &mut on_update).await
            }
            Backend::Complete(generator) => generator.generate(&request).await.map(|text| {
                reply = text;
                on_update(&reply);
            }),
        };

        if let Err(e) = result {
            tracing::error!("Chat request to {} failed: {}", self.backend.model(), e);
            reply = fold_error(&reply, &e);
            on_update(&reply);
        }

        let turn = Turn::assistant(&reply);
        self.conversation.push(turn.clone());
        turn
    }
}

async fn stream_into<F>(
    generator: &dyn StreamingGenerator,
    request: &GenerationRequest,
    reply: &mut String,
    on_update: &mut F,
) -> Result<()>
where
    F: FnMut(&str),
{
    let mut fragments = generator.generate_stream(request).await?;
    while let Some(fragment) = fragments.next().await {
        reply.push_str(&fragment?);
        on_update(reply);
    }
    Ok(())
}

/// Turn a failed call into the text shown as the assistant's reply,
/// keeping whatever was already streamed.
fn fold_error(partial: &str, err: &Error) -> String {
    if partial.is_empty() {
        format!("Error: {}", err)
    } else {
        format!("{}\n\nError: {}", partial, err)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::bail;
    use async_trait::async_trait;
    use futures::stream;

    use super::*;
    use crate::llm::FragmentStream;

    /// Records every request and answers with canned text.
    struct Echo {
        requests: Arc<Mutex<Vec<GenerationRequest>>>,
        fail: bool,
    }

    #[async_trait]
    impl TextGenerator for Echo {
        async fn generate(&self, request: &GenerationRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail {
                bail!("connection refused");
            }
            Ok(format!("echo: {}", request.turns.last().unwrap().text))
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    struct Fragments(Vec<Result<&'static str, &'static str>>);

    #[async_trait]
    impl StreamingGenerator for Fragments {
        async fn generate_stream(&self, _request: &GenerationRequest) -> Result<FragmentStream> {
            let items: Vec<Result<String>> = self
                .0
                .iter()
                .map(|r| match r {
                    Ok(s) => Ok(s.to_string()),
                    Err(e) => Err(anyhow::anyhow!(e.to_string())),
                })
                .collect();
            Ok(Box::pin(stream::iter(items)))
        }

        fn model(&self) -> &str {
            "fragments"
        }
    }

    fn echo(fail: bool) -> (Session, Arc<Mutex<Vec<GenerationRequest>>>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let backend = Backend::Complete(Box::new(Echo {
            requests: Arc::clone(&requests),
            fail,
        }));
        (Session::new(backend), requests)
    }

    #[tokio::test]
    async fn test_full_history_is_sent_with_system() {
        let (session, requests) = echo(false);
        let mut session = session.system("You are a helpful assistant.");
        session.submit("one", |_| {}).await;
        let reply = session.submit("two", |_| {}).await;

        assert_eq!(reply, Turn::assistant("echo: two"));
        assert_eq!(session.turns().len(), 4);
        let last = requests.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.system.as_deref(), Some("You are a helpful assistant."));
        assert_eq!(
            last.turns,
            vec![Turn::user("one"), Turn::assistant("echo: one"), Turn::user("two")]
        );
    }

    #[tokio::test]
    async fn test_latest_only_sends_one_turn() {
        let (session, requests) = echo(false);
        let mut session = session.history_mode(HistoryMode::LatestOnly);
        session.submit("one", |_| {}).await;
        session.submit("two", |_| {}).await;

        let last = requests.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.turns, vec![Turn::user("two")]);
        assert_eq!(session.turns().len(), 4);
    }

    #[tokio::test]
    async fn test_failure_becomes_assistant_turn() {
        let (mut session, _) = echo(true);
        let mut rendered = Vec::new();
        let reply = session
            .submit("hello", |text| rendered.push(text.to_string()))
            .await;

        assert_eq!(reply.text, "Error: connection refused");
        assert_eq!(rendered, vec!["Error: connection refused"]);
        assert_eq!(
            session.turns(),
            &[Turn::user("hello"), Turn::assistant("Error: connection refused")]
        );
    }

    #[tokio::test]
    async fn test_streaming_rerenders_accumulated_text() {
        let backend = Backend::Streaming(Box::new(Fragments(vec![Ok("Hel"), Ok("lo"), Ok("!")])));
        let mut session = Session::new(backend);
        let mut rendered = Vec::new();
        let reply = session
            .submit("hi", |text| rendered.push(text.to_string()))
            .await;

        assert_eq!(rendered, vec!["Hel", "Hello", "Hello!"]);
        assert_eq!(reply, Turn::assistant("Hello!"));
        assert_eq!(session.turns().len(), 2);
    }

    #[tokio::test]
    async fn test_streaming_error_keeps_partial_text() {
        let backend = Backend::Streaming(Box::new(Fragments(vec![Ok("Hel"), Err("reset")])));
        let mut session = Session::new(backend);
        let reply = session.submit("hi", |_| {}).await;
        assert_eq!(reply.text, "Hel\n\nError: reset");
    }

    #[tokio::test]
    async fn test_retention_and_clear() {
        let (session, _) = echo(false);
        let mut session = session.retention(3);
        session.submit("one", |_| {}).await;
        session.submit("two", |_| {}).await;
        assert_eq!(session.turns().len(), 3);
        assert_eq!(session.turns()[0], Turn::assistant("echo: one"));

        session.clear();
        assert!(session.turns().is_empty());
    }
}
