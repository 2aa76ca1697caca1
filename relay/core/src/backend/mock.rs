//! Scripted adapter
//!
//! Replays a fixed script instead of calling an upstream. Scripts are either
//! canonical deltas or raw wire lines; raw lines go through the real decoder
//! for their format, so a script can reproduce exactly what a provider sends.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;

use super::decoder::decode_stream;
use super::traits::{Delta, DeltaStream, LlmRequest, ProviderAdapter, WireFormat};

#[derive(Clone, Debug)]
enum Script {
    Deltas(Vec<Delta>),
    Wire(Vec<String>),
    Stall(Vec<Delta>),
}

/// Adapter that replays a script
#[derive(Clone, Debug)]
pub struct ScriptedAdapter {
    name: String,
    format: WireFormat,
    script: Script,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<LlmRequest>>>,
}

impl ScriptedAdapter {
    /// Replay canonical deltas
    pub fn from_deltas(name: impl Into<String>, deltas: Vec<Delta>) -> Self {
        Self::with_script(name, WireFormat::OpenAi, Script::Deltas(deltas))
    }

    /// Replay raw upstream lines through the decoder for `format`
    pub fn from_wire<I, S>(name: impl Into<String>, format: WireFormat, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines = lines.into_iter().map(Into::into).collect();
        Self::with_script(name, format, Script::Wire(lines))
    }

    /// Replay deltas, then never finish
    pub fn stalling(name: impl Into<String>, deltas: Vec<Delta>) -> Self {
        Self::with_script(name, WireFormat::OpenAi, Script::Stall(deltas))
    }

    /// Answer with a fixed text, split into word chunks
    pub fn echo(name: impl Into<String>, text: &str) -> Self {
        let mut deltas: Vec<Delta> = text
            .split_inclusive(' ')
            .map(|word| Delta::Chunk(word.to_string()))
            .collect();
        deltas.push(Delta::end());
        Self::from_deltas(name, deltas)
    }

    fn with_script(name: impl Into<String>, format: WireFormat, script: Script) -> Self {
        Self {
            name: name.into(),
            format,
            script,
            delay: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Pause before every item
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far
    #[must_use]
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().clone()
    }
}

fn paced<T: Send + 'static>(items: Vec<T>, delay: Option<Duration>, stall: bool) -> futures::stream::BoxStream<'static, T> {
    Box::pin(async_stream::stream! {
        for item in items {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            yield item;
        }
        if stall {
            futures::future::pending::<()>().await;
        }
    })
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn wire_format(&self) -> WireFormat {
        self.format
    }

    fn stream(&self, request: &LlmRequest) -> DeltaStream {
        self.requests.lock().push(request.clone());
        match &self.script {
            Script::Deltas(deltas) => paced(deltas.clone(), self.delay, false),
            Script::Stall(deltas) => paced(deltas.clone(), self.delay, true),
            Script::Wire(lines) => {
                let lines = paced(lines.clone(), self.delay, false);
                decode_stream(self.format, lines).boxed()
            }
        }
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_replays_deltas_and_records_requests() {
        let adapter = ScriptedAdapter::from_deltas(
            "mock",
            vec![Delta::Chunk("a".into()), Delta::end()],
        );
        let deltas: Vec<Delta> = adapter.stream(&LlmRequest::new("p", "m")).collect().await;

        assert_eq!(deltas, vec![Delta::Chunk("a".into()), Delta::end()]);
        assert_eq!(adapter.requests().len(), 1);
        assert_eq!(adapter.requests()[0].prompt, "p");
    }

    #[tokio::test]
    async fn test_wire_script_goes_through_decoder() {
        let adapter = ScriptedAdapter::from_wire(
            "gw",
            WireFormat::GreatWall,
            [
                r#"{"event":"message_start"}"#,
                r#"{"event":"message_finished","data":{"output":"done"}}"#,
            ],
        );
        let deltas: Vec<Delta> = adapter.stream(&LlmRequest::new("p", "m")).collect().await;
        assert_eq!(deltas, vec![Delta::Chunk("done".into()), Delta::end()]);
    }

    #[tokio::test]
    async fn test_echo_splits_words() {
        let adapter = ScriptedAdapter::echo("echo", "hello big world");
        let deltas: Vec<Delta> = adapter.stream(&LlmRequest::new("p", "m")).collect().await;
        assert_eq!(
            deltas,
            vec![
                Delta::Chunk("hello ".into()),
                Delta::Chunk("big ".into()),
                Delta::Chunk("world".into()),
                Delta::end()
            ]
        );
    }

    #[tokio::test]
    async fn test_stalling_script_never_finishes() {
        let adapter = ScriptedAdapter::stalling("slow", vec![Delta::Chunk("x".into())]);
        let mut stream = adapter.stream(&LlmRequest::new("p", "m"));

        assert_eq!(stream.next().await, Some(Delta::Chunk("x".into())));
        let next = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
        assert!(next.is_err());
    }
}
