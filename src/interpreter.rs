use crate::error::Result;
use crate::models::StreamChunk;
use futures::stream::Stream;
use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;

/// Percent-complete marker the generation service embeds in free text,
/// e.g. "42..".
static PROGRESS_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\.\.").unwrap());

/// Markdown image link carrying the final generated image, e.g.
/// "[result](https://img/a.png)".
static IMAGE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[.*\]\((.*)\)").unwrap());

/// Classification of one streamed content fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentSignal {
    Progress(u32),
    Image(String),
    Text,
}

impl FragmentSignal {
    /// Applies the two patterns in fixed priority order. A fragment matching
    /// both is classified as progress; the image branch is skipped.
    pub fn classify(fragment: &str) -> Self {
        if let Some(caps) = PROGRESS_PATTERN.captures(fragment) {
            if let Ok(value) = caps[1].parse::<u32>() {
                return FragmentSignal::Progress(value);
            }
        }

        if let Some(caps) = IMAGE_PATTERN.captures(fragment) {
            return FragmentSignal::Image(caps[1].to_string());
        }

        FragmentSignal::Text
    }
}

/// Observable output of a generation traversal. Progress is the most recent
/// value reported by the service, taken as-is: values outside 0-100 and
/// decreasing sequences are not rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationState {
    pub progress: u32,
    pub image_url: String,
}

/// Callbacks fired as the interpreter mutates its state. Implemented by the
/// presentation layer; the default implementation ignores everything.
pub trait GenerationObserver: Send {
    fn on_progress(&mut self, _percent: u32) {}
    fn on_image(&mut self, _url: &str) {}
    fn on_complete(&mut self, _state: &GenerationState) {}
}

/// No-op observer for callers that only poll [`StreamInterpreter::state`].
pub struct NullObserver;

impl GenerationObserver for NullObserver {}

/// Consumes content fragments from a chat completion stream in arrival order
/// and folds them into a [`GenerationState`].
pub struct StreamInterpreter {
    state: GenerationState,
    observer: Box<dyn GenerationObserver>,
}

impl Default for StreamInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamInterpreter {
    pub fn new() -> Self {
        Self {
            state: GenerationState::default(),
            observer: Box::new(NullObserver),
        }
    }

    pub fn with_observer(observer: Box<dyn GenerationObserver>) -> Self {
        Self {
            state: GenerationState::default(),
            observer,
        }
    }

    pub fn state(&self) -> &GenerationState {
        &self.state
    }

    /// Returns state to its defaults. Must run before the first fragment of a
    /// new traversal arrives so stale results from a previous run are never
    /// observable.
    pub fn reset(&mut self) {
        self.state = GenerationState::default();
    }

    pub fn clear_image(&mut self) {
        self.state.image_url.clear();
    }

    /// Processes one fragment, updating at most one of the two output values.
    pub fn apply(&mut self, fragment: &str) -> FragmentSignal {
        let signal = FragmentSignal::classify(fragment);
        match &signal {
            FragmentSignal::Progress(percent) => {
                self.state.progress = *percent;
                self.observer.on_progress(*percent);
            }
            FragmentSignal::Image(url) => {
                self.state.image_url = url.clone();
                self.observer.on_image(url);
            }
            FragmentSignal::Text => {}
        }
        signal
    }

    /// Drives a full traversal: applies each chunk in arrival order until the
    /// stream closes, then signals completion. A transport error aborts the
    /// traversal; state keeps its last values.
    pub async fn run<S>(&mut self, mut stream: S) -> Result<GenerationState>
    where
        S: Stream<Item = Result<StreamChunk>> + Unpin,
    {
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            log::debug!("Stream fragment: {:?}", chunk.chunk);
            self.apply(&chunk.chunk);
            if chunk.done {
                break;
            }
        }

        self.observer.on_complete(&self.state);
        Ok(self.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenAiError;

    fn chunk(text: &str) -> Result<StreamChunk> {
        Ok(StreamChunk {
            chunk: text.to_string(),
            done: false,
            finish_reason: None,
        })
    }

    #[test]
    fn test_progress_fragment_updates_progress() {
        let mut interpreter = StreamInterpreter::new();
        interpreter.apply("42..");
        assert_eq!(interpreter.state().progress, 42);

        interpreter.apply("Progress: 7..");
        assert_eq!(interpreter.state().progress, 7);
    }

    #[test]
    fn test_image_fragment_updates_image() {
        let mut interpreter = StreamInterpreter::new();
        interpreter.apply("here [x](https://img/a.png)");
        assert_eq!(interpreter.state().image_url, "https://img/a.png");
        assert_eq!(interpreter.state().progress, 0);
    }

    #[test]
    fn test_progress_wins_when_both_match() {
        let mut interpreter = StreamInterpreter::new();
        interpreter.apply("55.. [done](https://img/b.png)");
        assert_eq!(interpreter.state().progress, 55);
        assert_eq!(interpreter.state().image_url, "");
    }

    #[test]
    fn test_later_fragment_overwrites_earlier() {
        let mut interpreter = StreamInterpreter::new();
        interpreter.apply("10..");
        interpreter.apply("30..");
        assert_eq!(interpreter.state().progress, 30);
    }

    #[test]
    fn test_unrelated_fragment_changes_nothing() {
        let mut interpreter = StreamInterpreter::new();
        interpreter.apply("20..");
        interpreter.apply("hello");
        interpreter.apply("");
        assert_eq!(interpreter.state().progress, 20);
        assert_eq!(interpreter.state().image_url, "");
    }

    #[test]
    fn test_out_of_range_progress_accepted() {
        let mut interpreter = StreamInterpreter::new();
        interpreter.apply("250..");
        assert_eq!(interpreter.state().progress, 250);

        interpreter.apply("5..");
        assert_eq!(interpreter.state().progress, 5);
    }

    #[test]
    fn test_reset_returns_defaults() {
        let mut interpreter = StreamInterpreter::new();
        interpreter.apply("90..");
        interpreter.apply("[x](https://img/c.png)");
        interpreter.reset();
        assert_eq!(interpreter.state(), &GenerationState::default());
    }

    #[tokio::test]
    async fn test_full_traversal_scenario() {
        let fragments = vec![
            chunk("Progress: 5.."),
            chunk("here [x](https://img/a.png)"),
            chunk("20.."),
        ];
        let mut interpreter = StreamInterpreter::new();
        let state = interpreter
            .run(tokio_stream::iter(fragments))
            .await
            .unwrap();

        assert_eq!(state.progress, 20);
        assert_eq!(state.image_url, "https://img/a.png");
    }

    #[tokio::test]
    async fn test_stream_without_image_leaves_image_empty() {
        let fragments = vec![chunk("10.."), chunk("90..")];
        let mut interpreter = StreamInterpreter::new();
        let state = interpreter
            .run(tokio_stream::iter(fragments))
            .await
            .unwrap();

        assert_eq!(state.progress, 90);
        assert_eq!(state.image_url, "");
    }

    #[tokio::test]
    async fn test_transport_error_keeps_last_values() {
        let fragments = vec![
            chunk("40.."),
            Err(GenAiError::StreamError("connection reset".into())),
        ];
        let mut interpreter = StreamInterpreter::new();
        let err = interpreter
            .run(tokio_stream::iter(fragments))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("connection reset"));
        assert_eq!(interpreter.state().progress, 40);
    }

    #[tokio::test]
    async fn test_observer_sees_updates_in_order() {
        use std::sync::{Arc, Mutex};

        struct Recorder {
            events: Arc<Mutex<Vec<String>>>,
        }

        impl GenerationObserver for Recorder {
            fn on_progress(&mut self, percent: u32) {
                self.events.lock().unwrap().push(format!("progress:{}", percent));
            }
            fn on_image(&mut self, url: &str) {
                self.events.lock().unwrap().push(format!("image:{}", url));
            }
            fn on_complete(&mut self, state: &GenerationState) {
                self.events.lock().unwrap().push(format!("complete:{}", state.progress));
            }
        }

        let events = Arc::new(Mutex::new(Vec::new()));
        let mut interpreter = StreamInterpreter::with_observer(Box::new(Recorder {
            events: events.clone(),
        }));
        let fragments = vec![chunk("10.."), chunk("[x](https://img/d.png)")];
        interpreter.run(tokio_stream::iter(fragments)).await.unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec!["progress:10", "image:https://img/d.png", "complete:10"]
        );
    }

    #[test]
    fn test_empty_url_capture_passes_through() {
        let mut interpreter = StreamInterpreter::new();
        interpreter.apply("[alt]()");
        assert_eq!(interpreter.state().image_url, "");
    }
}
