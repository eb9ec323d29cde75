use crate::error::Result;
use crate::interpreter::{GenerationObserver, GenerationState, StreamInterpreter};
use crate::models::{GenerationOutcome, ImageGenerationRequest, ReferenceImage, StreamChunk};
use crate::openai::chat_client::DEFAULT_IMAGE_MODEL;
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Source of content fragments for a generation. Implemented by
/// [`crate::openai::OpenAiClient`]; tests drive sessions with scripted
/// in-memory streams.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn stream_generation(&self, request: &ImageGenerationRequest) -> Result<FragmentStream>;

    fn model_for(&self, request: &ImageGenerationRequest) -> String {
        request
            .model_id
            .clone()
            .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string())
    }
}

/// One user-facing generation workflow: a mutable prompt, at most one
/// reference image, and the observable output state of the latest traversal.
///
/// Traversals are serialized by the `&mut self` receiver, so a session never
/// observes interleaved streams.
pub struct GenerationSession<B: CompletionBackend> {
    backend: B,
    prompt: String,
    reference_image: Option<ReferenceImage>,
    model_id: Option<String>,
    interpreter: StreamInterpreter,
}

impl<B: CompletionBackend> GenerationSession<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            prompt: String::new(),
            reference_image: None,
            model_id: None,
            interpreter: StreamInterpreter::new(),
        }
    }

    pub fn with_observer(backend: B, observer: Box<dyn GenerationObserver>) -> Self {
        Self {
            interpreter: StreamInterpreter::with_observer(observer),
            ..Self::new(backend)
        }
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn set_model(&mut self, model_id: impl Into<String>) {
        self.model_id = Some(model_id.into());
    }

    /// Replaces the reference image. Output state from a previous run depends
    /// on the old image, so it is reset as well.
    pub fn set_reference_image(&mut self, image: ReferenceImage) {
        self.reference_image = Some(image);
        self.interpreter.reset();
    }

    pub fn clear_reference_image(&mut self) {
        self.reference_image = None;
        self.interpreter.reset();
    }

    pub fn reference_image(&self) -> Option<&ReferenceImage> {
        self.reference_image.as_ref()
    }

    /// Drops the result image while keeping the rest of the state.
    pub fn dismiss_image(&mut self) {
        self.interpreter.clear_image();
    }

    pub fn state(&self) -> &GenerationState {
        self.interpreter.state()
    }

    /// Runs one full generation: resets output state, opens the stream, and
    /// folds every fragment until the stream closes. On transport failure the
    /// state keeps its last observed values.
    pub async fn generate(&mut self) -> Result<GenerationOutcome> {
        let request = ImageGenerationRequest {
            prompt: self.prompt.clone(),
            reference_image: self.reference_image.clone(),
            model_id: self.model_id.clone(),
        };
        let model = self.backend.model_for(&request);

        // Stale values from the previous run must never be observable once a
        // new generation has started.
        self.interpreter.reset();

        log::info!("Starting generation with model: {}", model);
        let stream = self.backend.stream_generation(&request).await?;
        let state = self.interpreter.run(stream).await?;

        log::info!(
            "Generation complete: progress={}%, image={}",
            state.progress,
            if state.image_url.is_empty() {
                "<none>"
            } else {
                &state.image_url
            }
        );

        Ok(GenerationOutcome {
            image_url: state.image_url,
            progress: state.progress,
            model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenAiError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedBackend {
        scripts: Mutex<VecDeque<Vec<Result<StreamChunk>>>>,
    }

    impl ScriptedBackend {
        fn new(scripts: Vec<Vec<Result<StreamChunk>>>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn stream_generation(
            &self,
            _request: &ImageGenerationRequest,
        ) -> Result<FragmentStream> {
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted stream left");
            Ok(Box::pin(tokio_stream::iter(script)))
        }
    }

    fn chunk(text: &str) -> Result<StreamChunk> {
        Ok(StreamChunk {
            chunk: text.to_string(),
            done: false,
            finish_reason: None,
        })
    }

    #[tokio::test]
    async fn test_generate_returns_final_state() {
        let backend = ScriptedBackend::new(vec![vec![
            chunk("5.."),
            chunk("here [x](https://img/a.png)"),
            chunk("20.."),
        ]]);
        let mut session = GenerationSession::new(backend);
        session.set_prompt("redraw this photo in cyberpunk style");

        let outcome = session.generate().await.unwrap();
        assert_eq!(outcome.progress, 20);
        assert_eq!(outcome.image_url, "https://img/a.png");
        assert_eq!(outcome.model, DEFAULT_IMAGE_MODEL);
    }

    #[tokio::test]
    async fn test_new_generation_resets_previous_results() {
        let backend = ScriptedBackend::new(vec![
            vec![chunk("80.."), chunk("[x](https://img/old.png)")],
            vec![chunk("hello")],
        ]);
        let mut session = GenerationSession::new(backend);

        session.generate().await.unwrap();
        assert_eq!(session.state().image_url, "https://img/old.png");

        // Second run matches nothing; stale results must not leak through
        let outcome = session.generate().await.unwrap();
        assert_eq!(outcome.progress, 0);
        assert_eq!(outcome.image_url, "");
    }

    #[tokio::test]
    async fn test_transport_failure_retains_state() {
        let backend = ScriptedBackend::new(vec![vec![
            chunk("60.."),
            Err(GenAiError::StreamError("connection reset".into())),
        ]]);
        let mut session = GenerationSession::new(backend);

        let err = session.generate().await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(session.state().progress, 60);
    }

    #[tokio::test]
    async fn test_dismiss_image_keeps_progress() {
        let backend =
            ScriptedBackend::new(vec![vec![chunk("90.."), chunk("[x](https://img/b.png)")]]);
        let mut session = GenerationSession::new(backend);

        session.generate().await.unwrap();
        session.dismiss_image();
        assert_eq!(session.state().image_url, "");
        assert_eq!(session.state().progress, 90);
    }

    #[tokio::test]
    async fn test_clearing_reference_image_resets_output() {
        let backend =
            ScriptedBackend::new(vec![vec![chunk("50.."), chunk("[x](https://img/c.png)")]]);
        let mut session = GenerationSession::new(backend);
        session.set_reference_image(ReferenceImage::from_bytes("image/png", b"x"));

        session.generate().await.unwrap();
        session.clear_reference_image();

        assert!(session.reference_image().is_none());
        assert_eq!(session.state(), &GenerationState::default());
    }

    #[tokio::test]
    async fn test_explicit_model_reported_in_outcome() {
        let backend = ScriptedBackend::new(vec![vec![chunk("1..")]]);
        let mut session = GenerationSession::new(backend);
        session.set_model("gpt-4o");

        let outcome = session.generate().await.unwrap();
        assert_eq!(outcome.model, "gpt-4o");
    }
}
