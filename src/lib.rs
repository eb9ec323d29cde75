pub mod config;
pub mod error;
pub mod interpreter;
pub mod logger;
pub mod models;
pub mod openai;
pub mod session;

pub use config::Config;
pub use error::{GenAiError, Result};
pub use interpreter::{
    FragmentSignal, GenerationObserver, GenerationState, NullObserver, StreamInterpreter,
};
pub use models::{
    GenerationOutcome, ImageGenerationRequest, ModelCategory, ModelInfo, ReferenceImage,
    StreamChunk,
};
pub use openai::{ChatClient, OpenAiClient, OpenAiConfig};
pub use session::{CompletionBackend, FragmentStream, GenerationSession};
