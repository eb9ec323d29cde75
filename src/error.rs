use std::fmt;

#[derive(Debug)]
pub enum GenAiError {
    ClientError(String),
    RequestError(String),
    ResponseError(String),
    StreamError(String),
    IoError(String),
}

impl fmt::Display for GenAiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenAiError::ClientError(msg) => write!(f, "Client error: {}", msg),
            GenAiError::RequestError(msg) => write!(f, "Request error: {}", msg),
            GenAiError::ResponseError(msg) => write!(f, "Response error: {}", msg),
            GenAiError::StreamError(msg) => write!(f, "Stream error: {}", msg),
            GenAiError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for GenAiError {}

pub type Result<T> = std::result::Result<T, GenAiError>;
