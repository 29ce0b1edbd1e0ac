use std::error::Error as StdError;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StreamingError>;

/// Errors surfaced by the confirmation core.
///
/// `Configuration` errors are raised at construction time and are fatal.
/// `Recognizer`/`Tokenizer`/`Vad` wrap whatever the corresponding
/// collaborator returned and bubble unchanged from the `process_iter`/
/// `insert_audio_chunk` call that triggered them — the processor's own state
/// remains consistent and the call may be retried with the next chunk.
#[derive(Error, Debug)]
pub enum StreamingError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("recognizer error: {0}")]
    Recognizer(#[source] Box<dyn StdError + Send + Sync>),

    #[error("sentence tokenizer error: {0}")]
    Tokenizer(#[source] Box<dyn StdError + Send + Sync>),

    #[error("voice activity detector error: {0}")]
    Vad(#[source] Box<dyn StdError + Send + Sync>),
}

impl StreamingError {
    pub fn recognizer(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::Recognizer(Box::new(err))
    }

    pub fn tokenizer(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::Tokenizer(Box::new(err))
    }

    pub fn vad(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::Vad(Box::new(err))
    }
}
