#![doc = include_str!("../README.md")]
pub mod audio;
pub mod collaborators;
pub mod confirmation;
pub mod utils;

pub use collaborators::{
    CommittedWord, Hypothesis, NoTokenizer, Recognizer, SentenceTokenizer, TimedWord, VadEvent,
    VoiceActivityDetector,
};
pub use confirmation::hypothesis_buffer::HypothesisBuffer;
pub use confirmation::online_processor::{ConfirmedSpan, OnlineProcessor, OnlineProcessorBuilder};
pub use confirmation::vac_processor::{VacProcessor, VoiceStatus};
pub use utils::config::{OnlineProcessorConfig, TrimPolicy, VacProcessorConfig};
pub use utils::errors::StreamingError;

/// Sample rate assumed throughout the crate: 16kHz mono.
pub const SAMPLE_RATE: f64 = 16_000.0;

/// A single 32-bit float audio sample at [`SAMPLE_RATE`].
pub type Sample = f32;
