//! The narrow interfaces through which this crate consumes its three
//! external collaborators: a speech recognizer, a sentence tokenizer, and a
//! voice activity detector. None of the three is implemented here — see
//! spec §1 "Out of scope (external collaborators)".

use crate::utils::errors::StreamingError;
use crate::Sample;

/// A word with a time span, text shared cheaply via `Arc<str>`.
///
/// `begin`/`end` are expressed in seconds. For a [`Hypothesis`] they are
/// window-local (relative to the start of the recognizer's current audio
/// window); for a committed word they are absolute stream time.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimedWord {
    pub begin: f64,
    pub end: f64,
    pub text: std::sync::Arc<str>,
}

impl TimedWord {
    pub fn new(begin: f64, end: f64, text: impl Into<std::sync::Arc<str>>) -> Self {
        Self {
            begin,
            end,
            text: text.into(),
        }
    }

    /// Returns a copy of this word with `offset` added to both timestamps.
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            begin: self.begin + offset,
            end: self.end + offset,
            text: self.text.clone(),
        }
    }
}

/// One complete recognizer output over the current audio window, in
/// window-local time.
pub type Hypothesis = Vec<TimedWord>;

/// A committed word, in absolute stream time.
pub type CommittedWord = TimedWord;

/// A voice-activity event, in absolute input frames since stream start.
///
/// Represented as a tagged sum rather than an associative map with optional
/// keys (spec §9, "VAD event shape": a map-of-optionals has "repeatedly
/// produced bugs around which keys are present").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VadEvent {
    /// Voice started at this absolute frame.
    Start(u64),
    /// Voice ended at this absolute frame.
    End(u64),
    /// A complete voiced segment, known in full by the time the VAD reports
    /// it (e.g. a VAD that buffers internally before emitting).
    StartEnd(u64, u64),
}

/// A pluggable speech recognizer.
///
/// `Output` is an opaque handle the core never inspects directly — only
/// through [`Recognizer::ts_words`] and [`Recognizer::segments_end_ts`]
/// (spec §9, "Opaque recognizer result").
pub trait Recognizer {
    type Output;

    /// Transcribes `samples`, conditioning on `init_prompt` (a short suffix
    /// of previously committed text, joined with [`Recognizer::separator`]).
    fn transcribe(
        &self,
        samples: &[Sample],
        init_prompt: &str,
    ) -> Result<Self::Output, StreamingError>;

    /// Extracts the timestamped words from a transcription result, in
    /// window-local seconds.
    fn ts_words(&self, result: &Self::Output) -> Hypothesis;

    /// Extracts segment end timestamps from a transcription result, sorted
    /// non-decreasing, in window-local seconds.
    fn segments_end_ts(&self, result: &Self::Output) -> Vec<f64>;

    /// The separator used to join words into displayable text.
    fn separator(&self) -> &str;
}

/// A pluggable sentence tokenizer.
pub trait SentenceTokenizer {
    /// Segments `texts` (conventionally a single joined string) into
    /// ordered sentence strings. Every word of the input appears as a
    /// substring of exactly one output sentence, in order.
    fn tokenize(&self, texts: &[String]) -> Result<Vec<String>, StreamingError>;
}

/// A placeholder [`SentenceTokenizer`] for callers whose
/// [`TrimPolicy`](crate::utils::config::TrimPolicy) never needs sentence
/// segmentation. Always fails; an `OnlineProcessor` built with
/// `TrimPolicy::Sentence` and no real tokenizer is rejected at construction
/// time, so this is only ever reachable through a configuration bug.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTokenizer;

impl SentenceTokenizer for NoTokenizer {
    fn tokenize(&self, _texts: &[String]) -> Result<Vec<String>, StreamingError> {
        Err(StreamingError::Configuration(
            "no sentence tokenizer configured".to_string(),
        ))
    }
}

/// A pluggable voice activity detector.
pub trait VoiceActivityDetector {
    /// Processes one ingested chunk and returns the detected event, if any.
    fn detect(&mut self, chunk: &[Sample]) -> Result<Option<VadEvent>, StreamingError>;
}
