use std::collections::VecDeque;

use crate::audio::AudioRingBuffer;
use crate::collaborators::{CommittedWord, Recognizer, SentenceTokenizer};
use crate::confirmation::hypothesis_buffer::HypothesisBuffer;
use crate::utils::config::{OnlineProcessorConfig, TrimPolicy};
use crate::utils::errors::StreamingError;

/// Target length of the recognizer's conditioning prompt, in characters.
const PROMPT_BUDGET_CHARS: usize = 200;

/// One chunk of newly confirmed transcript: a time span plus its text.
///
/// `begin`/`end` are `None` when nothing was confirmed this call.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConfirmedSpan {
    pub begin: Option<f64>,
    pub end: Option<f64>,
    pub text: String,
}

impl ConfirmedSpan {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn from_words(words: &[CommittedWord], sep: &str) -> Self {
        match (words.first(), words.last()) {
            (Some(first), Some(last)) => Self {
                begin: Some(first.begin),
                end: Some(last.end),
                text: words
                    .iter()
                    .map(|w| w.text.as_ref())
                    .collect::<Vec<_>>()
                    .join(sep),
            },
            _ => Self::default(),
        }
    }
}

/// Reconciles a growing audio window against a pluggable [`Recognizer`],
/// using a [`HypothesisBuffer`] to confirm words by double agreement and
/// trimming the window at segment or sentence boundaries so it never grows
/// unbounded.
///
/// Built via [`OnlineProcessorBuilder`]. One instance lives for the duration
/// of a single utterance; call [`OnlineProcessor::init`] to start the next.
pub struct OnlineProcessor<R: Recognizer, T: SentenceTokenizer> {
    recognizer: R,
    tokenizer: Option<T>,
    config: OnlineProcessorConfig,
    audio_buffer: AudioRingBuffer,
    buffer_time_offset: f64,
    committed: Vec<CommittedWord>,
    transcript_buffer: HypothesisBuffer,
}

impl<R: Recognizer, T: SentenceTokenizer> OnlineProcessor<R, T> {
    /// Resets all state for a fresh utterance starting at `offset` (absolute
    /// stream time, seconds).
    pub fn init(&mut self, offset: f64) {
        self.audio_buffer.clear();
        self.committed.clear();
        self.transcript_buffer.init(offset);
        self.buffer_time_offset = offset;
    }

    /// Appends newly captured samples to the analysis window.
    pub fn insert_audio_chunk(&mut self, samples: &[crate::Sample]) {
        self.audio_buffer.push(samples);
    }

    pub fn buffer_time_offset(&self) -> f64 {
        self.buffer_time_offset
    }

    pub fn committed(&self) -> &[CommittedWord] {
        &self.committed
    }

    pub fn audio_window_seconds(&self) -> f64 {
        self.audio_buffer.len_seconds()
    }

    /// Transcribes the current window, reconciles it against the running
    /// hypothesis, trims the window if a boundary was crossed, and returns
    /// whatever text was newly confirmed.
    pub fn process_iter(&mut self) -> Result<ConfirmedSpan, StreamingError> {
        let (prompt, context) = self.prompt();
        log::debug!("prompt: {prompt}");
        log::debug!("context (not sent to recognizer): {context}");
        log::debug!(
            "transcribing {:.2}s of audio from offset {:.2}s",
            self.audio_buffer.len_seconds(),
            self.buffer_time_offset
        );

        let result = self
            .recognizer
            .transcribe(self.audio_buffer.as_slice(), &prompt)?;
        let words = self.recognizer.ts_words(&result);
        self.transcript_buffer.insert(&words, self.buffer_time_offset);
        let newly_committed = self.transcript_buffer.flush();
        self.committed.extend(newly_committed.iter().cloned());
        let confirmed = ConfirmedSpan::from_words(&newly_committed, self.recognizer.separator());

        if matches!(self.config.trim_policy, TrimPolicy::Sentence(_)) {
            self.chunk_completed_sentence()?;
        }

        if self.audio_buffer.len_seconds() > self.config.trim_policy.max_seconds() {
            self.chunk_completed_segment(&result);
        }

        Ok(confirmed)
    }

    /// Flushes the uncommitted tail and advances the offset past the
    /// remaining buffered audio. Call once at the end of an utterance.
    pub fn finish(&mut self) -> ConfirmedSpan {
        let tail = self.transcript_buffer.complete();
        let confirmed = ConfirmedSpan::from_words(&tail, self.recognizer.separator());
        self.buffer_time_offset += self.audio_buffer.len_seconds();
        confirmed
    }

    /// Builds the recognizer's conditioning prompt and the (unsent) context
    /// window, per spec §4.2 "Prompt construction".
    ///
    /// `committed` is split at the last word whose `end` falls at or before
    /// `buffer_time_offset`: everything before that split is eligible prompt
    /// material, everything after is already inside the current window and
    /// serves only as debug context.
    fn prompt(&self) -> (String, String) {
        let mut split = self.committed.len().saturating_sub(1);
        while split > 0 && self.committed[split - 1].end > self.buffer_time_offset {
            split -= 1;
        }
        let (before_window, context) = self.committed.split_at(split);

        let mut idx = before_window.len();
        let mut budget = 0usize;
        let mut prompt_words = Vec::new();
        while idx > 0 && budget < PROMPT_BUDGET_CHARS {
            idx -= 1;
            let w = &before_window[idx];
            budget += w.text.len() + 1;
            prompt_words.push(w.text.as_ref());
        }
        prompt_words.reverse();

        let sep = self.recognizer.separator();
        let prompt = prompt_words.join(sep);
        let context_text = context
            .iter()
            .map(|w| w.text.as_ref())
            .collect::<Vec<_>>()
            .join(sep);
        (prompt, context_text)
    }

    /// Attempts a sentence-boundary trim: tokenizes the committed text into
    /// sentences and, if at least two are found, trims up to the end of the
    /// second-to-last one (keeping the last sentence as context, mirroring
    /// [`OnlineProcessor::chunk_completed_segment`]'s "keep the last" rule).
    fn chunk_completed_sentence(&mut self) -> Result<(), StreamingError> {
        if self.committed.is_empty() {
            return Ok(());
        }
        let tokenizer = self.tokenizer.as_ref().ok_or_else(|| {
            StreamingError::Configuration("sentence trim policy requires a tokenizer".to_string())
        })?;

        let sep = self.recognizer.separator();
        let raw_text = self
            .committed
            .iter()
            .map(|w| w.text.as_ref())
            .collect::<Vec<_>>()
            .join(sep);
        let sentences = tokenizer.tokenize(&[raw_text])?;
        if sentences.len() < 2 {
            log::debug!("fewer than two sentences in committed text, skipping sentence trim");
            return Ok(());
        }

        let spans = words_to_sentences(&self.committed, sentences);
        if spans.len() < 2 {
            return Ok(());
        }
        let chunk_at = spans[spans.len() - 2].1;
        self.chunk_at(chunk_at);
        Ok(())
    }

    /// Forces a segment-boundary trim once the window has grown past
    /// `max_seconds`: walks the recognizer's segment end timestamps backward
    /// from the end, skipping any that still fall after the last committed
    /// word, and trims at the first one that doesn't.
    fn chunk_completed_segment(&mut self, result: &R::Output) {
        let Some(last_committed) = self.committed.last() else {
            return;
        };
        let t = last_committed.end;
        let mut ends = self.recognizer.segments_end_ts(result);
        if ends.len() <= 1 {
            log::debug!("recognizer reported too few segments to chunk");
            return;
        }

        let mut candidate = ends[ends.len() - 2] + self.buffer_time_offset;
        while ends.len() > 2 && candidate > t {
            ends.pop();
            candidate = ends[ends.len() - 2] + self.buffer_time_offset;
        }
        if candidate <= t {
            self.chunk_at(candidate);
        } else {
            log::debug!("no completed segment falls within the committed area yet");
        }
    }

    /// Re-anchors the window at absolute time `time`: drops committed words
    /// and audio samples before it and advances `buffer_time_offset`. A
    /// no-op if `time` is behind the current offset.
    fn chunk_at(&mut self, time: f64) {
        if time < self.buffer_time_offset {
            return;
        }
        self.transcript_buffer.pop_committed(time);
        self.audio_buffer.drop_front_seconds(time - self.buffer_time_offset);
        self.buffer_time_offset = time;
    }
}

/// Walks `sentences` and `committed` in lockstep, greedily matching each
/// committed word's text against the current sentence's remaining prefix, to
/// recover the `(begin, end, text)` span of every sentence. Assumes the
/// tokenizer's contract holds: every committed word is a substring of
/// exactly one sentence, in order.
///
/// The "set begin" and "set end and emit" branches are mutually exclusive,
/// matching `words_to_sentences` in the original: a word that both starts
/// the remaining sentence text and equals it whole only ever sets `begin`
/// that iteration, it does not also emit. For a one-word sentence this means
/// no span is appended for it, and the word queue still advances past it —
/// carried over verbatim rather than patched, per this crate's Open Question
/// resolutions (see DESIGN.md).
fn words_to_sentences(committed: &[CommittedWord], sentences: Vec<String>) -> Vec<(f64, f64, String)> {
    let mut words: VecDeque<&CommittedWord> = committed.iter().collect();
    let mut spans = Vec::with_capacity(sentences.len());

    for sentence in sentences {
        let fsent = sentence.trim().to_string();
        let mut remaining = fsent.clone();
        let mut begin: Option<f64> = None;

        while let Some(word) = words.pop_front() {
            let word_text = word.text.trim();
            if begin.is_none() && remaining.starts_with(word_text) {
                begin = Some(word.begin);
            } else if remaining == word_text {
                spans.push((begin.unwrap_or(word.begin), word.end, fsent.clone()));
                break;
            }
            remaining = remaining
                .get(word_text.len()..)
                .unwrap_or("")
                .trim_start()
                .to_string();
        }
    }
    spans
}

/// Builder for [`OnlineProcessor`], following this crate's usual
/// construction pattern: accumulate optional fields, validate on `build`.
pub struct OnlineProcessorBuilder<R: Recognizer, T: SentenceTokenizer> {
    recognizer: Option<R>,
    tokenizer: Option<T>,
    config: Option<OnlineProcessorConfig>,
}

impl<R: Recognizer, T: SentenceTokenizer> Default for OnlineProcessorBuilder<R, T> {
    fn default() -> Self {
        Self {
            recognizer: None,
            tokenizer: None,
            config: None,
        }
    }
}

impl<R: Recognizer, T: SentenceTokenizer> OnlineProcessorBuilder<R, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recognizer(mut self, recognizer: R) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: T) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    pub fn with_config(mut self, config: OnlineProcessorConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<OnlineProcessor<R, T>, StreamingError> {
        let recognizer = self.recognizer.ok_or_else(|| {
            StreamingError::Configuration("recognizer is required".to_string())
        })?;
        let config = self
            .config
            .ok_or_else(|| StreamingError::Configuration("config is required".to_string()))?;
        if matches!(config.trim_policy, TrimPolicy::Sentence(_)) && self.tokenizer.is_none() {
            return Err(StreamingError::Configuration(
                "TrimPolicy::Sentence requires a tokenizer".to_string(),
            ));
        }

        Ok(OnlineProcessor {
            recognizer,
            tokenizer: self.tokenizer,
            config,
            audio_buffer: AudioRingBuffer::new(),
            buffer_time_offset: 0.0,
            committed: Vec::new(),
            transcript_buffer: HypothesisBuffer::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{NoTokenizer, TimedWord};
    use std::cell::RefCell;

    struct ScriptedRecognizer {
        calls: RefCell<usize>,
        hypotheses: Vec<Vec<TimedWord>>,
        segment_ends: Vec<Vec<f64>>,
    }

    impl Recognizer for ScriptedRecognizer {
        type Output = usize;

        fn transcribe(&self, _samples: &[f32], _init_prompt: &str) -> Result<usize, StreamingError> {
            let mut calls = self.calls.borrow_mut();
            let idx = *calls;
            *calls += 1;
            Ok(idx)
        }

        fn ts_words(&self, result: &usize) -> Vec<TimedWord> {
            self.hypotheses[*result].clone()
        }

        fn segments_end_ts(&self, result: &usize) -> Vec<f64> {
            self.segment_ends
                .get(*result)
                .cloned()
                .unwrap_or_default()
        }

        fn separator(&self) -> &str {
            " "
        }
    }

    fn word(begin: f64, end: f64, text: &str) -> TimedWord {
        TimedWord::new(begin, end, text)
    }

    fn silence(samples: usize) -> Vec<f32> {
        vec![0.0; samples]
    }

    #[test]
    fn process_iter_commits_on_second_agreeing_pass() {
        let recognizer = ScriptedRecognizer {
            calls: RefCell::new(0),
            hypotheses: vec![
                vec![word(0.0, 0.5, "hello"), word(0.5, 1.0, "world")],
                vec![
                    word(0.0, 0.5, "hello"),
                    word(0.5, 1.0, "world"),
                    word(1.0, 1.4, "today"),
                ],
            ],
            segment_ends: vec![vec![], vec![]],
        };
        let config = OnlineProcessorConfig::new(TrimPolicy::Segment(15.0)).unwrap();
        let mut processor = OnlineProcessorBuilder::<_, NoTokenizer>::new()
            .with_recognizer(recognizer)
            .with_config(config)
            .build()
            .unwrap();

        processor.insert_audio_chunk(&silence(1600));
        let first = processor.process_iter().unwrap();
        assert!(first.is_empty());

        processor.insert_audio_chunk(&silence(1600));
        let second = processor.process_iter().unwrap();
        assert_eq!(second.text, "hello world");
        assert_eq!(second.begin, Some(0.0));
        assert_eq!(second.end, Some(1.0));
    }

    #[test]
    fn builder_rejects_sentence_policy_without_tokenizer() {
        let recognizer = ScriptedRecognizer {
            calls: RefCell::new(0),
            hypotheses: vec![],
            segment_ends: vec![],
        };
        let config = OnlineProcessorConfig::new(TrimPolicy::Sentence(15.0)).unwrap();
        let result = OnlineProcessorBuilder::<_, NoTokenizer>::new()
            .with_recognizer(recognizer)
            .with_config(config)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn finish_flushes_uncommitted_tail() {
        let recognizer = ScriptedRecognizer {
            calls: RefCell::new(0),
            hypotheses: vec![vec![word(0.0, 0.5, "hello"), word(0.5, 1.0, "world")]],
            segment_ends: vec![vec![]],
        };
        let config = OnlineProcessorConfig::new(TrimPolicy::Segment(15.0)).unwrap();
        let mut processor = OnlineProcessorBuilder::<_, NoTokenizer>::new()
            .with_recognizer(recognizer)
            .with_config(config)
            .build()
            .unwrap();

        processor.insert_audio_chunk(&silence(1600));
        processor.process_iter().unwrap();
        let tail = processor.finish();
        assert_eq!(tail.text, "hello world");
    }
}
