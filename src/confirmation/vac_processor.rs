use crate::collaborators::{Recognizer, SentenceTokenizer, VadEvent, VoiceActivityDetector};
use crate::confirmation::online_processor::{ConfirmedSpan, OnlineProcessor};
use crate::utils::config::VacProcessorConfig;
use crate::utils::errors::StreamingError;
use crate::{Sample, SAMPLE_RATE};

/// Whether the most recently ingested chunk was inside a voiced region, per
/// the VAD's last reported event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VoiceStatus {
    /// No event has been observed yet.
    #[default]
    None,
    Voice,
    NonVoice,
}

/// Gates an inner [`OnlineProcessor`] behind a voice activity detector.
///
/// Audio is accumulated in a local pre-online buffer, keyed by absolute
/// input frame (`buffer_offset`), until the VAD resolves it: a `Start` event
/// re-initializes the inner processor at the voiced frame and forwards
/// everything from there on; an `End` forwards everything up to the silence
/// and marks the utterance final; no event at all either forwards the whole
/// buffer (if currently voiced) or trims it down to a 1s lookback window (if
/// not, since a `Start` may yet be found just behind it).
///
/// Also rate-limits invocation: the inner processor's `process_iter` only
/// runs once at least `online_chunk_size_s` seconds of voiced audio have
/// been forwarded since the last call, so a VAD reporting activity in very
/// small increments doesn't turn into a recognizer call per increment.
pub struct VacProcessor<R: Recognizer, T: SentenceTokenizer, V: VoiceActivityDetector> {
    online: OnlineProcessor<R, T>,
    vad: V,
    config: VacProcessorConfig,
    status: VoiceStatus,
    /// Samples not yet routed to the inner processor, pending VAD resolution.
    audio_buffer: Vec<Sample>,
    /// Absolute input frame corresponding to index 0 of `audio_buffer`.
    buffer_offset: u64,
    /// Samples forwarded to the inner processor since the last
    /// `process_iter` invoked it.
    forwarded_since_last_run: usize,
    is_currently_final: bool,
}

impl<R: Recognizer, T: SentenceTokenizer, V: VoiceActivityDetector> VacProcessor<R, T, V> {
    pub fn new(online: OnlineProcessor<R, T>, vad: V, config: VacProcessorConfig) -> Self {
        Self {
            online,
            vad,
            config,
            status: VoiceStatus::None,
            audio_buffer: Vec::new(),
            buffer_offset: 0,
            forwarded_since_last_run: 0,
            is_currently_final: false,
        }
    }

    pub fn status(&self) -> VoiceStatus {
        self.status
    }

    /// Resets all state, including the inner processor, for a fresh stream.
    pub fn init(&mut self) {
        self.online.init(0.0);
        self.status = VoiceStatus::None;
        self.audio_buffer.clear();
        self.buffer_offset = 0;
        self.forwarded_since_last_run = 0;
        self.is_currently_final = false;
    }

    /// Runs the VAD over `samples`, appends them to the local buffer, and
    /// dispatches on the result per the table in §4.3.
    pub fn insert_audio_chunk(&mut self, samples: &[Sample]) -> Result<(), StreamingError> {
        let event = self.vad.detect(samples)?;
        self.audio_buffer.extend_from_slice(samples);

        match event {
            Some(VadEvent::Start(frame)) => {
                let local = frame.saturating_sub(self.buffer_offset) as usize;
                let local = local.min(self.audio_buffer.len());
                self.status = VoiceStatus::Voice;
                self.online.init(frame as f64 / SAMPLE_RATE);
                let forwarded = self.audio_buffer.len() - local;
                self.online.insert_audio_chunk(&self.audio_buffer[local..]);
                self.forwarded_since_last_run += forwarded;
                self.clear_buffer();
            }
            Some(VadEvent::End(frame)) => {
                let local = frame.saturating_sub(self.buffer_offset) as usize;
                let local = local.min(self.audio_buffer.len());
                self.status = VoiceStatus::NonVoice;
                self.online.insert_audio_chunk(&self.audio_buffer[..local]);
                self.forwarded_since_last_run += local;
                self.is_currently_final = true;
                self.clear_buffer();
            }
            Some(VadEvent::StartEnd(start, end)) => {
                let beg = (start.saturating_sub(self.buffer_offset) as usize).min(self.audio_buffer.len());
                let fin = (end.saturating_sub(self.buffer_offset) as usize)
                    .min(self.audio_buffer.len())
                    .max(beg);
                self.status = VoiceStatus::NonVoice;
                self.online.init(start as f64 / SAMPLE_RATE);
                self.online.insert_audio_chunk(&self.audio_buffer[beg..fin]);
                self.forwarded_since_last_run += fin - beg;
                self.is_currently_final = true;
                self.clear_buffer();
            }
            None => {
                if self.status == VoiceStatus::Voice {
                    self.online.insert_audio_chunk(&self.audio_buffer);
                    self.forwarded_since_last_run += self.audio_buffer.len();
                    self.clear_buffer();
                } else {
                    // Keep one second of lookback in case the VAD later
                    // reports a `Start` inside it; drop everything older.
                    let lookback = SAMPLE_RATE as usize;
                    let drop = self.audio_buffer.len().saturating_sub(lookback);
                    self.buffer_offset += drop as u64;
                    self.audio_buffer.drain(0..drop);
                }
            }
        }
        Ok(())
    }

    /// Advances `buffer_offset` past everything currently buffered and
    /// empties it. Invoked after each VAD-resolved chunk is forwarded.
    fn clear_buffer(&mut self) {
        self.buffer_offset += self.audio_buffer.len() as u64;
        self.audio_buffer.clear();
    }

    /// If the last chunk closed an utterance, finalizes it. Otherwise runs
    /// the inner processor once enough voiced audio has been forwarded
    /// since the last run; returns an empty span without invoking the
    /// recognizer if neither condition holds.
    pub fn process_iter(&mut self) -> Result<ConfirmedSpan, StreamingError> {
        if self.is_currently_final {
            return Ok(self.finish());
        }
        if self.forwarded_since_last_run as f64 > SAMPLE_RATE * self.config.online_chunk_size_s {
            self.forwarded_since_last_run = 0;
            return self.online.process_iter();
        }
        log::debug!("no online update this iteration, only VAD activity");
        Ok(ConfirmedSpan::default())
    }

    /// Finalizes the current utterance: flushes the inner processor's
    /// uncommitted tail and clears the final flag.
    pub fn finish(&mut self) -> ConfirmedSpan {
        let confirmed = self.online.finish();
        self.forwarded_since_last_run = 0;
        self.is_currently_final = false;
        confirmed
    }
}
