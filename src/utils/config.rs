use crate::utils::errors::{Result, StreamingError};

/// The point at which to re-anchor the audio window and drop expired
/// committed words: either at a recognizer-reported segment boundary, or at
/// a detected sentence boundary (falling back to a forced segment trim if no
/// sentence boundary has appeared by `max_seconds`).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrimPolicy {
    /// Trim to the recognizer's segment boundary once the audio window
    /// exceeds `max_seconds`.
    Segment(f64),
    /// Attempt a sentence-boundary trim on every iteration; also force a
    /// segment-boundary trim once the audio window exceeds `max_seconds`.
    Sentence(f64),
}

impl TrimPolicy {
    pub fn max_seconds(&self) -> f64 {
        match self {
            TrimPolicy::Segment(s) | TrimPolicy::Sentence(s) => *s,
        }
    }

    /// Validates `max_seconds > 0`, logging a warning (not an error) for the
    /// "permitted but risky" case of `max_seconds > 30`.
    fn validate(self) -> Result<Self> {
        if self.max_seconds() <= 0.0 {
            return Err(StreamingError::Configuration(
                "trim policy seconds must be positive".to_string(),
            ));
        }
        if self.max_seconds() > 30.0 {
            log::warn!(
                "trim policy is set to {:.1}s, which is very long; this risks unbounded memory growth",
                self.max_seconds()
            );
        }
        Ok(self)
    }
}

/// Construction-time configuration for an [`OnlineProcessor`](crate::confirmation::online_processor::OnlineProcessor).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OnlineProcessorConfig {
    pub trim_policy: TrimPolicy,
}

impl OnlineProcessorConfig {
    pub fn new(trim_policy: TrimPolicy) -> Result<Self> {
        Ok(Self {
            trim_policy: trim_policy.validate()?,
        })
    }
}

/// Construction-time configuration for a [`VacProcessor`](crate::confirmation::vac_processor::VacProcessor).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VacProcessorConfig {
    /// Minimum amount of accumulated voiced audio (seconds) required before
    /// the inner `OnlineProcessor` is invoked.
    pub online_chunk_size_s: f64,
}

impl VacProcessorConfig {
    pub fn new(online_chunk_size_s: f64) -> Result<Self> {
        if online_chunk_size_s <= 0.0 {
            return Err(StreamingError::Configuration(
                "online_chunk_size_s must be positive".to_string(),
            ));
        }
        Ok(Self { online_chunk_size_s })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_trim_seconds() {
        assert!(OnlineProcessorConfig::new(TrimPolicy::Segment(0.0)).is_err());
        assert!(OnlineProcessorConfig::new(TrimPolicy::Sentence(-1.0)).is_err());
    }

    #[test]
    fn accepts_long_but_warns() {
        assert!(OnlineProcessorConfig::new(TrimPolicy::Segment(45.0)).is_ok());
    }

    #[test]
    fn rejects_non_positive_chunk_size() {
        assert!(VacProcessorConfig::new(0.0).is_err());
        assert!(VacProcessorConfig::new(-2.0).is_err());
    }
}
