use std::collections::VecDeque;
use std::sync::Arc;

use crate::collaborators::{CommittedWord, TimedWord};

/// A candidate is discarded once its window has fully scrolled past the
/// commit horizon — anything starting more than this far behind
/// `last_committed_time` is stale.
const COMMIT_HORIZON_SLACK: f64 = 0.1;
/// Only attempt boundary de-duplication when the new hypothesis picks up
/// roughly where the last one left off.
const BOUNDARY_REENTRY_WINDOW: f64 = 1.0;
/// Largest n-gram considered when de-duplicating the recognizer's re-emitted
/// window prefix against the already-committed tail.
const MAX_DEDUP_NGRAM: usize = 5;

/// Reconciles a stream of overlapping recognizer hypotheses into a single
/// growing committed prefix via local double-agreement: a word is committed
/// only once two consecutive hypotheses agree on it.
///
/// One `HypothesisBuffer` lives for the duration of a single utterance; see
/// [`HypothesisBuffer::init`].
#[derive(Debug, Default)]
pub struct HypothesisBuffer {
    /// Committed words still inside the current audio window.
    committed_in_buffer: VecDeque<CommittedWord>,
    /// The uncommitted tail carried over from the previous iteration.
    buffer: VecDeque<TimedWord>,
    /// Scratch: the current iteration's incoming (shifted, filtered) words.
    new: VecDeque<TimedWord>,
    last_committed_time: f64,
    last_committed_word: Option<Arc<str>>,
}

impl HypothesisBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets all bookkeeping for a fresh utterance starting at `offset`
    /// (absolute stream time, seconds).
    pub fn init(&mut self, offset: f64) {
        self.committed_in_buffer.clear();
        self.buffer.clear();
        self.new.clear();
        self.last_committed_time = offset;
        self.last_committed_word = None;
    }

    pub fn last_committed_time(&self) -> f64 {
        self.last_committed_time
    }

    pub fn last_committed_word(&self) -> Option<&str> {
        self.last_committed_word.as_deref()
    }

    pub fn committed_in_buffer(&self) -> impl Iterator<Item = &CommittedWord> {
        self.committed_in_buffer.iter()
    }

    /// Adds `offset` to every timestamp in `new_words`, discards anything
    /// that falls before the commit horizon, and runs boundary
    /// de-duplication against the already-committed tail.
    pub fn insert(&mut self, new_words: &[TimedWord], offset: f64) {
        self.new = new_words
            .iter()
            .map(|w| w.shifted(offset))
            .filter(|w| w.begin >= self.last_committed_time - COMMIT_HORIZON_SLACK)
            .collect();

        let Some(first) = self.new.front() else {
            return;
        };
        let reentering = (first.begin - self.last_committed_time).abs() < BOUNDARY_REENTRY_WINDOW;
        if !reentering || self.committed_in_buffer.is_empty() {
            return;
        }

        let max_n = MAX_DEDUP_NGRAM
            .min(self.committed_in_buffer.len())
            .min(self.new.len());
        let committed_len = self.committed_in_buffer.len();

        for n in 1..=max_n {
            let committed_tail = self
                .committed_in_buffer
                .iter()
                .skip(committed_len - n)
                .map(|w| w.text.as_ref())
                .collect::<Vec<_>>()
                .join(" ");
            let new_head = self
                .new
                .iter()
                .take(n)
                .map(|w| w.text.as_ref())
                .collect::<Vec<_>>()
                .join(" ");
            if committed_tail == new_head {
                log::debug!("dropping {n} word(s) re-emitted at window prefix: {new_head}");
                for _ in 0..n {
                    self.new.pop_front();
                }
                break;
            }
        }
    }

    /// Commits the longest common (by text) prefix between `new` and
    /// `buffer`, advances `last_committed_time`/`last_committed_word`, and
    /// returns the newly committed words.
    pub fn flush(&mut self) -> Vec<CommittedWord> {
        let mut commit = Vec::new();
        loop {
            let agree = match (self.new.front(), self.buffer.front()) {
                (Some(n), Some(b)) => n.text == b.text,
                _ => false,
            };
            if !agree {
                break;
            }
            let word = self.new.pop_front().expect("front just matched");
            self.buffer.pop_front();
            self.last_committed_time = word.end;
            self.last_committed_word = Some(word.text.clone());
            commit.push(word);
        }
        self.buffer = std::mem::take(&mut self.new);
        self.committed_in_buffer.extend(commit.iter().cloned());
        commit
    }

    /// Drops every committed word whose `end <= t` from the front.
    pub fn pop_committed(&mut self, t: f64) {
        while matches!(self.committed_in_buffer.front(), Some(w) if w.end <= t) {
            self.committed_in_buffer.pop_front();
        }
    }

    /// Returns the current uncommitted tail without mutating state.
    pub fn complete(&self) -> Vec<TimedWord> {
        self.buffer.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(begin: f64, end: f64, text: &str) -> TimedWord {
        TimedWord::new(begin, end, text)
    }

    // S1 -- commit-on-agreement.
    #[test]
    fn commits_on_second_agreeing_hypothesis() {
        let mut hb = HypothesisBuffer::new();
        hb.insert(&[word(0.0, 0.5, "hello"), word(0.5, 1.0, "world")], 0.0);
        let first = hb.flush();
        assert!(first.is_empty());

        hb.insert(
            &[
                word(0.0, 0.5, "hello"),
                word(0.5, 1.0, "world"),
                word(1.0, 1.4, "today"),
            ],
            0.0,
        );
        let second = hb.flush();
        let texts: Vec<_> = second.iter().map(|w| w.text.as_ref()).collect();
        assert_eq!(texts, vec!["hello", "world"]);
        assert_eq!(hb.last_committed_time(), 1.0);
    }

    // S2 -- disagreement on the tail commits only the agreeing prefix.
    #[test]
    fn disagreement_on_tail_commits_prefix_only() {
        let mut hb = HypothesisBuffer::new();
        hb.insert(&[word(0.0, 0.5, "hello"), word(0.5, 1.0, "word")], 0.0);
        hb.flush();

        hb.insert(&[word(0.0, 0.5, "hello"), word(0.5, 1.0, "world")], 0.0);
        let committed = hb.flush();
        let texts: Vec<_> = committed.iter().map(|w| w.text.as_ref()).collect();
        assert_eq!(texts, vec!["hello"]);
    }

    // S3 -- boundary de-duplication: `committed_in_buffer` ending in
    // ["the", "cat"], a hypothesis starting with the same two words has
    // them dropped before `flush` ever sees them.
    #[test]
    fn boundary_dedup_drops_reemitted_prefix() {
        let mut hb = HypothesisBuffer::new();
        hb.insert(&[word(0.0, 0.3, "the"), word(0.3, 0.6, "cat")], 0.0);
        hb.flush();
        hb.insert(
            &[word(0.0, 0.3, "the"), word(0.3, 0.6, "cat"), word(0.6, 0.9, "sat")],
            0.0,
        );
        let committed = hb.flush();
        let texts: Vec<_> = committed.iter().map(|w| w.text.as_ref()).collect();
        assert_eq!(texts, vec!["the", "cat"]);
        assert_eq!(hb.last_committed_time(), 0.6);

        // The next hypothesis re-emits "the cat" at its window prefix, then
        // "sat" (which still agrees with the uncommitted tail) and new
        // content ("down"). Boundary de-dup should strip "the cat" so it is
        // never double-committed; "sat" commits normally via flush.
        hb.insert(
            &[
                word(0.6, 0.7, "the"),
                word(0.7, 0.9, "cat"),
                word(0.9, 1.2, "sat"),
                word(1.2, 1.5, "down"),
            ],
            0.0,
        );
        let committed = hb.flush();
        let texts: Vec<_> = committed.iter().map(|w| w.text.as_ref()).collect();
        assert_eq!(texts, vec!["sat"]);
        let tail: Vec<_> = hb.complete().iter().map(|w| w.text.to_string()).collect();
        assert_eq!(tail, vec!["down"]);
    }

    // N-gram de-dup idempotence (property 4): repeating the same hypothesis
    // twice commits no further words beyond what the first pass already
    // confirmed as a tail match.
    #[test]
    fn repeated_identical_hypothesis_commits_nothing_new() {
        let mut hb = HypothesisBuffer::new();
        let hyp = vec![word(0.0, 0.5, "hello"), word(0.5, 1.0, "world")];
        hb.insert(&hyp, 0.0);
        hb.flush();
        hb.insert(&hyp, 0.0);
        let second = hb.flush();
        assert_eq!(second.len(), hyp.len());
        hb.insert(&hyp, 0.0);
        let third = hb.flush();
        assert!(third.is_empty());
    }

    #[test]
    fn pop_committed_drops_expired_prefix() {
        let mut hb = HypothesisBuffer::new();
        hb.insert(&[word(0.0, 0.5, "a"), word(0.5, 1.0, "b")], 0.0);
        hb.flush();
        hb.insert(&[word(0.0, 0.5, "a"), word(0.5, 1.0, "b"), word(1.0, 1.5, "c")], 0.0);
        hb.flush();
        hb.pop_committed(0.5);
        let remaining: Vec<_> = hb.committed_in_buffer().map(|w| w.text.to_string()).collect();
        assert_eq!(remaining, vec!["b"]);
    }

    #[test]
    fn last_committed_time_never_decreases() {
        let mut hb = HypothesisBuffer::new();
        hb.init(5.0);
        assert_eq!(hb.last_committed_time(), 5.0);
        hb.insert(&[word(0.0, 0.4, "a")], 5.0);
        hb.flush();
        hb.insert(&[word(0.0, 0.4, "a"), word(0.4, 0.9, "b")], 5.0);
        let before = hb.last_committed_time();
        hb.flush();
        assert!(hb.last_committed_time() >= before);
    }
}
