//! Radio-mode playback sequencing.
//!
//! The engine owns the ordering state machine only; the audio element
//! lives in the presentation layer, which reports natural completion back
//! via [`PlaybackQueue::complete`]. Stopping cancels the pending advance:
//! a completion arriving after `stop()` is a no-op in `Idle`.

use vala_types::pulse::Pulse;
use vala_types::PulseId;

/// Playback error types.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    /// No playable entries were supplied (quick reports are stripped
    /// first, as they carry no audio).
    #[error("no playable pulses in the queue")]
    EmptyQueue,

    #[error("pulse {0} carries no audio")]
    NoAudio(PulseId),
}

#[derive(Clone, Debug, PartialEq)]
enum State {
    Idle,
    /// Sequential autoplay over `queue` at this index.
    Playing(usize),
    /// Manual one-off playback outside the sequencing contract.
    Solo(Pulse),
}

/// Observable playback status.
#[derive(Clone, Debug, PartialEq)]
pub enum PlaybackStatus {
    Idle,
    /// `index` into a queue of `of` entries.
    Playing {
        pulse: Pulse,
        index: usize,
        of: usize,
    },
    Solo {
        pulse: Pulse,
    },
}

/// Sequential autoplay queue.
pub struct PlaybackQueue {
    queue: Vec<Pulse>,
    state: State,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self {
            queue: Vec::new(),
            state: State::Idle,
        }
    }

    /// Start radio mode over an ordered list (e.g. expanded cluster leaves
    /// ranked by respect). Quick reports never enter the playlist.
    pub fn start(&mut self, list: Vec<Pulse>) -> Result<&Pulse, PlaybackError> {
        let queue: Vec<Pulse> = list.into_iter().filter(|p| !p.is_quick_report).collect();
        if queue.is_empty() {
            return Err(PlaybackError::EmptyQueue);
        }
        self.queue = queue;
        self.state = State::Playing(0);
        Ok(&self.queue[0])
    }

    /// Natural completion of the current pulse's audio. Advances to the
    /// next entry, or returns to idle when the queue (or a solo pulse) is
    /// exhausted. Returns the next pulse to play, if any.
    pub fn complete(&mut self) -> Option<&Pulse> {
        let next = match &self.state {
            State::Playing(index) if index + 1 < self.queue.len() => Some(index + 1),
            State::Playing(_) | State::Solo(_) => None,
            State::Idle => return None,
        };
        match next {
            Some(index) => {
                self.state = State::Playing(index);
                self.queue.get(index)
            }
            None => {
                self.reset();
                None
            }
        }
    }

    /// Cancel playback immediately, from any state.
    pub fn stop(&mut self) {
        self.reset();
    }

    /// Manual selection of a specific pulse. Cancels autoplay and plays
    /// only this pulse; completion returns to idle.
    pub fn select(&mut self, pulse: Pulse) -> Result<(), PlaybackError> {
        if pulse.is_quick_report {
            return Err(PlaybackError::NoAudio(pulse.id));
        }
        self.queue.clear();
        self.state = State::Solo(pulse);
        Ok(())
    }

    /// The pulse that should currently be audible, if any.
    pub fn current(&self) -> Option<&Pulse> {
        match &self.state {
            State::Idle => None,
            State::Playing(index) => self.queue.get(*index),
            State::Solo(pulse) => Some(pulse),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    pub fn status(&self) -> PlaybackStatus {
        match &self.state {
            State::Idle => PlaybackStatus::Idle,
            State::Playing(index) => match self.queue.get(*index) {
                Some(pulse) => PlaybackStatus::Playing {
                    pulse: pulse.clone(),
                    index: *index,
                    of: self.queue.len(),
                },
                None => PlaybackStatus::Idle,
            },
            State::Solo(pulse) => PlaybackStatus::Solo {
                pulse: pulse.clone(),
            },
        }
    }

    fn reset(&mut self) {
        self.queue.clear();
        self.state = State::Idle;
    }
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new()
    }
}
