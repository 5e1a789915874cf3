// Detection publishing
//
// Category flags are chunk-scoped: they are set while a chunk is processed,
// handed to the downstream sink at most once (and only if any flag is set),
// then cleared before the next chunk.

use serde::{Deserialize, Serialize};

use super::category::BeatCategory;

/// Per-chunk detection triple, ordered [bass, clap, hihat]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub bass: bool,
    pub clap: bool,
    pub hihat: bool,
}

impl DetectionResult {
    /// True if at least one category fired
    pub fn any(&self) -> bool {
        self.bass || self.clap || self.hihat
    }

    pub fn is_set(&self, category: BeatCategory) -> bool {
        match category {
            BeatCategory::Bass => self.bass,
            BeatCategory::Clap => self.clap,
            BeatCategory::HiHat => self.hihat,
        }
    }

    pub fn as_array(&self) -> [bool; 3] {
        [self.bass, self.clap, self.hihat]
    }
}

impl From<[bool; 3]> for DetectionResult {
    fn from(flags: [bool; 3]) -> Self {
        Self {
            bass: flags[0],
            clap: flags[1],
            hihat: flags[2],
        }
    }
}

impl From<DetectionResult> for [bool; 3] {
    fn from(result: DetectionResult) -> Self {
        result.as_array()
    }
}

/// Downstream consumer of detection results
///
/// Implementations must not block: `publish` is called from the per-chunk
/// path.
pub trait DetectionSink {
    fn publish(&mut self, result: DetectionResult);
}

impl DetectionSink for Vec<DetectionResult> {
    fn publish(&mut self, result: DetectionResult) {
        self.push(result);
    }
}

/// Lock-free hand-off to another thread; results are dropped when the ring is full
impl DetectionSink for rtrb::Producer<DetectionResult> {
    fn publish(&mut self, result: DetectionResult) {
        let _ = self.push(result);
    }
}

/// Fan-out to any number of subscribers; sending with no subscriber is not an error
impl DetectionSink for tokio::sync::broadcast::Sender<DetectionResult> {
    fn publish(&mut self, result: DetectionResult) {
        let _ = self.send(result);
    }
}

/// Chunk-scoped category flags
#[derive(Debug, Clone, Default)]
pub struct DetectionPublisher {
    flags: [bool; 3],
}

impl DetectionPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `category` as fired for the current chunk
    pub fn mark(&mut self, category: BeatCategory) {
        self.flags[category.index()] = true;
    }

    /// Flags accumulated so far for the current chunk
    pub fn pending(&self) -> DetectionResult {
        DetectionResult::from(self.flags)
    }

    /// Read and reset the flags
    ///
    /// # Returns
    /// `Some(result)` if any category fired, `None` otherwise. The flags are
    /// cleared in both cases.
    pub fn take(&mut self) -> Option<DetectionResult> {
        let result = self.pending();
        self.flags = [false; 3];
        result.any().then_some(result)
    }

    /// Read, reset and forward to `sink` when any category fired
    pub fn flush<S: DetectionSink + ?Sized>(&mut self, sink: &mut S) -> Option<DetectionResult> {
        let result = self.take();
        if let Some(result) = result {
            sink.publish(result);
        }
        result
    }
}
