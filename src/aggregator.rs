use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::error::{Error, Result, Stage};
use crate::queue::Consumer;
use crate::sketch::Sketch;
use crate::worker::ScanResult;

/// Merged outcome of a successful scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregate {
    pub estimate: u64,
    pub chunks: u64,
    pub lines: u64,
}

/// Merges per-chunk sketches into the global one.
///
/// The first error seen wins: it cancels the scan, every later result is
/// discarded, and it is what [`Aggregator::drain`] returns.
pub struct Aggregator<S> {
    global: S,
    chunks: u64,
    lines: u64,
    first_error: Option<Error>,
}

impl<S: Sketch> Default for Aggregator<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Sketch> Aggregator<S> {
    pub fn new() -> Self {
        Self {
            global: S::default(),
            chunks: 0,
            lines: 0,
            first_error: None,
        }
    }

    /// Fold one result into the global sketch. Returns the error the result
    /// carried or merging it produced; once an error was absorbed every later
    /// result is ignored.
    pub fn absorb(&mut self, result: ScanResult<S>) -> Result<()> {
        if self.first_error.is_some() {
            return Ok(());
        }
        let error = match (result.error, result.sketch) {
            (Some(err), _) => err,
            (None, Some(sketch)) => match self.global.merge(&sketch) {
                Ok(()) => {
                    self.chunks += 1;
                    self.lines += result.lines;
                    return Ok(());
                }
                Err(source) => Error::Merge {
                    chunk: result.chunk.unwrap_or_default(),
                    source,
                },
            },
            // nothing to merge
            (None, None) => return Ok(()),
        };
        Err(error)
    }

    /// Drain `results` until the queue closes, then return the merged
    /// estimate or the first error. Cancels `cancel` on the first error.
    ///
    /// A scan cancelled from outside may have left chunks unprocessed even
    /// when every result that did arrive was clean, so it fails as well.
    pub fn drain(
        mut self,
        results: &Consumer<ScanResult<S>>,
        cancel: &CancellationToken,
    ) -> Result<Aggregate> {
        for result in results.iter() {
            let chunk = result.chunk;
            if let Err(err) = self.absorb(result) {
                warn!(?chunk, stage = %err.stage(), %err, "scan failed, cancelling");
                cancel.cancel();
                self.first_error = Some(err);
            }
        }
        if self.first_error.is_none() && cancel.is_cancelled() {
            warn!(chunks = self.chunks, "scan cancelled, discarding partial estimate");
            self.first_error = Some(Error::Cancelled {
                stage: Stage::Aggregator,
            });
        }
        self.finish()
    }

    fn finish(self) -> Result<Aggregate> {
        if let Some(err) = self.first_error {
            return Err(err);
        }
        let aggregate = Aggregate {
            estimate: self.global.estimate(),
            chunks: self.chunks,
            lines: self.lines,
        };
        debug!(?aggregate, "aggregation finished");
        Ok(aggregate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MergeError;
    use crate::queue::bounded;
    use crate::sketch::IpSketch;

    fn sketch_of(keys: &[&str]) -> IpSketch {
        let mut sketch = IpSketch::default();
        for key in keys {
            Sketch::insert(&mut sketch, key.as_bytes());
        }
        sketch
    }

    fn drain_all<S: Sketch>(
        results: Vec<ScanResult<S>>,
        cancel: &CancellationToken,
    ) -> Result<Aggregate> {
        let (producer, consumer) = bounded(results.len().max(1));
        for result in results {
            producer.send(result).unwrap_or_else(|_| panic!("queue closed"));
        }
        drop(producer);
        Aggregator::new().drain(&consumer, cancel)
    }

    #[test]
    fn test_merges_all_chunks() {
        let results = vec![
            ScanResult::ok(0, 2, sketch_of(&["a", "b"])),
            ScanResult::ok(1, 3, sketch_of(&["b", "c", "c"])),
            ScanResult::ok(2, 0, sketch_of(&[])),
        ];
        let cancel = CancellationToken::new();
        let aggregate = drain_all(results, &cancel).unwrap();
        assert_eq!(
            aggregate,
            Aggregate {
                estimate: 3,
                chunks: 3,
                lines: 5
            }
        );
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn test_empty_input() {
        let aggregate = drain_all::<IpSketch>(vec![], &CancellationToken::new()).unwrap();
        assert_eq!(aggregate.estimate, 0);
        assert_eq!(aggregate.chunks, 0);
    }

    #[test]
    fn test_first_error_wins_and_cancels() {
        let results = vec![
            ScanResult::ok(0, 1, sketch_of(&["a"])),
            ScanResult::failed(
                Some(1),
                Error::Processing {
                    chunk: 1,
                    line: 4,
                    detail: "bad key".into(),
                },
            ),
            ScanResult::failed(
                Some(2),
                Error::Cancelled {
                    stage: Stage::Worker,
                },
            ),
            ScanResult::ok(3, 1, sketch_of(&["b"])),
        ];
        let cancel = CancellationToken::new();
        let err = drain_all(results, &cancel).unwrap_err();
        assert!(matches!(err, Error::Processing { chunk: 1, line: 4, .. }));
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_cancelled_scan_is_not_reported_as_final() {
        let results = vec![ScanResult::ok(0, 1, sketch_of(&["a"]))];
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = drain_all(results, &cancel).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.stage(), Stage::Aggregator);
    }

    #[test]
    fn test_absorb_ignores_results_after_error() {
        let mut aggregator = Aggregator::<IpSketch>::new();
        aggregator.first_error = Some(Error::Cancelled {
            stage: Stage::Reader,
        });
        assert!(aggregator.absorb(ScanResult::ok(0, 1, sketch_of(&["a"]))).is_ok());
        assert_eq!(aggregator.chunks, 0);
    }

    /// Sketch whose merge fails once it has seen a poisoned key.
    #[derive(Debug, Default)]
    struct Picky {
        keys: u64,
        poisoned: bool,
    }

    impl Sketch for Picky {
        fn insert(&mut self, key: &[u8]) {
            self.keys += 1;
            self.poisoned |= key == b"poison";
        }

        fn merge(&mut self, other: &Self) -> std::result::Result<(), MergeError> {
            if other.poisoned {
                return Err(MergeError("poisoned sketch".into()));
            }
            self.keys += other.keys;
            Ok(())
        }

        fn estimate(&self) -> u64 {
            self.keys
        }
    }

    #[test]
    fn test_merge_failure_is_fatal() {
        let mut poisoned = Picky::default();
        poisoned.insert(b"poison");
        let results = vec![
            ScanResult::ok(0, 1, Picky { keys: 1, poisoned: false }),
            ScanResult::ok(5, 1, poisoned),
        ];
        let cancel = CancellationToken::new();
        let err = drain_all(results, &cancel).unwrap_err();
        assert!(matches!(err, Error::Merge { chunk: 5, .. }));
        assert_eq!(err.stage(), Stage::Aggregator);
        assert!(cancel.is_cancelled());
    }
}
