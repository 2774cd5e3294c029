//! Batch placement: decide which sequence index each label of a batch takes.
//!
//! Placement is computed against the checkpoint the caller read. The store
//! re-checks that checkpoint when it commits, so a plan built from a stale
//! read is rejected there rather than written at the wrong positions.

use crate::error::PlacementError;
use crate::label::LabelPayload;
use crate::types::{Checkpoint, Polarity};

/// A label with its final position in the user's stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedLabel {
    pub sequence_index: i64,
    pub intent_label: Polarity,
    pub abuse_label: Polarity,
}

/// The result of placing a batch after a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    /// Checkpoint the plan was built against.
    pub expected: Checkpoint,
    /// Labels to write, ascending and starting at `expected.next_index()`.
    pub labels: Vec<PlacedLabel>,
    /// Labels skipped because their declared index is already committed.
    pub replayed: usize,
}

impl BatchPlan {
    /// Checkpoint once every planned label is committed.
    pub fn checkpoint_after(&self) -> Checkpoint {
        self.expected.advance(self.labels.len())
    }

    pub fn is_write(&self) -> bool {
        !self.labels.is_empty()
    }
}

/// Place a parsed batch after `checkpoint`.
///
/// Rules:
/// - No label declares an index: label `i` goes to `checkpoint + 1 + i`.
/// - Every label declares an index: the declared indexes must be
///   consecutive. Those at or below the checkpoint are already committed and
///   are skipped; the first remaining one must be `checkpoint + 1`.
/// - A mix of declared and undeclared labels is rejected.
pub fn place_batch(
    checkpoint: Checkpoint,
    labels: &[LabelPayload],
) -> Result<BatchPlan, PlacementError> {
    let declared = labels.iter().filter(|l| l.sequence_index.is_some()).count();

    if declared == 0 {
        let placed = labels
            .iter()
            .enumerate()
            .map(|(i, label)| PlacedLabel {
                sequence_index: checkpoint.next_index() + i as i64,
                intent_label: label.intent_label,
                abuse_label: label.abuse_label,
            })
            .collect();
        return Ok(BatchPlan {
            expected: checkpoint,
            labels: placed,
            replayed: 0,
        });
    }

    if declared != labels.len() {
        return Err(PlacementError::MixedDeclaration);
    }

    // 1. Declared indexes must be non-negative and consecutive
    let first = labels[0].sequence_index.unwrap_or_default();
    if first < 0 {
        return Err(PlacementError::NegativeIndex { got: first });
    }
    for (position, label) in labels.iter().enumerate() {
        // Every label is declared here, so an overflowing `None` never matches.
        let expected = first.checked_add(position as i64);
        if label.sequence_index != expected {
            return Err(PlacementError::NonContiguous { position });
        }
    }

    // 2. Skip what is already committed
    let replayed = labels
        .iter()
        .take_while(|l| l.sequence_index.unwrap_or_default() <= checkpoint.index())
        .count();
    let fresh = &labels[replayed..];

    // 3. The first fresh label must sit right after the checkpoint
    if let Some(head) = fresh.first() {
        let got = head.sequence_index.unwrap_or_default();
        if got != checkpoint.next_index() {
            return Err(PlacementError::Gap {
                expected: checkpoint.next_index(),
                got,
            });
        }
    }

    let placed = fresh
        .iter()
        .map(|label| PlacedLabel {
            sequence_index: label.sequence_index.unwrap_or_default(),
            intent_label: label.intent_label,
            abuse_label: label.abuse_label,
        })
        .collect();

    Ok(BatchPlan {
        expected: checkpoint,
        labels: placed,
        replayed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn label() -> LabelPayload {
        LabelPayload::new(Polarity::Positive, Polarity::Negative)
    }

    #[test]
    fn test_positional_placement_after_none() {
        let plan = place_batch(Checkpoint::NONE, &[label(), label()]).unwrap();
        let indexes: Vec<i64> = plan.labels.iter().map(|l| l.sequence_index).collect();
        assert_eq!(indexes, vec![0, 1]);
        assert_eq!(plan.checkpoint_after(), Checkpoint::at(1));
    }

    #[test]
    fn test_empty_batch_is_not_a_write() {
        let plan = place_batch(Checkpoint::at(4), &[]).unwrap();
        assert!(!plan.is_write());
        assert_eq!(plan.checkpoint_after(), Checkpoint::at(4));
    }

    #[test]
    fn test_declared_replay_is_skipped() {
        let batch = [label().with_index(0), label().with_index(1)];
        let plan = place_batch(Checkpoint::at(1), &batch).unwrap();
        assert_eq!(plan.replayed, 2);
        assert!(!plan.is_write());
    }

    #[test]
    fn test_declared_partial_replay() {
        let batch = [
            label().with_index(1),
            label().with_index(2),
            label().with_index(3),
        ];
        let plan = place_batch(Checkpoint::at(1), &batch).unwrap();
        assert_eq!(plan.replayed, 1);
        assert_eq!(plan.labels[0].sequence_index, 2);
        assert_eq!(plan.checkpoint_after(), Checkpoint::at(3));
    }

    #[test]
    fn test_declared_gap_rejected() {
        let batch = [label().with_index(3)];
        assert_eq!(
            place_batch(Checkpoint::at(0), &batch),
            Err(PlacementError::Gap {
                expected: 1,
                got: 3
            })
        );
    }

    #[test]
    fn test_declared_out_of_order_rejected() {
        let batch = [label().with_index(1), label().with_index(0)];
        assert_eq!(
            place_batch(Checkpoint::NONE, &batch),
            Err(PlacementError::NonContiguous { position: 1 })
        );
    }

    #[test]
    fn test_mixed_declaration_rejected() {
        let batch = [label().with_index(0), label()];
        assert_eq!(
            place_batch(Checkpoint::NONE, &batch),
            Err(PlacementError::MixedDeclaration)
        );
    }

    #[test]
    fn test_declared_index_overflow_rejected() {
        let batch = [label().with_index(i64::MAX), label().with_index(i64::MAX)];
        assert_eq!(
            place_batch(Checkpoint::NONE, &batch),
            Err(PlacementError::NonContiguous { position: 1 })
        );

        let single = [label().with_index(i64::MAX)];
        assert!(matches!(
            place_batch(Checkpoint::NONE, &single),
            Err(PlacementError::Gap { .. })
        ));
    }

    proptest! {
        #[test]
        fn positional_plan_is_contiguous(last in -1i64..1000, n in 0usize..32) {
            let cp = Checkpoint::at(last);
            let batch = vec![label(); n];
            let plan = place_batch(cp, &batch).unwrap();
            for (i, placed) in plan.labels.iter().enumerate() {
                prop_assert_eq!(placed.sequence_index, last + 1 + i as i64);
            }
            prop_assert_eq!(plan.checkpoint_after().index(), last + n as i64);
        }

        #[test]
        fn declared_plan_never_rewrites_committed(last in -1i64..50, start in 0i64..60, n in 1usize..16) {
            let cp = Checkpoint::at(last);
            let batch: Vec<_> = (0..n).map(|i| label().with_index(start + i as i64)).collect();
            if let Ok(plan) = place_batch(cp, &batch) {
                for placed in &plan.labels {
                    prop_assert!(placed.sequence_index > last);
                }
                if let Some(head) = plan.labels.first() {
                    prop_assert_eq!(head.sequence_index, last + 1);
                }
            }
        }
    }
}
