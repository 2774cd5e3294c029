//! Property tests for label commits against both backends.

use std::sync::Arc;

use labeller_core::{place_batch, Checkpoint, LabelPayload, Polarity};
use labeller_store::{CommitResult, MemoryStore, SqliteStore, Store, StoreExt};
use proptest::prelude::*;

/// One step of a writer: commit `size` labels, either against the current
/// checkpoint or against one that has since moved.
#[derive(Debug, Clone)]
struct Step {
    size: usize,
    stale: bool,
}

fn step() -> impl Strategy<Value = Step> {
    (1usize..=5, prop::bool::weighted(0.25)).prop_map(|(size, stale)| Step { size, stale })
}

fn run_steps(store: Arc<dyn Store>, steps: &[Step]) -> Result<(), TestCaseError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let user = store.insert_user(Polarity::Negative).await.unwrap();
        store.insert_visit(user, None).await.unwrap();

        let mut committed = 0i64;
        for step in steps {
            let current = store.checkpoint(user).await.unwrap();
            prop_assert_eq!(current.index(), committed - 1);

            let expected = if step.stale && committed > 0 {
                Checkpoint::at(committed - 2)
            } else {
                current
            };

            let batch = vec![LabelPayload::new(Polarity::Positive, Polarity::Negative); step.size];
            let plan = place_batch(expected, &batch).unwrap();
            let result = store.commit_labels(user, expected, &plan.labels).await.unwrap();

            match result {
                CommitResult::Committed { checkpoint, .. } => {
                    prop_assert_eq!(expected, current);
                    committed += step.size as i64;
                    prop_assert_eq!(checkpoint.index(), committed - 1);
                }
                CommitResult::Stale { current: seen } => {
                    prop_assert_ne!(expected, current);
                    prop_assert_eq!(seen, current);
                }
            }
        }

        let indexes: Vec<i64> = store
            .labels_for_user(user)
            .await
            .unwrap()
            .iter()
            .map(|l| l.sequence_index)
            .collect();
        prop_assert_eq!(indexes, (0..committed).collect::<Vec<_>>());
        Ok(())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_commits_stay_gap_free_memory(steps in prop::collection::vec(step(), 0..12)) {
        run_steps(Arc::new(MemoryStore::new()), &steps)?;
    }

    #[test]
    fn test_commits_stay_gap_free_sqlite(steps in prop::collection::vec(step(), 0..12)) {
        run_steps(Arc::new(SqliteStore::open_memory().unwrap()), &steps)?;
    }
}
