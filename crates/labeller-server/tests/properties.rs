//! Property tests for the checkpoint protocol over random labelling sessions.

use std::sync::Arc;

use labeller_core::{Polarity, UserId};
use labeller_server::{CheckpointProtocol, NextBatch, ProtocolConfig, SharedStore};
use labeller_store::{MemoryStore, SqliteStore, Store, StoreExt};
use labeller_testkit::{label_batch, LabellingSession};
use proptest::prelude::*;

fn context_id(content: &str) -> i64 {
    content
        .strip_prefix("context-")
        .and_then(|n| n.parse().ok())
        .unwrap()
}

fn served(batch: &NextBatch) -> Vec<i64> {
    match batch {
        NextBatch::Contexts(contents) => contents.iter().map(|c| context_id(c)).collect(),
        NextBatch::Complete => Vec::new(),
    }
}

/// Check a served page against the number of labels already committed.
fn check_page(batch: &NextBatch, committed: i64, session: &LabellingSession) -> Result<(), TestCaseError> {
    let ids = served(batch);
    if committed as usize >= session.contexts {
        prop_assert!(batch.is_complete());
        return Ok(());
    }

    // Nothing labelled is served again, and pages are ascending and contiguous.
    prop_assert_eq!(ids.first().copied(), Some(committed));
    prop_assert!(ids.windows(2).all(|w| w[1] == w[0] + 1));
    prop_assert!(ids.len() <= session.page_size);
    Ok(())
}

fn run_session(store: SharedStore, session: &LabellingSession) -> Result<(), TestCaseError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let contents = labeller_testkit::context_strings(session.contexts);
        store.seed_contexts_if_empty(&contents).await.unwrap();
        let user: UserId = store.insert_user(Polarity::Positive).await.unwrap();
        store.insert_visit(user, None).await.unwrap();

        let protocol = CheckpointProtocol::new(
            Arc::clone(&store),
            ProtocolConfig::with_page_size(session.page_size).unwrap(),
        );

        let mut committed = 0i64;
        let mut completed = false;

        for &wanted in &session.batches {
            let page = protocol.get_next_batch(user, &[]).await.unwrap();
            let again = protocol.get_next_batch(user, &[]).await.unwrap();
            prop_assert_eq!(&page, &again);
            check_page(&page, committed, session)?;

            if completed {
                prop_assert!(page.is_complete());
            }
            completed |= page.is_complete();

            let count = wanted.min(served(&page).len());
            let next = protocol
                .get_next_batch(user, &label_batch(count, Polarity::Negative))
                .await
                .unwrap();
            committed += count as i64;
            check_page(&next, committed, session)?;
        }

        // Drain: label full pages until complete.
        let mut page = protocol.get_next_batch(user, &[]).await.unwrap();
        for _ in 0..session.full_page_fetches() {
            if page.is_complete() {
                break;
            }
            let count = served(&page).len();
            page = protocol
                .get_next_batch(user, &label_batch(count, Polarity::Positive))
                .await
                .unwrap();
            committed += count as i64;
            check_page(&page, committed, session)?;
        }
        prop_assert!(page.is_complete());
        prop_assert!(protocol.get_next_batch(user, &[]).await.unwrap().is_complete());

        // Committed indexes are exactly 0..contexts.
        let indexes: Vec<i64> = store
            .labels_for_user(user)
            .await
            .unwrap()
            .iter()
            .map(|l| l.sequence_index)
            .collect();
        let expected: Vec<i64> = (0..session.contexts as i64).collect();
        prop_assert_eq!(indexes, expected);
        prop_assert_eq!(store.checkpoint(user).await.unwrap().index(), session.contexts as i64 - 1);
        Ok(())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_session_properties_memory(session: LabellingSession) {
        run_session(Arc::new(MemoryStore::new()), &session)?;
    }

    #[test]
    fn test_session_properties_sqlite(session: LabellingSession) {
        run_session(Arc::new(SqliteStore::open_memory().unwrap()), &session)?;
    }
}

#[tokio::test]
async fn test_concurrent_commits_from_same_checkpoint() {
    let store: SharedStore = Arc::new(SqliteStore::open_memory().unwrap());
    store
        .seed_contexts_if_empty(&labeller_testkit::context_strings(4))
        .await
        .unwrap();
    let user = store.insert_user(Polarity::Positive).await.unwrap();
    store.insert_visit(user, None).await.unwrap();

    let protocol = Arc::new(CheckpointProtocol::new(
        Arc::clone(&store),
        ProtocolConfig::with_page_size(2).unwrap(),
    ));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let protocol = Arc::clone(&protocol);
            tokio::spawn(async move {
                protocol
                    .get_next_batch(user, &label_batch(2, Polarity::Positive))
                    .await
            })
        })
        .collect();

    for handle in handles {
        // Any outcome is allowed per request; the stream must stay gap-free.
        let _ = handle.await.unwrap();
    }

    let indexes: Vec<i64> = store
        .labels_for_user(user)
        .await
        .unwrap()
        .iter()
        .map(|l| l.sequence_index)
        .collect();
    let expected: Vec<i64> = (0..indexes.len() as i64).collect();
    assert_eq!(indexes, expected);
    assert!(!indexes.is_empty());
}
