//! Proptest generators for property-based testing.

use proptest::prelude::*;

use labeller_core::{LabelPayload, Polarity};

/// Generate a polarity.
pub fn polarity() -> impl Strategy<Value = Polarity> {
    prop_oneof![Just(Polarity::Positive), Just(Polarity::Negative)]
}

/// Generate an undeclared label.
pub fn label_payload() -> impl Strategy<Value = LabelPayload> {
    (polarity(), polarity()).prop_map(|(intent, abuse)| LabelPayload::new(intent, abuse))
}

/// A labelling session: how many contexts exist, the page size, and the
/// sizes of the label batches the client submits in order.
///
/// Batch sizes may exceed what was served; callers clamp them to the page
/// they actually received, the way an honest client would.
#[derive(Debug, Clone)]
pub struct LabellingSession {
    pub contexts: usize,
    pub page_size: usize,
    pub batches: Vec<usize>,
}

impl LabellingSession {
    /// Fetches needed to reach `complete` when every batch labels a full page.
    pub fn full_page_fetches(&self) -> usize {
        self.contexts.div_ceil(self.page_size) + 1
    }
}

impl Arbitrary for LabellingSession {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (0usize..=25, 1usize..=6)
            .prop_flat_map(|(contexts, page_size)| {
                let batches = prop::collection::vec(0usize..=page_size, 0..=12);
                (Just(contexts), Just(page_size), batches)
            })
            .prop_map(|(contexts, page_size, batches)| LabellingSession {
                contexts,
                page_size,
                batches,
            })
            .boxed()
    }
}
