//! Best-effort augmentation of a ranked result via an external reasoning
//! capability.
//!
//! The stage is strictly additive: a timeout, an error or an empty answer
//! passes the input ranking through unchanged with `augmented = false`, and
//! augmented output is never written back to the query cache, since it
//! depends on a non-deterministic external capability whose unavailability
//! must not poison previously cached deterministic results.

use std::time::Duration;

use tracing::warn;

use hsrec_core::traits::Augmenter;
use hsrec_core::types::Recommendation;

pub struct AugmentStage {
    augmenter: Box<dyn Augmenter>,
    timeout: Duration,
}

impl AugmentStage {
    pub fn new(augmenter: Box<dyn Augmenter>, timeout: Duration) -> Self {
        Self { augmenter, timeout }
    }

    /// Hand the ranked candidates to the capability, bounded by the stage
    /// timeout. No lock is held across the call.
    pub async fn apply(&self, query: &str, recommendation: Recommendation) -> Recommendation {
        if recommendation.candidates.is_empty() {
            return recommendation;
        }
        let id = self.augmenter.augmenter_id();
        let outcome = tokio::time::timeout(
            self.timeout,
            self.augmenter.augment(query, &recommendation.candidates),
        )
        .await;
        match outcome {
            Ok(Ok(reordered)) if !reordered.is_empty() => {
                let mut out = recommendation;
                out.candidates = reordered;
                for (i, c) in out.candidates.iter_mut().enumerate() {
                    c.rank = i + 1;
                }
                out.augmented = true;
                out
            }
            Ok(Ok(_)) => {
                warn!("augmenter {id} returned no candidates, keeping original ranking");
                recommendation
            }
            Ok(Err(e)) => {
                warn!("augmenter {id} failed: {e}, keeping original ranking");
                recommendation
            }
            Err(_) => {
                warn!("augmenter {id} timed out after {:?}, keeping original ranking", self.timeout);
                recommendation
            }
        }
    }
}
