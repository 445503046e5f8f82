use serde::{Deserialize, Serialize};
use tracing::warn;

use super::vector::cosine_similarity;
use crate::embedding::EmbeddingProvider;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticSimilarity {
    pub score: u8,
    pub similarity: f32,
    /// The transcript embedding was missing or from another model.
    pub degraded: bool,
}

pub fn similarity_to_score(similarity: f32) -> u8 {
    (((similarity.clamp(-1.0, 1.0) + 1.0) / 2.0) * 100.0).round() as u8
}

pub async fn ideal_pitch_similarity<P: EmbeddingProvider>(
    provider: &P,
    transcript: &str,
    ideal_pitch_embeddings: Option<&[f32]>,
) -> SemanticSimilarity {
    let Some(ideal) = ideal_pitch_embeddings.filter(|e| !e.is_empty()) else {
        return SemanticSimilarity::default();
    };
    if transcript.trim().is_empty() {
        return SemanticSimilarity::default();
    }

    match provider.embed(transcript).await {
        Ok(embedding) if embedding.len() != ideal.len() => {
            warn!(
                transcript_dimension = embedding.len(),
                ideal_dimension = ideal.len(),
                "ideal pitch embedding was computed by a different model"
            );
            SemanticSimilarity {
                degraded: true,
                ..Default::default()
            }
        }
        Ok(embedding) => {
            let similarity = cosine_similarity(&embedding, ideal);
            SemanticSimilarity {
                score: similarity_to_score(similarity),
                similarity,
                degraded: false,
            }
        }
        Err(e) => {
            warn!(error = %e, "transcript embedding failed, ideal pitch similarity unavailable");
            SemanticSimilarity {
                degraded: true,
                ..Default::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::{OfflineEmbedder, VocabEmbedder};

    #[test]
    fn test_score_mapping() {
        assert_eq!(similarity_to_score(1.0), 100);
        assert_eq!(similarity_to_score(-1.0), 0);
        assert_eq!(similarity_to_score(0.0), 50);
        assert_eq!(similarity_to_score(0.5), 75);
        assert_eq!(similarity_to_score(1.5), 100);
    }

    #[tokio::test]
    async fn test_similar_transcript() {
        let embedder = VocabEmbedder::new(&["discount", "warranty"]);
        let ideal = embedder.vector("discount warranty");
        let result = ideal_pitch_similarity(
            &embedder,
            "A discount and a warranty",
            Some(ideal.as_slice()),
        )
        .await;
        assert!(result.score >= 99);
        assert!(!result.degraded);
    }

    #[tokio::test]
    async fn test_missing_inputs() {
        let embedder = VocabEmbedder::new(&["discount"]);
        assert_eq!(
            ideal_pitch_similarity(&embedder, "a discount", None).await,
            SemanticSimilarity::default()
        );
        assert_eq!(
            ideal_pitch_similarity(&embedder, "a discount", Some(&[][..])).await,
            SemanticSimilarity::default()
        );
        assert_eq!(
            ideal_pitch_similarity(&embedder, " ", Some(&[1.0][..])).await,
            SemanticSimilarity::default()
        );
        assert_eq!(embedder.batch_calls(), 0);
    }

    #[tokio::test]
    async fn test_mismatched_dimension_is_flagged() {
        let embedder = VocabEmbedder::new(&["discount", "warranty", "scam"]);
        let result =
            ideal_pitch_similarity(&embedder, "a discount", Some(&[1.0, 0.0][..])).await;
        assert_eq!(result.score, 0);
        assert_eq!(result.similarity, 0.0);
        assert!(result.degraded);
    }

    #[tokio::test]
    async fn test_provider_failure_is_flagged() {
        let result =
            ideal_pitch_similarity(&OfflineEmbedder, "a pitch", Some(&[1.0, 0.0][..])).await;
        assert_eq!(result.score, 0);
        assert!(result.degraded);
    }
}
