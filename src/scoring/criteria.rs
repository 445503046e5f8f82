use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingProvider;

/// A weighted keyword. Positive weights reward mentioning it, negative
/// weights reward avoiding it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    keyword: String,
    weight: i32,
    #[serde(default, alias = "embeddings")]
    embedding: Vec<f32>,
}

impl Criterion {
    pub async fn create<P: EmbeddingProvider>(
        keyword: &str,
        weight: i32,
        provider: &P,
        max_weight: i32,
    ) -> Result<Self> {
        let keyword = validate_keyword(keyword)?;
        validate_weight(weight, max_weight)?;
        let embedding = provider.embed(&keyword).await?;
        Ok(Self {
            keyword,
            weight,
            embedding,
        })
    }

    pub fn from_parts(keyword: impl Into<String>, weight: i32, embedding: Vec<f32>) -> Self {
        Self {
            keyword: keyword.into(),
            weight,
            embedding,
        }
    }

    /// Applies an edit. The keyword is re-embedded only when its text changes;
    /// nothing is modified if validation or embedding fails.
    pub async fn edit<P: EmbeddingProvider>(
        &mut self,
        keyword: Option<&str>,
        weight: Option<i32>,
        provider: &P,
        max_weight: i32,
    ) -> Result<()> {
        if let Some(weight) = weight {
            validate_weight(weight, max_weight)?;
        }

        if let Some(keyword) = keyword {
            let keyword = validate_keyword(keyword)?;
            if keyword != self.keyword || !self.has_embedding() {
                self.embedding = provider.embed(&keyword).await?;
                self.keyword = keyword;
            }
        }

        if let Some(weight) = weight {
            self.weight = weight;
        }

        Ok(())
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    pub fn has_embedding(&self) -> bool {
        !self.embedding.is_empty()
    }
}

fn validate_keyword(keyword: &str) -> Result<String> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        bail!("criterion keyword must not be empty");
    }
    Ok(keyword.to_string())
}

fn validate_weight(weight: i32, max_weight: i32) -> Result<()> {
    if weight.unsigned_abs() > max_weight.unsigned_abs() {
        bail!("criterion weight {weight} outside [-{max_weight}, {max_weight}]");
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    #[serde(default)]
    pub criteria: Vec<Criterion>,
    #[serde(default)]
    pub ideal_pitch: Option<String>,
    #[serde(default)]
    pub ideal_pitch_embeddings: Option<Vec<f32>>,
}

impl Challenge {
    pub async fn set_ideal_pitch<P: EmbeddingProvider>(
        &mut self,
        ideal_pitch: Option<&str>,
        provider: &P,
    ) -> Result<()> {
        match ideal_pitch.map(str::trim).filter(|text| !text.is_empty()) {
            Some(text) => {
                self.ideal_pitch_embeddings = Some(provider.embed(text).await?);
                self.ideal_pitch = Some(text.to_string());
            }
            None => {
                self.ideal_pitch = None;
                self.ideal_pitch_embeddings = None;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::{OfflineEmbedder, VocabEmbedder};

    #[tokio::test]
    async fn test_create_embeds_keyword() {
        let embedder = VocabEmbedder::new(&["discount", "scam"]);
        let criterion = Criterion::create(" discount ", 3, &embedder, 5).await.unwrap();
        assert_eq!(criterion.keyword(), "discount");
        assert_eq!(criterion.embedding(), &[1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_create_rejects_out_of_range_weight() {
        let embedder = VocabEmbedder::new(&["discount"]);
        assert!(Criterion::create("discount", 6, &embedder, 5).await.is_err());
        assert!(Criterion::create("discount", -6, &embedder, 5).await.is_err());
        assert!(Criterion::create("discount", -10, &embedder, 10).await.is_ok());
        assert_eq!(embedder.batch_calls(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_min_weight() {
        let embedder = VocabEmbedder::new(&["discount"]);
        assert!(Criterion::create("discount", i32::MIN, &embedder, 10)
            .await
            .is_err());

        let mut criterion = Criterion::create("discount", 3, &embedder, 10).await.unwrap();
        assert!(criterion
            .edit(None, Some(i32::MIN), &embedder, 10)
            .await
            .is_err());
        assert_eq!(criterion.weight(), 3);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_keyword() {
        let embedder = VocabEmbedder::new(&["discount"]);
        assert!(Criterion::create("   ", 1, &embedder, 5).await.is_err());
    }

    #[tokio::test]
    async fn test_edit_keyword_recomputes_embedding() {
        let embedder = VocabEmbedder::new(&["discount", "scam"]);
        let mut criterion = Criterion::create("discount", 3, &embedder, 10).await.unwrap();

        criterion
            .edit(Some("scam"), Some(-4), &embedder, 10)
            .await
            .unwrap();
        assert_eq!(criterion.keyword(), "scam");
        assert_eq!(criterion.weight(), -4);
        assert_eq!(criterion.embedding(), &[0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_edit_weight_only_keeps_embedding() {
        let embedder = VocabEmbedder::new(&["discount"]);
        let mut criterion = Criterion::create("discount", 3, &embedder, 10).await.unwrap();
        criterion
            .edit(Some("discount"), Some(8), &embedder, 10)
            .await
            .unwrap();
        assert_eq!(criterion.weight(), 8);
        assert_eq!(embedder.batch_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_edit_leaves_criterion_untouched() {
        let embedder = VocabEmbedder::new(&["discount"]);
        let mut criterion = Criterion::create("discount", 3, &embedder, 10).await.unwrap();
        let before = criterion.clone();

        assert!(criterion
            .edit(Some("scam"), Some(2), &OfflineEmbedder, 10)
            .await
            .is_err());
        assert_eq!(criterion, before);

        assert!(criterion
            .edit(Some("scam"), Some(11), &embedder, 10)
            .await
            .is_err());
        assert_eq!(criterion, before);
    }

    #[test]
    fn test_deserialize_embeddings_alias() {
        let criterion: Criterion =
            serde_json::from_str(r#"{"keyword":"scam","weight":-4,"embeddings":[0.5,0.5]}"#)
                .unwrap();
        assert_eq!(criterion.embedding(), &[0.5, 0.5]);

        let bare: Criterion = serde_json::from_str(r#"{"keyword":"scam","weight":-4}"#).unwrap();
        assert!(!bare.has_embedding());
    }

    #[tokio::test]
    async fn test_set_ideal_pitch() {
        let embedder = VocabEmbedder::new(&["discount", "warranty"]);
        let mut challenge = Challenge::default();
        challenge
            .set_ideal_pitch(Some("A discount with warranty"), &embedder)
            .await
            .unwrap();
        assert_eq!(challenge.ideal_pitch_embeddings, Some(vec![1.0, 1.0]));

        challenge.set_ideal_pitch(Some("  "), &embedder).await.unwrap();
        assert!(challenge.ideal_pitch.is_none());
        assert!(challenge.ideal_pitch_embeddings.is_none());
    }
}
