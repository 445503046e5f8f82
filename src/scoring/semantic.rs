use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::criteria::Criterion;
use super::vector::cosine_similarity;
use super::windows::{create_windows, Window};
use crate::embedding::EmbeddingProvider;
use crate::settings::Scoring;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionMatch {
    pub keyword: String,
    pub matched: bool,
    pub matched_sentence: Option<String>,
    pub similarity: f32,
    pub weight: i32,
    pub score: f32,
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticEvaluation {
    pub score: u8,
    pub raw_score: f32,
    pub details: Vec<CriterionMatch>,
    pub max_possible_score: f32,
    pub min_possible_score: Option<f32>,
    pub positive_max_score: f32,
    pub negative_max_score: f32,
    pub degraded_windows: usize,
    pub skipped_criteria: Vec<String>,
    pub error: Option<String>,
}

impl SemanticEvaluation {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded_windows > 0 || !self.skipped_criteria.is_empty()
    }
}

/// Raw score delta for one criterion. Hits count their full weight. Avoided
/// negative criteria earn their full magnitude; missed positive criteria
/// cost half their weight.
pub fn criterion_contribution(weight: i32, matched: bool) -> f32 {
    if matched {
        weight as f32
    } else if weight < 0 {
        weight.unsigned_abs() as f32
    } else {
        -(weight as f32) / 2.0
    }
}

/// Maps a raw score onto `[0, 100]`. With no weighted criteria at all the
/// result is a neutral 50.
pub fn normalize_score(raw_score: f32, positive_max: f32, negative_max: f32) -> u8 {
    let max_possible = positive_max + negative_max;
    if max_possible == 0.0 {
        return 50;
    }
    (((raw_score + negative_max) / max_possible) * 100.0)
        .round()
        .clamp(0.0, 100.0) as u8
}

#[derive(Debug, Default)]
struct ScoreTally {
    total: f32,
    positive_max: f32,
    negative_max: f32,
}

impl ScoreTally {
    fn add(&mut self, weight: i32, contribution: f32) {
        self.total += contribution;
        if weight > 0 {
            self.positive_max += weight as f32;
        } else if weight < 0 {
            self.negative_max += weight.unsigned_abs() as f32;
        }
    }

    fn min_possible(&self) -> f32 {
        -(self.positive_max / 2.0) - self.negative_max
    }
}

struct BestMatch {
    index: usize,
    similarity: f32,
    degraded: bool,
}

/// Never fails. A total provider outage yields a zero result carrying the error.
pub async fn evaluate<P: EmbeddingProvider>(
    provider: &P,
    transcript: &str,
    criteria: &[Criterion],
    config: &Scoring,
) -> SemanticEvaluation {
    match try_evaluate(provider, transcript, criteria, config).await {
        Ok(evaluation) => evaluation,
        Err(e) => {
            error!(error = %e, "semantic evaluation failed");
            SemanticEvaluation::failed(e.to_string())
        }
    }
}

async fn try_evaluate<P: EmbeddingProvider>(
    provider: &P,
    transcript: &str,
    criteria: &[Criterion],
    config: &Scoring,
) -> Result<SemanticEvaluation> {
    let windows = create_windows(transcript, config.window_size, config.window_stride);
    if windows.is_empty() || criteria.is_empty() {
        return Ok(SemanticEvaluation::default());
    }

    let window_embeddings = embed_windows(provider, &windows).await?;
    let degraded_windows = window_embeddings.iter().filter(|e| e.is_none()).count();
    let dimension = window_embeddings.iter().flatten().map(Vec::len).next();

    let mut tally = ScoreTally::default();
    let mut details = Vec::with_capacity(criteria.len());
    let mut skipped_criteria = Vec::new();

    for criterion in criteria {
        if !criterion.has_embedding() {
            warn!(keyword = criterion.keyword(), "criterion has no embedding, skipping");
            skipped_criteria.push(criterion.keyword().to_string());
            continue;
        }
        if dimension.is_some_and(|d| d != criterion.embedding().len()) {
            warn!(
                keyword = criterion.keyword(),
                criterion_dimension = criterion.embedding().len(),
                window_dimension = ?dimension,
                "criterion embedding was computed by a different model, skipping"
            );
            skipped_criteria.push(criterion.keyword().to_string());
            continue;
        }

        let best = best_match(criterion.embedding(), &window_embeddings);
        let matched = best.similarity >= config.similarity_threshold;
        let contribution = criterion_contribution(criterion.weight(), matched);
        tally.add(criterion.weight(), contribution);

        details.push(CriterionMatch {
            keyword: criterion.keyword().to_string(),
            matched,
            matched_sentence: matched.then(|| format!("...{}...", windows[best.index].text)),
            similarity: best.similarity,
            weight: criterion.weight(),
            score: contribution,
            degraded: best.degraded,
        });
    }

    Ok(SemanticEvaluation {
        score: normalize_score(tally.total, tally.positive_max, tally.negative_max),
        raw_score: tally.total,
        max_possible_score: tally.positive_max + tally.negative_max,
        min_possible_score: (!details.is_empty()).then(|| tally.min_possible()),
        positive_max_score: tally.positive_max,
        negative_max_score: tally.negative_max,
        details,
        degraded_windows,
        skipped_criteria,
        error: None,
    })
}

// A failed batch is retried window by window.
async fn embed_windows<P: EmbeddingProvider>(
    provider: &P,
    windows: &[Window],
) -> Result<Vec<Option<Vec<f32>>>> {
    let texts: Vec<String> = windows.iter().map(|w| w.text.clone()).collect();

    match provider.embed_batch(&texts).await {
        Ok(embeddings) if embeddings.len() == texts.len() => {
            return Ok(embeddings.into_iter().map(Some).collect());
        }
        Ok(embeddings) => warn!(
            expected = texts.len(),
            received = embeddings.len(),
            "window embedding count mismatch, retrying individually"
        ),
        Err(e) => warn!(error = %e, "window batch embedding failed, retrying individually"),
    }

    let mut embeddings = Vec::with_capacity(texts.len());
    let mut last_error = None;
    for (idx, text) in texts.iter().enumerate() {
        match provider.embed(text).await {
            Ok(embedding) => embeddings.push(Some(embedding)),
            Err(e) => {
                warn!(window = idx, error = %e, "window embedding failed, using zero similarity");
                last_error = Some(e);
                embeddings.push(None);
            }
        }
    }

    if embeddings.iter().all(Option::is_none) {
        match last_error {
            Some(e) => bail!("embedding provider failed for every window: {e}"),
            None => bail!("embedding provider failed for every window"),
        }
    }

    Ok(embeddings)
}

fn best_match(criterion_embedding: &[f32], window_embeddings: &[Option<Vec<f32>>]) -> BestMatch {
    let mut best = BestMatch {
        index: 0,
        similarity: f32::NEG_INFINITY,
        degraded: false,
    };

    for (idx, window_embedding) in window_embeddings.iter().enumerate() {
        let similarity = match window_embedding {
            Some(embedding) => cosine_similarity(criterion_embedding, embedding),
            None => {
                best.degraded = true;
                0.0
            }
        };
        if similarity > best.similarity {
            best.index = idx;
            best.similarity = similarity;
        }
    }

    best
}
