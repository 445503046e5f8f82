use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::info;

use crate::embedding::EmbeddingProvider;
use crate::scoring::{
    evaluate, ideal_pitch_similarity, Criterion, SemanticEvaluation, SemanticSimilarity,
};
use crate::settings::Settings;
use crate::speech::{
    analyze_pauses, analyze_speech, PauseMetrics, SpeechMetrics, TimestampedWord,
    TranscriptSegment,
};

/// Everything the scorer needs to know about one submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionJob {
    pub submission_id: String,
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub criteria: Vec<Criterion>,
    #[serde(default)]
    pub ideal_pitch_embeddings: Option<Vec<f32>>,
    #[serde(default)]
    pub words: Vec<TimestampedWord>,
    #[serde(default)]
    pub segments: Option<Vec<TranscriptSegment>>,
    /// Seconds. Falls back to the last word's end time when absent.
    #[serde(default)]
    pub recording_duration: Option<f64>,
}

impl SubmissionJob {
    pub fn recording_duration(&self) -> Option<f64> {
        self.recording_duration
            .or_else(|| self.words.last().map(|w| w.end_time))
            .filter(|duration| *duration > 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStatus {
    #[strum(serialize = "scored")]
    Scored,
    /// Scored, but some embeddings were missing or substituted.
    #[strum(serialize = "degraded")]
    Degraded,
    /// No automatic evaluation; shown to users as pending.
    #[strum(serialize = "unavailable")]
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReport {
    pub submission_id: String,
    pub status: EvaluationStatus,
    pub evaluation: SemanticEvaluation,
    pub similarity: Option<SemanticSimilarity>,
    pub speech: SpeechMetrics,
    pub pauses: Option<PauseMetrics>,
}

impl SubmissionReport {
    /// Report for a submission whose semantic scoring could not run; the
    /// delivery metrics need no model and are still filled in.
    pub fn unavailable(
        job: &SubmissionJob,
        reason: impl Into<String>,
        settings: &Settings,
    ) -> Self {
        let (speech, pauses) = delivery_metrics(job, settings);
        Self {
            submission_id: job.submission_id.clone(),
            status: EvaluationStatus::Unavailable,
            evaluation: SemanticEvaluation::failed(reason),
            similarity: None,
            speech,
            pauses,
        }
    }
}

fn delivery_metrics(
    job: &SubmissionJob,
    settings: &Settings,
) -> (SpeechMetrics, Option<PauseMetrics>) {
    let speech = analyze_speech(&job.words, &settings.speech);
    let pauses = job.recording_duration().map(|duration| {
        analyze_pauses(
            &job.transcript,
            duration,
            job.segments.as_deref(),
            &settings.pauses,
            &settings.estimation,
        )
    });
    (speech, pauses)
}

/// Runs every analysis for one submission. Never fails; problems show up in
/// the report status.
pub async fn evaluate_submission<P: EmbeddingProvider>(
    provider: &P,
    job: &SubmissionJob,
    settings: &Settings,
) -> SubmissionReport {
    let evaluation = evaluate(provider, &job.transcript, &job.criteria, &settings.scoring).await;

    let similarity = match job.ideal_pitch_embeddings.as_deref() {
        Some(ideal) => Some(ideal_pitch_similarity(provider, &job.transcript, Some(ideal)).await),
        None => None,
    };

    let status = if evaluation.is_failed() {
        EvaluationStatus::Unavailable
    } else if evaluation.is_degraded() || similarity.is_some_and(|s| s.degraded) {
        EvaluationStatus::Degraded
    } else {
        EvaluationStatus::Scored
    };

    let (speech, pauses) = delivery_metrics(job, settings);

    info!(
        submission = %job.submission_id,
        %status,
        score = evaluation.score,
        "submission evaluated"
    );

    SubmissionReport {
        submission_id: job.submission_id.clone(),
        status,
        evaluation,
        similarity,
        speech,
        pauses,
    }
}
