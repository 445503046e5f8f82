use anyhow::{anyhow, Context, Result};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use serde::Serialize;

use crate::evaluation::SubmissionReport;
use crate::schema::{evaluations, speech_metrics};
use crate::speech::{PauseMetrics, SpeechMetrics};

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(Debug)]
struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        configure_connection(conn).map_err(diesel::r2d2::Error::QueryError)
    }
}

pub fn establish_pool(database_url: &str) -> Result<DbPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    Pool::builder()
        .max_size(5)
        .connection_customizer(Box::new(SqlitePragmas))
        .build(manager)
        .with_context(|| format!("failed to open database {database_url}"))
}

pub fn configure_connection(conn: &mut SqliteConnection) -> QueryResult<()> {
    conn.batch_execute("PRAGMA busy_timeout = 2000;")?;
    conn.batch_execute("PRAGMA journal_mode = WAL;")?;
    conn.batch_execute("PRAGMA synchronous = NORMAL;")?;
    conn.batch_execute("PRAGMA foreign_keys = ON;")?;
    Ok(())
}

pub fn run_migrations(conn: &mut SqliteConnection) -> Result<()> {
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!("failed to run migrations: {e}"))?;
    Ok(())
}

#[derive(Insertable, Queryable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = evaluations)]
pub struct EvaluationRecord {
    pub submission_id: String,
    pub status: String,
    pub score: i32,
    pub raw_score: f32,
    pub max_possible_score: f32,
    pub min_possible_score: Option<f32>,
    /// JSON array of criterion matches.
    pub details: String,
    /// JSON array of keywords.
    pub skipped_criteria: String,
    pub degraded_windows: i32,
    pub similarity_score: Option<i32>,
    pub similarity: Option<f32>,
    pub error: Option<String>,
    pub evaluated_at: i64,
}

impl EvaluationRecord {
    pub fn from_report(report: &SubmissionReport, evaluated_at: i64) -> Result<Self> {
        let evaluation = &report.evaluation;
        Ok(Self {
            submission_id: report.submission_id.clone(),
            status: report.status.to_string(),
            score: evaluation.score.into(),
            raw_score: evaluation.raw_score,
            max_possible_score: evaluation.max_possible_score,
            min_possible_score: evaluation.min_possible_score,
            details: serde_json::to_string(&evaluation.details)?,
            skipped_criteria: serde_json::to_string(&evaluation.skipped_criteria)?,
            degraded_windows: i32::try_from(evaluation.degraded_windows).unwrap_or(i32::MAX),
            similarity_score: report.similarity.map(|s| s.score.into()),
            similarity: report.similarity.map(|s| s.similarity),
            error: evaluation.error.clone(),
            evaluated_at,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeliveryMetrics<'a> {
    speech: &'a SpeechMetrics,
    pauses: Option<&'a PauseMetrics>,
}

#[derive(Insertable, Queryable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = speech_metrics)]
pub struct SpeechMetricsRecord {
    pub submission_id: String,
    pub average_rate: f64,
    pub total_words: i32,
    pub total_duration: f64,
    pub pause_mode: Option<String>,
    pub conversational_rate: Option<f64>,
    pub speaking_time_percent: Option<i32>,
    pub total_pauses: Option<i32>,
    /// Full speech and pause metrics as JSON.
    pub metrics: String,
    pub recorded_at: i64,
}

impl SpeechMetricsRecord {
    pub fn from_report(report: &SubmissionReport, recorded_at: i64) -> Result<Self> {
        let overall = &report.speech.overall_metrics;
        let pauses = report.pauses.as_ref();
        let metrics = serde_json::to_string(&DeliveryMetrics {
            speech: &report.speech,
            pauses,
        })?;

        Ok(Self {
            submission_id: report.submission_id.clone(),
            average_rate: overall.average_rate,
            total_words: i32::try_from(overall.total_words).unwrap_or(i32::MAX),
            total_duration: overall.total_duration,
            pause_mode: pauses.map(|p| p.mode.to_string()),
            conversational_rate: pauses.map(|p| p.conversational_rate),
            speaking_time_percent: pauses.map(|p| p.speaking_time_percent as i32),
            total_pauses: pauses.map(|p| i32::try_from(p.total_pauses).unwrap_or(i32::MAX)),
            metrics,
            recorded_at,
        })
    }
}

pub fn save_evaluation(
    conn: &mut SqliteConnection,
    record: &EvaluationRecord,
) -> QueryResult<usize> {
    diesel::replace_into(evaluations::table)
        .values(record)
        .execute(conn)
}

/// Speech metrics are derived once per submission; later writes are ignored.
pub fn save_speech_metrics(
    conn: &mut SqliteConnection,
    record: &SpeechMetricsRecord,
) -> QueryResult<usize> {
    diesel::insert_or_ignore_into(speech_metrics::table)
        .values(record)
        .execute(conn)
}

pub fn persist_report(
    conn: &mut SqliteConnection,
    report: &SubmissionReport,
    timestamp: i64,
) -> Result<()> {
    let evaluation = EvaluationRecord::from_report(report, timestamp)?;
    let metrics = SpeechMetricsRecord::from_report(report, timestamp)?;

    conn.transaction::<_, anyhow::Error, _>(|conn| {
        save_evaluation(conn, &evaluation)?;
        save_speech_metrics(conn, &metrics)?;
        Ok(())
    })
}

pub fn get_evaluation(
    conn: &mut SqliteConnection,
    id: &str,
) -> QueryResult<Option<EvaluationRecord>> {
    use crate::schema::evaluations::dsl::*;

    evaluations
        .filter(submission_id.eq(id))
        .select(EvaluationRecord::as_select())
        .first(conn)
        .optional()
}

pub fn get_speech_metrics(
    conn: &mut SqliteConnection,
    id: &str,
) -> QueryResult<Option<SpeechMetricsRecord>> {
    use crate::schema::speech_metrics::dsl::*;

    speech_metrics
        .filter(submission_id.eq(id))
        .select(SpeechMetricsRecord::as_select())
        .first(conn)
        .optional()
}

pub fn count_by_status(conn: &mut SqliteConnection, wanted: &str) -> QueryResult<i64> {
    use crate::schema::evaluations::dsl::*;

    evaluations.filter(status.eq(wanted)).count().get_result(conn)
}
