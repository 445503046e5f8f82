use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::timeout;

use crate::db::{persist_report, DbPool};
use crate::embedding::EmbeddingProvider;
use crate::evaluation::{evaluate_submission, EvaluationStatus, SubmissionJob, SubmissionReport};
use crate::settings::{Settings, Worker};
use crate::utils::{
    log_db_error, log_job_done, log_job_rejected, log_job_started, log_job_timeout,
    log_worker_error,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Saved(EvaluationStatus),
    /// Unreadable job file, moved to the failed directory.
    Rejected,
}

pub async fn prepare_dirs(config: &Worker) -> Result<()> {
    for dir in [&config.inbox_dir, &config.done_dir, &config.failed_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    Ok(())
}

/// Runs every `*.json` job in the inbox in file name order. A failing job is
/// logged and left in place for the next poll.
pub async fn process_inbox<P: EmbeddingProvider>(
    pool: &DbPool,
    provider: &P,
    s: &Settings,
) -> Result<usize> {
    let mut jobs = pending_jobs(&s.worker.inbox_dir).await?;
    jobs.sort();

    let mut processed = 0;
    for path in &jobs {
        match process_job(pool, provider, path, s).await {
            Ok(_) => processed += 1,
            Err(e) => log_worker_error(&format!("{}: {e:#}", path.display())),
        }
    }

    Ok(processed)
}

async fn pending_jobs(inbox_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(inbox_dir)
        .await
        .with_context(|| format!("failed to read {}", inbox_dir.display()))?;

    let mut jobs = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            jobs.push(path);
        }
    }
    Ok(jobs)
}

async fn read_job(path: &Path) -> Result<SubmissionJob> {
    let contents = tokio::fs::read_to_string(path).await?;
    let job: SubmissionJob = serde_json::from_str(&contents)?;
    Ok(job)
}

pub async fn process_job<P: EmbeddingProvider>(
    pool: &DbPool,
    provider: &P,
    path: &Path,
    s: &Settings,
) -> Result<JobOutcome> {
    let job = match read_job(path).await {
        Ok(job) => job,
        Err(e) => {
            log_job_rejected(path, &e.to_string());
            move_job(path, &s.worker.failed_dir).await?;
            return Ok(JobOutcome::Rejected);
        }
    };

    log_job_started(&job.submission_id);
    let deadline = Duration::from_secs(s.worker.timeout_secs);
    let report = match timeout(deadline, evaluate_submission(provider, &job, s)).await {
        Ok(report) => report,
        Err(_) => {
            log_job_timeout(&job.submission_id, s.worker.timeout_secs);
            let reason = format!("evaluation timed out after {}s", s.worker.timeout_secs);
            SubmissionReport::unavailable(&job, reason, s)
        }
    };

    {
        let mut conn = pool.get()?;
        if let Err(e) = persist_report(&mut conn, &report, Utc::now().timestamp()) {
            log_db_error(&format!("failed to save {}: {e}", report.submission_id));
            return Err(e);
        }
    }

    log_job_done(&report);
    move_job(path, &s.worker.done_dir).await?;
    Ok(JobOutcome::Saved(report.status))
}

async fn move_job(path: &Path, dir: &Path) -> Result<()> {
    let file_name = path.file_name().context("job path has no file name")?;
    tokio::fs::rename(path, dir.join(file_name))
        .await
        .with_context(|| format!("failed to move {} to {}", path.display(), dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{count_by_status, establish_pool, get_evaluation, run_migrations};
    use crate::embedding::testing::{StalledEmbedder, VocabEmbedder};
    use crate::schema::evaluations;
    use diesel::prelude::*;
    use tempfile::TempDir;

    const GOOD_JOB: &str = r#"{
        "submissionId": "sub-7",
        "transcript": "We can offer you a discount today",
        "criteria": [{"keyword": "discount", "weight": 3, "embeddings": [1.0, 0.0]}],
        "recordingDuration": 4.0
    }"#;

    struct Spool {
        _dir: TempDir,
        pool: DbPool,
        settings: Settings,
    }

    impl Spool {
        async fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let database = dir.path().join("evaluations.db");
            let pool = establish_pool(database.to_str().unwrap()).unwrap();
            run_migrations(&mut pool.get().unwrap()).unwrap();

            let mut settings = Settings::default();
            settings.worker.inbox_dir = dir.path().join("inbox");
            settings.worker.done_dir = dir.path().join("done");
            settings.worker.failed_dir = dir.path().join("failed");
            prepare_dirs(&settings.worker).await.unwrap();

            Self {
                _dir: dir,
                pool,
                settings,
            }
        }

        fn drop_job(&self, name: &str, contents: &str) -> PathBuf {
            let path = self.settings.worker.inbox_dir.join(name);
            std::fs::write(&path, contents).unwrap();
            path
        }

        fn row_count(&self) -> i64 {
            let mut conn = self.pool.get().unwrap();
            evaluations::table.count().get_result(&mut *conn).unwrap()
        }
    }

    fn embedder() -> VocabEmbedder {
        VocabEmbedder::new(&["discount", "scam"])
    }

    #[tokio::test]
    async fn test_good_job_saved_and_moved_to_done() {
        let spool = Spool::new().await;
        let path = spool.drop_job("sub-7.json", GOOD_JOB);

        let outcome = process_job(&spool.pool, &embedder(), &path, &spool.settings)
            .await
            .unwrap();

        assert_eq!(outcome, JobOutcome::Saved(EvaluationStatus::Scored));
        assert!(!path.exists());
        assert!(spool.settings.worker.done_dir.join("sub-7.json").exists());

        let mut conn = spool.pool.get().unwrap();
        let record = get_evaluation(&mut conn, "sub-7").unwrap().unwrap();
        assert_eq!(record.status, "scored");
        assert_eq!(record.score, 100);
    }

    #[tokio::test]
    async fn test_malformed_job_moved_to_failed_without_row() {
        let spool = Spool::new().await;
        let path = spool.drop_job("broken.json", "{\"transcript\": ");

        let outcome = process_job(&spool.pool, &embedder(), &path, &spool.settings)
            .await
            .unwrap();

        assert_eq!(outcome, JobOutcome::Rejected);
        assert!(!path.exists());
        assert!(spool.settings.worker.failed_dir.join("broken.json").exists());
        assert!(!spool.settings.worker.done_dir.join("broken.json").exists());
        assert_eq!(spool.row_count(), 0);
    }

    #[tokio::test]
    async fn test_timed_out_job_saved_as_unavailable() {
        let mut spool = Spool::new().await;
        spool.settings.worker.timeout_secs = 0;
        let path = spool.drop_job("sub-7.json", GOOD_JOB);

        let outcome = process_job(&spool.pool, &StalledEmbedder, &path, &spool.settings)
            .await
            .unwrap();

        assert_eq!(outcome, JobOutcome::Saved(EvaluationStatus::Unavailable));
        assert!(spool.settings.worker.done_dir.join("sub-7.json").exists());

        let mut conn = spool.pool.get().unwrap();
        let record = get_evaluation(&mut conn, "sub-7").unwrap().unwrap();
        assert_eq!(record.score, 0);
        assert!(record.error.unwrap().contains("timed out"));
        assert_eq!(count_by_status(&mut conn, "unavailable").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_inbox_only_takes_json_files() {
        let spool = Spool::new().await;
        spool.drop_job("a.json", GOOD_JOB);
        spool.drop_job("b.json", "not json");
        let notes = spool.drop_job("notes.txt", "ignore me");

        let processed = process_inbox(&spool.pool, &embedder(), &spool.settings)
            .await
            .unwrap();

        assert_eq!(processed, 2);
        assert!(notes.exists());
        assert!(spool.settings.worker.done_dir.join("a.json").exists());
        assert!(spool.settings.worker.failed_dir.join("b.json").exists());
        assert_eq!(spool.row_count(), 1);
    }
}
