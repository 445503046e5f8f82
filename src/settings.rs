use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use strum::Display;
use tracing::{info, warn};

pub const DEFAULT_PATH: &str = "settings.default.ron";
pub const OVERRIDE_PATH: &str = "settings.ron";

static SETTINGS: LazyLock<ArcSwap<Settings>> =
    LazyLock::new(|| ArcSwap::from_pointee(Settings::load_from_files()));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub scoring: Scoring,
    pub speech: Speech,
    pub pauses: Pauses,
    pub estimation: Estimation,
    pub embeddings: Embeddings,
    pub worker: Worker,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Scoring {
    pub similarity_threshold: f32,
    pub window_size: usize,
    pub window_stride: usize,
    /// Criterion weights must lie in `[-max_criterion_weight, max_criterion_weight]`.
    pub max_criterion_weight: i32,
}

impl Default for Scoring {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.70,
            window_size: 25,
            window_stride: 12,
            max_criterion_weight: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Speech {
    pub slow_wpm: f64,
    pub optimal_wpm: f64,
    pub fast_wpm: f64,
    pub window_secs: f64,
    pub min_word_duration: f64,
}

impl Default for Speech {
    fn default() -> Self {
        Self {
            slow_wpm: 120.0,
            optimal_wpm: 150.0,
            fast_wpm: 180.0,
            window_secs: 30.0,
            min_word_duration: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Pauses {
    pub leading_silence: f64,
    pub trailing_silence: f64,
    pub min_gap: f64,
    pub medium_pause: f64,
    pub long_pause: f64,
    /// Segments slower than this are assumed to hide micro-pauses.
    pub hidden_pause_rate: f64,
    pub secs_per_word: f64,
    pub max_rate: f64,
}

impl Default for Pauses {
    fn default() -> Self {
        Self {
            leading_silence: 1.0,
            trailing_silence: 1.0,
            min_gap: 0.3,
            medium_pause: 1.0,
            long_pause: 2.0,
            hidden_pause_rate: 100.0,
            secs_per_word: 0.3,
            max_rate: 300.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Estimation {
    pub chunk_sizes: Vec<usize>,
    pub percentile: f64,
    pub min_rate: f64,
    pub max_rate: f64,
    pub average_pause_secs: f64,
}

impl Default for Estimation {
    fn default() -> Self {
        Self {
            chunk_sizes: vec![6, 10, 15],
            percentile: 0.75,
            min_rate: 60.0,
            max_rate: 300.0,
            average_pause_secs: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
pub enum EmbeddingModel {
    #[default]
    AllMiniLmL12V2,
    AllMiniLmL6V2,
    AllDistilrobertaV1,
    ParaphraseAlbertSmallV2,
    SentenceT5Base,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Embeddings {
    pub model: EmbeddingModel,
    pub batch_size: usize,
}

impl Default for Embeddings {
    fn default() -> Self {
        Self {
            model: EmbeddingModel::default(),
            batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Worker {
    pub inbox_dir: PathBuf,
    pub done_dir: PathBuf,
    pub failed_dir: PathBuf,
    pub poll_interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for Worker {
    fn default() -> Self {
        Self {
            inbox_dir: PathBuf::from("submissions/inbox"),
            done_dir: PathBuf::from("submissions/done"),
            failed_dir: PathBuf::from("submissions/failed"),
            poll_interval_secs: 5,
            timeout_secs: 120,
        }
    }
}

impl Settings {
    pub fn load() -> Arc<Settings> {
        SETTINGS.load_full()
    }

    pub fn reload() {
        match Self::read_files(Path::new(DEFAULT_PATH), Path::new(OVERRIDE_PATH)) {
            Ok(settings) => {
                SETTINGS.store(Arc::new(settings));
                info!("settings reloaded");
            }
            Err(e) => warn!(error = %e, "settings reload failed, keeping previous values"),
        }
    }

    fn load_from_files() -> Settings {
        Self::read_files(Path::new(DEFAULT_PATH), Path::new(OVERRIDE_PATH)).unwrap_or_else(|e| {
            warn!(error = %e, "settings unreadable, using defaults");
            Settings::default()
        })
    }

    fn read_files(default_path: &Path, override_path: &Path) -> Result<Settings> {
        let mut settings = if default_path.exists() {
            Self::read_file(default_path)?
        } else {
            Settings::default()
        };

        if override_path.exists() {
            settings = Self::read_file(override_path)?;
        }

        Ok(settings)
    }

    fn read_file(path: &Path) -> Result<Settings> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        ron::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }
}

pub fn settings() -> Arc<Settings> {
    Settings::load()
}

/// Reloads the settings whenever one of the settings files changes. The
/// returned watcher must be kept alive for as long as reloading is wanted.
pub fn watch_settings() -> Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(|res: notify::Result<Event>| match res {
        Ok(event) => {
            let touches_settings = event.paths.iter().any(|p| {
                p.file_name()
                    .is_some_and(|name| name == DEFAULT_PATH || name == OVERRIDE_PATH)
            });
            let is_write = matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_));
            if touches_settings && is_write {
                Settings::reload();
            }
        }
        Err(e) => warn!(error = %e, "settings watcher error"),
    })?;

    watcher.watch(Path::new("."), RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pitch-scorer-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let parsed: Settings =
            ron::from_str("(scoring: (similarity_threshold: 0.8), speech: (fast_wpm: 200.0))")
                .unwrap();
        assert!((parsed.scoring.similarity_threshold - 0.8).abs() < f32::EPSILON);
        assert_eq!(parsed.scoring.window_size, 25);
        assert_eq!(parsed.speech.fast_wpm, 200.0);
        assert_eq!(parsed.speech.slow_wpm, 120.0);
        assert_eq!(parsed.estimation.chunk_sizes, vec![6, 10, 15]);
    }

    #[test]
    fn test_embedding_model_from_ron() {
        let parsed: Settings = ron::from_str("(embeddings: (model: AllMiniLmL6V2))").unwrap();
        assert_eq!(parsed.embeddings.model, EmbeddingModel::AllMiniLmL6V2);
        assert_eq!(parsed.embeddings.batch_size, 32);
    }

    #[test]
    fn test_override_replaces_default_file() {
        let default_path = temp_path("default.ron");
        let override_path = temp_path("override.ron");
        fs::write(&default_path, "(scoring: (window_size: 40))").unwrap();
        fs::write(&override_path, "(scoring: (window_stride: 5))").unwrap();

        let settings = Settings::read_files(&default_path, &override_path).unwrap();
        assert_eq!(settings.scoring.window_stride, 5);
        assert_eq!(settings.scoring.window_size, 25);

        fs::remove_file(&default_path).ok();
        fs::remove_file(&override_path).ok();
    }

    #[test]
    fn test_missing_files_use_defaults() {
        let settings =
            Settings::read_files(&temp_path("absent-a.ron"), &temp_path("absent-b.ron")).unwrap();
        assert_eq!(settings.worker.timeout_secs, 120);
        assert_eq!(settings.pauses.min_gap, 0.3);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let path = temp_path("broken.ron");
        fs::write(&path, "(scoring: (window_size: \"lots\"))").unwrap();
        assert!(Settings::read_files(&path, &temp_path("absent-c.ron")).is_err());
        fs::remove_file(&path).ok();
    }
}
