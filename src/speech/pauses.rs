use serde::{Deserialize, Serialize};
use strum::Display;

use crate::settings::{Estimation, Pauses};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    pub words: String,
    pub time_start: f64,
    pub time_end: f64,
}

impl TranscriptSegment {
    pub fn word_count(&self) -> usize {
        self.words.split_whitespace().count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PauseKind {
    #[strum(serialize = "short")]
    Short,
    #[strum(serialize = "medium")]
    Medium,
    #[strum(serialize = "long")]
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PauseMode {
    #[strum(serialize = "precise")]
    Precise,
    #[strum(serialize = "estimated")]
    Estimated,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pause {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub kind: PauseKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseMetrics {
    pub mode: PauseMode,
    pub total_words: usize,
    pub average_rate: f64,
    /// Words per minute over active speech only.
    pub conversational_rate: f64,
    pub total_speaking_time: f64,
    pub speaking_time_percent: u32,
    pub total_pauses: usize,
    pub short_pauses: usize,
    pub medium_pauses: usize,
    pub long_pauses: usize,
    pub total_pause_time: f64,
    /// Medium and long pauses only.
    pub pause_durations: Vec<Pause>,
}

impl PauseMetrics {
    fn empty(mode: PauseMode, total_words: usize, average_rate: f64) -> Self {
        Self {
            mode,
            total_words,
            average_rate,
            conversational_rate: average_rate,
            total_speaking_time: 0.0,
            speaking_time_percent: 0,
            total_pauses: 0,
            short_pauses: 0,
            medium_pauses: 0,
            long_pauses: 0,
            total_pause_time: 0.0,
            pause_durations: Vec::new(),
        }
    }
}

pub fn classify_pause(duration: f64, config: &Pauses) -> PauseKind {
    if duration >= config.long_pause {
        PauseKind::Long
    } else if duration >= config.medium_pause {
        PauseKind::Medium
    } else {
        PauseKind::Short
    }
}

pub fn analyze_pauses(
    transcript: &str,
    duration: f64,
    segments: Option<&[TranscriptSegment]>,
    pauses: &Pauses,
    estimation: &Estimation,
) -> PauseMetrics {
    match segments {
        Some(segments) if !segments.is_empty() => {
            precise_pauses(transcript, duration, segments, pauses)
        }
        _ => estimate_pauses(transcript, duration, estimation),
    }
}

fn words_per_minute(total_words: usize, duration: f64) -> f64 {
    if duration > 0.0 {
        total_words as f64 / (duration / 60.0)
    } else {
        0.0
    }
}

fn speaking_percent(speaking_time: f64, duration: f64) -> u32 {
    if duration > 0.0 {
        (speaking_time / duration * 100.0).round().max(0.0) as u32
    } else {
        0
    }
}

fn precise_pauses(
    transcript: &str,
    duration: f64,
    segments: &[TranscriptSegment],
    config: &Pauses,
) -> PauseMetrics {
    let mut segments = segments.to_vec();
    segments.sort_by(|a, b| a.time_start.total_cmp(&b.time_start));

    let total_words = transcript.split_whitespace().count();
    let average_rate = words_per_minute(total_words, duration);
    let mut metrics = PauseMetrics::empty(PauseMode::Precise, total_words, average_rate);

    let mut gaps = Vec::new();
    let first = &segments[0];
    if first.time_start > config.leading_silence {
        gaps.push((0.0, first.time_start));
    }
    for pair in segments.windows(2) {
        if pair[1].time_start - pair[0].time_end > config.min_gap {
            gaps.push((pair[0].time_end, pair[1].time_start));
        }
    }
    let last = &segments[segments.len() - 1];
    if duration - last.time_end > config.trailing_silence {
        gaps.push((last.time_end, duration));
    }

    for (start, end) in gaps {
        let pause = Pause {
            start,
            end,
            duration: end - start,
            kind: classify_pause(end - start, config),
        };
        metrics.total_pauses += 1;
        metrics.total_pause_time += pause.duration;
        match pause.kind {
            PauseKind::Short => metrics.short_pauses += 1,
            PauseKind::Medium => metrics.medium_pauses += 1,
            PauseKind::Long => metrics.long_pauses += 1,
        }
        if pause.kind != PauseKind::Short {
            metrics.pause_durations.push(pause);
        }
    }

    let speaking_words: usize = segments.iter().map(TranscriptSegment::word_count).sum();
    let speaking_time: f64 = segments
        .iter()
        .map(|segment| effective_duration(segment, config))
        .sum();

    metrics.conversational_rate = if speaking_time > 0.0 {
        speaking_words as f64 / (speaking_time / 60.0)
    } else {
        average_rate
    }
    .min(config.max_rate);
    metrics.total_speaking_time = speaking_time;
    metrics.speaking_time_percent = speaking_percent(speaking_time, duration);

    metrics
}

/// Recognizers often stretch one segment across a silence. A segment slower
/// than `hidden_pause_rate` is credited with `secs_per_word` per word instead
/// of its raw span.
fn effective_duration(segment: &TranscriptSegment, config: &Pauses) -> f64 {
    let word_count = segment.word_count() as f64;
    let span = (segment.time_end - segment.time_start).max(0.0);
    let implied_rate = if span > 0.0 {
        word_count / (span / 60.0)
    } else {
        f64::INFINITY
    };

    if implied_rate < config.hidden_pause_rate {
        word_count * config.secs_per_word
    } else {
        span
    }
}

fn estimate_pauses(transcript: &str, duration: f64, config: &Estimation) -> PauseMetrics {
    let words: Vec<&str> = transcript.split_whitespace().collect();
    let average_rate = words_per_minute(words.len(), duration);
    let mut metrics = PauseMetrics::empty(PauseMode::Estimated, words.len(), average_rate);
    if words.is_empty() || duration <= 0.0 {
        return metrics;
    }

    let mut candidates = chunk_rates(&words, duration, config);
    let conversational = percentile(&mut candidates, config.percentile)
        .map_or(average_rate, |rate| rate.max(average_rate))
        .min(config.max_rate);

    let ratio = if average_rate > 0.0 {
        conversational / average_rate
    } else {
        1.0
    };
    let pause_time = if ratio > 1.0 {
        duration * (1.0 - 1.0 / ratio)
    } else {
        0.0
    };
    let long_pauses = if config.average_pause_secs > 0.0 {
        (pause_time / config.average_pause_secs).floor() as usize
    } else {
        0
    };

    metrics.conversational_rate = conversational;
    metrics.total_pause_time = pause_time;
    metrics.long_pauses = long_pauses;
    metrics.total_pauses = long_pauses;
    metrics.total_speaking_time = duration - pause_time;
    metrics.speaking_time_percent = speaking_percent(duration - pause_time, duration);
    metrics
}

/// Implied rate of every sliding word chunk, with the recording time shared
/// out by character count. Rates outside `[min_rate, max_rate]` are dropped.
fn chunk_rates(words: &[&str], duration: f64, config: &Estimation) -> Vec<f64> {
    let total_chars: usize = words.iter().map(|w| w.chars().count()).sum();
    let mut rates = Vec::new();
    if total_chars == 0 {
        return rates;
    }

    for &size in &config.chunk_sizes {
        if size == 0 || size > words.len() {
            continue;
        }
        for chunk in words.windows(size) {
            let chars: usize = chunk.iter().map(|w| w.chars().count()).sum();
            let chunk_duration = duration * chars as f64 / total_chars as f64;
            let rate = size as f64 / (chunk_duration / 60.0);
            if (config.min_rate..=config.max_rate).contains(&rate) {
                rates.push(rate);
            }
        }
    }

    rates
}

fn percentile(values: &mut [f64], fraction: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let rank = (fraction.clamp(0.0, 1.0) * values.len() as f64).ceil() as usize;
    Some(values[rank.clamp(1, values.len()) - 1])
}
