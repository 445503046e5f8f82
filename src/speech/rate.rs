use serde::{Deserialize, Serialize};
use strum::Display;

use crate::settings::Speech;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampedWord {
    pub word: String,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub confidence: f32,
}

impl TimestampedWord {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordMetric {
    pub word: String,
    pub start_time: f64,
    pub end_time: f64,
    pub confidence: f32,
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pace {
    #[strum(serialize = "slow")]
    Slow,
    #[strum(serialize = "optimal")]
    Optimal,
    #[strum(serialize = "fast")]
    Fast,
}

#[derive(Debug, Clone, Copy)]
pub struct WordWindow<'a> {
    pub start_time: f64,
    pub end_time: f64,
    pub words: &'a [TimestampedWord],
}

impl<'a> WordWindow<'a> {
    fn new(words: &'a [TimestampedWord]) -> Self {
        Self {
            start_time: words.first().map_or(0.0, |w| w.start_time),
            end_time: words.last().map_or(0.0, |w| w.end_time),
            words,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowMetrics {
    pub start_time: f64,
    pub end_time: f64,
    pub rate: f64,
    pub words_in_window: usize,
    pub is_fast: bool,
    pub is_slow: bool,
    pub is_optimal: bool,
    pub pace: Pace,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallMetrics {
    pub average_rate: f64,
    pub total_words: usize,
    pub total_duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateThresholds {
    pub slow: f64,
    pub optimal: f64,
    pub fast: f64,
}

impl From<&Speech> for RateThresholds {
    fn from(config: &Speech) -> Self {
        Self {
            slow: config.slow_wpm,
            optimal: config.optimal_wpm,
            fast: config.fast_wpm,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechMetrics {
    pub overall_metrics: OverallMetrics,
    pub thresholds: RateThresholds,
    pub word_level_metrics: Vec<WordMetric>,
    pub window_metrics: Vec<WindowMetrics>,
}

/// Burst rate of a single word. Empty words and words shorter than the
/// minimum duration are noise and yield `None`.
pub fn per_word_rate(word: &TimestampedWord, config: &Speech) -> Option<WordMetric> {
    let duration = word.duration();
    if word.word.trim().is_empty() || duration < config.min_word_duration {
        return None;
    }

    Some(WordMetric {
        word: word.word.clone(),
        start_time: word.start_time,
        end_time: word.end_time,
        confidence: word.confidence,
        rate: 60.0 / duration,
    })
}

/// Greedy grouping: a window opens at a word's start and takes every
/// following word that starts less than `window_secs` later.
pub fn group_into_windows(words: &[TimestampedWord], window_secs: f64) -> Vec<WordWindow<'_>> {
    let mut windows = Vec::new();
    if words.is_empty() {
        return windows;
    }

    let mut start = 0;
    for (idx, word) in words.iter().enumerate().skip(1) {
        if word.start_time - words[start].start_time >= window_secs {
            windows.push(WordWindow::new(&words[start..idx]));
            start = idx;
        }
    }
    windows.push(WordWindow::new(&words[start..]));

    windows
}

pub fn window_metrics(window: &WordWindow<'_>, config: &Speech) -> WindowMetrics {
    let words_in_window = window.words.len();
    let span = window.end_time - window.start_time;
    let rate = if span > 0.0 {
        words_in_window as f64 * 60.0 / span
    } else {
        0.0
    };

    let is_slow = rate < config.slow_wpm;
    let is_fast = rate > config.fast_wpm;
    let pace = if is_slow {
        Pace::Slow
    } else if is_fast {
        Pace::Fast
    } else {
        Pace::Optimal
    };

    WindowMetrics {
        start_time: window.start_time,
        end_time: window.end_time,
        rate,
        words_in_window,
        is_fast,
        is_slow,
        is_optimal: !is_slow && !is_fast,
        pace,
    }
}

/// Plain mean of window rates, not weighted by words per window.
pub fn overall_rate(windows: &[WindowMetrics]) -> f64 {
    if windows.is_empty() {
        return 0.0;
    }
    windows.iter().map(|w| w.rate).sum::<f64>() / windows.len() as f64
}

pub fn average_speaking_rate(words: &[TimestampedWord], config: &Speech) -> OverallMetrics {
    analyze_speech(words, config).overall_metrics
}

pub fn analyze_speech(words: &[TimestampedWord], config: &Speech) -> SpeechMetrics {
    let thresholds = RateThresholds::from(config);
    let (Some(first), Some(last)) = (words.first(), words.last()) else {
        return SpeechMetrics {
            overall_metrics: OverallMetrics::default(),
            thresholds,
            word_level_metrics: Vec::new(),
            window_metrics: Vec::new(),
        };
    };

    let mut word_level_metrics = Vec::with_capacity(words.len());
    let mut timed_words = Vec::with_capacity(words.len());
    for word in words {
        if let Some(metric) = per_word_rate(word, config) {
            word_level_metrics.push(metric);
            timed_words.push(word.clone());
        }
    }

    let window_metrics: Vec<WindowMetrics> = group_into_windows(&timed_words, config.window_secs)
        .iter()
        .map(|window| window_metrics(window, config))
        .collect();

    SpeechMetrics {
        overall_metrics: OverallMetrics {
            average_rate: overall_rate(&window_metrics),
            total_words: words.len(),
            total_duration: (last.end_time - first.start_time).max(0.0),
        },
        thresholds,
        word_level_metrics,
        window_metrics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, start: f64, end: f64) -> TimestampedWord {
        TimestampedWord {
            word: text.to_string(),
            start_time: start,
            end_time: end,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_per_word_rate() {
        let config = Speech::default();
        let metric = per_word_rate(&word("pitch", 1.0, 1.5), &config).unwrap();
        assert!((metric.rate - 120.0).abs() < 1e-9);
        assert_eq!(metric.confidence, 0.9);
    }

    #[test]
    fn test_per_word_rate_filters_noise() {
        let config = Speech::default();
        assert!(per_word_rate(&word("uh", 2.0, 2.05), &config).is_none());
        assert!(per_word_rate(&word("", 2.0, 3.0), &config).is_none());
        assert!(per_word_rate(&word("back", 3.0, 2.0), &config).is_none());
    }

    #[test]
    fn test_greedy_grouping() {
        let words: Vec<_> = [0.0, 10.0, 29.9, 30.0, 45.0, 61.0]
            .iter()
            .map(|&t| word("w", t, t + 0.5))
            .collect();
        let windows = group_into_windows(&words, 30.0);

        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].words.len(), 3);
        assert_eq!(windows[0].end_time, 30.4);
        assert_eq!(windows[1].start_time, 30.0);
        assert_eq!(windows[1].words.len(), 2);
        assert_eq!(windows[2].words.len(), 1);
        assert!(group_into_windows(&[], 30.0).is_empty());
    }

    #[test]
    fn test_window_classification() {
        let config = Speech::default();
        let words: Vec<_> = (0..40)
            .map(|i| word("w", i as f64 * 0.25, i as f64 * 0.25 + 0.2))
            .collect();
        let window = group_into_windows(&words, 30.0)[0];
        let metrics = window_metrics(&window, &config);

        assert_eq!(metrics.words_in_window, 40);
        assert!(metrics.rate > 180.0);
        assert!(metrics.is_fast && !metrics.is_slow && !metrics.is_optimal);
        assert_eq!(metrics.pace, Pace::Fast);
    }

    #[test]
    fn test_optimal_boundaries_inclusive() {
        let config = Speech::default();
        let words = vec![word("a", 0.0, 0.25), word("b", 0.25, 0.5)];
        let window = group_into_windows(&words, 30.0)[0];
        let metrics = window_metrics(&window, &config);
        assert_eq!(metrics.rate, 240.0);

        let slow = [word("a", 0.0, 0.5)];
        let metrics = window_metrics(&group_into_windows(&slow, 30.0)[0], &config);
        assert_eq!(metrics.rate, 120.0);
        assert!(metrics.is_optimal);
    }

    #[test]
    fn test_empty_words() {
        let overall = average_speaking_rate(&[], &Speech::default());
        assert_eq!(overall, OverallMetrics::default());
        assert_eq!(overall.average_rate, 0.0);
        assert_eq!(overall.total_words, 0);
        assert_eq!(overall.total_duration, 0.0);
    }

    #[test]
    fn test_overall_rate_is_unweighted() {
        let words = vec![
            word("a", 0.0, 0.5),
            word("b", 0.5, 1.0),
            word("c", 40.0, 40.3),
            word("d", 40.3, 40.6),
            word("e", 40.6, 41.0),
        ];
        let metrics = analyze_speech(&words, &Speech::default());

        assert_eq!(metrics.window_metrics.len(), 2);
        assert!((metrics.window_metrics[0].rate - 120.0).abs() < 1e-9);
        assert!((metrics.window_metrics[1].rate - 180.0).abs() < 1e-6);
        assert!((metrics.overall_metrics.average_rate - 150.0).abs() < 1e-6);
        assert_eq!(metrics.overall_metrics.total_words, 5);
        assert!((metrics.overall_metrics.total_duration - 41.0).abs() < 1e-9);
    }

    #[test]
    fn test_noise_words_excluded_from_rate() {
        let words = vec![
            word("so", 0.0, 0.0),
            word("a", 0.0, 0.5),
            word("b", 0.5, 1.0),
        ];
        let metrics = analyze_speech(&words, &Speech::default());

        assert_eq!(metrics.word_level_metrics.len(), 2);
        assert_eq!(metrics.window_metrics[0].words_in_window, 2);
        assert_eq!(metrics.overall_metrics.total_words, 3);
        assert_eq!(metrics.thresholds.optimal, 150.0);
    }
}
