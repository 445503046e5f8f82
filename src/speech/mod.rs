mod pauses;
mod rate;

pub use pauses::{
    analyze_pauses, classify_pause, Pause, PauseKind, PauseMetrics, PauseMode, TranscriptSegment,
};
pub use rate::{
    analyze_speech, average_speaking_rate, group_into_windows, overall_rate, per_word_rate,
    window_metrics, OverallMetrics, Pace, RateThresholds, SpeechMetrics, TimestampedWord,
    WindowMetrics, WordMetric, WordWindow,
};
