use serde::{Deserialize, Serialize};

/// A run of consecutive transcript words. Indices are word positions,
/// both inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    pub text: String,
    pub start_index: usize,
    pub end_index: usize,
}

/// Splits `text` into overlapping windows of `window_size` words advancing
/// by `stride` words. The first window to reach the end of the text is the
/// last one and may be shorter than `window_size`.
pub fn create_windows(text: &str, window_size: usize, stride: usize) -> Vec<Window> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let window_size = window_size.max(1);
    let stride = stride.max(1);
    let mut windows = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + window_size).min(words.len());
        windows.push(Window {
            text: words[start..end].join(" "),
            start_index: start,
            end_index: end - 1,
        });
        if end == words.len() {
            break;
        }
        start += stride;
    }

    windows
}
