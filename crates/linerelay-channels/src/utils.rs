//! Shared helpers for outgoing text.

/// Characters after which a chunk may end cleanly.
const BREAK_CHARS: [char; 4] = ['。', '！', '？', '\n'];

/// How far back from the hard limit to look for a clean break.
const BREAK_WINDOW: usize = 50;

/// Split `text` into chunks of at most `max_chars` characters.
///
/// A chunk ends right after the first sentence terminator or newline found
/// in its final 50 characters, falling back to a hard cut at the limit.
/// Lengths are counted in chars, not bytes.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let hard_end = (start + max_chars).min(chars.len());
        let end = if hard_end < chars.len() {
            let window_start = hard_end.saturating_sub(BREAK_WINDOW).max(start + 1);
            (window_start..hard_end)
                .find(|&i| BREAK_CHARS.contains(&chars[i]))
                .map(|i| i + 1)
                .unwrap_or(hard_end)
        } else {
            hard_end
        };
        chunks.push(chars[start..end].iter().collect());
        start = end;
    }

    chunks
}
