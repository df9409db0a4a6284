//! Telegram HTML helpers.

/// Telegram message size limit.
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

/// Chunk budget for multi-part replies, leaving headroom under the limit.
pub const CHUNK_BUDGET: usize = 4050;

/// Escape HTML special characters for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Split text into chunks of at most `max_len` bytes at line boundaries.
///
/// Lines are kept whole so HTML tags that open and close on one line are
/// never cut; a single line longer than `max_len` becomes its own chunk.
pub fn chunk_lines(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in text.split_inclusive('\n') {
        if !current.is_empty() && current.len() + line.len() > max_len {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
