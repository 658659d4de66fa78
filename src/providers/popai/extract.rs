//! Best-effort extraction from PopAI's two delivery shapes.
//!
//! Streaming calls return line-delimited pseudo-SSE (`data: [{...}]` lines
//! interleaved with non-data noise). Bulk calls return a body that is not
//! valid JSON at the top level but carries repeated `"content":"..."`
//! fragments. In both shapes the first fragment is the upstream echoing the
//! prompt back; the skip-first rule below keeps it out of client output.

use serde::Deserialize;

const CONTENT_KEY: &str = "\"content\":\"";

/// First element of one parsed `data:` line. The upstream sometimes sends
/// elements without a `content` field; those still count as events.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEvent {
    pub content: Option<String>,
}

/// Parse one stream line. Returns `None` for non-data lines, malformed JSON
/// and empty arrays; the bridge drops those silently.
pub fn parse_stream_line(line: &str) -> Option<StreamEvent> {
    let line = line.trim();
    let data = line.strip_prefix("data:").map(str::trim_start).unwrap_or(line);
    if data.is_empty() {
        return None;
    }
    let events: Vec<StreamEvent> = serde_json::from_str(data).ok()?;
    events.into_iter().next()
}

/// Every `"content":"..."` occurrence in a bulk body, in document order.
/// A fragment runs to the next `"` on the same line; occurrences without a
/// same-line terminator are skipped. Escapes are not interpreted — the
/// captured text is forwarded exactly as it appears on the wire.
pub fn content_fragments(body: &str) -> Vec<&str> {
    let mut fragments = Vec::new();
    let mut cursor = 0;
    while let Some(found) = body[cursor..].find(CONTENT_KEY) {
        let start = cursor + found + CONTENT_KEY.len();
        let rest = &body[start..];
        let Some(end) = rest.find('"') else { break };
        if rest[..end].contains('\n') {
            cursor = start;
            continue;
        }
        fragments.push(&rest[..end]);
        cursor = start + end + 1;
    }
    fragments
}

/// Completion text for one bulk response: all fragments after the first,
/// concatenated. Fewer than two fragments means the upstream produced no
/// completion beyond its echo.
pub fn completion_text(body: &str) -> String {
    let fragments = content_fragments(body);
    if fragments.len() > 1 {
        fragments[1..].concat()
    } else {
        String::new()
    }
}
