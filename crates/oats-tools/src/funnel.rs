//! Observation Funnel
//!
//! Three layers for oversized tool output:
//!
//! 1. *Spill* — the full payload goes to a file in the worker's scratch
//!    directory, byte-for-byte.
//! 2. *Summarize* — line/char totals always; match/file counts for
//!    search-shaped output; a head-and-tail preview.
//! 3. *Guide* — the observation handed to the agent is the preview behind a
//!    `LARGE OUTPUT DETECTED` marker plus the spill path, so follow-up
//!    actions stream the file instead of re-reading the whole payload.
//!
//! Output at exactly the thresholds is passed through untouched; the funnel
//! engages strictly above them.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Line threshold: output over this many lines is funneled.
pub const MAX_INLINE_LINES: usize = 50;
/// Character threshold: output over this many characters is funneled.
pub const MAX_INLINE_CHARS: usize = 2000;
/// Lines kept at the head of the preview.
const PREVIEW_HEAD: usize = 10;
/// Lines kept at the tail of the preview.
const PREVIEW_TAIL: usize = 5;

/// Marker prefixing every funneled observation.
pub const LARGE_OUTPUT_MARKER: &str = "LARGE OUTPUT DETECTED";

/// Layer-2 receipt for a funneled output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationSummary {
    pub total_lines: usize,
    pub total_chars: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_matches: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_with_matches: Option<usize>,
    pub full_output_path: String,
    pub preview: String,
}

/// Result of applying the funnel to one output.
#[derive(Debug, Clone)]
pub struct Funneled {
    pub summary: ObservationSummary,
    /// Layer-3 guided observation handed to the agent.
    pub guided_output: String,
}

/// Whether an output is small enough to pass through inline.
pub fn fits_inline(text: &str) -> bool {
    text.chars().count() <= MAX_INLINE_CHARS && count_lines(text) <= MAX_INLINE_LINES
}

fn count_lines(text: &str) -> usize {
    if text.is_empty() {
        0
    } else {
        text.lines().count()
    }
}

/// Apply the funnel if `text` exceeds the inline thresholds.
///
/// Returns `Ok(None)` when the output fits inline. I/O failures writing the
/// spill file are surfaced to the executor, which reports them as a failure
/// observation without crashing the loop.
pub fn apply(tool_name: &str, text: &str, scratch_dir: &Path) -> std::io::Result<Option<Funneled>> {
    if fits_inline(text) {
        return Ok(None);
    }

    let path = spill(tool_name, text, scratch_dir)?;
    let total_lines = count_lines(text);
    let total_chars = text.chars().count();
    let preview = build_preview(text, total_lines);

    let (total_matches, files_with_matches) = if is_search_like(tool_name) {
        extract_search_stats(text)
    } else {
        (None, None)
    };

    let summary = ObservationSummary {
        total_lines,
        total_chars,
        total_matches,
        files_with_matches,
        full_output_path: path.display().to_string(),
        preview: preview.clone(),
    };

    let guided_output = render_guidance(&summary);
    debug!(
        "Funneled {} output: {} lines / {} chars -> {}",
        tool_name, total_lines, total_chars, summary.full_output_path
    );

    Ok(Some(Funneled { summary, guided_output }))
}

/// Layer 1: write the full payload to the scratch directory.
fn spill(tool_name: &str, text: &str, scratch_dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(scratch_dir)?;

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let path = scratch_dir.join(format!("{}_{}_{}.txt", tool_name, timestamp, short_hash(text)));

    let mut file = std::fs::File::create(&path)?;
    file.write_all(text.as_bytes())?;
    Ok(path)
}

fn short_hash(text: &str) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    text.hash(&mut hasher);
    format!("{:08x}", (hasher.finish() & 0xffff_ffff) as u32)
}

/// Head-and-tail excerpt with an omission marker.
fn build_preview(text: &str, total_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let omitted = total_lines.saturating_sub(PREVIEW_HEAD + PREVIEW_TAIL);

    if omitted == 0 {
        // Funneled on characters alone; every line fits in the preview.
        return lines.join("\n");
    }

    let mut parts: Vec<&str> = Vec::with_capacity(PREVIEW_HEAD + PREVIEW_TAIL + 1);
    parts.extend(&lines[..PREVIEW_HEAD]);
    let marker = format!("... ({} lines truncated) ...", omitted);
    let mut preview = parts.join("\n");
    preview.push('\n');
    preview.push_str(&marker);
    for line in &lines[total_lines - PREVIEW_TAIL..] {
        preview.push('\n');
        preview.push_str(line);
    }
    preview
}

/// Layer 3: the observation the agent actually sees.
fn render_guidance(summary: &ObservationSummary) -> String {
    let mut out = format!(
        "{}: {} lines, {} chars",
        LARGE_OUTPUT_MARKER, summary.total_lines, summary.total_chars
    );
    if let Some(matches) = summary.total_matches {
        out.push_str(&format!(", {} matches", matches));
    }
    if let Some(files) = summary.files_with_matches {
        out.push_str(&format!(" in {} files", files));
    }
    out.push_str(&format!(
        "\nFull output saved to: {}\nPreview (head/tail):\n{}",
        summary.full_output_path, summary.preview
    ));
    out
}

/// Search-shaped tools get match statistics extracted from their output.
fn is_search_like(tool_name: &str) -> bool {
    let name = tool_name.to_lowercase();
    name.contains("search") || name.contains("grep") || name.contains("find")
}

/// Best-effort extraction of `{total_matches, files_with_matches}`.
///
/// Understands two shapes: a JSON array of objects carrying a `file` field,
/// and classic `path:line:content` grep lines.
fn extract_search_stats(text: &str) -> (Option<usize>, Option<usize>) {
    // JSON array of match records
    if let Ok(serde_json::Value::Array(items)) = serde_json::from_str::<serde_json::Value>(text) {
        let files: HashSet<&str> = items
            .iter()
            .filter_map(|item| item.get("file").and_then(|f| f.as_str()))
            .collect();
        if !files.is_empty() {
            return (Some(items.len()), Some(files.len()));
        }
        return (Some(items.len()), None);
    }

    // grep -Hn style lines: path:lineno:content
    let re = Regex::new(r"^([^:\s]+):\d+:").expect("static regex");
    let mut matches = 0usize;
    let mut files: HashSet<String> = HashSet::new();
    for line in text.lines() {
        if let Some(cap) = re.captures(line) {
            matches += 1;
            files.insert(cap[1].to_string());
        }
    }

    if matches > 0 {
        (Some(matches), Some(files.len()))
    } else {
        (None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines_of(n: usize) -> String {
        (0..n).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn test_exact_thresholds_pass_through() {
        let scratch = tempfile::tempdir().unwrap();

        // Exactly 50 lines, well under the char limit
        let fifty = lines_of(50);
        assert!(apply("tool", &fifty, scratch.path()).unwrap().is_none());

        // Exactly 2000 chars on one line
        let chars: String = "x".repeat(2000);
        assert!(apply("tool", &chars, scratch.path()).unwrap().is_none());
    }

    #[test]
    fn test_one_past_threshold_is_funneled() {
        let scratch = tempfile::tempdir().unwrap();

        let fifty_one = lines_of(51);
        assert!(apply("tool", &fifty_one, scratch.path()).unwrap().is_some());

        let chars: String = "x".repeat(2001);
        assert!(apply("tool", &chars, scratch.path()).unwrap().is_some());
    }

    #[test]
    fn test_spill_round_trip() {
        let scratch = tempfile::tempdir().unwrap();
        let payload = lines_of(500);

        let funneled = apply("execute_shell", &payload, scratch.path()).unwrap().unwrap();
        let on_disk = std::fs::read_to_string(&funneled.summary.full_output_path).unwrap();
        assert_eq!(on_disk, payload);
        assert_eq!(funneled.summary.total_lines, 500);
        assert_eq!(funneled.summary.total_chars, payload.chars().count());
    }

    #[test]
    fn test_preview_structure() {
        let scratch = tempfile::tempdir().unwrap();
        let payload = lines_of(500);

        let funneled = apply("execute_shell", &payload, scratch.path()).unwrap().unwrap();
        let preview = &funneled.summary.preview;

        assert!(preview.starts_with("line 0"));
        assert!(preview.ends_with("line 499"));
        assert!(preview.contains("(485 lines truncated)"));

        // head(10) + marker + tail(5)
        assert_eq!(preview.lines().count(), 16);
    }

    #[test]
    fn test_guided_output_carries_marker_and_path() {
        let scratch = tempfile::tempdir().unwrap();
        let payload = lines_of(100);

        let funneled = apply("execute_shell", &payload, scratch.path()).unwrap().unwrap();
        assert!(funneled.guided_output.starts_with(LARGE_OUTPUT_MARKER));
        assert!(funneled.guided_output.contains(&funneled.summary.full_output_path));
    }

    #[test]
    fn test_search_stats_from_grep_lines() {
        let scratch = tempfile::tempdir().unwrap();
        let mut payload = String::new();
        for i in 0..60 {
            payload.push_str(&format!("src/file{}.rs:{}: some match\n", i % 4, i + 1));
        }

        let funneled = apply("log_search", &payload, scratch.path()).unwrap().unwrap();
        assert_eq!(funneled.summary.total_matches, Some(60));
        assert_eq!(funneled.summary.files_with_matches, Some(4));
    }

    #[test]
    fn test_search_stats_from_json_array() {
        let scratch = tempfile::tempdir().unwrap();
        let items: Vec<_> = (0..80)
            .map(|i| serde_json::json!({"file": format!("f{}.log", i % 3), "line": i}))
            .collect();
        let payload = serde_json::to_string_pretty(&items).unwrap();

        let funneled = apply("log_search", &payload, scratch.path()).unwrap().unwrap();
        assert_eq!(funneled.summary.total_matches, Some(80));
        assert_eq!(funneled.summary.files_with_matches, Some(3));
    }

    #[test]
    fn test_non_search_tools_skip_match_stats() {
        let scratch = tempfile::tempdir().unwrap();
        let payload = (0..60)
            .map(|i| format!("a.txt:{}: hit", i))
            .collect::<Vec<_>>()
            .join("\n");

        let funneled = apply("execute_shell", &payload, scratch.path()).unwrap().unwrap();
        assert_eq!(funneled.summary.total_matches, None);
    }

    #[test]
    fn test_char_funneled_short_output_has_no_marker() {
        let scratch = tempfile::tempdir().unwrap();
        // 3 lines but far over the char threshold
        let payload = format!("{}\n{}\n{}", "a".repeat(900), "b".repeat(900), "c".repeat(900));

        let funneled = apply("tool", &payload, scratch.path()).unwrap().unwrap();
        assert!(!funneled.summary.preview.contains("truncated"));
        assert_eq!(funneled.summary.total_lines, 3);
    }
}
