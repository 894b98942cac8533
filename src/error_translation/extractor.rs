/// Output shorter than this is returned untouched
const VERBATIM_LIMIT: usize = 2000;
/// Only the tail of long output is scanned
const TAIL_LINES: usize = 500;
/// Lines of context kept on each side of an error line
const CONTEXT_LINES: usize = 5;
/// Regions closer than this are merged
const MERGE_GAP: usize = 2;
/// Most recent regions kept in the report
const MAX_REGIONS: usize = 3;
/// Lines kept when no indicator is found
const FALLBACK_LINES: usize = 50;

const ERROR_INDICATORS: &[&str] = &["error", "exception", "failed", "failure", "fatal"];

/// Condenses raw build output into a bounded diagnostic
pub trait ErrorExtractor: Send + Sync {
    fn extract(&self, raw_output: &str) -> String;
}

/// Keeps the error regions of a build log together with their context
#[derive(Debug, Clone, Default)]
pub struct BuildErrorExtractor;

impl BuildErrorExtractor {
    pub fn new() -> Self {
        Self
    }

    fn is_error_line(line: &str) -> bool {
        let lower = line.to_lowercase();
        ERROR_INDICATORS.iter().any(|indicator| lower.contains(indicator))
    }

    /// Merge error line indices into inclusive `(start, end)` regions
    fn error_regions(error_lines: &[usize], line_count: usize) -> Vec<(usize, usize)> {
        let Some((&first, rest)) = error_lines.split_first() else {
            return Vec::new();
        };

        let last_line = line_count.saturating_sub(1);
        let mut regions = Vec::new();
        let mut start = first.saturating_sub(CONTEXT_LINES);
        let mut end = first + CONTEXT_LINES;

        for &idx in rest {
            if idx.saturating_sub(CONTEXT_LINES) <= end + MERGE_GAP {
                end = idx + CONTEXT_LINES;
            } else {
                regions.push((start, end.min(last_line)));
                start = idx.saturating_sub(CONTEXT_LINES);
                end = idx + CONTEXT_LINES;
            }
        }
        regions.push((start, end.min(last_line)));

        regions
    }
}

impl ErrorExtractor for BuildErrorExtractor {
    fn extract(&self, raw_output: &str) -> String {
        if raw_output.len() < VERBATIM_LIMIT {
            return raw_output.to_string();
        }

        let lines: Vec<&str> = raw_output.lines().collect();
        let tail = &lines[lines.len().saturating_sub(TAIL_LINES)..];

        let error_lines: Vec<usize> = tail
            .iter()
            .enumerate()
            .filter(|(_, line)| Self::is_error_line(line))
            .map(|(idx, _)| idx)
            .collect();

        let regions = Self::error_regions(&error_lines, tail.len());

        if regions.is_empty() {
            let last = &tail[tail.len().saturating_sub(FALLBACK_LINES)..];
            return format!("BUILD FAILURE - LAST OUTPUT:\n\n{}", last.join("\n"));
        }

        let blocks: Vec<String> = regions[regions.len().saturating_sub(MAX_REGIONS)..]
            .iter()
            .map(|&(start, end)| tail[start..=end].join("\n"))
            .collect();

        format!("BUILD FAILURE - KEY ERRORS:\n\n{}", blocks.join("\n\n...\n\n"))
    }
}
