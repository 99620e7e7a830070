//! Contract for the AI review generator, plus the deterministic input
//! preparation every concrete client shares.
//!
//! Inputs longer than a configured threshold are split into fixed-size
//! ordered segments; generation runs once per segment with the same
//! mode-specific instruction plus a "segment i of n" qualifier, and the
//! outputs are concatenated in segment order. The splitting, instruction
//! composition, and diff preprocessing live here so they are implemented
//! and tested once.

use thiserror::Error;

/// Errors the AI collaborator can fail with.
#[derive(Debug, Error)]
pub enum AiError {
    /// Account quota exhausted.
    #[error("generation quota exhausted: {0}")]
    Quota(String),

    /// The generation call timed out client-side.
    #[error("generation timed out: {0}")]
    Timeout(String),

    /// The service answered with zero choices.
    #[error("generation returned an empty response")]
    EmptyResponse,
}

/// Which kind of review to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewMode {
    /// First review of a container: the input is full project content.
    FullReview,
    /// Subsequent review: the input is an incremental diff.
    IncrementalReview,
}

impl ReviewMode {
    /// The instruction sent with every generation request in this mode.
    #[must_use]
    pub const fn instruction(self) -> &'static str {
        match self {
            Self::FullReview => {
                "You are an experienced developer performing a complete code analysis. \
                 This is the project's first review, so analyze the project structure, \
                 code quality, potential security issues, performance and adherence to \
                 best practices. Be specific and helpful. Provide solution examples \
                 when possible."
            }
            Self::IncrementalReview => {
                "You are an experienced developer performing a merge request code \
                 review. Please review the following merge request changes, analyze \
                 for bugs, security vulnerabilities, performance issues, and suggest \
                 improvements. Be specific and helpful. Provide solution examples \
                 when possible."
            }
        }
    }
}

/// Client contract for the AI text-generation service.
pub trait AiReviewClient: Send + Sync {
    /// Generate a review for `input`, segmenting internally when the input
    /// exceeds the client's configured threshold (see [`generate_segmented`]).
    fn generate_review(&self, input: &str, mode: ReviewMode) -> Result<String, AiError>;
}

/// Strip blank lines and `#`-prefixed lines from a diff before generation.
#[must_use]
pub fn preprocess_diff(diff: &str) -> String {
    diff.lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split `input` into ordered segments of at most `max_len` bytes, never
/// breaking a UTF-8 character.
///
/// Segmentation is deterministic: the same input and threshold always
/// produce the same segments, and concatenating the segments reproduces the
/// input exactly.
#[must_use]
pub fn split_segments(input: &str, max_len: usize) -> Vec<&str> {
    if input.is_empty() || max_len == 0 || input.len() <= max_len {
        return vec![input];
    }

    let mut segments = Vec::with_capacity(input.len() / max_len + 1);
    let mut start = 0;
    while start < input.len() {
        let mut end = (start + max_len).min(input.len());
        while end > start && !input.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            // A single character wider than max_len; emit it whole.
            end = start
                + input[start..]
                    .chars()
                    .next()
                    .map_or(input.len() - start, char::len_utf8);
        }
        segments.push(&input[start..end]);
        start = end;
    }
    segments
}

/// Instruction for segment `index` (0-based) of `total`.
#[must_use]
pub fn segment_instruction(mode: ReviewMode, index: usize, total: usize) -> String {
    format!(
        "{}\n\nSegment {} of {}",
        mode.instruction(),
        index + 1,
        total
    )
}

/// Drive `generate` once per segment and concatenate the outputs in order.
///
/// `generate` receives the segment text, its 0-based index, and the segment
/// count; the first error aborts the whole generation. Inputs at or below
/// `threshold` go through as one segment.
pub fn generate_segmented<F>(input: &str, threshold: usize, mut generate: F) -> Result<String, AiError>
where
    F: FnMut(&str, usize, usize) -> Result<String, AiError>,
{
    let segments = split_segments(input, threshold);
    let total = segments.len();
    if total == 1 {
        return generate(segments[0], 0, 1);
    }

    let mut aggregated = String::new();
    for (index, segment) in segments.into_iter().enumerate() {
        let part = generate(segment, index, total)?;
        aggregated.push_str(&part);
        aggregated.push('\n');
    }
    Ok(aggregated)
}
