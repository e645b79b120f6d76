//! Narrative rendering and scanning
//!
//! The synthesized narrative lists one section per judge in registration
//! order, an optional block of missing verdicts, and a closing summary:
//!
//! ```text
//! Hackathon Judges verdicts for task 0
//!
//! ### Visionary Veronica
//! Score: 3/4
//! <verdict in the judge's own voice>
//!
//! ## Missing verdicts
//! - Friendly Frankie (subtask 0.4): no verdict recorded. E300: ...
//!
//! ## Summary
//! <cross-judge summary>
//! ```
//!
//! The scanning helpers also accept free-form text where each judge's name is
//! followed somewhere by an `x/4` token.

use crate::types::{WorkerFailure, MAX_SCORE, MIN_SCORE};

pub const GAPS_HEADING: &str = "## Missing verdicts";
pub const SUMMARY_HEADING: &str = "## Summary";
const JUDGES_LINE_PREFIX: &str = "Judges in order:";

/// A judge's collected verdict with its parsed score
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgeVerdict {
    pub judge_name: String,
    pub score: u8,
    pub text: String,
}

// ─────────────────────────────────────────────────────────────────
// Score tokens
// ─────────────────────────────────────────────────────────────────

/// Find the score token (`x/4`, x in 1..=4) in a verdict
///
/// A token directly after the word "score" or "rating" on the same line wins;
/// otherwise the first token in the text is used.
pub fn find_score(text: &str) -> Option<u8> {
    let tokens = score_tokens(text);
    tokens
        .iter()
        .find(|(_, labelled)| *labelled)
        .or_else(|| tokens.first())
        .map(|&(score, _)| score)
}

/// The first score token in `text`, labelled or not
pub fn first_score(text: &str) -> Option<u8> {
    score_tokens(text).first().map(|&(score, _)| score)
}

fn score_tokens(text: &str) -> Vec<(u8, bool)> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match score_token_at(&chars, i) {
            Some((score, end)) => {
                tokens.push((score, is_labelled(&chars, i)));
                i = end;
            }
            None => i += 1,
        }
    }

    tokens
}

fn score_token_at(chars: &[char], i: usize) -> Option<(u8, usize)> {
    let digit = chars[i].to_digit(10)? as u8;
    if !(MIN_SCORE..=MAX_SCORE).contains(&digit) {
        return None;
    }
    if i > 0 && (chars[i - 1].is_ascii_digit() || chars[i - 1] == '.') {
        return None;
    }

    let mut j = skip_spaces(chars, i + 1);
    if chars.get(j) != Some(&'/') {
        return None;
    }
    j = skip_spaces(chars, j + 1);
    if chars.get(j).and_then(|c| c.to_digit(10)) != Some(MAX_SCORE as u32) {
        return None;
    }
    j += 1;

    // Reject 3/40 and 3/4.5
    match chars.get(j) {
        Some(c) if c.is_ascii_digit() => return None,
        Some('.') if chars.get(j + 1).map_or(false, |c| c.is_ascii_digit()) => return None,
        _ => {}
    }

    Some((digit, j))
}

fn skip_spaces(chars: &[char], mut j: usize) -> usize {
    while chars.get(j) == Some(&' ') {
        j += 1;
    }
    j
}

/// "Score: 3/4", "**Rating** - 3/4", but not "the score this beats is 3/4"
fn is_labelled(chars: &[char], i: usize) -> bool {
    let line_start = chars[..i]
        .iter()
        .rposition(|&c| c == '\n')
        .map_or(0, |p| p + 1);
    let prefix: String = chars[line_start..i].iter().collect();
    let label = prefix
        .trim_end_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    label.ends_with("score") || label.ends_with("rating")
}

// ─────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────

/// Per-judge sections, in the order given
pub fn judge_sections(verdicts: &[JudgeVerdict]) -> String {
    let mut out = String::new();
    for verdict in verdicts {
        out.push_str(&format!(
            "### {}\nScore: {}/{}\n{}\n\n",
            verdict.judge_name,
            verdict.score,
            MAX_SCORE,
            verdict.text.trim()
        ));
    }
    out
}

/// Render the complete narrative
pub fn render(
    title: &str,
    verdicts: &[JudgeVerdict],
    failures: &[WorkerFailure],
    summary: &str,
) -> String {
    let mut out = format!("{}\n\n", title.trim());
    out.push_str(&judge_sections(verdicts));

    if !failures.is_empty() {
        out.push_str(GAPS_HEADING);
        out.push('\n');
        for failure in failures {
            out.push_str(&gap_line(failure));
            out.push('\n');
        }
        out.push('\n');
    }

    out.push_str(SUMMARY_HEADING);
    out.push('\n');
    out.push_str(summary.trim());
    out.push('\n');
    out
}

/// One line recording a worker that produced no usable output
pub fn gap_line(failure: &WorkerFailure) -> String {
    format!(
        "- {} (subtask {}): no verdict recorded. {}: {}",
        failure.worker,
        failure.subtask_id,
        failure.code,
        failure.message.replace('\n', " ")
    )
}

// ─────────────────────────────────────────────────────────────────
// Scanning
// ─────────────────────────────────────────────────────────────────

/// Slice the narrative into one segment per judge
///
/// Each segment starts at the judge's name. When the narrative carries
/// `### <name>` headings (as [`render`] writes them), a judge's segment is
/// their own section and ends at the next heading. Free-form text falls back
/// to whole-word mentions, longer names claimed first, and a segment runs to
/// the next judge's mention. Either way the missing-verdicts/summary block is
/// excluded. Judges never found get `None`.
pub fn segments<'a>(narrative: &'a str, judge_names: &[&str]) -> Vec<(String, Option<&'a str>)> {
    let body_end = [GAPS_HEADING, SUMMARY_HEADING]
        .iter()
        .filter_map(|h| narrative.rfind(h))
        .min()
        .unwrap_or(narrative.len());
    let body = &narrative[..body_end];

    let heads = headings(body);
    let sectioned = judge_names
        .iter()
        .any(|name| heads.iter().any(|h| h.title == *name));

    let bounds: Vec<Option<(usize, usize)>> = if sectioned {
        judge_names
            .iter()
            .map(|name| {
                let pos = heads.iter().position(|h| h.title == *name)?;
                let end = heads.get(pos + 1).map_or(body.len(), |next| next.line_start);
                Some((heads[pos].title_start, end))
            })
            .collect()
    } else {
        let starts = mention_starts(body, judge_names);
        starts
            .iter()
            .map(|start| {
                start.map(|s| {
                    let end = starts
                        .iter()
                        .flatten()
                        .copied()
                        .filter(|&other| other > s)
                        .min()
                        .unwrap_or(body.len());
                    (s, end)
                })
            })
            .collect()
    };

    judge_names
        .iter()
        .zip(bounds)
        .map(|(name, bounds)| (name.to_string(), bounds.map(|(s, e)| &body[s..e])))
        .collect()
}

struct Heading<'a> {
    line_start: usize,
    title_start: usize,
    title: &'a str,
}

/// Every `### ` heading line in `body`
fn headings(body: &str) -> Vec<Heading<'_>> {
    body.match_indices("### ")
        .filter(|&(idx, _)| idx == 0 || body.as_bytes()[idx - 1] == b'\n')
        .map(|(idx, marker)| {
            let after = idx + marker.len();
            let line_end = body[after..].find('\n').map_or(body.len(), |p| after + p);
            let raw = &body[after..line_end];
            Heading {
                line_start: idx,
                title_start: after + (raw.len() - raw.trim_start().len()),
                title: raw.trim(),
            }
        })
        .collect()
}

/// First whole-word mention of each name
///
/// Longer names go first and claim all their mentions, so "Ann" never starts
/// inside "Anna" and "John" never starts inside "Critical John".
fn mention_starts(body: &str, judge_names: &[&str]) -> Vec<Option<usize>> {
    let mut order: Vec<usize> = (0..judge_names.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(judge_names[i].len()));

    let mut claimed: Vec<(usize, usize)> = Vec::new();
    let mut starts = vec![None; judge_names.len()];

    for i in order {
        let name = judge_names[i];
        if name.is_empty() {
            continue;
        }
        let mentions: Vec<usize> = body
            .match_indices(name)
            .map(|(s, _)| s)
            .filter(|&s| is_whole_word(body, s, name.len()))
            .filter(|&s| !claimed.iter().any(|&(a, b)| s < b && a < s + name.len()))
            .collect();
        starts[i] = mentions.first().copied();
        claimed.extend(mentions.into_iter().map(|s| (s, s + name.len())));
    }

    starts
}

fn is_whole_word(body: &str, start: usize, len: usize) -> bool {
    let before = body[..start].chars().next_back();
    let after = body[start + len..].chars().next();
    !before.map_or(false, char::is_alphanumeric) && !after.map_or(false, char::is_alphanumeric)
}

/// The score a judge's segment carries: the first token after the name
pub fn segment_score(segment: &str, judge_name: &str) -> Option<u8> {
    first_score(segment.strip_prefix(judge_name).unwrap_or(segment))
}

/// Score found for each judge, in the order given
pub fn scan_scores(narrative: &str, judge_names: &[&str]) -> Vec<(String, Option<u8>)> {
    segments(narrative, judge_names)
        .into_iter()
        .map(|(name, segment)| {
            let score = segment.and_then(|s| segment_score(s, &name));
            (name, score)
        })
        .collect()
}

/// The judge's words from a segment, without the name heading and score line
pub fn comment_of(segment: &str, judge_name: &str) -> String {
    let rest = segment.strip_prefix(judge_name).unwrap_or(segment);
    let rest = rest.trim_start_matches(&[':', '-', ' ', '\t'][..]);

    let mut lines: Vec<&str> = rest.lines().collect();
    if let Some(pos) = lines
        .iter()
        .take(3)
        .position(|l| l.trim_start().to_lowercase().starts_with("score:"))
    {
        lines.remove(pos);
    }

    lines
        .into_iter()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .trim_end_matches('#')
        .trim()
        .to_string()
}

/// The closing summary paragraph, if present
pub fn summary_of(narrative: &str) -> Option<&str> {
    let start = narrative.rfind(SUMMARY_HEADING)? + SUMMARY_HEADING.len();
    let summary = narrative[start..].trim();
    if summary.is_empty() {
        None
    } else {
        Some(summary)
    }
}

/// Line announcing the judges the extractor must return, in order
pub fn judges_line(judge_names: &[&str]) -> String {
    format!("{} {}", JUDGES_LINE_PREFIX, judge_names.join("; "))
}

/// Inverse of [`judges_line`], searched anywhere in `text`
pub fn parse_judges_line(text: &str) -> Option<Vec<String>> {
    text.lines()
        .find_map(|l| l.trim().strip_prefix(JUDGES_LINE_PREFIX))
        .map(|rest| {
            rest.split(';')
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect()
        })
}
