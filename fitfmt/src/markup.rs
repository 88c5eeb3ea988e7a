//! Block scanner and named predicates over the fragment dialect.
//!
//! The dialect has a fixed vocabulary (`p`, `ul`, `li`, `strong`/`b`, `u`), so a
//! flat scan over top-level blocks is enough: paragraphs never nest and lists
//! only nest lists. Every heuristic lives here as its own predicate so the
//! validator and the repairer agree on what, say, an exercise line is.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::MalformedFragment;
use crate::style::{SectionSpec, StyleGuide};
use crate::violation::Confidence;

/// Quantity tokens that mark a line as a prescribed exercise (`3 x 12`, `30 sec`, `x10`).
static QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(concat!(
        r"(?i)\b\d+(?:\s*[-\x{2013}/]\s*\d+)?\s*",
        r"(?:x\b|\x{D7}|reps?\b|repetitions?\b|sec(?:ond)?s?\b|s\b|min(?:ute)?s?\b",
        r"|cal(?:orie)?s?\b|m\b|meters?\b|metres?\b|km\b|steps?\b|breaths?\b)",
        r"|(?i)(?:\bx|\x{D7})\s*\d+\b",
    )) {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid quantity regex: {err}"),
    }
});

/// Round and timer markers: structure lines, never list items.
static ROUND_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(concat!(
        r"(?i)^(?:round\s*\d+|rounds?\s*\d*\s*[-:]|\d+\s*(?:x\s*)?rounds?\b",
        r"|rest\b|timer\b|block\s*\d+|superset\b|part\s*\d+",
        r"|(?:tabata|amrap|emom|for time)\b",
        r"|\d+\s*(?:min(?:ute)?s?|sec(?:ond)?s?|')\s*(?:amrap|emom|tabata|cap|time cap)\b",
        r"|(?:complete|repeat|perform)\s+\d+\s+(?:rounds?|times|sets))",
    )) {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid round marker regex: {err}"),
    }
});

/// Longest line still accepted as a bare exercise label without a quantity.
const LABEL_MAX_WORDS: usize = 6;
const LABEL_MAX_CHARS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    List,
    /// Anything between blocks: stray text, icons, unknown tags.
    Other,
}

/// A top-level slice of a fragment. Blocks are contiguous and cover the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
    pub kind: BlockKind,
    pub start: usize,
    pub raw: &'a str,
    /// Content between the opening and closing tag; equal to `raw` for `Other`.
    pub inner: &'a str,
}

fn opens_tag(rest: &str, name: &str) -> bool {
    rest.strip_prefix('<')
        .and_then(|r| r.strip_prefix(name))
        .is_some_and(|r| r.starts_with(['>', ' ', '\t', '\n', '\r', '/']))
}

/// Split a fragment into top-level blocks.
///
/// # Errors
///
/// Returns [`MalformedFragment`] on an unterminated opening tag, paragraph or list.
pub fn blocks(fragment: &str) -> Result<Vec<Block<'_>>, MalformedFragment> {
    let mut out = Vec::new();
    let mut pos = 0;
    let mut other_start: Option<usize> = None;

    while pos < fragment.len() {
        let rest = &fragment[pos..];
        let kind = if opens_tag(rest, "p") {
            BlockKind::Paragraph
        } else if opens_tag(rest, "ul") {
            BlockKind::List
        } else {
            other_start.get_or_insert(pos);
            let skip = rest.chars().next().map_or(1, char::len_utf8);
            pos += rest[skip..].find('<').map_or(rest.len(), |i| i + skip);
            continue;
        };

        if let Some(start) = other_start.take() {
            out.push(Block {
                kind: BlockKind::Other,
                start,
                raw: &fragment[start..pos],
                inner: &fragment[start..pos],
            });
        }

        let open_end = rest.find('>').ok_or_else(|| MalformedFragment {
            offset: pos,
            reason: "unterminated opening tag".to_owned(),
        })? + 1;
        let (inner_len, close_len) = match kind {
            BlockKind::Paragraph => (find_close(rest, open_end, "</p>", pos)?, "</p>".len()),
            _ => (find_list_close(rest, open_end, pos)?, "</ul>".len()),
        };
        let end = open_end + inner_len + close_len;
        out.push(Block {
            kind,
            start: pos,
            raw: &rest[..end],
            inner: &rest[open_end..open_end + inner_len],
        });
        pos += end;
    }

    if let Some(start) = other_start {
        out.push(Block {
            kind: BlockKind::Other,
            start,
            raw: &fragment[start..],
            inner: &fragment[start..],
        });
    }
    Ok(out)
}

fn find_close(
    rest: &str,
    from: usize,
    close: &str,
    offset: usize,
) -> Result<usize, MalformedFragment> {
    rest[from..].find(close).ok_or_else(|| MalformedFragment {
        offset,
        reason: "unterminated <p>".to_owned(),
    })
}

/// Length of a list's inner content, honouring nested lists.
fn find_list_close(rest: &str, from: usize, offset: usize) -> Result<usize, MalformedFragment> {
    let mut depth = 1usize;
    let mut i = from;
    while let Some(rel) = rest[i..].find('<') {
        let at = i + rel;
        let tail = &rest[at..];
        if tail.starts_with("</ul>") {
            depth -= 1;
            if depth == 0 {
                return Ok(at - from);
            }
        } else if opens_tag(tail, "ul") {
            depth += 1;
        }
        i = at + 1;
    }
    Err(MalformedFragment {
        offset,
        reason: "unterminated <ul>".to_owned(),
    })
}

/// Whether paragraph content is blank (whitespace, `&nbsp;` or `<br>` only).
#[must_use]
pub fn is_blank(inner: &str) -> bool {
    let mut rest = inner;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace());
        if let Some(r) = rest.strip_prefix("&nbsp;") {
            rest = r;
        } else if let Some(r) = ["<br>", "<br/>", "<br />"]
            .iter()
            .find_map(|br| rest.strip_prefix(br))
        {
            rest = r;
        } else {
            return rest.is_empty();
        }
    }
}

/// Text of a heading paragraph: content wholly wrapped in bold (optionally underlined).
///
/// `<strong><u>Text</u></strong>`, `<u><strong>Text</strong></u>` and `<b>Text</b>`
/// all yield `Text`.
#[must_use]
pub fn heading_text(inner: &str) -> Option<&str> {
    let mut text = inner.trim();
    let mut bold = false;
    loop {
        let unwrapped = [("<strong>", "</strong>", true), ("<b>", "</b>", true), ("<u>", "</u>", false)]
            .iter()
            .find_map(|(open, close, is_bold)| {
                text.strip_prefix(open)
                    .and_then(|t| t.strip_suffix(close))
                    .map(|t| (t.trim(), *is_bold))
            });
        match unwrapped {
            Some((t, is_bold)) => {
                text = t;
                bold |= is_bold;
            }
            None => break,
        }
    }
    (bold && !text.is_empty() && !text.contains('<')).then_some(text)
}

/// Section a heading paragraph introduces, and whether its icon is present.
#[must_use]
pub fn section_header<'g>(inner: &str, guide: &'g StyleGuide) -> Option<(&'g SectionSpec, bool)> {
    let text = heading_text(inner)?;
    if let Some(section) = guide.section_for_icon_prefix(text) {
        return Some((section, true));
    }
    guide.section_named(text).map(|s| (s, false))
}

/// Plain paragraph text, if the paragraph carries no inline markup.
#[must_use]
pub fn plain_text(inner: &str) -> Option<&str> {
    let text = inner.trim();
    (!text.contains('<')).then_some(text)
}

#[must_use]
pub fn is_round_marker(text: &str) -> bool {
    ROUND_MARKER.is_match(text.trim())
}

#[must_use]
pub fn has_quantity(text: &str) -> bool {
    QUANTITY.is_match(text)
}

/// A short label such as `Goblet Squats`: few words, no sentence punctuation.
#[must_use]
pub fn is_label_shaped(text: &str) -> bool {
    text.chars().next().is_some_and(char::is_alphabetic)
        && text.chars().count() <= LABEL_MAX_CHARS
        && text.split_whitespace().count() <= LABEL_MAX_WORDS
        && !text.ends_with(['.', '!', '?', ':', ','])
}

/// Whether a paragraph looks like a prescribed exercise, and how sure we are.
///
/// Headers, round/timer markers, blank lines and inline-formatted lines never qualify.
#[must_use]
pub fn exercise_line(inner: &str, guide: &StyleGuide) -> Option<Confidence> {
    let text = plain_text(inner)?;
    if is_blank(text)
        || is_round_marker(text)
        || guide.section_for_icon_prefix(text).is_some()
        || guide.section_named(text).is_some()
    {
        return None;
    }
    if has_quantity(text) {
        Some(Confidence::High)
    } else if is_label_shaped(text) {
        Some(Confidence::Medium)
    } else {
        None
    }
}

/// Consecutive top-level exercise paragraphs that belong in one list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseRun {
    /// Index of the first and last block of the run (inclusive).
    pub first: usize,
    pub last: usize,
    pub confidence: Confidence,
}

/// Find runs of bare exercise paragraphs.
///
/// A run qualifies when it holds at least one line with a quantity or at least
/// two label-shaped lines; a lone label could just as well be prose.
#[must_use]
pub fn exercise_runs(blocks: &[Block<'_>], guide: &StyleGuide) -> Vec<ExerciseRun> {
    let mut runs = Vec::new();
    let mut current: Option<ExerciseRun> = None;

    let flush = |current: &mut Option<ExerciseRun>, runs: &mut Vec<ExerciseRun>| {
        if let Some(run) = current.take()
            && (run.confidence == Confidence::High || run.last > run.first)
        {
            runs.push(run);
        }
    };

    for (i, block) in blocks.iter().enumerate() {
        let line = match block.kind {
            BlockKind::Paragraph => exercise_line(block.inner, guide),
            BlockKind::List | BlockKind::Other => None,
        };
        let Some(conf) = line else {
            flush(&mut current, &mut runs);
            continue;
        };
        if let Some(run) = current.as_mut() {
            run.last = i;
            run.confidence = run.confidence.max(conf);
        } else {
            current = Some(ExerciseRun {
                first: i,
                last: i,
                confidence: conf,
            });
        }
    }
    flush(&mut current, &mut runs);
    runs
}

/// Remove HTML tags, leaving text separated by spaces.
#[must_use]
pub fn strip_tags(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for c in fragment.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
