//! Targeted repair transforms.
//!
//! Each fixer is an independently testable transform that returns a
//! [`Pass`]. Detection reuses the same transform: a fixer that would change
//! nothing means the fragment has no such violation.

use std::sync::Arc;

use regex::Regex;

use crate::error::MalformedFragment;
use crate::markup::{self, BlockKind};
use crate::normalize::Pass;
use crate::style::StyleGuide;

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid fixer pattern {pattern}: {err}"),
    }
}

/// Duplicate-icon patterns compiled for one icon.
#[derive(Debug, Clone)]
struct IconPatterns {
    icon: String,
    /// `<p>ICON</p><p><strong><u>ICON Name` — icon-only paragraph above its header.
    lone_paragraph: Regex,
    /// `ICON <p><strong><u>ICON Name` — stray icon in front of the header wrapper.
    stray_prefix: Regex,
    /// `ICON ICON` — the icon repeated back to back.
    repeated: Regex,
}

impl IconPatterns {
    fn new(icon: &str) -> Self {
        let i = format!(r"{}\x{{FE0F}}?", regex::escape(icon));
        let header_open = concat!(
            r"(<p(?:\s[^<>]*)?>\s*(?:<u>\s*)?",
            r"(?:<strong(?:\s[^<>]*)?>|<b(?:\s[^<>]*)?>)\s*(?:<u>\s*)?)"
        );
        Self {
            icon: icon.to_owned(),
            lone_paragraph: compile(&format!(
                r"<p(?:\s[^<>]*)?>\s*(?:<(?:u|strong|b)(?:\s[^<>]*)?>\s*)*{i}\s*(?:</(?:u|strong|b)>\s*)*</p>\s*{header_open}{i}"
            )),
            stray_prefix: compile(&format!(r"{i}\s*{header_open}{i}")),
            repeated: compile(&format!(r"{i}(?:\s*{i})+")),
        }
    }
}

/// Collapses duplicated section icons around headings.
#[derive(Debug, Clone)]
pub struct IconFixer {
    patterns: Vec<IconPatterns>,
}

impl IconFixer {
    #[must_use]
    pub fn new(guide: &StyleGuide) -> Self {
        Self {
            patterns: guide.icons().map(IconPatterns::new).collect(),
        }
    }

    /// Collapse every duplicated icon to one occurrence.
    ///
    /// Must run before any spacing pass: collapsing the space between a stray
    /// icon and its header would hide the adjacency this looks for.
    #[must_use]
    pub fn fix(&self, text: &str) -> Pass {
        let mut text = text.to_owned();
        let mut count = 0;
        for p in &self.patterns {
            for (regex, keep_header) in [
                (&p.lone_paragraph, true),
                (&p.stray_prefix, true),
                (&p.repeated, false),
            ] {
                let hits = regex.find_iter(&text).count();
                if hits == 0 {
                    continue;
                }
                count += hits;
                text = regex
                    .replace_all(&text, |caps: &regex::Captures<'_>| {
                        if keep_header {
                            format!("{}{}", &caps[1], p.icon)
                        } else {
                            p.icon.clone()
                        }
                    })
                    .into_owned();
            }
        }
        Pass { text, count }
    }

    /// Number of duplicated icons in `text`, without changing it.
    #[must_use]
    pub fn count(&self, text: &str) -> usize {
        self.fix(text).count
    }
}

/// Wraps bare exercise paragraphs into lists and tidies blank lines around lists.
#[derive(Debug, Clone)]
pub struct ListFixer {
    guide: Arc<StyleGuide>,
    blank_after_list: Regex,
}

impl ListFixer {
    #[must_use]
    pub fn new(guide: Arc<StyleGuide>) -> Self {
        let empty = regex::escape(&guide.empty_paragraph());
        Self {
            blank_after_list: compile(&format!(
                r"</ul>(?:{empty})+(<p(?:\s[^<>]*)?>)(<strong>|<b>)?"
            )),
            guide,
        }
    }

    /// Drop blank paragraphs between a list and a following non-heading paragraph.
    #[must_use]
    pub fn drop_blank_after_lists(&self, text: &str) -> Pass {
        let mut count = 0;
        let out = self
            .blank_after_list
            .replace_all(text, |caps: &regex::Captures<'_>| {
                if caps.get(2).is_some() {
                    caps[0].to_owned()
                } else {
                    count += 1;
                    format!("</ul>{}", &caps[1])
                }
            });
        Pass {
            text: out.into_owned(),
            count,
        }
    }

    /// Group consecutive bare exercise paragraphs into one list each.
    ///
    /// The count is the number of lists created.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedFragment`] when the fragment cannot be split into blocks;
    /// callers skip this step and keep the text as is.
    pub fn listize_exercises(&self, text: &str) -> Result<Pass, MalformedFragment> {
        let blocks = markup::blocks(text)?;
        let runs = markup::exercise_runs(&blocks, &self.guide);
        if runs.is_empty() {
            return Ok(Pass {
                text: text.to_owned(),
                count: 0,
            });
        }

        let list_open = self.guide.list_open();
        let item_open = self.guide.list_item_open();
        let mut out = String::with_capacity(text.len() + runs.len() * 64);
        let mut runs_iter = runs.iter().peekable();

        for (i, block) in blocks.iter().enumerate() {
            let Some(run) = runs_iter.peek() else {
                out.push_str(block.raw);
                continue;
            };
            if i < run.first {
                out.push_str(block.raw);
                continue;
            }
            debug_assert_eq!(block.kind, BlockKind::Paragraph);
            if i == run.first {
                out.push_str(&list_open);
            }
            out.push_str(&item_open);
            out.push_str(block.raw);
            out.push_str("</li>");
            if i == run.last {
                out.push_str("</ul>");
                runs_iter.next();
            }
        }

        Ok(Pass {
            text: out,
            count: runs.len(),
        })
    }
}
