//! Markup hygiene normalizer.
//!
//! `normalize` is pure, total and idempotent. It runs a fixed sequence of
//! single-purpose passes; later passes rely on the shape earlier passes leave
//! behind (no line breaks, no whitespace between tags, double-quoted attributes),
//! so the order in [`Normalizer::normalize`] is part of the contract.
//!
//! Each pass returns the rewritten text and the number of spots it touched. The
//! repairer uses those counts for its statistics, the validator uses them to
//! detect violations without mutating anything.

use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};

use crate::style::StyleGuide;

static LINE_BREAKS: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(r"[ \t]*(?:\r\n|[\r\n\x{85}\x{2028}\x{2029}])+[ \t]*") {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid line break regex: {err}"),
    }
});

static INTERTAG_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| match Regex::new(r">\s+<") {
    Ok(regex) => regex,
    Err(err) => panic!("Invalid inter-tag whitespace regex: {err}"),
});

/// `<b>`, `<b ...>`, `</b>` and `<strong ...>` spellings of bold.
static BOLD_VARIANT: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(r"<(/?)(?:b(?:\s[^<>]*)?|strong\s[^<>]*)>") {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid bold regex: {err}"),
    }
});

/// Underline wrapped around bold; canonical nesting is bold outside.
static UNDERLINE_OUTSIDE_BOLD: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(r"<u><strong>([^<]*)</strong></u>") {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid underline nesting regex: {err}"),
    }
});

static SPLIT_LIST: LazyLock<Regex> = LazyLock::new(|| match Regex::new(r"</ul><ul(?:\s[^>]*)?>") {
    Ok(regex) => regex,
    Err(err) => panic!("Invalid split list regex: {err}"),
});

static TAG: LazyLock<Regex> = LazyLock::new(|| match Regex::new(r"<[a-zA-Z][^<>]*>") {
    Ok(regex) => regex,
    Err(err) => panic!("Invalid tag regex: {err}"),
});

static SINGLE_QUOTED_VALUE: LazyLock<Regex> =
    LazyLock::new(|| match Regex::new(r#"=\s*'([^'"<>]*)'"#) {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid quoted value regex: {err}"),
    });

/// Opening `p`, `ul` and `li` tags with their attribute text.
static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| match Regex::new(r"<(p|ul|li)(\s[^<>]*)?>") {
    Ok(regex) => regex,
    Err(err) => panic!("Invalid block tag regex: {err}"),
});

static CLASS_ATTR: LazyLock<Regex> = LazyLock::new(|| match Regex::new(r"(?:^|\s)class\s*=") {
    Ok(regex) => regex,
    Err(err) => panic!("Invalid class attribute regex: {err}"),
});

/// A paragraph holding nothing but whitespace, `&nbsp;` or `<br>`.
static BLANK_PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(r"<p(?:\s[^<>]*)?>(?:\s|&nbsp;|<br\s*/?>)*</p>") {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid blank paragraph regex: {err}"),
    }
});

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(err) => panic!("Invalid style guide pattern {pattern}: {err}"),
    }
}

/// Result of one pass: rewritten text plus how many spots changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pass {
    pub text: String,
    pub count: usize,
}

impl Pass {
    fn unchanged(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            count: 0,
        }
    }
}

/// Replace every match of `regex`, counting only replacements that changed text.
fn replace_counting(text: &str, regex: &Regex, mut rep: impl FnMut(&Captures<'_>) -> String) -> Pass {
    let mut count = 0;
    let out = regex.replace_all(text, |caps: &Captures<'_>| {
        let replacement = rep(caps);
        if replacement != caps[0] {
            count += 1;
        }
        replacement
    });
    Pass {
        text: out.into_owned(),
        count,
    }
}

/// Canonicalizes fragment markup against one [`StyleGuide`].
#[derive(Debug, Clone)]
pub struct Normalizer {
    guide: Arc<StyleGuide>,
    empty_paragraph: String,
    empty_runs: Regex,
    header_then_empty: Option<Regex>,
    empty_between_items: Regex,
    leading_empty: Regex,
    trailing_empty: Regex,
}

impl Normalizer {
    #[must_use]
    pub fn new(guide: Arc<StyleGuide>) -> Self {
        let empty_paragraph = guide.empty_paragraph();
        let empty = format!("(?:{})", regex::escape(&empty_paragraph));

        let icons: Vec<String> = guide.icons().map(regex::escape).collect();
        let header_then_empty = (!icons.is_empty()).then(|| {
            compile(&format!(
                r"(<p[^<>]*><strong>(?:<u>)?\s*(?:{})[^<]*(?:</u>)?</strong></p>){empty}+",
                icons.join("|")
            ))
        });

        Self {
            empty_runs: compile(&format!("{empty}{{2,}}")),
            empty_between_items: compile(&format!("</li>{empty}+<li")),
            leading_empty: compile(&format!("^{empty}+")),
            trailing_empty: compile(&format!("{empty}+$")),
            header_then_empty,
            empty_paragraph,
            guide,
        }
    }

    #[must_use]
    pub fn guide(&self) -> &Arc<StyleGuide> {
        &self.guide
    }

    #[must_use]
    pub fn empty_paragraph(&self) -> &str {
        &self.empty_paragraph
    }

    /// Canonicalize a fragment. Idempotent: `normalize(normalize(x)) == normalize(x)`.
    #[must_use]
    pub fn normalize(&self, fragment: &str) -> String {
        let passes: [&dyn Fn(&str) -> Pass; 11] = [
            &strip_line_breaks,
            &collapse_intertag_whitespace,
            &canonicalize_bold,
            &merge_split_lists,
            &double_quote_attributes,
            &|s: &str| self.inject_style_classes(s),
            &|s: &str| self.canonicalize_blank_paragraphs(s),
            &|s: &str| self.drop_blank_after_headers(s),
            &|s: &str| self.collapse_blank_runs(s),
            &|s: &str| self.drop_blank_between_items(s),
            &|s: &str| self.trim_blank_edges(s),
        ];
        passes
            .iter()
            .fold(fragment.to_owned(), |text, pass| pass(&text).text)
    }

    /// Add the required class to `p`, `ul` and `li` tags that have none.
    #[must_use]
    pub fn inject_style_classes(&self, text: &str) -> Pass {
        replace_counting(text, &BLOCK_TAG, |caps| {
            let tag = &caps[1];
            let attrs = caps.get(2).map_or("", |m| m.as_str());
            match self.guide.class_for_tag(tag) {
                Some(class) if !CLASS_ATTR.is_match(attrs) => {
                    format!("<{tag} class=\"{class}\"{attrs}>")
                }
                _ => caps[0].to_owned(),
            }
        })
    }

    /// Rewrite whitespace-only paragraphs as the canonical empty paragraph.
    #[must_use]
    pub fn canonicalize_blank_paragraphs(&self, text: &str) -> Pass {
        replace_counting(text, &BLANK_PARAGRAPH, |_| self.empty_paragraph.clone())
    }

    /// No blank line directly under a section header.
    #[must_use]
    pub fn drop_blank_after_headers(&self, text: &str) -> Pass {
        match &self.header_then_empty {
            Some(regex) => replace_counting(text, regex, |caps| caps[1].to_owned()),
            None => Pass::unchanged(text),
        }
    }

    /// Two or more consecutive empty paragraphs become one.
    #[must_use]
    pub fn collapse_blank_runs(&self, text: &str) -> Pass {
        replace_counting(text, &self.empty_runs, |_| self.empty_paragraph.clone())
    }

    #[must_use]
    pub fn drop_blank_between_items(&self, text: &str) -> Pass {
        replace_counting(text, &self.empty_between_items, |_| "</li><li".to_owned())
    }

    /// Strip leading and trailing empty paragraphs.
    #[must_use]
    pub fn trim_blank_edges(&self, text: &str) -> Pass {
        let lead = replace_counting(text, &self.leading_empty, |_| String::new());
        let trail = replace_counting(&lead.text, &self.trailing_empty, |_| String::new());
        Pass {
            text: trail.text,
            count: lead.count + trail.count,
        }
    }
}

/// Remove line breaks. A break between two words becomes a space so text never fuses.
#[must_use]
pub fn strip_line_breaks(text: &str) -> Pass {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut count = 0;
    for m in LINE_BREAKS.find_iter(text) {
        let before = text[..m.start()].chars().next_back();
        let after = text[m.end()..].chars().next();
        out.push_str(&text[last..m.start()]);
        let joins_words = matches!((before, after), (Some(b), Some(a)) if b != '>' && a != '<');
        if joins_words {
            out.push(' ');
        }
        count += 1;
        last = m.end();
    }
    out.push_str(&text[last..]);
    Pass { text: out, count }
}

/// Whitespace sitting directly between two tags is dropped.
#[must_use]
pub fn collapse_intertag_whitespace(text: &str) -> Pass {
    replace_counting(text, &INTERTAG_WHITESPACE, |_| "><".to_owned())
}

/// One spelling of bold (`<strong>`), nested outside underline.
#[must_use]
pub fn canonicalize_bold(text: &str) -> Pass {
    let spelled = replace_counting(text, &BOLD_VARIANT, |caps| format!("<{}strong>", &caps[1]));
    let nested = replace_counting(&spelled.text, &UNDERLINE_OUTSIDE_BOLD, |caps| {
        format!("<strong><u>{}</u></strong>", &caps[1])
    });
    Pass {
        text: nested.text,
        count: spelled.count + nested.count,
    }
}

/// Consecutive sibling lists are one list that got split.
#[must_use]
pub fn merge_split_lists(text: &str) -> Pass {
    replace_counting(text, &SPLIT_LIST, |_| String::new())
}

/// `attr='value'` becomes `attr="value"` inside tags.
#[must_use]
pub fn double_quote_attributes(text: &str) -> Pass {
    let mut count = 0;
    let out = TAG.replace_all(text, |tag: &Captures<'_>| {
        let fixed = SINGLE_QUOTED_VALUE.replace_all(&tag[0], "=\"$1\"");
        if fixed != tag[0] {
            count += SINGLE_QUOTED_VALUE.find_iter(&tag[0]).count();
        }
        fixed.into_owned()
    });
    Pass {
        text: out.into_owned(),
        count,
    }
}
