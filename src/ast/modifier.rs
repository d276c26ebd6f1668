//! Expression Modifiers
//!
//! A modifier keeps its raw text (`Q`, `S,from,to,g`, `@v@body@`) and the
//! kind it was classified as when the lexer parsed it. All predicates and
//! transforms here are pure functions of those two.

use regex_lite::Captures;
use serde::{Serialize, Serializer};
use std::fmt;

use crate::parser::cursor::regcomp;
use crate::parser::lexer::tokenize;

/// The payload of each kind of modifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModifierKind {
    /// `E H L O Ox Q R T sh tA tW tl tu tw u`
    Keyword,
    /// `:ts<separator>`
    Separator(String),
    /// `:Dvalue`, the value if the variable is defined.
    Defined(String),
    /// `:Uvalue`, the value if the variable is undefined.
    Undefined(String),
    /// `:Mpattern` or `:Npattern`, with escaping backslashes removed.
    Match { negated: bool, pattern: String },
    /// `:S` or `:C`.
    Subst(Subst),
    /// `:@var@body@`
    Loop { var: String, body: String },
    /// `:[1]`, `:[-1]`, `:[2..3]`, `:[#]`
    Index(String),
    /// `:?then:else`
    Ternary { then: String, otherwise: String },
    /// `::=`, `::!=`, `::+=`, `::?=`
    Assign { op: String, value: String },
    /// `:from=to`
    SysV { from: String, to: String },
    /// `:!command!`
    Shell(String),
}

/// The parts of a `:S` or `:C` modifier.
///
/// Escaped separators in `from` and `to` are already unescaped. The anchors
/// `^` and `$` stay in `from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subst {
    pub regex: bool,
    pub separator: char,
    pub from: String,
    pub to: String,
    pub options: String,
}

impl Subst {
    pub fn is_global(&self) -> bool {
        self.options.contains('g')
    }

    pub fn left_anchored(&self) -> bool {
        self.from.starts_with('^')
    }

    pub fn right_anchored(&self) -> bool {
        self.from.ends_with('$') && !self.from.ends_with("\\$")
    }

    /// Applies the substitution to `sample`.
    ///
    /// Returns `None` when `from` or `to` refer to other variables, or when
    /// the regular expression of a `:C` modifier does not compile.
    pub fn apply(&self, sample: &str) -> Option<String> {
        if contains_expr(&self.from) || contains_expr(&self.to) {
            return None;
        }
        if self.regex {
            self.apply_regex(sample)
        } else {
            Some(self.apply_literal(sample))
        }
    }

    fn apply_literal(&self, sample: &str) -> String {
        let left = self.left_anchored();
        let right = self.right_anchored();
        let mut from = self.from.as_str();
        if left {
            from = &from[1..];
        }
        if right {
            from = &from[..from.len() - 1];
        }

        if left && right {
            return if sample == from {
                expand_ampersand(&self.to, from)
            } else {
                sample.to_string()
            };
        }
        if left {
            return match sample.strip_prefix(from) {
                Some(rest) => expand_ampersand(&self.to, from) + rest,
                None => sample.to_string(),
            };
        }
        if right {
            return match sample.strip_suffix(from) {
                Some(init) => init.to_string() + &expand_ampersand(&self.to, from),
                None => sample.to_string(),
            };
        }
        if from.is_empty() {
            return sample.to_string();
        }

        let replacement = expand_ampersand(&self.to, from);
        if self.is_global() {
            sample.replace(from, &replacement)
        } else {
            sample.replacen(from, &replacement, 1)
        }
    }

    fn apply_regex(&self, sample: &str) -> Option<String> {
        let re = regcomp(&self.from)?;
        let mut out = String::new();
        let mut last = 0;
        for caps in re.captures_iter(sample) {
            let whole = caps.get(0)?;
            out.push_str(&sample[last..whole.start()]);
            out.push_str(&expand_regex_replacement(&self.to, &caps));
            last = whole.end();
            if !self.is_global() {
                break;
            }
        }
        out.push_str(&sample[last..]);
        Some(out)
    }
}

fn contains_expr(text: &str) -> bool {
    tokenize(text, None).0.iter().any(|t| t.is_expr())
}

/// Replaces `&` with the matched text; `\&` stays a literal ampersand.
fn expand_ampersand(to: &str, matched: &str) -> String {
    let mut out = String::new();
    let mut chars = to.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            },
            '&' => out.push_str(matched),
            _ => out.push(c),
        }
    }
    out
}

fn expand_regex_replacement(to: &str, caps: &Captures<'_>) -> String {
    let mut out = String::new();
    let mut chars = to.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(d @ '0'..='9') => {
                    let index = d as usize - '0' as usize;
                    if let Some(group) = caps.get(index) {
                        out.push_str(group.as_str());
                    }
                }
                Some(next) => out.push(next),
                None => out.push('\\'),
            },
            '&' => {
                if let Some(whole) = caps.get(0) {
                    out.push_str(whole.as_str());
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// One modifier of an expression, such as `Q` in `${VAR:Q}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modifier {
    text: String,
    kind: ModifierKind,
}

impl Modifier {
    pub fn new(text: impl Into<String>, kind: ModifierKind) -> Self {
        Modifier {
            text: text.into(),
            kind,
        }
    }

    pub fn keyword(text: impl Into<String>) -> Self {
        Modifier::new(text, ModifierKind::Keyword)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> &ModifierKind {
        &self.kind
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == ModifierKind::Keyword && self.text == keyword
    }

    pub fn is_quote(&self) -> bool {
        self.is_keyword("Q")
    }

    pub fn is_to_lower(&self) -> bool {
        self.is_keyword("tl")
    }

    pub fn is_to_upper(&self) -> bool {
        self.is_keyword("tu")
    }

    /// `:S` and `:C` may be followed by another modifier without a colon.
    pub fn is_chainable(&self) -> bool {
        matches!(self.kind, ModifierKind::Subst(_))
    }

    /// A `:from=to` modifier that replaces a plain suffix, like `:.c=.o`.
    pub fn is_suffix_subst(&self) -> bool {
        match &self.kind {
            ModifierKind::SysV { from, to } => !from.contains('%') && !to.contains('%'),
            _ => false,
        }
    }

    /// Whether applying this modifier to a list yields a single word.
    pub fn changes_list_to_scalar(&self) -> bool {
        match &self.kind {
            ModifierKind::Separator(_) => true,
            ModifierKind::Index(selector) => selector == "#",
            ModifierKind::Keyword => self.text == "tW",
            _ => false,
        }
    }

    /// For `:M` and `:N`, whether the modifier keeps matching words, and the
    /// unescaped pattern.
    pub fn match_pattern(&self) -> Option<(bool, &str)> {
        match &self.kind {
            ModifierKind::Match { negated, pattern } => Some((!negated, pattern.as_str())),
            _ => None,
        }
    }

    pub fn subst_parts(&self) -> Option<&Subst> {
        match &self.kind {
            ModifierKind::Subst(subst) => Some(subst),
            _ => None,
        }
    }

    /// The loop variable and body of a `:@var@body@` modifier.
    pub fn loop_parts(&self) -> Option<(&str, &str)> {
        match &self.kind {
            ModifierKind::Loop { var, body } => Some((var.as_str(), body.as_str())),
            _ => None,
        }
    }

    /// Applies a `:S` or `:C` modifier to a sample string.
    pub fn subst(&self, sample: &str) -> Option<String> {
        self.subst_parts()?.apply(sample)
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for Modifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}
