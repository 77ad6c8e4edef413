//! Decoding of generated search data fragments.
//!
//! A fragment is a JavaScript array literal (optionally assigned to a
//! variable, as in `var searchData = [...];`) or plain JSON. Each record is
//! `[record_id, symbol]`, where `symbol` takes one of three shapes:
//!
//! - `[name, [path, 1, scope], [path, 1, scope], ...]` (one tuple per overload)
//! - `[name, [[path, scope], [path, scope], ...]]` (nested overload list)
//! - `[name, path, scope]` (flat single anchor)
//!
//! All of them decode to one [`SymbolRecord`] with an anchors list.

use super::manifest::Section;
use crate::error::MalformedEntry;
use crate::types::{Anchor, Entry, Kind};
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::LazyLock;

static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*(?:(?:var|let|const)\s+[A-Za-z_$][\w$]*\s*=\s*)?(\[.*\])\s*;?\s*$")
        .expect("static regex")
});

/// Page names that document a compound type.
const CLASS_PAGE_PREFIXES: &[&str] = &[
    "class",
    "struct",
    "union",
    "interface",
    "protocol",
    "exception",
    "concept",
];

/// One anchor of a symbol together with the scope it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedAnchor {
    pub anchor: Anchor,
    pub scope: String,
}

/// A symbol as written by the generator, before it is split into entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRecord {
    pub fragment_id: String,
    pub display_name: String,
    pub anchors: Vec<ScopedAnchor>,
}

impl SymbolRecord {
    /// Flatten into one entry per anchor.
    pub fn into_entries(self, section: Section) -> impl Iterator<Item = Entry> {
        let key = self.display_name.to_lowercase();
        let display_name = self.display_name;
        let fragment_id = self.fragment_id;

        self.anchors
            .into_iter()
            .enumerate()
            .map(move |(overload, scoped)| Entry {
                key: key.clone(),
                display_name: display_name.clone(),
                kind: infer_kind(&scoped.anchor, section),
                scope_label: scoped.scope,
                anchor: scoped.anchor,
                overload_index: u16::try_from(overload).unwrap_or(u16::MAX),
                fragment_id: fragment_id.clone(),
            })
    }
}

/// Result of decoding one fragment.
#[derive(Debug, Clone, Default)]
pub struct ParsedFragment {
    pub records: Vec<SymbolRecord>,
    /// Records that were dropped.
    pub skipped: Vec<MalformedEntry>,
}

/// Decode a fragment. Fails only if the outer array cannot be read; bad
/// records are collected in [`ParsedFragment::skipped`].
pub fn parse_fragment(text: &str) -> Result<ParsedFragment, String> {
    let body = ASSIGNMENT
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| "expected an array literal".to_string())?;

    let json = js_to_json(body)?;
    let values: Vec<Value> =
        serde_json::from_str(&json).map_err(|e| format!("invalid array: {}", e))?;

    let mut parsed = ParsedFragment::default();
    for (position, value) in values.iter().enumerate() {
        match parse_record(position, value) {
            Ok(record) => parsed.records.push(record),
            Err(malformed) => parsed.skipped.push(malformed),
        }
    }

    Ok(parsed)
}

fn parse_record(position: usize, value: &Value) -> Result<SymbolRecord, MalformedEntry> {
    let malformed = |record: &str, reason| MalformedEntry {
        position,
        record: record.to_string(),
        reason,
    };

    let Some((id, symbol)) = value
        .as_array()
        .and_then(|pair| Some((pair.first()?, pair.get(1)?)))
    else {
        return Err(malformed("?", "record is not a [id, symbol] pair"));
    };
    let fragment_id = id.as_str().ok_or_else(|| malformed("?", "record id is not a string"))?;

    let Some((name, rest)) = symbol.as_array().and_then(|a| a.split_first()) else {
        return Err(malformed(fragment_id, "symbol is not an array"));
    };
    let display_name = name
        .as_str()
        .map(decode_entities)
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| malformed(fragment_id, "missing display name"))?;

    let anchors = parse_anchors(rest);
    if anchors.is_empty() {
        return Err(malformed(fragment_id, "missing anchors"));
    }

    Ok(SymbolRecord {
        fragment_id: fragment_id.to_string(),
        display_name: display_name.into_owned(),
        anchors,
    })
}

fn parse_anchors(rest: &[Value]) -> Vec<ScopedAnchor> {
    match rest {
        // Flat: [name, path, scope] or [name, path]
        [Value::String(_), ..] => anchor_from_tuple(rest).into_iter().collect(),
        // Nested: [name, [[path, scope], ...]]
        [Value::Array(list)] if list.first().is_some_and(Value::is_array) => list
            .iter()
            .filter_map(Value::as_array)
            .filter_map(|tuple| anchor_from_tuple(tuple))
            .collect(),
        // One tuple per overload: [name, [path, 1, scope], ...]
        tuples => tuples
            .iter()
            .filter_map(Value::as_array)
            .filter_map(|tuple| anchor_from_tuple(tuple))
            .collect(),
    }
}

/// `[path, scope]`, `[path, flag, scope]`, or `[path]`.
fn anchor_from_tuple(tuple: &[Value]) -> Option<ScopedAnchor> {
    let (path, rest) = tuple.split_first()?;
    let path = path.as_str().filter(|p| !p.trim().is_empty())?;
    let scope = rest.iter().rev().find_map(Value::as_str).unwrap_or_default();

    Some(ScopedAnchor {
        anchor: Anchor::new(decode_entities(path)),
        scope: decode_entities(scope).into_owned(),
    })
}

/// Infer the symbol kind from its anchor and the section the shard belongs to.
pub fn infer_kind(anchor: &Anchor, section: Section) -> Kind {
    if anchor.fragment().is_some() {
        return section.member_kind();
    }

    let file_name = anchor.page().rsplit('/').next().unwrap_or_default();
    let stem = file_name.strip_suffix(".html").unwrap_or(file_name);

    if CLASS_PAGE_PREFIXES.iter().any(|prefix| stem.starts_with(prefix)) {
        Kind::Class
    } else if stem.starts_with("namespace") {
        Kind::Namespace
    } else if stem.contains("_8") {
        // The generator encodes '.' in source file names as "_8"
        Kind::File
    } else {
        section.page_kind()
    }
}

/// Decode the HTML entities the generator emits in names and scopes.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        let decoded = rest.find(';').and_then(|end| {
            let ch = match &rest[1..end] {
                "lt" => '<',
                "gt" => '>',
                "amp" => '&',
                "quot" => '"',
                "apos" | "#39" => '\'',
                _ => return None,
            };
            Some((ch, end + 1))
        });

        match decoded {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);

    Cow::Owned(out)
}

/// Rewrite a JavaScript array literal into JSON.
///
/// Handles single-quoted strings and trailing commas, which is all the
/// generator produces beyond plain JSON.
fn js_to_json(input: &str) -> Result<String, String> {
    let mut out = String::with_capacity(input.len() + input.len() / 8);
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                let quote = c;
                out.push('"');
                loop {
                    let Some(c) = chars.next() else {
                        return Err("unterminated string literal".to_string());
                    };
                    match c {
                        '\\' => match chars.next() {
                            Some('\'') => out.push('\''),
                            Some(escaped) => {
                                out.push('\\');
                                out.push(escaped);
                            }
                            None => return Err("unterminated escape".to_string()),
                        },
                        c if c == quote => break,
                        '"' => out.push_str("\\\""),
                        '\n' => out.push_str("\\n"),
                        c => out.push(c),
                    }
                }
                out.push('"');
            }
            ',' => {
                // Drop trailing commas before a closing bracket
                let mut lookahead = chars.clone();
                while lookahead.next_if(|c| c.is_whitespace()).is_some() {}
                if !matches!(lookahead.peek(), Some(']' | '}')) {
                    out.push(',');
                }
            }
            c => out.push(c),
        }
    }

    Ok(out)
}
