//! Path grammar.
//!
//! ```text
//! Path      := [StoreKey "#"] Segments | Selector
//! Segments  := Segment ("." Segment)*
//! Selector  := "$" Identifier "(" JSONArgs ")" ["." Segment]*
//! ```

use statebridge_diff::Value;

use crate::error::HostError;

/// A store key plus the segments to read inside its state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StorePath {
    /// `None` targets the default store.
    pub(crate) store: Option<String>,
    pub(crate) segments: Vec<String>,
}

/// A selector invocation with an optional projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorCall {
    pub(crate) name: String,
    pub(crate) args: Vec<Value>,
    pub(crate) segments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParsedPath {
    Store(StorePath),
    Selector(SelectorCall),
}

pub(crate) fn parse(path: &str) -> Result<ParsedPath, HostError> {
    match path.strip_prefix('$') {
        Some(body) => parse_selector(path, body).map(ParsedPath::Selector),
        None => Ok(ParsedPath::Store(parse_store_path(path))),
    }
}

/// Parses a path that must address a store.
pub(crate) fn parse_store(path: &str) -> Result<StorePath, HostError> {
    match parse(path)? {
        ParsedPath::Store(store_path) => Ok(store_path),
        ParsedPath::Selector(_) => Err(HostError::selector_syntax(
            path,
            "a selector cannot be used where a store path is expected",
        )),
    }
}

fn parse_store_path(path: &str) -> StorePath {
    let (store, rest) = match path.split_once('#') {
        Some((key, rest)) => ((!key.is_empty()).then(|| key.to_owned()), rest),
        None => (None, path),
    };
    StorePath {
        store,
        segments: split_segments(rest),
    }
}

fn split_segments(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split('.').map(str::to_owned).collect()
}

fn parse_selector(path: &str, body: &str) -> Result<SelectorCall, HostError> {
    let name_end = body
        .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
        .unwrap_or(body.len());
    let (name, after_name) = body.split_at(name_end);
    if name.is_empty() {
        return Err(HostError::selector_syntax(
            path,
            "expected a selector name after '$'",
        ));
    }
    let Some(after_open) = after_name.strip_prefix('(') else {
        return Err(HostError::selector_syntax(
            path,
            "expected '(' after the selector name",
        ));
    };
    let close = closing_paren(after_open).ok_or_else(|| {
        HostError::selector_syntax(path, "unbalanced parentheses in selector arguments")
    })?;
    let (raw_args, from_close) = after_open.split_at(close);
    let tail = from_close.strip_prefix(')').unwrap_or(from_close);

    let segments = if tail.is_empty() {
        Vec::new()
    } else {
        match tail.strip_prefix('.') {
            Some(projection) if !projection.is_empty() => split_segments(projection),
            _ => {
                return Err(HostError::selector_syntax(
                    path,
                    "expected '.path' after the selector call",
                ));
            }
        }
    };

    Ok(SelectorCall {
        name: name.to_owned(),
        args: parse_args(raw_args)?,
        segments,
    })
}

/// Byte offset of the `)` closing the argument list, skipping nested
/// brackets and JSON strings.
fn closing_paren(text: &str) -> Option<usize> {
    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;
    for (index, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '(' | '[' | '{' => depth += 1,
            ')' if depth == 0 => return Some(index),
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    None
}

fn parse_args(raw: &str) -> Result<Vec<Value>, HostError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Vec<serde_json::Value>>(&format!("[{raw}]"))
        .map(|args| args.into_iter().map(Value::from).collect())
        .map_err(|error| HostError::selector_args(raw, &error))
}
