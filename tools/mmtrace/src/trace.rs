//! Access trace parser
//!
//! One access per line, `r <page>[+<offset>]` or `w <page>[+<offset>]`.
//! Kinds are case-insensitive, numbers are decimal or `0x` hex, `#` starts
//! a comment and blank lines are skipped.

use softmmu::Access;

use crate::error::{Result, TraceError};

/// One access from a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceOp {
    pub access: Access,
    pub page: usize,
    pub offset: usize,
    /// Source line, 1-based
    pub line: usize,
}

/// Parse a decimal or `0x`-prefixed hex number
pub fn parse_number(s: &str) -> Option<usize> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

fn parse_access(kind: &str) -> Option<Access> {
    match kind {
        "r" | "R" => Some(Access::Read),
        "w" | "W" => Some(Access::Write),
        _ => None,
    }
}

fn parse_line(text: &str, line: usize) -> Result<Option<TraceOp>> {
    let text = match text.find('#') {
        Some(at) => &text[..at],
        None => text,
    };

    let mut fields = text.split_whitespace();
    let Some(kind) = fields.next() else {
        return Ok(None);
    };
    let access = parse_access(kind)
        .ok_or_else(|| TraceError::parse(line, format!("unknown access kind `{}`", kind)))?;

    let target = fields
        .next()
        .ok_or_else(|| TraceError::parse(line, "missing page number"))?;
    if let Some(extra) = fields.next() {
        return Err(TraceError::parse(line, format!("unexpected `{}`", extra)));
    }

    let (page, offset) = match target.split_once('+') {
        Some((page, offset)) => (page, Some(offset)),
        None => (target, None),
    };
    let page = parse_number(page)
        .ok_or_else(|| TraceError::parse(line, format!("bad page number `{}`", page)))?;
    let offset = match offset {
        Some(offset) => parse_number(offset)
            .ok_or_else(|| TraceError::parse(line, format!("bad offset `{}`", offset)))?,
        None => 0,
    };

    Ok(Some(TraceOp {
        access,
        page,
        offset,
        line,
    }))
}

/// Parse a whole trace
pub fn parse_trace(src: &str) -> Result<Vec<TraceOp>> {
    let mut ops = Vec::new();
    for (idx, text) in src.lines().enumerate() {
        if let Some(op) = parse_line(text, idx + 1)? {
            ops.push(op);
        }
    }
    Ok(ops)
}
