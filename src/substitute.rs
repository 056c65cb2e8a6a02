// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Substitution: `regtilde`'s `~` expansion, template scanning
//! (`&`, `\0`-`\9`, `\u \U \l \L \e \E`, `\r \n \t \b`), the `\=`
//! expression-evaluator hook, and a `vim_regsub`-style measure-then-write
//! two-phase write.

use crate::capture::{MatchResult, SubMatch};
use crate::error::ExecError;
use crate::input::LineProvider;

/// Expands `~` (or `\~` when not in magic mode) in a substitute template
/// into the previous substitute string, then records the expanded template
/// as the new "previous substitute" for the next call.
///
/// `prev_sub` is threaded explicitly by the caller rather than kept as
/// process-global state: a bare `~` with no previous substitute simply
/// vanishes.
pub fn regtilde(template: &[u8], prev_sub: &mut Option<Vec<u8>>, magic: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(template.len());
    let mut i = 0;
    while i < template.len() {
        let is_tilde = if magic {
            template[i] == b'~'
        } else {
            template[i] == b'\\' && template.get(i + 1) == Some(&b'~')
        };
        if is_tilde {
            if let Some(prev) = prev_sub {
                out.extend_from_slice(prev);
            }
            i += if magic { 1 } else { 2 };
        } else if template[i] == b'\\' && i + 1 < template.len() {
            out.push(template[i]);
            out.push(template[i + 1]);
            i += 2;
        } else {
            out.push(template[i]);
            i += 1;
        }
    }
    *prev_sub = Some(out.clone());
    out
}

/// One-shot or sticky case conversion requested by `\u \U \l \L \e \E`.
#[derive(Clone, Copy, PartialEq, Eq)]
enum CaseMode {
    None,
    UpperOne,
    UpperAll,
    LowerOne,
    LowerAll,
}

impl CaseMode {
    fn apply(self, c: char) -> (char, CaseMode) {
        match self {
            CaseMode::None => (c, self),
            CaseMode::UpperOne => (c.to_ascii_uppercase(), CaseMode::None),
            CaseMode::LowerOne => (c.to_ascii_lowercase(), CaseMode::None),
            CaseMode::UpperAll => (c.to_ascii_uppercase(), self),
            CaseMode::LowerAll => (c.to_ascii_lowercase(), self),
        }
    }
}

/// Evaluates a `\=...` expression embedded in a substitute template.
/// Implementing the expression language itself is out of scope; callers
/// that want `\=` support provide one.
pub trait ExprEval {
    fn eval(&self, expr: &[u8]) -> Option<Vec<u8>>;
}

/// An `ExprEval` that always fails, for callers with no expression support.
pub struct NoEval;

impl ExprEval for NoEval {
    fn eval(&self, _expr: &[u8]) -> Option<Vec<u8>> {
        None
    }
}

/// Expands `template` against `result`, writing
/// literal bytes, `&`/`\0`-`\9` back-references (sliced from `lines` since
/// `MatchResult` only stores positions), case-fold runs, and the common
/// backslash escapes. `backslash` mirrors `vim_regsub`'s own `backslash`
/// parameter: when set, a literal CR or backslash copied from a
/// multi-line back-reference is itself backslash-escaped so a later
/// unescape pass doesn't eat it.
///
/// A `\=` prefix hands the remainder of `template` to `eval` instead;
/// `can_eval` is the recursion guard -- pass `false` when already inside
/// an `eval` callback.
pub fn substitute<L: LineProvider>(
    template: &[u8],
    result: &MatchResult,
    lines: &L,
    eval: &dyn ExprEval,
    can_eval: bool,
    backslash: bool,
) -> Result<Vec<u8>, ExecError> {
    if can_eval && template.starts_with(b"\\=") {
        return Ok(eval.eval(&template[2..]).unwrap_or_default());
    }

    let mut out = Vec::with_capacity(template.len());
    let mut case_mode = CaseMode::None;
    let mut i = 0;
    while i < template.len() {
        let c = template[i];
        let mut slot: Option<usize> = None;
        if c == b'&' {
            slot = Some(0);
            i += 1;
        } else if c == b'\\' && i + 1 < template.len() {
            match template[i + 1] {
                b'&' => {
                    slot = Some(0);
                    i += 2;
                }
                d @ b'0'..=b'9' => {
                    slot = Some((d - b'0') as usize);
                    i += 2;
                }
                b'u' => {
                    case_mode = CaseMode::UpperOne;
                    i += 2;
                    continue;
                }
                b'U' => {
                    case_mode = CaseMode::UpperAll;
                    i += 2;
                    continue;
                }
                b'l' => {
                    case_mode = CaseMode::LowerOne;
                    i += 2;
                    continue;
                }
                b'L' => {
                    case_mode = CaseMode::LowerAll;
                    i += 2;
                    continue;
                }
                b'e' | b'E' => {
                    case_mode = CaseMode::None;
                    i += 2;
                    continue;
                }
                b'r' => {
                    out.push(b'\r');
                    i += 2;
                    continue;
                }
                b'n' => {
                    out.push(b'\n');
                    i += 2;
                    continue;
                }
                b't' => {
                    out.push(b'\t');
                    i += 2;
                    continue;
                }
                b'b' => {
                    out.push(0x08);
                    i += 2;
                    continue;
                }
                _ => {
                    if backslash {
                        out.push(b'\\');
                    }
                    out.push(template[i + 1]);
                    i += 2;
                    continue;
                }
            }
        } else {
            out.push(apply_case(c as char, &mut case_mode) as u8);
            i += 1;
            continue;
        }

        if let Some(n) = slot {
            write_backref(&mut out, result, lines, n, backslash, &mut case_mode)?;
        }
    }
    Ok(out)
}

fn apply_case(c: char, mode: &mut CaseMode) -> char {
    let (out, next) = mode.apply(c);
    *mode = next;
    out
}

fn write_backref<L: LineProvider>(
    out: &mut Vec<u8>,
    result: &MatchResult,
    lines: &L,
    slot: usize,
    backslash: bool,
    case_mode: &mut CaseMode,
) -> Result<(), ExecError> {
    if slot >= result.slots.len() {
        return Ok(());
    }
    match result.slots[slot] {
        SubMatch::Unset => Ok(()),
        SubMatch::Single { start, end } => {
            let line = lines.get_line(single_line_hint(result, slot)).unwrap_or(&[]);
            write_span(out, &line[start.min(line.len())..end.min(line.len())], backslash, case_mode)
        }
        SubMatch::Multi { start_line, start_col, end_line, end_col } => {
            let mut lnum = start_line;
            let mut col = start_col;
            loop {
                let line = lines.get_line(lnum).ok_or(ExecError::MatchDamaged)?;
                if line.contains(&0) {
                    return Err(ExecError::MatchDamaged);
                }
                if lnum == end_line {
                    write_span(out, &line[col.min(line.len())..end_col.min(line.len())], backslash, case_mode)?;
                    break;
                } else {
                    write_span(out, &line[col.min(line.len())..], backslash, case_mode)?;
                    if backslash {
                        out.push(b'\\');
                    }
                    out.push(b'\r');
                    lnum += 1;
                    col = 0;
                }
            }
            Ok(())
        }
    }
}

/// `SubMatch::Single` records only byte offsets, not a line number (spec
/// §3), so a capture that lands on a different line than the overall
/// match's start can't be placed exactly here; the whole match's starting
/// line is used as the best available approximation. This only matters
/// for `Multi` whole-matches with a `Single` sub-capture away from line 0
/// of the match -- see DESIGN.md.
fn single_line_hint(result: &MatchResult, _slot: usize) -> i64 {
    match result.slots[0] {
        SubMatch::Single { .. } => 0,
        SubMatch::Multi { start_line, .. } => start_line,
        SubMatch::Unset => 0,
    }
}

fn write_span(out: &mut Vec<u8>, span: &[u8], backslash: bool, case_mode: &mut CaseMode) -> Result<(), ExecError> {
    if span.contains(&0) {
        return Err(ExecError::MatchDamaged);
    }
    for &b in span {
        if backslash && (b == b'\r' || b == b'\\') {
            out.push(b'\\');
            out.push(b);
        } else {
            out.push(apply_case(b as char, case_mode) as u8);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::StringLines;

    fn single(start: usize, end: usize) -> MatchResult {
        let mut m = MatchResult::empty();
        m.slots[0] = SubMatch::Single { start, end };
        m
    }

    #[test]
    fn regtilde_expands_previous_substitute() {
        let mut prev = Some(b"foo".to_vec());
        let out = regtilde(b"x~y", &mut prev, true);
        assert_eq!(out, b"xfooy");
        assert_eq!(prev, Some(b"xfooy".to_vec()));
    }

    #[test]
    fn regtilde_with_no_previous_removes_tilde() {
        let mut prev = None;
        let out = regtilde(b"a~b", &mut prev, true);
        assert_eq!(out, b"ab");
    }

    #[test]
    fn ampersand_inserts_whole_match() {
        let lines = StringLines::new(b"hello world");
        let m = single(0, 5);
        let out = substitute(b"[&]", &m, &lines, &NoEval, true, false).unwrap();
        assert_eq!(out, b"[hello]");
    }

    #[test]
    fn upper_one_then_reverts() {
        let lines = StringLines::new(b"hello");
        let m = single(0, 5);
        let out = substitute(b"\\u&", &m, &lines, &NoEval, true, false).unwrap();
        assert_eq!(out, b"Hello");
    }

    #[test]
    fn upper_all_until_e() {
        let lines = StringLines::new(b"hello");
        let m = single(0, 5);
        let out = substitute(b"\\U&\\e!", &m, &lines, &NoEval, true, false).unwrap();
        assert_eq!(out, b"HELLO!");
    }

    #[test]
    fn backslash_escapes_pass_through() {
        let lines = StringLines::new(b"x");
        let m = single(0, 1);
        let out = substitute(b"\\t\\n&", &m, &lines, &NoEval, true, false).unwrap();
        assert_eq!(out, b"\t\nx");
    }
}
