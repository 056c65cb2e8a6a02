// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The backtracking matching engine: a non-recursive, explicit `Job`-stack
//! machine over a `LineProvider` and the full `Inst` graph of this crate.
//!
//! The outer loop is an explicit stack of `Job`s rather than native
//! recursion, so a pathological pattern can't blow the Rust call stack.
//! `Look`/`Behind` bodies run on their own short-lived nested stack
//! (bounded by nesting depth in the pattern text, not by input size) --
//! see DESIGN.md.

use std::rc::Rc;

use log::trace;

use crate::capture::{MatchResult, SubMatch, N_SUB};
use crate::chartab::{decompose_hebrew, ByteTable};
use crate::error::ExecError;
use crate::host::{HostState, Pos};
use crate::input::LineProvider;
use crate::inst::{Inst, LookKind, Pc};
use crate::lexer::Cmp;
use crate::options::ExecFlags;
use crate::program::Program;

/// Per-attempt mutable state: capture slots, external captures, and
/// `\{...}` bookkeeping. `brace_count`/`brace_last_pos` are sized to the
/// program's own `num_braces` — every non-SIMPLE `* + ? {m,n}` gets a
/// slot, not just `\{m,n}` ones, so this isn't bounded to 10.
struct State {
    slots: [SubMatch; N_SUB],
    open: [Option<Pos>; N_SUB],
    ext: [Option<Rc<[u8]>>; 9],
    ext_open: [Option<Pos>; 9],
    brace_count: Vec<u32>,
    brace_last_pos: Vec<Option<Pos>>,
}

impl State {
    fn new(num_braces: usize) -> State {
        State {
            slots: [SubMatch::Unset; N_SUB],
            open: [None; N_SUB],
            ext: Default::default(),
            ext_open: [None; 9],
            brace_count: vec![0; num_braces],
            brace_last_pos: vec![None; num_braces],
        }
    }
}

enum Job {
    Try(Pc, Pos),
    RestoreSave(usize, SubMatch, Option<Pos>),
    RestoreExt(usize, Option<Rc<[u8]>>, Option<Pos>),
    RestoreBrace(usize, u32, Option<Pos>),
    GrowBrace(usize, Pc, Pos),
}

/// Runs a compiled `Program` against a `LineProvider`, consulting `host`
/// for position-sensitive atoms.
pub struct Matcher<'p, L, H> {
    prog: &'p Program,
    lines: &'p L,
    host: &'p H,
    table: ByteTable,
    flags: ExecFlags,
}

impl<'p, L: LineProvider, H: HostState> Matcher<'p, L, H> {
    pub fn new(prog: &'p Program, lines: &'p L, host: &'p H, flags: ExecFlags) -> Matcher<'p, L, H> {
        Matcher { prog, lines, host, table: ByteTable::new(), flags }
    }

    /// Search forward from `start`, returning the first match.
    pub fn exec(&self, start: Pos) -> Result<Option<MatchResult>, ExecError> {
        if !self.prog.magic_ok() {
            return Err(ExecError::Corrupt);
        }
        let mut pos = start;
        loop {
            if self.prog.reg_anch && pos.col != 0 {
                pos = match self.next_line_start(pos) {
                    Some(p) => p,
                    None => return Ok(None),
                };
                continue;
            }
            if let Some(b) = self.prog.reg_start {
                match self.find_byte_on_line(pos, b) {
                    Some(p) => pos = p,
                    None => {
                        pos = match self.next_line_start(pos) {
                            Some(p) => p,
                            None => return Ok(None),
                        };
                        continue;
                    }
                }
            }
            if self.flags.max_col > 0 && pos.col as usize >= self.flags.max_col {
                return Ok(None);
            }
            if let Some(result) = self.try_at(pos)? {
                return Ok(Some(result));
            }
            pos = match self.advance_one(pos) {
                Some(p) => p,
                None => return Ok(None),
            };
        }
    }

    fn next_line_start(&self, pos: Pos) -> Option<Pos> {
        let next = pos.lnum + 1;
        if next < self.lines.max_line_count() {
            Some(Pos { lnum: next, col: 0 })
        } else {
            None
        }
    }

    fn advance_one(&self, pos: Pos) -> Option<Pos> {
        let line = self.lines.get_line(pos.lnum)?;
        if (pos.col as usize) < line.len() {
            Some(Pos { lnum: pos.lnum, col: pos.col + 1 })
        } else {
            self.next_line_start(pos)
        }
    }

    fn find_byte_on_line(&self, pos: Pos, b: u8) -> Option<Pos> {
        let line = self.lines.get_line(pos.lnum)?;
        let start = pos.col as usize;
        if start > line.len() {
            return None;
        }
        let needle = if self.flags.ignore_case { self.table.fold(b) } else { b };
        let rest = &line[start..];
        let idx = if self.flags.ignore_case {
            rest.iter().position(|&c| self.table.fold(c) == needle)
        } else {
            memchr::memchr(b, rest)
        };
        idx.map(|i| Pos { lnum: pos.lnum, col: pos.col + i as i64 })
    }

    /// Try to match the whole program starting exactly at `pos`.
    fn try_at(&self, pos: Pos) -> Result<Option<MatchResult>, ExecError> {
        let mut state = State::new(self.prog.num_braces);
        state.open[0] = Some(pos);
        let mut stack: Vec<Job> = vec![Job::Try(self.prog.start_pc, pos)];
        let budget = (self.flags.max_pattern_memory_kb as usize).saturating_mul(1024);
        let job_cost = std::mem::size_of::<Job>();

        while let Some(job) = stack.pop() {
            if stack.len().saturating_mul(job_cost) > budget && budget > 0 {
                return Err(ExecError::TooMuchMemory);
            }
            match job {
                Job::RestoreSave(slot, old_slot, old_open) => {
                    state.slots[slot] = old_slot;
                    state.open[slot] = old_open;
                }
                Job::RestoreExt(slot, old_ext, old_open) => {
                    state.ext[slot] = old_ext;
                    state.ext_open[slot] = old_open;
                }
                Job::RestoreBrace(id, old_count, old_pos) => {
                    state.brace_count[id] = old_count;
                    state.brace_last_pos[id] = old_pos;
                }
                Job::GrowBrace(id, body, pos) => {
                    let count = state.brace_count[id];
                    stack.push(Job::RestoreBrace(id, count, state.brace_last_pos[id]));
                    state.brace_count[id] = count + 1;
                    state.brace_last_pos[id] = Some(pos);
                    if let Outcome::Matched(_) = self.step(body, pos, true, &mut state, &mut stack)? {
                        return Ok(Some(self.finish(&state)));
                    }
                }
                Job::Try(pc, pos) => {
                    if let Outcome::Matched(_) = self.step(pc, pos, true, &mut state, &mut stack)? {
                        return Ok(Some(self.finish(&state)));
                    }
                }
            }
        }
        Ok(None)
    }

    fn finish(&self, state: &State) -> MatchResult {
        let lines_matched = match state.slots[0] {
            SubMatch::Multi { start_line, end_line, .. } => (end_line - start_line).max(0) as usize,
            _ => 0,
        };
        MatchResult { slots: state.slots, ext: state.ext.clone(), lines_matched }
    }

    /// Run the instruction graph starting at `pc`/`pos`, pushing
    /// alternative continuations onto `stack` rather than recursing.
    /// `top_level` controls whether reaching `Inst::End` closes capture
    /// slot 0 (a lookaround body's `End` just means "the body matched
    /// here"; it never owns the overall match's boundaries).
    fn step(
        &self,
        mut pc: Pc,
        mut pos: Pos,
        top_level: bool,
        state: &mut State,
        stack: &mut Vec<Job>,
    ) -> Result<Outcome, ExecError> {
        loop {
            trace!("step pc={} pos={:?}", pc, pos);
            match &self.prog.insts[pc] {
                Inst::End => {
                    if top_level && !state.slots[0].is_set() {
                        self.close_slot(state, 0, pos);
                    }
                    return Ok(Outcome::Matched(pos));
                }
                Inst::Nop { goto } => pc = *goto,
                Inst::EmptyLook { goto, look } => {
                    if self.empty_look_matches(*look, pos) {
                        pc = *goto;
                    } else {
                        return Ok(Outcome::Failed);
                    }
                }
                Inst::Cursor { goto } => match self.host.cursor() {
                    Some(c) if c == pos => pc = *goto,
                    _ => return Ok(Outcome::Failed),
                },
                Inst::Visual { goto } => match self.host.visual() {
                    Some((a, b)) if pos_between(pos, a, b) => pc = *goto,
                    _ => return Ok(Outcome::Failed),
                },
                Inst::Mark { goto, mark, cmp } => match self.host.mark(*mark) {
                    Some(m) => {
                        if cmp_pos(pos, m, *cmp) {
                            pc = *goto;
                        } else {
                            return Ok(Outcome::Failed);
                        }
                    }
                    None => return Ok(Outcome::Failed),
                },
                Inst::LineCmp { goto, n, cmp } => {
                    if cmp_num(pos.lnum + 1, *n, *cmp) {
                        pc = *goto;
                    } else {
                        return Ok(Outcome::Failed);
                    }
                }
                Inst::ColCmp { goto, n, cmp } => {
                    if cmp_num(pos.col + 1, *n, *cmp) {
                        pc = *goto;
                    } else {
                        return Ok(Outcome::Failed);
                    }
                }
                Inst::VColCmp { goto, n, cmp } => {
                    if cmp_num(pos.col + 1, *n, *cmp) {
                        pc = *goto;
                    } else {
                        return Ok(Outcome::Failed);
                    }
                }
                Inst::Bhpos { goto } => pc = *goto,
                Inst::Exact { goto, bytes } => match self.match_byte(pos, bytes[0]) {
                    Some(next) => {
                        pc = *goto;
                        pos = next;
                    }
                    None => return Ok(Outcome::Failed),
                },
                Inst::MultiByte { goto, ch } => match self.match_char(pos, *ch) {
                    Some(next) => {
                        pc = *goto;
                        pos = next;
                    }
                    None => return Ok(Outcome::Failed),
                },
                Inst::Any { goto, add_nl } => match self.match_any(pos, *add_nl) {
                    Some(next) => {
                        pc = *goto;
                        pos = next;
                    }
                    None => return Ok(Outcome::Failed),
                },
                Inst::AnyOf { goto, set, add_nl } => match self.match_set(pos, set, false, *add_nl) {
                    Some(next) => {
                        pc = *goto;
                        pos = next;
                    }
                    None => return Ok(Outcome::Failed),
                },
                Inst::AnyBut { goto, set, add_nl } => match self.match_set(pos, set, true, *add_nl) {
                    Some(next) => {
                        pc = *goto;
                        pos = next;
                    }
                    None => return Ok(Outcome::Failed),
                },
                Inst::Class { goto, class, negated, no_digit, add_nl } => {
                    match self.match_class(pos, *class, *negated, *no_digit, *add_nl) {
                        Some(next) => {
                            pc = *goto;
                            pos = next;
                        }
                        None => return Ok(Outcome::Failed),
                    }
                }
                Inst::Branch { body, alt } => {
                    if let Some(alt_pc) = alt {
                        stack.push(Job::Try(*alt_pc, pos));
                    }
                    pc = *body;
                }
                Inst::Repeat { operand, goto, min, max, greedy } => {
                    self.step_repeat(*operand, *goto, *min, *max, *greedy, pos, stack);
                    return Ok(Outcome::Failed);
                }
                Inst::RepeatComplex { id, body, goto, min, max, greedy } => {
                    let count = state.brace_count[*id];
                    if count < *min {
                        stack.push(Job::RestoreBrace(*id, count, state.brace_last_pos[*id]));
                        state.brace_count[*id] = count + 1;
                        pc = *body;
                        continue;
                    }
                    let can_grow = max.map_or(true, |m| count < m)
                        && state.brace_last_pos[*id] != Some(pos);
                    if *greedy {
                        if can_grow {
                            stack.push(Job::Try(*goto, pos));
                            stack.push(Job::RestoreBrace(*id, count, state.brace_last_pos[*id]));
                            state.brace_count[*id] = count + 1;
                            state.brace_last_pos[*id] = Some(pos);
                            pc = *body;
                        } else {
                            pc = *goto;
                        }
                    } else {
                        if can_grow {
                            stack.push(Job::GrowBrace(*id, *body, pos));
                        }
                        pc = *goto;
                    }
                }
                Inst::Save { goto, slot, is_close } => {
                    let slot = *slot;
                    stack.push(Job::RestoreSave(slot, state.slots[slot], state.open[slot]));
                    if *is_close {
                        self.close_slot(state, slot, pos);
                    } else {
                        state.open[slot] = Some(pos);
                    }
                    pc = *goto;
                }
                Inst::ExtSave { goto, slot, is_close } => {
                    let slot = *slot - 1;
                    stack.push(Job::RestoreExt(slot, state.ext[slot].clone(), state.ext_open[slot]));
                    if *is_close {
                        if let Some(open) = state.ext_open[slot] {
                            state.ext[slot] = self.slice_between(open, pos);
                        }
                    } else {
                        state.ext_open[slot] = Some(pos);
                    }
                    pc = *goto;
                }
                Inst::Backref { goto, slot } => {
                    match self.match_backref(pos, state.slots[*slot], state.open[*slot]) {
                        Some(next) => {
                            pc = *goto;
                            pos = next;
                        }
                        None => return Ok(Outcome::Failed),
                    }
                }
                Inst::ZRef { goto, slot } => {
                    let idx = *slot - 1;
                    match state.ext[idx].clone() {
                        Some(text) => match self.match_literal_run(pos, &text) {
                            Some(next) => {
                                pc = *goto;
                                pos = next;
                            }
                            None => return Ok(Outcome::Failed),
                        },
                        None => return Ok(Outcome::Failed),
                    }
                }
                Inst::Look { goto, body, kind } => {
                    let body = *body;
                    match kind {
                        LookKind::Positive => {
                            if self.submatch(body, pos)?.is_some() {
                                pc = *goto;
                            } else {
                                return Ok(Outcome::Failed);
                            }
                        }
                        LookKind::Negative => {
                            if self.submatch(body, pos)?.is_none() {
                                pc = *goto;
                            } else {
                                return Ok(Outcome::Failed);
                            }
                        }
                        LookKind::Atomic => match self.submatch(body, pos)? {
                            Some(end) => {
                                pc = *goto;
                                pos = end;
                            }
                            None => return Ok(Outcome::Failed),
                        },
                    }
                }
                Inst::Behind { goto, body, negate } => {
                    let found = self.find_behind_start(*body, pos)?;
                    if found.is_some() != *negate {
                        pc = *goto;
                    } else {
                        return Ok(Outcome::Failed);
                    }
                }
            }
        }
    }

    fn close_slot(&self, state: &mut State, slot: usize, pos: Pos) {
        let open = state.open[slot].unwrap_or(pos);
        state.slots[slot] = if open.lnum == pos.lnum {
            SubMatch::Single { start: open.col as usize, end: pos.col as usize }
        } else {
            SubMatch::Multi {
                start_line: open.lnum,
                start_col: open.col as usize,
                end_line: pos.lnum,
                end_col: pos.col as usize,
            }
        };
    }

    fn slice_between(&self, open: Pos, pos: Pos) -> Option<Rc<[u8]>> {
        if open.lnum != pos.lnum {
            // An external capture spanning multiple lines has no single
            // contiguous byte slice to hand back; drop it.
            return None;
        }
        let line = self.lines.get_line(open.lnum)?;
        let (s, e) = (open.col as usize, pos.col as usize);
        if s > e || e > line.len() {
            return None;
        }
        Some(Rc::from(&line[s..e]))
    }

    /// Run `body` (a lookaround's compiled sub-graph, terminated by its
    /// own private `End`) starting at `pos`, on its own stack. Returns the
    /// position the body's first successful path reached.
    fn submatch(&self, body: Pc, pos: Pos) -> Result<Option<Pos>, ExecError> {
        let mut state = State::new(self.prog.num_braces);
        let mut stack: Vec<Job> = vec![Job::Try(body, pos)];
        while let Some(job) = stack.pop() {
            match job {
                Job::RestoreSave(slot, old, old_open) => {
                    state.slots[slot] = old;
                    state.open[slot] = old_open;
                }
                Job::RestoreExt(slot, old, old_open) => {
                    state.ext[slot] = old;
                    state.ext_open[slot] = old_open;
                }
                Job::RestoreBrace(id, old_count, old_pos) => {
                    state.brace_count[id] = old_count;
                    state.brace_last_pos[id] = old_pos;
                }
                Job::GrowBrace(id, body, pos) => {
                    let count = state.brace_count[id];
                    stack.push(Job::RestoreBrace(id, count, state.brace_last_pos[id]));
                    state.brace_count[id] = count + 1;
                    state.brace_last_pos[id] = Some(pos);
                    if let Outcome::Matched(end) = self.step(body, pos, false, &mut state, &mut stack)? {
                        return Ok(Some(end));
                    }
                }
                Job::Try(pc, pos) => {
                    if let Outcome::Matched(end) = self.step(pc, pos, false, &mut state, &mut stack)? {
                        return Ok(Some(end));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Backward scan for `\@<=`/`\@<!`: try progressively earlier starting
    /// columns on the current line, accepting the first one whose body
    /// matches ending exactly at `pos`. Does not cross line boundaries
    /// (see DESIGN.md).
    fn find_behind_start(&self, body: Pc, pos: Pos) -> Result<Option<Pos>, ExecError> {
        let mut col = pos.col;
        loop {
            let candidate = Pos { lnum: pos.lnum, col };
            if let Some(end) = self.submatch(body, candidate)? {
                if end == pos {
                    return Ok(Some(candidate));
                }
            }
            if col == 0 {
                return Ok(None);
            }
            col -= 1;
        }
    }

    /// `regrepeat`-style greedy/lazy count scan for a "simple" single-node
    /// quantified atom. Pushes one fallback `Job` per
    /// viable repeat count, ordered so the stack pops them longest-first
    /// (greedy) or shortest-first (lazy); never matches inline, since the
    /// caller (`step`) always treats this instruction as a dead end that
    /// defers entirely to the pushed jobs.
    fn step_repeat(
        &self,
        operand: Pc,
        goto: Pc,
        min: u32,
        max: Option<u32>,
        greedy: bool,
        pos: Pos,
        stack: &mut Vec<Job>,
    ) {
        let inst = &self.prog.insts[operand];
        let mut positions = vec![pos];
        let mut cur = pos;
        let limit = max.unwrap_or(u32::MAX);
        while (positions.len() as u32) <= limit {
            match self.match_one(inst, cur) {
                Some(next) if next != cur => {
                    cur = next;
                    positions.push(cur);
                }
                _ => break,
            }
        }
        let run = positions.len() as u32 - 1;
        if run < min {
            return;
        }
        if greedy {
            for k in min..=run {
                stack.push(Job::Try(goto, positions[k as usize]));
            }
        } else {
            for k in (min..=run).rev() {
                stack.push(Job::Try(goto, positions[k as usize]));
            }
        }
    }

    fn empty_look_matches(&self, look: crate::inst::EmptyLook, pos: Pos) -> bool {
        use crate::inst::EmptyLook::*;
        let line = match self.lines.get_line(pos.lnum) {
            Some(l) => l,
            None => return matches!(look, Eof),
        };
        let col = pos.col as usize;
        match look {
            Bol => col == 0,
            Eol | Newl => col >= line.len(),
            Bof => pos.lnum == 0 && col == 0,
            Eof => pos.lnum >= self.lines.max_line_count() - 1 && col >= line.len(),
            Bow => {
                let at_word = col < line.len() && self.is_word(line[col]);
                let prev_word = col > 0 && self.is_word(line[col - 1]);
                at_word && !prev_word
            }
            Eow => {
                let prev_word = col > 0 && self.is_word(line[col - 1]);
                let at_word = col < line.len() && self.is_word(line[col]);
                prev_word && !at_word
            }
        }
    }

    fn is_word(&self, b: u8) -> bool {
        self.host.is_keyword_byte(b) || self.table.is_word(b)
    }

    /// Whether `\Z` was seen in the pattern or the caller set
    /// `ExecFlags::ignore_combine` — either one turns combine-ignore on,
    /// the same way `'ignorecase'` and `\c` both turn on case-folding.
    fn ignore_combine(&self) -> bool {
        self.flags.ignore_combine || self.prog.flags.combine_ignore
    }

    /// Reduce a Hebrew presentation-form code point to its single-char
    /// base letter under combine-ignore, so e.g. a yod-with-hiriq
    /// ligature compares equal to a bare yod. Multi-char decompositions
    /// (true ligatures) aren't folded here since a single `match_char`
    /// call only ever consumes one source position; see DESIGN.md.
    fn combine_base(&self, c: char) -> char {
        if self.ignore_combine() {
            match decompose_hebrew(c) {
                Some(&[base]) => base,
                _ => c,
            }
        } else {
            c
        }
    }

    fn match_byte(&self, pos: Pos, want: u8) -> Option<Pos> {
        let line = self.lines.get_line(pos.lnum)?;
        let col = pos.col as usize;
        let b = *line.get(col)?;
        let matches = if self.flags.ignore_case {
            self.table.fold(b) == self.table.fold(want)
        } else {
            b == want
        };
        if matches {
            Some(Pos { lnum: pos.lnum, col: pos.col + 1 })
        } else {
            None
        }
    }

    fn match_char(&self, pos: Pos, want: char) -> Option<Pos> {
        let line = self.lines.get_line(pos.lnum)?;
        let col = pos.col as usize;
        let (ch, width) = decode_char(line, col)?;
        let (ch, want) = (self.combine_base(ch), self.combine_base(want));
        let eq = if self.flags.ignore_case {
            ch.to_lowercase().eq(want.to_lowercase())
        } else {
            ch == want
        };
        if eq {
            Some(Pos { lnum: pos.lnum, col: pos.col + width as i64 })
        } else {
            None
        }
    }

    fn match_any(&self, pos: Pos, add_nl: bool) -> Option<Pos> {
        let line = self.lines.get_line(pos.lnum)?;
        let col = pos.col as usize;
        if col < line.len() {
            let width = utf8_width(line[col]).min(line.len() - col);
            Some(Pos { lnum: pos.lnum, col: pos.col + width as i64 })
        } else if add_nl {
            self.next_line_start(pos)
        } else {
            None
        }
    }

    fn match_set(&self, pos: Pos, set: &[u8], negate: bool, add_nl: bool) -> Option<Pos> {
        let line = self.lines.get_line(pos.lnum)?;
        let col = pos.col as usize;
        if col < line.len() {
            let b = line[col];
            let in_set = if self.flags.ignore_case {
                set.iter().any(|&s| self.table.fold(s) == self.table.fold(b))
            } else {
                set.contains(&b)
            };
            if in_set != negate {
                return Some(Pos { lnum: pos.lnum, col: pos.col + 1 });
            }
            None
        } else if add_nl {
            self.next_line_start(pos)
        } else {
            None
        }
    }

    fn match_class(
        &self,
        pos: Pos,
        class: crate::chartab::CharClass,
        negated: bool,
        no_digit: bool,
        add_nl: bool,
    ) -> Option<Pos> {
        let line = self.lines.get_line(pos.lnum)?;
        let col = pos.col as usize;
        if col < line.len() {
            let b = line[col];
            let m = class.matches(b, &self.table, no_digit);
            if m != negated {
                return Some(Pos { lnum: pos.lnum, col: pos.col + 1 });
            }
            None
        } else if add_nl {
            self.next_line_start(pos)
        } else {
            None
        }
    }

    /// Compare the input at `pos` against a previously captured group.
    /// `open` is the capture's recorded opening position, which (unlike
    /// `slot` itself) survives past the close and tells us which line the
    /// captured bytes actually live on. Multi-line captures aren't
    /// supported as backref sources (see DESIGN.md).
    fn match_backref(&self, pos: Pos, slot: SubMatch, open: Option<Pos>) -> Option<Pos> {
        let (start, end) = slot.single_range()?;
        let open = open?;
        let text = self.lines.get_line(open.lnum)?;
        if end > text.len() {
            return None;
        }
        let needle = text[start..end].to_vec();
        self.match_literal_run(pos, &needle)
    }

    fn match_literal_run(&self, pos: Pos, text: &[u8]) -> Option<Pos> {
        let line = self.lines.get_line(pos.lnum)?;
        let col = pos.col as usize;
        if col + text.len() > line.len() {
            return None;
        }
        let slice = &line[col..col + text.len()];
        let eq = if self.flags.ignore_case {
            slice.iter().zip(text).all(|(&a, &b)| self.table.fold(a) == self.table.fold(b))
        } else {
            slice == text
        };
        if eq {
            Some(Pos { lnum: pos.lnum, col: pos.col + text.len() as i64 })
        } else {
            None
        }
    }

    /// A single-unit match against a "simple" instruction, used by
    /// `Inst::Repeat`'s greedy/lazy count scan.
    fn match_one(&self, inst: &Inst, pos: Pos) -> Option<Pos> {
        match inst {
            Inst::Exact { bytes, .. } => self.match_byte(pos, bytes[0]),
            Inst::MultiByte { ch, .. } => self.match_char(pos, *ch),
            Inst::Any { add_nl, .. } => self.match_any(pos, *add_nl),
            Inst::AnyOf { set, add_nl, .. } => self.match_set(pos, set, false, *add_nl),
            Inst::AnyBut { set, add_nl, .. } => self.match_set(pos, set, true, *add_nl),
            Inst::Class { class, negated, no_digit, add_nl, .. } => {
                self.match_class(pos, *class, *negated, *no_digit, *add_nl)
            }
            _ => None,
        }
    }
}

/// Result of running `step` to its next dead end or to `Inst::End`.
enum Outcome {
    Matched(Pos),
    Failed,
}

fn decode_char(line: &[u8], col: usize) -> Option<(char, usize)> {
    if col >= line.len() {
        return None;
    }
    let width = utf8_width(line[col]).min(line.len() - col);
    std::str::from_utf8(&line[col..col + width]).ok()?.chars().next().map(|c| (c, c.len_utf8()))
}

fn utf8_width(first: u8) -> usize {
    if first & 0x80 == 0 {
        1
    } else if first & 0xE0 == 0xC0 {
        2
    } else if first & 0xF0 == 0xE0 {
        3
    } else if first & 0xF8 == 0xF0 {
        4
    } else {
        1
    }
}

fn cmp_num(have: i64, want: i64, cmp: Cmp) -> bool {
    match cmp {
        Cmp::Less => have < want,
        Cmp::Equal => have == want,
        Cmp::Greater => have > want,
    }
}

fn cmp_pos(have: Pos, want: Pos, cmp: Cmp) -> bool {
    match cmp {
        Cmp::Less => (have.lnum, have.col) < (want.lnum, want.col),
        Cmp::Equal => have == want,
        Cmp::Greater => (have.lnum, have.col) > (want.lnum, want.col),
    }
}

fn pos_between(pos: Pos, a: Pos, b: Pos) -> bool {
    let (lo, hi) = if (a.lnum, a.col) <= (b.lnum, b.col) { (a, b) } else { (b, a) };
    (lo.lnum, lo.col) <= (pos.lnum, pos.col) && (pos.lnum, pos.col) <= (hi.lnum, hi.col)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::Compiler;
    use crate::host::NoHost;
    use crate::input::{SliceLines, StringLines};
    use crate::options::CompileFlags;

    fn compile(p: &str) -> Program {
        Compiler::compile(p.as_bytes(), CompileFlags { magic: true, ..Default::default() }).unwrap()
    }

    fn find(prog: &Program, text: &str) -> Option<MatchResult> {
        let lines = StringLines::new(text.as_bytes());
        prog.exec(&lines, Pos { lnum: 0, col: 0 }, ExecFlags::default()).unwrap()
    }

    #[test]
    fn literal_matches() {
        let prog = compile("foo");
        let m = find(&prog, "a foo b").unwrap();
        assert_eq!(m.slots[0].single_range(), Some((2, 5)));
    }

    #[test]
    fn literal_fails_when_absent() {
        let prog = compile("foo");
        assert!(find(&prog, "a bar b").is_none());
    }

    #[test]
    fn greedy_star_takes_longest() {
        let prog = compile("a*");
        let m = find(&prog, "aaab").unwrap();
        assert_eq!(m.slots[0].single_range(), Some((0, 3)));
    }

    #[test]
    fn lazy_star_takes_shortest() {
        let prog = compile("a\\{-}");
        let m = find(&prog, "aaab").unwrap();
        assert_eq!(m.slots[0].single_range(), Some((0, 0)));
    }

    #[test]
    fn capture_group_records_range() {
        let prog = compile("a\\(bc\\)d");
        let m = find(&prog, "xabcdx").unwrap();
        assert_eq!(m.slots[0].single_range(), Some((1, 5)));
        assert_eq!(m.slots[1].single_range(), Some((2, 4)));
    }

    #[test]
    fn backreference_requires_equal_text() {
        let prog = compile("\\(ab\\)\\1");
        assert!(find(&prog, "abab").is_some());
        assert!(find(&prog, "abcd").is_none());
    }

    #[test]
    fn positive_lookahead_does_not_consume() {
        let prog = compile("foo\\(bar\\)\\@=");
        let m = find(&prog, "foobar").unwrap();
        assert_eq!(m.slots[0].single_range(), Some((0, 3)));
    }

    #[test]
    fn negative_lookahead_rejects_match() {
        let prog = compile("foo\\(bar\\)\\@!");
        assert!(find(&prog, "foobar").is_none());
        assert!(find(&prog, "foobaz").is_some());
    }

    #[test]
    fn lookbehind_anchors_without_consuming() {
        let prog = compile("\\(foo\\)\\@<=bar");
        let m = find(&prog, "foobar").unwrap();
        assert_eq!(m.slots[0].single_range(), Some((3, 6)));
    }

    #[test]
    fn anchored_pattern_only_matches_at_bol() {
        let prog = compile("^foo");
        assert!(find(&prog, "foo bar").is_some());
        assert!(find(&prog, "xfoo bar").is_none());
    }

    #[test]
    fn word_boundary_atoms_respect_boundaries() {
        let prog = compile("\\<cat\\>");
        assert!(find(&prog, "a cat sat").is_some());
        assert!(find(&prog, "concatenate").is_none());
    }

    #[test]
    fn ignore_case_flag_folds_ascii() {
        let prog = compile("foo");
        let lines = StringLines::new(b"FOO");
        let flags = ExecFlags { ignore_case: true, ..Default::default() };
        let m = prog.exec(&lines, Pos { lnum: 0, col: 0 }, flags).unwrap();
        assert!(m.is_some());
    }

    #[test]
    fn multi_line_buffer_match_spans_lines() {
        let prog = compile("foo\\_sbar");
        let data = vec![b"xxfoo".to_vec(), b"bar yy".to_vec()];
        let lines = SliceLines::new(&data);
        let m = prog
            .exec(&lines, Pos { lnum: 0, col: 0 }, ExecFlags::default())
            .unwrap()
            .unwrap();
        match m.slots[0] {
            SubMatch::Multi { start_line, start_col, end_line, end_col } => {
                assert_eq!((start_line, start_col), (0, 2));
                assert_eq!((end_line, end_col), (1, 3));
            }
            _ => panic!("expected a multi-line match"),
        }
    }

    #[test]
    fn no_host_degrades_cursor_atom_to_nomatch() {
        let prog = compile("\\%#foo");
        let lines = StringLines::new(b"foo");
        let m = prog
            .exec_with_host(&lines, &NoHost, Pos { lnum: 0, col: 0 }, ExecFlags::default())
            .unwrap();
        assert!(m.is_none());
    }
}
