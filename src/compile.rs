// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The compiler: a recursive-descent grammar matching
//! `alt = concat ('|' concat)*` etc., emitting directly into a `Vec<Inst>`.
//!
//! A single pass over an explicit `Frag`/hole-patching scheme (the same
//! "dangling out-edge" technique `Inst::Save`/`Inst::Split`-style graphs
//! imply) is enough here since instructions land in a growable `Vec`
//! rather than a fixed-size byte buffer that needs its size known up
//! front; see DESIGN.md.

use log::{debug, trace};

use crate::chartab::{self, ByteTable};
use crate::error::Error;
use crate::inst::{EmptyLook, Inst, LookKind, Pc};
use crate::lexer::{Lexer, PercentAtom, Token};
use crate::options::CompileFlags;
use crate::program::{Program, ProgramFlags};

const MAX_GROUPS: usize = 9;
const MAX_EXT_GROUPS: usize = 9;
const MAX_COMPLEX_BRACES: usize = 10;

/// A compiled fragment: `entry` is the pc to jump into, `holes` are the
/// pcs whose `goto` field is still dangling and must be patched to
/// whatever comes next once that's known.
struct Frag {
    entry: Pc,
    holes: Vec<Pc>,
}

/// Flags bubbled up the grammar (`HASWIDTH`, `SIMPLE`, `HASNL`, `HASLOOKBH`).
#[derive(Clone, Copy, Debug, Default)]
struct FragInfo {
    haswidth: bool,
    simple: bool,
    hasnl: bool,
    haslookbh: bool,
}

pub struct Compiler<'t> {
    insts: Vec<Inst>,
    table: &'t ByteTable,
    flags: CompileFlags,
    next_group: usize,
    next_ext_group: usize,
    /// Shared id space for every `RepeatComplex` slot (both `\{m,n}` and
    /// non-SIMPLE `* + ?`) — each needs its own zero-width-loop bookkeeping
    /// slot in `backtrack::State`, which is sized to this count.
    next_brace_id: usize,
    /// How many of those ids came from an actual `\{m,n}` token. Only this
    /// count is capped at `MAX_COMPLEX_BRACES` (`E60`); `* + ?` nest as
    /// deeply as the pattern likes.
    complex_brace_count: usize,
    closed_groups: [bool; MAX_GROUPS + 1],
    prog_flags: ProgramFlags,
}

impl<'t> Compiler<'t> {
    pub fn new(flags: CompileFlags, table: &'t ByteTable) -> Compiler<'t> {
        Compiler {
            insts: Vec::new(),
            table,
            flags,
            next_group: 1,
            next_ext_group: 1,
            next_brace_id: 0,
            complex_brace_count: 0,
            closed_groups: [false; MAX_GROUPS + 1],
            prog_flags: ProgramFlags::default(),
        }
    }

    /// Compile `pattern` into a `Program`.
    pub fn compile(pattern: &[u8], flags: CompileFlags) -> Result<Program, Error> {
        let table = ByteTable::new();
        let mut c = Compiler::new(flags, &table);
        let mut lx = Lexer::new(pattern, flags.magicness());
        let (frag, info) = c.parse_alt(&mut lx)?;
        match lx.get()? {
            Token::Eof => {}
            Token::GroupClose => return Err(Error::UnmatchedClose),
            _ => return Err(Error::Internal("trailing tokens after pattern")),
        }
        let end_pc = c.push(Inst::End);
        c.patch(&frag.holes, end_pc);
        c.prog_flags.combine_ignore = lx.combine_ignore;
        if let Some(ic) = lx.ignore_case {
            if ic {
                c.prog_flags.ignore_case = true;
            } else {
                c.prog_flags.no_ignore_case = true;
            }
        }
        c.prog_flags.has_newline_match = info.hasnl;
        c.prog_flags.has_lookbehind = info.haslookbh;
        c.prog_flags.has_external_captures = c.next_ext_group > 1;
        debug!(
            "compiled pattern {:?}: {} insts, {} groups, {} ext groups",
            String::from_utf8_lossy(pattern),
            c.insts.len(),
            c.next_group - 1,
            c.next_ext_group - 1
        );
        Ok(Program::new(
            String::from_utf8_lossy(pattern).into_owned(),
            c.insts,
            frag.entry,
            c.next_group,
            c.next_ext_group - 1,
            c.next_brace_id,
            c.prog_flags,
        ))
    }

    fn push(&mut self, inst: Inst) -> Pc {
        self.insts.push(inst);
        self.insts.len() - 1
    }

    fn patch(&mut self, holes: &[Pc], target: Pc) {
        for &pc in holes {
            self.patch_one(pc, target);
        }
    }

    fn patch_one(&mut self, pc: Pc, target: Pc) {
        use Inst::*;
        match &mut self.insts[pc] {
            End => {}
            EmptyLook { goto, .. }
            | Cursor { goto }
            | Visual { goto }
            | Mark { goto, .. }
            | LineCmp { goto, .. }
            | ColCmp { goto, .. }
            | VColCmp { goto, .. }
            | Bhpos { goto }
            | Exact { goto, .. }
            | MultiByte { goto, .. }
            | Any { goto, .. }
            | AnyOf { goto, .. }
            | AnyBut { goto, .. }
            | Class { goto, .. }
            | Repeat { goto, .. }
            | RepeatComplex { goto, .. }
            | Save { goto, .. }
            | Nop { goto }
            | ExtSave { goto, .. }
            | Backref { goto, .. }
            | ZRef { goto, .. }
            | Look { goto, .. }
            | Behind { goto, .. } => {
                *goto = target;
            }
            // `parse_opt_sequence` leaves a branch's "skip this atom"
            // exit as a hole (its `alt` starts `None`); every other
            // branch producer (`parse_alt`) already knows both
            // successors up front and never hands one back as a hole.
            Branch { alt, .. } => {
                *alt = Some(target);
            }
        }
    }

    // alt = and ('|' and)*
    fn parse_alt(&mut self, lx: &mut Lexer) -> Result<(Frag, FragInfo), Error> {
        let mut branches = vec![self.parse_and(lx)?];
        loop {
            match lx.get()? {
                Token::Pipe => {
                    branches.push(self.parse_and(lx)?);
                }
                other => {
                    lx.push_back(other);
                    break;
                }
            }
        }
        if branches.len() == 1 {
            return Ok(branches.remove(0));
        }
        let mut holes = Vec::new();
        let mut info = FragInfo { haswidth: true, simple: false, hasnl: false, haslookbh: false };
        // every branch must match for info.haswidth to stay true -- a
        // conservative "worst case" fold across alternatives.
        let mut frags = Vec::with_capacity(branches.len());
        for (f, i) in branches {
            info.haswidth &= i.haswidth;
            info.hasnl |= i.hasnl;
            info.haslookbh |= i.haslookbh;
            frags.push(f);
        }
        let mut next_branch: Option<Pc> = None;
        for frag in frags.into_iter().rev() {
            holes.extend(frag.holes);
            let bpc = self.push(Inst::Branch { body: frag.entry, alt: next_branch });
            next_branch = Some(bpc);
        }
        Ok((Frag { entry: next_branch.unwrap(), holes }, info))
    }

    // and = concat ('&' concat)*
    //
    // `\&`: every concat but the last must match at the
    // current position, as a zero-width positive lookahead; only the
    // last concat's match is actually consumed.
    fn parse_and(&mut self, lx: &mut Lexer) -> Result<(Frag, FragInfo), Error> {
        let mut concats = vec![self.parse_concat(lx)?];
        loop {
            match lx.get()? {
                Token::Amp => {
                    concats.push(self.parse_concat(lx)?);
                }
                other => {
                    lx.push_back(other);
                    break;
                }
            }
        }
        if concats.len() == 1 {
            return Ok(concats.remove(0));
        }
        let last = concats.pop().unwrap();
        let mut info = FragInfo { haswidth: false, simple: false, hasnl: false, haslookbh: false };
        let mut entry: Option<Pc> = None;
        let mut prev_hole: Option<Pc> = None;
        for (body, i) in concats {
            info.hasnl |= i.hasnl;
            let end_pc = self.push(Inst::End);
            self.patch(&body.holes, end_pc);
            let look_pc = self.push(Inst::Look { goto: usize::MAX, body: body.entry, kind: LookKind::Positive });
            if entry.is_none() {
                entry = Some(look_pc);
            }
            if let Some(h) = prev_hole {
                self.patch_one(h, look_pc);
            }
            prev_hole = Some(look_pc);
        }
        let (last_frag, last_info) = last;
        if let Some(h) = prev_hole {
            self.patch_one(h, last_frag.entry);
        }
        info.haswidth = last_info.haswidth;
        info.hasnl |= last_info.hasnl;
        info.haslookbh = true;
        let final_entry = entry.unwrap_or(last_frag.entry);
        Ok((Frag { entry: final_entry, holes: last_frag.holes }, info))
    }

    // concat = piece*
    fn parse_concat(&mut self, lx: &mut Lexer) -> Result<(Frag, FragInfo), Error> {
        let mut acc: Option<(Frag, FragInfo)> = None;
        loop {
            let tok = lx.get()?;
            match tok {
                Token::Eof | Token::Pipe | Token::Amp | Token::GroupClose => {
                    lx.push_back(tok);
                    break;
                }
                _ => {
                    lx.push_back(tok);
                    let piece = self.parse_piece(lx)?;
                    acc = Some(match acc {
                        None => piece,
                        Some((af, ai)) => {
                            let (pf, pi) = piece;
                            self.patch(&af.holes, pf.entry);
                            let info = FragInfo {
                                haswidth: ai.haswidth || pi.haswidth,
                                simple: false,
                                hasnl: ai.hasnl || pi.hasnl,
                                haslookbh: ai.haslookbh || pi.haslookbh,
                            };
                            (Frag { entry: af.entry, holes: pf.holes }, info)
                        }
                    });
                }
            }
        }
        match acc {
            Some(v) => Ok(v),
            None => {
                // empty concat: NOTHING-equivalent, a single Nop.
                let pc = self.push(Inst::Nop { goto: usize::MAX });
                Ok((
                    Frag { entry: pc, holes: vec![pc] },
                    FragInfo { haswidth: false, simple: true, hasnl: false, haslookbh: false },
                ))
            }
        }
    }

    // piece = atom ('@' lookaround-kind)? quant?
    fn parse_piece(&mut self, lx: &mut Lexer) -> Result<(Frag, FragInfo), Error> {
        let (mut atom, mut info) = self.parse_atom(lx)?;
        if let Some(is_behind) = self.wrap_lookaround(&mut atom, lx)? {
            info.simple = false;
            info.haslookbh |= is_behind;
            return Ok((atom, info));
        }
        let tok = lx.get()?;
        match tok {
            Token::Star => self.apply_quant(atom, &mut info, 0, None, true, false),
            Token::Plus => self.apply_quant(atom, &mut info, 1, None, true, false),
            Token::Opt => self.apply_quant(atom, &mut info, 0, Some(1), true, false),
            Token::BraceOpen => {
                let (min, max, greedy) = self.parse_brace_limits(lx)?;
                self.apply_quant(atom, &mut info, min, max, greedy, true)
            }
            other => {
                lx.push_back(other);
                Ok((atom, info))
            }
        }
    }

    fn apply_quant(
        &mut self,
        atom: Frag,
        info: &mut FragInfo,
        min: u32,
        max: Option<u32>,
        greedy: bool,
        is_brace: bool,
    ) -> Result<(Frag, FragInfo), Error> {
        let is_simple = info.simple && atom.holes == [atom.entry];
        info.haswidth = min > 0 && info.haswidth;
        let frag = if is_simple {
            let pc = self.push(Inst::Repeat { operand: atom.entry, goto: usize::MAX, min, max, greedy });
            Frag { entry: pc, holes: vec![pc] }
        } else {
            if is_brace {
                self.complex_brace_count += 1;
                if self.complex_brace_count > MAX_COMPLEX_BRACES {
                    return Err(Error::TooManyComplexBraces);
                }
            }
            let id = self.next_brace_id;
            self.next_brace_id += 1;
            let pc = self.push(Inst::RepeatComplex {
                id,
                body: atom.entry,
                goto: usize::MAX,
                min,
                max,
                greedy,
            });
            self.patch(&atom.holes, pc);
            Frag { entry: pc, holes: vec![pc] }
        };
        info.simple = false;
        Ok((frag, *info))
    }

    fn parse_brace_limits(&mut self, lx: &mut Lexer) -> Result<(u32, Option<u32>, bool), Error> {
        let mut greedy = true;
        // `{-m,n}` shortest-first: a leading '-' inside the braces. We
        // detect it by peeking at the raw literal token stream via the
        // lexer producing Token::Literal(b'-').
        let mut min: Option<u32> = None;
        let mut max: Option<u32> = None;
        let mut saw_comma = false;
        loop {
            match lx.get()? {
                Token::BraceClose => break,
                Token::Literal(b'-') if min.is_none() && !saw_comma => {
                    greedy = false;
                }
                Token::Literal(b',') => {
                    saw_comma = true;
                }
                Token::Literal(b) if b.is_ascii_digit() => {
                    let mut n = (b - b'0') as u32;
                    loop {
                        match lx.get()? {
                            Token::Literal(b2) if b2.is_ascii_digit() => {
                                n = n.saturating_mul(10).saturating_add((b2 - b'0') as u32);
                            }
                            other => {
                                lx.push_back(other);
                                break;
                            }
                        }
                    }
                    if saw_comma {
                        max = Some(n);
                    } else {
                        min = Some(n);
                    }
                }
                _ => return Err(Error::BraceSyntax),
            }
        }
        // `\{}` bare (no digits at all) means the same as `*`: 0 or more.
        // `\{n}` means exactly n. `\{n,m}` / `\{n,}` / `\{,m}` take the
        // comma-separated bounds literally, missing bounds left open.
        let (min, max) = if !saw_comma {
            match min {
                Some(n) => (n, Some(n)),
                None => (0, None),
            }
        } else {
            (min.unwrap_or(0), max)
        };
        Ok((min, max, greedy))
    }

    // atom = anchor | char-class | '.' | '(' alt ')' | ... | literal
    fn parse_atom(&mut self, lx: &mut Lexer) -> Result<(Frag, FragInfo), Error> {
        let tok = lx.get()?;
        trace!("parse_atom: {:?}", tok);
        match tok {
            Token::Eof => Err(Error::Internal("unexpected end of pattern")),
            Token::Bol => self.leaf(Inst::EmptyLook { goto: usize::MAX, look: EmptyLook::Bol }, false, false),
            Token::Eol => self.leaf(Inst::EmptyLook { goto: usize::MAX, look: EmptyLook::Eol }, false, false),
            Token::AnyChar => self.leaf(Inst::Any { goto: usize::MAX, add_nl: false }, true, true),
            Token::Tilde => Err(Error::Internal("~ resolution happens before compile (regtilde)")),
            Token::WordStart => self.leaf(Inst::EmptyLook { goto: usize::MAX, look: EmptyLook::Bow }, false, false),
            Token::WordEnd => self.leaf(Inst::EmptyLook { goto: usize::MAX, look: EmptyLook::Eow }, false, false),
            Token::MatchStart => self.leaf(Inst::Save { goto: usize::MAX, slot: 0, is_close: false }, false, false),
            Token::MatchEnd => self.leaf(Inst::Save { goto: usize::MAX, slot: 0, is_close: true }, false, false),
            Token::Backref(n) => {
                let slot = n as usize;
                if slot == 0 || slot > MAX_GROUPS || !self.closed_groups[slot] {
                    return Err(Error::IllegalBackref);
                }
                self.leaf(Inst::Backref { goto: usize::MAX, slot }, true, false)
            }
            Token::ZRef(n) => {
                if !self.flags.allow_external_captures {
                    return Err(Error::ZNotAllowed);
                }
                self.leaf(Inst::ZRef { goto: usize::MAX, slot: n as usize }, true, false)
            }
            Token::ClassOpen => self.parse_bracket(lx),
            Token::Class { class, negated, no_digit, underscore } => {
                let pc = self.push(Inst::Class {
                    goto: usize::MAX,
                    class,
                    negated,
                    no_digit,
                    add_nl: underscore,
                });
                Ok((
                    Frag { entry: pc, holes: vec![pc] },
                    FragInfo { haswidth: true, simple: true, hasnl: underscore, haslookbh: false },
                ))
            }
            Token::Char(c) => {
                let pc = self.push(Inst::MultiByte { goto: usize::MAX, ch: c });
                Ok((
                    Frag { entry: pc, holes: vec![pc] },
                    FragInfo { haswidth: true, simple: true, hasnl: false, haslookbh: false },
                ))
            }
            Token::Literal(b) => {
                let pc = self.push(Inst::Exact { goto: usize::MAX, bytes: vec![b] });
                Ok((
                    Frag { entry: pc, holes: vec![pc] },
                    FragInfo { haswidth: true, simple: true, hasnl: false, haslookbh: false },
                ))
            }
            Token::GroupOpen => self.parse_group(lx, GroupKind::Capture),
            Token::GroupOpenNC => self.parse_group(lx, GroupKind::NonCapture),
            Token::GroupOpenExt => {
                if !self.flags.allow_external_captures {
                    return Err(Error::ZNotAllowed);
                }
                self.parse_group(lx, GroupKind::External)
            }
            Token::At => Err(Error::InvalidAfterAt),
            Token::Star => Err(Error::NestedStar),
            Token::Plus => Err(Error::NestedPlus),
            Token::Opt => Err(Error::NestedStar),
            Token::BraceOpen => Err(Error::NestedStar),
            Token::Percent(atom) => self.parse_percent_atom(atom),
            Token::Pipe | Token::Amp | Token::GroupClose | Token::BraceClose => {
                Err(Error::Internal("unexpected structural token in atom position"))
            }
        }
    }

    fn leaf(&mut self, inst: Inst, haswidth: bool, hasnl: bool) -> Result<(Frag, FragInfo), Error> {
        let pc = self.push(inst);
        Ok((
            Frag { entry: pc, holes: vec![pc] },
            FragInfo { haswidth, simple: false, hasnl, haslookbh: false },
        ))
    }

    fn parse_group(&mut self, lx: &mut Lexer, kind: GroupKind) -> Result<(Frag, FragInfo), Error> {
        let slot = match kind {
            GroupKind::Capture => {
                if self.next_group > MAX_GROUPS {
                    return Err(Error::TooManyOpen);
                }
                let s = self.next_group;
                self.next_group += 1;
                Some(s)
            }
            GroupKind::External => {
                if self.next_ext_group > MAX_EXT_GROUPS {
                    return Err(Error::TooManyZ);
                }
                let s = self.next_ext_group;
                self.next_ext_group += 1;
                Some(s)
            }
            GroupKind::NonCapture => None,
        };

        // Check for an immediate lookaround atom: `\(...\)@=` etc. only
        // applies as a *suffix* of the whole group, handled after `)` in
        // parse_piece via `At`; plain groups are parsed here.
        let (inner, mut info) = self.parse_alt(lx)?;
        match lx.get()? {
            Token::GroupClose => {}
            Token::Eof => {
                return Err(match kind {
                    GroupKind::NonCapture => Error::UnmatchedPercentOpen,
                    _ => Error::UnmatchedOpen,
                })
            }
            _ => return Err(Error::UnmatchedOpen),
        }

        let open_pc;
        let close_pc;
        match kind {
            GroupKind::Capture => {
                let s = slot.unwrap();
                open_pc = self.push(Inst::Save { goto: usize::MAX, slot: s, is_close: false });
                close_pc = self.push(Inst::Save { goto: usize::MAX, slot: s, is_close: true });
                self.closed_groups[s] = true;
            }
            GroupKind::External => {
                let s = slot.unwrap();
                open_pc = self.push(Inst::ExtSave { goto: usize::MAX, slot: s, is_close: false });
                close_pc = self.push(Inst::ExtSave { goto: usize::MAX, slot: s, is_close: true });
            }
            GroupKind::NonCapture => {
                open_pc = self.push(Inst::Nop { goto: usize::MAX });
                close_pc = self.push(Inst::Nop { goto: usize::MAX });
            }
        }
        self.patch(&[open_pc], inner.entry);
        self.patch(&inner.holes, close_pc);
        info.simple = false;
        Ok((Frag { entry: open_pc, holes: vec![close_pc] }, info))
    }

    fn parse_percent_atom(&mut self, atom: PercentAtom) -> Result<(Frag, FragInfo), Error> {
        match atom {
            PercentAtom::Bof => self.leaf(Inst::EmptyLook { goto: usize::MAX, look: EmptyLook::Bof }, false, false),
            PercentAtom::Eof => self.leaf(Inst::EmptyLook { goto: usize::MAX, look: EmptyLook::Eof }, false, false),
            PercentAtom::Cursor => self.leaf(Inst::Cursor { goto: usize::MAX }, false, false),
            PercentAtom::Visual => self.leaf(Inst::Visual { goto: usize::MAX }, false, false),
            PercentAtom::Mark(m) => {
                self.leaf(Inst::Mark { goto: usize::MAX, mark: m, cmp: crate::lexer::Cmp::Equal }, false, false)
            }
            PercentAtom::MarkBefore(m) => {
                self.leaf(Inst::Mark { goto: usize::MAX, mark: m, cmp: crate::lexer::Cmp::Less }, false, false)
            }
            PercentAtom::MarkAfter(m) => {
                self.leaf(Inst::Mark { goto: usize::MAX, mark: m, cmp: crate::lexer::Cmp::Greater }, false, false)
            }
            PercentAtom::Line(n, cmp) => self.leaf(Inst::LineCmp { goto: usize::MAX, n, cmp }, false, false),
            PercentAtom::Col(n, cmp) => self.leaf(Inst::ColCmp { goto: usize::MAX, n, cmp }, false, false),
            PercentAtom::VCol(n, cmp) => self.leaf(Inst::VColCmp { goto: usize::MAX, n, cmp }, false, false),
            PercentAtom::OptSequence(bytes) => self.parse_opt_sequence(bytes),
        }
    }

    /// `\%[...]`: each byte becomes an independently optional atom,
    /// nested so the whole thing prefers the longest match.
    fn parse_opt_sequence(&mut self, bytes: Vec<u8>) -> Result<(Frag, FragInfo), Error> {
        let mut frag: Option<Frag> = None;
        for b in bytes.into_iter().rev() {
            let lit_pc = self.push(Inst::Exact { goto: usize::MAX, bytes: vec![b] });
            match frag {
                None => {
                    frag = Some(Frag { entry: lit_pc, holes: vec![lit_pc] });
                }
                Some(tail) => {
                    self.patch(&[lit_pc], tail.entry);
                    frag = Some(Frag { entry: lit_pc, holes: tail.holes });
                }
            }
            let cur = frag.take().unwrap();
            let branch = self.push(Inst::Branch { body: cur.entry, alt: None });
            frag = Some(Frag { entry: branch, holes: {
                let mut h = cur.holes;
                h.push(branch);
                h
            }});
        }
        let frag = frag.unwrap_or_else(|| {
            let pc = self.push(Inst::Nop { goto: usize::MAX });
            Frag { entry: pc, holes: vec![pc] }
        });
        Ok((frag, FragInfo { haswidth: false, simple: false, hasnl: false, haslookbh: false }))
    }

    /// Bracket expression `[...]`: literal set, ranges,
    /// `[:class:]`, `[=c=]`, `[.c.]`.
    fn parse_bracket(&mut self, lx: &mut Lexer) -> Result<(Frag, FragInfo), Error> {
        let negated = self.bracket_peek_caret(lx)?;
        let mut set: Vec<u8> = Vec::new();
        let mut first = true;
        loop {
            let b = match self.bracket_next_byte(lx)? {
                None => return Err(Error::MissingClosingBracket),
                Some(b) => b,
            };
            if b == b']' && !first {
                break;
            }
            first = false;
            if b == b'[' {
                if let Some(marker) = self.bracket_peek_marker(lx) {
                    self.parse_bracket_special(lx, marker, &mut set)?;
                    continue;
                }
            }
            // range a-z
            if self.bracket_peek_is(lx, b'-') {
                match self.bracket_next_byte(lx)? {
                    Some(b2) if b2 != b']' => {
                        if b2 < b {
                            return Err(Error::UnmatchedOpenOrInvalidRange);
                        }
                        for x in b..=b2 {
                            set.push(x);
                        }
                    }
                    _ => {
                        set.push(b);
                        set.push(b'-');
                    }
                }
            } else {
                set.push(b);
            }
        }
        let pc = if negated {
            self.push(Inst::AnyBut { goto: usize::MAX, set, add_nl: false })
        } else {
            self.push(Inst::AnyOf { goto: usize::MAX, set, add_nl: false })
        };
        Ok((
            Frag { entry: pc, holes: vec![pc] },
            FragInfo { haswidth: true, simple: true, hasnl: false, haslookbh: false },
        ))
    }

    // The bracket-expression helpers below re-scan raw bytes rather than
    // going through `Lexer::get` since `[...]` has its own micro-grammar
    // where `\` is NOT generically meta (only `\]` `\^` `\-` `\\` are
    // special, the rest stand for themselves) -- matching
    // `skip_over_character_class`'s own treatment of the class body.

    fn bracket_peek_caret(&mut self, lx: &mut Lexer) -> Result<bool, Error> {
        match lx.get()? {
            Token::Literal(b'^') => Ok(true),
            other => {
                lx.push_back(other);
                Ok(false)
            }
        }
    }

    fn bracket_next_byte(&mut self, lx: &mut Lexer) -> Result<Option<u8>, Error> {
        match lx.get()? {
            Token::Eof => Ok(None),
            Token::Literal(b) => Ok(Some(b)),
            Token::Char(c) => Ok(Some(c as u8)),
            Token::ClassOpen => Ok(Some(b'[')),
            Token::AnyChar => Ok(Some(b'.')),
            Token::Tilde => Ok(Some(b'~')),
            Token::Star => Ok(Some(b'*')),
            Token::Bol => Ok(Some(b'^')),
            Token::Eol => Ok(Some(b'$')),
            _ => Ok(Some(b'?')),
        }
    }

    fn bracket_peek_is(&mut self, lx: &mut Lexer, want: u8) -> bool {
        match lx.get() {
            Ok(Token::Literal(b)) if b == want => true,
            Ok(other) => {
                lx.push_back(other);
                false
            }
            Err(_) => false,
        }
    }

    fn bracket_peek_marker(&mut self, lx: &mut Lexer) -> Option<u8> {
        match lx.get() {
            Ok(Token::Literal(m)) if matches!(m, b':' | b'=' | b'.') => Some(m),
            Ok(other) => {
                lx.push_back(other);
                None
            }
            Err(_) => None,
        }
    }

    fn parse_bracket_special(&mut self, lx: &mut Lexer, marker: u8, set: &mut Vec<u8>) -> Result<(), Error> {
        let mut name = Vec::new();
        loop {
            match lx.get()? {
                Token::Literal(b) if b == marker => {
                    // expect closing ']'
                    match lx.get()? {
                        Token::Literal(b']') => break,
                        _ => return Err(Error::InvalidCharacterClass),
                    }
                }
                Token::Literal(b) => name.push(b),
                Token::Char(c) => {
                    let mut buf = [0u8; 4];
                    name.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
                _ => return Err(Error::InvalidCharacterClass),
            }
        }
        let text = String::from_utf8_lossy(&name).into_owned();
        match marker {
            b':' => {
                let class = chartab::posix_class(&text).ok_or(Error::InvalidCharacterClass)?;
                for b in 0u16..256 {
                    if class.matches(b as u8, self.table, false) {
                        set.push(b as u8);
                    }
                }
            }
            b'=' => {
                if let Some(c) = text.chars().next() {
                    let base = chartab::equivalence_base(c);
                    if base.is_ascii() {
                        set.push(base as u8);
                    }
                    if (c as u32) < 256 {
                        set.push(c as u8);
                    }
                }
            }
            b'.' => {
                if let Some(c) = text.chars().next() {
                    if (c as u32) < 256 {
                        set.push(c as u8);
                    }
                }
            }
            _ => return Err(Error::InvalidCharacterClass),
        }
        Ok(())
    }
}

enum GroupKind {
    Capture,
    NonCapture,
    External,
}

// A group immediately followed by `\@...` becomes a lookaround/atomic
// construct. This is parsed at the `piece` level by recognising the `@`
// token right after a `)`; handled here since it needs the just-built
// group fragment.
impl<'t> Compiler<'t> {
    /// If the next token is `\@`/`@` (lookaround suffix), consumes it and
    /// rewrites `body` in place into the corresponding `Look`/`Behind`
    /// node, returning `Some(is_lookbehind)`. Otherwise pushes the token
    /// back and returns `None`, leaving `body` untouched.
    fn wrap_lookaround(&mut self, body: &mut Frag, lx: &mut Lexer) -> Result<Option<bool>, Error> {
        let tok = lx.get()?;
        if tok != Token::At {
            lx.push_back(tok);
            return Ok(None);
        }
        let kind_tok = lx.get()?;
        enum Wanted {
            Look(LookKind),
            Behind(bool),
        }
        let wanted = match kind_tok {
            Token::Literal(b'=') => Wanted::Look(LookKind::Positive),
            Token::Literal(b'!') => Wanted::Look(LookKind::Negative),
            Token::Literal(b'>') => Wanted::Look(LookKind::Atomic),
            Token::WordStart => {
                // '<' lexes as WordStart; disambiguate '<=' vs '<!'.
                match lx.get()? {
                    Token::Literal(b'=') => Wanted::Behind(false),
                    Token::Literal(b'!') => Wanted::Behind(true),
                    _ => return Err(Error::InvalidAfterAt),
                }
            }
            _ => return Err(Error::InvalidAfterAt),
        };
        let end_pc = self.push(Inst::End);
        self.patch(&body.holes, end_pc);
        let (pc, is_behind) = match wanted {
            Wanted::Look(kind) => (self.push(Inst::Look { goto: usize::MAX, body: body.entry, kind }), false),
            Wanted::Behind(negate) => {
                (self.push(Inst::Behind { goto: usize::MAX, body: body.entry, negate }), true)
            }
        };
        *body = Frag { entry: pc, holes: vec![pc] };
        Ok(Some(is_behind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(p: &str) -> Program {
        Compiler::compile(p.as_bytes(), CompileFlags { magic: true, ..Default::default() }).unwrap()
    }

    #[test]
    fn literal_compiles_to_exact_chain() {
        let prog = compile("abc");
        assert!(prog.magic_ok());
        assert!(prog.insts.len() >= 3);
    }

    #[test]
    fn group_allocates_slot() {
        let prog = compile("\\(a\\)");
        assert_eq!(prog.num_captures, 2);
    }

    #[test]
    fn too_many_groups_errors() {
        let pat = "\\(a\\)".repeat(10);
        let err = Compiler::compile(pat.as_bytes(), CompileFlags { magic: true, ..Default::default() })
            .unwrap_err();
        assert_eq!(err, Error::TooManyOpen);
    }

    #[test]
    fn illegal_backref_errors() {
        let err = Compiler::compile(b"\\1", CompileFlags { magic: true, ..Default::default() }).unwrap_err();
        assert_eq!(err, Error::IllegalBackref);
    }

    #[test]
    fn anchored_begin_hint() {
        let prog = compile("^foo");
        assert!(prog.reg_anch);
    }

    #[test]
    fn reg_start_hint() {
        let prog = compile("abc");
        assert_eq!(prog.reg_start, Some(b'a'));
    }
}
