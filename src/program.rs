// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `Program`: a compiled regular expression.

use crate::backtrack::Matcher;
use crate::capture::MatchResult;
use crate::error::ExecError;
use crate::host::{HostState, NoHost, Pos};
use crate::input::LineProvider;
use crate::inst::{Inst, Pc, REGMAGIC};
use crate::options::ExecFlags;
use crate::substitute::{self, NoEval};

/// Optimization and dialect flag bits carried alongside a compiled
/// program.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProgramFlags {
    pub ignore_case: bool,
    pub no_ignore_case: bool,
    pub has_newline_match: bool,
    pub combine_ignore: bool,
    pub has_lookbehind: bool,
    pub has_external_captures: bool,
}

/// The mandatory-substring optimization hint.
#[derive(Clone, Debug)]
pub struct RegMust {
    pub text: Vec<u8>,
}

/// A compiled regular expression. Immutable once built; may be
/// read by any number of non-concurrent matches.
#[derive(Clone, Debug)]
pub struct Program {
    /// The magic byte stamped at "offset 0" in spirit;
    /// `Program::new` always sets this to `REGMAGIC`, and `exec` checks it,
    /// reproducing the "mismatched magic aborts with corrupt" invariant
    /// even though there's no literal byte 0 to read it from anymore.
    magic: u8,
    /// The original pattern text, kept for diagnostics.
    pub original: String,
    /// The instruction graph.
    pub insts: Vec<Inst>,
    /// The pc execution actually starts at. The top-level `Frag`'s entry
    /// is not always `insts[0]` — a leading group, lookaround, or
    /// alternation emits its own scaffolding before the first atom the
    /// grammar descends into, so this is recorded explicitly rather than
    /// assumed.
    pub start_pc: Pc,
    /// Number of capturing groups, including the whole-match group 0.
    /// Always `<= 10`.
    pub num_captures: usize,
    /// Number of `\z(...)` external capture groups (0..=9).
    pub num_ext_captures: usize,
    /// Number of distinct non-SIMPLE repeat bookkeeping slots used, one
    /// per `* + ? {m,n}` applied to a non-SIMPLE body. Only the `{m,n}`
    /// ones are capped (`E60`, at most 10 concurrently nested); the rest
    /// grow with the pattern.
    pub num_braces: usize,
    /// First required character, or `None` if the program can start with
    /// anything (`reg_start`).
    pub reg_start: Option<u8>,
    /// Set if the program can only match at the start of a line/file
    /// (`reg_anch`).
    pub reg_anch: bool,
    /// Longest mandatory literal substring (`reg_must`), or `None`.
    pub reg_must: Option<RegMust>,
    pub flags: ProgramFlags,
}

impl Program {
    pub(crate) fn new(
        original: String,
        insts: Vec<Inst>,
        start_pc: Pc,
        num_captures: usize,
        num_ext_captures: usize,
        num_braces: usize,
        flags: ProgramFlags,
    ) -> Program {
        let mut prog = Program {
            magic: REGMAGIC,
            original,
            insts,
            start_pc,
            num_captures,
            num_ext_captures,
            num_braces,
            reg_start: None,
            reg_anch: false,
            reg_must: None,
            flags,
        };
        prog.compute_hints();
        prog
    }

    /// `compile(p) = null` (`Result::Err`) or `program[0] == REGMAGIC`
    ///.
    pub fn magic_ok(&self) -> bool {
        self.magic == REGMAGIC
    }

    fn compute_hints(&mut self) {
        let start_pc = self.start_pc;
        if let Some(Inst::Exact { bytes, .. }) = self.insts.get(start_pc) {
            if let Some(&b) = bytes.first() {
                self.reg_start = Some(b);
            }
        }
        self.reg_anch = matches!(
            self.insts.get(start_pc),
            Some(Inst::EmptyLook { look: crate::inst::EmptyLook::Bol, .. })
                | Some(Inst::EmptyLook { look: crate::inst::EmptyLook::Bof, .. })
        );
        self.reg_must = self.longest_top_level_exact();
    }

    /// Walk the top-level sequential chain (no branch descent — a
    /// conservative `reg_must` computation) and remember the longest
    /// `EXACTLY` operand, last one wins on ties.
    fn longest_top_level_exact(&self) -> Option<RegMust> {
        let mut pc = self.start_pc;
        let mut best: Option<RegMust> = None;
        let mut guard = 0;
        while pc < self.insts.len() && guard < self.insts.len() + 1 {
            guard += 1;
            match &self.insts[pc] {
                Inst::Exact { bytes, goto } => {
                    if best.as_ref().map_or(true, |b| bytes.len() >= b.text.len()) {
                        best = Some(RegMust { text: bytes.clone() });
                    }
                    pc = *goto;
                }
                Inst::Save { goto, .. } | Inst::Nop { goto } | Inst::ExtSave { goto, .. } => {
                    pc = *goto;
                }
                Inst::EmptyLook { goto, .. } => pc = *goto,
                _ => break,
            }
        }
        best
    }

    pub fn num_insts(&self) -> usize {
        self.insts.len()
    }

    /// Search `lines` for a match starting at or after `start`, with no
    /// `HostState` (position-sensitive tokens degrade to `NOMATCH`).
    pub fn exec<L: LineProvider>(
        &self,
        lines: &L,
        start: Pos,
        flags: ExecFlags,
    ) -> Result<Option<MatchResult>, ExecError> {
        self.exec_with_host(lines, &NoHost, start, flags)
    }

    /// Like `exec`, consulting `host` for `\%#`, `\%V`, `\%'m` and
    /// multi-byte keyword classification.
    pub fn exec_with_host<L: LineProvider, H: HostState>(
        &self,
        lines: &L,
        host: &H,
        start: Pos,
        flags: ExecFlags,
    ) -> Result<Option<MatchResult>, ExecError> {
        Matcher::new(self, lines, host, flags).exec(start)
    }

    /// Expand `template` against a prior `exec` result.
    /// `prev_sub` is the explicit `reg_prev_sub` carry for `~` (see
    /// DESIGN.md); `magic` controls whether `~`/`\~` (rather than `~`
    /// alone) triggers expansion, matching the pattern's own magic level.
    /// `\=` expressions are not evaluated (no embedded expression
    /// language); use `substitute::substitute` directly with an
    /// `ExprEval` to support them.
    pub fn substitute<L: LineProvider>(
        &self,
        template: &[u8],
        result: &MatchResult,
        lines: &L,
        prev_sub: &mut Option<Vec<u8>>,
        magic: bool,
        backslash: bool,
    ) -> Result<Vec<u8>, ExecError> {
        let expanded = substitute::regtilde(template, prev_sub, magic);
        substitute::substitute(&expanded, result, lines, &NoEval, false, backslash)
    }
}
