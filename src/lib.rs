// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A compiler and backtracking matcher for the Vim regular-expression
//! dialect: magic levels (`\v \m \M \V`), lookaround (`\@= \@! \@<= \@<!
//! \@>`), external captures (`\z(...)`), position-sensitive atoms
//! (`\%#`, `\%V`, `\%'m`), and `:substitute`-style template expansion
//! with back-references and case folding.
//!
//! ```
//! use vimregex::{compile, CompileFlags, ExecFlags, StringLines};
//! use vimregex::host::Pos;
//!
//! let prog = compile(b"fo\\+", CompileFlags::default()).unwrap();
//! let lines = StringLines::new(b"a foo b");
//! let m = prog.exec(&lines, Pos { lnum: 0, col: 0 }, ExecFlags::default()).unwrap();
//! assert!(m.is_some());
//! ```
//!
//! # Modules
//!
//! - [`lexer`] / [`compile`] turn pattern text into a [`Program`].
//! - [`backtrack`] runs a compiled `Program` against a [`LineProvider`]
//!   and an optional [`HostState`], producing a [`MatchResult`].
//! - [`substitute`] expands a `:substitute`-style template against a
//!   `MatchResult`.
//! - [`error`] carries the two distinct failure domains: `Error` for
//!   compilation, `ExecError` for execution/substitution.

pub mod backtrack;
pub mod capture;
pub mod chartab;
pub mod compile;
pub mod error;
pub mod host;
pub mod input;
pub mod inst;
pub mod lexer;
pub mod options;
pub mod program;
pub mod substitute;

pub use crate::capture::{MatchResult, SubMatch, N_SUB};
pub use crate::compile::Compiler;
pub use crate::error::{Error, ExecError};
pub use crate::host::{HostState, NoHost, Pos};
pub use crate::input::{LineProvider, SliceLines, StringLines};
pub use crate::options::{CompileFlags, ExecFlags, Magicness, DEFAULT_MAX_PATTERN_MEMORY_KB};
pub use crate::program::{Program, ProgramFlags, RegMust};
pub use crate::substitute::{regtilde, ExprEval, NoEval};

/// Compiles `pattern` under `flags` into a reusable [`Program`].
/// Shorthand for [`Compiler::compile`].
pub fn compile(pattern: &[u8], flags: CompileFlags) -> Result<Program, Error> {
    Compiler::compile(pattern, flags)
}

