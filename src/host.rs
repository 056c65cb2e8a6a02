// Copyright 2014-2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The host-buffer-state collaborator: cursor position,
//! visual-selection extents, named marks, and `'iskeyword'`
//! classification, consulted only by the position-sensitive tokens
//! `\%#`, `\%V`, `\%'m`, `\%<'m`, `\%>'m` and the multi-byte word-class
//! tests used by `\<` / `\>`.
//!
//! When a match runs with no `HostState` supplied, every position-sensitive
//! token degrades to `NOMATCH` locally: "all other anomalies...
//! degrade to NOMATCH... and the engine continues trying other positions".

/// A line/column position in the host buffer, 0-indexed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pos {
    pub lnum: i64,
    pub col: i64,
}

/// Host-buffer state consulted by position-sensitive tokens.
pub trait HostState {
    /// Current cursor position (`\%#`).
    fn cursor(&self) -> Option<Pos>;
    /// Visual-selection extent, inclusive (`\%V`).
    fn visual(&self) -> Option<(Pos, Pos)>;
    /// Named mark position (`\%'m`, `\%<'m`, `\%>'m`).
    fn mark(&self, name: u8) -> Option<Pos>;
    /// Whether `b` is a keyword byte under the host's `'iskeyword'` option;
    /// used for multibyte-aware `\<`/`\>`/`\k` beyond the static table.
    fn is_keyword_byte(&self, b: u8) -> bool;
}

/// A `HostState` with nothing configured; every query returns "absent",
/// driving position-sensitive tokens to `NOMATCH`.
pub struct NoHost;

impl HostState for NoHost {
    fn cursor(&self) -> Option<Pos> {
        None
    }

    fn visual(&self) -> Option<(Pos, Pos)> {
        None
    }

    fn mark(&self, _name: u8) -> Option<Pos> {
        None
    }

    fn is_keyword_byte(&self, b: u8) -> bool {
        crate::chartab::ByteTable::new().is_word(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_host_is_absent() {
        let h = NoHost;
        assert!(h.cursor().is_none());
        assert!(h.visual().is_none());
        assert!(h.mark(b'a').is_none());
    }
}
