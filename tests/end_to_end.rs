use vimregex::host::Pos;
use vimregex::{compile, CompileFlags, ExecFlags, Program, SliceLines, StringLines};

fn magic(p: &str) -> Program {
    compile(p.as_bytes(), CompileFlags { magic: true, ..Default::default() }).unwrap()
}

fn whole(m: &vimregex::MatchResult) -> (usize, usize) {
    m.slots[0].single_range().unwrap()
}

#[test]
fn group_capture_with_repeated_atom() {
    let prog = magic("\\(a\\+\\)b");
    let lines = StringLines::new(b"aaab");
    let m = prog.exec(&lines, Pos { lnum: 0, col: 0 }, ExecFlags::default()).unwrap().unwrap();
    assert_eq!(whole(&m), (0, 4));
    assert_eq!(m.slots[1].single_range(), Some((0, 3)));
}

#[test]
fn anchored_pattern_matches_one_line_not_another() {
    let prog = magic("^foo$");
    let data = vec![b"foo".to_vec(), b"bar".to_vec()];
    let lines = SliceLines::new(&data);
    let m = prog.exec(&lines, Pos { lnum: 0, col: 0 }, ExecFlags::default()).unwrap().unwrap();
    assert_eq!(whole(&m), (0, 3));
    assert!(prog.exec(&lines, Pos { lnum: 1, col: 0 }, ExecFlags::default()).unwrap().is_none());
}

#[test]
fn very_magic_group_backreference() {
    let prog = magic("\\v(\\w+)\\s+\\1");
    let lines = StringLines::new(b"the the");
    let m = prog.exec(&lines, Pos { lnum: 0, col: 0 }, ExecFlags::default()).unwrap().unwrap();
    assert_eq!(m.slots[1].single_range(), Some((0, 3)));
    assert_eq!(whole(&m), (0, 7));
}

#[test]
fn complex_brace_bounds() {
    let prog = magic("a\\{2,3}b");
    assert_eq!(
        whole(&prog.exec(&StringLines::new(b"aab"), Pos { lnum: 0, col: 0 }, ExecFlags::default()).unwrap().unwrap()),
        (0, 3)
    );
    assert_eq!(
        whole(&prog.exec(&StringLines::new(b"aaaab"), Pos { lnum: 0, col: 0 }, ExecFlags::default()).unwrap().unwrap()),
        (1, 5)
    );
    assert!(prog.exec(&StringLines::new(b"ab"), Pos { lnum: 0, col: 0 }, ExecFlags::default()).unwrap().is_none());
}

#[test]
fn substitute_with_case_conversion() {
    let prog = magic("\\v(\\w+) (\\w+)");
    let lines = StringLines::new(b"hello world");
    let m = prog.exec(&lines, Pos { lnum: 0, col: 0 }, ExecFlags::default()).unwrap().unwrap();
    let mut prev_sub = None;
    let out = prog.substitute(b"\\2 \\U\\1", &m, &lines, &mut prev_sub, true, false).unwrap();
    assert_eq!(out, b"world HELLO");
}

#[test]
fn lazy_dot_still_reaches_target() {
    let prog = magic(".\\{-}b");
    let lines = StringLines::new(b"aaab");
    let m = prog.exec(&lines, Pos { lnum: 0, col: 0 }, ExecFlags::default()).unwrap().unwrap();
    assert_eq!(whole(&m), (0, 4));
}

#[test]
fn lookbehind_anchors_without_consuming_prefix() {
    let prog = magic("\\(foo\\)\\@<=bar");
    let m = prog
        .exec(&StringLines::new(b"foobar"), Pos { lnum: 0, col: 0 }, ExecFlags::default())
        .unwrap()
        .unwrap();
    assert_eq!(whole(&m), (3, 6));
    assert!(prog
        .exec(&StringLines::new(b"xbar"), Pos { lnum: 0, col: 0 }, ExecFlags::default())
        .unwrap()
        .is_none());
}

#[test]
fn optional_sequence_atom() {
    let prog = magic("\\%[read]");
    assert_eq!(
        whole(&prog.exec(&StringLines::new(b"re"), Pos { lnum: 0, col: 0 }, ExecFlags::default()).unwrap().unwrap()),
        (0, 2)
    );
    assert_eq!(
        whole(&prog.exec(&StringLines::new(b"readme"), Pos { lnum: 0, col: 0 }, ExecFlags::default()).unwrap().unwrap()),
        (0, 4)
    );
    assert_eq!(
        whole(&prog.exec(&StringLines::new(b"rz"), Pos { lnum: 0, col: 0 }, ExecFlags::default()).unwrap().unwrap()),
        (0, 1)
    );
}

#[test]
fn empty_pattern_matches_empty_at_start() {
    let prog = magic("");
    let lines = StringLines::new(b"abc");
    let m = prog.exec(&lines, Pos { lnum: 0, col: 0 }, ExecFlags::default()).unwrap().unwrap();
    assert_eq!(whole(&m), (0, 0));
}

#[test]
fn zero_zero_brace_consumes_nothing() {
    let prog = magic("a\\{0,0}");
    let lines = StringLines::new(b"aaa");
    let m = prog.exec(&lines, Pos { lnum: 0, col: 0 }, ExecFlags::default()).unwrap().unwrap();
    assert_eq!(whole(&m), (0, 0));
}

#[test]
fn zero_width_group_loop_terminates() {
    let prog = magic("\\(\\)*");
    let lines = StringLines::new(b"xyz");
    let m = prog.exec(&lines, Pos { lnum: 0, col: 0 }, ExecFlags::default()).unwrap().unwrap();
    assert_eq!(whole(&m), (0, 0));
    assert_eq!(m.slots[1].single_range(), Some((0, 0)));
}

#[test]
fn greedy_any_vs_lazy_any() {
    let greedy = magic(".*a");
    let lazy = magic(".\\{-}a");
    let lines = StringLines::new(b"aaa");
    assert_eq!(whole(&greedy.exec(&lines, Pos { lnum: 0, col: 0 }, ExecFlags::default()).unwrap().unwrap()), (0, 3));
    assert_eq!(whole(&lazy.exec(&lines, Pos { lnum: 0, col: 0 }, ExecFlags::default()).unwrap().unwrap()), (0, 1));
}

#[test]
fn anchored_program_attempts_one_start_position() {
    let prog = magic("^x");
    let lines = StringLines::new(b"yyyx");
    assert!(prog.exec(&lines, Pos { lnum: 0, col: 0 }, ExecFlags::default()).unwrap().is_none());
}

#[test]
fn multi_line_buffer_whitespace_class_crosses_lines() {
    let prog = magic("foo\\_sbar");
    let data = vec![b"foo".to_vec(), b"bar".to_vec()];
    let lines = SliceLines::new(&data);
    let m = prog.exec(&lines, Pos { lnum: 0, col: 0 }, ExecFlags::default()).unwrap().unwrap();
    match m.slots[0] {
        vimregex::SubMatch::Multi { start_line, start_col, end_line, end_col } => {
            assert_eq!((start_line, start_col), (0, 0));
            assert_eq!((end_line, end_col), (1, 3));
        }
        other => panic!("expected Multi match, got {:?}", other),
    }
}
