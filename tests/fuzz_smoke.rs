extern crate rand;

use rand::Rng;

use vimregex::host::Pos;
use vimregex::{compile, CompileFlags, ExecFlags, StringLines};

const LITERAL_ALPHABET: &[u8] = b"ab";

fn random_literal_pattern(rng: &mut impl Rng, len: usize) -> Vec<u8> {
    (0..len).map(|_| LITERAL_ALPHABET[rng.gen_range(0, LITERAL_ALPHABET.len())]).collect()
}

/// A compiled literal-only pattern never panics and, when it does match,
/// always reports a range that is actually present in the haystack.
#[test]
fn random_literal_patterns_never_panic_and_match_consistently() {
    let mut rng = rand::thread_rng();
    for _ in 0..200 {
        let pat_len = rng.gen_range(1, 5);
        let hay_len = rng.gen_range(0, 12);
        let pattern = random_literal_pattern(&mut rng, pat_len);
        let haystack = random_literal_pattern(&mut rng, hay_len);

        let prog = compile(&pattern, CompileFlags { magic: true, ..Default::default() }).unwrap();
        let lines = StringLines::new(&haystack);
        let result = prog.exec(&lines, Pos { lnum: 0, col: 0 }, ExecFlags::default()).unwrap();

        if let Some(m) = result {
            let (start, end) = m.slots[0].single_range().unwrap();
            assert!(start <= end);
            assert!(end <= haystack.len());
            assert_eq!(&haystack[start..end], &pattern[..]);
        }
    }
}
