use std::{collections::BTreeMap, fmt, io::Write};

use crate::{
    errors::MpError,
    format::{Token, MAX_ENCODED_MATCH, MIN_MATCH, WINDOW_SIZE},
    window,
};

/// Matches of this many bytes or fewer are cheaper as literals
const MAX_UNCODED: usize = MIN_MATCH - 1;

/// The token stream for one input, along with some statistics for logging
#[derive(Debug)]
pub(super) struct LzssPass {
    pub buf: Vec<Token>,
    pub decompressed_size: usize,
    pub literals: usize,
    // match size => number of matches
    pub match_sizes: BTreeMap<usize, u64>,
}

impl LzssPass {
    fn new(input_size: usize) -> Self {
        Self {
            buf: Vec::with_capacity(input_size),
            decompressed_size: input_size,
            literals: 0,
            match_sizes: BTreeMap::new(),
        }
    }

    fn add(&mut self, token: Token) {
        match token {
            Token::Literal(..) => self.literals += 1,
            Token::Match { length, .. } => {
                *self.match_sizes.entry(length as usize).or_insert(0) += 1;
            }
        }
        self.buf.push(token);
    }

    pub fn matches(&self) -> u64 {
        self.match_sizes.values().sum()
    }
}

impl fmt::Display for LzssPass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "# Match Size Frequencies")?;
        writeln!(f, "{:?}", &self.match_sizes)?;
        writeln!(
            f,
            "# {} bytes, {} tokens: {} literals, {} matches",
            self.decompressed_size,
            self.buf.len(),
            self.literals,
            self.matches()
        )
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(super) struct MoveBack {
    /// length
    pub size: usize,
    /// index of the match start in the search window
    pub start: usize,
}

impl MoveBack {
    fn new(size: usize, start: usize) -> Self {
        Self { size, start }
    }
}

/// Compress `input` into a list of tokens.
/// Debugging information will be printed to `log` if present.
pub(super) fn compress_buf(
    input: &[u8],
    log: &mut Option<&mut dyn Write>,
) -> Result<LzssPass, MpError> {
    // the zero prefix stands in for the zero seeded window of the decoder
    let mut buf = vec![0u8; WINDOW_SIZE + input.len()];
    buf[WINDOW_SIZE..].copy_from_slice(input);

    let mut compressed = LzssPass::new(input.len());
    let mut csr = WINDOW_SIZE;

    while csr < buf.len() {
        let window_origin = csr - WINDOW_SIZE;

        let token = match brute_find_match(&buf, csr) {
            Some(m) => Token::Match {
                offset: window::match_offset(window_origin + m.start),
                length: m.size as u8,
            },
            None => Token::Literal(buf[csr]),
        };

        if let Some(wtr) = log.as_mut() {
            writeln!(wtr, "{:04x} - {}", window_origin, token)?;
        }

        compressed.add(token);
        csr += token.size();
    }

    Ok(compressed)
}

/// Naive search of the 1024 bytes before `csr` for the longest match of the
/// data at `csr`. Matches may run on past `csr` into the data being matched.
///
/// The first (lowest) window index wins on equal sizes, which keeps the output
/// identical to the original compression tool.
fn brute_find_match(buf: &[u8], csr: usize) -> Option<MoveBack> {
    let window_origin = csr - WINDOW_SIZE;
    let ahead = &buf[csr..];
    let longest_match = ahead.len().min(MAX_ENCODED_MATCH);
    let ahead = &ahead[..longest_match];

    let mut best: Option<MoveBack> = None;

    for start in 0..WINDOW_SIZE {
        let src = &buf[window_origin + start..];
        if src[0] != ahead[0] {
            continue;
        }

        let size = src.iter().zip(ahead).take_while(|(s, d)| s == d).count();

        if best.map_or(true, |b| size > b.size) {
            best = Some(MoveBack::new(size, start));
            // nothing later can beat this
            if size == longest_match {
                break;
            }
        }
    }

    best.filter(|m| m.size > MAX_UNCODED)
}

#[cfg(test)]
mod test {
    use super::*;

    fn padded(input: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; WINDOW_SIZE];
        buf.extend_from_slice(input);
        buf
    }

    #[test]
    fn self_overlapping_run() {
        let buf = padded(b"AAAAAAAAAA");
        let found = brute_find_match(&buf, WINDOW_SIZE + 1).unwrap();

        assert_eq!(found, MoveBack::new(9, WINDOW_SIZE - 1));
    }

    #[test]
    fn zero_seed_matches() {
        let buf = padded(&[0, 0, 0, 0, 7]);
        let found = brute_find_match(&buf, WINDOW_SIZE).unwrap();

        // every window index is zero, so the first one wins
        assert_eq!(found, MoveBack::new(4, 0));
    }

    #[test]
    fn ties_keep_first_index() {
        let buf = padded(b"abcXabcYabc");
        let found = brute_find_match(&buf, WINDOW_SIZE + 8).unwrap();

        assert_eq!(found, MoveBack::new(3, WINDOW_SIZE - 8));
    }

    #[test]
    fn short_matches_are_ignored() {
        let buf = padded(b"abXab");
        assert_eq!(brute_find_match(&buf, WINDOW_SIZE + 3), None);
    }

    #[test]
    fn match_capped_at_64() {
        let buf = padded(&[0x41; 200]);
        let found = brute_find_match(&buf, WINDOW_SIZE + 1).unwrap();

        assert_eq!(found.size, MAX_ENCODED_MATCH);
    }

    #[test]
    fn pass_statistics() {
        let mut log = Vec::new();
        let pass = {
            let mut log = Some(&mut log as &mut dyn Write);
            compress_buf(b"AAAAAAAAAA", &mut log).unwrap()
        };

        assert_eq!(pass.literals, 1);
        assert_eq!(pass.matches(), 1);
        assert_eq!(pass.decompressed_size, 10);
        assert_eq!(
            pass.buf,
            [
                Token::Literal(0x41),
                Token::Match { offset: 0x3BE, length: 9 }
            ]
        );
        assert!(String::from_utf8(log).unwrap().contains("0001 - Match"));
        assert!(pass
            .to_string()
            .contains("# 10 bytes, 2 tokens: 1 literals, 1 matches"));
    }
}
