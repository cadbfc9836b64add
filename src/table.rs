//! Character tables for the game's text banks.
//!
//! The game does not store text as ASCII or Shift-JIS. Each byte is a code
//! into a font, so a table file maps codes to readable strings:
//! ```text
//! ; comment lines and empty lines are skipped
//! 0A=\n
//! 41=A
//! 3D==
//! ```
//! `XX==` maps code `XX` to `=`. Values may not be a lone `<`, `>`, or `\`,
//! since those start the `<XX>` raw code and `\X` escape syntax.

use crate::errors::MpError;
use std::{collections::HashMap, fs, path::Path, str::FromStr};

/// A parsed character table.
///
/// All lookups are owned by the table, so any number of tables can be used at
/// once, from any thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    // code => text
    codes: HashMap<u8, String>,
    // text => code; the first line that defines a text wins
    texts: HashMap<String, u8>,
}

impl Table {
    pub fn from_file<P: AsRef<Path>>(p: P) -> Result<Self, MpError> {
        fs::read_to_string(p)?.parse()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    fn insert(&mut self, line: usize, code: u8, text: String) -> Result<(), MpError> {
        if self.codes.contains_key(&code) {
            return Err(MpError::BadTable {
                line,
                reason: format!("code {:02X} is defined twice", code),
            });
        }

        self.texts.entry(text.clone()).or_insert(code);
        self.codes.insert(code, text);
        Ok(())
    }

    /// Convert a zero terminated binary string into text.
    /// Codes missing from the table are written as `<XX>`.
    pub fn decode_text(&self, bytes: &[u8]) -> Result<String, MpError> {
        let mut text = String::with_capacity(bytes.len());

        if let Some((&last, body)) = bytes.split_last() {
            for byte in body {
                match self.codes.get(byte) {
                    Some(s) => text.push_str(s),
                    None => text.push_str(&format!("<{:02X}>", byte)),
                }
            }

            if last != 0 {
                return Err(MpError::BadText(format!(
                    "expected a 0x00 code at the end of the binary string: {}",
                    text
                )));
            }
        }

        Ok(text)
    }

    /// Convert text into a zero terminated binary string
    pub fn encode_text(&self, text: &str) -> Result<Vec<u8>, MpError> {
        let chars: Vec<char> = text.chars().collect();
        let mut bytes = Vec::with_capacity(chars.len() + 1);
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '<' => {
                    if i + 4 > chars.len() {
                        return Err(MpError::BadText(format!(
                            "\"<\" has no room for a full \"<XX>\" code: {}",
                            text
                        )));
                    }
                    if chars[i + 3] != '>' {
                        return Err(MpError::BadText(format!("malformed code: {}", text)));
                    }

                    let code: String = chars[i + 1..i + 3].iter().collect();
                    let byte = u8::from_str_radix(&code, 16)
                        .map_err(|_| MpError::BadText(format!("\"<{}>\" is not hex: {}", code, text)))?;
                    bytes.push(byte);
                    i += 4;
                }
                '\\' => {
                    if i + 2 > chars.len() {
                        return Err(MpError::BadText(format!(
                            "\"\\\" has no room for a full \"\\X\" code: {}",
                            text
                        )));
                    }

                    let code: String = chars[i..i + 2].iter().collect();
                    bytes.push(self.lookup(code)?);
                    i += 2;
                }
                c => {
                    bytes.push(self.lookup(c.to_string())?);
                    i += 1;
                }
            }
        }

        bytes.push(0);
        Ok(bytes)
    }

    fn lookup(&self, text: String) -> Result<u8, MpError> {
        match self.texts.get(&text) {
            Some(&code) => Ok(code),
            None => Err(MpError::UnknownText(text)),
        }
    }
}

impl FromStr for Table {
    type Err = MpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut table = Self::default();

        for (idx, line) in s.lines().enumerate() {
            let line_num = idx + 1;
            if line.is_empty() || line.starts_with(';') {
                continue;
            }

            let parts: Vec<&str> = line.split('=').collect();
            let (code, text) = match parts.as_slice() {
                [code, text] => {
                    if *text == "<" || *text == ">" {
                        return Err(MpError::BadTable {
                            line: line_num,
                            reason: "\"<\" and \">\" are reserved for unknown codes".into(),
                        });
                    }
                    if *text == "\\" {
                        return Err(MpError::BadTable {
                            line: line_num,
                            reason: "a lone \"\\\" is reserved for escape codes like \"\\n\"".into(),
                        });
                    }
                    (*code, *text)
                }
                [code, _, _] => (*code, "="),
                // ignore invalid lines
                _ => continue,
            };

            let code = u8::from_str_radix(code.trim(), 16).map_err(|e| MpError::BadTable {
                line: line_num,
                reason: format!("\"{}\" is not a hex code: {}", code, e),
            })?;

            table.insert(line_num, code, text.to_string())?;
        }

        Ok(table)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const TABLE: &str = "; test table\n\
                         \n\
                         0A=\\n\n\
                         41=A\n\
                         42=B\n\
                         3D==\n\
                         50=Mario\n\
                         51=A\n\
                         not a table line\n";

    fn table() -> Table {
        TABLE.parse().unwrap()
    }

    #[test]
    fn parse_table() {
        let table = table();

        assert_eq!(table.len(), 6);
        assert_eq!(table.codes[&0x3D], "=");
        assert_eq!(table.codes[&0x0A], "\\n");
        // the first definition of "A" is used for encoding
        assert_eq!(table.texts["A"], 0x41);
    }

    #[test]
    fn reserved_values() {
        for bad in &["41=<", "41=>", "41=\\"] {
            let err = bad.parse::<Table>().unwrap_err();
            assert!(matches!(err, MpError::BadTable { line: 1, .. }), "{}", bad);
        }
    }

    #[test]
    fn duplicate_codes() {
        let err = "41=A\n41=B".parse::<Table>().unwrap_err();
        assert!(matches!(err, MpError::BadTable { line: 2, .. }));
    }

    #[test]
    fn bad_hex() {
        let err = "4G=A".parse::<Table>().unwrap_err();
        assert!(matches!(err, MpError::BadTable { line: 1, .. }));
    }

    #[test]
    fn decode() {
        let table = table();
        let text = table.decode_text(&[0x50, 0x3D, 0x41, 0x0A, 0x99, 0x00]).unwrap();

        assert_eq!(text, "Mario=A\\n<99>");
        assert_eq!(table.decode_text(&[]).unwrap(), "");
        assert!(table.decode_text(&[0x41, 0x42]).is_err());
    }

    #[test]
    fn encode() {
        let table = table();
        let bytes = table.encode_text("AB=\\n<99>A").unwrap();

        assert_eq!(bytes, [0x41, 0x42, 0x3D, 0x0A, 0x99, 0x41, 0x00]);
        assert_eq!(table.encode_text("").unwrap(), [0x00]);
    }

    #[test]
    fn encode_errors() {
        let table = table();

        assert!(matches!(table.encode_text("A<9"), Err(MpError::BadText(..))));
        assert!(matches!(table.encode_text("<99]"), Err(MpError::BadText(..))));
        assert!(matches!(table.encode_text("<ZZ>"), Err(MpError::BadText(..))));
        assert!(matches!(table.encode_text("A\\"), Err(MpError::BadText(..))));
        assert!(matches!(table.encode_text("\\t"), Err(MpError::UnknownText(t)) if t == "\\t"));
        assert!(matches!(table.encode_text("C"), Err(MpError::UnknownText(t)) if t == "C"));
    }

    #[test]
    fn text_round_trip() {
        let table = table();
        let text = "AB=\\n<07>";
        let bytes = table.encode_text(text).unwrap();

        assert_eq!(bytes, [0x41, 0x42, 0x3D, 0x0A, 0x07, 0x00]);
        assert_eq!(table.decode_text(&bytes).unwrap(), text);
    }

    #[test]
    fn multi_character_values_only_decode() {
        let table = table();

        assert_eq!(table.decode_text(&[0x50, 0x00]).unwrap(), "Mario");
        // encoding looks up one character at a time
        assert!(matches!(table.encode_text("Mario"), Err(MpError::UnknownText(t)) if t == "M"));
    }
}
