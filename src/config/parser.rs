//! Binding file parser
//!
//! Character-level state machine over the `~/.babybindsrc` format:
//!
//! ```text
//! # comment
//! <keycode>[;<keycode>...]:<command> [args...]
//! ```
//!
//! Spaces and tabs are ignored everywhere except inside the command, where
//! they separate arguments. Inside the command a backslash escapes the next
//! character: `\ ` and `\<tab>` are literal, `\n` is a newline byte, `\\` is a
//! backslash, anything else keeps the backslash verbatim. The command is never
//! handed to a shell.
//!
//! Any malformed record aborts the whole load; a partial store is never
//! returned.

use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;

use super::{ConfigError, Malformed};
use crate::bindings::{Binding, BindingStore, Keycode};
use crate::constants::grammar;

/// Argument separator inside the command buffer
const SEPARATOR: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Line start, decides between comment and binding
    Starting,
    Keycode,
    Command,
    /// One byte of lookahead after a backslash
    Escape,
    Comment,
}

/// Streaming parser; feed bytes, then `finish` to get the bindings
#[derive(Debug)]
pub struct ConfigParser {
    max_combo: usize,
    mode: Mode,
    /// Digits of the current keycode field, then the NUL-separated command
    buf: Vec<u8>,
    keys: Vec<Keycode>,
    line: usize,
    store: BindingStore,
}

impl ConfigParser {
    pub fn new(max_combo: usize) -> Result<Self, ConfigError> {
        let mut buf = Vec::new();
        buf.try_reserve(grammar::INITIAL_BUFFER_SIZE)
            .map_err(|_| ConfigError::OutOfMemory)?;
        Ok(Self {
            max_combo,
            mode: Mode::Starting,
            buf,
            keys: Vec::with_capacity(max_combo),
            line: 1,
            store: BindingStore::new(),
        })
    }

    pub fn feed(&mut self, input: &[u8]) -> Result<(), ConfigError> {
        input.iter().try_for_each(|&byte| self.step(Some(byte)))
    }

    /// End of input: completes the last record
    pub fn finish(mut self) -> Result<BindingStore, ConfigError> {
        self.step(None)?;
        Ok(self.store)
    }

    fn step(&mut self, byte: Option<u8>) -> Result<(), ConfigError> {
        let c = match byte {
            None => return self.end_record(),
            Some(b'\n') => {
                self.end_record()?;
                self.line += 1;
                return Ok(());
            }
            Some(c) => c,
        };

        match self.mode {
            Mode::Starting => match c {
                b' ' | b'\t' => Ok(()),
                b'#' => {
                    self.mode = Mode::Comment;
                    Ok(())
                }
                _ => {
                    self.mode = Mode::Keycode;
                    self.keycode_byte(c)
                }
            },
            Mode::Keycode => match c {
                b' ' | b'\t' => Ok(()),
                _ => self.keycode_byte(c),
            },
            Mode::Command => self.command_byte(c),
            Mode::Escape => self.escape_byte(c),
            Mode::Comment => Ok(()),
        }
    }

    fn keycode_byte(&mut self, c: u8) -> Result<(), ConfigError> {
        match c {
            b';' => self.close_field(),
            b':' => {
                self.close_field()?;
                self.mode = Mode::Command;
                Ok(())
            }
            _ => self.push(c),
        }
    }

    fn command_byte(&mut self, c: u8) -> Result<(), ConfigError> {
        match c {
            b'\\' => {
                // Placeholder; the escaped byte replaces it or follows it
                self.push(b'\\')?;
                self.mode = Mode::Escape;
                Ok(())
            }
            b' ' | b'\t' | SEPARATOR => self.separate(),
            _ => self.push(c),
        }
    }

    fn escape_byte(&mut self, c: u8) -> Result<(), ConfigError> {
        self.mode = Mode::Command;
        match c {
            b' ' | b'\t' => self.replace_placeholder(c),
            b'n' => self.replace_placeholder(b'\n'),
            b'\\' => {}
            _ => return self.push(c),
        }
        Ok(())
    }

    /// Close the digit field on `;` or `:`
    fn close_field(&mut self) -> Result<(), ConfigError> {
        if self.buf.is_empty() {
            return Err(self.malformed(Malformed::EmptyField));
        }
        if self.buf.len() > grammar::MAX_KEYCODE_DIGITS {
            return Err(self.malformed(Malformed::KeycodeTooLong {
                max: grammar::MAX_KEYCODE_DIGITS,
            }));
        }
        if self.keys.len() == self.max_combo {
            return Err(self.malformed(Malformed::TooManyKeycodes {
                max: self.max_combo,
            }));
        }

        let mut code: Keycode = 0;
        for &digit in &self.buf {
            if !digit.is_ascii_digit() {
                return Err(self.malformed(Malformed::InvalidKeycode {
                    found: char::from(digit),
                }));
            }
            code = code * 10 + Keycode::from(digit - b'0');
        }

        self.keys
            .try_reserve(1)
            .map_err(|_| ConfigError::OutOfMemory)?;
        self.keys.push(code);
        self.buf.clear();
        Ok(())
    }

    /// Newline or end of input
    fn end_record(&mut self) -> Result<(), ConfigError> {
        match self.mode {
            Mode::Keycode => return Err(self.malformed(Malformed::MissingCommand)),
            Mode::Command | Mode::Escape => self.commit()?,
            Mode::Starting | Mode::Comment => {}
        }
        self.mode = Mode::Starting;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), ConfigError> {
        let argv: Vec<OsString> = self
            .buf
            .split(|&b| b == SEPARATOR)
            .filter(|token| !token.is_empty())
            .map(|token| OsString::from_vec(token.to_vec()))
            .collect();
        let keys = std::mem::take(&mut self.keys);
        self.buf.clear();

        let binding = Binding::new(keys, argv)
            .ok_or_else(|| self.malformed(Malformed::MissingCommand))?;
        self.store.push(binding)
    }

    /// Unescaped whitespace; runs collapse to one separator
    fn separate(&mut self) -> Result<(), ConfigError> {
        match self.buf.last() {
            None | Some(&SEPARATOR) => Ok(()),
            Some(_) => self.push(SEPARATOR),
        }
    }

    fn replace_placeholder(&mut self, c: u8) {
        if let Some(last) = self.buf.last_mut() {
            *last = c;
        }
    }

    fn push(&mut self, c: u8) -> Result<(), ConfigError> {
        self.buf
            .try_reserve(1)
            .map_err(|_| ConfigError::OutOfMemory)?;
        self.buf.push(c);
        Ok(())
    }

    fn malformed(&self, reason: Malformed) -> ConfigError {
        ConfigError::Malformed {
            line: self.line,
            reason,
        }
    }
}

/// Parse a whole binding file
pub fn parse_bindings(input: &[u8], max_combo: usize) -> Result<BindingStore, ConfigError> {
    let mut parser = ConfigParser::new(max_combo)?;
    parser.feed(input)?;
    parser.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<BindingStore, ConfigError> {
        parse_bindings(input.as_bytes(), 5)
    }

    fn args(binding: &Binding) -> Vec<String> {
        binding
            .argv()
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    fn only(store: &BindingStore) -> &Binding {
        assert_eq!(store.len(), 1);
        store.iter().next().unwrap()
    }

    fn reason(err: ConfigError) -> (usize, Malformed) {
        match err {
            ConfigError::Malformed { line, reason } => (line, reason),
            other => panic!("expected malformed config, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_counts_only_binding_records() {
        let store = parse(
            "# launchers\n\
             \n\
             28:xterm\n\
             \t  \n\
             # 1:ignored\n\
             29;56:firefox --new-window\n\
             114:amixer set Master 5%-",
        )
        .unwrap();
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_parse_multi_key_record() {
        let store = parse("1;2:notify-send \"hi\"").unwrap();
        let binding = only(&store);
        assert_eq!(binding.keys(), &[1, 2]);
        assert_eq!(args(binding), vec!["notify-send", "\"hi\""]);
    }

    #[test]
    fn test_parse_sorts_and_dedups_keycodes() {
        let store = parse("56;29;56:true").unwrap();
        assert_eq!(only(&store).keys(), &[29, 56]);
    }

    #[test]
    fn test_parse_ignores_whitespace_outside_command() {
        let store = parse("   1 ; 2\t:  ls   -la\t\t/tmp   \n").unwrap();
        let binding = only(&store);
        assert_eq!(binding.keys(), &[1, 2]);
        assert_eq!(args(binding), vec!["ls", "-la", "/tmp"]);
    }

    #[test]
    fn test_parse_escape_sequences() {
        let store = parse(r"1:a\ b\\c\nd").unwrap();
        assert_eq!(args(only(&store)), vec!["a b\\c\nd"]);
    }

    #[test]
    fn test_parse_escaped_tab_and_space_join_tokens() {
        let store = parse("1:echo a\\\tb c\\ d").unwrap();
        assert_eq!(args(only(&store)), vec!["echo", "a\tb", "c d"]);
    }

    #[test]
    fn test_parse_invalid_escape_keeps_backslash() {
        let store = parse(r"1:printf \x41 \q").unwrap();
        assert_eq!(args(only(&store)), vec!["printf", "\\x41", "\\q"]);
    }

    #[test]
    fn test_parse_trailing_backslash_is_literal() {
        let store = parse("1:echo \\\n2:echo \\").unwrap();
        let all: Vec<_> = store.iter().map(args).collect();
        assert_eq!(all, vec![vec!["echo", "\\"], vec!["echo", "\\"]]);
    }

    #[test]
    fn test_parse_separators_and_hash_in_command_are_literal() {
        let store = parse("7:echo a:b;c #not-a-comment").unwrap();
        assert_eq!(args(only(&store)), vec!["echo", "a:b;c", "#not-a-comment"]);
    }

    #[test]
    fn test_parse_comment_decided_by_first_character() {
        let store = parse("   #1;2:ls\n\t# another\n").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_parse_keeps_non_utf8_bytes() {
        let store = parse_bindings(b"3:echo \xff\xfe", 5).unwrap();
        let binding = only(&store);
        assert_eq!(binding.argv()[1], OsString::from_vec(vec![0xff, 0xfe]));
    }

    #[test]
    fn test_parse_max_length_keycode() {
        let store = parse("9999999:true").unwrap();
        assert_eq!(only(&store).keys(), &[9_999_999]);
    }

    #[test]
    fn test_parse_empty_field() {
        assert_eq!(reason(parse(":cmd").unwrap_err()), (1, Malformed::EmptyField));
        assert_eq!(reason(parse("1;;2:cmd").unwrap_err()), (1, Malformed::EmptyField));
    }

    #[test]
    fn test_parse_keycode_too_long() {
        assert_eq!(
            reason(parse("12345678:cmd").unwrap_err()),
            (1, Malformed::KeycodeTooLong { max: 7 })
        );
    }

    #[test]
    fn test_parse_too_many_keycodes() {
        let err = parse_bindings(b"1;2;3:cmd", 2).unwrap_err();
        assert_eq!(reason(err), (1, Malformed::TooManyKeycodes { max: 2 }));

        assert!(parse_bindings(b"1;2:cmd", 2).is_ok());
    }

    #[test]
    fn test_parse_invalid_keycode_character() {
        assert_eq!(
            reason(parse("\n1a:cmd").unwrap_err()),
            (2, Malformed::InvalidKeycode { found: 'a' })
        );
        // '#' only starts a comment at the beginning of a line
        assert_eq!(
            reason(parse("1#x:cmd").unwrap_err()),
            (1, Malformed::InvalidKeycode { found: '#' })
        );
    }

    #[test]
    fn test_parse_missing_command() {
        assert_eq!(
            reason(parse("1:ls\n1;2\n3:ls").unwrap_err()),
            (2, Malformed::MissingCommand)
        );
        assert_eq!(reason(parse("42").unwrap_err()), (1, Malformed::MissingCommand));
        assert_eq!(reason(parse("42:   \n").unwrap_err()), (1, Malformed::MissingCommand));
    }

    #[test]
    fn test_parse_error_discards_earlier_bindings() {
        let result = parse("1:true\n2;3:false\n:cmd\n4:true");
        assert_eq!(reason(result.unwrap_err()), (3, Malformed::EmptyField));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let text = "# x\n1;2:a\\ b c\n3:d\n";
        assert_eq!(parse(text).unwrap(), parse(text).unwrap());
    }

    #[test]
    fn test_feed_in_chunks_matches_whole_parse() {
        let text = b"29;56:firefox --new\\ window\n# c\n114:amixer\\\\ x";
        let mut parser = ConfigParser::new(5).unwrap();
        for chunk in text.chunks(3) {
            parser.feed(chunk).unwrap();
        }
        assert_eq!(parser.finish().unwrap(), parse_bindings(text, 5).unwrap());
    }
}
