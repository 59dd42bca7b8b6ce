//! Splits an input line into the argument vector handed to the dispatcher.
//!
//! Words are separated by any of space, TAB, CR, LF or BEL. Single and double
//! quotes group characters (including separators) into one word; there are no
//! escapes and no expansion of any kind.

use crate::error::LexError;

/// Characters that end a word outside of quotes.
pub const DELIMITERS: &[char] = &[' ', '\t', '\r', '\n', '\x07'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM<'a> {
    input: std::str::Chars<'a>,
    state: LexingState,
    buffer: String,
}

impl<'a> LexingFSM<'a> {
    fn new(line: &'a str) -> Self {
        LexingFSM {
            input: line.chars(),
            state: LexingState::Start,
            buffer: String::new(),
        }
    }

    fn make_words(&mut self) -> Result<Vec<String>, LexError> {
        let mut out = Vec::new();

        while let Some(ch) = self.input.next() {
            match self.state {
                LexingState::Start => self.handle_start(ch),
                LexingState::ReadingWord => self.handle_word(ch, &mut out),
                LexingState::ReadingSingleQuote => self.handle_quote(ch, '\''),
                LexingState::ReadingDoubleQuote => self.handle_quote(ch, '"'),
            }
        }

        match self.state {
            LexingState::ReadingSingleQuote => return Err(LexError::UnfinishedQuote("single")),
            LexingState::ReadingDoubleQuote => return Err(LexError::UnfinishedQuote("double")),
            LexingState::ReadingWord => out.push(std::mem::take(&mut self.buffer)),
            LexingState::Start => {}
        }

        Ok(out)
    }

    fn handle_start(&mut self, ch: char) {
        match ch {
            c if DELIMITERS.contains(&c) => {}
            '\'' => self.state = LexingState::ReadingSingleQuote,
            '"' => self.state = LexingState::ReadingDoubleQuote,
            c => {
                self.buffer.push(c);
                self.state = LexingState::ReadingWord;
            }
        }
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<String>) {
        match ch {
            c if DELIMITERS.contains(&c) => {
                out.push(std::mem::take(&mut self.buffer));
                self.state = LexingState::Start;
            }
            '\'' => self.state = LexingState::ReadingSingleQuote,
            '"' => self.state = LexingState::ReadingDoubleQuote,
            c => self.buffer.push(c),
        }
    }

    fn handle_quote(&mut self, ch: char, closing: char) {
        if ch == closing {
            // A closed quote always leaves us inside a word, even an empty one.
            self.state = LexingState::ReadingWord;
        } else {
            self.buffer.push(ch);
        }
    }
}

/// Tokenize `line` into words. The first word, if any, is the command name.
pub fn split_into_words(line: &str) -> Result<Vec<String>, LexError> {
    LexingFSM::new(line).make_words()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(line: &str) -> Vec<String> {
        split_into_words(line).unwrap()
    }

    #[test]
    fn splits_on_every_delimiter() {
        assert_eq!(words("ls  -l\t/tmp\r\n"), vec!["ls", "-l", "/tmp"]);
        assert_eq!(words("a\x07b"), vec!["a", "b"]);
    }

    #[test]
    fn blank_line_has_no_words() {
        assert!(words("").is_empty());
        assert!(words(" \t ").is_empty());
    }

    #[test]
    fn quotes_group_separators() {
        assert_eq!(words("echo 'a b'  \"c\td\""), vec!["echo", "a b", "c\td"]);
        assert_eq!(words("pre'fix'post"), vec!["prefixpost"]);
    }

    #[test]
    fn empty_quotes_make_an_empty_word() {
        assert_eq!(words("touch ''"), vec!["touch", ""]);
    }

    #[test]
    fn dollar_is_literal() {
        assert_eq!(words("echo $HOME"), vec!["echo", "$HOME"]);
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert_eq!(
            split_into_words("echo 'oops"),
            Err(LexError::UnfinishedQuote("single"))
        );
        assert_eq!(
            split_into_words("echo \"oops"),
            Err(LexError::UnfinishedQuote("double"))
        );
    }
}
