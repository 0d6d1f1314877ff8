// src/parser.rs

/// One span of a scanned expression: either literal text or the inner text
/// of a recognized token. Literal spans are always maximal, so two literals
/// never follow each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece<'a> {
    Literal(&'a str),
    Token(&'a str),
}

/// Cursor over an expression string. Byte offsets always sit on char
/// boundaries.
pub struct Scanner<'a> {
    s: &'a str,
    i: usize,
    lit_start: usize,
    out: Vec<Piece<'a>>,
}

impl<'a> Scanner<'a> {
    pub fn new(s: &'a str) -> Self {
        Self { s, i: 0, lit_start: 0, out: Vec::new() }
    }

    /// Splits `[path]` tokens from the surrounding text.
    ///
    /// A token closes at the first `]`. A `[` met before that closing
    /// bracket restarts the attempt at the new `[`, so the abandoned text
    /// stays literal. Empty `[]` and unterminated `[` are literal too.
    pub fn brackets(mut self) -> Vec<Piece<'a>> {
        while let Some(c) = self.peek_char() {
            if c != '[' {
                self.bump(c);
                continue;
            }
            let open = self.i;
            self.i += 1;
            let start = self.i;
            while let Some(c) = self.peek_char() {
                match c {
                    ']' if self.i > start => {
                        let inner = &self.s[start..self.i];
                        self.i += 1;
                        self.push_token(open, inner);
                        break;
                    }
                    ']' => {
                        self.i += 1;
                        break;
                    }
                    '[' => break,
                    _ => self.bump(c),
                }
            }
        }
        self.finish()
    }

    /// Splits `{{inner}}` tokens from the surrounding text. `inner` must be
    /// non-empty and must not contain `}`.
    pub fn braces(mut self) -> Vec<Piece<'a>> {
        while let Some(c) = self.peek_char() {
            if !self.peek_str("{{") {
                self.bump(c);
                continue;
            }
            let open = self.i;
            let start = open + 2;
            match self.s[start..].find('}') {
                Some(k) if k > 0 && self.s[start + k..].starts_with("}}") => {
                    let inner = &self.s[start..start + k];
                    self.i = start + k + 2;
                    self.push_token(open, inner);
                }
                _ => self.i = open + 1,
            }
        }
        self.finish()
    }

    fn push_token(&mut self, open: usize, inner: &'a str) {
        if open > self.lit_start {
            self.out.push(Piece::Literal(&self.s[self.lit_start..open]));
        }
        self.out.push(Piece::Token(inner));
        self.lit_start = self.i;
    }

    fn finish(mut self) -> Vec<Piece<'a>> {
        if self.s.len() > self.lit_start {
            self.out.push(Piece::Literal(&self.s[self.lit_start..]));
        }
        self.out
    }

    fn bump(&mut self, c: char) {
        self.i += c.len_utf8();
    }

    pub fn peek_char(&self) -> Option<char> {
        self.s[self.i..].chars().next()
    }

    pub fn peek_str(&self, lit: &str) -> bool {
        self.s[self.i..].starts_with(lit)
    }
}
