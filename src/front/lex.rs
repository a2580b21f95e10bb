//! The lexer.
//!
//! Single-pass, regex-matcher-table driven, filled in with the full token
//! set: punctuation, the two-character operators, literals, and keywords,
//! plus `//` line comments.

use regex::Regex;

/// A token together with the source text it was matched from.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} {:?}", self.kind, self.text)
    }
}

/// Token classes.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Ident,
    Int(i32),
    Str(String),
    True,
    False,
    Print,
    Size,
    Let,
    While,
    If,
    Else,
    Function,
    Return,
    Semi,
    Assign,
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Bang,
    EqEq,
    BangEq,
    Lt,
    Lte,
    Gt,
    Gte,
    AndAnd,
    OrOr,
}

pub struct LexError {
    pub offset: usize,
    pub ch: char,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unexpected character {:?} at byte {}", self.ch, self.offset)
    }
}

impl std::fmt::Debug for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for LexError {}

/// Fixed punctuation table, longest-first so prefixes never shadow their
/// longer relatives (e.g. `==` is tried before `=`).
fn fixed_tokens() -> &'static [(&'static str, fn() -> TokenKind)] {
    &[
        ("==", || TokenKind::EqEq),
        ("!=", || TokenKind::BangEq),
        ("<=", || TokenKind::Lte),
        (">=", || TokenKind::Gte),
        ("&&", || TokenKind::AndAnd),
        ("||", || TokenKind::OrOr),
        (";", || TokenKind::Semi),
        ("=", || TokenKind::Assign),
        ("(", || TokenKind::LParen),
        (")", || TokenKind::RParen),
        ("+", || TokenKind::Plus),
        ("-", || TokenKind::Minus),
        ("*", || TokenKind::Star),
        ("/", || TokenKind::Slash),
        ("%", || TokenKind::Percent),
        ("^", || TokenKind::Caret),
        ("{", || TokenKind::LBrace),
        ("}", || TokenKind::RBrace),
        ("[", || TokenKind::LBracket),
        ("]", || TokenKind::RBracket),
        (",", || TokenKind::Comma),
        ("<", || TokenKind::Lt),
        (">", || TokenKind::Gt),
        ("!", || TokenKind::Bang),
    ]
}

fn keyword(word: &str) -> Option<TokenKind> {
    Some(match word {
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "print" => TokenKind::Print,
        "size" => TokenKind::Size,
        "let" => TokenKind::Let,
        "while" => TokenKind::While,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "function" => TokenKind::Function,
        "return" => TokenKind::Return,
        _ => return None,
    })
}

pub struct Lexer<'input> {
    input: &'input str,
    pos: usize,
    whitespace: Regex,
    ident: Regex,
    int: Regex,
    string: Regex,
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        log::debug!("lexing {} bytes of source", input.len());
        Lexer {
            input,
            pos: 0,
            whitespace: Regex::new(r"\A(?:[ \t\r\n]|//[^\n]*)*").unwrap(),
            ident: Regex::new(r"\A[A-Za-z_][A-Za-z0-9_]*").unwrap(),
            int: Regex::new(r"\A[0-9]+").unwrap(),
            string: Regex::new(r#"\A"([^"\\]|\\.)*""#).unwrap(),
        }
    }

    /// Has the lexer reached the end of input?
    pub fn end_of_input(&self) -> bool {
        self.pos == self.input.len()
    }

    fn skip_whitespace(&mut self) {
        if let Some(m) = self.whitespace.find(&self.input[self.pos..]) {
            self.pos += m.end();
        }
    }

    /// Get the next token, if any.
    ///
    /// The return type distinguishes between end-of-input and lexer error.
    pub fn next(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_whitespace();
        if self.end_of_input() {
            return Ok(None);
        }
        let rest = &self.input[self.pos..];

        if let Some(m) = self.string.find(rest) {
            let text = m.as_str().to_string();
            let inner = text[1..text.len() - 1].to_string();
            self.pos += m.end();
            return Ok(Some(Token {
                kind: TokenKind::Str(unescape(&inner)),
                text,
            }));
        }

        if let Some(m) = self.int.find(rest) {
            let text = m.as_str().to_string();
            self.pos += m.end();
            let value: i32 = text.parse().expect("regex guarantees a valid integer");
            return Ok(Some(Token {
                kind: TokenKind::Int(value),
                text,
            }));
        }

        if let Some(m) = self.ident.find(rest) {
            let text = m.as_str().to_string();
            self.pos += m.end();
            let kind = keyword(&text).unwrap_or(TokenKind::Ident);
            return Ok(Some(Token { kind, text }));
        }

        for (pattern, build) in fixed_tokens() {
            if rest.starts_with(pattern) {
                self.pos += pattern.len();
                return Ok(Some(Token {
                    kind: build(),
                    text: (*pattern).to_string(),
                }));
            }
        }

        let ch = rest.chars().next().expect("not at end of input");
        Err(LexError {
            offset: self.pos,
            ch,
        })
    }

    /// Lex the entire input eagerly into a vector of tokens.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut out = Vec::new();
        while let Some(tok) = self.next()? {
            out.push(tok);
        }
        Ok(out)
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn let_binding() {
        assert_eq!(
            kinds("let x = 3;"),
            vec![
                TokenKind::Let,
                TokenKind::Ident,
                TokenKind::Assign,
                TokenKind::Int(3),
                TokenKind::Semi,
            ]
        );
    }

    #[test]
    fn two_char_operators_precede_prefixes() {
        assert_eq!(kinds("<="), vec![TokenKind::Lte]);
        assert_eq!(kinds("=="), vec![TokenKind::EqEq]);
        assert_eq!(kinds("&&"), vec![TokenKind::AndAnd]);
        assert_eq!(kinds("< ="), vec![TokenKind::Lt, TokenKind::Assign]);
    }

    #[test]
    fn comments_and_whitespace_are_skipped() {
        assert_eq!(
            kinds("let x = 1; // a comment\nlet y = 2;"),
            vec![
                TokenKind::Let,
                TokenKind::Ident,
                TokenKind::Assign,
                TokenKind::Int(1),
                TokenKind::Semi,
                TokenKind::Let,
                TokenKind::Ident,
                TokenKind::Assign,
                TokenKind::Int(2),
                TokenKind::Semi,
            ]
        );
    }

    #[test]
    fn string_literal() {
        assert_eq!(
            kinds("\"hello\""),
            vec![TokenKind::Str("hello".to_string())]
        );
    }

    #[test]
    fn keywords_are_not_identifiers() {
        assert_eq!(
            kinds("true false if else while function return print size"),
            vec![
                TokenKind::True,
                TokenKind::False,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::While,
                TokenKind::Function,
                TokenKind::Return,
                TokenKind::Print,
                TokenKind::Size,
            ]
        );
    }

    #[test]
    fn unexpected_character_is_reported() {
        let err = Lexer::new("let x = @;").tokenize().unwrap_err();
        assert_eq!(err.ch, '@');
        assert_eq!(err.offset, 8);
    }
}
