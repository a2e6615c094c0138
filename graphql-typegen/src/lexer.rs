//! Hand written lexer for executable documents.
//!
//! Grammar: <https://spec.graphql.org/October2021/#sec-Language.Source-Text>

use displaydoc::Display;
use thiserror::Error;

use crate::ast::Positioned;
use crate::ast::SourcePosition;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Name(String),
    Int(i64),
    Float(f64),
    String(String),
    Bang,
    Dollar,
    ParenL,
    ParenR,
    Spread,
    Colon,
    Equals,
    At,
    BracketL,
    BracketR,
    BraceL,
    BraceR,
    Pipe,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Name(name) => write!(f, "name '{name}'"),
            Token::Int(i) => write!(f, "integer '{i}'"),
            Token::Float(v) => write!(f, "float '{v}'"),
            Token::String(_) => write!(f, "string literal"),
            Token::Bang => write!(f, "'!'"),
            Token::Dollar => write!(f, "'$'"),
            Token::ParenL => write!(f, "'('"),
            Token::ParenR => write!(f, "')'"),
            Token::Spread => write!(f, "'...'"),
            Token::Colon => write!(f, "':'"),
            Token::Equals => write!(f, "'='"),
            Token::At => write!(f, "'@'"),
            Token::BracketL => write!(f, "'['"),
            Token::BracketR => write!(f, "']'"),
            Token::BraceL => write!(f, "'{{'"),
            Token::BraceR => write!(f, "'}}'"),
            Token::Pipe => write!(f, "'|'"),
        }
    }
}

#[derive(Error, Debug, Display, Clone, PartialEq, Eq)]
pub enum LexError {
    /// unexpected character '{0}'
    UnexpectedCharacter(char),
    /// unterminated string literal
    UnterminatedString,
    /// invalid escape sequence '{0}'
    InvalidEscape(String),
    /// invalid number literal '{0}'
    InvalidNumber(String),
}

pub struct Lexer<'s> {
    chars: std::iter::Peekable<std::str::Chars<'s>>,
    line: usize,
    column: usize,
}

impl<'s> Lexer<'s> {
    pub fn new(source: &'s str) -> Self {
        Lexer {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    // not named `position`, which `Iterator::position` would shadow on the
    // `&mut self` receiver in `next`
    fn current_position(&self) -> SourcePosition {
        SourcePosition::new(self.line, self.column)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek() == Some(&expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Whitespace, commas and comments are all insignificant.
    fn skip_ignored(&mut self) {
        while let Some(&c) = self.chars.peek() {
            match c {
                ' ' | '\t' | '\r' | '\n' | ',' | '\u{feff}' => {
                    self.bump();
                }
                '#' => {
                    while let Some(&c) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_name(&mut self, first: char) -> Token {
        let mut name = String::new();
        name.push(first);
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Token::Name(name)
    }

    // IntValue / FloatValue: https://spec.graphql.org/October2021/#sec-Int-Value
    fn lex_number(&mut self, first: char) -> Result<Token, LexError> {
        let mut text = String::new();
        text.push(first);
        let mut is_float = false;

        if first == '-' {
            match self.bump() {
                Some(c @ '0'..='9') => text.push(c),
                _ => return Err(LexError::InvalidNumber(text)),
            }
        }
        // no leading zeros
        let leading_zero = text.ends_with('0');
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                if leading_zero {
                    text.push(c);
                    return Err(LexError::InvalidNumber(text));
                }
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if self.chars.peek() == Some(&'.') {
            is_float = true;
            text.push('.');
            self.bump();
            self.lex_digits(&mut text)?;
        }
        if matches!(self.chars.peek(), Some('e' | 'E')) {
            is_float = true;
            text.push('e');
            self.bump();
            if let Some(&sign @ ('+' | '-')) = self.chars.peek() {
                text.push(sign);
                self.bump();
            }
            self.lex_digits(&mut text)?;
        }
        // a number must not run straight into a name
        if matches!(self.chars.peek(), Some(c) if c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
        {
            return Err(LexError::InvalidNumber(text));
        }
        if is_float {
            text.parse()
                .map(Token::Float)
                .map_err(|_| LexError::InvalidNumber(text))
        } else {
            text.parse()
                .map(Token::Int)
                .map_err(|_| LexError::InvalidNumber(text))
        }
    }

    fn lex_digits(&mut self, text: &mut String) -> Result<(), LexError> {
        let mut any = false;
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
                any = true;
            } else {
                break;
            }
        }
        if any {
            Ok(())
        } else {
            Err(LexError::InvalidNumber(text.clone()))
        }
    }

    fn lex_string(&mut self) -> Result<Token, LexError> {
        if self.eat('"') {
            if self.eat('"') {
                return self.lex_block_string();
            }
            // the empty string: `""`
            return Ok(Token::String(String::new()));
        }
        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(LexError::UnterminatedString),
                Some('"') => return Ok(Token::String(value)),
                Some('\\') => value.push(self.lex_escape()?),
                Some(c) => value.push(c),
            }
        }
    }

    fn lex_escape(&mut self) -> Result<char, LexError> {
        match self.bump() {
            Some('"') => Ok('"'),
            Some('\\') => Ok('\\'),
            Some('/') => Ok('/'),
            Some('b') => Ok('\u{0008}'),
            Some('f') => Ok('\u{000c}'),
            Some('n') => Ok('\n'),
            Some('r') => Ok('\r'),
            Some('t') => Ok('\t'),
            Some('u') => {
                let mut hex = String::new();
                for _ in 0..4 {
                    match self.bump() {
                        Some(c) if c.is_ascii_hexdigit() => hex.push(c),
                        _ => return Err(LexError::InvalidEscape(format!("\\u{hex}"))),
                    }
                }
                u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or(LexError::InvalidEscape(format!("\\u{hex}")))
            }
            Some(c) => Err(LexError::InvalidEscape(format!("\\{c}"))),
            None => Err(LexError::UnterminatedString),
        }
    }

    // BlockString: https://spec.graphql.org/October2021/#sec-String-Value.Block-Strings
    fn lex_block_string(&mut self) -> Result<Token, LexError> {
        let mut raw = String::new();
        loop {
            match self.bump() {
                None => return Err(LexError::UnterminatedString),
                Some('"') => {
                    if self.eat('"') {
                        if self.eat('"') {
                            break;
                        }
                        raw.push_str("\"\"");
                    } else {
                        raw.push('"');
                    }
                }
                Some('\\') => {
                    // only `\"""` is an escape inside a block string; any
                    // other backslash is literal text
                    if self.chars.peek() == Some(&'"') {
                        self.bump();
                        if self.eat('"') {
                            if self.eat('"') {
                                raw.push_str("\"\"\"");
                            } else {
                                raw.push_str("\\\"\"");
                            }
                        } else {
                            raw.push_str("\\\"");
                        }
                    } else {
                        raw.push('\\');
                    }
                }
                Some(c) => raw.push(c),
            }
        }
        Ok(Token::String(dedent_block_string(&raw)))
    }
}

/// Strip the common indentation and surrounding blank lines of a block
/// string, following GraphQL's `BlockStringValue()` algorithm.
fn dedent_block_string(raw: &str) -> String {
    let lines: Vec<&str> = raw.split('\n').collect();
    let common_indent = lines
        .iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut dedented: Vec<&str> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                *line
            } else {
                line.get(common_indent.min(line.len())..).unwrap_or("")
            }
        })
        .collect();
    while dedented.first().is_some_and(|line| line.trim().is_empty()) {
        dedented.remove(0);
    }
    while dedented.last().is_some_and(|line| line.trim().is_empty()) {
        dedented.pop();
    }
    dedented.join("\n")
}

impl Iterator for Lexer<'_> {
    type Item = Result<Positioned<Token>, Positioned<LexError>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_ignored();
        let position = self.current_position();
        let c = self.bump()?;
        let token = match c {
            '!' => Ok(Token::Bang),
            '$' => Ok(Token::Dollar),
            '(' => Ok(Token::ParenL),
            ')' => Ok(Token::ParenR),
            ':' => Ok(Token::Colon),
            '=' => Ok(Token::Equals),
            '@' => Ok(Token::At),
            '[' => Ok(Token::BracketL),
            ']' => Ok(Token::BracketR),
            '{' => Ok(Token::BraceL),
            '}' => Ok(Token::BraceR),
            '|' => Ok(Token::Pipe),
            '.' => {
                if self.eat('.') && self.eat('.') {
                    Ok(Token::Spread)
                } else {
                    Err(LexError::UnexpectedCharacter('.'))
                }
            }
            '"' => self.lex_string(),
            '-' | '0'..='9' => self.lex_number(c),
            c if c.is_ascii_alphabetic() || c == '_' => Ok(self.lex_name(c)),
            c => Err(LexError::UnexpectedCharacter(c)),
        };
        Some(
            token
                .map(|token| Positioned::new(position, token))
                .map_err(|error| Positioned::new(position, error)),
        )
    }
}
