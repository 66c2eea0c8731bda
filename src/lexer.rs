use std::fmt;

use crate::ast::Token;

/// Line/column location in the script source, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Position { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// A token together with the position of its first character.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{position}: {message}")]
pub struct LexError {
    pub position: Position,
    pub message: String,
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.position += 1;
    }

    fn here(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn error(&self, position: Position, message: impl Into<String>) -> LexError {
        LexError {
            position,
            message: message.into(),
        }
    }

    /// Skips whitespace and `--` line comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.current_char() {
                Some(ch) if ch.is_whitespace() => self.advance(),
                Some('-') if self.peek_char(1) == Some('-') => {
                    while let Some(ch) = self.current_char() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_string(&mut self, quote: char) -> Result<String, LexError> {
        let start = self.here();
        let mut result = String::new();
        self.advance(); // opening quote

        while let Some(ch) = self.current_char() {
            if ch == quote {
                if self.peek_char(1) == Some(quote) {
                    result.push(quote);
                    self.advance();
                    self.advance();
                    continue;
                }
                self.advance();
                return Ok(result);
            }
            result.push(ch);
            self.advance();
        }

        Err(self.error(start, "unterminated string: missing closing quote"))
    }

    fn read_number(&mut self) -> Result<Token, LexError> {
        let start = self.here();
        let mut number = String::new();
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.'
                && !is_float
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if is_float {
            number
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| self.error(start, format!("invalid number '{}'", number)))
        } else {
            number
                .parse::<i64>()
                .map(Token::Integer)
                .map_err(|_| self.error(start, format!("integer '{}' out of range", number)))
        }
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    fn double(&mut self, token: Token) -> Token {
        self.advance();
        self.advance();
        token
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.next_spanned().map(|spanned| spanned.token)
    }

    pub fn next_spanned(&mut self) -> Result<Spanned, LexError> {
        self.skip_trivia();
        let position = self.here();

        let token = match self.current_char() {
            None => Token::Eof,
            Some(',') => self.single(Token::Comma),
            Some(';') => self.single(Token::Semicolon),
            Some('(') => self.single(Token::LParen),
            Some(')') => self.single(Token::RParen),
            Some('+') => self.single(Token::Plus),
            Some('-') => self.single(Token::Minus),
            Some('*') => self.single(Token::Star),
            Some('/') => self.single(Token::Slash),
            Some('%') => self.single(Token::Percent),
            Some('=') => {
                if self.peek_char(1) == Some('=') {
                    self.double(Token::Eq)
                } else {
                    self.single(Token::Eq)
                }
            }
            Some('!') => {
                if self.peek_char(1) == Some('=') {
                    self.double(Token::NotEq)
                } else {
                    return Err(self.error(position, "unexpected '!' (did you mean '!='?)"));
                }
            }
            Some('<') => match self.peek_char(1) {
                Some('=') => self.double(Token::LtEq),
                Some('>') => self.double(Token::NotEq),
                _ => self.single(Token::Lt),
            },
            Some('>') => {
                if self.peek_char(1) == Some('=') {
                    self.double(Token::GtEq)
                } else {
                    self.single(Token::Gt)
                }
            }
            Some(quote @ ('\'' | '"')) => Token::String(self.read_string(quote)?),
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();
                Token::keyword(&ident).unwrap_or(Token::Identifier(ident))
            }
            Some(ch) if ch.is_ascii_digit() => self.read_number()?,
            Some(ch) => {
                return Err(self.error(position, format!("unexpected character '{}'", ch)));
            }
        };

        Ok(Spanned { token, position })
    }

    /// Lexes the whole input, ending with a single [`Token::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<Spanned>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let spanned = self.next_spanned()?;
            let done = spanned.token == Token::Eof;
            tokens.push(spanned);
            if done {
                return Ok(tokens);
            }
        }
    }
}

#[test]
fn test_keywords() {
    let mut lexer = Lexer::new("SELECT from Where and or true false null");
    assert_eq!(lexer.next_token().unwrap(), Token::Select);
    assert_eq!(lexer.next_token().unwrap(), Token::From);
    assert_eq!(lexer.next_token().unwrap(), Token::Where);
    assert_eq!(lexer.next_token().unwrap(), Token::And);
    assert_eq!(lexer.next_token().unwrap(), Token::Or);
    assert_eq!(lexer.next_token().unwrap(), Token::Boolean(true));
    assert_eq!(lexer.next_token().unwrap(), Token::Boolean(false));
    assert_eq!(lexer.next_token().unwrap(), Token::Null);
}

#[test]
fn test_positions() {
    let mut lexer = Lexer::new("select\n  1 as num");
    assert_eq!(lexer.next_spanned().unwrap().position, Position::new(1, 1));
    let one = lexer.next_spanned().unwrap();
    assert_eq!(one.token, Token::Integer(1));
    assert_eq!(one.position, Position::new(2, 3));
}

#[test]
fn test_comment_is_skipped() {
    let mut lexer = Lexer::new("-- first row\nselect 1");
    assert_eq!(lexer.next_token().unwrap(), Token::Select);
    assert_eq!(lexer.next_token().unwrap(), Token::Integer(1));
    assert_eq!(lexer.next_token().unwrap(), Token::Eof);
}
