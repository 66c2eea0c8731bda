use std::mem;

use crate::{
    ast::{
        BinOp, CaseExpr, ColumnDef, DownloadExpr, DownloadKind, Expr, PickExpr, Program,
        Projection, SelectStatement, Source, Statement, TableHint, Take, Token, UrlSource,
        WhenClause,
    },
    lexer::{LexError, Lexer, Position},
};

/// Lexing or parsing failure. No partial AST is ever returned alongside it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("syntax error at {position}: {message}")]
pub struct SyntaxError {
    pub position: Position,
    pub message: String,
}

impl From<LexError> for SyntaxError {
    fn from(e: LexError) -> Self {
        SyntaxError {
            position: e.position,
            message: e.message,
        }
    }
}

type ParseResult<T> = Result<T, SyntaxError>;

pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    current_position: Position,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> ParseResult<Self> {
        let first = lexer.next_spanned()?;
        Ok(Parser {
            lexer,
            current_token: first.token,
            current_position: first.position,
        })
    }

    fn advance(&mut self) -> ParseResult<()> {
        let next = self.lexer.next_spanned()?;
        self.current_token = next.token;
        self.current_position = next.position;
        Ok(())
    }

    fn error<T>(&self, message: impl Into<String>) -> ParseResult<T> {
        Err(SyntaxError {
            position: self.current_position,
            message: message.into(),
        })
    }

    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        if !self.check(&expected) {
            return self.error(format!(
                "expected {:?}, got {:?}",
                expected, self.current_token
            ));
        }
        self.advance()
    }

    fn check(&self, token: &Token) -> bool {
        mem::discriminant(&self.current_token) == mem::discriminant(token)
    }

    fn expect_identifier(&mut self, what: &str) -> ParseResult<String> {
        match &self.current_token {
            Token::Identifier(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(name)
            }
            other => self.error(format!("expected {}, got {:?}", what, other)),
        }
    }

    fn expect_string(&mut self, what: &str) -> ParseResult<String> {
        match &self.current_token {
            Token::String(s) => {
                let s = s.clone();
                self.advance()?;
                Ok(s)
            }
            other => self.error(format!("expected {} in quotes, got {:?}", what, other)),
        }
    }

    fn expect_word(&mut self, word: &str) -> ParseResult<()> {
        if !self.current_token.is_word(word) {
            return self.error(format!("expected '{}', got {:?}", word, self.current_token));
        }
        self.advance()
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Parse a complete script
    pub fn parse_program(&mut self) -> ParseResult<Program> {
        let mut statements = vec![];

        loop {
            while self.check(&Token::Semicolon) {
                self.advance()?;
            }
            if self.check(&Token::Eof) {
                break;
            }
            statements.push(self.parse_statement()?);
        }

        Ok(Program { statements })
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        match &self.current_token {
            Token::Create => self.parse_create_buffer(),
            Token::Insert => self.parse_insert(),
            Token::Select => Ok(Statement::Select(self.parse_select()?)),
            other => self.error(format!(
                "expected 'create', 'insert' or 'select', got {:?}",
                other
            )),
        }
    }

    fn parse_create_buffer(&mut self) -> ParseResult<Statement> {
        let position = self.current_position;
        self.advance()?; // create
        self.expect(Token::Buffer)?;
        let name = self.expect_identifier("buffer name")?;
        self.expect(Token::LParen)?;

        let mut columns = vec![];
        loop {
            let column_position = self.current_position;
            let column_name = self.expect_identifier("column name")?;
            let type_name = self.expect_identifier("column type")?;
            let mut identity = type_name.eq_ignore_ascii_case("identity");
            if self.current_token.is_word("identity") {
                self.advance()?;
                identity = true;
            }
            columns.push(ColumnDef {
                name: column_name,
                type_name,
                identity,
                position: column_position,
            });

            if self.check(&Token::Comma) {
                self.advance()?;
            } else {
                break;
            }
        }
        self.expect(Token::RParen)?;

        Ok(Statement::CreateBuffer {
            name,
            columns,
            position,
        })
    }

    fn parse_insert(&mut self) -> ParseResult<Statement> {
        let position = self.current_position;
        self.advance()?; // insert
        self.expect(Token::Into)?;
        let target = self.expect_identifier("buffer name")?;

        let columns = if self.check(&Token::LParen) {
            self.advance()?;
            let mut names = vec![self.expect_identifier("column name")?];
            while self.check(&Token::Comma) {
                self.advance()?;
                names.push(self.expect_identifier("column name")?);
            }
            self.expect(Token::RParen)?;
            Some(names)
        } else {
            None
        };

        if !self.check(&Token::Select) {
            return self.error(format!(
                "expected 'select' after 'insert into {}', got {:?}",
                target, self.current_token
            ));
        }
        let select = self.parse_select()?;

        Ok(Statement::Insert {
            target,
            columns,
            select: Box::new(select),
            position,
        })
    }

    fn parse_select(&mut self) -> ParseResult<SelectStatement> {
        let position = self.current_position;
        self.expect(Token::Select)?;

        let mut projections = vec![self.parse_projection()?];
        while self.check(&Token::Comma) {
            self.advance()?;
            projections.push(self.parse_projection()?);
        }

        let source = if self.check(&Token::From) {
            self.advance()?;
            Some(self.parse_source()?)
        } else {
            None
        };

        let filter = if self.check(&Token::Where) {
            self.advance()?;
            Some(self.parse_expression()?)
        } else {
            None
        };

        let hints = self.parse_hints()?;

        Ok(SelectStatement::new(
            projections,
            source,
            filter,
            hints,
            position,
        ))
    }

    fn parse_projection(&mut self) -> ParseResult<Projection> {
        if self.check(&Token::Star) {
            let position = self.current_position;
            self.advance()?;
            return Ok(Projection::Star(position));
        }

        let expr = self.parse_expression()?;
        let alias = if self.check(&Token::As) {
            self.advance()?;
            match mem::replace(&mut self.current_token, Token::Eof) {
                Token::Identifier(name) | Token::String(name) => {
                    self.advance()?;
                    Some(name)
                }
                other => {
                    self.current_token = other;
                    return self.error(format!(
                        "expected alias after 'as', got {:?}",
                        self.current_token
                    ));
                }
            }
        } else {
            None
        };

        Ok(Projection::Item { expr, alias })
    }

    fn parse_source(&mut self) -> ParseResult<Source> {
        let position = self.current_position;
        match &self.current_token {
            Token::Download => {
                self.advance()?;
                let kind = if self.current_token.is_word("page") {
                    DownloadKind::Page
                } else if self.current_token.is_word("json") {
                    DownloadKind::Json
                } else if self.current_token.is_word("image") {
                    DownloadKind::Image
                } else {
                    return self.error(format!(
                        "expected 'page', 'json' or 'image' after 'download', got {:?}",
                        self.current_token
                    ));
                };
                self.advance()?;

                let urls = match &self.current_token {
                    Token::String(_) => UrlSource::Literal(self.expect_string("url")?),
                    Token::LParen => {
                        self.advance()?;
                        let select = self.parse_select()?;
                        self.expect(Token::RParen)?;
                        UrlSource::Query(Box::new(select))
                    }
                    other => {
                        return self.error(format!(
                            "expected url or '(select ..)' after 'download', got {:?}",
                            other
                        ));
                    }
                };

                let hints = self.parse_hints()?;
                Ok(Source::Download(DownloadExpr {
                    kind,
                    urls,
                    hints,
                    position,
                }))
            }
            Token::Identifier(_) => {
                let name = self.expect_identifier("buffer name")?;
                Ok(Source::Buffer { name, position })
            }
            other => self.error(format!(
                "expected 'download' or a buffer name after 'from', got {:?}",
                other
            )),
        }
    }

    /// Parse any number of `with` clauses: `with thread 4, js with (thread(2))`
    fn parse_hints(&mut self) -> ParseResult<Vec<TableHint>> {
        let mut hints = vec![];

        while self.check(&Token::With) {
            self.advance()?;
            let parenthesized = self.check(&Token::LParen);
            if parenthesized {
                self.advance()?;
            }

            hints.push(self.parse_hint()?);
            while self.check(&Token::Comma) {
                self.advance()?;
                hints.push(self.parse_hint()?);
            }

            if parenthesized {
                self.expect(Token::RParen)?;
            }
        }

        Ok(hints)
    }

    fn parse_hint(&mut self) -> ParseResult<TableHint> {
        let position = self.current_position;
        if self.current_token.is_word("js") {
            self.advance()?;
            return Ok(TableHint::Js);
        }

        self.expect_word("thread")?;
        let parenthesized = self.check(&Token::LParen);
        if parenthesized {
            self.advance()?;
        }
        let count = match self.current_token {
            Token::Integer(n) => n,
            _ => {
                return self.error(format!(
                    "expected thread count, got {:?}",
                    self.current_token
                ));
            }
        };
        self.advance()?;
        if parenthesized {
            self.expect(Token::RParen)?;
        }

        Ok(TableHint::Thread { count, position })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Parse primary expressions (atoms): literals, identifiers, pick, case, '(' ')'
    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let position = self.current_position;
        match mem::replace(&mut self.current_token, Token::Eof) {
            // Literals
            Token::Float(n) => {
                self.advance()?;
                Ok(Expr::Float(n))
            }
            Token::Integer(n) => {
                self.advance()?;
                Ok(Expr::Integer(n))
            }
            Token::String(s) => {
                self.advance()?;
                Ok(Expr::String(s))
            }
            Token::Boolean(b) => {
                self.advance()?;
                Ok(Expr::Boolean(b))
            }
            Token::Null => {
                self.advance()?;
                Ok(Expr::Null)
            }

            Token::Identifier(name) => {
                self.advance()?;
                Ok(Expr::Identifier { name, position })
            }

            Token::Pick => {
                self.advance()?;
                self.parse_pick(position)
            }

            Token::Case => {
                self.advance()?;
                self.parse_case(position)
            }

            Token::LParen => {
                self.advance()?;
                let expr = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }

            // Unary minus: fold into numeric literals, otherwise 0 - operand
            Token::Minus => {
                self.advance()?;
                match self.parse_primary()? {
                    Expr::Integer(n) => Ok(Expr::Integer(-n)),
                    Expr::Float(n) => Ok(Expr::Float(-n)),
                    operand => Ok(Expr::BinaryOp {
                        op: BinOp::Subtract,
                        left: Box::new(Expr::Integer(0)),
                        right: Box::new(operand),
                        position,
                    }),
                }
            }

            token => {
                self.current_token = token;
                self.error(format!(
                    "unexpected token in expression: {:?}",
                    self.current_token
                ))
            }
        }
    }

    fn parse_pick(&mut self, position: Position) -> ParseResult<Expr> {
        let selector = self.expect_string("selector")?;

        let take = if self.check(&Token::Take) {
            self.advance()?;
            if self.current_token.is_word("text") {
                self.advance()?;
                Some(Take::Text)
            } else if self.current_token.is_word("html") {
                self.advance()?;
                Some(Take::Html)
            } else if self.current_token.is_word("attribute") {
                self.advance()?;
                Some(Take::Attribute(self.expect_string("attribute name")?))
            } else {
                return self.error(format!(
                    "expected 'text', 'html' or 'attribute' after 'take', got {:?}",
                    self.current_token
                ));
            }
        } else {
            None
        };

        let pattern = if self.check(&Token::Match) {
            self.advance()?;
            Some(self.expect_string("regular expression")?)
        } else {
            None
        };

        let replace = if self.check(&Token::Replace) {
            if pattern.is_none() {
                return self.error("'replace' requires a preceding 'match'");
            }
            self.advance()?;
            Some(self.expect_string("replacement template")?)
        } else {
            None
        };

        Ok(Expr::Pick(PickExpr {
            selector,
            take,
            pattern,
            replace,
            position,
        }))
    }

    fn parse_case(&mut self, position: Position) -> ParseResult<Expr> {
        let subject = if self.check(&Token::When) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };

        let mut branches = vec![];
        while self.check(&Token::When) {
            self.advance()?;
            let condition = self.parse_expression()?;
            self.expect(Token::Then)?;
            let result = self.parse_expression()?;
            branches.push(WhenClause { condition, result });
        }
        if branches.is_empty() {
            return self.error("'case' requires at least one 'when' branch");
        }

        let otherwise = if self.check(&Token::Else) {
            self.advance()?;
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        self.expect(Token::End)?;

        Ok(Expr::Case(CaseExpr {
            subject,
            branches,
            otherwise,
            position,
        }))
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_primary()?;

        loop {
            let op = match &self.current_token {
                Token::Star => BinOp::Multiply,
                Token::Slash => BinOp::Divide,
                Token::Percent => BinOp::Modulo,
                _ => break,
            };

            let position = self.current_position;
            self.advance()?;
            let right = self.parse_primary()?;

            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
                position,
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match &self.current_token {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Subtract,
                _ => break,
            };

            let position = self.current_position;
            self.advance()?;
            let right = self.parse_multiplicative()?;

            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
                position,
            };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_additive()?;

        if let Some(op) = match &self.current_token {
            Token::Eq => Some(BinOp::Equal),
            Token::NotEq => Some(BinOp::NotEqual),
            Token::Lt => Some(BinOp::LessThan),
            Token::Gt => Some(BinOp::GreaterThan),
            Token::LtEq => Some(BinOp::LessEqual),
            Token::GtEq => Some(BinOp::GreaterEqual),
            _ => None,
        } {
            let position = self.current_position;
            self.advance()?;
            let right = self.parse_additive()?;

            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
                position,
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> ParseResult<Expr> {
        if self.check(&Token::Not) {
            self.advance()?;
            let operand = self.parse_not()?;
            return Ok(Expr::Not(Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_not()?;

        while self.check(&Token::And) {
            let position = self.current_position;
            self.advance()?;
            let right = self.parse_not()?;

            left = Expr::BinaryOp {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
                position,
            };
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_and()?;

        while self.check(&Token::Or) {
            let position = self.current_position;
            self.advance()?;
            let right = self.parse_and()?;

            left = Expr::BinaryOp {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
                position,
            };
        }
        Ok(left)
    }

    pub fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.parse_or()
    }

    /// Parse a standalone expression that must span the whole input
    pub fn parse(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_expression()?;
        self.expect(Token::Eof)?;
        Ok(expr)
    }
}

/// Lex and parse a whole script.
pub fn parse_program(source: &str) -> ParseResult<Program> {
    Parser::new(Lexer::new(source))?.parse_program()
}
