/// Lexical token produced by the lexer.
///
/// Keywords are matched case-insensitively. Words such as `text`, `html`,
/// `page`, `thread` or `identity` are only meaningful in one position of the
/// grammar, so they stay [`Token::Identifier`] and the parser checks them by
/// name.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    /// Floating-point number
    ///
    /// # Examples
    /// ```text
    /// 6.78
    /// 0.5
    /// ```
    Float(f64),

    /// Integer
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 6566
    /// ```
    Integer(i64),

    /// String literal in single or double quotes
    ///
    /// Contents are raw: backslashes are kept so regular expressions survive
    /// untouched. A doubled quote stands for one quote character.
    ///
    /// # Examples
    /// ```text
    /// 'http://mock.com'
    /// '[\d\.]+'
    /// 'it''s'
    /// ```
    String(String),

    /// Boolean values
    Boolean(bool),

    /// Null value
    Null,

    /// Column, buffer or contextual keyword name
    ///
    /// # Examples
    /// ```text
    /// temp
    /// id
    /// nodes
    /// ```
    Identifier(String),

    // Statement keywords
    Select,
    From,
    Where,
    As,
    Create,
    Buffer,
    Insert,
    Into,
    Download,
    With,

    // Extraction keywords
    /// `pick '<selector>'`
    Pick,
    /// `take text | html | attribute '<name>'`
    Take,
    /// `match '<regex>'`
    Match,
    /// `replace '<template>'`
    Replace,

    // Case keywords
    Case,
    When,
    Then,
    Else,
    End,

    // Comparison
    /// Equality (`=` or `==`)
    Eq,

    /// Inequality (`!=` or `<>`)
    NotEq,

    /// Less than
    Lt,

    /// Greater than
    Gt,

    /// Less than or equal
    LtEq,

    /// Greater than or equal
    GtEq,

    // Arithmetic
    /// Addition or string concatenation
    Plus,

    /// Subtraction or unary minus
    Minus,

    /// Multiplication, or `select *`
    Star,

    /// Division
    Slash,

    /// Modulo
    Percent,

    // Logical
    /// Logical AND (word, not symbol)
    ///
    /// # Examples
    /// ```text
    /// id < 5 and id > 2
    /// ```
    And,

    /// Logical OR (word, not symbol)
    Or,

    /// Logical NOT (word, not symbol)
    Not,

    // Delimiters
    /// Left parenthesis for grouping, column lists and nested selects
    LParen,

    /// Right parenthesis
    RParen,

    /// Comma separating projections, columns and hints
    Comma,

    /// Optional statement terminator
    Semicolon,

    /// End of file
    Eof,
}

impl Token {
    /// Maps a word to its keyword token, if it is one.
    pub fn keyword(word: &str) -> Option<Token> {
        let token = match word.to_ascii_lowercase().as_str() {
            "select" => Token::Select,
            "from" => Token::From,
            "where" => Token::Where,
            "as" => Token::As,
            "create" => Token::Create,
            "buffer" => Token::Buffer,
            "insert" => Token::Insert,
            "into" => Token::Into,
            "download" => Token::Download,
            "with" => Token::With,
            "pick" => Token::Pick,
            "take" => Token::Take,
            "match" => Token::Match,
            "replace" => Token::Replace,
            "case" => Token::Case,
            "when" => Token::When,
            "then" => Token::Then,
            "else" => Token::Else,
            "end" => Token::End,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "true" => Token::Boolean(true),
            "false" => Token::Boolean(false),
            "null" => Token::Null,
            _ => return None,
        };
        Some(token)
    }

    /// True for an identifier equal to `word`, ignoring ASCII case.
    pub fn is_word(&self, word: &str) -> bool {
        matches!(self, Token::Identifier(name) if name.eq_ignore_ascii_case(word))
    }
}
