use std::{fmt, rc::Rc};

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenType,
    pub lexeme: Rc<str>,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenType, lexeme: Rc<str>, line: usize) -> Self {
        Token { kind, lexeme, line }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Ampersand,
    Bang,

    Equal,
    EqualEqual,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    Identifier(Rc<str>),
    String(Rc<str>),
    Int(i64),
    Float(f64),
    Char(char),
    True,
    False,

    Begin,
    End,
    Declare,
    Immutable,
    IntType,
    FloatType,
    CharType,
    BoolType,
    StringType,
    Display,
    Scan,
    If,
    ElseIf,
    Else,
    For,
    While,
    Block,
    And,
    Or,
    Function,
    Return,

    Eof,
}

impl TokenType {
    /// Classifies a single word. Two-word keywords are merged by the scanner.
    pub fn keyword(word: &str) -> Option<TokenType> {
        let kind = match word {
            "SUGOD" => TokenType::Begin,
            "KATAPUSAN" => TokenType::End,
            "MUGNA" => TokenType::Declare,
            "PIRMI" => TokenType::Immutable,
            "NUMERO" => TokenType::IntType,
            "TIPIK" => TokenType::FloatType,
            "LETRA" => TokenType::CharType,
            "TINUOD" => TokenType::BoolType,
            "PULONG" => TokenType::StringType,
            "IPAKITA" => TokenType::Display,
            "DAWAT" => TokenType::Scan,
            "KUNG" => TokenType::If,
            "SAMTANG" => TokenType::While,
            "PUNDOK" => TokenType::Block,
            "UG" => TokenType::And,
            "O" => TokenType::Or,
            "OO" => TokenType::True,
            "DILI" => TokenType::False,
            "BUHAT" => TokenType::Function,
            "IULI" => TokenType::Return,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let spelling = match self {
            Self::LeftParen => "'('",
            Self::RightParen => "')'",
            Self::LeftBrace => "'{'",
            Self::RightBrace => "'}'",
            Self::Comma => "','",
            Self::Colon => "':'",
            Self::Plus => "'+'",
            Self::Minus => "'-'",
            Self::Star => "'*'",
            Self::Slash => "'/'",
            Self::Percent => "'%'",
            Self::Ampersand => "'&'",
            Self::Bang => "'!'",
            Self::Equal => "'='",
            Self::EqualEqual => "'=='",
            Self::NotEqual => "'<>'",
            Self::Greater => "'>'",
            Self::GreaterEqual => "'>='",
            Self::Less => "'<'",
            Self::LessEqual => "'<='",
            Self::Identifier(_) => "identifier",
            Self::String(_) => "string literal",
            Self::Int(_) => "integer literal",
            Self::Float(_) => "float literal",
            Self::Char(_) => "character literal",
            Self::True => "OO",
            Self::False => "DILI",
            Self::Begin => "SUGOD",
            Self::End => "KATAPUSAN",
            Self::Declare => "MUGNA",
            Self::Immutable => "PIRMI",
            Self::IntType => "NUMERO",
            Self::FloatType => "TIPIK",
            Self::CharType => "LETRA",
            Self::BoolType => "TINUOD",
            Self::StringType => "PULONG",
            Self::Display => "IPAKITA",
            Self::Scan => "DAWAT",
            Self::If => "KUNG",
            Self::ElseIf => "KUNG DILI",
            Self::Else => "KUNG WALA",
            Self::For => "ALANG SA",
            Self::While => "SAMTANG",
            Self::Block => "PUNDOK",
            Self::And => "UG",
            Self::Or => "O",
            Self::Function => "BUHAT",
            Self::Return => "IULI",
            Self::Eof => "end of input",
        };
        f.write_str(spelling)
    }
}
