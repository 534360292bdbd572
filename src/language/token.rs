use crate::language::span::Span;

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Integer(i64),
    Float(f64),
    Str(String),

    Class,
    Enum,
    Fn,
    Let,
    Return,
    If,
    Else,
    While,
    True,
    False,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    BangEq,
    Eq,
    EqEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AmpersandAmpersand,
    PipePipe,
    Question,
    Dot,
    Comma,
    Colon,
    Semi,

    Arrow, // ->

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Eof,
}
