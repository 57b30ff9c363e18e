// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Line lexer with token pushback.
//!
//! The lexer is CPU-agnostic. A CPU plug-in supplies the `read_token`
//! behaviour (see [`crate::core::cpu::CpuModule::read_token`]); most targets
//! delegate to [`Lexer::read_standard_token`] and only supply a mnemonic
//! predicate.

use std::borrow::Cow;
use std::fmt;

use crate::core::text_utils::{
    is_binary, is_decimal, is_hexadecimal, is_ident_char, is_ident_start, is_octal, is_space,
};

/// Broad classification of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Operator,
    Symbol,
    Keyword,
    Number,
    String,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Plus,
    Minus,
    Times,
    Divide,
    Modulo,
    Complement,
    BitAnd,
    BitOr,
    BitXor,
    LogicalNot,
    LogicalAnd,
    LogicalOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    LParen,
    RParen,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Times => "*",
            Operator::Divide => "/",
            Operator::Modulo => "%",
            Operator::Complement => "~",
            Operator::BitAnd => "&",
            Operator::BitOr => "|",
            Operator::BitXor => "^",
            Operator::LogicalNot => "!",
            Operator::LogicalAnd => "&&",
            Operator::LogicalOr => "||",
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Shl => "<<",
            Operator::Shr => ">>",
            Operator::LParen => "(",
            Operator::RParen => ")",
        }
    }
}

/// Built-in expression functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Lo,
    Hi,
    Bank,
}

impl Keyword {
    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Lo => "LO",
            Keyword::Hi => "HI",
            Keyword::Bank => "BANK",
        }
    }

    fn from_name(upper: &str) -> Option<Self> {
        match upper {
            "LO" => Some(Keyword::Lo),
            "HI" => Some(Keyword::Hi),
            "BANK" => Some(Keyword::Bank),
            _ => None,
        }
    }
}

/// Directives understood by the engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    If,
    IfAbs,
    IfNAbs,
    IfRel,
    IfNRel,
    Else,
    EndIf,
    Macro,
    EndM,
    ExitM,
    Repeat,
    EndR,
    Include,
    Append,
    Insert,
    End,
    Equ,
    Set,
    Space,
    Byte,
    DByte,
    Word,
    Long,
    Org,
    Code,
    Data,
    Bss,
    Extern,
    Global,
    List,
    NoList,
    Page,
    Title,
}

const DIRECTIVES: &[(&str, Directive)] = &[
    (".IF", Directive::If),
    (".IFABS", Directive::IfAbs),
    (".IFNABS", Directive::IfNAbs),
    (".IFREL", Directive::IfRel),
    (".IFNREL", Directive::IfNRel),
    (".ELSE", Directive::Else),
    (".ENDIF", Directive::EndIf),
    (".MACRO", Directive::Macro),
    (".ENDM", Directive::EndM),
    (".EXITM", Directive::ExitM),
    (".REPEAT", Directive::Repeat),
    (".ENDR", Directive::EndR),
    (".INCLUDE", Directive::Include),
    (".APPEND", Directive::Append),
    (".INSERT", Directive::Insert),
    (".END", Directive::End),
    (".EQU", Directive::Equ),
    (".SET", Directive::Set),
    (".SPACE", Directive::Space),
    (".BYTE", Directive::Byte),
    (".DBYTE", Directive::DByte),
    (".WORD", Directive::Word),
    (".LONG", Directive::Long),
    (".ORG", Directive::Org),
    (".CODE", Directive::Code),
    (".DATA", Directive::Data),
    (".BSS", Directive::Bss),
    (".EXTERN", Directive::Extern),
    (".GLOBAL", Directive::Global),
    (".LIST", Directive::List),
    (".NOLIST", Directive::NoList),
    (".PAGE", Directive::Page),
    (".TITLE", Directive::Title),
];

impl Directive {
    /// Look up a directive by its upper-case name (including the leading dot).
    pub fn from_name(upper: &str) -> Option<Self> {
        DIRECTIVES
            .iter()
            .find(|(name, _)| *name == upper)
            .map(|(_, directive)| *directive)
    }

    pub fn name(self) -> &'static str {
        DIRECTIVES
            .iter()
            .find(|(_, directive)| *directive == self)
            .map(|(name, _)| *name)
            .unwrap_or("?")
    }

    /// Directives that run even while conditional assembly suppresses output.
    pub fn is_always_active(self) -> bool {
        matches!(
            self,
            Directive::If
                | Directive::IfAbs
                | Directive::IfNAbs
                | Directive::IfRel
                | Directive::IfNRel
                | Directive::Else
                | Directive::EndIf
                | Directive::EndM
                | Directive::EndR
        )
    }
}

/// A lexical unit.
///
/// Fixed keywords and operators compare by discriminant; symbols and literals
/// compare by their payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Whitespace,
    EndOfLine,
    Origin,
    Comma,
    Colon,
    Operator(Operator),
    Keyword(Keyword),
    Directive(Directive),
    /// A CPU mnemonic, stored in canonical upper case.
    Mnemonic(String),
    Symbol(String),
    Number { text: String, value: i64 },
    Str(String),
    Unknown(String),
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Operator(_) => TokenKind::Operator,
            Token::Symbol(_) => TokenKind::Symbol,
            Token::Origin
            | Token::Comma
            | Token::Colon
            | Token::Keyword(_)
            | Token::Directive(_)
            | Token::Mnemonic(_) => TokenKind::Keyword,
            Token::Number { .. } => TokenKind::Number,
            Token::Str(_) => TokenKind::String,
            Token::Whitespace | Token::EndOfLine | Token::Unknown(_) => TokenKind::Unknown,
        }
    }

    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Token::Whitespace => Cow::Borrowed("#SPACE"),
            Token::EndOfLine => Cow::Borrowed("#EOL"),
            Token::Origin => Cow::Borrowed("ORIGIN"),
            Token::Comma => Cow::Borrowed(","),
            Token::Colon => Cow::Borrowed(":"),
            Token::Operator(op) => Cow::Borrowed(op.as_str()),
            Token::Keyword(kw) => Cow::Borrowed(kw.as_str()),
            Token::Directive(d) => Cow::Borrowed(d.name()),
            Token::Mnemonic(name) | Token::Symbol(name) | Token::Str(name) => {
                Cow::Borrowed(name.as_str())
            }
            Token::Number { text, .. } => Cow::Borrowed(text.as_str()),
            Token::Unknown(text) => Cow::Borrowed(text.as_str()),
        }
    }

    /// True for tokens that are compiled as directives or opcodes.
    pub fn is_opcode(&self) -> bool {
        matches!(
            self,
            Token::Directive(_) | Token::Mnemonic(_) | Token::EndOfLine
        )
    }

    pub fn is_always_active(&self) -> bool {
        match self {
            Token::EndOfLine => true,
            Token::Directive(d) => d.is_always_active(),
            _ => false,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Parse a numeric literal in one of the standard notations.
///
/// - Decimal: `42`
/// - Hex: `$2A`, `0x2A`, `2Ah`
/// - Binary: `%101010`, `0b101010`, `101010b`
/// - Octal: `@52`, `52o`, `52q`
pub fn parse_number(text: &str) -> Option<i64> {
    let cleaned: String = text.chars().filter(|&c| c != '_').collect();
    let upper = cleaned.to_ascii_uppercase();
    let (digits, radix) = if let Some(rest) = upper.strip_prefix('$') {
        (rest, 16)
    } else if let Some(rest) = upper.strip_prefix('%') {
        (rest, 2)
    } else if let Some(rest) = upper.strip_prefix('@') {
        (rest, 8)
    } else if let Some(rest) = upper.strip_prefix("0X") {
        (rest, 16)
    } else if let Some(rest) = upper
        .strip_prefix("0B")
        .filter(|r| !r.is_empty() && r.chars().all(is_binary))
    {
        (rest, 2)
    } else if let Some(rest) = upper.strip_suffix('H') {
        (rest, 16)
    } else if let Some(rest) = upper.strip_suffix('O').or_else(|| upper.strip_suffix('Q')) {
        (rest, 8)
    } else if let Some(rest) = upper
        .strip_suffix('B')
        .filter(|r| !r.is_empty() && r.chars().all(is_binary))
    {
        (rest, 2)
    } else if let Some(rest) = upper.strip_suffix('D') {
        (rest, 10)
    } else {
        (upper.as_str(), 10)
    };

    if digits.is_empty() {
        return None;
    }
    i64::from_str_radix(digits, radix).ok()
}

/// Character cursor over one source line plus a LIFO of pushed-back tokens.
#[derive(Debug, Default)]
pub struct Lexer {
    text: Vec<char>,
    offset: usize,
    pushed: Vec<Token>,
    expect_value: bool,
}

impl Lexer {
    pub fn new(text: &str) -> Self {
        let mut lexer = Self::default();
        lexer.reset(text);
        lexer
    }

    /// Start scanning a new line.
    pub fn reset(&mut self, text: &str) {
        self.text = text.chars().collect();
        self.offset = 0;
        self.pushed.clear();
        self.expect_value = true;
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn peek_char(&self) -> Option<char> {
        self.text.get(self.offset).copied()
    }

    pub fn peek_char_at(&self, ahead: usize) -> Option<char> {
        self.text.get(self.offset + ahead).copied()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.offset += 1;
        Some(c)
    }

    /// Text between two offsets of the current line.
    pub fn slice(&self, start: usize, end: usize) -> String {
        let end = end.min(self.text.len());
        let start = start.min(end);
        self.text[start..end].iter().collect()
    }

    /// Un-consume a token; the most recently pushed token is returned first.
    pub fn push_token(&mut self, token: Token) {
        self.pushed.push(token);
    }

    pub fn pop_pushed(&mut self) -> Option<Token> {
        self.pushed.pop()
    }

    /// Whether the previous significant token leaves the lexer expecting an operand.
    pub fn expects_value(&self) -> bool {
        self.expect_value
    }

    /// Scan the next token using the standard syntax.
    ///
    /// `is_mnemonic` receives upper-case identifiers and decides whether they
    /// are CPU opcodes.
    pub fn read_standard_token<F>(&mut self, is_mnemonic: F) -> Token
    where
        F: Fn(&str) -> bool,
    {
        let token = self.scan(is_mnemonic);
        self.note(&token);
        token
    }

    fn note(&mut self, token: &Token) {
        match token {
            Token::Whitespace | Token::EndOfLine => {}
            Token::Symbol(_)
            | Token::Number { .. }
            | Token::Str(_)
            | Token::Origin
            | Token::Operator(Operator::RParen) => self.expect_value = false,
            _ => self.expect_value = true,
        }
    }

    fn scan<F>(&mut self, is_mnemonic: F) -> Token
    where
        F: Fn(&str) -> bool,
    {
        let Some(c) = self.peek_char() else {
            return Token::EndOfLine;
        };

        if is_space(c) {
            while self.peek_char().is_some_and(is_space) {
                self.offset += 1;
            }
            return Token::Whitespace;
        }

        match c {
            ';' => {
                self.offset = self.text.len();
                Token::EndOfLine
            }
            '"' | '\'' => self.scan_string(c),
            '$' if self.peek_char_at(1).is_some_and(is_hexadecimal) => {
                self.scan_prefixed_number(is_hexadecimal)
            }
            '$' => {
                self.offset += 1;
                Token::Origin
            }
            '%' if self.expect_value && self.peek_char_at(1).is_some_and(is_binary) => {
                self.scan_prefixed_number(is_binary)
            }
            '@' if self.peek_char_at(1).is_some_and(is_octal) => {
                self.scan_prefixed_number(is_octal)
            }
            _ if is_decimal(c) => self.scan_number(),
            _ if is_ident_start(c) => self.scan_identifier(is_mnemonic),
            _ => self.scan_punctuation(c),
        }
    }

    fn scan_string(&mut self, quote: char) -> Token {
        self.offset += 1;
        let mut value = String::new();
        while let Some(c) = self.next_char() {
            if c == quote {
                if self.peek_char() == Some(quote) {
                    self.offset += 1;
                    value.push(quote);
                    continue;
                }
                return Token::Str(value);
            }
            value.push(c);
        }
        Token::Str(value)
    }

    fn scan_prefixed_number(&mut self, digit: fn(char) -> bool) -> Token {
        let start = self.offset;
        self.offset += 1;
        while self.peek_char().is_some_and(|c| digit(c) || c == '_') {
            self.offset += 1;
        }
        self.number_token(start)
    }

    fn scan_number(&mut self) -> Token {
        let start = self.offset;
        while self
            .peek_char()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.offset += 1;
        }
        self.number_token(start)
    }

    fn number_token(&self, start: usize) -> Token {
        let text = self.slice(start, self.offset);
        match parse_number(&text) {
            Some(value) => Token::Number { text, value },
            None => Token::Unknown(text),
        }
    }

    fn scan_identifier<F>(&mut self, is_mnemonic: F) -> Token
    where
        F: Fn(&str) -> bool,
    {
        let start = self.offset;
        while self.peek_char().is_some_and(is_ident_char) {
            self.offset += 1;
        }
        let text = self.slice(start, self.offset);
        let upper = text.to_ascii_uppercase();

        if upper.starts_with('.') {
            return match Directive::from_name(&upper) {
                Some(directive) => Token::Directive(directive),
                None => Token::Symbol(text),
            };
        }
        if let Some(keyword) = Keyword::from_name(&upper) {
            return Token::Keyword(keyword);
        }
        if is_mnemonic(&upper) {
            return Token::Mnemonic(upper);
        }
        Token::Symbol(text)
    }

    fn scan_punctuation(&mut self, c: char) -> Token {
        self.offset += 1;
        let next = self.peek_char();
        let mut pair = |op: Operator| {
            self.offset += 1;
            Token::Operator(op)
        };
        match (c, next) {
            ('&', Some('&')) => pair(Operator::LogicalAnd),
            ('|', Some('|')) => pair(Operator::LogicalOr),
            ('!', Some('=')) => pair(Operator::Ne),
            ('=', Some('=')) => pair(Operator::Eq),
            ('<', Some('<')) => pair(Operator::Shl),
            ('<', Some('=')) => pair(Operator::Le),
            ('>', Some('>')) => pair(Operator::Shr),
            ('>', Some('=')) => pair(Operator::Ge),
            (',', _) => Token::Comma,
            (':', _) => Token::Colon,
            ('+', _) => Token::Operator(Operator::Plus),
            ('-', _) => Token::Operator(Operator::Minus),
            ('*', _) => Token::Operator(Operator::Times),
            ('/', _) => Token::Operator(Operator::Divide),
            ('%', _) => Token::Operator(Operator::Modulo),
            ('~', _) => Token::Operator(Operator::Complement),
            ('&', _) => Token::Operator(Operator::BitAnd),
            ('|', _) => Token::Operator(Operator::BitOr),
            ('^', _) => Token::Operator(Operator::BitXor),
            ('!', _) => Token::Operator(Operator::LogicalNot),
            ('=', _) => Token::Operator(Operator::Eq),
            ('<', _) => Token::Operator(Operator::Lt),
            ('>', _) => Token::Operator(Operator::Gt),
            ('(', _) => Token::Operator(Operator::LParen),
            (')', _) => Token::Operator(Operator::RParen),
            _ => Token::Unknown(c.to_string()),
        }
    }
}
