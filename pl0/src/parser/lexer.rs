use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use tracing::warn;

use crate::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Ключевые слова
    Const, Var, Procedure, Call, Begin, End, If, Then, While, Do, Odd,
    // Операторы
    Dot,           // .
    Semicolon,     // ;
    Assign,        // :=
    Comma,         // ,
    LParen,        // (
    RParen,        // )
    Plus,          // +
    Minus,         // -
    Times,         // *
    Divide,        // /
    Less,          // <
    LessEqual,     // <=
    Greater,       // >
    GreaterEqual,  // >=
    Equal,         // = или ==
    NotEqual,      // !=
    Print,         // !
    // Идентификаторы и литералы
    Identifier(String),
    Number(i64),
    // Литерал, который не влезает в i64: парсер на нём остановится
    NumberOutOfRange(String),
    // Специальные
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Const => "'const'",
            TokenKind::Var => "'var'",
            TokenKind::Procedure => "'procedure'",
            TokenKind::Call => "'call'",
            TokenKind::Begin => "'begin'",
            TokenKind::End => "'end'",
            TokenKind::If => "'if'",
            TokenKind::Then => "'then'",
            TokenKind::While => "'while'",
            TokenKind::Do => "'do'",
            TokenKind::Odd => "'odd'",
            TokenKind::Dot => "'.'",
            TokenKind::Semicolon => "';'",
            TokenKind::Assign => "':='",
            TokenKind::Comma => "','",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Times => "'*'",
            TokenKind::Divide => "'/'",
            TokenKind::Less => "'<'",
            TokenKind::LessEqual => "'<='",
            TokenKind::Greater => "'>'",
            TokenKind::GreaterEqual => "'>='",
            TokenKind::Equal => "'='",
            TokenKind::NotEqual => "'!='",
            TokenKind::Print => "'!'",
            TokenKind::Identifier(name) => return write!(f, "identifier '{}'", name),
            TokenKind::Number(value) => return write!(f, "number {}", value),
            TokenKind::NumberOutOfRange(text) => return write!(f, "out-of-range number {}", text),
            TokenKind::Eof => "end of file",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Нераспознанный символ. Лексер его пропускает и идёт дальше.
#[derive(Debug, Clone, PartialEq)]
pub struct LexDiagnostic {
    pub character: char,
    pub span: Span,
}

impl fmt::Display for LexDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal character '{}' at {}", self.character, self.span)
    }
}

/// Ленивый лексер: токены выдаются по одному, последним идёт Eof
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
    finished: bool,
    diagnostics: Vec<LexDiagnostic>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
            finished: false,
            diagnostics: Vec::new(),
        }
    }

    /// Все пропущенные символы на текущий момент
    pub fn diagnostics(&self) -> &[LexDiagnostic] {
        &self.diagnostics
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map(|&(i, _)| i).unwrap_or(self.source.len())
    }

    fn bump(&mut self) -> Option<char> {
        let (_, ch) = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn bump_if(&mut self, expected: char) -> bool {
        if matches!(self.chars.peek(), Some(&(_, ch)) if ch == expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(&(_, ch)) = self.chars.peek() {
            match ch {
                ' ' | '\t' | '\r' | '\n' => {
                    self.bump();
                }
                '#' => {
                    // Комментарии - пропускаем до конца строки
                    while let Some(&(_, ch)) = self.chars.peek() {
                        if ch == '\n' { break; }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_number(&mut self, start: usize) -> TokenKind {
        while matches!(self.chars.peek(), Some(&(_, ch)) if ch.is_ascii_digit()) {
            self.bump();
        }
        let end = self.offset();
        let text = &self.source[start..end];

        match text.parse::<i64>() {
            Ok(value) => TokenKind::Number(value),
            Err(_) => {
                warn!(literal = text, line = self.line, "number literal out of range");
                TokenKind::NumberOutOfRange(text.to_string())
            }
        }
    }

    fn lex_identifier(&mut self, start: usize) -> TokenKind {
        while matches!(self.chars.peek(), Some(&(_, ch)) if ch.is_ascii_alphanumeric() || ch == '_') {
            self.bump();
        }
        let end = self.offset();
        let ident = &self.source[start..end];

        match ident.to_ascii_lowercase().as_str() {
            "const" => TokenKind::Const,
            "var" => TokenKind::Var,
            "procedure" => TokenKind::Procedure,
            "call" => TokenKind::Call,
            "begin" => TokenKind::Begin,
            "end" => TokenKind::End,
            "if" => TokenKind::If,
            "then" => TokenKind::Then,
            "while" => TokenKind::While,
            "do" => TokenKind::Do,
            "odd" => TokenKind::Odd,
            _ => TokenKind::Identifier(ident.to_string()),
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            if self.finished {
                return None;
            }

            self.skip_whitespace_and_comments();

            let line = self.line;
            let column = self.column;
            let start = self.offset();

            let Some(ch) = self.bump() else {
                self.finished = true;
                let span = Span { line, column, start, end: start };
                return Some(Token { kind: TokenKind::Eof, span });
            };

            let kind = match ch {
                '0'..='9' => self.lex_number(start),
                'a'..='z' | 'A'..='Z' | '_' => self.lex_identifier(start),
                '.' => TokenKind::Dot,
                ';' => TokenKind::Semicolon,
                ',' => TokenKind::Comma,
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Times,
                '/' => TokenKind::Divide,
                ':' if self.bump_if('=') => TokenKind::Assign,
                '<' => {
                    if self.bump_if('=') { TokenKind::LessEqual } else { TokenKind::Less }
                }
                '>' => {
                    if self.bump_if('=') { TokenKind::GreaterEqual } else { TokenKind::Greater }
                }
                '=' => {
                    self.bump_if('=');
                    TokenKind::Equal
                }
                '!' => {
                    if self.bump_if('=') { TokenKind::NotEqual } else { TokenKind::Print }
                }
                _ => {
                    // Пропускаем ровно один символ и продолжаем
                    let diagnostic = LexDiagnostic {
                        character: ch,
                        span: Span { line, column, start, end: start + ch.len_utf8() },
                    };
                    warn!("{}", diagnostic);
                    self.diagnostics.push(diagnostic);
                    continue;
                }
            };

            let end = self.offset();
            return Some(Token { kind, span: Span { line, column, start, end } });
        }
    }
}

/// Весь поток токенов сразу, включая Eof
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|token| token.kind).collect()
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(
            kinds("BEGIN Call end While"),
            vec![TokenKind::Begin, TokenKind::Call, TokenKind::End, TokenKind::While, TokenKind::Eof]
        );
    }

    #[test]
    fn operators() {
        assert_eq!(
            kinds(":= < <= > >= = == != ! . ;"),
            vec![
                TokenKind::Assign,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Equal,
                TokenKind::Equal,
                TokenKind::NotEqual,
                TokenKind::Print,
                TokenKind::Dot,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn minus_is_never_part_of_a_number() {
        assert_eq!(
            kinds("x-1 -2"),
            vec![
                TokenKind::Identifier("x".to_string()),
                TokenKind::Minus,
                TokenKind::Number(1),
                TokenKind::Minus,
                TokenKind::Number(2),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_and_positions() {
        let tokens = tokenize("# header\n  var x;");
        assert_eq!(tokens[0].kind, TokenKind::Var);
        assert_eq!((tokens[0].span.line, tokens[0].span.column), (2, 3));
        assert_eq!(tokens[1].kind, TokenKind::Identifier("x".to_string()));
        assert_eq!((tokens[1].span.line, tokens[1].span.column), (2, 7));
    }

    #[test]
    fn illegal_character_is_skipped() {
        let mut lexer = Lexer::new("x $ := 1 @ ;");
        let tokens: Vec<TokenKind> = lexer.by_ref().map(|token| token.kind).collect();

        assert_eq!(
            tokens,
            vec![
                TokenKind::Identifier("x".to_string()),
                TokenKind::Assign,
                TokenKind::Number(1),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
        let skipped: Vec<char> = lexer.diagnostics().iter().map(|d| d.character).collect();
        assert_eq!(skipped, vec!['$', '@']);
    }

    #[test]
    fn lone_colon_is_illegal() {
        let mut lexer = Lexer::new("a : b");
        let count = lexer.by_ref().count();
        assert_eq!(count, 3);
        assert_eq!(lexer.diagnostics()[0].character, ':');
    }

    #[test]
    fn huge_literal_is_kept_as_text() {
        assert_eq!(
            kinds("!99999999999999999999."),
            vec![
                TokenKind::Print,
                TokenKind::NumberOutOfRange("99999999999999999999".to_string()),
                TokenKind::Dot,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn eof_is_yielded_once() {
        let mut lexer = Lexer::new("");
        assert_eq!(lexer.next().map(|t| t.kind), Some(TokenKind::Eof));
        assert_eq!(lexer.next(), None);
    }
}
