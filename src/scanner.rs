use crate::token::*;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScanErrType {
    #[error("Unexpected character '{0}'.")]
    UnexpectedChar(char),
    #[error("Unterminated string.")]
    UnterminatedString,
    #[error("Unterminated character literal.")]
    UnterminatedChar,
    #[error("Unexpected character after number.")]
    CharAfterNumber,
    #[error("Malformed number '{0}'.")]
    MalformedNumber(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("[Line {line}] Syntax Error : {kind}")]
pub struct ScanErr {
    pub line: usize,
    pub kind: ScanErrType,
}

struct Scanner<'a> {
    str: &'a [char],
    index: usize,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl<'a> Scanner<'a> {
    fn advance(&mut self) -> Option<char> {
        self.index += 1;
        self.str.get(self.index - 1).copied()
    }

    // "match" is a keyword in the metalanguage already.
    fn match_next(&mut self, c: char) -> bool {
        let res = self.str.get(self.index).is_some_and(|d| c == *d);
        if res {
            self.index += 1;
        }
        res
    }

    fn peek(&self) -> Option<char> {
        self.str.get(self.index).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.str.get(self.index + offset).copied()
    }

    fn new(str: &'a [char]) -> Self {
        Self { index: 0, str }
    }

    fn index(&self) -> usize {
        self.index
    }

    fn text(&self, start: usize) -> String {
        self.str[start..self.index].iter().collect()
    }

    /// Index just past `word` if it is the next word on this line.
    fn word_follows(&self, word: &str) -> Option<usize> {
        let mut i = self.index;
        while matches!(self.str.get(i), Some(' ' | '\t')) {
            i += 1;
        }
        for expected in word.chars() {
            if self.str.get(i) != Some(&expected) {
                return None;
            }
            i += 1;
        }
        if self.str.get(i).copied().is_some_and(is_word_char) {
            return None;
        }
        Some(i)
    }

    /// Consumes `[c]` or `'c'` after the opener; `None` if the form is broken.
    fn enclosed_char(&mut self, close: char) -> Option<char> {
        match (self.peek(), self.peek_at(1)) {
            (Some(c), Some(d)) if c != '\n' && d == close => {
                self.index += 2;
                Some(c)
            }
            _ => None,
        }
    }
}

pub fn scan(code: &str) -> (Vec<Token>, Vec<ScanErr>) {
    let chars = code.chars().collect::<Vec<_>>();
    let mut scanner = Scanner::new(&chars);
    let mut result = vec![];
    let mut errors = vec![];
    let mut line: usize = 1;

    let mut report = |line: usize, kind: ScanErrType| errors.push(ScanErr { line, kind });

    loop {
        let start = scanner.index();
        let Some(c) = scanner.advance() else {
            break;
        };
        let tok = match c {
            '(' => TokenType::LeftParen,
            ')' => TokenType::RightParen,
            '{' => TokenType::LeftBrace,
            '}' => TokenType::RightBrace,
            ',' => TokenType::Comma,
            ':' => TokenType::Colon,
            '+' => TokenType::Plus,
            '-' => TokenType::Minus,
            '*' => TokenType::Star,
            '/' => TokenType::Slash,
            '%' => TokenType::Percent,
            '&' => TokenType::Ampersand,
            '!' => TokenType::Bang,
            '$' => TokenType::Char('\n'),
            '#' => {
                while !matches!(scanner.peek(), Some('\n') | None) {
                    scanner.advance();
                }
                continue;
            }
            '=' => {
                if scanner.match_next('=') {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                }
            }
            '>' => {
                if scanner.match_next('=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                }
            }
            '<' => {
                if scanner.match_next('=') {
                    TokenType::LessEqual
                } else if scanner.match_next('>') {
                    TokenType::NotEqual
                } else {
                    TokenType::Less
                }
            }
            '\n' => {
                line += 1;
                continue;
            }
            '\r' | '\t' | ' ' => continue,
            '"' => {
                while scanner.peek().is_some_and(|x| x != '"' && x != '\n') {
                    scanner.advance();
                }

                if scanner.peek() != Some('"') {
                    report(line, ScanErrType::UnterminatedString);
                    continue;
                }

                let string = scanner.text(start + 1);
                // Consume closing " after getting the text
                scanner.advance();
                match string.as_str() {
                    "OO" => TokenType::True,
                    "DILI" => TokenType::False,
                    _ => TokenType::String(string.into()),
                }
            }
            '\'' => match scanner.enclosed_char('\'') {
                Some(c) => TokenType::Char(c),
                None => {
                    while scanner.peek().is_some_and(|x| x != '\'' && x != '\n') {
                        scanner.advance();
                    }
                    scanner.match_next('\'');
                    report(line, ScanErrType::UnterminatedChar);
                    continue;
                }
            },
            '[' => match scanner.enclosed_char(']') {
                Some(c) => TokenType::Char(c),
                None => {
                    report(line, ScanErrType::UnexpectedChar('['));
                    continue;
                }
            },
            '0'..='9' => {
                while scanner.peek().is_some_and(|x| x.is_ascii_digit()) {
                    scanner.advance();
                }

                let mut float = false;
                if scanner.peek() == Some('.') && scanner.peek_at(1).is_some_and(|x| x.is_ascii_digit()) {
                    float = true;
                    scanner.advance();
                    while scanner.peek().is_some_and(|x| x.is_ascii_digit()) {
                        scanner.advance();
                    }
                }

                if scanner.peek().is_some_and(|x| x.is_ascii_alphabetic() || x == '_') {
                    while scanner.peek().is_some_and(is_word_char) {
                        scanner.advance();
                    }
                    report(line, ScanErrType::CharAfterNumber);
                    continue;
                }

                let text = scanner.text(start);
                let parsed = if float {
                    text.parse().map(TokenType::Float).ok()
                } else {
                    text.parse().map(TokenType::Int).ok()
                };
                match parsed {
                    Some(tok) => tok,
                    None => {
                        report(line, ScanErrType::MalformedNumber(text));
                        continue;
                    }
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                while scanner.peek().is_some_and(is_word_char) {
                    scanner.advance();
                }

                let word = scanner.text(start);
                match word.as_str() {
                    "KUNG" => {
                        if let Some(end) = scanner.word_follows("DILI") {
                            scanner.index = end;
                            TokenType::ElseIf
                        } else if let Some(end) = scanner.word_follows("WALA") {
                            scanner.index = end;
                            TokenType::Else
                        } else {
                            TokenType::If
                        }
                    }
                    "ALANG" => match scanner.word_follows("SA") {
                        Some(end) => {
                            scanner.index = end;
                            TokenType::For
                        }
                        None => TokenType::Identifier(word.into()),
                    },
                    _ => TokenType::keyword(&word).unwrap_or_else(|| TokenType::Identifier(word.into())),
                }
            }
            c => {
                report(line, ScanErrType::UnexpectedChar(c));
                continue;
            }
        };

        result.push(Token::new(tok, scanner.text(start).into(), line));
    }

    result.push(Token::new(TokenType::Eof, "".into(), line));
    tracing::trace!(tokens = result.len(), errors = errors.len(), "scanned source");
    (result, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(code: &str) -> Vec<TokenType> {
        let (tokens, errors) = scan(code);
        assert!(errors.is_empty(), "unexpected scan errors: {errors:?}");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn two_word_keywords() {
        assert_eq!(
            kinds("KUNG DILI KUNG  WALA ALANG SA KUNG"),
            vec![TokenType::ElseIf, TokenType::Else, TokenType::For, TokenType::If, TokenType::Eof]
        );
    }

    #[test]
    fn two_word_keyword_lexeme() {
        let (tokens, _) = scan("KUNG DILI");
        assert_eq!(&*tokens[0].lexeme, "KUNG DILI");
    }

    #[test]
    fn kung_does_not_swallow_following_identifier() {
        assert_eq!(
            kinds("KUNG DILIG ALANG"),
            vec![
                TokenType::If,
                TokenType::Identifier("DILIG".into()),
                TokenType::Identifier("ALANG".into()),
                TokenType::Eof
            ]
        );
    }

    #[test]
    fn operators() {
        assert_eq!(
            kinds("== = <= < <> >= > & %"),
            vec![
                TokenType::EqualEqual,
                TokenType::Equal,
                TokenType::LessEqual,
                TokenType::Less,
                TokenType::NotEqual,
                TokenType::GreaterEqual,
                TokenType::Greater,
                TokenType::Ampersand,
                TokenType::Percent,
                TokenType::Eof
            ]
        );
    }

    #[test]
    fn literals() {
        assert_eq!(
            kinds("12 3.5 'c' \"hi\" \"OO\" DILI $ [[] []]"),
            vec![
                TokenType::Int(12),
                TokenType::Float(3.5),
                TokenType::Char('c'),
                TokenType::String("hi".into()),
                TokenType::True,
                TokenType::False,
                TokenType::Char('\n'),
                TokenType::Char('['),
                TokenType::Char(']'),
                TokenType::Eof
            ]
        );
    }

    #[test]
    fn number_followed_by_dot_is_not_float() {
        let (tokens, errors) = scan("5.");
        assert_eq!(tokens[0].kind, TokenType::Int(5));
        assert_eq!(errors, vec![ScanErr { line: 1, kind: ScanErrType::UnexpectedChar('.') }]);
    }

    #[test]
    fn comments_and_lines() {
        let (tokens, errors) = scan("# comment\nx # more\n\ny");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[1].line, 4);
        assert_eq!(tokens[2].kind, TokenType::Eof);
    }

    #[test]
    fn errors_accumulate() {
        let (tokens, errors) = scan("x @ \"open\n12ab y ^");
        assert_eq!(
            errors,
            vec![
                ScanErr { line: 1, kind: ScanErrType::UnexpectedChar('@') },
                ScanErr { line: 1, kind: ScanErrType::UnterminatedString },
                ScanErr { line: 2, kind: ScanErrType::CharAfterNumber },
                ScanErr { line: 2, kind: ScanErrType::UnexpectedChar('^') },
            ]
        );
        let idents = tokens
            .iter()
            .filter(|t| matches!(t.kind, TokenType::Identifier(_)))
            .count();
        assert_eq!(idents, 2);
        assert_eq!(tokens.last().map(|t| &t.kind), Some(&TokenType::Eof));
    }

    #[test]
    fn broken_char_literal_reports_once() {
        let (tokens, errors) = scan("'ab' x\n'");
        assert_eq!(
            errors,
            vec![
                ScanErr { line: 1, kind: ScanErrType::UnterminatedChar },
                ScanErr { line: 2, kind: ScanErrType::UnterminatedChar },
            ]
        );
        assert_eq!(tokens[0].kind, TokenType::Identifier("x".into()));
    }

    #[test]
    fn huge_integer_is_malformed() {
        let (_, errors) = scan("99999999999999999999");
        assert!(matches!(errors[0].kind, ScanErrType::MalformedNumber(_)));
    }
}
