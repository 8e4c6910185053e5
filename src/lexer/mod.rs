mod tokens;

pub use tokens::{keyword_to_token, Token, TokenKind};

/// AWK lexer: scans a source string into tokens.
///
/// The scanner never fails; problems surface as `TokenKind::Error`
/// tokens for the parser to report. The regex-vs-division ambiguity of
/// `/` is resolved with the `expect_regex` state, which is true at the
/// start of input and after the tokens listed in
/// `TokenKind::expects_regex_after`.
pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    column: usize,
    expect_regex: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
            expect_regex: true,
        }
    }

    /// Tokenize the entire source, including the trailing Eof token.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let estimated = self.source.len() / 4 + 1;
        let mut tokens = Vec::with_capacity(estimated.min(1024));

        loop {
            let token = self.next_token();
            let is_eof = matches!(token.kind, TokenKind::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    /// Get the next token from the source
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let (line, col) = (self.line, self.column);

        let Some((_pos, ch)) = self.peek_char() else {
            return Token::new(TokenKind::Eof, line, col);
        };

        let token = match ch {
            '\n' => {
                self.advance();
                Token::new(TokenKind::Newline, line, col)
            }

            '"' => self.scan_string(),

            '/' => {
                if self.expect_regex {
                    self.scan_regex()
                } else {
                    self.advance();
                    if self.peek_char_is('=') {
                        self.advance();
                        Token::new(TokenKind::SlashAssign, line, col)
                    } else {
                        Token::new(TokenKind::Slash, line, col)
                    }
                }
            }

            '0'..='9' => self.scan_number(),
            '.' if self.peek_next_is_digit() => self.scan_number(),

            'a'..='z' | 'A'..='Z' | '_' => self.scan_identifier(),

            '@' => self.scan_at_directive(),

            '+' => {
                self.advance();
                if self.peek_char_is('+') {
                    self.advance();
                    Token::new(TokenKind::Increment, line, col)
                } else if self.peek_char_is('=') {
                    self.advance();
                    Token::new(TokenKind::PlusAssign, line, col)
                } else {
                    Token::new(TokenKind::Plus, line, col)
                }
            }
            '-' => {
                self.advance();
                if self.peek_char_is('-') {
                    self.advance();
                    Token::new(TokenKind::Decrement, line, col)
                } else if self.peek_char_is('=') {
                    self.advance();
                    Token::new(TokenKind::MinusAssign, line, col)
                } else {
                    Token::new(TokenKind::Minus, line, col)
                }
            }
            '*' => {
                self.advance();
                if self.peek_char_is('*') {
                    // ** and **= are gawk aliases for ^ and ^=
                    self.advance();
                    if self.peek_char_is('=') {
                        self.advance();
                        Token::new(TokenKind::CaretAssign, line, col)
                    } else {
                        Token::new(TokenKind::Caret, line, col)
                    }
                } else if self.peek_char_is('=') {
                    self.advance();
                    Token::new(TokenKind::StarAssign, line, col)
                } else {
                    Token::new(TokenKind::Star, line, col)
                }
            }
            '%' => {
                self.advance();
                if self.peek_char_is('=') {
                    self.advance();
                    Token::new(TokenKind::PercentAssign, line, col)
                } else {
                    Token::new(TokenKind::Percent, line, col)
                }
            }
            '^' => {
                self.advance();
                if self.peek_char_is('=') {
                    self.advance();
                    Token::new(TokenKind::CaretAssign, line, col)
                } else {
                    Token::new(TokenKind::Caret, line, col)
                }
            }
            '<' => {
                self.advance();
                if self.peek_char_is('=') {
                    self.advance();
                    Token::new(TokenKind::LessEqual, line, col)
                } else {
                    Token::new(TokenKind::Less, line, col)
                }
            }
            '>' => {
                self.advance();
                if self.peek_char_is('=') {
                    self.advance();
                    Token::new(TokenKind::GreaterEqual, line, col)
                } else if self.peek_char_is('>') {
                    self.advance();
                    Token::new(TokenKind::Append, line, col)
                } else {
                    Token::new(TokenKind::Greater, line, col)
                }
            }
            '=' => {
                self.advance();
                if self.peek_char_is('=') {
                    self.advance();
                    Token::new(TokenKind::Equal, line, col)
                } else {
                    Token::new(TokenKind::Assign, line, col)
                }
            }
            '!' => {
                self.advance();
                if self.peek_char_is('=') {
                    self.advance();
                    Token::new(TokenKind::NotEqual, line, col)
                } else if self.peek_char_is('~') {
                    self.advance();
                    Token::new(TokenKind::NotMatch, line, col)
                } else {
                    Token::new(TokenKind::Not, line, col)
                }
            }
            '~' => {
                self.advance();
                Token::new(TokenKind::Match, line, col)
            }
            '&' => {
                self.advance();
                if self.peek_char_is('&') {
                    self.advance();
                    Token::new(TokenKind::And, line, col)
                } else {
                    Token::new(
                        TokenKind::Error("unexpected '&', did you mean '&&'?".to_string()),
                        line,
                        col,
                    )
                }
            }
            '|' => {
                self.advance();
                if self.peek_char_is('|') {
                    self.advance();
                    Token::new(TokenKind::Or, line, col)
                } else if self.peek_char_is('&') {
                    self.advance();
                    Token::new(TokenKind::PipeBoth, line, col)
                } else {
                    Token::new(TokenKind::Pipe, line, col)
                }
            }
            '$' => {
                self.advance();
                Token::new(TokenKind::Dollar, line, col)
            }
            '?' => {
                self.advance();
                Token::new(TokenKind::Question, line, col)
            }
            ':' => {
                self.advance();
                if self.peek_char_is(':') {
                    self.advance();
                    Token::new(TokenKind::ColonColon, line, col)
                } else {
                    Token::new(TokenKind::Colon, line, col)
                }
            }
            '(' => {
                self.advance();
                Token::new(TokenKind::LeftParen, line, col)
            }
            ')' => {
                self.advance();
                Token::new(TokenKind::RightParen, line, col)
            }
            '{' => {
                self.advance();
                Token::new(TokenKind::LeftBrace, line, col)
            }
            '}' => {
                self.advance();
                Token::new(TokenKind::RightBrace, line, col)
            }
            '[' => {
                self.advance();
                Token::new(TokenKind::LeftBracket, line, col)
            }
            ']' => {
                self.advance();
                Token::new(TokenKind::RightBracket, line, col)
            }
            ';' => {
                self.advance();
                Token::new(TokenKind::Semicolon, line, col)
            }
            ',' => {
                self.advance();
                Token::new(TokenKind::Comma, line, col)
            }

            _ => {
                self.advance();
                Token::new(
                    TokenKind::Error(format!("unexpected character '{}'", ch)),
                    line,
                    col,
                )
            }
        };

        self.expect_regex = token.kind.expects_regex_after();
        token
    }

    fn peek_char(&mut self) -> Option<(usize, char)> {
        self.chars.peek().copied()
    }

    fn peek_char_is(&mut self, expected: char) -> bool {
        self.chars
            .peek()
            .map(|(_, c)| *c == expected)
            .unwrap_or(false)
    }

    fn peek_next_is_digit(&self) -> bool {
        let mut chars = self.chars.clone();
        chars.next();
        chars
            .next()
            .map(|(_, c)| c.is_ascii_digit())
            .unwrap_or(false)
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((_, ch)) = result {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        result
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_char() {
                Some((_, ' ' | '\t' | '\r')) => {
                    self.advance();
                }
                Some((_, '\\')) => {
                    // Backslash-newline is line continuation
                    let mut chars = self.chars.clone();
                    chars.next();
                    match chars.peek() {
                        Some((_, '\n')) => {
                            self.advance();
                            self.advance();
                        }
                        Some((_, '\r')) => {
                            self.advance();
                            self.advance();
                            if self.peek_char_is('\n') {
                                self.advance();
                            }
                        }
                        _ => break,
                    }
                }
                Some((_, '#')) => {
                    while let Some((_, ch)) = self.peek_char() {
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

    fn scan_string(&mut self) -> Token {
        let (line, col) = (self.line, self.column);
        self.advance(); // consume opening quote

        let mut value = String::new();

        loop {
            match self.advance() {
                Some((_, '"')) => break,
                Some((_, '\\')) => match self.advance() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, 'b')) => value.push('\x08'),
                    Some((_, 'f')) => value.push('\x0C'),
                    Some((_, 'a')) => value.push('\x07'),
                    Some((_, 'v')) => value.push('\x0B'),
                    Some((_, '\\')) => value.push('\\'),
                    Some((_, '"')) => value.push('"'),
                    Some((_, '/')) => value.push('/'),
                    Some((_, '0')) => value.push('\0'),
                    // Unknown escape: the character stands for itself
                    Some((_, c)) => value.push(c),
                    None => {
                        return Token::new(
                            TokenKind::Error("unterminated string".to_string()),
                            line,
                            col,
                        );
                    }
                },
                Some((_, '\n')) => {
                    return Token::new(
                        TokenKind::Error("unterminated string (newline in string)".to_string()),
                        line,
                        col,
                    );
                }
                Some((_, ch)) => value.push(ch),
                None => {
                    return Token::new(
                        TokenKind::Error("unterminated string".to_string()),
                        line,
                        col,
                    );
                }
            }
        }

        Token::new(TokenKind::String(value), line, col)
    }

    fn scan_regex(&mut self) -> Token {
        let (line, col) = (self.line, self.column);
        self.advance(); // consume opening slash

        let mut pattern = String::new();

        loop {
            match self.advance() {
                Some((_, '/')) => break,
                Some((_, '\\')) => {
                    // Keep the escape verbatim so the regex engine sees it
                    pattern.push('\\');
                    match self.advance() {
                        Some((_, ch)) => pattern.push(ch),
                        None => {
                            return Token::new(
                                TokenKind::Error("unterminated regex".to_string()),
                                line,
                                col,
                            );
                        }
                    }
                }
                Some((_, '\n')) => {
                    return Token::new(
                        TokenKind::Error("unterminated regex (newline in regex)".to_string()),
                        line,
                        col,
                    );
                }
                Some((_, ch)) => pattern.push(ch),
                None => {
                    return Token::new(
                        TokenKind::Error("unterminated regex".to_string()),
                        line,
                        col,
                    );
                }
            }
        }

        Token::new(TokenKind::Regex(pattern), line, col)
    }

    fn scan_number(&mut self) -> Token {
        let (line, col) = (self.line, self.column);
        let start_pos = self.chars.peek().map(|(pos, _)| *pos).unwrap_or(0);

        // Hex and octal constants
        if self.peek_char_is('0') {
            let mut ahead = self.chars.clone();
            ahead.next();
            match ahead.peek() {
                Some((_, 'x' | 'X')) => {
                    self.advance(); // 0
                    self.advance(); // x
                    let mut value: i64 = 0;
                    while let Some((_, ch)) = self.peek_char() {
                        let digit = match ch {
                            '0'..='9' => ch as i64 - '0' as i64,
                            'a'..='f' => ch as i64 - 'a' as i64 + 10,
                            'A'..='F' => ch as i64 - 'A' as i64 + 10,
                            _ => break,
                        };
                        value = value.wrapping_mul(16).wrapping_add(digit);
                        self.advance();
                    }
                    return Token::new(TokenKind::Number(value as f64), line, col);
                }
                Some((_, '0'..='7')) => {
                    self.advance(); // 0
                    let mut value: i64 = 0;
                    while let Some((_, ch @ '0'..='7')) = self.peek_char() {
                        value = value.wrapping_mul(8).wrapping_add(ch as i64 - '0' as i64);
                        self.advance();
                    }
                    return Token::new(TokenKind::Number(value as f64), line, col);
                }
                _ => {}
            }
        }

        let mut end_pos = start_pos;

        while let Some((pos, ch)) = self.peek_char() {
            if ch.is_ascii_digit() {
                end_pos = pos + 1;
                self.advance();
            } else {
                break;
            }
        }

        // A trailing '.' without a following digit is still accepted
        if self.peek_char_is('.') {
            self.advance();
            end_pos += 1;

            while let Some((pos, ch)) = self.peek_char() {
                if ch.is_ascii_digit() {
                    end_pos = pos + 1;
                    self.advance();
                } else {
                    break;
                }
            }
        }

        if let Some((_, 'e' | 'E')) = self.peek_char() {
            // Only consume the exponent when digits actually follow
            let mut ahead = self.chars.clone();
            ahead.next();
            let mut lookahead = ahead.clone();
            let valid = match lookahead.peek() {
                Some((_, '+' | '-')) => {
                    lookahead.next();
                    lookahead
                        .peek()
                        .map(|(_, c)| c.is_ascii_digit())
                        .unwrap_or(false)
                }
                Some((_, c)) => c.is_ascii_digit(),
                None => false,
            };
            if valid {
                self.advance(); // e
                end_pos += 1;
                if let Some((_, '+' | '-')) = self.peek_char() {
                    self.advance();
                    end_pos += 1;
                }
                while let Some((pos, ch)) = self.peek_char() {
                    if ch.is_ascii_digit() {
                        end_pos = pos + 1;
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }

        let number_str = &self.source[start_pos..end_pos];
        match number_str.trim_end_matches('.').parse::<f64>() {
            Ok(value) => Token::new(TokenKind::Number(value), line, col),
            Err(_) => Token::new(
                TokenKind::Error(format!("invalid number '{}'", number_str)),
                line,
                col,
            ),
        }
    }

    fn scan_identifier(&mut self) -> Token {
        let (line, col) = (self.line, self.column);
        let start_pos = self.chars.peek().map(|(pos, _)| *pos).unwrap_or(0);
        let mut end_pos = start_pos;

        while let Some((pos, ch)) = self.peek_char() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                end_pos = pos + 1;
                self.advance();
            } else {
                break;
            }
        }

        let ident = &self.source[start_pos..end_pos];
        let kind =
            keyword_to_token(ident).unwrap_or_else(|| TokenKind::Identifier(ident.to_string()));

        Token::new(kind, line, col)
    }

    /// `@include` and `@namespace` are whole tokens; any other `@` is the
    /// AT token for indirect calls and the identifier is scanned next.
    fn scan_at_directive(&mut self) -> Token {
        let (line, col) = (self.line, self.column);

        let mut ahead = self.chars.clone();
        ahead.next(); // skip @
        let mut word = String::new();
        while let Some((_, ch)) = ahead.peek() {
            if ch.is_ascii_alphanumeric() || *ch == '_' {
                word.push(*ch);
                ahead.next();
            } else {
                break;
            }
        }

        match word.as_str() {
            "include" => {
                for _ in 0..=word.len() {
                    self.advance();
                }
                Token::new(TokenKind::AtInclude, line, col)
            }
            "namespace" => {
                for _ in 0..=word.len() {
                    self.advance();
                }
                Token::new(TokenKind::AtNamespace, line, col)
            }
            _ => {
                self.advance(); // just the @
                Token::new(TokenKind::At, line, col)
            }
        }
    }
}
