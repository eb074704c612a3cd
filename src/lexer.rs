use indexmap::IndexSet;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::diagnostics::Diagnostic;

const OPERATORS: &[&str] = &[
    "===", "!==", "...", "==", "!=", "<=", ">=", "&&", "||", "++", "--", "+=", "-=", "*=", "/=",
    "%=", "=>", "+", "-", "*", "/", "%", "=", "<", ">", "!", "?",
];

const CONFUSABLES: &[(char, &str, &str)] = &[
    ('\u{201C}', "left double quotation mark", "\""),
    ('\u{201D}', "right double quotation mark", "\""),
    ('\u{2018}', "left single quotation mark", "'"),
    ('\u{2019}', "right single quotation mark", "'"),
    ('\u{2013}', "en dash", "-"),
    ('\u{2014}', "em dash", "-"),
    ('\u{2212}', "minus sign", "-"),
    ('\u{00D7}', "multiplication sign", "*"),
    ('\u{2026}', "horizontal ellipsis", "..."),
    ('\u{00A0}', "no-break space", " "),
    ('\u{200B}', "zero width space", ""),
    ('\u{FEFF}', "byte order mark", ""),
    ('\u{FF1B}', "fullwidth semicolon", ";"),
    ('\u{FF0C}', "fullwidth comma", ","),
    ('\u{FF08}', "fullwidth left parenthesis", "("),
    ('\u{FF09}', "fullwidth right parenthesis", ")"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct NumberLiteral {
    pub value: f64,
    pub decimal: bool,
    pub big: Option<BigInt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateFragment {
    pub source: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateLiteral {
    pub strings: Vec<String>,
    pub exprs: Vec<TemplateFragment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(NumberLiteral),
    String(String),
    Template(TemplateLiteral),
    Identifier(String),
    Keyword(String),
    Annotation(String),
    Operator(&'static str),
    Symbol(char),
    Newline,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize) -> Self {
        Self { kind, line }
    }

    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Number(number) => match &number.big {
                Some(big) => format!("number `{big}n`"),
                None => format!("number `{}`", number.value),
            },
            TokenKind::String(text) => format!("string {text:?}"),
            TokenKind::Template(_) => "template string".into(),
            TokenKind::Identifier(name) => format!("identifier `{name}`"),
            TokenKind::Keyword(name) => format!("keyword `{name}`"),
            TokenKind::Annotation(name) => format!("annotation `@{name}`"),
            TokenKind::Operator(op) => format!("`{op}`"),
            TokenKind::Symbol(ch) => format!("`{ch}`"),
            TokenKind::Newline => "newline".into(),
            TokenKind::Eof => "end of input".into(),
        }
    }
}

pub struct Lexer<'a> {
    chars: Vec<char>,
    current: usize,
    line: usize,
    keywords: &'a IndexSet<String>,
    brackets: Vec<(char, usize)>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &str, keywords: &'a IndexSet<String>) -> Self {
        Self::starting_at(source, keywords, 0)
    }

    pub fn starting_at(source: &str, keywords: &'a IndexSet<String>, line: usize) -> Self {
        Self {
            chars: source.chars().collect(),
            current: 0,
            line,
            keywords,
            brackets: Vec::new(),
        }
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.get(self.current).copied()?;
        self.current += 1;
        if ch == '\n' {
            self.line += 1;
        }
        Some(ch)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.current).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.current + 1).copied()
    }

    fn match_next(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn collect_while<F>(&mut self, mut predicate: F) -> String
    where
        F: FnMut(char) -> bool,
    {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if !predicate(ch) {
                break;
            }
            text.push(ch);
            self.bump();
        }
        text
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<bool, Diagnostic> {
        let mut crossed_line = false;
        loop {
            match (self.peek(), self.peek_next()) {
                (Some(' ' | '\t' | '\r' | '\u{000C}'), _) => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(ch) = self.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    let opened = self.line;
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('*') if self.match_next('/') => break,
                            Some('\n') => crossed_line = true,
                            Some(_) => {}
                            None => {
                                return Err(Diagnostic::lexer(
                                    format!(
                                        "unterminated block comment opened on line {}",
                                        opened + 1
                                    ),
                                    opened,
                                )
                                .with_suggestion("close the comment with `*/`"));
                            }
                        }
                    }
                }
                _ => return Ok(crossed_line),
            }
        }
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        let lexeme = self.collect_while(is_identifier_char);
        if self.keywords.contains(&lexeme) {
            TokenKind::Keyword(lexeme)
        } else {
            TokenKind::Identifier(lexeme)
        }
    }

    fn annotation(&mut self, line: usize) -> Result<TokenKind, Diagnostic> {
        self.bump();
        let name = self.collect_while(is_identifier_char);
        if name.is_empty() {
            return Err(Diagnostic::lexer("expected annotation name after `@`", line));
        }
        Ok(TokenKind::Annotation(name))
    }

    fn number_literal(&mut self, line: usize) -> Result<TokenKind, Diagnostic> {
        if self.peek() == Some('0') {
            let radix = match self.peek_next() {
                Some('x' | 'X') => Some((16, "hexadecimal")),
                Some('o' | 'O') => Some((8, "octal")),
                Some('b' | 'B') => Some((2, "binary")),
                _ => None,
            };
            if let Some((radix, label)) = radix {
                self.bump();
                self.bump();
                let digits: String = self
                    .collect_while(|ch| ch.is_digit(radix) || ch == '_')
                    .chars()
                    .filter(|&ch| ch != '_')
                    .collect();
                if digits.is_empty() {
                    return Err(Diagnostic::lexer(
                        format!("expected {label} digits after radix prefix"),
                        line,
                    ));
                }
                let parsed = BigInt::parse_bytes(digits.as_bytes(), radix).ok_or_else(|| {
                    Diagnostic::lexer(format!("invalid {label} literal `{digits}`"), line)
                })?;
                let big = self.match_next('n');
                self.reject_identifier_tail(line)?;
                return Ok(TokenKind::Number(NumberLiteral {
                    value: parsed.to_f64().unwrap_or(f64::INFINITY),
                    decimal: false,
                    big: big.then_some(parsed),
                }));
            }
        }

        let mut text = self.collect_while(|ch| ch.is_ascii_digit() || ch == '_');
        let mut decimal = false;
        if self.peek() == Some('.') && self.peek_next().is_some_and(|ch| ch.is_ascii_digit()) {
            decimal = true;
            self.bump();
            text.push('.');
            text.push_str(&self.collect_while(|ch| ch.is_ascii_digit() || ch == '_'));
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let signed = matches!(self.peek_next(), Some('+' | '-'))
                && self
                    .chars
                    .get(self.current + 2)
                    .is_some_and(|ch| ch.is_ascii_digit());
            if signed || self.peek_next().is_some_and(|ch| ch.is_ascii_digit()) {
                decimal = true;
                text.push('e');
                self.bump();
                if signed {
                    text.extend(self.bump());
                }
                text.push_str(&self.collect_while(|ch| ch.is_ascii_digit() || ch == '_'));
            }
        }
        let clean: String = text.chars().filter(|&ch| ch != '_').collect();

        let big = if self.peek() == Some('n') {
            if decimal {
                return Err(Diagnostic::lexer(
                    format!("big integer literal `{text}n` cannot have a fraction or exponent"),
                    line,
                ));
            }
            self.bump();
            let parsed = BigInt::parse_bytes(clean.as_bytes(), 10).ok_or_else(|| {
                Diagnostic::lexer(format!("invalid big integer literal `{text}n`"), line)
            })?;
            Some(parsed)
        } else {
            None
        };
        self.reject_identifier_tail(line)?;

        let value = clean
            .parse::<f64>()
            .map_err(|_| Diagnostic::lexer(format!("invalid numeric literal `{text}`"), line))?;
        Ok(TokenKind::Number(NumberLiteral {
            value,
            decimal,
            big,
        }))
    }

    fn reject_identifier_tail(&self, line: usize) -> Result<(), Diagnostic> {
        match self.peek() {
            Some(ch) if is_identifier_char(ch) => Err(Diagnostic::lexer(
                format!("unexpected `{ch}` directly after numeric literal"),
                line,
            )),
            _ => Ok(()),
        }
    }

    fn escape(&mut self, quote_line: usize, what: &str) -> Result<char, Diagnostic> {
        match self.bump() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some(other) => Ok(other),
            None => Err(Diagnostic::lexer(
                format!("unterminated {what} starting on line {}", quote_line + 1),
                quote_line,
            )),
        }
    }

    fn string_literal(&mut self, line: usize) -> Result<TokenKind, Diagnostic> {
        let quote = self.bump().unwrap_or('"');
        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(Diagnostic::lexer(
                        format!("unterminated string literal starting on line {}", line + 1),
                        line,
                    ));
                }
                Some('\n') => {
                    return Err(Diagnostic::lexer(
                        format!("unterminated string literal starting on line {}", line + 1),
                        line,
                    )
                    .with_suggestion("use a backtick template string for multi-line text"));
                }
                Some(ch) if ch == quote => {
                    self.bump();
                    return Ok(TokenKind::String(value));
                }
                Some('\\') => {
                    self.bump();
                    value.push(self.escape(line, "string literal")?);
                }
                Some(ch) => {
                    self.bump();
                    value.push(ch);
                }
            }
        }
    }

    fn template_literal(&mut self, line: usize) -> Result<TokenKind, Diagnostic> {
        self.bump();
        let mut strings = Vec::new();
        let mut exprs = Vec::new();
        let mut segment = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(Diagnostic::lexer(
                        format!("unterminated template string starting on line {}", line + 1),
                        line,
                    ));
                }
                Some('`') => break,
                Some('\\') => segment.push(self.escape(line, "template string")?),
                Some('$') if self.peek() == Some('{') => {
                    self.bump();
                    let fragment_line = self.line;
                    let source = self.template_expression(fragment_line)?;
                    strings.push(std::mem::take(&mut segment));
                    exprs.push(TemplateFragment {
                        source,
                        line: fragment_line,
                    });
                }
                Some(ch) => segment.push(ch),
            }
        }
        strings.push(segment);
        Ok(TokenKind::Template(TemplateLiteral { strings, exprs }))
    }

    fn template_expression(&mut self, line: usize) -> Result<String, Diagnostic> {
        let mut source = String::new();
        let mut depth = 1usize;
        let mut quote: Option<char> = None;
        loop {
            let Some(ch) = self.bump() else {
                return Err(Diagnostic::lexer(
                    format!("unterminated `${{` expression opened on line {}", line + 1),
                    line,
                ));
            };
            match quote {
                Some(open) => {
                    if ch == '\\' {
                        source.push(ch);
                        source.extend(self.bump());
                        continue;
                    }
                    if ch == open {
                        quote = None;
                    }
                }
                None => match ch {
                    '"' | '\'' | '`' => quote = Some(ch),
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(source);
                        }
                    }
                    _ => {}
                },
            }
            source.push(ch);
        }
    }

    fn operator(&mut self, line: usize) -> Result<TokenKind, Diagnostic> {
        for op in OPERATORS {
            let matched = op
                .chars()
                .enumerate()
                .all(|(offset, ch)| self.chars.get(self.current + offset) == Some(&ch));
            if matched {
                for _ in 0..op.chars().count() {
                    self.bump();
                }
                return Ok(TokenKind::Operator(op));
            }
        }
        let ch = self.peek().unwrap_or('\0');
        if ch == '.' {
            return Err(Diagnostic::lexer("unexpected `..`", line)
                .with_got("`..`")
                .with_suggestion("use `.` for member access or `...` to spread"));
        }
        Err(illegal_character(ch, line))
    }

    fn open_bracket(&mut self, ch: char, line: usize) -> TokenKind {
        self.bump();
        self.brackets.push((ch, line));
        TokenKind::Symbol(ch)
    }

    fn close_bracket(&mut self, ch: char, line: usize) -> Result<TokenKind, Diagnostic> {
        self.bump();
        let expected_open = match ch {
            ')' => '(',
            ']' => '[',
            _ => '{',
        };
        match self.brackets.pop() {
            Some((open, _)) if open == expected_open => Ok(TokenKind::Symbol(ch)),
            Some((open, opened)) => Err(Diagnostic::lexer(
                format!(
                    "mismatched `{ch}`: `{open}` opened on line {} is still open",
                    opened + 1
                ),
                line,
            )
            .with_expected(format!("`{}`", closing_for(open)))
            .with_got(format!("`{ch}`"))),
            None => Err(Diagnostic::lexer(
                format!("unmatched `{ch}` with no open `{expected_open}`"),
                line,
            )),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            if self.skip_whitespace_and_comments()? {
                tokens.push(Token::new(TokenKind::Newline, self.line));
            }
            let line = self.line;
            let Some(ch) = self.peek() else {
                break;
            };
            let kind = match ch {
                '\n' => {
                    self.bump();
                    TokenKind::Newline
                }
                '0'..='9' => self.number_literal(line)?,
                '"' | '\'' => self.string_literal(line)?,
                '`' => self.template_literal(line)?,
                '@' => self.annotation(line)?,
                '(' | '[' | '{' => self.open_bracket(ch, line),
                ')' | ']' | '}' => self.close_bracket(ch, line)?,
                ',' | ';' | ':' => {
                    self.bump();
                    TokenKind::Symbol(ch)
                }
                '.' if self.peek_next() != Some('.') => {
                    self.bump();
                    TokenKind::Symbol('.')
                }
                ch if is_identifier_start(ch) => self.identifier_or_keyword(),
                _ => self.operator(line)?,
            };
            tokens.push(Token::new(kind, line));
        }
        if let Some((open, opened)) = self.brackets.pop() {
            return Err(Diagnostic::lexer(
                format!(
                    "unclosed `{open}` opened on line {}: reached end of input",
                    opened + 1
                ),
                opened,
            )
            .with_expected(format!("`{}`", closing_for(open))));
        }
        tokens.push(Token::new(TokenKind::Eof, self.line));
        Ok(tokens)
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$' || (!ch.is_ascii() && ch.is_alphabetic())
}

fn is_identifier_char(ch: char) -> bool {
    is_identifier_start(ch) || ch.is_ascii_digit()
}

fn closing_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

fn illegal_character(ch: char, line: usize) -> Diagnostic {
    let code_point = format!("U+{:04X}", ch as u32);
    match CONFUSABLES.iter().find(|(confusable, _, _)| *confusable == ch) {
        Some((_, name, replacement)) => {
            let diag = Diagnostic::lexer(
                format!("illegal character {code_point} ({name})"),
                line,
            )
            .with_got(code_point);
            if replacement.is_empty() {
                diag.with_suggestion("delete the invisible character")
            } else {
                diag.with_suggestion(format!("replace it with `{replacement}`"))
            }
        }
        None => Diagnostic::lexer(format!("illegal character {code_point} `{ch}`"), line)
            .with_got(code_point),
    }
}
