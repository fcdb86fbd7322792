//! Structural reader for HCL-style threat model documents.
//!
//! Only the block/attribute skeleton is understood:
//!
//! ```text
//! backend "tmcloud" {
//!   organization = "acme"
//!   document     = "payments-api"
//! }
//!
//! threatmodel "Payments API" {
//!   description = <<EOT
//!   Card processing service
//!   EOT
//! }
//! ```
//!
//! Attribute values other than strings and heredocs are skipped.

use crate::error::{Error, Result};
use std::iter::Peekable;
use std::str::Chars;

/// A `backend "<name>" { ... }` declaration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BackendBlock {
    pub name: String,
    pub organization: Option<String>,
    pub document: Option<String>,
}

/// What the sync layer needs from a parsed document
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedDocument {
    /// Label of the first `threatmodel` block
    pub name: Option<String>,
    pub description: Option<String>,
    pub backends: Vec<BackendBlock>,
}

/// Parses document text into the fields the reconciler consumes.
pub trait DocumentParser: Send + Sync {
    fn parse(&self, source: &str) -> Result<ParsedDocument>;
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    String(String),
    Number(String),
    /// Operators and anything else outside the skeleton
    Other(char),
    Assign,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Eof,
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
        }
    }

    fn error(&self, message: impl std::fmt::Display) -> Error {
        Error::Parse(format!("line {}: {}", self.line, message))
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.advance() {
            if c == '\n' {
                break;
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<()> {
        let start = self.line;
        let mut prev = '\0';
        while let Some(c) = self.advance() {
            if prev == '*' && c == '/' {
                return Ok(());
            }
            prev = c;
        }
        Err(Error::Parse(format!("line {}: unterminated comment", start)))
    }

    fn read_string(&mut self) -> Result<Token> {
        let start = self.line;
        let mut s = String::new();

        loop {
            match self.advance() {
                Some('"') => return Ok(Token::String(s)),
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some(c) => s.push(c),
                    None => break,
                },
                Some('\n') | None => break,
                Some(c) => s.push(c),
            }
        }

        Err(Error::Parse(format!("line {}: unterminated string", start)))
    }

    /// `<<EOT` / `<<-EOT` heredoc; the opening `<<` is already consumed.
    fn read_heredoc(&mut self) -> Result<Token> {
        let start = self.line;
        let indented = self.chars.peek() == Some(&'-');
        if indented {
            self.advance();
        }

        let mut marker = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                marker.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if marker.is_empty() {
            return Err(self.error("heredoc without a marker"));
        }
        self.skip_line();

        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            let mut ended = false;
            loop {
                match self.advance() {
                    Some('\n') => break,
                    Some(c) => line.push(c),
                    None => {
                        ended = true;
                        break;
                    }
                }
            }

            if line.trim() == marker {
                break;
            }
            if ended {
                return Err(Error::Parse(format!("line {}: unterminated heredoc {}", start, marker)));
            }
            lines.push(line);
        }

        let text = if indented {
            let indent = lines
                .iter()
                .filter(|l| !l.trim().is_empty())
                .map(|l| l.len() - l.trim_start().len())
                .min()
                .unwrap_or(0);
            lines
                .iter()
                .map(|l| l.get(indent..).unwrap_or("").to_string())
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            lines.join("\n")
        };

        Ok(Token::String(text.trim_end().to_string()))
    }

    fn next_token(&mut self) -> Result<Token> {
        loop {
            let Some(c) = self.advance() else {
                return Ok(Token::Eof);
            };

            match c {
                c if c.is_whitespace() || c == ',' => continue,
                '#' => self.skip_line(),
                '/' if self.chars.peek() == Some(&'/') => self.skip_line(),
                '/' if self.chars.peek() == Some(&'*') => {
                    self.advance();
                    self.skip_block_comment()?;
                }
                '"' => return self.read_string(),
                '<' if self.chars.peek() == Some(&'<') => {
                    self.advance();
                    return self.read_heredoc();
                }
                '=' | '!' | '<' | '>' if self.chars.peek() == Some(&'=') => {
                    self.advance();
                    return Ok(Token::Other(c));
                }
                '=' => return Ok(Token::Assign),
                '{' => return Ok(Token::LBrace),
                '}' => return Ok(Token::RBrace),
                '[' => return Ok(Token::LBracket),
                ']' => return Ok(Token::RBracket),
                '(' => return Ok(Token::LParen),
                ')' => return Ok(Token::RParen),
                c if c.is_ascii_digit() => {
                    let mut number = String::from(c);
                    while let Some(&n) = self.chars.peek() {
                        if n.is_ascii_alphanumeric() || n == '.' {
                            number.push(n);
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    return Ok(Token::Number(number));
                }
                c if c.is_alphabetic() || c == '_' => {
                    let mut ident = String::from(c);
                    while let Some(&n) = self.chars.peek() {
                        if n.is_alphanumeric() || n == '_' || n == '-' || n == '.' {
                            ident.push(n);
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    return Ok(Token::Identifier(ident));
                }
                other => return Ok(Token::Other(other)),
            }
        }
    }

    fn tokenize(mut self) -> Result<Vec<(Token, usize)>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let line = self.line;
            let done = token == Token::Eof;
            tokens.push((token, line));
            if done {
                return Ok(tokens);
            }
        }
    }
}

/// A block with its labels and string attributes, children flattened away
#[derive(Debug, Default)]
struct Block {
    kind: String,
    labels: Vec<String>,
    attributes: Vec<(String, String)>,
}

impl Block {
    fn attribute(&self, key: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].0
    }

    fn line(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].1
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl std::fmt::Display) -> Error {
        Error::Parse(format!("line {}: {}", self.line(), message))
    }

    /// Parse items until `}` (nested) or end of input (top level).
    fn body(&mut self, nested: bool, blocks: &mut Vec<Block>) -> Result<Vec<(String, String)>> {
        let mut attributes = Vec::new();

        loop {
            match self.next() {
                Token::Eof if nested => return Err(self.error("unexpected end of input, missing '}'")),
                Token::Eof => return Ok(attributes),
                Token::RBrace if nested => return Ok(attributes),
                Token::Identifier(name) => match self.peek().clone() {
                    Token::Assign => {
                        self.next();
                        if let Some(value) = self.value()? {
                            attributes.push((name, value));
                        }
                    }
                    Token::String(_) | Token::Identifier(_) | Token::LBrace => {
                        let mut labels = Vec::new();
                        loop {
                            match self.next() {
                                Token::String(label) | Token::Identifier(label) => labels.push(label),
                                Token::LBrace => break,
                                other => return Err(self.error(format!("unexpected {:?} in block header", other))),
                            }
                        }

                        // Only top-level blocks are reported; children are validated and dropped
                        let mut children = Vec::new();
                        let attributes = self.body(true, &mut children)?;
                        if !nested {
                            blocks.push(Block {
                                kind: name,
                                labels,
                                attributes,
                            });
                        }
                    }
                    other => return Err(self.error(format!("expected '=' or block after {:?}, found {:?}", name, other))),
                },
                other => return Err(self.error(format!("unexpected {:?}", other))),
            }
        }
    }

    /// Consume one attribute value. Returns the text for plain strings.
    fn value(&mut self) -> Result<Option<String>> {
        let value = self.operand()?;

        // Binary and ternary operators each take one more operand
        let mut compound = false;
        while let Token::Other(_) = self.peek() {
            self.next();
            self.operand()?;
            compound = true;
        }

        Ok(if compound { None } else { value })
    }

    fn operand(&mut self) -> Result<Option<String>> {
        match self.next() {
            Token::String(s) => Ok(Some(s)),
            Token::Number(_) => Ok(None),
            Token::Identifier(_) => {
                if *self.peek() == Token::LParen {
                    self.next();
                    self.skip_balanced(Token::LParen, Token::RParen)?;
                }
                // Index and splat suffixes: `local.list[0]`, `var.items[*]`
                while *self.peek() == Token::LBracket {
                    self.next();
                    self.skip_balanced(Token::LBracket, Token::RBracket)?;
                }
                Ok(None)
            }
            Token::LBrace => self.skip_balanced(Token::LBrace, Token::RBrace).map(|_| None),
            Token::LBracket => self.skip_balanced(Token::LBracket, Token::RBracket).map(|_| None),
            Token::LParen => self.skip_balanced(Token::LParen, Token::RParen).map(|_| None),
            // Unary minus and negation
            Token::Other('-') | Token::Other('!') => self.operand().map(|_| None),
            other => Err(self.error(format!("expected a value, found {:?}", other))),
        }
    }

    fn skip_balanced(&mut self, open: Token, close: Token) -> Result<()> {
        let mut depth = 1;
        while depth > 0 {
            match self.next() {
                Token::Eof => return Err(self.error(format!("unbalanced {:?}", open))),
                t if t == open => depth += 1,
                t if t == close => depth -= 1,
                _ => {}
            }
        }
        Ok(())
    }
}

/// Parser for the HCL-style document format.
#[derive(Debug, Default, Clone, Copy)]
pub struct HclParser;

impl DocumentParser for HclParser {
    fn parse(&self, source: &str) -> Result<ParsedDocument> {
        let tokens = Lexer::new(source).tokenize()?;
        let mut parser = Parser { tokens, pos: 0 };
        let mut blocks = Vec::new();
        parser.body(false, &mut blocks)?;

        let mut parsed = ParsedDocument::default();
        for block in blocks {
            match block.kind.as_str() {
                "backend" => parsed.backends.push(BackendBlock {
                    name: block.labels.first().cloned().unwrap_or_default(),
                    organization: block.attribute("organization").filter(|o| !o.is_empty()),
                    document: block.attribute("document").filter(|d| !d.is_empty()),
                }),
                "threatmodel" if parsed.name.is_none() => {
                    parsed.name = block.labels.first().cloned();
                    parsed.description = block.attribute("description");
                }
                _ => {}
            }
        }

        Ok(parsed)
    }
}
