//! Tag Expressions - parser for the content of `{...}` tags
//!
//! ```text
//! Expression := Segment ("|" Segment)*
//! Segment    := Token (WS Token)*
//! Token      := "$" DotPath | "*" literal "*" | BareWord
//! ```

use crate::error::ParseError;
use crate::filters::FilterRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// Dot path, resolved against the context at evaluation time
    Variable(String),
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Sets the pipeline value to the variable at this dot path
    Variable(String),
    /// Sets the pipeline value to a literal string
    Literal(String),
    /// Invokes a registered filter
    Call { filter: String, arguments: Vec<Argument> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expression {
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Variable(String),
    Literal(String),
    Word(String),
}

impl Token {
    fn into_argument(self) -> Argument {
        match self {
            Token::Variable(path) => Argument::Variable(path),
            Token::Literal(value) | Token::Word(value) => Argument::Literal(value),
        }
    }

    fn text(&self) -> &str {
        match self {
            Token::Variable(s) | Token::Literal(s) | Token::Word(s) => s,
        }
    }
}

impl Expression {
    /// Parses tag content (without the braces).
    ///
    /// Filter names are resolved against `filters` here; variable arguments
    /// are kept as paths and resolved later.
    pub fn parse(raw: &str, filters: &FilterRegistry) -> Result<Self, ParseError> {
        let mut segments = vec![];

        for tokens in tokenize(raw)? {
            let mut tokens = tokens.into_iter();
            let Some(head) = tokens.next() else { continue };
            let arguments: Vec<Token> = tokens.collect();

            // A filter name with nothing to work on reads as a variable
            let is_call = match &head {
                Token::Word(name) => {
                    filters.contains(name) && !(segments.is_empty() && arguments.is_empty())
                }
                Token::Variable(_) | Token::Literal(_) => false,
            };

            let segment = if is_call {
                Segment::Call {
                    filter: head.text().to_lowercase(),
                    arguments: arguments.into_iter().map(Token::into_argument).collect(),
                }
            } else if arguments.is_empty() {
                match head {
                    Token::Literal(value) => Segment::Literal(value),
                    Token::Variable(path) | Token::Word(path) => Segment::Variable(path),
                }
            } else {
                let name = match head {
                    Token::Variable(path) => format!("${}", path),
                    other => other.text().to_string(),
                };
                return Err(ParseError::UnknownFilter(name));
            };
            segments.push(segment);
        }

        Ok(Self { segments })
    }
}

/// Splits tag content into pipe-separated segments of tokens. Empty segments
/// are dropped.
fn tokenize(raw: &str) -> Result<Vec<Vec<Token>>, ParseError> {
    let mut segments = vec![];
    let mut current = vec![];
    let mut chars = raw.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            '|' => {
                chars.next();
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '*' => {
                chars.next();
                let mut literal = String::new();
                loop {
                    match chars.next() {
                        Some('\\') if chars.peek() == Some(&'*') => {
                            chars.next();
                            literal.push('*');
                        }
                        Some('*') => break,
                        Some(c) => literal.push(c),
                        None => {
                            return Err(ParseError::MalformedTag {
                                tag: raw.to_string(),
                                reason: "unterminated literal".to_string(),
                            })
                        }
                    }
                }
                current.push(Token::Literal(literal));
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '|' {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                let token = match word.strip_prefix('$') {
                    Some(path) => Token::Variable(path.to_string()),
                    None => Token::Word(word),
                };
                current.push(token);
            }
        }
    }

    if !current.is_empty() {
        segments.push(current);
    }
    Ok(segments)
}
