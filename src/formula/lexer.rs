//! Tokenizer for TMA formula text.

use super::ast::{Sigil, Symbol};
use crate::utils::error::FormulaError;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Num(String),
    Sym(Symbol),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    Ne,
    And,
    Or,
    LParen,
    RParen,
    Comma,
    If,
    Else,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Num(n) => n.clone(),
            Token::Sym(s) => s.to_string(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Star => "*".into(),
            Token::Slash => "/".into(),
            Token::Percent => "%".into(),
            Token::Lt => "<".into(),
            Token::Gt => ">".into(),
            Token::Le => "<=".into(),
            Token::Ge => ">=".into(),
            Token::EqEq => "==".into(),
            Token::Ne => "!=".into(),
            Token::And => "&".into(),
            Token::Or => "|".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::Comma => ",".into(),
            Token::If => "if".into(),
            Token::Else => "else".into(),
        }
    }
}

/// Token with its byte offset in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

fn number_re() -> &'static Regex {
    static NUMBER_RE: OnceLock<Regex> = OnceLock::new();
    // Safety: this regex literal is guaranteed to compile
    NUMBER_RE.get_or_init(|| {
        Regex::new(r"^(?:0x[0-9a-fA-F]+|[0-9]*\.?[0-9]+(?:e[0-9]+)?)$").unwrap()
    })
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

fn is_modifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '='
}

/// Split formula text into tokens
///
/// Words are runs of `[A-Za-z0-9_.]` and `\-`. A word that reads as a
/// number becomes `Num`; anything else is a symbol, so names such as
/// `4K_Aliasing` stay names.
pub fn tokenize(text: &str) -> Result<Vec<Spanned>, FormulaError> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let byte_at = |idx: usize| chars.get(idx).map(|(b, _)| *b).unwrap_or(text.len());

    while i < chars.len() {
        let (offset, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);

        let simple = match c {
            ' ' | '\t' | '\r' | '\n' => {
                i += 1;
                continue;
            }
            '+' => Some((Token::Plus, 1)),
            '-' => Some((Token::Minus, 1)),
            '*' => Some((Token::Star, 1)),
            '/' => Some((Token::Slash, 1)),
            '%' => Some((Token::Percent, 1)),
            '(' => Some((Token::LParen, 1)),
            ')' => Some((Token::RParen, 1)),
            ',' => Some((Token::Comma, 1)),
            '&' => Some((Token::And, 1)),
            '|' => Some((Token::Or, 1)),
            '<' if next == Some('=') => Some((Token::Le, 2)),
            '<' => Some((Token::Lt, 1)),
            '>' if next == Some('=') => Some((Token::Ge, 2)),
            '>' => Some((Token::Gt, 1)),
            '=' if next == Some('=') => Some((Token::EqEq, 2)),
            '!' if next == Some('=') => Some((Token::Ne, 2)),
            _ => None,
        };

        if let Some((token, width)) = simple {
            tokens.push(Spanned { token, offset });
            i += width;
            continue;
        }

        // Sigils
        let mut sigil = Sigil::Bare;
        if c == '#' {
            i += 1;
            sigil = Sigil::Hash;
            if chars.get(i).map(|(_, c)| *c) == Some('#') {
                i += 1;
                sigil = Sigil::Sum;
                if chars.get(i).map(|(_, c)| *c) == Some('?') {
                    i += 1;
                    sigil = Sigil::Aggregate;
                }
            }
        }

        // Word
        let start = i;
        let mut word = String::new();
        while i < chars.len() {
            let c = chars[i].1;
            if is_word_char(c) {
                word.push(c);
                i += 1;
            } else if c == '\\' && chars.get(i + 1).map(|(_, c)| *c) == Some('-') {
                word.push_str("\\-");
                i += 2;
            } else {
                break;
            }
        }

        if word.is_empty() {
            let (offset, ch) = chars.get(start).copied().unwrap_or((text.len(), c));
            return Err(FormulaError::UnexpectedChar { ch, offset });
        }

        if sigil == Sigil::Bare && number_re().is_match(&word) {
            tokens.push(Spanned {
                token: Token::Num(word),
                offset,
            });
            continue;
        }

        if sigil == Sigil::Bare {
            let keyword = match word.as_str() {
                "if" => Some(Token::If),
                "else" => Some(Token::Else),
                "and" => Some(Token::And),
                "or" => Some(Token::Or),
                _ => None,
            };
            if let Some(token) = keyword {
                tokens.push(Spanned { token, offset });
                continue;
            }
        }

        // Modifiers
        let mut modifiers = Vec::new();
        while chars.get(i).map(|(_, c)| *c) == Some(':')
            && chars.get(i + 1).map(|(_, c)| is_modifier_char(*c)) == Some(true)
        {
            i += 1;
            let mut modifier = String::new();
            while let Some((_, c)) = chars.get(i) {
                if !is_modifier_char(*c) {
                    break;
                }
                modifier.push(*c);
                i += 1;
            }
            modifiers.push(modifier);
        }

        // PMU terms
        let mut terms = None;
        if chars.get(i).map(|(_, c)| *c) == Some('@') {
            let open = byte_at(i);
            i += 1;
            let mut group = String::new();
            loop {
                match chars.get(i) {
                    Some((_, '@')) => {
                        i += 1;
                        break;
                    }
                    Some((_, c)) => {
                        group.push(*c);
                        i += 1;
                    }
                    None => return Err(FormulaError::UnterminatedTerms { offset: open }),
                }
            }
            terms = Some(group);
        }

        tokens.push(Spanned {
            token: Token::Sym(Symbol {
                sigil,
                name: word,
                modifiers,
                terms,
            }),
            offset,
        });
    }

    Ok(tokens)
}
