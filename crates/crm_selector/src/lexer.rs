use crate::error::SelectorError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    CompareIdent(String, CompareOp, String),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "==" => CompareOp::Eq,
            "!=" => CompareOp::Ne,
            "<" => CompareOp::Lt,
            "<=" => CompareOp::Le,
            ">" => CompareOp::Gt,
            ">=" => CompareOp::Ge,
            _ => return None,
        })
    }
}

struct Spanned {
    token: Token,
    offset: usize,
}

/// Tokenizes a selector expression.
///
/// Whitespace directly touching a comparison operator is stripped so `py >= 3.10` and
/// `py>=3.10` tokenize identically, per the grammar's "glue adjacent comparison operator"
/// rule.
pub fn tokenize(src: &str) -> Result<Vec<Token>, SelectorError> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut i = 0;
    let mut tokens = Vec::new();

    while i < chars.len() {
        let (offset, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '(' {
            tokens.push(Spanned { token: Token::LParen, offset });
            i += 1;
            continue;
        }
        if c == ')' {
            tokens.push(Spanned { token: Token::RParen, offset });
            i += 1;
            continue;
        }
        if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_continue(chars[i].1) {
                i += 1;
            }
            let word: String = chars[start..i].iter().map(|(_, c)| *c).collect();
            match word.as_str() {
                "and" => {
                    tokens.push(Spanned { token: Token::And, offset });
                    continue;
                }
                "or" => {
                    tokens.push(Spanned { token: Token::Or, offset });
                    continue;
                }
                "not" => {
                    tokens.push(Spanned { token: Token::Not, offset });
                    continue;
                }
                _ => {}
            }
            // Look ahead (skipping whitespace) for a comparison operator glued to this ident.
            let mut j = i;
            while j < chars.len() && chars[j].1.is_whitespace() {
                j += 1;
            }
            if let Some((op, op_len)) = peek_operator(&chars, j) {
                let mut k = j + op_len;
                while k < chars.len() && chars[k].1.is_whitespace() {
                    k += 1;
                }
                let value_start = k;
                while k < chars.len() && is_value_continue(chars[k].1) {
                    k += 1;
                }
                if k == value_start {
                    return Err(SelectorError::syntax(offset, "comparison operator missing a right-hand value"));
                }
                let value: String = chars[value_start..k].iter().map(|(_, c)| *c).collect();
                tokens.push(Spanned {
                    token: Token::CompareIdent(word, op, value),
                    offset,
                });
                i = k;
                continue;
            }
            tokens.push(Spanned {
                token: Token::Ident(word),
                offset,
            });
            continue;
        }
        return Err(SelectorError::syntax(offset, format!("unexpected character '{c}'")));
    }

    Ok(tokens.into_iter().map(|s| s.token).collect())
}

fn peek_operator(chars: &[(usize, char)], at: usize) -> Option<(CompareOp, usize)> {
    if at >= chars.len() {
        return None;
    }
    let two: String = chars.get(at..at + 2).map(|s| s.iter().map(|(_, c)| *c).collect())?;
    if let Some(op) = CompareOp::from_str(&two) {
        return Some((op, 2));
    }
    let one = chars[at].1.to_string();
    CompareOp::from_str(&one).map(|op| (op, 1))
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_value_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glues_operator_with_surrounding_whitespace() {
        let spaced = tokenize("py >= 3.10").unwrap();
        let glued = tokenize("py>=3.10").unwrap();
        assert_eq!(spaced, glued);
        assert_eq!(
            spaced,
            vec![Token::CompareIdent("py".into(), CompareOp::Ge, "3.10".into())]
        );
    }

    #[test]
    fn recognizes_keywords_and_parens() {
        let tokens = tokenize("not (linux and win)").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Not,
                Token::LParen,
                Token::Ident("linux".into()),
                Token::And,
                Token::Ident("win".into()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn dangling_operator_is_a_syntax_error() {
        assert!(tokenize("py>=").is_err());
    }
}
