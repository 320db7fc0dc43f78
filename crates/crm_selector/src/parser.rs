use crate::ast::SelectorExpr;
use crate::error::SelectorError;
use crate::lexer::{tokenize, Token};

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

/// Parses a selector expression body (without its surrounding `[` `]` or `# `).
///
/// Grammar: `expr := or_expr ; or_expr := and_expr ("or" and_expr)* ; and_expr := not_expr
/// ("and" not_expr)* ; not_expr := "not" not_expr | atom ; atom := IDENT | "(" expr ")"`.
/// `not` binds tighter than `and`, which binds tighter than `or`.
pub fn parse(src: &str) -> Result<SelectorExpr, SelectorError> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(SelectorError::syntax(0, "empty selector expression"));
    }
    let mut parser = Parser { tokens: &tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(SelectorError::syntax(parser.pos, "unexpected trailing tokens"));
    }
    Ok(expr)
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        self.pos += 1;
        tok
    }

    fn parse_or(&mut self) -> Result<SelectorExpr, SelectorError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = SelectorExpr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<SelectorExpr, SelectorError> {
        let mut lhs = self.parse_not()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let rhs = self.parse_not()?;
            lhs = SelectorExpr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<SelectorExpr, SelectorError> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(SelectorExpr::Not(Box::new(inner)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<SelectorExpr, SelectorError> {
        match self.advance() {
            Some(Token::Ident(name)) => Ok(SelectorExpr::Ident(name.clone())),
            Some(Token::CompareIdent(name, op, value)) => {
                Ok(SelectorExpr::Compare(name.clone(), *op, value.clone()))
            }
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(SelectorError::syntax(self.pos, "expected closing parenthesis")),
                }
            }
            Some(other) => Err(SelectorError::syntax(
                self.pos,
                format!("unexpected token {other:?}, expected an identifier or '('"),
            )),
            None => Err(SelectorError::syntax(self.pos, "unexpected end of selector expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::CompareOp;
    use rstest::rstest;

    #[test]
    fn not_binds_tighter_than_and_which_binds_tighter_than_or() {
        let expr = parse("linux and not win or osx").unwrap();
        // (linux and (not win)) or osx
        match expr {
            SelectorExpr::Or(lhs, rhs) => {
                assert_eq!(*rhs, SelectorExpr::Ident("osx".into()));
                match *lhs {
                    SelectorExpr::And(a, b) => {
                        assert_eq!(*a, SelectorExpr::Ident("linux".into()));
                        assert_eq!(*b, SelectorExpr::Not(Box::new(SelectorExpr::Ident("win".into()))));
                    }
                    other => panic!("expected And, got {other:?}"),
                }
            }
            other => panic!("expected Or, got {other:?}"),
        }
    }

    #[test]
    fn parentheses_override_precedence() {
        let expr = parse("linux and (win or osx)").unwrap();
        match expr {
            SelectorExpr::And(_, rhs) => {
                assert!(matches!(*rhs, SelectorExpr::Or(_, _)));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn comparison_parses_as_a_single_atom() {
        let expr = parse("py>=3.10").unwrap();
        assert_eq!(expr, SelectorExpr::Compare("py".into(), CompareOp::Ge, "3.10".into()));
    }

    #[rstest]
    #[case("(linux")]
    #[case("linux)")]
    #[case("and linux")]
    #[case("linux and")]
    #[case("")]
    fn malformed_selectors_fail_to_parse(#[case] src: &str) {
        assert!(parse(src).is_err());
    }
}
