//! Infix formula parser.
//!
//! The grammar is ASCII-only. Variables are bare words
//! (`[A-Za-z0-9][A-Za-z0-9_]*`) or arbitrary names in square brackets;
//! constants are `\T` and `\F`; the connectives are `~ & | ^`, `>` (or
//! `->`) and `=` (or `<->`); parentheses group; blanks and tabs separate
//! tokens. All binary connectives chain to the right.
//!
//! Failures carry the 0-based byte offset of the offending position.

use std::collections::VecDeque;

use thiserror::Error;

use crate::domain::{Domain, DomainError};
use crate::expr::{Expr, Node};

/// Possible failures while parsing an infix formula.
///
/// Every variant records the 0-based byte offset where the problem was
/// detected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("offset {offset}: Unrecognized token")]
    UnrecognizedToken { offset: usize },
    #[error("offset {offset}: Term expected but got infix")]
    TermExpected { offset: usize },
    #[error("offset {offset}: Infix expected but got term")]
    InfixExpected { offset: usize },
    #[error("offset {offset}: Term expected when encountering closing parenthesis")]
    TermBeforeClosingParen { offset: usize },
    #[error("offset {offset}: Missing opening parenthesis")]
    MissingOpeningParen { offset: usize },
    #[error("offset {offset}: Missing closing parenthesis")]
    MissingClosingParen { offset: usize },
    #[error("offset {offset}: Term expected but EOF reached")]
    TermExpectedAtEof { offset: usize },
    #[error("offset {offset}: No operands left after reduction")]
    NoOperands { offset: usize },
    #[error("offset {offset}: Excess operands after reduction")]
    ExcessOperands { offset: usize },
    #[error("offset {offset}: Missing operands")]
    MissingOperands { offset: usize },
    /// Resolving a variable failed, e.g. on a frozen domain.
    #[error("offset {offset}: {source}")]
    Domain { offset: usize, source: DomainError },
}

impl ParseError {
    /// The 0-based byte offset the failure points at.
    pub fn offset(&self) -> usize {
        match *self {
            ParseError::UnrecognizedToken { offset }
            | ParseError::TermExpected { offset }
            | ParseError::InfixExpected { offset }
            | ParseError::TermBeforeClosingParen { offset }
            | ParseError::MissingOpeningParen { offset }
            | ParseError::MissingClosingParen { offset }
            | ParseError::TermExpectedAtEof { offset }
            | ParseError::NoOperands { offset }
            | ParseError::ExcessOperands { offset }
            | ParseError::MissingOperands { offset }
            | ParseError::Domain { offset, .. } => offset,
        }
    }
}

enum Token<'a> {
    Const(bool),
    Var(&'a str),
    Op(Node),
    Open,
    Close,
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Lexer<'a> {
        Lexer { input, pos: 0 }
    }

    /// Scans the next token. Returns the token and its starting offset, or
    /// `None` at the end of input.
    fn next_token(&mut self) -> Result<Option<(Token<'a>, usize)>, ParseError> {
        let bytes = self.input.as_bytes();

        while self.pos < bytes.len() && matches!(bytes[self.pos], b' ' | b'\t') {
            self.pos += 1;
        }
        let offset = self.pos;
        if self.pos >= bytes.len() {
            return Ok(None);
        }

        let rest = &bytes[self.pos..];
        let token = match rest[0] {
            b'\\' if rest.len() >= 2 && matches!(rest[1], b'T' | b'F') => {
                self.pos += 2;
                Token::Const(rest[1] == b'T')
            }
            b'[' => {
                let close = match rest.iter().position(|&b| b == b']') {
                    Some(close) => close,
                    None => return Err(ParseError::UnrecognizedToken { offset }),
                };
                let name = &self.input[offset + 1..offset + close];
                self.pos += close + 1;
                Token::Var(name)
            }
            b'(' => {
                self.pos += 1;
                Token::Open
            }
            b')' => {
                self.pos += 1;
                Token::Close
            }
            b if b.is_ascii_alphanumeric() => {
                let mut len = 1;
                while len < rest.len()
                    && (rest[len].is_ascii_alphanumeric() || rest[len] == b'_')
                {
                    len += 1;
                }
                let name = &self.input[offset..offset + len];
                self.pos += len;
                Token::Var(name)
            }
            b'~' => {
                self.pos += 1;
                Token::Op(Node::Not)
            }
            b'&' => {
                self.pos += 1;
                Token::Op(Node::And)
            }
            b'|' => {
                self.pos += 1;
                Token::Op(Node::Or)
            }
            b'^' => {
                self.pos += 1;
                Token::Op(Node::Xor)
            }
            b'>' => {
                self.pos += 1;
                Token::Op(Node::Impl)
            }
            b'-' if rest.starts_with(b"->") => {
                self.pos += 2;
                Token::Op(Node::Impl)
            }
            b'=' => {
                self.pos += 1;
                Token::Op(Node::Eqv)
            }
            b'<' if rest.starts_with(b"<->") => {
                self.pos += 3;
                Token::Op(Node::Eqv)
            }
            _ => return Err(ParseError::UnrecognizedToken { offset }),
        };

        Ok(Some((token, offset)))
    }
}

/// The parser always expects either a term or an infix operator.
#[derive(Copy, Clone, PartialEq, Eq)]
enum Expect {
    Term,
    Infix,
}

/// An entry of the operator stack: a pending operator or an opening
/// parenthesis, with the offset of its token.
enum OpEntry {
    Paren { offset: usize },
    Op { node: Node, offset: usize },
}

/// Takes an operator and replaces its operands at the back of the output
/// deque by the combined subexpression.
fn reduce(
    node: Node,
    offset: usize,
    output: &mut VecDeque<(Expr, usize)>,
) -> Result<(), ParseError> {
    if output.len() < node.arity() {
        return Err(ParseError::MissingOperands { offset });
    }
    let (rhs, _) = output.pop_back().unwrap();
    let expr = if node.arity() == 2 {
        let (lhs, _) = output.pop_back().unwrap();
        Expr::binary(node, lhs, rhs)
    } else {
        Expr::unary(node, rhs)
    };
    output.push_back((expr, offset));
    Ok(())
}

fn check(expect: Expect, token_is_term: bool, offset: usize) -> Result<(), ParseError> {
    match (expect, token_is_term) {
        (Expect::Term, true) | (Expect::Infix, false) => Ok(()),
        // A binary operator arrived while a term was expected.
        (Expect::Term, false) => Err(ParseError::TermExpected { offset }),
        // A term arrived while an infix operator was expected.
        (Expect::Infix, true) => Err(ParseError::InfixExpected { offset }),
    }
}

/// Parses an infix formula into an expression, resolving variable names
/// against `domain`.
pub(crate) fn parse(input: &str, domain: &Domain) -> Result<Expr, ParseError> {
    let mut lexer = Lexer::new(input);
    let mut output: VecDeque<(Expr, usize)> = VecDeque::new();
    let mut ops: Vec<OpEntry> = Vec::new();
    let mut expect = Expect::Term;

    while let Some((token, offset)) = lexer.next_token()? {
        match token {
            Token::Const(value) => {
                check(expect, true, offset)?;
                output.push_back((Expr::leaf(Node::Const(value)), offset));
                expect = Expect::Infix;
            }
            Token::Var(name) => {
                check(expect, true, offset)?;
                let var = domain
                    .resolve(name)
                    .map_err(|source| ParseError::Domain { offset, source })?;
                output.push_back((Expr::leaf(Node::Var(var)), offset));
                expect = Expect::Infix;
            }
            Token::Op(node) => {
                // Unary operators open a term; binary operators are infixes.
                check(expect, node.arity() == 1, offset)?;
                // All binary operators chain to the right, so only strictly
                // tighter pending operators reduce first.
                while let Some(top) = ops.last() {
                    match *top {
                        OpEntry::Paren { .. } => break,
                        OpEntry::Op { node: pending, .. } if pending.prec() <= node.prec() => {
                            break
                        }
                        OpEntry::Op {
                            node: pending,
                            offset: pending_offset,
                        } => {
                            ops.pop();
                            reduce(pending, pending_offset, &mut output)?;
                        }
                    }
                }
                ops.push(OpEntry::Op { node, offset });
                if node.arity() == 2 {
                    expect = Expect::Term;
                }
            }
            Token::Open => {
                check(expect, true, offset)?;
                ops.push(OpEntry::Paren { offset });
            }
            Token::Close => {
                // A closing paren terminates a term, always, so we better
                // not still be expecting one.
                if expect == Expect::Term {
                    return Err(ParseError::TermBeforeClosingParen { offset });
                }
                loop {
                    match ops.pop() {
                        None => return Err(ParseError::MissingOpeningParen { offset }),
                        Some(OpEntry::Paren { .. }) => break,
                        Some(OpEntry::Op {
                            node: pending,
                            offset: pending_offset,
                        }) => reduce(pending, pending_offset, &mut output)?,
                    }
                }
            }
        }
    }

    // The parser cannot stop while expecting a term. This rules out the
    // empty formula and guarantees every infix operator a right operand, so
    // operators cannot steal operands from each other in the reduce loop.
    let eof = lexer.pos;
    if expect == Expect::Term {
        return Err(ParseError::TermExpectedAtEof { offset: eof });
    }

    while let Some(entry) = ops.pop() {
        match entry {
            OpEntry::Paren { offset } => {
                return Err(ParseError::MissingClosingParen { offset })
            }
            OpEntry::Op { node, offset } => reduce(node, offset, &mut output)?,
        }
    }

    match output.len() {
        0 => Err(ParseError::NoOperands { offset: eof }),
        1 => Ok(output.pop_front().unwrap().0),
        _ => Err(ParseError::ExcessOperands {
            offset: output.front().unwrap().1,
        }),
    }
}
