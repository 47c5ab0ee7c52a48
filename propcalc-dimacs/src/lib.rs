//! DIMACS CNF reader and writer for the propcalc library.
//!
//! The reader turns a DIMACS CNF document into a stream of
//! [`Clause`]s whose variables are resolved through a [`Domain`] —
//! variable `k` of the file becomes the domain's variable number `k`,
//! autovivified on demand. The writer serializes any clause stream back
//! into the format, computing the header counts itself when they are not
//! supplied.
//!
//! Clauses are 0-terminated lists of signed integers and may span lines;
//! `c` lines are comments and the `p cnf` problem line is consumed without
//! validation.

use std::io;
use std::mem;
use std::sync::Arc;

use log::debug;
use thiserror::Error;

use propcalc::{Cached, Clause, Domain, DomainError, Formula, VarNr};

/// Possible errors while reading a DIMACS CNF document.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("line {line}: unexpected token `{token}` in DIMACS CNF input")]
    UnexpectedInput { line: usize, token: String },
    #[error("line {line}: unterminated clause")]
    UnterminatedClause { line: usize },
    #[error("line {line}: {source}")]
    Domain { line: usize, source: DomainError },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Streaming DIMACS CNF parser.
///
/// Iterates over the clauses of the input. After the first error the stream
/// ends; the error itself is yielded as the last item.
pub struct DimacsParser<R> {
    reader: R,
    domain: Arc<Domain>,
    line: usize,
    tokens: std::vec::IntoIter<String>,
    partial: Clause,
    in_clause: bool,
    done: bool,
}

impl<R: io::BufRead> DimacsParser<R> {
    pub fn new(reader: R, domain: &Arc<Domain>) -> DimacsParser<R> {
        DimacsParser {
            reader,
            domain: domain.clone(),
            line: 0,
            tokens: Vec::new().into_iter(),
            partial: Clause::new(),
            in_clause: false,
            done: false,
        }
    }

    /// Number of lines consumed so far.
    pub fn line(&self) -> usize {
        self.line
    }

    /// The next whitespace-separated token, skipping empty lines, comments
    /// and the problem line. `None` at end of input.
    fn next_token(&mut self) -> Result<Option<String>, ParserError> {
        loop {
            if let Some(token) = self.tokens.next() {
                return Ok(Some(token));
            }
            let mut buf = String::new();
            if self.reader.read_line(&mut buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;
            let line = buf.trim();
            if line.is_empty() || line.starts_with('c') || line.starts_with("p cnf ") {
                continue;
            }
            self.tokens = line
                .split_whitespace()
                .map(str::to_owned)
                .collect::<Vec<_>>()
                .into_iter();
        }
    }

    fn next_clause(&mut self) -> Result<Option<Clause>, ParserError> {
        loop {
            let token = match self.next_token()? {
                Some(token) => token,
                None if self.in_clause => {
                    return Err(ParserError::UnterminatedClause { line: self.line });
                }
                None => return Ok(None),
            };

            let literal: i64 = token.parse().map_err(|_| ParserError::UnexpectedInput {
                line: self.line,
                token: token.clone(),
            })?;

            if literal == 0 {
                self.in_clause = false;
                return Ok(Some(mem::take(&mut self.partial)));
            }

            let var = self
                .domain
                .unpack(literal.unsigned_abs() as VarNr)
                .map_err(|source| ParserError::Domain {
                    line: self.line,
                    source,
                })?;
            self.partial.set(var, literal > 0);
            self.in_clause = true;
        }
    }
}

impl<R: io::BufRead> Iterator for DimacsParser<R> {
    type Item = Result<Clause, ParserError>;

    fn next(&mut self) -> Option<Result<Clause, ParserError>> {
        if self.done {
            return None;
        }
        match self.next_clause() {
            Ok(Some(clause)) => Some(Ok(clause)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Reads a whole DIMACS CNF document into a clause list.
pub fn read_clauses(
    input: impl io::Read,
    domain: &Arc<Domain>,
) -> Result<Vec<Clause>, ParserError> {
    let clauses: Result<Vec<Clause>, ParserError> =
        DimacsParser::new(io::BufReader::new(input), domain).collect();
    let clauses = clauses?;
    debug!("dimacs: read {} clauses", clauses.len());
    Ok(clauses)
}

/// Reads a DIMACS CNF document into the conjunction formula of its clauses.
///
/// A document without clauses reads as `\T`.
pub fn read_formula(
    input: impl io::Read,
    domain: &Arc<Domain>,
) -> Result<Formula, ParserError> {
    let clauses = read_clauses(input, domain)?;
    Ok(Formula::from_clauses(clauses, domain))
}

/// Comment lines and counts of a DIMACS CNF header.
#[derive(Clone, Debug, Default)]
pub struct Header {
    pub comments: Vec<String>,
    pub max_var: VarNr,
    pub clause_count: usize,
}

/// Writes comment lines and the `p cnf` problem line.
pub fn write_header(target: &mut impl io::Write, header: &Header) -> io::Result<()> {
    for comment in &header.comments {
        writeln!(target, "c {}", comment)?;
    }
    writeln!(target, "p cnf {} {}", header.max_var, header.clause_count)
}

/// Writes clauses as 0-terminated lines of signed literals.
pub fn write_clauses<'a>(
    target: &mut impl io::Write,
    clauses: impl IntoIterator<Item = &'a Clause>,
) -> io::Result<()> {
    let mut buf = itoa::Buffer::new();
    for clause in clauses {
        for (var, sign) in clause.iter() {
            let mut literal = var.number() as i64;
            if !sign {
                literal = -literal;
            }
            target.write_all(buf.format(literal).as_bytes())?;
            target.write_all(b" ")?;
        }
        target.write_all(b"0\n")?;
    }
    Ok(())
}

/// Writes a complete DIMACS CNF document with a known header.
pub fn write_with_header<'a>(
    target: &mut impl io::Write,
    clauses: impl IntoIterator<Item = &'a Clause>,
    header: &Header,
) -> io::Result<()> {
    write_header(target, header)?;
    write_clauses(target, clauses)
}

/// Writes a complete DIMACS CNF document.
///
/// The clause stream is cached and consumed once up front to compute the
/// header's variable and clause counts, then replayed for emission.
pub fn write(
    target: &mut impl io::Write,
    clauses: impl IntoIterator<Item = Clause>,
    comments: &[&str],
) -> io::Result<()> {
    let mut cached = Cached::new(clauses.into_iter());
    let mut header = Header {
        comments: comments.iter().map(|&c| c.to_owned()).collect(),
        max_var: 0,
        clause_count: cached.fill(),
    };
    for clause in cached.replay() {
        for (var, _) in clause.iter() {
            header.max_var = header.max_var.max(var.number());
        }
    }
    debug!(
        "dimacs: writing {} clauses over {} variables",
        header.clause_count, header.max_var
    );
    write_header(target, &header)?;
    let clauses = cached.into_vec();
    write_clauses(target, clauses.iter())
}

#[cfg(test)]
mod tests {
    use super::*;
    use propcalc::clause;

    fn domain() -> Arc<Domain> {
        Arc::new(Domain::new())
    }

    #[test]
    fn reads_comments_header_and_clauses() {
        let input = b"c a comment\nc another\np cnf 4 3\n1 2 3 0\n-4 0\n2 0\n" as &[u8];
        let clauses = read_clauses(input, &domain()).unwrap();
        assert_eq!(
            clauses,
            vec![clause![1, 2, 3], clause![-4], clause![2]]
        );
    }

    #[test]
    fn clauses_may_span_and_share_lines() {
        let input = b"1\n2 3\n0 -4 0 2\n\n0\n" as &[u8];
        let clauses = read_clauses(input, &domain()).unwrap();
        assert_eq!(
            clauses,
            vec![clause![1, 2, 3], clause![-4], clause![2]]
        );
    }

    #[test]
    fn empty_clause_and_empty_input() {
        assert_eq!(
            read_clauses(b"0\n" as &[u8], &domain()).unwrap(),
            vec![Clause::new()]
        );
        assert_eq!(read_clauses(b"" as &[u8], &domain()).unwrap(), vec![]);
        assert_eq!(
            read_clauses(b"c nothing\np cnf 0 0\n" as &[u8], &domain()).unwrap(),
            vec![]
        );
    }

    #[test]
    fn reader_autovivifies_the_domain() {
        let domain = domain();
        read_clauses(b"7 -3 0\n" as &[u8], &domain).unwrap();
        assert_eq!(domain.size(), 7);
        assert_eq!(domain.name(domain.unpack(3).unwrap()), "3");
    }

    #[test]
    fn junk_is_reported_with_its_line() {
        let err = read_clauses(b"1 2 0\nx 0\n" as &[u8], &domain()).unwrap_err();
        match err {
            ParserError::UnexpectedInput { line, token } => {
                assert_eq!(line, 2);
                assert_eq!(token, "x");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unterminated_clause_is_an_error() {
        let err = read_clauses(b"1 2 3\n" as &[u8], &domain()).unwrap_err();
        assert!(matches!(err, ParserError::UnterminatedClause { line: 1 }));
    }

    #[test]
    fn frozen_domain_fails() {
        let domain = domain();
        domain.freeze();
        let err = read_clauses(b"1 0\n" as &[u8], &domain).unwrap_err();
        assert!(matches!(
            err,
            ParserError::Domain {
                line: 1,
                source: DomainError::Frozen,
            }
        ));
    }

    #[test]
    fn writer_computes_the_header() {
        let clauses = vec![clause![1, -3], clause![2]];
        let mut out = Vec::new();
        write(&mut out, clauses, &["made by propcalc"]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "c made by propcalc\np cnf 3 2\n1 -3 0\n2 0\n"
        );
    }

    #[test]
    fn writer_respects_a_given_header() {
        let clauses = vec![clause![-1]];
        let header = Header {
            comments: vec![],
            max_var: 5,
            clause_count: 1,
        };
        let mut out = Vec::new();
        write_with_header(&mut out, clauses.iter(), &header).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "p cnf 5 1\n-1 0\n");
    }

    #[test]
    fn formula_of_a_document() {
        let domain = domain();
        let formula = read_formula(b"1 -2 0\n3 0\n" as &[u8], &domain).unwrap();
        assert_eq!(formula.to_postfix(), "[1] [2] ~ | [3] &");

        let tautology = read_formula(b"" as &[u8], &domain).unwrap();
        assert_eq!(tautology.to_postfix(), "\\T");
    }

    mod properties {
        use super::*;
        use propcalc::clause::strategy;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn roundtrip(cnf in strategy::cnf(30, 0..40usize, 0..8usize)) {
                let mut out = Vec::new();
                write(&mut out, cnf.iter().cloned(), &[]).unwrap();

                let parsed = read_clauses(&out[..], &domain()).unwrap();
                prop_assert_eq!(parsed, cnf);
            }
        }
    }
}
