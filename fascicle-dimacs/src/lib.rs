//! DIMACS CNF parser and writer for the fascicle SAT solver.

use std::io::{self, BufRead, BufReader, Read, Write};

use fascicle_formula::{lit::Var, CnfFormula, Lit};

use thiserror::Error;

/// Possible errors while parsing a DIMACS CNF formula.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: unexpected token in DIMACS CNF input: '{token}'")]
    UnexpectedToken { line: usize, token: String },
    #[error("line {line}: literal index too large: {token}")]
    LiteralTooLarge { line: usize, token: String },
    #[error("line {line}: invalid header syntax: {header}")]
    InvalidHeader { line: usize, header: String },
    #[error("line {line}: unterminated clause at end of input")]
    UnterminatedClause { line: usize },
    #[error("formula has {var_count} variables while the header specifies {header_var_count}")]
    VarCount {
        var_count: usize,
        header_var_count: usize,
    },
    #[error("formula has {clause_count} clauses while the header specifies {header_clause_count}")]
    ClauseCount {
        clause_count: usize,
        header_clause_count: usize,
    },
    #[error("IO error during parsing")]
    Io(#[from] io::Error),
}

/// Variable and clause count of a DIMACS CNF header line.
#[derive(Copy, Clone, Debug)]
pub struct DimacsHeader {
    pub var_count: usize,
    pub clause_count: usize,
}

/// Parse a complete DIMACS CNF input into a [`CnfFormula`].
///
/// Comment lines (starting with `c`) are skipped. A `p cnf` header is
/// optional; when present the variable and clause counts of the formula are
/// checked against it and the variable count of the result is padded up to
/// the header's count.
pub fn parse_dimacs(input: impl Read) -> Result<CnfFormula, ParseError> {
    let mut formula = CnfFormula::new();
    let mut header: Option<DimacsHeader> = None;

    let mut clause: Vec<Lit> = vec![];
    let mut line_number = 0;

    for line in BufReader::new(input).lines() {
        let line = line?;
        line_number += 1;

        let mut tokens = line.split_whitespace().peekable();

        match tokens.peek() {
            None => continue,
            Some(&"c") | Some(&"%") => continue,
            Some(&"p") => {
                header = Some(parse_header(&line, line_number)?);
                continue;
            }
            Some(token) if token.starts_with('c') => continue,
            _ => {}
        }

        for token in tokens {
            let number: isize = token.parse().map_err(|_| ParseError::UnexpectedToken {
                line: line_number,
                token: token.to_string(),
            })?;

            if number == 0 {
                formula.add_clause(&clause);
                clause.clear();
            } else if number
                .checked_abs()
                .map_or(true, |index| index as usize > Var::max_var().index() + 1)
            {
                return Err(ParseError::LiteralTooLarge {
                    line: line_number,
                    token: token.to_string(),
                });
            } else {
                clause.push(Lit::from_dimacs(number));
            }
        }
    }

    if !clause.is_empty() {
        return Err(ParseError::UnterminatedClause { line: line_number });
    }

    if let Some(header) = header {
        if formula.var_count() > header.var_count {
            return Err(ParseError::VarCount {
                var_count: formula.var_count(),
                header_var_count: header.var_count,
            });
        }
        if formula.len() != header.clause_count {
            return Err(ParseError::ClauseCount {
                clause_count: formula.len(),
                header_clause_count: header.clause_count,
            });
        }
        formula.set_var_count(header.var_count);
    }

    Ok(formula)
}

fn parse_header(line: &str, line_number: usize) -> Result<DimacsHeader, ParseError> {
    let invalid = || ParseError::InvalidHeader {
        line: line_number,
        header: line.to_string(),
    };

    let mut tokens = line.split_whitespace();

    if tokens.next() != Some("p") || tokens.next() != Some("cnf") {
        return Err(invalid());
    }

    let var_count = tokens
        .next()
        .and_then(|token| token.parse().ok())
        .ok_or_else(invalid)?;
    let clause_count = tokens
        .next()
        .and_then(|token| token.parse().ok())
        .ok_or_else(invalid)?;

    if tokens.next().is_some() {
        return Err(invalid());
    }

    Ok(DimacsHeader {
        var_count,
        clause_count,
    })
}

/// Write a formula in DIMACS CNF format.
pub fn write_dimacs(target: &mut impl Write, formula: &CnfFormula) -> io::Result<()> {
    writeln!(target, "p cnf {} {}", formula.var_count(), formula.len())?;

    for clause in formula.iter() {
        for &lit in clause {
            itoa::write(&mut *target, lit.to_dimacs())?;
            target.write_all(b" ")?;
        }
        target.write_all(b"0\n")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use fascicle_formula::cnf::strategy::cnf_formula;
    use fascicle_formula::cnf_formula;

    #[test]
    fn parses_simple_input() {
        let input = b"c example\np cnf 4 3\n1 -2 0\n2 3 -4 0\n-1 4 0\n";

        let formula = parse_dimacs(&input[..]).expect("parse failed");

        let expected = cnf_formula![
            1, -2;
            2, 3, -4;
            -1, 4;
        ];

        assert_eq!(formula, expected);
    }

    #[test]
    fn clause_may_span_lines() {
        let input = b"p cnf 3 1\n1\n-2\n3 0\n";

        let formula = parse_dimacs(&input[..]).expect("parse failed");

        assert_eq!(formula, cnf_formula![1, -2, 3;]);
    }

    #[test]
    fn header_is_optional() {
        let formula = parse_dimacs(&b"1 2 0\n-1 0\n"[..]).expect("parse failed");

        assert_eq!(formula, cnf_formula![1, 2; -1;]);
    }

    #[test]
    fn rejects_unterminated_clause() {
        match parse_dimacs(&b"p cnf 2 1\n1 2\n"[..]) {
            Err(ParseError::UnterminatedClause { .. }) => {}
            result => panic!("unexpected result: {:?}", result.map(|_| ())),
        }
    }

    #[test]
    fn rejects_wrong_clause_count() {
        match parse_dimacs(&b"p cnf 2 2\n1 2 0\n"[..]) {
            Err(ParseError::ClauseCount {
                clause_count: 1,
                header_clause_count: 2,
            }) => {}
            result => panic!("unexpected result: {:?}", result.map(|_| ())),
        }
    }

    #[test]
    fn rejects_garbage() {
        match parse_dimacs(&b"1 two 0\n"[..]) {
            Err(ParseError::UnexpectedToken { line: 1, .. }) => {}
            result => panic!("unexpected result: {:?}", result.map(|_| ())),
        }
    }

    proptest! {
        #[test]
        fn write_parse_roundtrip(formula in cnf_formula(1..100usize, 0..100, 1..10)) {
            let mut buffer = vec![];
            write_dimacs(&mut buffer, &formula).unwrap();

            let parsed = parse_dimacs(&buffer[..]).expect("parse failed");

            prop_assert_eq!(parsed, formula);
        }
    }
}
