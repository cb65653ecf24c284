use anyhow::{bail, Result};

use super::Version;

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum Statement {
    Insert(i64),
    Remove(i64),
    Successor { key: i64, version: Version },
    Print(Version),
}

pub trait Parser {
    fn parse_lines(&self, s: &str) -> Result<Vec<Statement>>;
    fn parse_line(&self, s: &str) -> Result<Statement>;
}

pub struct ParserArretado {}

impl ParserArretado {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for ParserArretado {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for ParserArretado {
    fn parse_lines(&self, s: &str) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();

        for line in s.lines() {
            // Batch files may carry blank separator lines.
            if line.trim().is_empty() {
                continue;
            }
            statements.push(self.parse_line(line)?);
        }

        Ok(statements)
    }

    fn parse_line(&self, s: &str) -> Result<Statement> {
        let tokens: Vec<&str> = s.split_whitespace().collect();

        match tokens.as_slice() {
            [op, operand] => match op.to_uppercase().as_str() {
                "INC" => Ok(Statement::Insert(operand.parse()?)),
                "REM" => Ok(Statement::Remove(operand.parse()?)),
                "IMP" => Ok(Statement::Print(operand.parse()?)),
                unknown => bail!("unknown statement {unknown}"),
            },
            [op, key, version] => {
                if !op.eq_ignore_ascii_case("SUC") {
                    bail!("only SUC takes a key and a version, got {op}");
                }
                Ok(Statement::Successor {
                    key: key.parse()?,
                    version: version.parse()?,
                })
            }
            _ => bail!("expected 2 or 3 tokens, got {} in {s:?}", tokens.len()),
        }
    }
}
