use std::fmt::Write;

use anyhow::Result;

use super::parser::Statement;
use super::Madara;

const INFINITE_KEYWORD: &str = "infinito";

/// Runs parsed statements against one tree and accumulates the textual
/// responses. Mutations answer nothing; `SUC` and `IMP` echo the statement
/// line first, then their result line.
pub struct Processor {
    tree: Madara<i64>,
}

impl Processor {
    pub fn new() -> Self {
        Self {
            tree: Madara::default(),
        }
    }

    pub fn tree(&self) -> &Madara<i64> {
        &self.tree
    }

    pub fn run(&mut self, statements: &[Statement]) -> Result<String> {
        let mut out = String::new();
        for statement in statements {
            self.step(statement, &mut out)?;
        }
        Ok(out)
    }

    fn step(&mut self, statement: &Statement, out: &mut String) -> Result<()> {
        match *statement {
            Statement::Insert(key) => self.tree.insert(key)?,
            Statement::Remove(key) => self.tree.remove(key)?,
            Statement::Successor { key, version } => {
                writeln!(out, "SUC {key} {version}")?;
                match self.tree.successor(key, version)? {
                    Some(succ) => writeln!(out, "{succ}")?,
                    None => writeln!(out, "{INFINITE_KEYWORD}")?,
                }
            }
            Statement::Print(version) => {
                writeln!(out, "IMP {version}")?;
                let mut first = true;
                for entry in self.tree.inorder(version)? {
                    if !first {
                        out.push(' ');
                    }
                    write!(out, "{},{},{}", entry.key, entry.depth, entry.color)?;
                    first = false;
                }
                out.push('\n');
            }
        }
        Ok(())
    }
}

impl Default for Processor {
    fn default() -> Self {
        Self::new()
    }
}
