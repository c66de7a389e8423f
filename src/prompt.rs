use crate::error::Result;
use colored::Colorize;
use std::io::{self, Write};

/// Operator confirmation capability. Command flows depend on this trait so
/// tests can substitute an implementation that never touches a terminal.
pub trait Confirm {
    fn confirm(&mut self, message: &str) -> Result<bool>;
}

/// Interactive prompt on the controlling terminal.
pub struct TermConfirm;

impl Confirm for TermConfirm {
    fn confirm(&mut self, message: &str) -> Result<bool> {
        print!("{} {} [y/N]: ", "⚠".yellow().bold(), message.bold());
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input.trim().eq_ignore_ascii_case("y"))
    }
}
