//! Run bookkeeping: states, preview, confirmation, outcome

use crate::migration::{Direction, MigrationError};
use std::fmt;
use std::io::{BufRead, Write};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Planned,
    Previewed,
    Applying,
    Done,
    Aborted,
}

impl RunState {
    pub(crate) fn advance(&mut self, next: RunState) {
        log::debug!("run state {self:?} -> {next:?}");
        *self = next;
    }
}

/// One planned step as shown to the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewEntry {
    pub version: i64,
    /// File name of the script that will run, or where the stored script comes from
    pub label: String,
}

/// The resolved migration list shown before anything is applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub direction: Direction,
    pub entries: Vec<PreviewEntry>,
}

impl fmt::Display for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Migrations that will be brought {}:", self.direction)?;
        for entry in &self.entries {
            writeln!(f, "{}", entry.label)?;
        }
        Ok(())
    }
}

/// One committed transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedStep {
    pub version: i64,
    pub tag: String,
    pub direction: Direction,
}

impl fmt::Display for AppliedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.tag, self.direction)
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every planned step committed, in order
    Completed(Vec<AppliedStep>),
    /// The operator declined the preview; nothing was touched
    Aborted,
}

/// Asks the operator whether to go ahead
pub trait Confirm {
    /// Show `prompt` and return `true` only on an explicit yes
    fn confirm(&mut self, prompt: &str) -> Result<bool, MigrationError>;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> Result<bool, MigrationError> {
        Ok(self(prompt))
    }
}

/// `y` or `yes`, ignoring case and surrounding whitespace
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Line-oriented prompt over any reader/writer pair (stdin/stdout in the CLI)
pub struct LineConfirm<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LineConfirm<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Confirm for LineConfirm<R, W> {
    fn confirm(&mut self, prompt: &str) -> Result<bool, MigrationError> {
        let stdio = |e| MigrationError::io("<stdio>", e);
        write!(self.output, "{prompt}").map_err(stdio)?;
        if !prompt.ends_with('\n') {
            writeln!(self.output).map_err(stdio)?;
        }
        write!(self.output, "Continue? [y/N] ").map_err(stdio)?;
        self.output.flush().map_err(stdio)?;

        let mut answer = String::new();
        self.input.read_line(&mut answer).map_err(stdio)?;
        Ok(is_affirmative(&answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_is_affirmative() {
        for yes in ["y", "Y", "yes", "YES", " Yes \n"] {
            assert!(is_affirmative(yes), "Should accept: {yes:?}");
        }
        for no in ["", "\n", "n", "no", "yep", "ye", "sure"] {
            assert!(!is_affirmative(no), "Should decline: {no:?}");
        }
    }

    #[test]
    fn test_preview_rendering() {
        let preview = Preview {
            direction: Direction::Down,
            entries: vec![
                PreviewEntry {
                    version: 3,
                    label: "3.c.down.sql".to_string(),
                },
                PreviewEntry {
                    version: 2,
                    label: "2.b.down.sql".to_string(),
                },
            ],
        };
        assert_eq!(
            preview.to_string(),
            "Migrations that will be brought down:\n3.c.down.sql\n2.b.down.sql\n"
        );
    }

    #[test]
    fn test_line_confirm_reads_answer() {
        let mut output = Vec::new();
        let mut confirm = LineConfirm::new(Cursor::new("yes\n"), &mut output);
        assert!(confirm.confirm("Migrations that will be brought up:\n1.a.up.sql\n").unwrap());
        let shown = String::from_utf8(output).unwrap();
        assert!(shown.ends_with("1.a.up.sql\nContinue? [y/N] "));
    }

    #[test]
    fn test_line_confirm_defaults_to_no() {
        let mut confirm = LineConfirm::new(Cursor::new(""), Vec::new());
        assert!(!confirm.confirm("Ok?").unwrap());
    }

    #[test]
    fn test_closure_confirm() {
        let mut asked = Vec::new();
        let mut confirm = |prompt: &str| {
            asked.push(prompt.to_string());
            false
        };
        assert!(!Confirm::confirm(&mut confirm, "go?").unwrap());
        assert_eq!(asked, vec!["go?"]);
    }

    #[test]
    fn test_applied_step_display() {
        let step = AppliedStep {
            version: 1,
            tag: "create-users".to_string(),
            direction: Direction::Up,
        };
        assert_eq!(step.to_string(), "create-users - up");
    }
}
