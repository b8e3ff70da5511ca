//! Interactive yes/no gate in front of destructive operations.

use std::io::{BufRead, Write};

use crate::error::VmError;

const REPROMPT: &str = "Please type yes or no and then press enter:";

pub trait Confirm {
    /// Ask `prompt` until a recognised answer arrives.
    fn confirm(&mut self, prompt: &str) -> Result<bool, VmError>;
}

/// Line-oriented confirmation over any reader/writer pair.
pub struct ConfirmationGate<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConfirmationGate<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn write_line(&mut self, text: &str) -> Result<(), VmError> {
        writeln!(self.output, "{text}")
            .and_then(|_| self.output.flush())
            .map_err(|e| VmError::Io {
                context: "failed to write confirmation prompt".into(),
                source: e,
            })
    }
}

impl ConfirmationGate<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

/// Classify one answer line. `None` means unrecognised.
pub fn parse_answer(line: &str) -> Option<bool> {
    match line.trim() {
        "y" | "Y" | "yes" | "Yes" | "YES" => Some(true),
        "n" | "N" | "no" | "No" | "NO" => Some(false),
        _ => None,
    }
}

impl<R: BufRead, W: Write> Confirm for ConfirmationGate<R, W> {
    fn confirm(&mut self, prompt: &str) -> Result<bool, VmError> {
        self.write_line(prompt)?;
        let mut line = String::new();
        loop {
            line.clear();
            let n = self.input.read_line(&mut line).map_err(|e| VmError::Io {
                context: "failed to read confirmation".into(),
                source: e,
            })?;
            if n == 0 {
                return Err(VmError::Io {
                    context: "input closed before a yes/no answer".into(),
                    source: std::io::ErrorKind::UnexpectedEof.into(),
                });
            }
            match parse_answer(&line) {
                Some(answer) => return Ok(answer),
                None => self.write_line(REPROMPT)?,
            }
        }
    }
}
