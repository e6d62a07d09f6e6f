use std::io::{self, BufRead, StdinLock, Stdout, Write};

use anyhow::{Context, Result};

use crate::frontend::Frontend;
use crate::session::{Session, Speaker};

/// Request/response loop on a terminal: prints each new assistant line once
/// and reads the user's reply after a `You:` prompt.
///
/// User lines are not echoed back, the terminal already shows them.
pub struct LineFrontend<R, W> {
    input: R,
    output: W,
    /// `(session id, messages already printed)`.
    cursor: Option<(String, usize)>,
}

impl LineFrontend<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> LineFrontend<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            cursor: None,
        }
    }

    fn already_shown(&self, session: &Session) -> usize {
        match &self.cursor {
            Some((id, shown)) if id == session.id() && *shown <= session.history().len() => *shown,
            _ => 0,
        }
    }
}

#[cfg(test)]
impl<R> LineFrontend<R, Vec<u8>> {
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl<R: BufRead, W: Write> Frontend for LineFrontend<R, W> {
    fn render(&mut self, session: &Session) -> Result<()> {
        let shown = self.already_shown(session);
        for message in &session.history()[shown..] {
            if message.speaker == Speaker::Assistant {
                writeln!(self.output, "AI: {}", message.text)?;
            }
        }
        self.output.flush()?;
        self.cursor = Some((session.id().to_string(), session.history().len()));
        Ok(())
    }

    fn notice(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "({text})")?;
        self.output.flush()?;
        Ok(())
    }

    fn accept(&mut self) -> Result<Option<String>> {
        write!(self.output, "You: ")?;
        self.output.flush()?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("failed to read from input")?;
        if read == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}
