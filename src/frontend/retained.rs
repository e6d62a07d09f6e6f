use std::io::{self, BufRead, StdinLock, Stdout, Write};

use anyhow::{Context, Result};

use crate::frontend::Frontend;
use crate::session::{Session, Speaker};

pub(crate) const CLEAR_SCREEN: &str = "\x1B[2J\x1B[H";

/// Chat-window style display: every change redraws the whole transcript,
/// user turns included.
///
/// Redraws only happen when the history grew, so rendering an unchanged
/// session is a no-op.
pub struct RetainedFrontend<R, W> {
    input: R,
    output: W,
    title: String,
    clear: bool,
    /// `(session id, history length at last redraw)`.
    drawn: Option<(String, usize)>,
}

impl RetainedFrontend<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> RetainedFrontend<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            title: "Flow-Based Chatbot".to_string(),
            clear: true,
            drawn: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Append redraws instead of clearing the terminal first.
    pub fn without_clear(mut self) -> Self {
        self.clear = false;
        self
    }

    fn is_current(&self, session: &Session) -> bool {
        matches!(&self.drawn, Some((id, len)) if id == session.id() && *len == session.history().len())
    }
}

#[cfg(test)]
impl<R> RetainedFrontend<R, Vec<u8>> {
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl<R: BufRead, W: Write> Frontend for RetainedFrontend<R, W> {
    fn render(&mut self, session: &Session) -> Result<()> {
        if self.is_current(session) {
            return Ok(());
        }
        if self.clear {
            write!(self.output, "{CLEAR_SCREEN}")?;
        }
        writeln!(self.output, "=== {} ===", self.title)?;
        for message in session.history() {
            let label = match message.speaker {
                Speaker::Assistant => "assistant",
                Speaker::User => "you",
            };
            writeln!(self.output, "{label:>9} | {}", message.text)?;
        }
        self.output.flush()?;
        self.drawn = Some((session.id().to_string(), session.history().len()));
        Ok(())
    }

    fn notice(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "          * {text}")?;
        self.output.flush()?;
        Ok(())
    }

    fn accept(&mut self) -> Result<Option<String>> {
        write!(self.output, "Your response> ")?;
        self.output.flush()?;

        let mut line = String::new();
        if self
            .input
            .read_line(&mut line)
            .context("failed to read from input")?
            == 0
        {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use super::*;
    use crate::flow::{Node, TreeStore};
    use crate::oracle::testing::always;
    use crate::oracle::Verdict;

    fn session() -> Session {
        let tree = TreeStore::from_nodes(
            vec![
                Node::new("a", "Hello?").with_edge("greeting", "b"),
                Node::new("b", "Goodbye."),
            ],
            None,
        )
        .unwrap();
        Session::new("s", Arc::new(tree))
    }

    fn frontend() -> RetainedFrontend<Cursor<Vec<u8>>, Vec<u8>> {
        RetainedFrontend::new(Cursor::new(Vec::new()), Vec::new())
            .with_title("Test")
            .without_clear()
    }

    #[test]
    fn test_redraw_replays_full_history() {
        let mut session = session();
        let mut fe = frontend();
        fe.render(&session).unwrap();
        session.submit(&always(Verdict::Yes), "hi");
        fe.render(&session).unwrap();

        let out = fe.output_string();
        assert_eq!(out.matches("=== Test ===").count(), 2);
        assert_eq!(out.matches("assistant | Hello?").count(), 2);
        assert_eq!(out.matches("you | hi").count(), 1);
        assert_eq!(out.matches("assistant | Goodbye.").count(), 1);
    }

    #[test]
    fn test_unchanged_session_is_not_redrawn() {
        let session = session();
        let mut fe = frontend();
        fe.render(&session).unwrap();
        fe.render(&session).unwrap();
        assert_eq!(fe.output_string().matches("=== Test ===").count(), 1);
    }

    #[test]
    fn test_clear_screen_by_default() {
        let mut fe = RetainedFrontend::new(Cursor::new(Vec::new()), Vec::new());
        fe.render(&session()).unwrap();
        assert!(fe.output_string().starts_with(CLEAR_SCREEN));
    }
}
