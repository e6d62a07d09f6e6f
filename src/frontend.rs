//! Session loop and the front-ends it drives.
//!
//! The loop owns control flow; a [`Frontend`] only shows history and reads
//! lines. Rendering is driven by what changed in the session's history, so
//! calling `render` twice in a row shows nothing new.

pub mod line;
pub mod retained;

use std::sync::Arc;

use anyhow::Result;
use log::info;

use crate::engine::TurnOutcome;
use crate::flow::TreeStore;
use crate::oracle::Oracle;
use crate::session::Session;

pub use line::LineFrontend;
pub use retained::RetainedFrontend;

pub const EMPTY_INPUT_NOTICE: &str = "I didn't catch that. Could you please repeat?";

/// Display and input for one conversation at a time.
pub trait Frontend {
    /// Show whatever part of the session history is not on screen yet.
    fn render(&mut self, session: &Session) -> Result<()>;

    /// Out-of-band message that is not part of the conversation.
    fn notice(&mut self, text: &str) -> Result<()>;

    /// Read one utterance. `None` when input is closed.
    fn accept(&mut self) -> Result<Option<String>>;

    /// Ask whether to start over. Closed input means no.
    fn ask_restart(&mut self) -> Result<bool> {
        self.notice("[r] Restart    [q] Quit")?;
        loop {
            let Some(input) = self.accept()? else {
                return Ok(false);
            };
            match input.trim().to_lowercase().as_str() {
                "r" => return Ok(true),
                "q" => return Ok(false),
                _ => self.notice("Press [r] to restart or [q] to quit.")?,
            }
        }
    }
}

/// How a run of [`run_session`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The session reached `Terminated`.
    Finished { turns: usize },
    /// The user typed a quit command.
    Quit,
    /// Input closed before the session finished.
    InputClosed,
}

/// Slash-prefixed so that a plain "exit" can still be an answer.
fn is_quit(input: &str) -> bool {
    let input = input.trim();
    input.eq_ignore_ascii_case("/quit") || input.eq_ignore_ascii_case("/exit")
}

/// Drive `session` until it terminates or the user leaves.
///
/// Re-entering with an already terminated session renders nothing new and
/// returns immediately.
pub fn run_session<O, F>(session: &mut Session, oracle: &O, frontend: &mut F) -> Result<SessionEnd>
where
    O: Oracle + ?Sized,
    F: Frontend + ?Sized,
{
    loop {
        frontend.render(session)?;
        if session.is_ended() {
            return Ok(SessionEnd::Finished {
                turns: session.turns(),
            });
        }

        let Some(input) = frontend.accept()? else {
            return Ok(SessionEnd::InputClosed);
        };
        if is_quit(&input) {
            info!("Session '{}' abandoned by user", session.id());
            return Ok(SessionEnd::Quit);
        }

        let turn = session.submit(oracle, &input);
        // Draw the turn first: a redraw clears the screen and would take
        // the notices with it.
        frontend.render(session)?;
        for failure in &turn.oracle_failures {
            frontend.notice(&format!("LLM processing error: {failure}"))?;
        }
        if turn.outcome == TurnOutcome::EmptyInput {
            frontend.notice(EMPTY_INPUT_NOTICE)?;
        }
    }
}

/// Run sessions back to back, offering a restart after each one.
pub fn run<O, F>(tree: Arc<TreeStore>, oracle: &O, frontend: &mut F) -> Result<()>
where
    O: Oracle + ?Sized,
    F: Frontend + ?Sized,
{
    for round in 1.. {
        let mut session = Session::new(format!("local-{round}"), Arc::clone(&tree));
        let end = run_session(&mut session, oracle, frontend)?;
        info!("Session '{}' ended: {end:?}", session.id());

        match end {
            SessionEnd::InputClosed => break,
            SessionEnd::Quit => frontend.notice("You left the conversation.")?,
            SessionEnd::Finished { turns } => {
                frontend.notice(&format!("Turns taken: {turns}"))?;
            }
        }

        if !frontend.ask_restart()? {
            break;
        }
        info!("User chose to restart");
    }
    Ok(())
}
