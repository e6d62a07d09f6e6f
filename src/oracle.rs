//! Yes/no judgement over natural-language conditions.
//!
//! The engine only sees [`Oracle`]. [`OracleClient`] is the production
//! implementation: it renders a fixed instruction, hands it to a [`Backend`]
//! and reads the answer conservatively. Anything other than a plain "yes" is
//! a no, and backend failures are a no as well.

pub mod gemini;
#[cfg(feature = "llama")]
pub mod llama;

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use regex::Regex;

use crate::error::OracleError;

/// Outcome of one classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Yes,
    No,
    /// The model could not be asked. Counts as [`Verdict::No`] for
    /// traversal; the message is kept for the operator.
    Failed(String),
}

impl Verdict {
    pub fn is_yes(&self) -> bool {
        matches!(self, Verdict::Yes)
    }
}

/// Decides whether an utterance satisfies a condition.
pub trait Oracle {
    fn classify(&self, utterance: &str, condition: &str) -> Verdict;
}

/// A model that turns one instruction into one completion.
pub trait Backend {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    fn complete(&self, prompt: &str) -> Result<String, OracleError>;
}

/// Oracle backed by a language model.
pub struct OracleClient {
    backend: Box<dyn Backend>,
}

impl OracleClient {
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    pub fn from_boxed(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }
}

impl Oracle for OracleClient {
    fn classify(&self, utterance: &str, condition: &str) -> Verdict {
        let prompt = build_instruction(utterance, condition);
        debug!("Oracle instruction ({}):\n{prompt}", self.backend.name());

        match self.backend.complete(&prompt) {
            Ok(raw) => {
                let yes = parse_verdict(&raw);
                debug!("Oracle answered {raw:?} for condition {condition:?} -> {yes}");
                if yes {
                    Verdict::Yes
                } else {
                    Verdict::No
                }
            }
            Err(e) => {
                warn!("LLM processing error ({}): {e}", self.backend.name());
                Verdict::Failed(e.to_string())
            }
        }
    }
}

/// Wall-clock limit for backends that cannot hand the timeout to a client
/// library and have to poll it themselves.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    pub fn check(&self) -> Result<(), OracleError> {
        if Instant::now() >= self.0 {
            Err(OracleError::Timeout)
        } else {
            Ok(())
        }
    }
}

/// Render the instruction sent to the model for one edge.
pub fn build_instruction(utterance: &str, condition: &str) -> String {
    format!(
        "You are an AI assistant validating user input for a structured chatbot.\n\
         User response: \"{utterance}\"\n\
         Expected condition: \"{condition}\"\n\
         \n\
         Does the user's response logically align with the expected condition?\n\
         Reply with only 'yes' or 'no'."
    )
}

fn think_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>(.*?)</think>").expect("valid think regex"))
}

/// Only an exact, case-insensitive "yes" counts. Reasoning blocks emitted by
/// thinking models are dropped first.
pub fn parse_verdict(raw: &str) -> bool {
    for cap in think_block().captures_iter(raw) {
        let thought = cap.get(1).map_or("", |m| m.as_str()).trim();
        if !thought.is_empty() {
            trace!("Model thinking:\n{thought}");
        }
    }
    let cleaned = think_block().replace_all(raw, "");
    cleaned.trim().eq_ignore_ascii_case("yes")
}
