//! Per-user conversation state.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::info;

use crate::engine::{State, Traversal, Turn, TurnOutcome};
use crate::flow::{Node, TreeStore};
use crate::oracle::Oracle;

/// Appended to the history once, when a session terminates.
pub const END_MESSAGE: &str = "The conversation has ended. Thank you!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Assistant,
    User,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::Assistant => write!(f, "assistant"),
            Speaker::User => write!(f, "user"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub speaker: Speaker,
    pub text: String,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]: {}", self.speaker, self.text)
    }
}

/// One user's walk through the tree.
///
/// The history is for display only; traversal never reads it.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    tree: Arc<TreeStore>,
    traversal: Traversal,
    history: Vec<Message>,
    turns: usize,
}

impl Session {
    /// Start a session at the tree's root. The root prompt is the first
    /// history entry.
    pub fn new(id: impl Into<String>, tree: Arc<TreeStore>) -> Self {
        let traversal = Traversal::new(&tree);
        let mut session = Self {
            id: id.into(),
            tree,
            traversal,
            history: Vec::new(),
            turns: 0,
        };
        session.announce_current();
        info!("Session '{}' started at '{}'", session.id, session.tree.root_id());
        session
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &State {
        self.traversal.state()
    }

    pub fn current_node(&self) -> Option<&Node> {
        self.traversal.current(&self.tree)
    }

    pub fn is_ended(&self) -> bool {
        self.traversal.is_terminated()
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Non-blank utterances submitted, whether or not an edge matched.
    pub fn turns(&self) -> usize {
        self.turns
    }

    /// Process one utterance.
    pub fn submit<O>(&mut self, oracle: &O, utterance: &str) -> Turn
    where
        O: Oracle + ?Sized,
    {
        let utterance = utterance.trim();
        if !self.is_ended() && !utterance.is_empty() {
            self.push(Speaker::User, utterance);
            self.turns += 1;
        }

        let turn = self.traversal.advance(&self.tree, oracle, utterance);
        match &turn.outcome {
            TurnOutcome::Moved { .. } => self.announce_current(),
            TurnOutcome::Terminated(reason) => {
                info!("Session '{}' terminated: {reason:?}", self.id);
                self.push(Speaker::Assistant, END_MESSAGE);
            }
            TurnOutcome::EmptyInput | TurnOutcome::AlreadyTerminated => {}
        }
        turn
    }

    /// Add the current node's prompt unless it is already the latest message.
    fn announce_current(&mut self) {
        let Some(prompt) = self.current_node().map(|n| n.prompt.clone()) else {
            return;
        };
        let duplicate = self
            .history
            .last()
            .is_some_and(|m| m.speaker == Speaker::Assistant && m.text == prompt);
        if !duplicate {
            self.push(Speaker::Assistant, prompt);
        }
    }

    fn push(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.history.push(Message {
            speaker,
            text: text.into(),
        });
    }
}

/// Independent sessions keyed by id, all reading the same tree.
#[derive(Debug)]
pub struct SessionRegistry {
    tree: Arc<TreeStore>,
    sessions: HashMap<String, Session>,
}

impl SessionRegistry {
    pub fn new(tree: Arc<TreeStore>) -> Self {
        Self {
            tree,
            sessions: HashMap::new(),
        }
    }

    /// Get the session for `id`, starting one if needed.
    pub fn open(&mut self, id: &str) -> &mut Session {
        let tree = &self.tree;
        self.sessions
            .entry(id.to_string())
            .or_insert_with(|| Session::new(id, Arc::clone(tree)))
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Feed an utterance to the session `id`, starting it if needed.
    pub fn submit<O>(&mut self, id: &str, oracle: &O, utterance: &str) -> Turn
    where
        O: Oracle + ?Sized,
    {
        self.open(id).submit(oracle, utterance)
    }

    /// Drop a session; the next `open` with the same id starts over.
    pub fn close(&mut self, id: &str) -> Option<Session> {
        self.sessions.remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
