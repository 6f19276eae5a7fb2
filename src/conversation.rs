use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

use crate::{DateTime, Offset};

/// Data a conversation accumulates across steps
pub type Scratch = serde_json::Map<String, serde_json::Value>;

/// One user in one chat
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
         Serialize, Deserialize)]
pub struct ConversationId {
    pub chat_id: i64,
    pub user_id: u64,
}

impl ConversationId {
    pub const fn new(chat_id: i64, user_id: u64) -> ConversationId {
        ConversationId { chat_id, user_id }
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chat_id, self.user_id)
    }
}

impl FromStr for ConversationId {
    type Err = String;

    /// Parses what `Display` writes, `chat_id:user_id`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chat, user) = s.split_once(':')
            .ok_or_else(|| format!("no ':' in conversation id \"{s}\""))?;
        let chat_id = chat.parse()
            .map_err(|e| format!("bad chat id in \"{s}\": {e}"))?;
        let user_id = user.parse()
            .map_err(|e| format!("bad user id in \"{s}\": {e}"))?;
        Ok(ConversationId { chat_id, user_id })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    Completed,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Unstarted,
    Active(String),
    Terminal(Termination),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,

    /// Empty if the conversation only got scratch data so far
    pub flow_name: String,

    pub phase: Phase,

    pub scratch: Scratch,

    /// States we came through, for going back
    #[serde(default)]
    pub history: Vec<String>,

    pub created_at: DateTime,

    pub last_activity_at: DateTime,
}

impl Conversation {
    /// Conversation that belongs to no flow yet
    pub fn blank(id: ConversationId) -> Conversation {
        let now = Offset::now();
        Conversation {
            id,
            flow_name: String::new(),
            phase: Phase::Unstarted,
            scratch: Scratch::new(),
            history: Vec::new(),
            created_at: now,
            last_activity_at: now,
        }
    }

    /// Fresh conversation standing in `initial` state of `flow_name`
    pub fn start(id: ConversationId, flow_name: &str, initial: &str) -> Conversation {
        let mut conv = Conversation::blank(id);
        conv.flow_name = flow_name.to_string();
        conv.phase = Phase::Active(initial.to_string());
        conv
    }

    /// Current state, None unless the conversation is active
    pub fn state(&self) -> Option<&str> {
        match &self.phase {
            Phase::Active(state) => Some(state),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Active(_))
    }

    /// Shallow merge, last write wins per key
    pub fn merge(&mut self, partial: Scratch) {
        self.scratch.extend(partial);
        self.touch();
    }

    pub fn touch(&mut self) {
        self.last_activity_at = Offset::now();
    }

    pub fn move_to(&mut self, state: &str) {
        if let Phase::Active(prev) = &self.phase {
            self.history.push(prev.clone());
        }
        self.phase = Phase::Active(state.to_string());
        self.touch();
    }

    /// Moves to the previous state, returns it.
    /// None if there is nowhere to go back to
    pub fn go_back(&mut self) -> Option<&str> {
        let prev = self.history.pop()?;
        self.phase = Phase::Active(prev);
        self.touch();
        self.state()
    }
}
