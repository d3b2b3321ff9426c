use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::answer::close_follow_up;

pub const MAX_TRANSCRIPT_ENTRIES: usize = 7;

const USER_TURN_OPEN: &str = "<start_of_turn>user\n";
const TURN_CLOSE: &str = "<end_of_turn>\n";
const MODEL_TURN_OPEN: &str = "<start_of_turn>model\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Persona {
    /// Talks to the human and gathers trip parameters.
    Chat,
    /// Pretends to be the flight search backend.
    Api,
}

impl Persona {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Api => "api",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Editable persona texts as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaSources {
    pub chat: String,
    pub api: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaPrompts {
    pub chat: String,
    pub api: String,
}

impl PersonaPrompts {
    /// Only the chat persona needs to know today's date.
    pub fn derive(sources: &PersonaSources, today: NaiveDate) -> Self {
        Self {
            chat: format!(
                "{}\n The current date is: {}/{}/{}",
                sources.chat,
                today.day(),
                today.month(),
                today.year()
            ),
            api: sources.api.clone(),
        }
    }
}

/// Persona prompt followed by alternating user/model turns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    entries: Vec<String>,
    // Set while the last entry waits for a model reply; cleared by `reset`.
    turn_open: bool,
}

impl Transcript {
    pub fn new(persona_prompt: impl Into<String>) -> Self {
        Self {
            entries: vec![persona_prompt.into()],
            turn_open: false,
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_entry(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    /// Opens a user turn and leaves the model turn open for the reply.
    pub fn push_user_turn(&mut self, task: &str) {
        self.entries.push(format!(
            "{USER_TURN_OPEN}{task}{TURN_CLOSE}{MODEL_TURN_OPEN}"
        ));
        self.turn_open = true;
    }

    /// Closes the open model turn with `reply`, then trims to the cap.
    /// Returns false without touching the entries when no turn is open,
    /// e.g. after a reset dropped it mid-generation.
    pub fn complete_model_turn(&mut self, reply: &str) -> bool {
        if !self.turn_open {
            return false;
        }
        if let Some(last) = self.entries.last_mut() {
            last.push_str(reply);
            last.push_str(TURN_CLOSE);
        }
        self.turn_open = false;
        self.trim();
        true
    }

    pub fn close_follow_up(&mut self) {
        if let Some(last) = self.entries.last_mut() {
            *last = close_follow_up(last);
        }
    }

    pub fn replace_persona(&mut self, persona_prompt: &str) {
        match self.entries.first_mut() {
            Some(first) => *first = persona_prompt.to_string(),
            None => self.entries.push(persona_prompt.to_string()),
        }
    }

    pub fn reset(&mut self, persona_prompt: &str) {
        self.entries.clear();
        self.entries.push(persona_prompt.to_string());
        self.turn_open = false;
    }

    pub fn joined(&self) -> String {
        self.entries.concat()
    }

    // Oldest turn goes first; the persona prompt at index 0 always stays.
    fn trim(&mut self) {
        while self.entries.len() > MAX_TRANSCRIPT_ENTRIES {
            self.entries.remove(1);
        }
    }
}
