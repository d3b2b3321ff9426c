//! Surfaces the agent drives. Front-ends implement these; the agent never
//! reaches for a rendering surface directly.

use std::time::Duration;

use crate::form::TripFormPort;
use crate::results::ResultRow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStatus {
    /// Chat persona is reading the user's request.
    AnalysingInput,
    /// Api persona is fabricating search results.
    GeneratingResults,
    FollowUpQuestion(String),
}

pub trait ResultsPort: Send {
    fn show_status(&mut self, status: SearchStatus);
    fn render_results(&mut self, rows: &[ResultRow]);
}

/// Side panel mirroring the model's streamed text.
pub trait AgentPanel: Send {
    fn show_partial(&mut self, text: &str);
    fn clear(&mut self);
}

pub trait SpeechOutput: Send {
    fn speak(&mut self, text: &str);
}

pub trait LoadingIndicator: Send {
    fn dismiss(&mut self, fade: Duration);
}

/// One recognition result from a continuous speech recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechEvent {
    pub transcript: String,
    pub is_final: bool,
}

impl SpeechEvent {
    pub fn interim(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: false,
        }
    }

    pub fn finalized(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: true,
        }
    }
}

pub struct AgentPorts {
    pub form: Box<dyn TripFormPort>,
    pub results: Box<dyn ResultsPort>,
    pub panel: Box<dyn AgentPanel>,
    pub speech: Box<dyn SpeechOutput>,
}
