//! Turn execution for the two agent personas.
//!
//! One [`ConversationManager`] owns both transcripts and the single busy
//! state. `execute` starts a generation and hands back its fragment stream;
//! the caller feeds each fragment back through `on_fragment` (or lets
//! `drive` do it) until the final fragment produces a [`TurnOutcome`].

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;
use tokio::time::{Sleep, sleep};
use tracing::{debug, error, info, warn};

use crate::answer::{UNDEFINED_MARKER, parse_agent_answer};
use crate::form::{TripFormPort, refresh_search_form};
use crate::inference::{Fragment, FragmentStream, InferenceEngine, InferenceError};
use crate::persona::{Persona, PersonaPrompts, PersonaSources, Transcript};
use crate::ports::{AgentPorts, SearchStatus, SpeechEvent};
use crate::results::result_rows;

pub const DEFAULT_SEARCH_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    Generating { persona: Persona },
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent is busy generating for the {active} persona")]
    Busy { active: Persona },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Trip parameters are complete; run a search turn after `delay`.
    SearchScheduled { delay: Duration },
    FollowUpAsked { question: String },
    ResultsRendered { count: usize },
    /// The reply carried no usable answer; only the transcript changed.
    Discarded,
    Failed { message: String },
}

/// An in-flight generation for one persona.
#[derive(Debug)]
pub struct Generation {
    persona: Persona,
    stream: FragmentStream,
}

impl Generation {
    pub fn persona(&self) -> Persona {
        self.persona
    }

    pub async fn next(&mut self) -> Option<Result<Fragment, InferenceError>> {
        self.stream.next().await
    }
}

/// Countdown between a gathered chat turn and the api turn it triggers.
#[derive(Debug, Default)]
pub struct PendingSearch {
    timer: Option<Pin<Box<Sleep>>>,
}

impl PendingSearch {
    /// Arms the countdown when `outcome` asks for a search. A newer schedule
    /// replaces an older one.
    pub fn schedule(&mut self, outcome: &TurnOutcome) -> bool {
        let TurnOutcome::SearchScheduled { delay } = outcome else {
            return false;
        };
        self.timer = Some(Box::pin(sleep(*delay)));
        true
    }

    pub fn is_scheduled(&self) -> bool {
        self.timer.is_some()
    }

    /// Resolves once the armed delay has passed and disarms it. Never
    /// resolves while nothing is scheduled.
    pub async fn elapsed(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.as_mut().await;
                self.timer = None;
            }
            None => std::future::pending().await,
        }
    }
}

pub struct ConversationManager {
    engine: Arc<dyn InferenceEngine>,
    ports: AgentPorts,
    sources: PersonaSources,
    prompts: PersonaPrompts,
    chat: Transcript,
    api: Transcript,
    state: AgentState,
    buffer: String,
    search_delay: Duration,
}

impl ConversationManager {
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        ports: AgentPorts,
        sources: PersonaSources,
        today: NaiveDate,
    ) -> Self {
        let prompts = PersonaPrompts::derive(&sources, today);
        Self {
            engine,
            ports,
            chat: Transcript::new(prompts.chat.clone()),
            api: Transcript::new(prompts.api.clone()),
            sources,
            prompts,
            state: AgentState::Idle,
            buffer: String::new(),
            search_delay: DEFAULT_SEARCH_DELAY,
        }
    }

    pub fn with_search_delay(mut self, search_delay: Duration) -> Self {
        self.search_delay = search_delay;
        self
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn is_generating(&self) -> bool {
        matches!(self.state, AgentState::Generating { .. })
    }

    pub fn transcript(&self, persona: Persona) -> &Transcript {
        match persona {
            Persona::Chat => &self.chat,
            Persona::Api => &self.api,
        }
    }

    pub fn prompts(&self) -> &PersonaPrompts {
        &self.prompts
    }

    pub fn sources(&self) -> &PersonaSources {
        &self.sources
    }

    pub fn form(&self) -> &dyn TripFormPort {
        self.ports.form.as_ref()
    }

    /// Starts a turn for `persona`. Rejected without side effects while any
    /// persona is generating.
    pub fn execute(&mut self, task: &str, persona: Persona) -> Result<Generation, AgentError> {
        if let AgentState::Generating { persona: active } = self.state {
            warn!(requested = %persona, active = %active, "can not process request as agent busy");
            return Err(AgentError::Busy { active });
        }

        let transcript = self.transcript_mut(persona);
        transcript.push_user_turn(task);
        let prompt = transcript.joined();

        // The panel echoes one generation's buffer at a time.
        self.ports.panel.clear();
        self.state = AgentState::Generating { persona };
        let stream = self.engine.generate(prompt);
        self.ports.results.show_status(match persona {
            Persona::Api => SearchStatus::GeneratingResults,
            Persona::Chat => SearchStatus::AnalysingInput,
        });
        debug!(persona = %persona, "generation started");

        Ok(Generation { persona, stream })
    }

    /// Chat button: sends `text` to the chat persona.
    pub fn submit_chat(&mut self, text: &str) -> Result<Generation, AgentError> {
        self.execute(text, Persona::Chat)
    }

    /// Search button: asks the api persona for results using the latest chat
    /// turn as context.
    pub fn search(&mut self) -> Result<Generation, AgentError> {
        let context = self.chat.last_entry().unwrap_or_default().to_string();
        self.execute(&context, Persona::Api)
    }

    /// Executes each finalized speech fragment through the chat persona and
    /// returns the generation that was accepted, if any.
    pub fn on_speech_result(&mut self, events: &[SpeechEvent]) -> Option<Generation> {
        let mut accepted = None;
        for event in events.iter().filter(|event| event.is_final) {
            debug!(transcript = %event.transcript, "speech fragment finalized");
            if let Ok(generation) = self.execute(&event.transcript, Persona::Chat) {
                accepted = Some(generation);
            }
        }
        accepted
    }

    pub fn on_fragment(&mut self, fragment: Fragment) -> Option<TurnOutcome> {
        let AgentState::Generating { persona } = self.state else {
            debug!("ignoring fragment received while idle");
            return None;
        };

        self.buffer.push_str(&fragment.text);
        self.ports.panel.show_partial(&self.buffer);

        if !fragment.done {
            return None;
        }
        Some(self.complete_turn(persona))
    }

    /// Closes the open turn when the inference layer fails mid-stream.
    pub fn on_generation_failed(&mut self, err: InferenceError) -> TurnOutcome {
        let AgentState::Generating { persona } = self.state else {
            return TurnOutcome::Failed {
                message: err.to_string(),
            };
        };

        error!(persona = %persona, "generation failed: {err}");
        let partial = std::mem::take(&mut self.buffer);
        if !self.transcript_mut(persona).complete_model_turn(&partial) {
            debug!(persona = %persona, "turn was erased before the failure");
        }
        self.state = AgentState::Idle;

        TurnOutcome::Failed {
            message: err.to_string(),
        }
    }

    /// Pumps `generation` until its final fragment and returns the outcome.
    pub async fn drive(&mut self, mut generation: Generation) -> TurnOutcome {
        loop {
            match generation.next().await {
                Some(Ok(fragment)) => {
                    if let Some(outcome) = self.on_fragment(fragment) {
                        return outcome;
                    }
                }
                Some(Err(err)) => return self.on_generation_failed(err),
                None => return self.on_generation_failed(InferenceError::StreamClosed),
            }
        }
    }

    pub fn erase_memory(&mut self) {
        self.chat.reset(&self.prompts.chat);
        self.api.reset(&self.prompts.api);
        self.ports.panel.clear();
        info!("agent memory erased");
    }

    /// Re-derives both persona prompts and swaps them into the transcripts
    /// without dropping any turns.
    pub fn update_personas(&mut self, sources: PersonaSources, today: NaiveDate) {
        self.prompts = PersonaPrompts::derive(&sources, today);
        self.sources = sources;
        self.chat.replace_persona(&self.prompts.chat);
        self.api.replace_persona(&self.prompts.api);
        self.ports.panel.clear();
    }

    fn complete_turn(&mut self, persona: Persona) -> TurnOutcome {
        let reply = std::mem::take(&mut self.buffer);
        self.state = AgentState::Idle;
        if reply.is_empty() {
            error!(persona = %persona, "model reply is empty");
        }

        let transcript = self.transcript_mut(persona);
        let recorded = transcript.complete_model_turn(&reply);
        if recorded {
            debug!(persona = %persona, entries = transcript.len(), "turn recorded");
        } else {
            debug!(persona = %persona, "turn was erased before the reply finished");
        }

        let answer = match parse_agent_answer(&reply) {
            Ok(answer) => answer,
            Err(err) => {
                warn!(persona = %persona, "invalid json generated: {err}");
                return TurnOutcome::Discarded;
            }
        };

        if !answer.results.is_empty() {
            refresh_search_form(self.ports.form.as_mut(), &answer);
            let rows = result_rows(&answer.results);
            self.ports.results.render_results(&rows);
            return TurnOutcome::ResultsRendered { count: rows.len() };
        }

        if !answer.has_follow_up() || !reply.contains(UNDEFINED_MARKER) {
            if recorded {
                self.transcript_mut(persona).close_follow_up();
            }
            refresh_search_form(self.ports.form.as_mut(), &answer);
            return TurnOutcome::SearchScheduled {
                delay: self.search_delay,
            };
        }

        let question = answer.follow_up_question;
        self.ports
            .results
            .show_status(SearchStatus::FollowUpQuestion(question.clone()));
        self.ports.speech.speak(&question);
        TurnOutcome::FollowUpAsked { question }
    }

    fn transcript_mut(&mut self, persona: Persona) -> &mut Transcript {
        match persona {
            Persona::Chat => &mut self.chat,
            Persona::Api => &mut self.api,
        }
    }
}
