use std::io::Write;
use std::time::Duration;

use shared::form::{TripFormPort, TripFormState};
use shared::ports::{
    AgentPanel, AgentPorts, LoadingIndicator, ResultsPort, SearchStatus, SpeechOutput,
};
use shared::results::{ResultRow, render_table};
use tracing::debug;

pub fn terminal_ports() -> AgentPorts {
    AgentPorts {
        form: Box::new(TripFormState::default()),
        results: Box::new(TerminalResults),
        panel: Box::new(TerminalPanel::default()),
        speech: Box::new(TerminalSpeech),
    }
}

/// Copies whatever the form port currently holds so it can be printed.
pub fn form_snapshot(form: &dyn TripFormPort) -> TripFormState {
    TripFormState {
        trip_type: form.trip_type(),
        passenger_count: form.passenger_count(),
        seat_class: form.seat_class(),
        legs: form.legs(),
    }
}

pub fn status_line(status: &SearchStatus) -> String {
    match status {
        SearchStatus::AnalysingInput => "Analysing input...".to_string(),
        SearchStatus::GeneratingResults => "Generating search results...".to_string(),
        SearchStatus::FollowUpQuestion(question) => question.clone(),
    }
}

struct TerminalResults;

impl ResultsPort for TerminalResults {
    fn show_status(&mut self, status: SearchStatus) {
        println!("[search] {}", status_line(&status));
    }

    fn render_results(&mut self, rows: &[ResultRow]) {
        println!("[search] {} flights found", rows.len());
        print!("{}", render_table(rows));
        flush_stdout();
    }
}

/// Echoes streamed model text as it arrives.
#[derive(Default)]
struct TerminalPanel {
    printed: usize,
}

impl AgentPanel for TerminalPanel {
    fn show_partial(&mut self, text: &str) {
        // The panel always receives the whole reply so far.
        let fresh = text.get(self.printed..).unwrap_or(text);
        if fresh.is_empty() {
            return;
        }
        print!("{fresh}");
        flush_stdout();
        self.printed = text.len();
    }

    fn clear(&mut self) {
        if self.printed > 0 {
            println!();
        }
        self.printed = 0;
    }
}

struct TerminalSpeech;

impl SpeechOutput for TerminalSpeech {
    fn speak(&mut self, text: &str) {
        println!("\n[agent says] {text}");
    }
}

pub struct TerminalLoading;

impl LoadingIndicator for TerminalLoading {
    fn dismiss(&mut self, fade: Duration) {
        debug!(fade_ms = fade.as_millis() as u64, "loading indicator dismissed");
        println!("Model ready. Type a request, or /search /erase /form /persona /speech /quit.");
    }
}

fn flush_stdout() {
    let _ = std::io::stdout().flush();
}
