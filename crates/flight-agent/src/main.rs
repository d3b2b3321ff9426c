mod cli;
mod personas;
mod scripted;
mod terminal;

use std::path::Path;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use cli::{CliError, CliOptions, Command, RunMode};
use personas::PersonaFileError;
use shared::agent::{AgentError, ConversationManager, Generation, PendingSearch, TurnOutcome};
use shared::asset_cache::{AssetCache, DiskAssetCache, MemoryAssetCache};
use shared::bootstrap::{BootstrapError, EngineBootstrap};
use shared::config::AgentConfig;
use shared::fetch::{FetchError, HttpAssetFetcher};
use shared::inference::{
    CompletionServerFactory, EngineFactory, Fragment, InferenceEngine, InferenceError,
};
use shared::persona::Persona;
use shared::ports::SpeechEvent;
use terminal::{TerminalLoading, form_snapshot, terminal_ports};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};

const DEFAULT_LOG_FILTER: &str = "flight_agent=info,shared=info";

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Persona(#[from] PersonaFileError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error("failed to read stdin: {0}")]
    Stdin(#[source] std::io::Error),
}

#[tokio::main]
async fn main() {
    let options = match CliOptions::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(CliError::HelpRequested) => {
            print_usage();
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("error: {err}");
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };

    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
        )
        .init();

    let config = match AgentConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("failed to read config: {err}");
            std::process::exit(2);
        }
    };

    if let Err(err) = run(&options, &config).await {
        error!("flight agent stopped: {err}");
        std::process::exit(1);
    }
}

async fn run(options: &CliOptions, config: &AgentConfig) -> Result<(), AppError> {
    info!(mode = options.mode.as_str(), "flight agent starting");

    let sources =
        personas::load_sources(options.chat_persona.as_deref(), options.api_persona.as_deref())
            .await?;

    let engine = load_engine(options.mode, config).await?;
    let mut manager = ConversationManager::new(engine, terminal_ports(), sources, today())
        .with_search_delay(config.search_delay);

    event_loop(&mut manager).await
}

async fn load_engine(
    mode: RunMode,
    config: &AgentConfig,
) -> Result<Arc<dyn InferenceEngine>, AppError> {
    let cache: Arc<dyn AssetCache> = match mode {
        RunMode::Scripted => scripted::seeded_cache().await,
        RunMode::Live if config.cache_disabled => Arc::new(MemoryAssetCache::new()),
        RunMode::Live => Arc::new(DiskAssetCache::new(config.cache_dir.clone())),
    };
    let factory: Arc<dyn EngineFactory> = match mode {
        RunMode::Scripted => Arc::new(scripted::ScriptedFactory),
        RunMode::Live => Arc::new(CompletionServerFactory::new(config.completion_url.clone())),
    };
    let fetcher = Arc::new(HttpAssetFetcher::new(config.fetch_timeout)?);

    let loaded = EngineBootstrap::new(config, cache, fetcher, factory)
        .load(&mut TerminalLoading)
        .await?;
    Ok(loaded.engine)
}

async fn event_loop(manager: &mut ConversationManager) -> Result<(), AppError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut generation: Option<Generation> = None;
    let mut pending_search = PendingSearch::default();

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
            fragment = next_fragment(&mut generation) => {
                let outcome = match fragment {
                    Some(Ok(fragment)) => manager.on_fragment(fragment),
                    Some(Err(err)) => Some(manager.on_generation_failed(err)),
                    None => Some(manager.on_generation_failed(InferenceError::StreamClosed)),
                };
                if let Some(outcome) = outcome {
                    generation = None;
                    report(outcome, &mut pending_search);
                }
            }
            _ = pending_search.elapsed() => {
                start(manager.search(), &mut generation);
            }
            line = lines.next_line() => {
                let Some(line) = line.map_err(AppError::Stdin)? else {
                    break;
                };
                if !handle_line(manager, &line, &mut generation).await {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Returns false once the user asks to quit.
async fn handle_line(
    manager: &mut ConversationManager,
    line: &str,
    generation: &mut Option<Generation>,
) -> bool {
    let command = match Command::parse(line) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("{err}");
            return true;
        }
    };

    match command {
        Command::Empty => {}
        Command::Quit => return false,
        Command::Chat(text) => start(manager.submit_chat(&text), generation),
        Command::Search => start(manager.search(), generation),
        Command::Speech(text) => {
            let events = [SpeechEvent::interim(text.as_str()), SpeechEvent::finalized(text)];
            if let Some(accepted) = manager.on_speech_result(&events) {
                *generation = Some(accepted);
            }
        }
        Command::Erase => {
            manager.erase_memory();
            println!("Agent memory erased.");
        }
        Command::ShowForm => print!("{}", form_snapshot(manager.form())),
        Command::ReloadPersona { persona, path } => {
            reload_persona(manager, persona, &path).await;
        }
    }
    true
}

async fn reload_persona(manager: &mut ConversationManager, persona: Persona, path: &Path) {
    let text = match personas::load_persona_file(path).await {
        Ok(text) => text,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };

    let mut sources = manager.sources().clone();
    match persona {
        Persona::Chat => sources.chat = text,
        Persona::Api => sources.api = text,
    }
    manager.update_personas(sources, today());
    info!(persona = %persona, path = %path.display(), "persona updated");
}

fn start(result: Result<Generation, AgentError>, slot: &mut Option<Generation>) {
    match result {
        Ok(generation) => *slot = Some(generation),
        Err(err) => println!("[agent] {err}, please wait"),
    }
}

fn report(outcome: TurnOutcome, pending_search: &mut PendingSearch) {
    println!();
    if pending_search.schedule(&outcome) {
        return;
    }
    match outcome {
        TurnOutcome::SearchScheduled { .. }
        | TurnOutcome::FollowUpAsked { .. }
        | TurnOutcome::ResultsRendered { .. } => {}
        TurnOutcome::Discarded => {
            warn!("agent reply carried no usable answer");
        }
        TurnOutcome::Failed { message } => eprintln!("[agent] generation failed: {message}"),
    }
}

async fn next_fragment(
    generation: &mut Option<Generation>,
) -> Option<Result<Fragment, InferenceError>> {
    match generation {
        Some(generation) => generation.next().await,
        None => std::future::pending().await,
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn print_usage() {
    eprintln!(
        "Usage: cargo run -p flight-agent -- [--mode scripted|live] [--chat-persona <file>] [--api-persona <file>]\n\
         \n\
         Modes:\n\
         - scripted (default): canned replies, no model download\n\
         - live: load the model through the asset cache and stream from the completion server\n\
         \n\
         Commands at the prompt:\n\
         - <text>                      Send a chat turn\n\
         - /search                     Ask the api persona for results\n\
         - /erase                      Forget both conversations\n\
         - /form                       Show the search form\n\
         - /persona chat|api <file>    Reload one persona from a file\n\
         - /speech <text>              Simulate a finalized speech result\n\
         - /quit                       Exit"
    );
}
