//! One-shot `ask` mode: send a single question over the channel and print the report.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Local;
use tracing::{info, warn};

use crate::attachment::load_attachment;
use crate::composer::Composer;
use crate::config::ClientConfig;
use crate::connection::{
    ConnectionEvent, ConnectionManager, ConnectionStatus, ReconnectPolicy, endpoint_url,
};
use crate::error::ClientError;
use crate::export::save_download;
use crate::progress::ProgressView;
use crate::protocol::InboundEvent;
use crate::report::ResultView;

const EVENT_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    pub question: String,
    pub attach: Option<PathBuf>,
    pub searches: Option<String>,
    pub rewordings: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub html: Option<PathBuf>,
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskOutcome {
    Answered,
    Failed,
    Rejected,
}

impl AskOutcome {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Answered => 0,
            Self::Failed => 1,
            Self::Rejected => 2,
        }
    }
}

pub fn reconnect_policy(config: &ClientConfig) -> ReconnectPolicy {
    config
        .reconnect_delay
        .map(ReconnectPolicy::fixed)
        .unwrap_or_else(|| ReconnectPolicy::for_variant(config.variant))
}

/// Runs one request to completion. Progress and the final report go to `out`; failures are
/// reported on stderr and folded into the returned outcome.
pub fn run_ask(
    config: &ClientConfig,
    options: &AskOptions,
    out: &mut dyn Write,
) -> anyhow::Result<AskOutcome> {
    let mut composer = Composer::with_settings(config.settings);
    if let Some(raw) = &options.searches {
        composer.set_num_searches(raw.as_str());
    }
    if let Some(raw) = &options.rewordings {
        composer.set_num_rewordings(raw.as_str());
    }
    if let Some(path) = &options.attach {
        match load_attachment(path) {
            Ok(file) => {
                composer.attach(file);
            }
            Err(err) => {
                eprintln!("Error: {err}");
                return Ok(AskOutcome::Rejected);
            }
        }
    }
    composer.set_input(options.question.as_str());
    let Some(request) = composer.compose() else {
        eprintln!("Error: the question is empty");
        return Ok(AskOutcome::Rejected);
    };

    let endpoint = endpoint_url(&config.origin, &config.endpoint_path)?;
    let settings = request.settings;
    writeln!(out, "Starting research for: {}", request.question)?;
    writeln!(
        out,
        "Search queries: {}, Max rewordings: {}",
        settings.num_searches, settings.num_rewordings
    )?;

    let mut manager = ConnectionManager::new(endpoint.clone(), reconnect_policy(config));
    manager.connect();
    if let Err(reason) = wait_until_open(&manager, config.connect_timeout) {
        eprintln!("Error: could not connect to {endpoint}: {reason}");
        return Ok(AskOutcome::Failed);
    }

    if let Err(err) = manager.send(&request.to_message(config.variant)) {
        eprintln!("Error: {err}");
        return Ok(AskOutcome::Failed);
    }
    info!(endpoint = %endpoint, "query sent");

    loop {
        let Some(event) = manager.recv_timeout(EVENT_POLL) else {
            continue;
        };
        match event {
            ConnectionEvent::Inbound(InboundEvent::Progress(update)) => {
                let line = ProgressView::from_update(&update).headline();
                writeln!(out, "{}{line}", timestamp_prefix(options.verbose))?;
            }
            ConnectionEvent::Inbound(InboundEvent::Result(result)) => {
                let view = ResultView::from_result(&result);
                let text = view.transcript_text();
                writeln!(out)?;
                write!(out, "{text}")?;
                save_outputs(&view, &text, options, out)?;
                return Ok(AskOutcome::Answered);
            }
            ConnectionEvent::Inbound(InboundEvent::Error(message)) => {
                eprintln!("Error: {message}");
                return Ok(AskOutcome::Failed);
            }
            ConnectionEvent::Inbound(detail) => {
                if options.verbose
                    && let Some(text) = detail_text(&detail)
                {
                    writeln!(out, "{}{text}", timestamp_prefix(true))?;
                }
            }
            ConnectionEvent::TransportError(message) => {
                warn!(error = %message, "transport error during request");
                eprintln!("Error: Connection error ({message})");
                return Ok(AskOutcome::Failed);
            }
            ConnectionEvent::Status(ConnectionStatus::Disconnected) => {
                eprintln!("Error: connection closed before a result arrived");
                return Ok(AskOutcome::Failed);
            }
            ConnectionEvent::Status(_) => {}
        }
    }
}

fn wait_until_open(manager: &ConnectionManager, timeout: Duration) -> Result<(), String> {
    let deadline = Instant::now() + timeout;
    let mut last_error = "timed out".to_string();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(last_error);
        }
        match manager.recv_timeout(remaining.min(EVENT_POLL)) {
            Some(ConnectionEvent::Status(ConnectionStatus::Connected)) => return Ok(()),
            Some(ConnectionEvent::TransportError(message)) => last_error = message,
            _ => {}
        }
    }
}

fn save_outputs(
    view: &ResultView,
    text: &str,
    options: &AskOptions,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    if let Some(dir) = &options.output_dir {
        let name = format!("rag_result_{}.txt", Local::now().format("%Y%m%d_%H%M%S"));
        match save_download(dir, &name, text) {
            Ok(path) => writeln!(out, "\nResults saved to: {}", path.display())?,
            Err(err) => eprintln!("Warning: could not save results: {err}"),
        }
    }
    if let Some(path) = &options.html {
        fs::write(path, view.html_document())
            .map_err(|source| ClientError::Export {
                path: path.clone(),
                source,
            })
            .with_context(|| "failed to write the HTML report")?;
        writeln!(out, "HTML report written to: {}", path.display())?;
    }
    Ok(())
}

fn timestamp_prefix(verbose: bool) -> String {
    if verbose {
        format!("[{}] ", Local::now().format("%H:%M:%S"))
    } else {
        String::new()
    }
}

fn detail_text(event: &InboundEvent) -> Option<String> {
    match event {
        InboundEvent::ResearchStep(text) => Some(format!("research: {text}")),
        InboundEvent::SearchResult(text) => Some(format!("source: {text}")),
        InboundEvent::Thinking(text) => Some(format!("thinking: {text}")),
        InboundEvent::System(text) => Some(format!("system: {text}")),
        _ => None,
    }
}
