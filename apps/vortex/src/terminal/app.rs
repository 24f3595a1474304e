use serde::Serialize;
use serde_json::json;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::config::ShellConfig;
use crate::error::ShellError;
use crate::events::ShellEvent;
use crate::frame::{ChannelFrame, FrameRequest, FrameSignal};
use crate::guard::ScriptedPrompt;
use crate::proxy::PercentEncodingEngine;
use crate::session::{HostShell, NavigationSession, SessionDeps};
use crate::terminal::cli::Cli;
use crate::terminal::commands::{DriverCommand, HELP};
use crate::terminal::error::CliError;
use crate::transport::memory::MemoryConnection;

const PRINTER_DRAIN: Duration = Duration::from_millis(250);

/// Host page stand-in: reports what the page was asked to do.
struct PrintingHost;

impl HostShell for PrintingHost {
    fn assign(&self, url: &str) {
        print_json(&json!({ "type": "host", "operation": "assign", "url": url }));
    }

    fn replace(&self, url: &str) {
        print_json(&json!({ "type": "host", "operation": "replace", "url": url }));
    }

    fn reload(&self, force: bool) {
        print_json(&json!({ "type": "host", "operation": "reload", "force": force }));
    }
}

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = ShellConfig::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let (frame, frame_requests) = ChannelFrame::new();
    let deps = SessionDeps {
        connection: Arc::new(MemoryConnection::new()),
        frame: Arc::new(frame),
        proxy: Arc::new(PercentEncodingEngine::new(config.proxy_prefix.clone())),
        prompt: Arc::new(ScriptedPrompt::always(cli.confirm.as_bool())),
        host: Arc::new(PrintingHost),
    };
    let session = NavigationSession::new(&config, deps)?;
    let printer = tokio::spawn(print_events(session.subscribe()));
    let frames = tokio::spawn(settle_frames(
        session.clone(),
        frame_requests,
        Duration::from_millis(cli.frame_delay_ms),
    ));
    info!(
        target: "vortex::terminal",
        origin = %config.origin,
        guard = config.guard_on_start,
        "driver ready"
    );
    print_json(&json!({ "type": "ready", "status": session.status() }));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<DriverCommand>() {
            Ok(command) => command,
            Err(err) => {
                report_error(&err);
                continue;
            }
        };
        if command == DriverCommand::Quit {
            break;
        }
        if let Err(err) = execute(&session, command).await {
            report_error(&err);
        }
    }

    frames.abort();
    drop(session);
    let _ = tokio::time::timeout(PRINTER_DRAIN, printer).await;
    Ok(())
}

async fn execute(session: &NavigationSession, command: DriverCommand) -> Result<(), ShellError> {
    match command {
        DriverCommand::Go(input) => {
            session.navigate(&input).await?;
        }
        DriverCommand::Back => {
            session.go_back().await?;
        }
        DriverCommand::Forward => {
            session.go_forward().await?;
        }
        DriverCommand::Refresh => {
            session.refresh().await?;
        }
        DriverCommand::Home => {
            session.navigate_home().await?;
        }
        DriverCommand::Close => {
            if !session.close_session() {
                debug!(target: "vortex::terminal", "close declined");
            }
        }
        DriverCommand::Edit => {
            session.begin_address_edit();
        }
        DriverCommand::Type(text) => session.update_address_field(&text),
        DriverCommand::Commit(text) => {
            session.commit_address_edit(&text).await?;
        }
        DriverCommand::CancelEdit => session.end_address_edit(),
        DriverCommand::Key(press) => {
            if session.handle_key(&press).await?.is_none() {
                debug!(target: "vortex::terminal", ?press, "key not bound in this state");
            }
        }
        DriverCommand::Guard(true) => {
            session.enable_guard();
        }
        DriverCommand::Guard(false) => {
            session.disable_guard();
        }
        DriverCommand::Leave(url) => {
            session.leave(&url);
        }
        DriverCommand::Reload => {
            session.reload_page(false);
        }
        DriverCommand::Script(node) => {
            let verdict = session.on_script_inserted(&node);
            debug!(target: "vortex::terminal", ?verdict, "script inserted");
        }
        DriverCommand::Status => print_json(&json!({
            "type": "status",
            "status": session.status(),
            "unload_prompt": session.unload_prompt(),
        })),
        DriverCommand::Help => eprintln!("{HELP}"),
        DriverCommand::Quit => {}
    }
    Ok(())
}

/// Plays the frame: every load succeeds after `delay`.
async fn settle_frames(
    session: NavigationSession,
    mut requests: mpsc::UnboundedReceiver<FrameRequest>,
    delay: Duration,
) {
    while let Some(request) = requests.recv().await {
        match request {
            FrameRequest::Load(load) => {
                debug!(target: "vortex::terminal", sequence = %load.sequence, target = %load.target, "frame load");
                let session = session.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    session.handle_frame_signal(FrameSignal::loaded(load.sequence));
                });
            }
            FrameRequest::Clear => debug!(target: "vortex::terminal", "frame cleared"),
        }
    }
}

async fn print_events(mut events: broadcast::Receiver<ShellEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => print_json(&event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(target: "vortex::terminal", skipped, "event printer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(err) => warn!(target: "vortex::terminal", error = %err, "failed to encode output"),
    }
}

fn report_error(err: &dyn Display) {
    print_json(&json!({ "type": "error", "message": err.to_string() }));
}
