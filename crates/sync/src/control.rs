//! Line-oriented operator console.
//!
//! [`ControlCommand::parse`] turns one input line into a command and
//! [`execute`] runs it against a [`SyncCoordinator`], producing the text
//! printed back to the operator.

use std::path::{Path, PathBuf};

use {
    chatsync_common::Service,
    chrono::Utc,
    tracing::{info, warn},
};

use crate::{coordinator::SyncCoordinator, dump, error::Error};

const COMMANDS: [&str; 8] = [
    "help",
    "html",
    "license",
    "pause",
    "resume",
    "restart",
    "screenshot",
    "shutdown",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Help(Option<String>),
    Html,
    License,
    Pause(Option<Service>),
    Resume(Option<Service>),
    Restart(Option<Service>),
    Screenshot,
    Shutdown,
}

/// Why a line could not be turned into a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    Unknown(String),
    InvalidService { command: &'static str },
}

impl ControlCommand {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Err(ParseError::Empty);
        };
        // Only the second word is an argument; anything after it is ignored.
        let arg = words.next();

        Ok(match name.to_lowercase().as_str() {
            "help" => Self::Help(arg.map(str::to_string)),
            "html" => Self::Html,
            "license" => Self::License,
            "pause" => Self::Pause(service_arg(arg, "pause")?),
            "resume" => Self::Resume(service_arg(arg, "resume")?),
            "restart" => Self::Restart(service_arg(arg, "restart")?),
            "screenshot" => Self::Screenshot,
            "shutdown" => Self::Shutdown,
            _ => return Err(ParseError::Unknown(line.to_string())),
        })
    }
}

fn service_arg(arg: Option<&str>, command: &'static str) -> Result<Option<Service>, ParseError> {
    arg.map(str::parse::<Service>)
        .transpose()
        .map_err(|_| ParseError::InvalidService { command })
}

/// Syntax line and description of a console command.
pub fn usage(command: &str) -> Option<(&'static str, &'static str)> {
    Some(match command {
        "help" => (
            "help [command]",
            "Lists commands, or when given a command, prints info about the command",
        ),
        "html" => (
            "html",
            "Saves current HTML data of the RuneScape page to the configured html directory",
        ),
        "license" => ("license", "Prints license information (AGPL-3.0+)"),
        "pause" => (
            "pause [service]",
            "Pauses syncing completely or just to the given service (\"runescape\" or \"discord\")",
        ),
        "resume" => (
            "resume [service]",
            "Resumes syncing completely or just to the given service (\"runescape\" or \"discord\")",
        ),
        "restart" => (
            "restart [service]",
            "Restarts both services or just the given service (\"runescape\" or \"discord\")",
        ),
        "screenshot" => (
            "screenshot",
            "Saves a screenshot of the RuneScape page to the configured screenshot directory",
        ),
        "shutdown" => ("shutdown", "Shuts down the bot"),
        _ => return None,
    })
}

/// Where operator-requested snapshots are written.
#[derive(Debug, Clone)]
pub struct DumpDirs {
    pub html_dir: PathBuf,
    pub screenshot_dir: PathBuf,
}

/// Text for the operator, and whether the console should stop reading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlReply {
    pub lines: Vec<String>,
    pub shutdown: bool,
}

impl ControlReply {
    fn say<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            shutdown: false,
        }
    }
}

/// Parse and run one console line. Blank lines produce no output.
pub async fn handle_line(
    coordinator: &SyncCoordinator,
    dirs: &DumpDirs,
    line: &str,
) -> ControlReply {
    match ControlCommand::parse(line) {
        Ok(command) => execute(coordinator, dirs, command).await,
        Err(ParseError::Empty) => ControlReply::default(),
        Err(ParseError::Unknown(input)) => {
            ControlReply::say([format!("Unknown command: {input}")])
        },
        Err(ParseError::InvalidService { command }) => {
            let mut lines = vec!["Error: Invalid service selected".to_string()];
            if let Some((syntax, description)) = usage(command) {
                lines.push(format!("       {syntax}"));
                lines.push(format!("       {description}"));
            }
            ControlReply::say(lines)
        },
    }
}

pub async fn execute(
    coordinator: &SyncCoordinator,
    dirs: &DumpDirs,
    command: ControlCommand,
) -> ControlReply {
    info!(?command, "operator command");
    match command {
        ControlCommand::Help(None) => {
            ControlReply::say([format!("Commands: {}", COMMANDS.join(", "))])
        },
        ControlCommand::Help(Some(topic)) => match usage(&topic.to_lowercase()) {
            Some((syntax, description)) => ControlReply::say([syntax, description]),
            None => ControlReply::say([format!("Error: No such command: {topic}")]),
        },
        ControlCommand::License => ControlReply::say(license_text()),
        ControlCommand::Pause(service) => {
            coordinator.pause(service);
            ControlReply::say([match service {
                Some(service) => format!("Paused syncing messages to {service}"),
                None => "Paused syncing messages".to_string(),
            }])
        },
        ControlCommand::Resume(service) => {
            coordinator.resume(service);
            ControlReply::say([match service {
                Some(service) => format!("Resumed syncing messages to {service}"),
                None => "Resumed syncing messages".to_string(),
            }])
        },
        ControlCommand::Restart(service) => {
            coordinator.restart(service).await;
            ControlReply::say([match service {
                Some(service) => format!("Restarting {service}..."),
                None => "Restarting all...".to_string(),
            }])
        },
        ControlCommand::Html => {
            let captured = coordinator.capture_markup(Service::RuneScape).await;
            save_snapshot(
                captured.map(String::into_bytes),
                &dirs.html_dir,
                "html",
                "Saved HTML data as",
                "Error: Can not get HTML data because the browser is not ready yet",
            )
            .await
        },
        ControlCommand::Screenshot => {
            let captured = coordinator.capture_screenshot(Service::RuneScape).await;
            save_snapshot(
                captured,
                &dirs.screenshot_dir,
                "png",
                "Saved screenshot as",
                "Error: Can not take screenshot because the browser is not ready yet",
            )
            .await
        },
        ControlCommand::Shutdown => {
            coordinator.shutdown().await;
            ControlReply {
                lines: vec![format!(
                    "{}: Shutting down!",
                    Utc::now().format("%Y-%m-%d %H:%M:%S")
                )],
                shutdown: true,
            }
        },
    }
}

async fn save_snapshot(
    captured: crate::Result<Vec<u8>>,
    dir: &Path,
    extension: &str,
    saved: &str,
    not_ready: &str,
) -> ControlReply {
    let bytes = match captured {
        Ok(bytes) => bytes,
        Err(Error::NotReady { .. }) => return ControlReply::say([not_ready]),
        Err(e) => {
            warn!(error = %e, "snapshot capture failed");
            return ControlReply::say([format!("Error: {e}")]);
        },
    };
    match dump::write_dump(dir, Utc::now(), extension, &bytes).await {
        Ok(path) => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            ControlReply::say([format!("{saved}: {name}")])
        },
        Err(e) => ControlReply::say([format!("Error: {e}")]),
    }
}

fn license_text() -> [String; 3] {
    [
        "chatsync: relays messages between RuneScape clan/friends chat and Discord".to_string(),
        "Released under the GNU AGPL-3.0 or later".to_string(),
        format!("Source code and full license text: {}", env!("CARGO_PKG_REPOSITORY")),
    ]
}
