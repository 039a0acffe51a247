//! # parley
//!
//! Terminal chat client: reads lines from stdin, sends them as chat turns,
//! and prints replies as they arrive.

#![deny(unsafe_code)]

mod command;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parley_chat::{ChatClient, ChatConfig, ChatObserver, SendOptions};
use parley_core::{Message, Role};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::command::Command;

/// Parley terminal chat client.
#[derive(Parser, Debug)]
#[command(name = "parley", about = "Terminal chat client for a Parley WebSocket backend")]
struct Cli {
    /// WebSocket endpoint (overrides settings).
    #[arg(long)]
    url: Option<String>,

    /// Bearer token for the upgrade request (overrides settings).
    #[arg(long)]
    token: Option<String>,

    /// Settings file (defaults to `~/.parley/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level filter (overrides settings; `RUST_LOG` wins over both).
    #[arg(long)]
    log_level: Option<String>,
}

/// Prints inbound entries and connection changes.
struct TerminalObserver;

impl ChatObserver for TerminalObserver {
    fn on_auth_error(&self, reason: &str) {
        eprintln!("! authentication failed: {reason}");
    }

    fn on_connection_change(&self, connected: bool) {
        eprintln!("* {}", if connected { "connected" } else { "disconnected" });
    }

    fn on_error(&self, error: &str) {
        eprintln!("! {error}");
    }

    fn on_message(&self, message: &Message) {
        match message.role {
            Role::System => println!("[system] {}", message.content),
            Role::Assistant => println!("assistant> {}", message.content),
            Role::User => println!("you> {}", message.content),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut settings = match &args.settings {
        Some(path) => parley_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => parley_settings::load_settings().with_context(|| {
            format!(
                "Failed to load settings from {}",
                parley_settings::settings_path().display()
            )
        })?,
    };
    if let Some(url) = args.url {
        settings.chat.endpoint_url = url;
    }
    if let Some(token) = args.token {
        settings.chat.auth_token = Some(token);
    }
    settings.validate().context("Invalid configuration")?;

    let level = args.log_level.as_deref().unwrap_or(&settings.logging.level);
    if settings.logging.json {
        parley_core::logging::init_json_subscriber(level);
    } else {
        parley_core::logging::init_subscriber(level);
    }

    let config = ChatConfig {
        auto_connect: true,
        ..ChatConfig::from(&settings.chat)
    };
    tracing::info!(url = %config.endpoint_url, "starting chat client");
    let client = ChatClient::new(config, Arc::new(TerminalObserver));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        match Command::parse(&line) {
            Command::Empty => {}
            Command::Quit => break,
            Command::Clear => report(client.clear_history()),
            Command::History => report(client.request_history()),
            Command::Retry => report(client.retry().await),
            Command::Unknown(name) => eprintln!("! unknown command /{name}"),
            Command::Say(text) => report(client.send_message(&text, SendOptions::default()).map(drop)),
        }
    }

    client.disconnect();
    Ok(())
}

fn report(result: parley_core::Result<()>) {
    if let Err(e) = result {
        eprintln!("! {e}");
    }
}
