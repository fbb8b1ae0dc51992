// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! travel-assistant command line entry point

use clap::Parser;

use travel_assistant::cli::{ChatArgs, Cli, Commands};
use travel_assistant::config::Settings;
use travel_assistant::error::Result;

#[path = "main/commands.rs"]
mod commands;

use commands::{run_ask, run_chat, run_serve};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` turns on agent diagnostics without knowing target names;
    // `-vv` adds retry and tool detail. `RUST_LOG` still takes precedence.
    let mut directives = Vec::new();
    if cli.verbose > 0 {
        directives.extend(["travel.agent=debug", "travel.server=info", "tower_http=info"]);
    }
    if cli.verbose > 1 {
        directives.extend(["travel.retry=debug", "travel.tools=debug", "travel.config=debug"]);
    }
    for directive in directives {
        if let Ok(parsed) = directive.parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    settings.apply_env_overrides();
    settings.validate()?;

    match cli.command {
        None => run_chat(ChatArgs::default(), settings).await?,
        Some(Commands::Chat(args)) => run_chat(args, settings).await?,
        Some(Commands::Ask(args)) => run_ask(args, settings).await?,
        Some(Commands::Serve(args)) => run_serve(args, settings).await?,
    }

    Ok(())
}
