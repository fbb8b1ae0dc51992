// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Travel assistant with live weather and grounded answers
#[derive(Parser, Debug)]
#[command(name = "travel-assistant")]
#[command(version, about = "Travel assistant with live weather and grounded answers")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive chat (default when no command given)
    Chat(ChatArgs),

    /// Ask a single question
    Ask(AskArgs),

    /// Start the HTTP server
    Serve(ServeArgs),
}

#[derive(clap::Args, Debug, Default)]
pub struct ChatArgs {
    /// Continue an existing session
    #[arg(short, long)]
    pub session: Option<String>,

    /// Print the debug trace and events after each answer
    #[arg(long)]
    pub trace: bool,
}

#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// The question to ask
    pub prompt: String,

    /// Session id to continue
    #[arg(short, long)]
    pub session: Option<String>,

    /// Print the debug trace and events as JSON
    #[arg(long)]
    pub trace: bool,
}

#[derive(clap::Args, Debug, Default)]
pub struct ServeArgs {
    /// Bind address (overrides settings)
    #[arg(long)]
    pub host: Option<String>,

    /// Port (overrides settings)
    #[arg(short, long)]
    pub port: Option<u16>,
}
