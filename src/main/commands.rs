// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, Write};
use std::sync::Arc;

use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};

use travel_assistant::agent::{AgentProviders, TurnRequest, TurnResponse, TurnRunner};
use travel_assistant::cli::{AskArgs, ChatArgs, ServeArgs};
use travel_assistant::config::Settings;
use travel_assistant::error::{Result, TravelError};
use travel_assistant::llm::providers::OpenRouterProvider;
use travel_assistant::server;
use travel_assistant::session::InMemorySessionStore;
use travel_assistant::tools::builtin::default_registry;

/// Wire the provider, tools, and an in-memory store into a runner
pub(super) fn build_runner(settings: &Settings) -> Result<TurnRunner> {
    let api_key = settings.api_key().ok_or_else(|| {
        TravelError::Config(format!(
            "no API key configured; set {} or provider.api_key in settings",
            settings.provider.api_key_env
        ))
    })?;

    let provider = Arc::new(OpenRouterProvider::from_config(&settings.provider, api_key)?);
    let registry = Arc::new(default_registry(&settings.weather)?);
    let store = Arc::new(InMemorySessionStore::new());

    Ok(TurnRunner::from_settings(
        settings,
        AgentProviders::shared(provider),
        registry,
        store,
    ))
}

pub(super) fn print_welcome(model: &str, session_id: &str) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    println!("travel-assistant v{}", env!("CARGO_PKG_VERSION"));
    stdout.execute(ResetColor)?;
    println!("Model: {}", model);
    println!("Session: {}", short_id(session_id));
    stdout.execute(SetForegroundColor(Color::DarkGrey))?;
    println!("Commands: /new  /trace  /exit");
    stdout.execute(ResetColor)?;
    println!();
    Ok(())
}

pub(super) fn read_user_input() -> Result<Option<String>> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Green))?;
    print!("you: ");
    stdout.execute(ResetColor)?;
    stdout.flush()?;

    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

fn print_response(answer: &str) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    print!("\nassistant: ");
    stdout.execute(ResetColor)?;
    println!("{}\n", answer);
    Ok(())
}

fn print_error(message: &str) -> Result<()> {
    let mut stderr = io::stderr();
    stderr.execute(SetForegroundColor(Color::Red))?;
    eprintln!("{}", message);
    stderr.execute(ResetColor)?;
    Ok(())
}

fn print_trace(turn: &TurnResponse) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::DarkGrey))?;
    for entry in &turn.debug_trace {
        println!("  [{}] {}", entry.kind, serde_json::to_string(entry)?);
    }
    for event in &turn.events {
        println!(
            "  ({}) {}",
            serde_json::to_string(&event.status)?.trim_matches('"'),
            event.message
        );
    }
    stdout.execute(ResetColor)?;
    println!();
    Ok(())
}

fn short_id(session_id: &str) -> &str {
    session_id.get(..8).unwrap_or(session_id)
}

/// Interactive loop. `/new` starts a new session, `/trace` toggles trace
/// output, `/exit` quits.
pub(super) async fn run_chat(args: ChatArgs, settings: Settings) -> Result<()> {
    let runner = build_runner(&settings)?;
    let mut session_id = args
        .session
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut show_trace = args.trace;

    print_welcome(runner.model(), &session_id)?;

    loop {
        let Some(input) = read_user_input()? else {
            break;
        };

        match input.as_str() {
            "" => continue,
            "/exit" | "/quit" => break,
            "/new" => {
                session_id = uuid::Uuid::new_v4().to_string();
                println!("Started session {}\n", short_id(&session_id));
                continue;
            }
            "/trace" => {
                show_trace = !show_trace;
                println!("Trace {}\n", if show_trace { "on" } else { "off" });
                continue;
            }
            _ => {}
        }

        match runner
            .run_turn(TurnRequest::new(Some(session_id.clone()), input))
            .await
        {
            Ok(turn) => {
                print_response(&turn.answer)?;
                if show_trace {
                    print_trace(&turn)?;
                }
            }
            Err(e) => {
                tracing::error!(target: "travel.agent.turn", error = %e, "turn failed");
                print_error(e.user_message())?;
            }
        }
    }

    Ok(())
}

pub(super) async fn run_ask(args: AskArgs, settings: Settings) -> Result<()> {
    let runner = build_runner(&settings)?;

    let turn = match runner
        .run_turn(TurnRequest::new(args.session, args.prompt))
        .await
    {
        Ok(turn) => turn,
        Err(e @ TravelError::InvalidInput(_)) => return Err(e),
        Err(e) => {
            tracing::error!(target: "travel.agent.turn", error = %e, "turn failed");
            print_error(e.user_message())?;
            return Ok(());
        }
    };

    println!("{}", turn.answer);
    if args.trace {
        let trace = serde_json::json!({
            "session_id": turn.session_id,
            "debug_trace": turn.debug_trace,
            "events": turn.events,
        });
        eprintln!("{}", serde_json::to_string_pretty(&trace)?);
    }
    Ok(())
}

pub(super) async fn run_serve(args: ServeArgs, settings: Settings) -> Result<()> {
    let host = args.host.unwrap_or_else(|| settings.server.host.clone());
    let port = args.port.unwrap_or(settings.server.port);
    let runner = build_runner(&settings)?;

    println!("Serving on http://{}:{} (Ctrl-C to stop)", host, port);
    server::serve(&host, port, runner).await
}
