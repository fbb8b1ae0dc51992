// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Default prompt text
//!
//! Prompts are configuration: every one of these can be replaced from
//! settings. Placeholders use `{name}` and are filled by [`render`].

use crate::config::settings::AgentConfig;

pub const SYSTEM_PROMPT: &str = "\
You are Ava, a friendly and practical travel assistant. You help people plan trips: \
destinations, itineraries, packing, local customs, and what to expect from the weather.

Working rules:
- When a weather tool is available and the user asks about conditions at a specific place \
within the next week, call it before answering. Base any temperatures, rain, or wind you \
mention on what the tool returned.
- If a tool reports an error, say plainly that you could not get that data and fall back \
to general seasonal guidance, clearly labelled as such.
- Never invent exact prices, opening hours, schedules, or live conditions. Offer ranges or \
suggest where to check instead.
- Keep answers focused and skimmable. Ask a short clarifying question when the request is \
ambiguous.";

pub const TOOL_SELECTOR_PROMPT: &str = "\
You decide which tools a travel assistant may use for the user's latest message.

Today's date is {today}.

Available tools:
{tools}

Select get_weather_forecast only if ALL of these hold:
1. The message names a specific place (city, region, or country).
2. The travel date is stated or can be inferred and falls within 7 days of today.
3. The user actually needs weather information to be answered well.

Otherwise select nothing. General destination advice, far-future trips, and packing \
questions without a near-term date do not need the tool.

Reply with a JSON array of tool names and nothing else, for example [] or [\"get_weather_forecast\"].";

pub const GROUNDING_CHECK_PROMPT: &str = "\
You are checking a travel assistant's reply for factual grounding.

Conversation so far:
{conversation_summary}

Tool results gathered this turn:
{tool_observations}

Reply under review:
{response}

Flag the reply if it:
- states weather figures (temperatures, rain, wind) that do not appear in the tool results,
- presents specific real-time facts (prices, opening hours, schedules) as certain,
- claims data that a tool reported as unavailable, or hides a tool failure,
- contradicts the conversation.

General travel knowledge, hedged estimates, and seasonal norms are acceptable.

Answer with exactly one line: PASS, or FAIL: <short reason>.";

pub const CORRECTIVE_DIRECTIVE: &str = "\
Your previous response did not pass a factual grounding check. Issue: {reason}. \
Write the response again and follow these rules strictly: \
(1) only cite weather figures that the weather tool returned; \
(2) do not invent prices, opening hours, or other real-time details; \
(3) if a tool failed, say you could not retrieve that data; \
(4) hedge any specific claim you are not sure about.";

pub const NO_TOOL_RESULTS: &str = "(No tools were called)";

/// Substitute `{key}` placeholders in one left-to-right pass.
///
/// Inserted values are never rescanned, so a value containing `{other}`
/// stays literal. Unknown placeholders are left as written.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, close))
        });

        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Prompt set resolved from settings
#[derive(Debug, Clone)]
pub struct Prompts {
    pub system: String,
    pub selector: String,
    pub grounding: String,
}

impl Prompts {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            system: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| SYSTEM_PROMPT.to_string()),
            selector: config
                .selector_prompt
                .clone()
                .unwrap_or_else(|| TOOL_SELECTOR_PROMPT.to_string()),
            grounding: config
                .grounding_prompt
                .clone()
                .unwrap_or_else(|| GROUNDING_CHECK_PROMPT.to_string()),
        }
    }
}

impl Default for Prompts {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}
