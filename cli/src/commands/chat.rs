use anyhow::{Context, Result};
use std::io::{self, BufRead, Read, Write};

use ketovital_core::chat::{ChatLog, ChatMessage};
use ketovital_core::service::VitalService;

use crate::config::RemoteSettings;
use crate::remote::ChatClient;

use super::helpers::format_macros;
use super::sync::try_auto_sync;

fn prompt_line() -> Result<Option<String>> {
    eprint!("> ");
    io::stderr().flush()?;
    let Some(line) = io::stdin().lock().lines().next() else {
        return Ok(None);
    };
    let line = line.context("Failed to read input")?;
    match line.trim() {
        "exit" | "quit" => Ok(None),
        text => Ok(Some(text.to_string())),
    }
}

async fn record(svc: &VitalService, settings: &RemoteSettings, log: &ChatLog, json: bool) -> Result<()> {
    let entry = svc.record_chat_log(log)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!(
            "Logged meal ({} components): {}",
            entry.payload.components.len(),
            format_macros(&entry.payload.computed_totals)
        );
    }
    try_auto_sync(svc, settings, json).await;
    Ok(())
}

/// Talks to the food assistant until it hands back a confirmed meal, which is
/// then logged. With `message`, sends that one turn and stops.
pub(crate) async fn cmd_chat(
    svc: &VitalService,
    settings: &RemoteSettings,
    message: Option<String>,
    json: bool,
) -> Result<()> {
    let endpoint = settings.endpoint.as_deref().context(
        "No backend URL configured. Use `ketovital config set backend_url <url>` or KETOVITAL_BACKEND_URL",
    )?;
    let client = ChatClient::new(endpoint, settings.token.clone(), settings.timeout)?;

    let one_shot = message.is_some();
    let mut pending = message;
    let mut history: Vec<ChatMessage> = Vec::new();
    if !one_shot && !json {
        eprintln!("Describe what you ate. Type `exit` to leave.");
    }

    loop {
        let text = match pending.take() {
            Some(text) => text,
            None => match prompt_line()? {
                Some(text) => text,
                None => break,
            },
        };
        if text.trim().is_empty() {
            if one_shot {
                break;
            }
            continue;
        }

        history.push(ChatMessage::user(text));
        let reply = client.send(&history).await?;
        if json {
            println!("{}", serde_json::to_string(&reply)?);
        } else {
            println!("{}", reply.content);
        }
        history.push(ChatMessage::assistant(reply.content.clone()));

        if let Some(log) = &reply.logging_data {
            record(svc, settings, log, json).await?;
            break;
        }
        if one_shot {
            break;
        }
    }
    Ok(())
}

/// Extracts a chat meal from either a full assistant reply or a bare
/// `{components, totals}` object.
pub(crate) fn parse_chat_log(input: &str) -> Result<ChatLog> {
    let value: serde_json::Value = serde_json::from_str(input).context("Invalid JSON")?;
    let log = match value.get("logging_data") {
        Some(serde_json::Value::Null) => anyhow::bail!("Reply carries no logging_data"),
        Some(data) => serde_json::from_value(data.clone()),
        None => serde_json::from_value(value),
    };
    log.context("Invalid chat meal")
}

/// Logs a chat meal saved to `path`, or read from stdin when `path` is `-`.
pub(crate) async fn cmd_chat_log(
    svc: &VitalService,
    settings: &RemoteSettings,
    path: &str,
    json: bool,
) -> Result<()> {
    let input = if path == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?
    };
    let log = parse_chat_log(&input)?;
    record(svc, settings, &log, json).await
}
