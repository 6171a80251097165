//! Bot command parsing. `/cmd@BotName args…` → `BotCommand`.

use pricewatch_core::types::JobId;
use pricewatch_scheduler::policy::parse_target_price;

pub const HELP: &str = "Welcome! Use /track <URL> to track a product or open via the web app link to start tracking.\n\n\
/track <url> — look up a product\n\
/confirm <target_price> — track the latest product\n\
/confirm <id> <target_price> — track a specific product\n\
/cancel — stop your most recent tracking\n\
/stop <id> — stop a specific tracking\n\
/list — show your trackings";

const CONFIRM_USAGE: &str =
    "Error: please use /confirm <entry_id> <target_price> or /confirm <target_price>.";

#[derive(Debug, Clone, PartialEq)]
pub enum BotCommand {
    /// `/start` alone, or `/start <token>` from a deep link.
    Start(Option<String>),
    Track(String),
    Confirm { id: Option<JobId>, target: f64 },
    Cancel,
    Stop(JobId),
    List,
}

/// Parse a message. `Ok(None)` for plain text and unknown commands;
/// `Err(reply)` carries the usage text for malformed arguments.
pub fn parse(text: &str) -> Result<Option<BotCommand>, String> {
    let mut parts = text.split_whitespace();
    let Some(head) = parts.next() else {
        return Ok(None);
    };
    let Some(name) = head.strip_prefix('/') else {
        return Ok(None);
    };
    let name = name.split('@').next().unwrap_or(name).to_lowercase();
    let args: Vec<&str> = parts.collect();

    let command = match name.as_str() {
        "start" => BotCommand::Start(args.first().map(|t| t.to_string())),
        "track" => match args.first() {
            Some(url) => BotCommand::Track(url.to_string()),
            None => return Err("Usage: /track <product-url>".into()),
        },
        "confirm" => parse_confirm(&args)?,
        "cancel" => BotCommand::Cancel,
        "stop" => match args.first().and_then(|id| id.trim_start_matches('#').parse().ok()) {
            Some(id) => BotCommand::Stop(id),
            None => return Err("Usage: /stop <entry_id>".into()),
        },
        "list" => BotCommand::List,
        _ => return Ok(None),
    };
    Ok(Some(command))
}

fn parse_confirm(args: &[&str]) -> Result<BotCommand, String> {
    let (id, price) = match args {
        [price] => (None, *price),
        [id, price] => {
            let id = id
                .trim_start_matches('#')
                .parse::<JobId>()
                .map_err(|_| CONFIRM_USAGE.to_string())?;
            (Some(id), *price)
        }
        _ => return Err(CONFIRM_USAGE.into()),
    };
    let target = parse_target_price(price).map_err(|e| format!("{e}\n{CONFIRM_USAGE}"))?;
    Ok(BotCommand::Confirm { id, target })
}
