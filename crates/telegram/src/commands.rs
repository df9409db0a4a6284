//! Slash command parsing.

use teloxide::types::BotCommand;

/// A recognized bot command with its argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Codes,
    MyCodes,
    Gen(Option<String>),
    Cancel,
    Unauthorized(Option<String>),
    AddAdmin(Option<String>),
    DelAdmin(Option<String>),
    ReloadConfig,
}

/// Outcome of parsing message text as a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Known(Command),
    /// Slash command we don't handle, or one addressed to another bot.
    Unknown(String),
}

impl Command {
    /// Parse `text` if it starts with `/`.
    ///
    /// `/cmd@name` is accepted only when `name` matches `bot_username`
    /// (case-insensitive); the argument is the rest of the text, trimmed.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<ParsedCommand> {
        let body = text.strip_prefix('/')?;
        let (token, rest) = match body.split_once(char::is_whitespace) {
            Some((token, rest)) => (token, rest.trim()),
            None => (body, ""),
        };
        let (name, mention) = match token.split_once('@') {
            Some((name, mention)) => (name, Some(mention)),
            None => (token, None),
        };

        if let Some(mention) = mention {
            let ours = bot_username.is_some_and(|u| u.eq_ignore_ascii_case(mention));
            if !ours {
                return Some(ParsedCommand::Unknown(token.to_string()));
            }
        }

        let arg = (!rest.is_empty()).then(|| rest.to_string());
        let command = match name.to_ascii_lowercase().as_str() {
            "start" => Self::Start,
            "help" => Self::Help,
            "codes" => Self::Codes,
            "mycodes" => Self::MyCodes,
            "gen" => Self::Gen(arg),
            "cancel" => Self::Cancel,
            "unauthorized" => Self::Unauthorized(arg),
            "addadmin" => Self::AddAdmin(arg),
            "deladmin" => Self::DelAdmin(arg),
            "reloadcfg" => Self::ReloadConfig,
            _ => return Some(ParsedCommand::Unknown(name.to_string())),
        };
        Some(ParsedCommand::Known(command))
    }

    pub fn is_admin_only(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized(_) | Self::AddAdmin(_) | Self::DelAdmin(_) | Self::ReloadConfig
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Codes => "codes",
            Self::MyCodes => "mycodes",
            Self::Gen(_) => "gen",
            Self::Cancel => "cancel",
            Self::Unauthorized(_) => "unauthorized",
            Self::AddAdmin(_) => "addadmin",
            Self::DelAdmin(_) => "deladmin",
            Self::ReloadConfig => "reloadcfg",
        }
    }
}

/// Commands registered with Telegram for client autocomplete.
pub fn bot_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Greeting"),
        BotCommand::new("help", "Show available commands"),
        BotCommand::new("codes", "Stage a temporary list of EAN codes"),
        BotCommand::new("mycodes", "Show staged codes"),
        BotCommand::new("gen", "Generate a barcode"),
        BotCommand::new("cancel", "Cancel the current operation"),
    ]
}
