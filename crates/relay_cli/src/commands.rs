#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    New,
    Cancel,
    Quit,
    Unknown(String),
}

pub const HELP_TEXT: &str = "\
/help    show this help
/new     start a new conversation
/cancel  stop waiting for the running job
/quit    exit";

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let command = trimmed.split_whitespace().next().unwrap_or(trimmed);

    let parsed = match command {
        "/help" => SlashCommand::Help,
        "/new" => SlashCommand::New,
        "/cancel" => SlashCommand::Cancel,
        "/quit" | "/exit" => SlashCommand::Quit,
        _ => SlashCommand::Unknown(command.to_string()),
    };

    Some(parsed)
}
