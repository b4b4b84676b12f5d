//! Slash-command grammar understood by the bot.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    /// `/quiz <topic>`; the topic may be empty, which the dispatcher answers with usage.
    Quiz(String),
    /// `/schedule [days] <topic>`
    Schedule { days: Option<u32>, topic: String },
    Status,
    Stop,
    Link(String),
    Balance,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedInput {
    Command(BotCommand),
    Text(String),
}

pub fn parse_input(text: &str) -> ParsedInput {
    let text = text.trim();
    let Some(rest) = text.strip_prefix('/') else {
        return ParsedInput::Text(text.to_string());
    };

    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    // `/quiz@OpenEduBot` in group chats.
    let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();

    let command = match name.as_str() {
        "start" => BotCommand::Start,
        "help" => BotCommand::Help,
        "quiz" => BotCommand::Quiz(args.to_string()),
        "schedule" => parse_schedule(args),
        "status" => BotCommand::Status,
        "stop" => BotCommand::Stop,
        "link" => BotCommand::Link(args.to_string()),
        "balance" => BotCommand::Balance,
        _ => BotCommand::Unknown(name),
    };
    ParsedInput::Command(command)
}

fn parse_schedule(args: &str) -> BotCommand {
    let (first, rest) = match args.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim()),
        None => (args, ""),
    };

    match first.parse::<u32>() {
        Ok(days) => BotCommand::Schedule {
            days: Some(days),
            topic: rest.to_string(),
        },
        Err(_) => BotCommand::Schedule {
            days: None,
            topic: args.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(
            parse_input("  quiz me on rust  "),
            ParsedInput::Text("quiz me on rust".to_string())
        );
    }

    #[test]
    fn bot_suffix_is_stripped() {
        assert_eq!(
            parse_input("/quiz@OpenEduBot solar system"),
            ParsedInput::Command(BotCommand::Quiz("solar system".to_string()))
        );
        assert_eq!(
            parse_input("/STATUS@OpenEduBot"),
            ParsedInput::Command(BotCommand::Status)
        );
    }

    #[test]
    fn schedule_takes_optional_leading_days() {
        assert_eq!(
            parse_input("/schedule 5 linear algebra"),
            ParsedInput::Command(BotCommand::Schedule {
                days: Some(5),
                topic: "linear algebra".to_string()
            })
        );
        assert_eq!(
            parse_input("/schedule linear algebra"),
            ParsedInput::Command(BotCommand::Schedule {
                days: None,
                topic: "linear algebra".to_string()
            })
        );
        assert_eq!(
            parse_input("/schedule"),
            ParsedInput::Command(BotCommand::Schedule {
                days: None,
                topic: String::new()
            })
        );
    }

    #[test]
    fn unknown_commands_keep_their_name() {
        assert_eq!(
            parse_input("/mint 3"),
            ParsedInput::Command(BotCommand::Unknown("mint".to_string()))
        );
    }
}
