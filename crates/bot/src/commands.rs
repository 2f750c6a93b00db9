/// Label of the persistent keyboard button users tap to start a feedback
/// message. The front end renders it; we recognize it by exact text.
pub const WRITE_BUTTON_LABEL: &str = "\u{2709}\u{fe0f} Write to the team";

/// Closed set of recognized inputs. Everything else is either free text
/// (not a command at all) or `Unknown`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    GetId,
    Write,
    Ban,
    Unban,
    Reply { text: String },
    Unknown { verb: String },
}

impl Command {
    /// The fixed set staff may use when replying to a delivered copy.
    pub fn is_reply_command(&self) -> bool {
        matches!(self, Self::Ban | Self::Unban | Self::Reply { .. })
    }
}

/// Parses an inbound text into a command. Returns `None` for plain text
/// that is neither `/`-prefixed nor the write button label.
pub fn parse_command(text: &str) -> Option<Command> {
    let trimmed = text.trim();

    if trimmed == WRITE_BUTTON_LABEL {
        return Some(Command::Write);
    }
    if !trimmed.starts_with('/') {
        return None;
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let verb = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or_default().trim();

    // Group chats address commands as `/verb@botname`; the suffix is noise.
    let verb = verb.split('@').next().unwrap_or(verb).to_ascii_lowercase();

    Some(match verb.as_str() {
        "/start" => Command::Start,
        "/getid" => Command::GetId,
        "/write" => Command::Write,
        "/ban" => Command::Ban,
        "/unban" => Command::Unban,
        "/reply" => Command::Reply { text: rest.to_owned() },
        _ => Command::Unknown { verb },
    })
}

/// True when the text would read as a command attempt, recognized or not.
pub fn looks_like_command(text: &str) -> bool {
    text.trim_start().starts_with('/')
}
