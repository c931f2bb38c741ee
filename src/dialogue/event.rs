//! Inbound dialogue events and the parser that derives them from transport
//! payloads.

/// Control data carried by the confirm button.
pub const CONFIRM_DATA: &str = "confirm";
/// Control data carried by the cancel button.
pub const CANCEL_DATA: &str = "cancel";

/// What the transport delivered: typed text, or a button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    /// Opaque data attached to an interactive control.
    Control(String),
}

/// Events that drive a user's dialogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // Commands
    StartDialogue,
    RestartDialogue,
    CancelCommand,
    ViewRecord,
    DeleteRecord,
    Help,

    /// Free text. Becomes an answer while a question is open, a fallback
    /// otherwise.
    TextInput(String),

    // Control signals
    Confirm,
    Cancel,

    /// Input nothing else claims.
    Fallback(String),
}

/// Parses transport payloads into `Event`s.
pub struct EventParser;

impl EventParser {
    pub fn parse(payload: &Payload) -> Event {
        match payload {
            Payload::Control(data) => match data.as_str() {
                CONFIRM_DATA => Event::Confirm,
                CANCEL_DATA => Event::Cancel,
                other => Event::Fallback(other.to_string()),
            },
            Payload::Text(text) => Self::parse_text(text),
        }
    }

    fn parse_text(text: &str) -> Event {
        let Some(command) = command_name(text) else {
            return Event::TextInput(text.to_string());
        };

        match command.as_str() {
            "start" => Event::StartDialogue,
            "update" => Event::RestartDialogue,
            "cancel" => Event::CancelCommand,
            "profile" => Event::ViewRecord,
            "delete" => Event::DeleteRecord,
            "help" => Event::Help,
            // Unknown commands are ordinary text.
            _ => Event::TextInput(text.to_string()),
        }
    }
}

/// Extract the lowercase command name from `/name@bot args`.
fn command_name(text: &str) -> Option<String> {
    let rest = text.trim().strip_prefix('/')?;
    let word = rest.split_whitespace().next()?;
    let name = word.split('@').next().unwrap_or(word);
    if name.is_empty() {
        return None;
    }
    Some(name.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Event {
        EventParser::parse(&Payload::Text(s.into()))
    }

    #[test]
    fn commands() {
        assert_eq!(text("/start"), Event::StartDialogue);
        assert_eq!(text("/update"), Event::RestartDialogue);
        assert_eq!(text("/cancel"), Event::CancelCommand);
        assert_eq!(text("/profile"), Event::ViewRecord);
        assert_eq!(text("/delete"), Event::DeleteRecord);
        assert_eq!(text("/help"), Event::Help);
    }

    #[test]
    fn commands_are_case_insensitive_and_accept_bot_suffix() {
        assert_eq!(text("/START"), Event::StartDialogue);
        assert_eq!(text("/start@school_bot"), Event::StartDialogue);
        assert_eq!(text("  /help  "), Event::Help);
        assert_eq!(text("/profile extra args"), Event::ViewRecord);
    }

    #[test]
    fn plain_text_is_input() {
        assert_eq!(text("Jane Doe"), Event::TextInput("Jane Doe".into()));
        assert_eq!(text("Cancel"), Event::TextInput("Cancel".into()));
    }

    #[test]
    fn unknown_command_and_bare_slash_are_text() {
        assert_eq!(text("/frobnicate"), Event::TextInput("/frobnicate".into()));
        assert_eq!(text("/"), Event::TextInput("/".into()));
    }

    #[test]
    fn controls() {
        assert_eq!(EventParser::parse(&Payload::Control("confirm".into())), Event::Confirm);
        assert_eq!(EventParser::parse(&Payload::Control("cancel".into())), Event::Cancel);
        assert_eq!(
            EventParser::parse(&Payload::Control("lang_en".into())),
            Event::Fallback("lang_en".into())
        );
    }
}
