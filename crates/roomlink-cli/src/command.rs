use roomlink_types::models::RoomId;

pub const HELP: &str = "\
commands:
  /rooms                               refresh and list rooms
  /select <id>                         switch to a room
  /close                               leave the current room view
  /create <name> [--private] [desc]    create a room
  /join <id>                           join a room
  /leave                               leave the selected room
  /who                                 who is online and typing
  /reconnect                           reopen a closed channel
  /typing                              signal a keystroke
  /quit
anything else is sent as a message";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Rooms,
    Select(RoomId),
    Close,
    Create {
        name: String,
        description: Option<String>,
        is_private: bool,
    },
    Join(RoomId),
    Leave,
    Who,
    Reconnect,
    Typing,
    Help,
    Quit,
    Say(String),
}

impl Command {
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Some(Self::Say(line.to_string())));
        };

        let mut words = rest.split_whitespace();
        let name = words.next().unwrap_or_default();
        let command = match name {
            "rooms" => Self::Rooms,
            "select" => Self::Select(room_id(words.next())?),
            "close" => Self::Close,
            "join" => Self::Join(room_id(words.next())?),
            "leave" => Self::Leave,
            "who" => Self::Who,
            "reconnect" => Self::Reconnect,
            "typing" => Self::Typing,
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            "create" => {
                let mut is_private = false;
                let mut parts = Vec::new();
                for word in words {
                    if word == "--private" {
                        is_private = true;
                    } else {
                        parts.push(word);
                    }
                }
                if parts.is_empty() {
                    return Err("usage: /create <name> [--private] [description]".into());
                }
                let name = parts.remove(0).to_string();
                let description = (!parts.is_empty()).then(|| parts.join(" "));
                Self::Create {
                    name,
                    description,
                    is_private,
                }
            }
            other => return Err(format!("unknown command /{other}, try /help")),
        };
        Ok(Some(command))
    }
}

fn room_id(word: Option<&str>) -> Result<RoomId, String> {
    let word = word.ok_or("missing room id")?;
    word.parse().map_err(|_| format!("'{word}' is not a room id"))
}
