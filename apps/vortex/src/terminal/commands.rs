use std::str::FromStr;
use thiserror::Error;

use crate::guard::monitor::ScriptNode;
use crate::keyboard::{KeyParseError, KeyPress};

/// One line of driver input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCommand {
    Go(String),
    Back,
    Forward,
    Refresh,
    Home,
    Close,
    Edit,
    Type(String),
    Commit(String),
    CancelEdit,
    Key(KeyPress),
    Guard(bool),
    Leave(String),
    Reload,
    Script(ScriptNode),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("expected 'guard on' or 'guard off'")]
    GuardState,
    #[error(transparent)]
    Key(#[from] KeyParseError),
}

pub const HELP: &str = "\
commands:
  go <url or search>   navigate
  back | forward       traverse history
  refresh | home       reload the frame / go home
  close                close the session
  edit                 begin editing the address
  type <text>          replace the address field text
  commit <text>        submit the address field
  cancel-edit          leave edit mode
  key <chord>          press a shortcut (ctrl+l, alt+left, f5, esc, enter)
  guard on|off         toggle the session guard
  leave <url>          navigate the host page away
  reload               reload the host page
  script <src|-> [inline text]
                       insert a script node
  status               print session state
  quit";

impl FromStr for DriverCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let required = |name: &'static str| {
            if rest.is_empty() {
                Err(CommandError::MissingArgument(name))
            } else {
                Ok(rest.to_string())
            }
        };
        let command = match verb {
            "go" | "open" => DriverCommand::Go(required("go")?),
            "back" => DriverCommand::Back,
            "forward" => DriverCommand::Forward,
            "refresh" => DriverCommand::Refresh,
            "home" => DriverCommand::Home,
            "close" => DriverCommand::Close,
            "edit" => DriverCommand::Edit,
            "type" => DriverCommand::Type(rest.to_string()),
            // Blank commits are meaningful: they keep the field in edit mode.
            "commit" => DriverCommand::Commit(rest.to_string()),
            "cancel-edit" | "blur" => DriverCommand::CancelEdit,
            "key" => DriverCommand::Key(required("key")?.parse::<KeyPress>()?),
            "guard" => match rest {
                "on" => DriverCommand::Guard(true),
                "off" => DriverCommand::Guard(false),
                _ => return Err(CommandError::GuardState),
            },
            "leave" => DriverCommand::Leave(required("leave")?),
            "reload" => DriverCommand::Reload,
            "script" => {
                let rest = required("script")?;
                let (src, inline) = match rest.split_once(char::is_whitespace) {
                    Some((src, inline)) => (src, Some(inline.trim().to_string())),
                    None => (rest.as_str(), None),
                };
                DriverCommand::Script(ScriptNode {
                    src: (src != "-").then(|| src.to_string()),
                    inline,
                })
            }
            "status" => DriverCommand::Status,
            "help" | "?" => DriverCommand::Help,
            "quit" | "exit" => DriverCommand::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::Key;

    #[test]
    fn parses_navigation_commands() {
        assert_eq!(
            "go  rust async book ".parse::<DriverCommand>(),
            Ok(DriverCommand::Go("rust async book".into()))
        );
        assert_eq!("back".parse::<DriverCommand>(), Ok(DriverCommand::Back));
        assert_eq!("commit   ".parse::<DriverCommand>(), Ok(DriverCommand::Commit(String::new())));
        assert_eq!(
            "go".parse::<DriverCommand>(),
            Err(CommandError::MissingArgument("go"))
        );
    }

    #[test]
    fn parses_keys_and_guard() {
        assert_eq!(
            "key alt+left".parse::<DriverCommand>(),
            Ok(DriverCommand::Key(KeyPress::alt(Key::ArrowLeft)))
        );
        assert!(matches!(
            "key hyper+q".parse::<DriverCommand>(),
            Err(CommandError::Key(_))
        ));
        assert_eq!("guard on".parse::<DriverCommand>(), Ok(DriverCommand::Guard(true)));
        assert_eq!(
            "guard maybe".parse::<DriverCommand>(),
            Err(CommandError::GuardState)
        );
    }

    #[test]
    fn parses_script_nodes() {
        assert_eq!(
            "script https://cdn.test/a.js".parse::<DriverCommand>(),
            Ok(DriverCommand::Script(ScriptNode::external("https://cdn.test/a.js")))
        );
        assert_eq!(
            "script - window.monitoring = 1".parse::<DriverCommand>(),
            Ok(DriverCommand::Script(ScriptNode::inline("window.monitoring = 1")))
        );
        assert_eq!(
            "dance".parse::<DriverCommand>(),
            Err(CommandError::Unknown("dance".into()))
        );
    }
}
