use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Enter,
    F5,
    F6,
    ArrowLeft,
    ArrowRight,
    Home,
    Char(char),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyPress {
    pub fn plain(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::default(),
        }
    }

    pub fn ctrl(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers {
                ctrl: true,
                ..Modifiers::default()
            },
        }
    }

    pub fn alt(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers {
                alt: true,
                ..Modifiers::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParseError(String);

impl fmt::Display for KeyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized key chord '{}'", self.0)
    }
}

impl std::error::Error for KeyParseError {}

/// Parses chords such as `ctrl+l`, `alt+left`, `f5` or `esc`.
impl FromStr for KeyPress {
    type Err = KeyParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut modifiers = Modifiers::default();
        let mut key = None;
        for part in raw.split('+').map(str::trim) {
            match part.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => modifiers.ctrl = true,
                "alt" | "option" => modifiers.alt = true,
                "shift" => modifiers.shift = true,
                "meta" | "cmd" | "super" => modifiers.meta = true,
                other => {
                    if key.is_some() {
                        return Err(KeyParseError(raw.to_string()));
                    }
                    key = Some(parse_key(other).ok_or_else(|| KeyParseError(raw.to_string()))?);
                }
            }
        }
        key.map(|key| KeyPress { key, modifiers })
            .ok_or_else(|| KeyParseError(raw.to_string()))
    }
}

fn parse_key(name: &str) -> Option<Key> {
    let key = match name {
        "esc" | "escape" => Key::Escape,
        "enter" | "return" => Key::Enter,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "left" | "arrowleft" => Key::ArrowLeft,
        "right" | "arrowright" => Key::ArrowRight,
        "home" => Key::Home,
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => Key::Char(ch),
                _ => return None,
            }
        }
    };
    Some(key)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellCommand {
    Close,
    BeginEdit,
    Back,
    Forward,
    Refresh,
    Home,
    CommitEdit,
    EndEdit,
}

/// Session facts a shortcut depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyContext {
    pub frame_active: bool,
    pub editing: bool,
    pub can_go_back: bool,
    pub can_go_forward: bool,
}

pub fn map_key(press: &KeyPress, ctx: &KeyContext) -> Option<ShellCommand> {
    let Modifiers { ctrl, alt, .. } = press.modifiers;
    if ctx.editing {
        return match press.key {
            Key::Enter => Some(ShellCommand::CommitEdit),
            Key::Escape => Some(ShellCommand::EndEdit),
            _ => None,
        };
    }
    if !ctx.frame_active {
        return None;
    }
    match press.key {
        Key::Escape if !ctrl && !alt => Some(ShellCommand::Close),
        Key::Char('l' | 'L') if ctrl => Some(ShellCommand::BeginEdit),
        Key::F6 => Some(ShellCommand::BeginEdit),
        Key::ArrowLeft if alt => ctx.can_go_back.then_some(ShellCommand::Back),
        Key::ArrowRight if alt => ctx.can_go_forward.then_some(ShellCommand::Forward),
        Key::F5 => Some(ShellCommand::Refresh),
        Key::Char('r' | 'R') if ctrl => Some(ShellCommand::Refresh),
        Key::Home if alt => Some(ShellCommand::Home),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn browsing() -> KeyContext {
        KeyContext {
            frame_active: true,
            editing: false,
            can_go_back: true,
            can_go_forward: false,
        }
    }

    #[test]
    fn parses_common_chords() {
        assert_eq!("ctrl+l".parse::<KeyPress>(), Ok(KeyPress::ctrl(Key::Char('l'))));
        assert_eq!("Alt+Left".parse::<KeyPress>(), Ok(KeyPress::alt(Key::ArrowLeft)));
        assert_eq!("esc".parse::<KeyPress>(), Ok(KeyPress::plain(Key::Escape)));
        assert!("ctrl+".parse::<KeyPress>().is_err());
        assert!("l+r".parse::<KeyPress>().is_err());
        assert!("pagedown".parse::<KeyPress>().is_err());
    }

    #[test]
    fn shortcuts_while_browsing() {
        let ctx = browsing();
        let cases = [
            (KeyPress::plain(Key::Escape), Some(ShellCommand::Close)),
            (KeyPress::ctrl(Key::Char('l')), Some(ShellCommand::BeginEdit)),
            (KeyPress::plain(Key::F6), Some(ShellCommand::BeginEdit)),
            (KeyPress::alt(Key::ArrowLeft), Some(ShellCommand::Back)),
            (KeyPress::alt(Key::ArrowRight), None),
            (KeyPress::plain(Key::F5), Some(ShellCommand::Refresh)),
            (KeyPress::ctrl(Key::Char('r')), Some(ShellCommand::Refresh)),
            (KeyPress::alt(Key::Home), Some(ShellCommand::Home)),
            (KeyPress::plain(Key::ArrowLeft), None),
            (KeyPress::plain(Key::Char('l')), None),
        ];
        for (press, expected) in cases {
            assert_eq!(map_key(&press, &ctx), expected, "{press:?}");
        }
    }

    #[test]
    fn nothing_fires_without_an_active_frame() {
        let ctx = KeyContext::default();
        assert_eq!(map_key(&KeyPress::plain(Key::Escape), &ctx), None);
        assert_eq!(map_key(&KeyPress::plain(Key::F5), &ctx), None);
    }

    #[test]
    fn editing_captures_enter_and_escape_only() {
        let ctx = KeyContext {
            editing: true,
            ..browsing()
        };
        assert_eq!(
            map_key(&KeyPress::plain(Key::Enter), &ctx),
            Some(ShellCommand::CommitEdit)
        );
        assert_eq!(
            map_key(&KeyPress::plain(Key::Escape), &ctx),
            Some(ShellCommand::EndEdit)
        );
        assert_eq!(map_key(&KeyPress::plain(Key::F5), &ctx), None);
        assert_eq!(map_key(&KeyPress::alt(Key::ArrowLeft), &ctx), None);
    }
}
