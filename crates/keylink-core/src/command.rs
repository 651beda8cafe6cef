//! Outbound command model and its 2-byte radio payload.

/// Physical key position reported by the matrix scanner.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct KeyId(pub u8);

impl KeyId {
    pub const fn raw(self) -> u8 {
        self.0
    }
}

/// What the receiver should do with the key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Action {
    SendSignal = 0,
    LearnSignal = 1,
    FactoryReset = 2,
}

impl Action {
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::SendSignal),
            1 => Some(Self::LearnSignal),
            2 => Some(Self::FactoryReset),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SendSignal => "send",
            Self::LearnSignal => "learn",
            Self::FactoryReset => "factory_reset",
        }
    }
}

pub const WIRE_LEN: usize = 2;

/// One physical key action, ready for the dispatcher.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Command {
    pub key: KeyId,
    pub action: Action,
}

impl Command {
    pub const fn new(key: KeyId, action: Action) -> Self {
        Self { key, action }
    }

    pub const fn send(key: KeyId) -> Self {
        Self::new(key, Action::SendSignal)
    }

    /// Payload layout: `[key, action]`.
    pub const fn to_wire(self) -> [u8; WIRE_LEN] {
        [self.key.0, self.action as u8]
    }

    pub fn from_wire(bytes: &[u8]) -> Option<Self> {
        let [key, action] = *bytes else {
            return None;
        };
        Some(Self::new(KeyId(key), Action::from_raw(action)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_layout_is_key_then_action() {
        let cmd = Command::new(KeyId(7), Action::FactoryReset);
        assert_eq!(cmd.to_wire(), [7, 2]);
        assert_eq!(Command::send(KeyId(3)).to_wire(), [3, 0]);
    }

    #[test]
    fn unknown_action_or_length_is_rejected() {
        assert_eq!(Command::from_wire(&[1, 3]), None);
        assert_eq!(Command::from_wire(&[1]), None);
        assert_eq!(Command::from_wire(&[1, 0, 0]), None);
        assert_eq!(
            Command::from_wire(&[9, 1]),
            Some(Command::new(KeyId(9), Action::LearnSignal))
        );
    }
}
