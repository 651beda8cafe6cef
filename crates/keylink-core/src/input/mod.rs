//! Key event abstraction layer.

mod mock;

pub use mock::ScriptedKeys;

use crate::command::KeyId;

/// Debounced key transition reported by the matrix scanner.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyEvent {
    Down(KeyId),
    Up(KeyId),
}

impl KeyEvent {
    pub const fn key(self) -> KeyId {
        match self {
            Self::Down(key) | Self::Up(key) => key,
        }
    }
}

/// Polled key event provider.
///
/// The control cycle calls [`refresh`](Self::refresh) once, then drains
/// [`poll_event`](Self::poll_event) until it yields `None`.
pub trait KeyEventProvider {
    type Error;

    /// Samples the hardware once for this cycle.
    fn refresh(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn poll_event(&mut self) -> Result<Option<KeyEvent>, Self::Error>;
}
