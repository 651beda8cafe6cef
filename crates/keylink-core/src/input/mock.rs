use super::{KeyEvent, KeyEventProvider};

/// Replays a fixed list of key events, one per poll.
#[derive(Debug, Clone, Copy)]
pub struct ScriptedKeys<'a> {
    events: &'a [KeyEvent],
    cursor: usize,
}

impl<'a> ScriptedKeys<'a> {
    pub const fn new(events: &'a [KeyEvent]) -> Self {
        Self { events, cursor: 0 }
    }

    pub const fn empty() -> Self {
        Self::new(&[])
    }
}

impl KeyEventProvider for ScriptedKeys<'_> {
    type Error = core::convert::Infallible;

    fn poll_event(&mut self) -> Result<Option<KeyEvent>, Self::Error> {
        let Some(event) = self.events.get(self.cursor).copied() else {
            return Ok(None);
        };
        self.cursor = self.cursor.saturating_add(1);
        Ok(Some(event))
    }
}
