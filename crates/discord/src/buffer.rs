use std::{collections::VecDeque, sync::Mutex};

use chatsync_channels::InboundMessage;

#[derive(Debug, Default)]
struct State {
    session: u64,
    /// Index of the first retained message.
    base: i64,
    messages: VecDeque<(Option<String>, String)>,
}

/// Channel messages received from the gateway, awaiting ingestion.
///
/// Indices restart at 0 with every session. Messages at or below the
/// cursor the engine last asked with are dropped.
#[derive(Debug, Default)]
pub struct InboundBuffer {
    state: Mutex<State>,
}

impl InboundBuffer {
    pub fn begin_session(&self, session: u64) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = State {
            session,
            ..State::default()
        };
    }

    /// Buffers a message for `session`; late events from an older gateway
    /// session are ignored.
    pub fn push(&self, session: u64, author: Option<String>, text: String) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.session != session {
            return false;
        }
        state.messages.push_back((author, text));
        true
    }

    /// The message after `cursor`, if it has arrived.
    pub fn next_after(&self, cursor: i64) -> Option<InboundMessage> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        while state.base <= cursor && state.messages.pop_front().is_some() {
            state.base += 1;
        }
        let index = cursor + 1;
        let offset = usize::try_from(index - state.base).ok()?;
        let (author, text) = state.messages.get(offset)?.clone();
        Some(InboundMessage {
            index,
            text,
            author,
        })
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
