use crate::{PortInfo, Result, SerialLink, TransportError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One scripted reaction to a receive call on a [`MockLink`].
#[derive(Debug)]
pub enum MockReply {
    Frame(Vec<u8>),
    Timeout,
    Disconnect,
}

#[derive(Debug, Default)]
struct MockState {
    sent: Vec<Vec<u8>>,
    replies: VecDeque<MockReply>,
    open: bool,
    fail_writes: bool,
}

/// A simple in-process link. Each link instance is independent; a paired
/// [`MockHandle`] scripts replies and inspects the frames written.
pub struct MockLink {
    name: String,
    state: Arc<Mutex<MockState>>,
}

/// Test-side handle onto a [`MockLink`]'s state.
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl MockLink {
    /// Create a link together with the handle that scripts it.
    pub fn with_handle(name: &str) -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(MockState {
            open: true,
            ..MockState::default()
        }));
        let link = Self {
            name: name.to_string(),
            state: Arc::clone(&state),
        };
        (link, MockHandle { state })
    }
}

impl MockHandle {
    /// Queue one frame to be returned by the next unanswered receive.
    pub fn push_frame(&self, frame: &[u8]) {
        lock(&self.state)
            .replies
            .push_back(MockReply::Frame(frame.to_vec()));
    }

    /// Queue a receive that times out.
    pub fn push_timeout(&self) {
        lock(&self.state).replies.push_back(MockReply::Timeout);
    }

    /// Queue a receive that fails as if the cable was pulled.
    pub fn push_disconnect(&self) {
        lock(&self.state).replies.push_back(MockReply::Disconnect);
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }

    /// Frames written so far, in order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        lock(&self.state).sent.clone()
    }

    pub fn clear_sent(&self) {
        lock(&self.state).sent.clear();
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }
}

impl SerialLink for MockLink {
    fn open(name: &str) -> Result<Self> {
        let (link, _handle) = Self::with_handle(name);
        Ok(link)
    }

    fn list() -> Result<Vec<PortInfo>> {
        Ok(vec![PortInfo {
            name: "mock0".to_string(),
            driver: "mock".to_string(),
        }])
    }

    fn send_raw(&mut self, frame: &[u8]) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(TransportError::Closed);
        }
        if state.fail_writes {
            return Err(TransportError::Write(format!(
                "scripted write failure on {}",
                self.name
            )));
        }
        state.sent.push(frame.to_vec());
        Ok(())
    }

    fn receive_raw(&mut self, _timeout: Duration) -> Result<Vec<u8>> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(TransportError::Closed);
        }
        match state.replies.pop_front() {
            Some(MockReply::Frame(frame)) => Ok(frame),
            Some(MockReply::Timeout) => Err(TransportError::Timeout),
            Some(MockReply::Disconnect) => {
                Err(TransportError::Io(format!("{} disconnected", self.name)))
            }
            // With nothing scripted, acknowledge like an idle board so
            // command flows are exercisable without hardware
            None => Ok(br#"{"payload":"ISOTOPE_BOARD","error":"ACK"}"#.to_vec()),
        }
    }

    fn close(&mut self) -> Result<()> {
        lock(&self.state).open = false;
        Ok(())
    }
}
