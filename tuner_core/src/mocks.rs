//! Test doubles for tuner_core: a scripted port provider and transport.
//!
//! Both share one [`Script`], so a test keeps a `ScriptedPorts` handle,
//! hands a clone to the client, and inspects every request written.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tuner_traits::{BoxError, PortProvider, Transport};

type Responder = Box<dyn FnMut(&str) -> Option<String> + Send>;

enum Reply {
    Line(String),
    Silence,
    /// Bytes without a terminator when the read deadline passes.
    Partial(String),
    /// Misses this read's deadline, then arrives before the next read on
    /// the same link.
    Late(String),
}

#[derive(Default)]
struct Script {
    ports: Vec<String>,
    replies: VecDeque<Reply>,
    responder: Option<Responder>,
    writes: Vec<String>,
    open_failure: Option<String>,
    listing_failure: Option<String>,
    opened: usize,
}

/// Port listing and replies driven by the test.
///
/// Queued replies are consumed first, one per read. With nothing queued the
/// responder, if any, answers the last request; otherwise the read times out.
#[derive(Clone, Default)]
pub struct ScriptedPorts {
    script: Arc<Mutex<Script>>,
}

impl ScriptedPorts {
    pub fn new(ports: &[&str]) -> Self {
        let s = Self::default();
        s.lock().ports = ports.iter().map(|p| (*p).to_string()).collect();
        s
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_ports(&self, ports: &[&str]) {
        self.lock().ports = ports.iter().map(|p| (*p).to_string()).collect();
    }

    /// Queue one reply line.
    pub fn reply(&self, line: &str) -> &Self {
        self.lock().replies.push_back(Reply::Line(line.to_string()));
        self
    }

    /// Queue one read that times out.
    pub fn silence(&self) -> &Self {
        self.lock().replies.push_back(Reply::Silence);
        self
    }

    /// Queue one read that receives `fragment` and no line terminator.
    pub fn partial(&self, fragment: &str) -> &Self {
        self.lock().replies.push_back(Reply::Partial(fragment.to_string()));
        self
    }

    /// Queue one reply that shows up only after its read timed out.
    pub fn late(&self, line: &str) -> &Self {
        self.lock().replies.push_back(Reply::Late(line.to_string()));
        self
    }

    /// Answer requests with `f` when nothing is queued.
    pub fn respond_with(&self, f: impl FnMut(&str) -> Option<String> + Send + 'static) {
        self.lock().responder = Some(Box::new(f));
    }

    /// Make every open fail with `reason`.
    pub fn fail_open(&self, reason: &str) {
        self.lock().open_failure = Some(reason.to_string());
    }

    /// Make port enumeration fail with `reason`.
    pub fn fail_listing(&self, reason: &str) {
        self.lock().listing_failure = Some(reason.to_string());
    }

    /// Every request written so far, in order.
    pub fn writes(&self) -> Vec<String> {
        self.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    pub fn opened(&self) -> usize {
        self.lock().opened
    }
}

impl PortProvider for ScriptedPorts {
    type Port = ScriptedTransport;

    fn available_ports(&self) -> Result<Vec<String>, BoxError> {
        let s = self.lock();
        if let Some(reason) = &s.listing_failure {
            return Err(Box::new(std::io::Error::other(reason.clone())));
        }
        Ok(s.ports.clone())
    }

    fn open(&self, name: &str, _baud: u32, _timeout: Duration) -> Result<Self::Port, BoxError> {
        let mut s = self.lock();
        if let Some(reason) = &s.open_failure {
            return Err(Box::new(std::io::Error::other(reason.clone())));
        }
        s.opened += 1;
        tracing::trace!(port = name, "scripted port opened");
        Ok(ScriptedTransport {
            script: Arc::clone(&self.script),
            stale: None,
        })
    }
}

pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
    /// A late line waiting in this link's input buffer.
    stale: Option<String>,
}

fn timed_out() -> BoxError {
    Box::new(std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out"))
}

fn truncated(fragment: &str) -> BoxError {
    Box::new(std::io::Error::new(
        std::io::ErrorKind::TimedOut,
        format!(
            "reply truncated: {} bytes without line terminator before read timeout",
            fragment.len()
        ),
    ))
}

impl Transport for ScriptedTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        let mut s = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        s.writes.push(String::from_utf8_lossy(bytes).into_owned());
        Ok(())
    }

    fn read_line(&mut self, _timeout: Duration) -> Result<Vec<u8>, BoxError> {
        if let Some(line) = self.stale.take() {
            return Ok(line.into_bytes());
        }
        let mut s = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        match s.replies.pop_front() {
            Some(Reply::Line(line)) => return Ok(line.into_bytes()),
            Some(Reply::Silence) => return Err(timed_out()),
            Some(Reply::Partial(fragment)) => return Err(truncated(&fragment)),
            Some(Reply::Late(line)) => {
                self.stale = Some(line);
                return Err(timed_out());
            }
            None => {}
        }
        let last = s.writes.last().cloned().unwrap_or_default();
        match s.responder.as_mut().and_then(|f| f(last.trim_end())) {
            Some(line) => Ok(line.into_bytes()),
            None => Err(timed_out()),
        }
    }
}
