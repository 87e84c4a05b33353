//! In-memory links for driving the bridge without hardware.
//!
//! A [`MemoryLink`] replays a script of [`LinkEvent`]s and records every line
//! written to it. An exhausted script behaves like an unplugged device.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::{LinkError, LinkOpener, LinkSettings, SerialLink};

/// One scripted step on the inbound side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A record arrives (without its newline).
    Line(String),
    /// One poll with nothing pending.
    Idle,
    /// The device goes away.
    Disconnect,
}

impl LinkEvent {
    pub fn line(text: impl Into<String>) -> Self {
        LinkEvent::Line(text.into())
    }
}

/// Shared record of lines written by the bridge.
pub type Outbox = Arc<Mutex<Vec<String>>>;

pub struct MemoryLink {
    name: String,
    script: VecDeque<LinkEvent>,
    outbox: Outbox,
    fail_writes: bool,
}

impl MemoryLink {
    pub fn new(name: impl Into<String>, script: impl IntoIterator<Item = LinkEvent>) -> Self {
        Self {
            name: name.into(),
            script: script.into_iter().collect(),
            outbox: Outbox::default(),
            fail_writes: false,
        }
    }

    /// Record writes into an outbox shared with the caller.
    pub fn with_outbox(mut self, outbox: Outbox) -> Self {
        self.outbox = outbox;
        self
    }

    /// Make every write fail.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn outbox(&self) -> Outbox {
        Arc::clone(&self.outbox)
    }

    fn lost(&self) -> LinkError {
        LinkError::Disconnected(format!("{}: script exhausted", self.name))
    }
}

#[async_trait]
impl SerialLink for MemoryLink {
    fn has_data(&mut self) -> Result<bool, LinkError> {
        match self.script.front() {
            Some(LinkEvent::Line(_)) => Ok(true),
            Some(LinkEvent::Idle) => {
                self.script.pop_front();
                Ok(false)
            }
            Some(LinkEvent::Disconnect) | None => Err(self.lost()),
        }
    }

    async fn read_line(&mut self) -> Result<Option<String>, LinkError> {
        match self.script.pop_front() {
            Some(LinkEvent::Line(text)) => {
                let line = text.trim().to_string();
                Ok((!line.is_empty()).then_some(line))
            }
            Some(LinkEvent::Idle) => Ok(None),
            Some(LinkEvent::Disconnect) | None => Err(self.lost()),
        }
    }

    async fn write_line(&mut self, text: &str) -> Result<(), LinkError> {
        if self.fail_writes {
            return Err(LinkError::Write(format!("{}: write rejected", self.name)));
        }
        let mut record = text.to_string();
        if !record.ends_with('\n') {
            record.push('\n');
        }
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Opener that fails a fixed number of times, then hands out queued links.
///
/// Once the queue is empty every further attempt fails.
pub struct ScriptedOpener {
    failures_left: AtomicU32,
    links: Mutex<VecDeque<MemoryLink>>,
    attempts: AtomicU32,
}

impl ScriptedOpener {
    pub fn new(failures: u32, links: impl IntoIterator<Item = MemoryLink>) -> Self {
        Self {
            failures_left: AtomicU32::new(failures),
            links: Mutex::new(links.into_iter().collect()),
            attempts: AtomicU32::new(0),
        }
    }

    /// Total `open` calls so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl LinkOpener for ScriptedOpener {
    fn open(&self, settings: &LinkSettings) -> Result<Box<dyn SerialLink>, LinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(LinkError::Open {
                port: settings.port.clone(),
                reason: "No such file or directory".to_string(),
            });
        }

        self.links
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .map(|link| Box::new(link) as Box<dyn SerialLink>)
            .ok_or_else(|| LinkError::Open {
                port: settings.port.clone(),
                reason: "device not present".to_string(),
            })
    }
}
