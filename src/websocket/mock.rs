//! Scripted in-memory transport used by session and supervisor tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::{sleep_until, Duration, Instant};

use crate::error::{Error, Result};
use crate::websocket::transport::{Connector, Frame, Transport};

/// One step of a scripted connection
#[derive(Debug, Clone)]
pub enum Step {
    /// Deliver a text frame
    Text(String),
    /// Deliver an arbitrary frame
    Frame(Frame),
    /// The connection ends (`receive` yields `None`)
    End,
    /// A transport-level read error
    Fail(String),
    /// Nothing arrives for this long
    Wait(Duration),
}

/// How one `connect` call behaves
#[derive(Debug, Clone)]
pub enum Script {
    Refuse(String),
    Accept(Vec<Step>),
    /// The handshake never completes
    Hang,
}

#[derive(Debug, Default)]
pub struct Recorded {
    pub connects: Vec<(String, Vec<(String, String)>)>,
    pub sent: Vec<Vec<Frame>>,
    pub closed: Vec<usize>,
}

/// Hands out one script per connect; once scripts run out, connections
/// open and then stay silent
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    recorded: Arc<Mutex<Recorded>>,
}

impl ScriptedConnector {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into())),
            recorded: Arc::default(),
        }
    }

    pub fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    async fn connect(&self, url: &str, headers: &[(String, String)]) -> Result<ScriptedTransport> {
        let script = self.scripts.lock().unwrap().pop_front();
        let index = {
            let mut recorded = self.recorded.lock().unwrap();
            recorded.connects.push((url.to_string(), headers.to_vec()));
            recorded.sent.push(Vec::new());
            recorded.sent.len() - 1
        };

        let steps = match script {
            Some(Script::Refuse(reason)) => return Err(Error::WebSocket(reason)),
            Some(Script::Accept(steps)) => steps,
            Some(Script::Hang) => std::future::pending().await,
            None => Vec::new(),
        };

        Ok(ScriptedTransport {
            index,
            steps: steps.into(),
            wake_at: None,
            recorded: self.recorded.clone(),
        })
    }
}

pub struct ScriptedTransport {
    index: usize,
    steps: VecDeque<Step>,
    wake_at: Option<Instant>,
    recorded: Arc<Mutex<Recorded>>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        self.recorded.lock().unwrap().sent[self.index].push(frame);
        Ok(())
    }

    async fn receive(&mut self) -> Option<Result<Frame>> {
        // Let other branches of the caller's select run between frames
        tokio::task::yield_now().await;
        // A wait survives the receive future being dropped mid-sleep
        while let Some(Step::Wait(duration)) = self.steps.front() {
            let wake_at = *self.wake_at.get_or_insert(Instant::now() + *duration);
            sleep_until(wake_at).await;
            self.wake_at = None;
            self.steps.pop_front();
        }
        match self.steps.pop_front() {
            Some(Step::Text(text)) => Some(Ok(Frame::Text(text))),
            Some(Step::Frame(frame)) => Some(Ok(frame)),
            Some(Step::End) => None,
            Some(Step::Fail(reason)) => Some(Err(Error::WebSocket(reason))),
            Some(Step::Wait(_)) | None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.recorded.lock().unwrap().closed.push(self.index);
        Ok(())
    }
}
