//! Scripted transport for testing without real subprocesses
//!
//! Each call to `send` consumes the next script: the raw lines the "process"
//! writes, optionally followed by a transport error. Every request is
//! captured for assertion.

use async_trait::async_trait;
use clibridge_transport::{
    DaemonState, Exchange, LineReceiver, ProcessTransport, TransportError, TransportMode,
    TransportRequest,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One step of a scripted response
pub enum Step {
    /// A raw output line
    Line(String),
    /// A failure while reading
    Fail(TransportError),
}

enum Script {
    Steps(Vec<Step>),
    SendFails(TransportError),
}

/// A transport that plays back scripted output
#[derive(Clone)]
pub struct FakeTransport {
    mode: TransportMode,
    scripts: Arc<Mutex<VecDeque<Script>>>,
    sent: Arc<Mutex<Vec<TransportRequest>>>,
    sends: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
}

impl FakeTransport {
    /// Create a fake with the given mode
    pub fn new(mode: TransportMode) -> Self {
        Self {
            mode,
            scripts: Arc::new(Mutex::new(VecDeque::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
            sends: Arc::new(AtomicUsize::new(0)),
            shutdowns: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue a response made of `lines`
    pub fn respond(self, lines: &[&str]) -> Self {
        let steps = lines.iter().map(|l| Step::Line(l.to_string())).collect();
        self.push(Script::Steps(steps))
    }

    /// Queue a response that breaks off with `err` after `lines`
    pub fn respond_then_fail(self, lines: &[&str], err: TransportError) -> Self {
        let mut steps: Vec<Step> = lines.iter().map(|l| Step::Line(l.to_string())).collect();
        steps.push(Step::Fail(err));
        self.push(Script::Steps(steps))
    }

    /// Make the next `send` fail outright
    pub fn fail_send(self, err: TransportError) -> Self {
        self.push(Script::SendFails(err))
    }

    fn push(self, script: Script) -> Self {
        self.scripts.lock().unwrap().push_back(script);
        self
    }

    /// Requests received so far
    pub fn sent(&self) -> Vec<TransportRequest> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of `send` calls
    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    /// Number of `shutdown` calls
    #[allow(dead_code)]
    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    /// Share as a transport trait object
    pub fn shared(&self) -> Arc<dyn ProcessTransport> {
        Arc::new(self.clone())
    }
}

struct FakeExchange {
    steps: VecDeque<Step>,
}

#[async_trait]
impl LineReceiver for FakeExchange {
    async fn receive_line(&mut self) -> clibridge_transport::Result<Option<String>> {
        match self.steps.pop_front() {
            Some(Step::Line(line)) => Ok(Some(line)),
            Some(Step::Fail(err)) => Err(err),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ProcessTransport for FakeTransport {
    fn mode(&self) -> TransportMode {
        self.mode
    }

    async fn start(&self) -> clibridge_transport::Result<()> {
        Ok(())
    }

    async fn send(&self, request: &TransportRequest) -> clibridge_transport::Result<Exchange> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(request.clone());

        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(Script::Steps(steps)) => Ok(Box::new(FakeExchange {
                steps: steps.into(),
            })),
            Some(Script::SendFails(err)) => Err(err),
            None => Ok(Box::new(FakeExchange {
                steps: VecDeque::new(),
            })),
        }
    }

    async fn is_alive(&self) -> bool {
        true
    }

    async fn state(&self) -> Option<DaemonState> {
        self.mode.is_persistent().then_some(DaemonState::Ready)
    }

    async fn shutdown(&self) -> clibridge_transport::Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
