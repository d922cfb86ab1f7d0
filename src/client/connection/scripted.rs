//! In-memory transport for driving the connection manager deterministically.
//!
//! The transport is a cheap handle around shared state: keep one clone in the
//! test, hand the other to the manager, then script handshake outcomes,
//! queue inbound frames and inspect what was sent.

use super::transport::{Frame, Transport, TransportError};
use crate::shared::event::PushMessage;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Script {
    open_results: VecDeque<Result<(), TransportError>>,
    hang_on_open: bool,
    inbound: VecDeque<Result<Frame, TransportError>>,
    sent: Vec<Frame>,
    is_open: bool,
    opens: u32,
    closes: u32,
    auto_pong: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    script: Rc<RefCell<Script>>,
    inbound_ready: Rc<Notify>,
}

impl ScriptedTransport {
    /// A transport whose handshakes succeed and which answers pings
    pub fn new() -> Self {
        let transport = Self::default();
        transport.script.borrow_mut().auto_pong = true;
        transport
    }

    /// Queue the outcome of the next `open` call; unqueued opens succeed
    pub fn push_open_result(&self, result: Result<(), TransportError>) {
        self.script.borrow_mut().open_results.push_back(result);
    }

    /// Make the next `n` handshakes fail
    pub fn fail_next_opens(&self, n: usize) {
        for attempt in 0..n {
            self.push_open_result(Err(TransportError::Handshake(format!(
                "scripted failure {}",
                attempt + 1
            ))));
        }
    }

    /// Handshakes never complete while set
    pub fn set_hang_on_open(&self, hang: bool) {
        self.script.borrow_mut().hang_on_open = hang;
    }

    pub fn set_auto_pong(&self, enabled: bool) {
        self.script.borrow_mut().auto_pong = enabled;
    }

    pub fn push_frame(&self, frame: Frame) {
        self.script.borrow_mut().inbound.push_back(Ok(frame));
        self.inbound_ready.notify_one();
    }

    pub fn push_message(&self, topic: &str, message: PushMessage) {
        self.push_frame(Frame::Message {
            topic: topic.to_string(),
            message,
        });
    }

    /// Simulate the channel dropping
    pub fn push_error(&self, error: TransportError) {
        self.script.borrow_mut().inbound.push_back(Err(error));
        self.inbound_ready.notify_one();
    }

    /// Queue an undecodable frame; the channel stays open
    pub fn push_malformed(&self, detail: &str) {
        self.push_error(TransportError::Protocol(detail.to_string()));
    }

    pub fn sent(&self) -> Vec<Frame> {
        self.script.borrow().sent.clone()
    }

    pub fn take_sent(&self) -> Vec<Frame> {
        std::mem::take(&mut self.script.borrow_mut().sent)
    }

    pub fn open_count(&self) -> u32 {
        self.script.borrow().opens
    }

    pub fn close_count(&self) -> u32 {
        self.script.borrow().closes
    }

    pub fn is_open(&self) -> bool {
        self.script.borrow().is_open
    }

    pub fn pending_inbound(&self) -> usize {
        self.script.borrow().inbound.len()
    }
}

impl Transport for ScriptedTransport {
    async fn open(&mut self, _url: &str) -> Result<(), TransportError> {
        let hang = self.script.borrow().hang_on_open;
        if hang {
            std::future::pending::<()>().await;
        }
        let mut script = self.script.borrow_mut();
        script.opens += 1;
        let result = script.open_results.pop_front().unwrap_or(Ok(()));
        script.is_open = result.is_ok();
        result
    }

    async fn close(&mut self) {
        let mut script = self.script.borrow_mut();
        if script.is_open {
            script.is_open = false;
            script.closes += 1;
        }
    }

    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let mut script = self.script.borrow_mut();
        if !script.is_open {
            return Err(TransportError::Closed);
        }
        if frame == Frame::Ping && script.auto_pong {
            script.inbound.push_back(Ok(Frame::Pong));
            self.inbound_ready.notify_one();
        }
        script.sent.push(frame);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Frame, TransportError> {
        loop {
            let next = {
                let mut script = self.script.borrow_mut();
                if !script.is_open {
                    None
                } else {
                    script.inbound.pop_front()
                }
            };
            match next {
                Some(Err(error)) => {
                    if error.is_fatal() {
                        self.script.borrow_mut().is_open = false;
                    }
                    return Err(error);
                }
                Some(Ok(frame)) => return Ok(frame),
                None => self.inbound_ready.notified().await,
            }
        }
    }
}
