//! Per-test exchange context.
//!
//! An [`ExchangeContext`] owns everything one test instance touches: the
//! engine's transport endpoint, the peer under test, and the outstanding I/O
//! registrations. It drives an [`Exchange`] from a single event queue, so
//! exactly one event is handled at a time and steps run in script order.
//!
//! Two registrations can be outstanding:
//! - the read watch, a task forwarding every PDU (or hangup) on the endpoint;
//! - the deferred send, a task that yields once before asking for the next
//!   outbound PDU to be written, so a write never happens inside the handling
//!   of a read.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use pdureplay_core::{
    Direction, Exchange, ExchangeState, HangupCondition, Transport, TransportError,
};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::config::HarnessConfig;
use crate::diagnostics::{DiagnosticSink, TrafficLog};
use crate::error::{SetupError, TestFailure};
use crate::peer::{Peer, PeerLink};
use crate::reporter::Reporter;
use crate::testcase::TestCase;

#[derive(Debug)]
enum Event {
    Readable(Bytes),
    Hangup(HangupCondition),
    SendReady,
    Abort,
}

#[derive(Debug, Default)]
struct PendingIo {
    read_watch: Option<AbortHandle>,
    deferred_send: Option<AbortHandle>,
}

impl PendingIo {
    fn cancel(&mut self) {
        if let Some(handle) = self.read_watch.take() {
            handle.abort();
        }
        if let Some(handle) = self.deferred_send.take() {
            handle.abort();
        }
    }
}

/// Cancels a running context from outside. The context tears down and
/// reports [`TestFailure::Aborted`].
#[derive(Debug, Clone)]
pub struct AbortSignal {
    events: mpsc::UnboundedSender<Event>,
}

impl AbortSignal {
    pub fn abort(&self) {
        let _ = self.events.send(Event::Abort);
    }
}

pub struct ExchangeContext {
    case: TestCase,
    exchange: Exchange,
    transport: Transport,
    peer: Option<Box<dyn Peer>>,
    events_tx: mpsc::UnboundedSender<Event>,
    events: mpsc::UnboundedReceiver<Event>,
    pending: PendingIo,
    sink: Arc<dyn DiagnosticSink>,
    traffic: TrafficLog,
    step_timeout: Option<Duration>,
    reporter: Option<Reporter>,
    torn_down: bool,
}

impl ExchangeContext {
    /// Create the transport pair, build the peer and attach it to its end.
    ///
    /// On failure everything created so far is released before returning.
    pub fn new(
        case: &TestCase,
        config: &HarnessConfig,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, SetupError> {
        let (transport, peer_end) = Transport::pair(config.transport);

        let mut peer = match case.factory().create(case, &config.device) {
            Ok(peer) => peer,
            Err(e) => {
                transport.close();
                return Err(e);
            }
        };

        if let Err(e) = peer.attach(PeerLink::new(peer_end, config.mtu)) {
            peer.detach();
            transport.close();
            return Err(e);
        }

        let (events_tx, events) = mpsc::unbounded_channel();
        tracing::debug!(
            case = case.name(),
            transport = %config.transport,
            steps = case.script().len(),
            "context created"
        );

        Ok(Self {
            case: case.clone(),
            exchange: Exchange::new(case.script().clone()),
            transport,
            peer: Some(peer),
            events_tx,
            events,
            pending: PendingIo::default(),
            sink,
            traffic: TrafficLog::default(),
            step_timeout: config.step_timeout,
            reporter: None,
            torn_down: false,
        })
    }

    pub fn abort_signal(&self) -> AbortSignal {
        AbortSignal {
            events: self.events_tx.clone(),
        }
    }

    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    /// Drive the exchange to a terminal state, tear down, then report.
    pub async fn run(mut self, reporter: Reporter) {
        self.reporter = Some(reporter);

        if self.torn_down {
            self.exchange.fail();
            let step = self.exchange.cursor();
            self.finish(Some(TestFailure::Aborted { step }));
            return;
        }

        let failure = loop {
            match self.exchange.state() {
                ExchangeState::Completed => break None,
                ExchangeState::Failed => break Some(TestFailure::Lost),
                ExchangeState::AwaitingInbound => self.watch_readable(),
                ExchangeState::ReadyToSend => self.schedule_send(),
            }

            let event = match self.next_event().await {
                Ok(event) => event,
                Err(failure) => break Some(failure),
            };

            if let Err(failure) = self.dispatch(event).await {
                break Some(failure);
            }
        };

        self.finish(failure);
    }

    /// Cancel pending registrations, detach the peer and close the engine's
    /// endpoint, in that order. Returns `false` if already torn down.
    pub fn teardown(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        self.torn_down = true;

        self.pending.cancel();
        if let Some(mut peer) = self.peer.take() {
            peer.detach();
        }
        self.transport.close();

        tracing::trace!(case = self.case.name(), "context torn down");
        true
    }

    fn watch_readable(&mut self) {
        if self.pending.read_watch.is_some() {
            return;
        }

        let transport = self.transport.clone();
        let events = self.events_tx.clone();
        let task = tokio::spawn(async move {
            loop {
                let event = match transport.recv().await {
                    Ok(pdu) => Event::Readable(pdu),
                    Err(TransportError::Closed) => Event::Hangup(HangupCondition::Hangup),
                    Err(e) => {
                        tracing::debug!(error = %e, "read watch error");
                        Event::Hangup(HangupCondition::Error)
                    }
                };
                let last = matches!(event, Event::Hangup(_));
                if events.send(event).is_err() || last {
                    break;
                }
            }
        });
        self.pending.read_watch = Some(task.abort_handle());
    }

    fn schedule_send(&mut self) {
        if self.pending.deferred_send.is_some() {
            return;
        }

        let events = self.events_tx.clone();
        let task = tokio::spawn(async move {
            tokio::task::yield_now().await;
            let _ = events.send(Event::SendReady);
        });
        self.pending.deferred_send = Some(task.abort_handle());
    }

    async fn next_event(&mut self) -> Result<Event, TestFailure> {
        let step = self.exchange.cursor();
        let deadline = match self.exchange.state() {
            ExchangeState::AwaitingInbound => self.step_timeout,
            _ => None,
        };

        let event = match deadline {
            Some(after) => tokio::time::timeout(after, self.events.recv())
                .await
                .map_err(|_| {
                    tracing::debug!(step, ?after, "inbound step timed out");
                    TestFailure::Timeout { step, after }
                })?,
            None => self.events.recv().await,
        };

        event.ok_or(TestFailure::Lost)
    }

    async fn dispatch(&mut self, event: Event) -> Result<(), TestFailure> {
        let step = self.exchange.cursor();

        match event {
            Event::Readable(pdu) => {
                self.record(step, Direction::Inbound, &pdu);
                self.exchange.on_inbound(&pdu)?;
            }
            Event::Hangup(condition) => {
                return Err(self.exchange.on_hangup(condition).into());
            }
            Event::SendReady => {
                self.pending.deferred_send = None;

                let Some(pdu) = self.exchange.outbound().cloned() else {
                    return Err(self
                        .exchange
                        .on_sent(0)
                        .err()
                        .map_or(TestFailure::Lost, Into::into));
                };

                let written = match self.transport.send(&pdu).await {
                    Ok(written) => written,
                    Err(error) => {
                        self.exchange.fail();
                        return Err(TestFailure::Transport { step, error });
                    }
                };
                self.record(step, Direction::Outbound, &pdu);
                self.exchange.on_sent(written)?;
            }
            Event::Abort => {
                self.exchange.fail();
                return Err(TestFailure::Aborted { step });
            }
        }

        tracing::trace!(
            case = self.case.name(),
            step,
            state = %self.exchange.state(),
            "step complete"
        );
        Ok(())
    }

    fn record(&mut self, step: usize, direction: Direction, pdu: &Bytes) {
        self.sink.pdu(self.case.name(), direction, pdu);
        self.traffic.record(step, direction, pdu.clone());
    }

    fn finish(&mut self, failure: Option<TestFailure>) {
        let steps = self.exchange.cursor();
        self.teardown();

        let Some(reporter) = self.reporter.take() else {
            return;
        };
        let traffic = std::mem::take(&mut self.traffic);

        match failure {
            None => {
                tracing::debug!(case = self.case.name(), steps, "exchange completed");
                reporter.report_pass(steps, traffic);
            }
            Some(failure) => {
                tracing::warn!(case = self.case.name(), %failure, "exchange failed");
                reporter.report_fail(failure, steps, traffic);
            }
        }
    }
}

impl Drop for ExchangeContext {
    fn drop(&mut self) {
        self.teardown();
    }
}
