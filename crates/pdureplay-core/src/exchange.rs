//! The exchange state machine.
//!
//! An [`Exchange`] walks a [`Script`] one step at a time. It performs no I/O:
//! the host loop decides when bytes are read or written and reports each
//! event to the machine, which answers with the state to move to next.
//!
//! ```text
//!                 on_inbound (match)              on_sent
//!  AwaitingInbound ───────────────► ReadyToSend ──────────► AwaitingInbound
//!        │   ▲                          │   ▲
//!        │   └── next step is Expect ───┘   └── next step is Send
//!        │
//!        └── next step is End ──► Completed      any error ──► Failed
//! ```

use core::fmt;

use bytes::Bytes;

use crate::{ExchangeError, HangupCondition, Script, Step};

/// Where an exchange stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    /// Waiting for the other end to send the PDU at the cursor.
    AwaitingInbound,
    /// The PDU at the cursor should be written.
    ReadyToSend,
    /// The cursor reached the terminator.
    Completed,
    Failed,
}

impl ExchangeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExchangeState::Completed | ExchangeState::Failed)
    }

    fn at(step: &Step) -> Self {
        match step {
            Step::Expect(_) => ExchangeState::AwaitingInbound,
            Step::Send(_) => ExchangeState::ReadyToSend,
            Step::End => ExchangeState::Completed,
        }
    }
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingInbound => write!(f, "awaiting inbound"),
            Self::ReadyToSend => write!(f, "ready to send"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Per-run cursor over a shared script.
#[derive(Debug, Clone)]
pub struct Exchange {
    script: Script,
    cursor: usize,
    state: ExchangeState,
}

impl Exchange {
    /// Start at step 0. The initial state follows the first step's direction;
    /// a terminator-only script starts out `Completed`.
    pub fn new(script: Script) -> Self {
        let state = ExchangeState::at(script.step(0));
        Self {
            script,
            cursor: 0,
            state,
        }
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Index of the next step to consume or emit.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Validate a PDU read from the transport against the step at the cursor.
    ///
    /// The bytes must equal the expected payload exactly, length included.
    pub fn on_inbound(&mut self, data: &[u8]) -> Result<ExchangeState, ExchangeError> {
        let step = self.cursor;

        if self.state != ExchangeState::AwaitingInbound {
            return Err(self.fail_with(ExchangeError::OutOfTurn {
                step,
                state: self.state,
            }));
        }

        if data.is_empty() {
            return Err(self.on_hangup(HangupCondition::ZeroRead));
        }

        let Step::Expect(expected) = self.script.step(step) else {
            return Err(self.fail_with(ExchangeError::OutOfTurn {
                step,
                state: self.state,
            }));
        };

        if expected.as_ref() != data {
            let expected = expected.clone();
            return Err(self.fail_with(ExchangeError::Mismatch {
                step,
                expected,
                actual: Bytes::copy_from_slice(data),
            }));
        }

        Ok(self.advance())
    }

    /// The PDU to write, if the machine is ready to send.
    pub fn outbound(&self) -> Option<&Bytes> {
        match (self.state, self.script.step(self.cursor)) {
            (ExchangeState::ReadyToSend, Step::Send(payload)) => Some(payload),
            _ => None,
        }
    }

    /// Record that `written` bytes of [`Exchange::outbound`] reached the
    /// transport. Anything short of the full PDU fails the exchange.
    pub fn on_sent(&mut self, written: usize) -> Result<ExchangeState, ExchangeError> {
        let step = self.cursor;

        let Some(expected) = self.outbound().map(Bytes::len) else {
            return Err(self.fail_with(ExchangeError::OutOfTurn {
                step,
                state: self.state,
            }));
        };

        if written != expected {
            return Err(self.fail_with(ExchangeError::ShortWrite {
                step,
                expected,
                written,
            }));
        }

        Ok(self.advance())
    }

    /// The other end went away; the exchange fails at the current step.
    pub fn on_hangup(&mut self, condition: HangupCondition) -> ExchangeError {
        self.fail_with(ExchangeError::Disconnected {
            step: self.cursor,
            condition,
        })
    }

    /// Fail the exchange for a reason outside the machine (timeout, abort).
    ///
    /// A completed exchange stays completed.
    pub fn fail(&mut self) {
        if self.state != ExchangeState::Completed {
            self.state = ExchangeState::Failed;
        }
    }

    fn fail_with(&mut self, err: ExchangeError) -> ExchangeError {
        self.fail();
        err
    }

    fn advance(&mut self) -> ExchangeState {
        self.cursor += 1;
        self.state = ExchangeState::at(self.script.step(self.cursor));
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISCOVER: &[u8] = &[0x10, 0x01, 0x00, 0xff, 0xff, 0x00, 0x28];
    const SERVICES: &[u8] = &[
        0x11, 0x06, 0x01, 0x00, 0x04, 0x00, 0x12, 0x18, 0x05, 0x00, 0x08, 0x00, 0x12, 0x18,
    ];

    fn request_response() -> Script {
        Script::builder()
            .send(DISCOVER)
            .expect(SERVICES)
            .build()
            .unwrap()
    }

    #[test]
    fn test_empty_script_completes_immediately() {
        let exchange = Exchange::new(Script::empty());
        assert_eq!(exchange.state(), ExchangeState::Completed);
        assert_eq!(exchange.cursor(), 0);
        assert!(exchange.outbound().is_none());
    }

    #[test]
    fn test_initial_state_follows_first_step() {
        let inbound_first = Script::builder().expect(DISCOVER).build().unwrap();
        assert_eq!(
            Exchange::new(inbound_first).state(),
            ExchangeState::AwaitingInbound
        );
        assert_eq!(
            Exchange::new(request_response()).state(),
            ExchangeState::ReadyToSend
        );
    }

    #[test]
    fn test_receive_then_send_completes_in_two_steps() {
        let script = Script::builder()
            .expect(DISCOVER)
            .send(SERVICES)
            .build()
            .unwrap();
        let mut exchange = Exchange::new(script);

        assert_eq!(
            exchange.on_inbound(DISCOVER).unwrap(),
            ExchangeState::ReadyToSend
        );
        assert_eq!(exchange.outbound().unwrap().as_ref(), SERVICES);
        assert_eq!(
            exchange.on_sent(SERVICES.len()).unwrap(),
            ExchangeState::Completed
        );
        assert_eq!(exchange.cursor(), 2);
    }

    #[test]
    fn test_trailing_byte_mismatch_is_localized() {
        let mut exchange = Exchange::new(request_response());
        exchange.on_sent(DISCOVER.len()).unwrap();

        let mut reply = SERVICES.to_vec();
        *reply.last_mut().unwrap() = 0x19;

        let err = exchange.on_inbound(&reply).unwrap_err();
        assert_eq!(err.step(), 1);
        assert!(matches!(err, ExchangeError::Mismatch { .. }));
        assert_eq!(exchange.state(), ExchangeState::Failed);
        assert_eq!(exchange.cursor(), 1);
    }

    #[test]
    fn test_length_mismatch_fails() {
        let mut exchange = Exchange::new(request_response());
        exchange.on_sent(DISCOVER.len()).unwrap();

        let err = exchange.on_inbound(&SERVICES[..4]).unwrap_err();
        match err {
            ExchangeError::Mismatch {
                step,
                expected,
                actual,
            } => {
                assert_eq!(step, 1);
                assert_eq!(expected.len(), SERVICES.len());
                assert_eq!(actual.len(), 4);
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_byte_read_is_disconnect() {
        let script = Script::builder().expect(DISCOVER).build().unwrap();
        let mut exchange = Exchange::new(script);

        let err = exchange.on_inbound(&[]).unwrap_err();
        assert_eq!(
            err,
            ExchangeError::Disconnected {
                step: 0,
                condition: HangupCondition::ZeroRead
            }
        );
        assert_eq!(exchange.state(), ExchangeState::Failed);
    }

    #[test]
    fn test_inbound_while_ready_to_send_is_out_of_turn() {
        let mut exchange = Exchange::new(request_response());
        let err = exchange.on_inbound(SERVICES).unwrap_err();
        assert_eq!(
            err,
            ExchangeError::OutOfTurn {
                step: 0,
                state: ExchangeState::ReadyToSend
            }
        );
    }

    #[test]
    fn test_short_write_fails() {
        let mut exchange = Exchange::new(request_response());
        let err = exchange.on_sent(3).unwrap_err();
        assert_eq!(
            err,
            ExchangeError::ShortWrite {
                step: 0,
                expected: DISCOVER.len(),
                written: 3
            }
        );
    }

    #[test]
    fn test_consecutive_steps_in_one_direction() {
        let script = Script::builder()
            .expect(&[0x01])
            .expect(&[0x02])
            .send(&[0x03])
            .build()
            .unwrap();
        let mut exchange = Exchange::new(script);

        assert_eq!(
            exchange.on_inbound(&[0x01]).unwrap(),
            ExchangeState::AwaitingInbound
        );
        assert_eq!(
            exchange.on_inbound(&[0x02]).unwrap(),
            ExchangeState::ReadyToSend
        );
        assert_eq!(exchange.on_sent(1).unwrap(), ExchangeState::Completed);
    }

    #[test]
    fn test_cursor_never_passes_terminator() {
        let mut exchange = Exchange::new(request_response());
        exchange.on_sent(DISCOVER.len()).unwrap();
        exchange.on_inbound(SERVICES).unwrap();
        assert_eq!(exchange.state(), ExchangeState::Completed);

        assert!(exchange.on_inbound(SERVICES).is_err());
        assert!(exchange.on_sent(1).is_err());
        assert_eq!(exchange.cursor(), exchange.script().len());
        assert_eq!(exchange.state(), ExchangeState::Completed);
    }

    #[test]
    fn test_external_fail_keeps_completed() {
        let mut done = Exchange::new(Script::empty());
        done.fail();
        assert_eq!(done.state(), ExchangeState::Completed);

        let mut running = Exchange::new(request_response());
        running.fail();
        assert_eq!(running.state(), ExchangeState::Failed);
        assert!(running.outbound().is_none());
    }
}
