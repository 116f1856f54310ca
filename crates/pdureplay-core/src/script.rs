//! PDU scripts.
//!
//! A script is an immutable, ordered list of [`Step`]s terminated by exactly
//! one [`Step::End`]. Each step says which way its PDU travels, seen from the
//! side that runs the script.

use std::sync::Arc;

use bytes::Bytes;

use crate::ScriptError;

/// Largest PDU a script may carry, in bytes.
///
/// Matches the read buffer a readability event drains in one go.
pub const MAX_PDU_SIZE: usize = 512;

static END: Step = Step::End;

/// Which way a PDU travels relative to the side running the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Received from the other end.
    Inbound,
    /// Written to the other end.
    Outbound,
}

impl Direction {
    /// Hex dump marker: `>` for inbound, `<` for outbound.
    pub fn marker(self) -> char {
        match self {
            Direction::Inbound => '>',
            Direction::Outbound => '<',
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Direction::Inbound => Direction::Outbound,
            Direction::Outbound => Direction::Inbound,
        }
    }
}

/// One script entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Wait for these exact bytes.
    Expect(Bytes),
    /// Write these bytes.
    Send(Bytes),
    /// End of script.
    End,
}

impl Step {
    fn new(direction: Direction, payload: Bytes) -> Self {
        match direction {
            Direction::Inbound => Step::Expect(payload),
            Direction::Outbound => Step::Send(payload),
        }
    }

    pub fn payload(&self) -> Option<&Bytes> {
        match self {
            Step::Expect(bytes) | Step::Send(bytes) => Some(bytes),
            Step::End => None,
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            Step::Expect(_) => Some(Direction::Inbound),
            Step::Send(_) => Some(Direction::Outbound),
            Step::End => None,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Step::End)
    }

    fn mirrored(&self) -> Self {
        match self {
            Step::Expect(bytes) => Step::Send(bytes.clone()),
            Step::Send(bytes) => Step::Expect(bytes.clone()),
            Step::End => Step::End,
        }
    }
}

/// A finalized, immutable PDU script.
///
/// Cloning is cheap: clones share the same step list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    steps: Arc<[Step]>,
}

impl Script {
    pub fn builder() -> ScriptBuilder {
        ScriptBuilder::default()
    }

    /// The terminator-only script.
    pub fn empty() -> Self {
        Self {
            steps: Arc::from([Step::End]),
        }
    }

    /// Build a script from a position-alternating PDU table.
    ///
    /// The first PDU travels in direction `first`, the second in the opposite
    /// direction, and so on.
    pub fn alternating<P: AsRef<[u8]>>(first: Direction, pdus: &[P]) -> Result<Self, ScriptError> {
        let mut builder = Script::builder();
        let mut direction = first;
        for pdu in pdus {
            builder = builder.push(direction, pdu.as_ref());
            direction = direction.reversed();
        }
        builder.build()
    }

    /// Number of steps before the terminator.
    pub fn len(&self) -> usize {
        self.steps.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The step at `index`, or [`Step::End`] past the terminator.
    pub fn step(&self, index: usize) -> &Step {
        self.steps.get(index).unwrap_or(&END)
    }

    /// All steps, terminator included.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The same exchange seen from the other end.
    ///
    /// Every `Expect` becomes a `Send` and vice versa; indices are unchanged.
    pub fn mirrored(&self) -> Self {
        Self {
            steps: self.steps.iter().map(Step::mirrored).collect(),
        }
    }

    /// Indices of the steps that travel in `direction`.
    pub fn indices(&self, direction: Direction) -> impl Iterator<Item = usize> + '_ {
        self.steps
            .iter()
            .enumerate()
            .filter(move |(_, step)| step.direction() == Some(direction))
            .map(|(index, _)| index)
    }
}

impl Default for Script {
    fn default() -> Self {
        Self::empty()
    }
}

/// Append-only script builder.
///
/// The builder copies every payload, so the caller's buffers need not outlive
/// it. Validation errors are held until [`ScriptBuilder::build`].
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    steps: Vec<Step>,
    error: Option<ScriptError>,
}

impl ScriptBuilder {
    /// Append a PDU the other end must send.
    pub fn expect(self, pdu: &[u8]) -> Self {
        self.push(Direction::Inbound, pdu)
    }

    /// Append a PDU to write to the other end.
    pub fn send(self, pdu: &[u8]) -> Self {
        self.push(Direction::Outbound, pdu)
    }

    pub fn push(mut self, direction: Direction, pdu: &[u8]) -> Self {
        let index = self.steps.len();
        if self.error.is_none() {
            if pdu.is_empty() {
                self.error = Some(ScriptError::EmptyPdu { index });
            } else if pdu.len() > MAX_PDU_SIZE {
                self.error = Some(ScriptError::PduTooLarge {
                    index,
                    len: pdu.len(),
                    max: MAX_PDU_SIZE,
                });
            }
        }
        self.steps
            .push(Step::new(direction, Bytes::copy_from_slice(pdu)));
        self
    }

    /// Finalize the script, appending the terminator.
    pub fn build(mut self) -> Result<Script, ScriptError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        self.steps.push(Step::End);
        Ok(Script {
            steps: self.steps.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_appends_single_terminator() {
        let script = Script::builder()
            .expect(&[0x10, 0x01])
            .send(&[0x11, 0x06])
            .build()
            .unwrap();

        assert_eq!(script.len(), 2);
        assert_eq!(script.steps().len(), 3);
        assert!(script.step(2).is_end());
        assert_eq!(script.steps().iter().filter(|s| s.is_end()).count(), 1);
        assert!(script.step(99).is_end());
    }

    #[test]
    fn test_empty_script() {
        let script = Script::empty();
        assert!(script.is_empty());
        assert!(script.step(0).is_end());
        assert_eq!(script, Script::builder().build().unwrap());
    }

    #[test]
    fn test_empty_pdu_rejected() {
        let err = Script::builder()
            .expect(&[0x01])
            .send(&[])
            .expect(&[0x02])
            .build()
            .unwrap_err();
        assert_eq!(err, ScriptError::EmptyPdu { index: 1 });
    }

    #[test]
    fn test_oversized_pdu_rejected() {
        let err = Script::builder()
            .send(&[0u8; MAX_PDU_SIZE + 1])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ScriptError::PduTooLarge {
                index: 0,
                len: MAX_PDU_SIZE + 1,
                max: MAX_PDU_SIZE
            }
        );
    }

    #[test]
    fn test_alternating_table() {
        let table: &[&[u8]] = &[&[0x10], &[0x11], &[0x12]];
        let script = Script::alternating(Direction::Inbound, table).unwrap();

        assert_eq!(script.step(0), &Step::Expect(Bytes::from_static(&[0x10])));
        assert_eq!(script.step(1), &Step::Send(Bytes::from_static(&[0x11])));
        assert_eq!(script.step(2), &Step::Expect(Bytes::from_static(&[0x12])));
        assert!(script.step(3).is_end());
    }

    #[test]
    fn test_mirrored_swaps_directions() {
        let script = Script::builder()
            .expect(&[0x01])
            .send(&[0x02])
            .send(&[0x03])
            .build()
            .unwrap();
        let mirror = script.mirrored();

        assert_eq!(mirror.indices(Direction::Outbound).collect::<Vec<_>>(), [0]);
        assert_eq!(mirror.indices(Direction::Inbound).collect::<Vec<_>>(), [1, 2]);
        assert_eq!(mirror.mirrored(), script);
    }

    #[test]
    fn test_builder_copies_caller_buffer() {
        let script = {
            let buf = vec![0xaa, 0xbb];
            Script::builder().expect(&buf).build().unwrap()
        };
        assert_eq!(script.step(0).payload().unwrap().as_ref(), &[0xaa, 0xbb]);
    }
}
