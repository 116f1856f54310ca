//! Reference peer.
//!
//! [`ReplayPeer`] plays the other side of a test case: it runs the case's
//! script mirrored, sending what the engine expects and expecting what the
//! engine sends. Faults can be injected to exercise the failure paths.

use std::sync::Arc;

use pdureplay_core::{Exchange, ExchangeState, HangupCondition, Script, Transport};
use tokio::task::JoinHandle;

use crate::error::SetupError;
use crate::peer::{DeviceInfo, Peer, PeerFactory, PeerLink};
use crate::testcase::TestCase;

/// A deviation from faithful replay. Steps are indices into the case's
/// script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Invert one byte of the PDU the peer sends at `step`. The offset wraps
    /// around the payload length.
    FlipByte { step: usize, offset: usize },
    /// Close the peer's endpoint on reaching `step`.
    HangUp { step: usize },
    /// Stop responding on reaching `step`, keeping the endpoint open.
    Stall { step: usize },
}

impl Fault {
    fn step(&self) -> usize {
        match self {
            Fault::FlipByte { step, .. } | Fault::HangUp { step } | Fault::Stall { step } => *step,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReplayFactory {
    faults: Arc<[Fault]>,
}

impl ReplayFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: impl IntoIterator<Item = Fault>) -> Self {
        Self {
            faults: faults.into_iter().collect(),
        }
    }
}

impl PeerFactory for ReplayFactory {
    fn create(&self, case: &TestCase, device: &DeviceInfo) -> Result<Box<dyn Peer>, SetupError> {
        tracing::debug!(
            case = case.name(),
            device = %device.name,
            vendor = device.vendor,
            product = device.product,
            version = device.version,
            "creating replay peer"
        );
        Ok(Box::new(ReplayPeer::new(
            case.script().mirrored(),
            self.faults.clone(),
        )))
    }
}

/// Replays a script over its endpoint using the same [`Exchange`] machine
/// the engine runs.
pub struct ReplayPeer {
    script: Script,
    faults: Arc<[Fault]>,
    link: Option<Transport>,
    task: Option<JoinHandle<()>>,
}

impl ReplayPeer {
    pub fn new(script: Script, faults: Arc<[Fault]>) -> Self {
        Self {
            script,
            faults,
            link: None,
            task: None,
        }
    }
}

impl Peer for ReplayPeer {
    fn attach(&mut self, link: PeerLink) -> Result<(), SetupError> {
        if self.link.is_some() {
            return Err(SetupError::Attach("peer is already attached".to_string()));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SetupError::Attach(format!("no async runtime: {e}")))?;

        tracing::trace!(mtu = link.mtu(), "replay peer attaching");
        let transport = link.into_transport();
        let exchange = Exchange::new(self.script.clone());
        self.task = Some(runtime.spawn(replay(
            exchange,
            transport.clone(),
            self.faults.clone(),
        )));
        // Held until detach so the link outlives the replay task.
        self.link = Some(transport);
        Ok(())
    }

    fn detach(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(transport) = self.link.take() {
            transport.close();
        }
    }
}

impl Drop for ReplayPeer {
    fn drop(&mut self) {
        self.detach();
    }
}

async fn replay(mut exchange: Exchange, transport: Transport, faults: Arc<[Fault]>) {
    loop {
        let step = exchange.cursor();

        for fault in faults.iter().filter(|fault| fault.step() == step) {
            match fault {
                Fault::HangUp { .. } => {
                    tracing::debug!(step, "replay peer hanging up");
                    transport.close();
                    return;
                }
                Fault::Stall { .. } => {
                    tracing::debug!(step, "replay peer stalling");
                    std::future::pending::<()>().await;
                }
                Fault::FlipByte { .. } => {}
            }
        }

        match exchange.state() {
            ExchangeState::Completed => {
                tracing::trace!(steps = step, "replay complete");
                return;
            }
            ExchangeState::Failed => return,
            ExchangeState::ReadyToSend => {
                let Some(pdu) = exchange.outbound() else {
                    return;
                };
                let mut pdu = pdu.to_vec();
                for fault in faults.iter() {
                    if let Fault::FlipByte { step: at, offset } = *fault
                        && at == step
                    {
                        let index = offset % pdu.len();
                        pdu[index] ^= 0xff;
                    }
                }

                match transport.send(&pdu).await {
                    Ok(written) => {
                        if let Err(e) = exchange.on_sent(written) {
                            tracing::debug!(error = %e, "replay send rejected");
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(step, error = %e, "replay send failed");
                        return;
                    }
                }
            }
            ExchangeState::AwaitingInbound => match transport.recv().await {
                Ok(pdu) => {
                    if let Err(e) = exchange.on_inbound(&pdu) {
                        tracing::warn!(error = %e, "replay peer saw unexpected PDU");
                        return;
                    }
                }
                Err(_) => {
                    let e = exchange.on_hangup(HangupCondition::Hangup);
                    tracing::debug!(error = %e, "replay peer lost its link");
                    return;
                }
            },
        }
    }
}
