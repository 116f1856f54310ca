//! End-to-end runs of the exchange context against replay and hand-written
//! peers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use pdureplay_conformance::config::HarnessConfig;
use pdureplay_conformance::diagnostics::{DiagnosticSink, NullSink};
use pdureplay_conformance::error::{SetupError, TestFailure};
use pdureplay_conformance::peer::{DeviceInfo, Peer, PeerFactory, PeerLink};
use pdureplay_conformance::registry::Registry;
use pdureplay_conformance::replay::{Fault, ReplayFactory};
use pdureplay_conformance::reporter::{TestReport, Verdict};
use pdureplay_conformance::runner::Runner;
use pdureplay_conformance::testcase::TestCase;
use pdureplay_core::{Direction, ExchangeError, HangupCondition, Script, TransportKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const DISCOVER: &[u8] = &[0x10, 0x01, 0x00, 0xff, 0xff, 0x00, 0x28];
const SERVICES: &[u8] = &[
    0x11, 0x06, 0x01, 0x00, 0x04, 0x00, 0x12, 0x18, 0x05, 0x00, 0x08, 0x00, 0x12, 0x18,
];

const KINDS: [TransportKind; 2] = [TransportKind::Mem, TransportKind::Stream];

fn runner(kind: TransportKind) -> Runner {
    Runner::new(
        HarnessConfig::default()
            .with_transport(kind)
            .with_step_timeout(Some(Duration::from_secs(2))),
    )
    .with_sink(Arc::new(NullSink))
}

fn catalog_case(name: &str, factory: ReplayFactory) -> TestCase {
    let registry = Registry::with_catalog(Arc::new(factory)).unwrap();
    registry.get(name).unwrap().clone()
}

fn failure(report: &TestReport) -> &TestFailure {
    match &report.verdict {
        Verdict::Fail(failure) => failure,
        Verdict::Pass => panic!("{} unexpectedly passed", report.name),
    }
}

/// Reads one request and answers it with a fixed reply.
struct Responder {
    reply: &'static [u8],
    task: Option<JoinHandle<()>>,
}

impl Peer for Responder {
    fn attach(&mut self, link: PeerLink) -> Result<(), SetupError> {
        let reply = self.reply;
        let transport = link.into_transport();
        self.task = Some(tokio::spawn(async move {
            if transport.recv().await.is_ok() {
                let _ = transport.send(reply).await;
            }
            // Keep the endpoint open until detached.
            std::future::pending::<()>().await;
        }));
        Ok(())
    }

    fn detach(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn responder_case(reply: &'static [u8]) -> TestCase {
    let script = Script::builder().send(DISCOVER).expect(SERVICES).build().unwrap();
    let factory = move |_: &TestCase, _: &DeviceInfo| {
        Ok::<_, SetupError>(Box::new(Responder { reply, task: None }) as Box<dyn Peer>)
    };
    TestCase::new("/TP/DISCOVER", script, Arc::new(factory))
}

#[tokio::test]
async fn request_response_passes_in_two_steps() {
    for kind in KINDS {
        let report = runner(kind).run_case(&responder_case(SERVICES)).await;
        assert!(report.is_pass(), "{kind}: {:?}", report.verdict);
        assert_eq!(report.steps, 2);
        assert_eq!(report.traffic.len(), 2);
        assert_eq!(report.traffic.entries()[0].direction, Direction::Outbound);
        assert_eq!(report.traffic.entries()[1].data.as_ref(), SERVICES);
    }
}

#[tokio::test]
async fn trailing_byte_change_fails_at_step_one() {
    const BAD_REPLY: &[u8] = &[
        0x11, 0x06, 0x01, 0x00, 0x04, 0x00, 0x12, 0x18, 0x05, 0x00, 0x08, 0x00, 0x12, 0x19,
    ];

    for kind in KINDS {
        let report = runner(kind).run_case(&responder_case(BAD_REPLY)).await;
        match failure(&report) {
            TestFailure::Exchange(ExchangeError::Mismatch {
                step,
                expected,
                actual,
            }) => {
                assert_eq!(*step, 1);
                assert_eq!(expected.as_ref(), SERVICES);
                assert_eq!(actual.as_ref(), BAD_REPLY);
            }
            other => panic!("{kind}: expected mismatch, got {other}"),
        }
    }
}

#[tokio::test]
async fn catalog_cases_pass_against_replay_peer() {
    let registry = Registry::with_catalog(Arc::new(ReplayFactory::new())).unwrap();

    for kind in KINDS {
        let summary = runner(kind).run_all(registry.cases()).await;
        for report in summary.reports() {
            assert!(report.is_pass(), "{}: {:?}", report.name, report.verdict);
            let case = registry.get(&report.name).unwrap();
            assert_eq!(report.steps, case.script().len());
            assert_eq!(report.traffic.len(), case.script().len());
        }
        assert_eq!(summary.passed(), registry.len());
        assert!(summary.is_success());
    }
}

#[tokio::test]
async fn flipped_byte_is_localized_to_its_step() {
    let name = "/TP/HGRF/RH/BV-08-I";
    let script = catalog_case(name, ReplayFactory::new()).script().clone();

    for step in script.indices(Direction::Inbound) {
        let case = catalog_case(
            name,
            ReplayFactory::with_faults([Fault::FlipByte { step, offset: 2 }]),
        );
        let report = runner(TransportKind::Mem).run_case(&case).await;

        match failure(&report) {
            TestFailure::Exchange(err @ ExchangeError::Mismatch { .. }) => {
                assert_eq!(err.step(), step);
            }
            other => panic!("step {step}: expected mismatch, got {other}"),
        }
        assert_eq!(report.steps, step);
    }
}

#[tokio::test]
async fn hangup_before_inbound_step_is_disconnect() {
    for kind in KINDS {
        let case = catalog_case(
            "/TP/HGRF/RH/BV-01-I",
            ReplayFactory::with_faults([Fault::HangUp { step: 4 }]),
        );
        let report = runner(kind).run_case(&case).await;

        assert!(matches!(
            failure(&report),
            TestFailure::Exchange(ExchangeError::Disconnected {
                step: 4,
                condition: HangupCondition::Hangup,
            })
        ));
    }
}

#[tokio::test]
async fn hangup_before_outbound_step_fails() {
    for kind in KINDS {
        let case = catalog_case(
            "/TP/HGRF/RH/BV-01-I",
            ReplayFactory::with_faults([Fault::HangUp { step: 3 }]),
        );
        let report = runner(kind).run_case(&case).await;

        assert!(!report.is_pass());
        assert_eq!(failure(&report).step(), Some(3));
    }
}

#[tokio::test]
async fn stalled_peer_times_out() {
    let case = catalog_case(
        "/TP/HGRF/RH/BV-08-I",
        ReplayFactory::with_faults([Fault::Stall { step: 2 }]),
    );
    let runner = Runner::new(
        HarnessConfig::default().with_step_timeout(Some(Duration::from_millis(50))),
    )
    .with_sink(Arc::new(NullSink));

    let report = runner.run_case(&case).await;
    match failure(&report) {
        TestFailure::Timeout { step, after } => {
            assert_eq!(*step, 2);
            assert_eq!(*after, Duration::from_millis(50));
        }
        other => panic!("expected timeout, got {other}"),
    }
}

#[tokio::test]
async fn empty_script_passes_without_traffic() {
    let mut registry = Registry::new();
    let case = registry
        .register("/TP/EMPTY", Script::empty(), Arc::new(ReplayFactory::new()))
        .unwrap()
        .clone();

    for kind in KINDS {
        let report = runner(kind).run_case(&case).await;
        assert!(report.is_pass());
        assert_eq!(report.steps, 0);
        assert!(report.traffic.is_empty());
    }
}

#[tokio::test]
async fn construction_failure_is_reported_before_any_step() {
    let factory = |_: &TestCase, _: &DeviceInfo| {
        Err::<Box<dyn Peer>, _>(SetupError::Create("no adapter".to_string()))
    };
    let case = TestCase::new(
        "/TP/NO-PEER",
        Script::builder().expect(DISCOVER).build().unwrap(),
        Arc::new(factory),
    );

    let report = runner(TransportKind::Mem).run_case(&case).await;
    assert!(matches!(
        failure(&report),
        TestFailure::Setup(SetupError::Create(_))
    ));
    assert_eq!(report.steps, 0);
    assert!(report.traffic.is_empty());
}

struct RefusingPeer {
    detached: Arc<AtomicUsize>,
}

impl Peer for RefusingPeer {
    fn attach(&mut self, _link: PeerLink) -> Result<(), SetupError> {
        Err(SetupError::Attach("client refused".to_string()))
    }

    fn detach(&mut self) {
        self.detached.fetch_add(1, Ordering::SeqCst);
    }
}

struct RefusingFactory {
    detached: Arc<AtomicUsize>,
}

impl PeerFactory for RefusingFactory {
    fn create(&self, _case: &TestCase, device: &DeviceInfo) -> Result<Box<dyn Peer>, SetupError> {
        assert_eq!(device, &DeviceInfo::default());
        Ok(Box::new(RefusingPeer {
            detached: self.detached.clone(),
        }))
    }
}

#[tokio::test]
async fn attach_failure_releases_peer() {
    let detached = Arc::new(AtomicUsize::new(0));
    let case = TestCase::new(
        "/TP/REFUSE",
        Script::builder().expect(DISCOVER).build().unwrap(),
        Arc::new(RefusingFactory {
            detached: detached.clone(),
        }),
    );

    let report = runner(TransportKind::Stream).run_case(&case).await;
    assert!(matches!(
        failure(&report),
        TestFailure::Setup(SetupError::Attach(_))
    ));
    assert_eq!(detached.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn shutdown_aborts_running_case_and_skips_the_rest() {
    let registry = Registry::with_catalog(Arc::new(ReplayFactory::with_faults([
        Fault::Stall { step: 0 },
    ])))
    .unwrap();
    let (stop_tx, stop_rx) = watch::channel(false);
    let runner = Runner::new(HarnessConfig::default().with_step_timeout(None))
        .with_sink(Arc::new(NullSink))
        .with_shutdown(stop_rx);

    stop_tx.send(true).unwrap();
    let report = runner.run_case(&registry.cases()[0]).await;
    assert!(matches!(
        failure(&report),
        TestFailure::Aborted { step: 0 }
    ));

    let summary = runner.run_all(registry.cases()).await;
    assert!(summary.reports().is_empty());
    assert_eq!(summary.not_run().len(), registry.len());
    assert!(!summary.is_success());
}

#[derive(Default)]
struct RecordingSink {
    seen: Mutex<Vec<(String, Direction, Vec<u8>)>>,
}

impl DiagnosticSink for RecordingSink {
    fn pdu(&self, case: &str, direction: Direction, data: &[u8]) {
        self.seen
            .lock()
            .push((case.to_string(), direction, data.to_vec()));
    }
}

#[tokio::test]
async fn sink_sees_every_pdu_with_direction() {
    let sink = Arc::new(RecordingSink::default());
    let runner = Runner::new(HarnessConfig::default()).with_sink(sink.clone());

    let report = runner.run_case(&responder_case(SERVICES)).await;
    assert!(report.is_pass());

    let seen = sink.seen.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(
        seen[0],
        ("/TP/DISCOVER".to_string(), Direction::Outbound, DISCOVER.to_vec())
    );
    assert_eq!(
        seen[1],
        ("/TP/DISCOVER".to_string(), Direction::Inbound, SERVICES.to_vec())
    );
}
