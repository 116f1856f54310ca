//! Outcome reporting.
//!
//! A [`Reporter`] is handed to each running context. Reporting consumes it,
//! so a test instance yields at most one verdict; a reporter dropped without
//! reporting surfaces as [`TestFailure::Lost`].

use std::process::ExitCode;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use crate::diagnostics::TrafficLog;
use crate::error::TestFailure;

#[derive(Debug)]
pub enum Verdict {
    Pass,
    Fail(TestFailure),
}

#[derive(Debug)]
pub struct TestReport {
    pub name: String,
    pub verdict: Verdict,
    /// Script steps completed before the verdict.
    pub steps: usize,
    pub elapsed: Duration,
    pub traffic: TrafficLog,
}

impl TestReport {
    pub fn is_pass(&self) -> bool {
        matches!(self.verdict, Verdict::Pass)
    }

    pub fn failure(&self) -> Option<&TestFailure> {
        match &self.verdict {
            Verdict::Pass => None,
            Verdict::Fail(failure) => Some(failure),
        }
    }
}

pub struct Reporter {
    name: String,
    started: Instant,
    tx: oneshot::Sender<TestReport>,
}

impl Reporter {
    pub fn channel(name: &str) -> (Reporter, ReportReceiver) {
        let (tx, rx) = oneshot::channel();
        let started = Instant::now();
        (
            Reporter {
                name: name.to_string(),
                started,
                tx,
            },
            ReportReceiver {
                name: name.to_string(),
                started,
                rx,
            },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn report_pass(self, steps: usize, traffic: TrafficLog) {
        self.send(Verdict::Pass, steps, traffic);
    }

    pub fn report_fail(self, failure: TestFailure, steps: usize, traffic: TrafficLog) {
        self.send(Verdict::Fail(failure), steps, traffic);
    }

    fn send(self, verdict: Verdict, steps: usize, traffic: TrafficLog) {
        let report = TestReport {
            name: self.name,
            verdict,
            steps,
            elapsed: self.started.elapsed(),
            traffic,
        };
        if self.tx.send(report).is_err() {
            tracing::debug!("report receiver dropped");
        }
    }
}

pub struct ReportReceiver {
    name: String,
    started: Instant,
    rx: oneshot::Receiver<TestReport>,
}

impl ReportReceiver {
    pub async fn wait(self) -> TestReport {
        match self.rx.await {
            Ok(report) => report,
            Err(_) => TestReport {
                name: self.name,
                verdict: Verdict::Fail(TestFailure::Lost),
                steps: 0,
                elapsed: self.started.elapsed(),
                traffic: TrafficLog::default(),
            },
        }
    }
}

/// Aggregated outcome of a run.
#[derive(Debug, Default)]
pub struct Summary {
    reports: Vec<TestReport>,
    not_run: Vec<String>,
}

impl Summary {
    pub fn record(&mut self, report: TestReport) {
        self.reports.push(report);
    }

    /// Note a case that was never started.
    pub fn skip(&mut self, name: &str) {
        self.not_run.push(name.to_string());
    }

    pub fn reports(&self) -> &[TestReport] {
        &self.reports
    }

    pub fn not_run(&self) -> &[String] {
        &self.not_run
    }

    pub fn passed(&self) -> usize {
        self.reports.iter().filter(|r| r.is_pass()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.not_run.is_empty()
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}
