//! Runs registered cases one after another.

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::HarnessConfig;
use crate::diagnostics::{DiagnosticSink, TracingSink, TrafficLog};
use crate::error::TestFailure;
use crate::harness::ExchangeContext;
use crate::reporter::{Reporter, Summary, TestReport};
use crate::testcase::TestCase;

pub struct Runner {
    config: HarnessConfig,
    sink: Arc<dyn DiagnosticSink>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Runner {
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            sink: Arc::new(TracingSink),
            shutdown: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Abort the running case, and skip the rest, once `shutdown` turns
    /// `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run one test instance in its own context and wait for its report.
    pub async fn run_case(&self, case: &TestCase) -> TestReport {
        let (reporter, report) = Reporter::channel(case.name());

        match ExchangeContext::new(case, &self.config, self.sink.clone()) {
            Ok(context) => {
                let abort = context.abort_signal();
                let run = context.run(reporter);

                match self.shutdown.clone() {
                    Some(mut shutdown) => {
                        let on_shutdown = async move {
                            if shutdown.wait_for(|stop| *stop).await.is_ok() {
                                abort.abort();
                            }
                            std::future::pending::<()>().await
                        };
                        tokio::select! {
                            () = run => {}
                            () = on_shutdown => {}
                        }
                    }
                    None => run.await,
                }
            }
            Err(e) => {
                tracing::warn!(case = case.name(), error = %e, "test setup failed");
                reporter.report_fail(TestFailure::Setup(e), 0, TrafficLog::default());
            }
        }

        report.wait().await
    }

    /// Run cases in order. Once shutdown is requested the remaining cases
    /// are recorded as not run.
    pub async fn run_all<'a>(&self, cases: impl IntoIterator<Item = &'a TestCase>) -> Summary {
        let mut summary = Summary::default();
        for case in cases {
            if self.shutdown_requested() {
                summary.skip(case.name());
                continue;
            }
            summary.record(self.run_case(case).await);
        }
        summary
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|shutdown| *shutdown.borrow())
    }
}
