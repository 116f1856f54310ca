//! Scripted PDU conformance runner.
//!
//! Replays the built-in catalog against the reference replay peer.
//!
//! # Usage
//!
//! Run everything:
//! ```bash
//! pdureplay-conformance
//! ```
//!
//! Run one case with PDU hex dumps:
//! ```bash
//! pdureplay-conformance --case /TP/HGRF/RH/BV-08-I --debug
//! ```
//!
//! List cases matching a filter:
//! ```bash
//! pdureplay-conformance --list --prefix /TP/HGRF/
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use owo_colors::OwoColorize;
use pdureplay_conformance::config::Args;
use pdureplay_conformance::registry::Registry;
use pdureplay_conformance::replay::ReplayFactory;
use pdureplay_conformance::reporter::{Summary, TestReport, Verdict};
use pdureplay_conformance::runner::Runner;
use pdureplay_conformance::testcase::TestCase;
use pdureplay_conformance::{tests, tracing_setup};
use tokio::sync::watch;

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_setup::init(args.verbosity());

    let registry = match Registry::with_catalog(Arc::new(ReplayFactory::new())) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("{}: {e}", "error".red());
            return ExitCode::from(2);
        }
    };

    if args.list {
        list_cases(&registry, &args);
        return ExitCode::SUCCESS;
    }

    let cases: Vec<&TestCase> = match &args.case {
        Some(name) => match registry.get(name) {
            Some(case) => vec![case],
            None => {
                eprintln!("{}: unknown test case: {name}", "error".red());
                return ExitCode::from(2);
            }
        },
        None => registry.select(&args.filter()),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{}: failed to create runtime: {e}", "error".red());
            return ExitCode::from(2);
        }
    };

    let summary = runtime.block_on(async {
        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, aborting");
                let _ = stop_tx.send(true);
            }
        });

        let runner = Runner::new(args.harness_config()).with_shutdown(stop_rx);
        let mut summary = Summary::default();
        for case in cases {
            if runner.shutdown_requested() {
                summary.skip(case.name());
                continue;
            }
            let report = runner.run_case(case).await;
            print_report(&report);
            summary.record(report);
        }
        summary
    });

    print_summary(&summary);
    summary.exit_code()
}

fn list_cases(registry: &Registry, args: &Args) {
    let filter = args.filter();
    let mut current_profile = "";
    let mut count = 0;

    for (name, profile) in tests::list_all() {
        if registry.get(name).is_none() || !filter.matches(name) {
            continue;
        }
        if profile != current_profile {
            if !current_profile.is_empty() {
                println!();
            }
            println!("## {profile}");
            current_profile = profile;
        }
        println!("  {name}");
        count += 1;
    }

    println!("\nTotal: {count} tests");
}

fn print_report(report: &TestReport) {
    match &report.verdict {
        Verdict::Pass => println!(
            "{} {} ({} steps, {:?})",
            "PASS".green(),
            report.name,
            report.steps,
            report.elapsed
        ),
        Verdict::Fail(failure) => {
            println!("{} {}", "FAIL".red(), report.name);
            println!("  {failure}");
            if !report.traffic.is_empty() {
                print!("{}", report.traffic);
            }
        }
    }
}

fn print_summary(summary: &Summary) {
    let passed = format!("{} passed", summary.passed());
    let failed = format!("{} failed", summary.failed());
    let not_run = format!("{} not run", summary.not_run().len());

    println!();
    println!(
        "{}, {}, {}",
        passed.green(),
        if summary.failed() > 0 {
            failed.red().to_string()
        } else {
            failed
        },
        if summary.not_run().is_empty() {
            not_run
        } else {
            not_run.yellow().to_string()
        }
    );
}
