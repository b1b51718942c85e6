//! Batch runs: replayable power loss, isolation and the JSON report.

use std::sync::Arc;

use lfsperm_harness::{
    BlockDevice, BufferSink, Define, DefineOverride, FailureKind, Outcome, PowerlossSchedule,
    RunContext, RunReport, Runner, RunnerConfig, TestCase, TestFailure, TestFlags, TestId,
    TestRegistry, TestSuite, lfs_ensure, lfs_trace,
};

const BLOCKS: u32 = 4;

/// Erase and program the first few blocks with PRNG data, then sync.
/// Two power cycles per block.
fn write_blocks(ctx: &mut RunContext) -> Result<(), TestFailure> {
    let prog_size = usize::try_from(ctx.config().prog_size).map_err(|_| {
        TestFailure::assertion("prog_size does not fit usize")
    })?;
    let mut data = vec![0_u8; prog_size];
    for block in 0..BLOCKS {
        ctx.bd().erase(block)?;
        ctx.prng().fill_bytes(&mut data);
        ctx.bd().prog(block, 0, &data)?;
    }
    ctx.bd().sync()?;
    lfs_trace!(*ctx.trace(), "wrote {} blocks", BLOCKS);
    Ok(())
}

fn reentrant_registry() -> TestRegistry {
    TestRegistry::new().suite(
        TestSuite::builder("power")
            .path("tests/test_power.toml")
            .case(TestCase::new("write_blocks", write_blocks).flags(TestFlags::REENTRANT))
            .build()
            .expect("suite"),
    )
}

fn runner(config: RunnerConfig) -> Runner {
    Runner::new(config).expect("runner")
}

#[test]
fn linear_power_loss_replays_identically() {
    let registry = reentrant_registry();
    let config = RunnerConfig::new()
        .geometry("default")
        .powerloss(PowerlossSchedule::Linear);
    let first = runner(config.clone()).run_registry(&registry);
    let second = runner(config).run_registry(&registry);
    assert_eq!(first, second);

    let result = &first.results[0];
    assert_eq!(result.outcome, Outcome::Passed);
    let cycles_per_attempt = u64::from(BLOCKS) * 2;
    assert_eq!(result.powerlosses, cycles_per_attempt);
    // attempt k loses power on its (k+1)th cycle, so losses land on
    // triangular cycle counts
    let expected: Vec<u64> = (1..=cycles_per_attempt).map(|k| k * (k + 1) / 2).collect();
    assert_eq!(result.powerloss_cycles, expected);
    assert!(result.fingerprint.is_some());
    assert!(result.ops_digest.is_some());
}

#[test]
fn explicit_schedule_stops_injecting_after_its_last_point() {
    let registry = reentrant_registry();
    let report = runner(
        RunnerConfig::new()
            .geometry("default")
            .powerloss(PowerlossSchedule::Explicit(vec![3, 5])),
    )
    .run_registry(&registry);
    let result = &report.results[0];
    assert_eq!(result.outcome, Outcome::Passed);
    assert_eq!(result.powerlosses, 2);
    assert_eq!(result.powerloss_cycles, vec![3, 8]);
}

#[test]
fn power_loss_bound_fails_the_permutation() {
    let registry = reentrant_registry();
    let report = runner(
        RunnerConfig::new()
            .geometry("default")
            .powerloss(PowerlossSchedule::Linear)
            .max_powerlosses(3),
    )
    .run_registry(&registry);
    assert!(matches!(
        &report.results[0].outcome,
        Outcome::Failed { kind: FailureKind::PowerLoss, .. }
    ));
    assert_eq!(report.results[0].powerlosses, 3);
}

#[test]
fn non_reentrant_case_ignores_power_loss_schedule() {
    let registry = TestRegistry::new().suite(
        TestSuite::builder("plain")
            .case(TestCase::new("write_blocks", write_blocks))
            .build()
            .expect("suite"),
    );
    let report = runner(
        RunnerConfig::new()
            .geometry("default")
            .powerloss(PowerlossSchedule::Linear),
    )
    .run_registry(&registry);
    assert_eq!(report.results[0].outcome, Outcome::Passed);
    assert_eq!(report.results[0].powerlosses, 0);
}

#[test]
fn trace_lines_reach_the_configured_sink() {
    let sink = Arc::new(BufferSink::new());
    let report = runner(RunnerConfig::new().geometry("nor"))
        .with_trace(sink.clone())
        .run_registry(&reentrant_registry());
    assert!(report.is_success());
    let lines = sink.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with(":trace: wrote 4 blocks"), "{}", lines[0]);
}

fn sweep_registry() -> TestRegistry {
    TestRegistry::new().suite(
        TestSuite::builder("sweep")
            .case(
                TestCase::new("mixed", |ctx| {
                    let n = ctx.define_by_name("N")?;
                    lfs_ensure!(n % 5 != 3, "n = {n} is rejected");
                    if n == 4 {
                        panic!("n = 4 panics");
                    }
                    let bound = u32::try_from(n + 1).unwrap_or(1);
                    let _ = ctx.prng().next_below(bound);
                    ctx.bd().erase(0)?;
                    Ok(())
                })
                .define(Define::list("N", vec![0, 1, 2, 3, 4, 5, 6, 7, 8])),
            )
            .case(TestCase::new("after", |_| Ok(())))
            .build()
            .expect("suite"),
    )
}

#[test]
fn failures_and_panics_do_not_poison_the_batch() {
    let report = runner(RunnerConfig::new().geometry("default")).run_registry(&sweep_registry());
    assert_eq!(report.results.len(), 10);
    assert_eq!(report.failed, 3);
    assert_eq!(report.passed, 7);
    assert_eq!(
        report.rerun_ids(),
        vec![
            "sweep::mixed:3".to_owned(),
            "sweep::mixed:4".to_owned(),
            "sweep::mixed:8".to_owned(),
        ]
    );
    assert_eq!(report.results[9].id, TestId::permutation("sweep::after", 0));
    assert_eq!(report.results[9].outcome, Outcome::Passed);
}

#[test]
fn stop_on_failure_ends_the_batch_early() {
    let report = runner(RunnerConfig::new().geometry("default").stop_on_failure(true))
        .run_registry(&sweep_registry());
    assert_eq!(report.results.len(), 4);
    assert_eq!(report.failed, 1);
}

#[test]
fn parallel_run_matches_serial_run() {
    let config = RunnerConfig::new().geometry("default").geometry("nor");
    let serial = runner(config.clone()).run_registry(&sweep_registry());
    let parallel = runner(config.workers(4)).run_registry(&sweep_registry());
    assert_eq!(serial, parallel);
    assert_eq!(serial.results.len(), 20);
}

/// `BLOCK_CYCLES` resolves while the device is built, so a panic in its
/// callback happens before the body runs.
fn setup_panic_registry() -> TestRegistry {
    TestRegistry::new().suite(
        TestSuite::builder("setup")
            .case(
                TestCase::new("cycles", |_| Ok(())).define(Define::with(
                    "BLOCK_CYCLES",
                    8,
                    |_, i| {
                        assert!(i != 3, "sub-index 3 has no value");
                        Ok(i64::try_from(i).unwrap_or(0) * 100)
                    },
                )),
            )
            .case(TestCase::new("after", |_| Ok(())))
            .build()
            .expect("suite"),
    )
}

#[test]
fn setup_panic_in_parallel_run_keeps_every_result() {
    let registry = setup_panic_registry();
    let config = RunnerConfig::new().geometry("default");
    let serial = runner(config.clone()).run_registry(&registry);
    let parallel = runner(config.workers(4)).run_registry(&registry);
    assert_eq!(parallel, serial);
    assert_eq!(parallel.results.len(), 9);
    assert_eq!(parallel.passed, 8);
    assert_eq!(parallel.config_errors, 1);
    assert!(matches!(
        &parallel.results[3].outcome,
        Outcome::ConfigError { message } if message.contains("sub-index 3 has no value")
    ));
    assert_eq!(parallel.results[8].id, TestId::permutation("setup::after", 0));
}

#[test]
fn oversized_device_override_is_a_config_error() {
    let report = runner(
        RunnerConfig::new()
            .geometry("default")
            .define(DefineOverride::new("BLOCK_COUNT", vec![1_i64 << 60])),
    )
    .run_registry(&reentrant_registry());
    assert_eq!(report.results.len(), 1);
    assert!(matches!(&report.results[0].outcome, Outcome::ConfigError { .. }));
}

#[test]
fn same_case_name_in_two_suites_replays_the_right_one() {
    let registry = TestRegistry::new()
        .suite(
            TestSuite::builder("a")
                .case(TestCase::new("t", |_| Ok(())))
                .build()
                .expect("a"),
        )
        .suite(
            TestSuite::builder("b")
                .case(TestCase::new("t", |_| Err(TestFailure::assertion("b fails"))))
                .build()
                .expect("b"),
        );
    let runner = runner(RunnerConfig::new().geometry("default"));
    let report = runner.run_registry(&registry);
    assert_eq!(report.rerun_ids(), vec!["b::t:0".to_owned()]);
    assert_ne!(report.results[0].seed, report.results[1].seed);

    let id: TestId = report.rerun_ids()[0].parse().expect("id");
    let replay = runner.run_id(&registry, &id).expect("rerun");
    assert_eq!(replay.results, vec![report.results[1].clone()]);
    assert!(runner.run_id(&registry, &TestId::case("t")).is_err());
}

#[test]
fn report_round_trips_and_rerun_ids_reproduce_failures() {
    let registry = sweep_registry();
    let runner = runner(RunnerConfig::new().geometry("default"));
    let report = runner.run_registry(&registry);

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("report.json");
    report.write_json(&path).expect("write");
    let loaded = RunReport::read_json(&path).expect("read");
    assert_eq!(loaded, report);

    for (rerun, original) in loaded.rerun_ids().iter().zip(loaded.failures()) {
        let id: TestId = rerun.parse().expect("id");
        let replay = runner.run_id(&registry, &id).expect("rerun");
        assert_eq!(replay.results.len(), 1);
        assert_eq!(&replay.results[0], original);
    }
}

#[test]
fn report_with_foreign_schema_version_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("report.json");
    let mut report = RunReport::from_results(Vec::new());
    report.schema_version = 99;
    report.write_json(&path).expect("write");
    assert!(RunReport::read_json(&path).is_err());
}
