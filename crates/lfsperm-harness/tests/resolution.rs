//! Layered define resolution through suites, plans and overrides.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use lfsperm_harness::{
    CasePlan, Define, DefineId, DefineOverride, DefineTable, Geometry, PermError, Source,
    TestCase, TestSuite,
};

fn geometry(name: &str) -> Geometry {
    Geometry::by_name(name).expect("preset")
}

fn plan_for(
    suite: &TestSuite,
    case: &str,
    geometries: &[Geometry],
    overrides: &[DefineOverride],
) -> CasePlan {
    let case = suite.case(case).expect("registered case");
    CasePlan::for_case(case, suite.table(), geometries, overrides).expect("plan")
}

#[test]
fn nor_geometry_derives_block_count_and_cache_size() {
    let plan = CasePlan::new("t", Arc::new(DefineTable::implicit()), &[], &[geometry("nor")], &[])
        .expect("plan");
    assert_eq!(plan.count(), 1);
    let mut set = plan.define_set(0).expect("in range");
    assert_eq!(set.get(DefineId::BLOCK_SIZE).expect("block size"), 4096);
    assert_eq!(set.get(DefineId::BLOCK_COUNT).expect("block count"), 256);
    assert_eq!(set.get(DefineId::CACHE_SIZE).expect("cache size"), 16);
    assert_eq!(set.source(DefineId::BLOCK_SIZE), Some(Source::Geometry));
    assert_eq!(set.source(DefineId::BLOCK_COUNT), Some(Source::Implicit));
}

#[test]
fn every_preset_resolves_to_a_valid_configuration() {
    for preset in lfsperm_harness::GEOMETRIES {
        let plan = CasePlan::new("t", Arc::new(DefineTable::implicit()), &[], &[preset], &[])
            .expect("plan");
        let config = plan
            .define_set(0)
            .and_then(|mut set| set.test_config())
            .expect("resolves");
        config.validate().expect("preset is mountable");
        assert_eq!(config.block_size * config.block_count, 1024 * 1024, "{}", preset.name);
    }
}

#[test]
fn case_define_shadows_geometry() {
    let suite = TestSuite::builder("s")
        .case(TestCase::new("small_blocks", |_| Ok(())).define(Define::fixed("BLOCK_SIZE", 1024)))
        .build()
        .expect("suite");
    let plan = plan_for(&suite, "small_blocks", &[geometry("nor")], &[]);
    let mut set = plan.define_set(0).expect("in range");
    assert_eq!(set.get(DefineId::BLOCK_SIZE).expect("block size"), 1024);
    assert_eq!(set.get(DefineId::BLOCK_COUNT).expect("block count"), 1024);
    assert_eq!(set.source(DefineId::BLOCK_SIZE), Some(Source::Case));
}

#[test]
fn override_shadows_case_define_and_replaces_its_dimension() {
    let suite = TestSuite::builder("s")
        .case(TestCase::new("t", |_| Ok(())).define(Define::list("N", vec![1, 2])))
        .build()
        .expect("suite");
    let overrides = [DefineOverride::new("N", vec![7, 8, 9])];
    let plan = plan_for(&suite, "t", &[geometry("default")], &overrides);
    assert_eq!(plan.count(), 3);
    let values: Vec<i64> = (0..plan.count())
        .map(|p| {
            let mut set = plan.define_set(p).expect("in range");
            assert_eq!(set.source(DefineId(15)), Some(Source::Override));
            set.get_by_name("N").expect("N")
        })
        .collect();
    assert_eq!(values, vec![7, 8, 9]);
}

#[test]
fn override_of_implicit_define_feeds_dependent_defaults() {
    let overrides = [DefineOverride::new("DISK_SIZE", vec![64 * 1024])];
    let plan = CasePlan::new(
        "t",
        Arc::new(DefineTable::implicit()),
        &[],
        &[geometry("default")],
        &overrides,
    )
    .expect("plan");
    let mut set = plan.define_set(0).expect("in range");
    assert_eq!(set.get(DefineId::BLOCK_COUNT).expect("block count"), 128);
}

#[test]
fn override_naming_an_undeclared_define_is_ignored() {
    let suite = TestSuite::builder("s")
        .case(TestCase::new("t", |_| Ok(())))
        .build()
        .expect("suite");
    let overrides = [DefineOverride::new("NOT_DECLARED", vec![1, 2, 3])];
    let plan = plan_for(&suite, "t", &[geometry("default")], &overrides);
    assert_eq!(plan.count(), 1);
}

#[test]
fn mutual_dependency_fails_fast_with_the_cycle() {
    let suite = TestSuite::builder("s")
        .case(
            TestCase::new("cyclic", |_| Ok(()))
                .define(Define::expr("A", |d| d.get_by_name("B")))
                .define(Define::expr("B", |d| d.get_by_name("A"))),
        )
        .build()
        .expect("suite");
    let plan = plan_for(&suite, "cyclic", &[geometry("default")], &[]);
    let mut set = plan.define_set(0).expect("in range");
    let err = set.get_by_name("A").expect_err("A and B depend on each other");
    match err {
        PermError::CyclicDefine { chain } => assert_eq!(chain, "A -> B -> A"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!set.is_resolved(DefineId(15)));
}

#[test]
fn dependent_define_callback_runs_once_per_permutation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let suite = TestSuite::builder("s")
        .case(
            TestCase::new("t", |_| Ok(()))
                .define(Define::expr("HALF", move |d| {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Ok(d.get(DefineId::BLOCK_SIZE)? / 2)
                }))
                .define(Define::expr("QUARTER", |d| Ok(d.get_by_name("HALF")? / 2))),
        )
        .build()
        .expect("suite");
    let plan = plan_for(&suite, "t", &[geometry("default")], &[]);
    let mut set = plan.define_set(0).expect("in range");
    assert_eq!(set.get_by_name("QUARTER").expect("quarter"), 128);
    assert_eq!(set.get_by_name("HALF").expect("half"), 256);
    assert_eq!(set.get_by_name("HALF").expect("half"), 256);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let mut next = plan.define_set(0).expect("fresh set");
    assert_eq!(next.get_by_name("HALF").expect("half"), 256);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn suite_define_absent_from_case_is_undefined() {
    let suite = TestSuite::builder("s")
        .case(TestCase::new("has_n", |_| Ok(())).define(Define::fixed("N", 4)))
        .case(TestCase::new("no_n", |_| Ok(())))
        .build()
        .expect("suite");
    let plan = plan_for(&suite, "no_n", &[geometry("default")], &[]);
    let mut set = plan.define_set(0).expect("in range");
    assert!(matches!(
        set.get_by_name("N"),
        Err(PermError::UndefinedDefine { name }) if name == "N"
    ));
    assert!(matches!(
        set.get_by_name("M"),
        Err(PermError::UnknownDefine { .. })
    ));
}

#[test]
fn geometry_sweep_is_the_lowest_digit() {
    let suite = TestSuite::builder("s")
        .case(TestCase::new("t", |_| Ok(())).define(Define::list("N", vec![1, 2])))
        .build()
        .expect("suite");
    let plan = plan_for(&suite, "t", &[geometry("nor"), geometry("nand")], &[]);
    assert_eq!(plan.count(), 4);
    let names: Vec<&str> = (0..4)
        .map(|p| plan.geometry(p).expect("in range").name)
        .collect();
    assert_eq!(names, vec!["nor", "nand", "nor", "nand"]);
    assert!(matches!(
        plan.geometry(4),
        Err(PermError::PermutationOutOfRange { index: 4, count: 4 })
    ));
}
