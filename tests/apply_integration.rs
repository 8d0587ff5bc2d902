//! Integration tests for query and apply against real repositories.
//!
//! These tests drive the engine with [`Git`] as the object store and the
//! built-in evaluator, then inspect the result with git2.

mod common;

use chrono::{FixedOffset, TimeZone};

use qyt::core::object::Signature;
use qyt::engine::{self, ApplyOptions, BranchOutcome, CancelToken, EngineError, QueryOptions};
use qyt::query::Yq;

use common::TestRepo;

fn author() -> Signature {
    let when = FixedOffset::east_opt(0)
        .unwrap()
        .timestamp_opt(1_700_000_000, 0)
        .unwrap();
    Signature::new("Test Author", "author@example.com", when)
}

fn options(query: &str, prefix: &str) -> ApplyOptions {
    let mut options = ApplyOptions::new(query, author());
    options.new_branch_prefix = prefix.to_string();
    options
}

/// `main` with `a.yaml` and `b/b.yaml`.
fn two_file_repo() -> TestRepo {
    let repo = TestRepo::new();
    repo.commit_branch("main", &[("a.yaml", "name: x\n"), ("b/b.yaml", "name: y\n")]);
    repo
}

// =============================================================================
// End to end
// =============================================================================

#[test]
fn apply_creates_prefixed_branch_and_leaves_source_untouched() {
    let repo = two_file_repo();
    let main_tip = repo.tip("main").unwrap();
    let main_tree = repo.tree_of("main");

    let report = engine::apply(
        &repo.git(),
        &Yq::new(),
        &options(r#".name = "z""#, "out-"),
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(report.committed().count(), 1);
    assert_eq!(repo.read_file("out-main", "a.yaml").as_deref(), Some("name: z\n"));
    assert_eq!(repo.read_file("out-main", "b/b.yaml").as_deref(), Some("name: z\n"));

    assert_eq!(repo.tip("main").unwrap(), main_tip);
    assert_eq!(repo.tree_of("main"), main_tree);

    let (message, parent) = repo.head_commit("out-main");
    assert_eq!(message, r#"run yq ".name = \"z\"" on main"#);
    assert_eq!(parent.as_deref(), Some(main_tip.as_str()));
}

#[test]
fn reported_commit_is_the_branch_tip() {
    let repo = two_file_repo();
    let report = engine::apply(
        &repo.git(),
        &Yq::new(),
        &options(r#".name = "z""#, "qyt/"),
        &CancelToken::new(),
    )
    .unwrap();

    let BranchOutcome::Committed {
        reference, commit, ..
    } = &report.outcomes[0]
    else {
        panic!("expected a commit");
    };
    assert_eq!(reference.as_str(), "refs/heads/qyt/main");
    assert_eq!(repo.tip("qyt/main").unwrap(), commit.as_str());
}

#[test]
fn query_reads_every_matching_file() {
    let repo = two_file_repo();
    repo.commit_branch("rel", &[("a.yaml", "name: r\n"), ("README.md", "# r\n")]);

    let mut out = Vec::new();
    let summary = engine::query(
        &repo.git(),
        &Yq::new(),
        &QueryOptions::new(".name"),
        &CancelToken::new(),
        &mut out,
    )
    .unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "x\ny\nr\n");
    assert_eq!(summary.branches, 2);
    assert_eq!(summary.files, 3);
}

// =============================================================================
// Object sharing
// =============================================================================

#[test]
fn unchanged_subtrees_are_shared() {
    let repo = TestRepo::new();
    repo.commit_branch(
        "main",
        &[
            ("a.yaml", "name: x\n"),
            ("docs/readme.txt", "docs\n"),
            ("c/d.json", "{}\n"),
        ],
    );

    engine::apply(
        &repo.git(),
        &Yq::new(),
        &options(r#".name = "z""#, "out-"),
        &CancelToken::new(),
    )
    .unwrap();

    assert_ne!(repo.entry_id("out-main", "a.yaml"), repo.entry_id("main", "a.yaml"));
    assert_eq!(repo.entry_id("out-main", "docs"), repo.entry_id("main", "docs"));
    assert_eq!(repo.entry_id("out-main", "c"), repo.entry_id("main", "c"));
}

#[test]
fn identical_output_across_branches_is_stored_once() {
    let repo = TestRepo::new();
    repo.commit_branch("main", &[("a.yaml", "name: x\n"), ("m.txt", "m\n")]);
    repo.commit_branch("rel", &[("a.yaml", "name: y\n"), ("r.txt", "r\n")]);
    let before = repo.object_count();

    let report = engine::apply(
        &repo.git(),
        &Yq::new(),
        &options(r#".name = "z""#, "out-"),
        &CancelToken::new(),
    )
    .unwrap();

    // one blob, two trees, two commits
    assert_eq!(report.objects_written, 5);
    assert_eq!(repo.object_count(), before + 5);
    assert_eq!(
        repo.entry_id("out-main", "a.yaml"),
        repo.entry_id("out-rel", "a.yaml")
    );
}

#[test]
fn unchanged_output_writes_nothing() {
    let repo = two_file_repo();
    let before = repo.object_count();
    let branches = repo.branches();

    let report = engine::apply(
        &repo.git(),
        &Yq::new(),
        &options(".", "out-"),
        &CancelToken::new(),
    )
    .unwrap();

    assert!(report.is_noop());
    assert_eq!(report.objects_written, 0);
    assert_eq!(repo.object_count(), before);
    assert_eq!(repo.branches(), branches);
}

// =============================================================================
// Conflicts
// =============================================================================

#[test]
fn existing_destination_is_refused() {
    let repo = two_file_repo();
    let main_tip = repo.tip("main").unwrap();
    repo.create_ref("qyt/main", &main_tip);
    let before = repo.object_count();

    let err = engine::apply(
        &repo.git(),
        &Yq::new(),
        &options(r#".name = "z""#, "qyt/"),
        &CancelToken::new(),
    )
    .unwrap_err();

    assert!(matches!(err, EngineError::BranchExists { .. }));
    assert_eq!(repo.object_count(), before);
    assert_eq!(repo.tip("qyt/main").unwrap(), main_tip);
}

#[test]
fn existing_destination_is_moved_with_override() {
    let repo = two_file_repo();
    let main_tip = repo.tip("main").unwrap();
    repo.create_ref("qyt/main", &main_tip);

    let mut options = options(r#".name = "z""#, "qyt/");
    options.allow_override = true;
    let report = engine::apply(&repo.git(), &Yq::new(), &options, &CancelToken::new()).unwrap();

    let BranchOutcome::Committed { commit, .. } = &report.outcomes[0] else {
        panic!("expected a commit");
    };
    assert_eq!(repo.tip("qyt/main").unwrap(), commit.as_str());
    assert_eq!(repo.read_file("qyt/main", "a.yaml").as_deref(), Some("name: z\n"));
}

#[test]
fn failing_branch_leaves_repository_untouched() {
    let repo = two_file_repo();
    repo.commit_branch("zzz", &[("bad.yaml", "a: [1, 2\n")]);
    let before = repo.object_count();
    let branches = repo.branches();

    let err = engine::apply(
        &repo.git(),
        &Yq::new(),
        &options(r#".name = "z""#, "out-"),
        &CancelToken::new(),
    )
    .unwrap_err();

    assert!(matches!(err, EngineError::Evaluation { .. }));
    assert_eq!(repo.object_count(), before);
    assert_eq!(repo.branches(), branches);
}
