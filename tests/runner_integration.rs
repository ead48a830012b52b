//! Integration tests: forget walks over plan and state fixtures.
//!
//! Each test copies the fixtures into a temp dir, runs the same path the
//! `terrawalk forget` command takes, and inspects the state file afterwards.

use std::path::{Path, PathBuf};
use terrawalk::{build_forget_graph, run_forget, ForgetOptions, PlanFile, TerrawalkConfig};
use terrawalk_core::ObjectStatus;
use terrawalk_graph::{FileStateStore, GraphNode, StateStore};
use tokio_util::sync::CancellationToken;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR")))
}

struct Workspace {
    _dir: tempfile::TempDir,
    plan: PathBuf,
    state: PathBuf,
}

fn workspace() -> Workspace {
    let dir = tempfile::tempdir().unwrap();
    let plan = dir.path().join("plan.json");
    let state = dir.path().join("state.json");
    std::fs::copy(fixture("plan.json"), &plan).unwrap();
    std::fs::copy(fixture("state.json"), &state).unwrap();
    Workspace {
        _dir: dir,
        plan,
        state,
    }
}

fn config() -> TerrawalkConfig {
    TerrawalkConfig::load(&fixture("terrawalk.toml"))
}

fn options(ws: &Workspace, dry_run: bool) -> ForgetOptions {
    ForgetOptions {
        plan_path: ws.plan.clone(),
        state_path: ws.state.clone(),
        parallelism: None,
        dry_run,
    }
}

async fn tracked(path: &Path) -> Vec<String> {
    let store = FileStateStore::open(path).await.unwrap();
    let mut addrs: Vec<String> = store
        .addresses()
        .await
        .iter()
        .map(|a| a.to_string())
        .collect();
    addrs.sort();
    addrs
}

// ===========================================================================
// Forget walk
// ===========================================================================

#[tokio::test]
async fn forget_walk_removes_planned_instances() {
    let ws = workspace();
    let report = run_forget(&config(), &options(&ws, false), CancellationToken::new())
        .await
        .unwrap();

    assert!(report.summary.success(), "{}", report.summary.diagnostics);
    // three forget nodes and one provider node
    assert_eq!(report.summary.completed, 4);
    assert_eq!(report.forgotten.len(), 3);

    let persisted = report.persisted.expect("state should be written");
    assert_eq!(persisted.serial, 5);
    assert_eq!(
        persisted.lineage.to_string(),
        "3f1c2b7e-5d4a-4c1e-9a0b-6e2d8f7c1a55"
    );

    assert_eq!(tracked(&ws.state).await, vec!["aws_instance.keep"]);
    let store = FileStateStore::open(&ws.state).await.unwrap();
    let keep = store.resources().await.remove(0);
    assert_eq!(keep.object.status, ObjectStatus::Tainted);
    assert!(keep.provider.is_some());
}

#[tokio::test]
async fn forget_walk_twice_changes_nothing_second_time() {
    let ws = workspace();
    run_forget(&config(), &options(&ws, false), CancellationToken::new())
        .await
        .unwrap();

    let report = run_forget(&config(), &options(&ws, false), CancellationToken::new())
        .await
        .unwrap();
    assert!(report.summary.success());
    assert!(report.forgotten.is_empty());
    assert!(report.summary.diagnostics.is_empty());
    assert_eq!(tracked(&ws.state).await, vec!["aws_instance.keep"]);
}

#[tokio::test]
async fn dry_run_leaves_state_file_untouched() {
    let ws = workspace();
    let original = std::fs::read(&ws.state).unwrap();

    let report = run_forget(&config(), &options(&ws, true), CancellationToken::new())
        .await
        .unwrap();
    assert!(report.persisted.is_none());
    assert_eq!(report.forgotten.len(), 3);
    assert_eq!(std::fs::read(&ws.state).unwrap(), original);
}

#[tokio::test]
async fn unknown_provider_fails_managed_nodes_only() {
    let ws = workspace();
    let report = run_forget(
        &TerrawalkConfig::default(),
        &options(&ws, false),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(!report.summary.success());
    assert!(report
        .summary
        .diagnostics
        .err()
        .unwrap()
        .contains("no provider registered"));
    // the data source needs no provider and is still forgotten
    assert_eq!(report.forgotten.len(), 1);
    assert_eq!(report.forgotten[0].to_string(), "data.aws_ami.ubuntu");
    // partial progress is persisted
    assert!(report.persisted.is_some());
    assert_eq!(
        tracked(&ws.state).await,
        vec!["aws_instance.keep", "aws_instance.web", "aws_vpc.main"]
    );
}

#[tokio::test]
async fn cancelled_walk_forgets_nothing() {
    let ws = workspace();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = run_forget(&config(), &options(&ws, false), cancel)
        .await
        .unwrap();
    assert!(report.summary.cancelled);
    assert!(report.forgotten.is_empty());
    assert_eq!(tracked(&ws.state).await.len(), 4);
}

// ===========================================================================
// Graph assembly
// ===========================================================================

#[tokio::test]
async fn graph_forgets_dependents_first() {
    let ws = workspace();
    let plan = PlanFile::load(&ws.plan).await.unwrap();
    let state = FileStateStore::open(&ws.state).await.unwrap();
    let graph = build_forget_graph(&plan, &state).await.unwrap();

    assert_eq!(graph.len(), 4);
    let web = graph.find("aws_instance.web (forget)").unwrap();
    let vpc = graph.find("aws_vpc.main (forget)").unwrap();
    let ami = graph.find("data.aws_ami.ubuntu (forget)").unwrap();
    let provider = graph
        .find(r#"provider["registry.terraform.io/hashicorp/aws"]"#)
        .unwrap();

    assert!(graph.dependencies(vpc).any(|d| d == web));
    assert!(graph.dependencies(web).any(|d| d == provider));
    assert_eq!(graph.dependencies(ami).count(), 0);
    assert!(graph.node(provider).unwrap().provider_addr().is_some());
    assert!(graph.topo_order().is_ok());
}
