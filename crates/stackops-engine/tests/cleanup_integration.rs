//! Integration tests for stack teardown through the dispatcher
//!
//! Each test runs against an in-memory provider and a temporary state
//! directory.

mod common;

use anyhow::Result;
use common::{props, provision_full_stack, start};
use stackops_common::ResourceKind;
use stackops_engine::cloud::CloudApiError;
use stackops_engine::{
    CleanupMode, EngineError, MaintenanceRequest, OperationKind, OperationStatus, Scope,
};
use stackops_test_utils::{FakeCloud, FakeOp, TestState, test_stack_name};
use std::sync::Arc;

fn stack_cleanup(stack: &str) -> MaintenanceRequest {
    MaintenanceRequest::new(OperationKind::Cleanup)
        .scope(Scope::Stack)
        .stack_name(stack)
}

#[tokio::test]
async fn test_teardown_follows_dependency_order() -> Result<()> {
    let state = TestState::new();
    let cloud = Arc::new(FakeCloud::new());
    let stack = test_stack_name();
    let engine = start(&cloud, &state, &stack).await?;

    // Registration order deliberately differs from teardown order
    for kind in [
        ResourceKind::Compute,
        ResourceKind::Cdn,
        ResourceKind::Network,
        ResourceKind::Security,
        ResourceKind::LoadBalancer,
        ResourceKind::SharedStorage,
    ] {
        engine.provision(kind, props(&[])).await?;
    }

    let report = engine.dispatch(&stack_cleanup(&stack)).await?;
    assert_eq!(report.status, OperationStatus::Success);
    assert_eq!(report.get("deleted"), 6);

    let kinds: Vec<ResourceKind> = cloud.delete_calls().into_iter().map(|(k, _)| k).collect();
    assert_eq!(kinds, ResourceKind::CLEANUP_ORDER);
    assert!(engine.registry().active_resources().is_empty());
    assert_eq!(cloud.resource_count(), 0);

    let history = engine.registry().cleanup_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].mode, "automatic");
    assert_eq!(history[0].deleted, 6);

    engine.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_referencing_stack_tears_down_cleanly() -> Result<()> {
    let state = TestState::new();
    let cloud = Arc::new(FakeCloud::new());
    let stack = test_stack_name();
    let engine = start(&cloud, &state, &stack).await?;
    provision_full_stack(&engine).await?;

    let report = engine.dispatch(&stack_cleanup(&stack)).await?;
    assert_eq!(report.get("deleted"), 6);
    assert_eq!(report.get("failed"), 0);
    assert_eq!(report.get("purged"), 6);
    assert!(engine.registry().snapshot().resources.is_empty());

    engine.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_dry_run_deletes_nothing_and_reports_plan() -> Result<()> {
    let state = TestState::new();
    let cloud = Arc::new(FakeCloud::new());
    let stack = test_stack_name();
    let engine = start(&cloud, &state, &stack).await?;
    provision_full_stack(&engine).await?;

    let report = engine
        .dispatch(&stack_cleanup(&stack).dry_run(true))
        .await?;

    assert_eq!(report.status, OperationStatus::Success);
    assert!(report.dry_run);
    assert!(cloud.delete_calls().is_empty());
    assert_eq!(report.get("planned"), 6);
    assert_eq!(report.get("deleted"), 0);
    assert!(!report.lines.is_empty());
    assert!(report.lines[0].starts_with("[DRY RUN] Cleanup plan"));
    assert!(report.lines.iter().all(|l| l.starts_with("[DRY RUN] ")));

    assert_eq!(engine.registry().active_resources().len(), 6);
    assert!(engine.registry().cleanup_history().is_empty());
    engine.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_dry_run_of_empty_stack_still_has_plan() -> Result<()> {
    let state = TestState::new();
    let cloud = Arc::new(FakeCloud::new());
    let stack = test_stack_name();
    let engine = start(&cloud, &state, &stack).await?;

    let report = engine
        .dispatch(&stack_cleanup(&stack).dry_run(true))
        .await?;
    assert!(report.lines.iter().any(|l| l.contains("No resources registered")));
    engine.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_inverted_reference_blocks_only_that_resource() -> Result<()> {
    let state = TestState::new();
    let cloud = Arc::new(FakeCloud::new());
    let stack = test_stack_name();
    let engine = start(&cloud, &state, &stack).await?;

    let cdn = engine.provision(ResourceKind::Cdn, props(&[])).await?;
    let network = engine
        .provision(ResourceKind::Network, props(&[("origin", cdn.id.as_str())]))
        .await?;

    let report = engine.dispatch(&stack_cleanup(&stack)).await?;
    assert_eq!(report.status, OperationStatus::Partial);
    assert_eq!(report.get("failed"), 1);
    assert_eq!(report.get("deleted"), 1);
    assert!(report.lines.iter().any(|l| l.contains(&cdn.id) && l.contains("still referenced")));

    assert!(cloud.contains(&cdn.id));
    assert!(!cloud.contains(&network.id));
    assert!(engine.registry().exists(ResourceKind::Cdn, &cdn.id));
    engine.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_force_ignores_references() -> Result<()> {
    let state = TestState::new();
    let cloud = Arc::new(FakeCloud::new());
    let stack = test_stack_name();
    let engine = start(&cloud, &state, &stack).await?;

    let cdn = engine.provision(ResourceKind::Cdn, props(&[])).await?;
    engine
        .provision(ResourceKind::Network, props(&[("origin", cdn.id.as_str())]))
        .await?;

    let report = engine.dispatch(&stack_cleanup(&stack).force(true)).await?;
    assert_eq!(report.get("deleted"), 2);
    assert_eq!(cloud.resource_count(), 0);
    engine.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_transient_delete_failures_are_retried() -> Result<()> {
    let state = TestState::new();
    let cloud = Arc::new(FakeCloud::new());
    let stack = test_stack_name();
    let engine = start(&cloud, &state, &stack).await?;
    engine.provision(ResourceKind::Compute, props(&[])).await?;

    cloud.fail_next(
        FakeOp::Delete,
        [
            CloudApiError::throttled("Rate exceeded"),
            CloudApiError::transient("connection reset"),
        ],
    );
    let report = engine.dispatch(&stack_cleanup(&stack)).await?;
    assert_eq!(report.get("deleted"), 1);
    assert_eq!(cloud.delete_calls().len(), 3);
    engine.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_already_deleted_resource_counts_as_success() -> Result<()> {
    let state = TestState::new();
    let cloud = Arc::new(FakeCloud::new());
    let stack = test_stack_name();
    let engine = start(&cloud, &state, &stack).await?;
    let compute = engine.provision(ResourceKind::Compute, props(&[])).await?;
    cloud.mark_missing(&compute.id);

    let report = engine.dispatch(&stack_cleanup(&stack)).await?;
    assert_eq!(report.status, OperationStatus::Success);
    assert!(report.lines.iter().any(|l| l.contains("already deleted")));
    assert!(!engine.registry().exists(ResourceKind::Compute, &compute.id));
    engine.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_manual_mode_without_confirmation_skips() -> Result<()> {
    let state = TestState::new();
    let cloud = Arc::new(FakeCloud::new());
    let stack = test_stack_name();
    let engine = start(&cloud, &state, &stack).await?;
    engine.provision(ResourceKind::Network, props(&[])).await?;

    let report = engine
        .dispatch(&stack_cleanup(&stack).mode(CleanupMode::Manual))
        .await?;
    assert_eq!(report.get("skipped"), 1);
    assert!(cloud.delete_calls().is_empty());
    assert_eq!(engine.registry().cleanup_history()[0].mode, "manual");
    engine.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_resources_scope_deletes_one_kind() -> Result<()> {
    let state = TestState::new();
    let cloud = Arc::new(FakeCloud::new());
    let stack = test_stack_name();
    let engine = start(&cloud, &state, &stack).await?;
    let stack_resources = provision_full_stack(&engine).await?;

    let report = engine
        .dispatch(
            &MaintenanceRequest::new(OperationKind::Cleanup)
                .scope(Scope::Resources)
                .target("cdn"),
        )
        .await?;
    assert_eq!(report.get("deleted"), 1);
    assert_eq!(
        cloud.delete_calls(),
        [(ResourceKind::Cdn, stack_resources.cdn.id.clone())]
    );
    assert_eq!(engine.registry().active_resources().len(), 5);
    engine.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_invalid_requests_mutate_nothing() -> Result<()> {
    let state = TestState::new();
    let cloud = Arc::new(FakeCloud::new());
    let stack = test_stack_name();
    let engine = start(&cloud, &state, &stack).await?;
    provision_full_stack(&engine).await?;

    let invalid = [
        MaintenanceRequest::new(OperationKind::Cleanup),
        MaintenanceRequest::new(OperationKind::Cleanup).scope(Scope::Stack),
        MaintenanceRequest::new(OperationKind::Cleanup)
            .scope(Scope::Resources)
            .target("database"),
        stack_cleanup("some-other-stack"),
    ];
    for request in &invalid {
        let err = engine.dispatch(request).await.unwrap_err();
        assert!(
            matches!(err.root(), EngineError::Validation { .. }),
            "expected validation error, got {err}"
        );
        assert_eq!(err.context().unwrap().operation, "cleanup");
        assert!(!err.suggestion().is_empty());
    }

    assert!(cloud.delete_calls().is_empty());
    assert_eq!(engine.registry().active_resources().len(), 6);
    engine.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_dry_run_validation_error_is_tagged() -> Result<()> {
    let state = TestState::new();
    let cloud = Arc::new(FakeCloud::new());
    let engine = start(&cloud, &state, &test_stack_name()).await?;

    let err = engine
        .dispatch(
            &MaintenanceRequest::new(OperationKind::Cleanup)
                .scope(Scope::Stack)
                .dry_run(true),
        )
        .await
        .unwrap_err();
    assert!(err.is_dry_run());
    assert!(err.to_string().starts_with("[DRY RUN] "));
    engine.shutdown().await;
    Ok(())
}
