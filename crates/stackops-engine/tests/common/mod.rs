//! Helpers shared by the engine integration tests
#![allow(dead_code)]

use anyhow::Result;
use stackops_common::ResourceKind;
use stackops_engine::cloud::{CloudApi, Metadata};
use stackops_engine::perf::ProgressReporter;
use stackops_engine::{Engine, Resource};
use stackops_test_utils::{FakeCloud, TestState};
use std::sync::Arc;

/// Start an engine for `stack` against `cloud`, output discarded
pub async fn start(cloud: &Arc<FakeCloud>, state: &TestState, stack: &str) -> Result<Engine> {
    let api: Arc<dyn CloudApi> = cloud.clone();
    let engine = Engine::builder(state.config(stack), api)
        .progress(ProgressReporter::hidden())
        .start()
        .await?;
    Ok(engine)
}

pub fn props(pairs: &[(&str, &str)]) -> Metadata {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// One resource of every kind, each referencing what it runs on
pub struct FullStack {
    pub network: Resource,
    pub security: Resource,
    pub compute: Resource,
    pub storage: Resource,
    pub load_balancer: Resource,
    pub cdn: Resource,
}

pub async fn provision_full_stack(engine: &Engine) -> Result<FullStack> {
    let network = engine.provision(ResourceKind::Network, props(&[("cidr", "10.0.0.0/16")])).await?;
    let security = engine
        .provision(ResourceKind::Security, props(&[("vpc", network.id.as_str())]))
        .await?;
    let compute = engine
        .provision(
            ResourceKind::Compute,
            props(&[("vpc", network.id.as_str()), ("security_groups", security.id.as_str())]),
        )
        .await?;
    let storage = engine
        .provision(
            ResourceKind::SharedStorage,
            props(&[("vpc", network.id.as_str()), ("security_groups", security.id.as_str())]),
        )
        .await?;
    let load_balancer = engine
        .provision(
            ResourceKind::LoadBalancer,
            props(&[("targets", compute.id.as_str()), ("security_groups", security.id.as_str())]),
        )
        .await?;
    let cdn = engine
        .provision(ResourceKind::Cdn, props(&[("origin", load_balancer.id.as_str())]))
        .await?;
    Ok(FullStack {
        network,
        security,
        compute,
        storage,
        load_balancer,
        cdn,
    })
}
