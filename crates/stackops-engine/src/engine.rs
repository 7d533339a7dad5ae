//! Engine wiring
//!
//! [`Engine`] owns one instance of every component for one stack. Nothing
//! here is global: two engines for two stacks share no state.
//!
//! Start-up order:
//! 1. validate the [`EngineConfig`]
//! 2. open the state store and the stack's registry
//! 3. build the components
//! 4. initialize them through the module loader (`base`, then `infrastructure`)
//! 5. spawn the orphan sweeper

use crate::cleanup::{CleanupOrchestrator, Confirm, NeverConfirm};
use crate::cloud::{
    CloudApi, Metadata, ResourceDescription, ResourceSpec, SweepHandle, create_sweeper,
};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, ErrorContext};
use crate::loader::ModuleLoader;
use crate::maintenance::{Dispatcher, MaintenanceRequest, OperationReport};
use crate::notify::{LogNotifier, Notifier};
use crate::perf::{ConnectionPool, Metrics, ProgressReporter, TtlCache, WorkerPool};
use crate::registry::{Resource, ResourceRegistry, StackStore, registry_error};
use crate::resilience::{FallbackOutcome, Resilience, with_fallback};
use stackops_common::ResourceKind;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Loader group initialized first
pub const BASE_GROUP: &str = "base";
/// Loader group initialized once the base is up
pub const INFRASTRUCTURE_GROUP: &str = "infrastructure";

/// Provider state recorded for resources the provider no longer knows
pub const MISSING_STATE: &str = "not-found";

/// Cache key of a resource's last known provider state
pub fn describe_key(kind: ResourceKind, id: &str) -> String {
    format!("describe:{kind}/{id}")
}

/// Breaker key for cloud calls against one resource kind
pub fn cloud_service(kind: ResourceKind) -> String {
    format!("cloud:{kind}")
}

/// Every component of a running engine
pub struct Components {
    pub config: EngineConfig,
    pub registry: ResourceRegistry,
    pub cloud: Arc<dyn CloudApi>,
    pub resilience: Arc<Resilience>,
    pub workers: Arc<WorkerPool>,
    /// Last known provider state per resource, keyed `describe:<kind>/<id>`
    pub cache: Arc<TtlCache<String>>,
    pub connections: Arc<ConnectionPool>,
    pub metrics: Arc<Metrics>,
    pub progress: Arc<ProgressReporter>,
    pub orchestrator: CleanupOrchestrator,
    pub sweeper: SweepHandle,
    pub notifier: Arc<dyn Notifier>,
}

impl Components {
    /// Cloneable describe path for work that must outlive a borrow
    pub fn describer(&self) -> Describer {
        Describer {
            cloud: Arc::clone(&self.cloud),
            resilience: Arc::clone(&self.resilience),
            connections: Arc::clone(&self.connections),
            cache: Arc::clone(&self.cache),
            region: self.config.region().to_string(),
        }
    }

    /// Create a resource and record it in the registry.
    ///
    /// The created resource is guarded until the registry write succeeds.
    /// If that write fails, the sweeper deletes it again.
    pub async fn provision(
        &self,
        kind: ResourceKind,
        properties: Metadata,
    ) -> EngineResult<Resource> {
        let spec = ResourceSpec::new(
            kind,
            self.registry.stack(),
            self.config.region(),
            self.config.environment(),
        )
        .with_properties(properties);

        let cloud = &self.cloud;
        let created = self
            .resilience
            .call(
                ErrorContext::new("create", kind.as_str()),
                &cloud_service(kind),
                || async { cloud.create(&spec).await.map_err(EngineError::from) },
            )
            .await?;
        let guard = self.sweeper.guard(kind, created, self.registry.stack());

        let mut metadata = spec.tags();
        metadata.extend(spec.properties.clone());
        metadata.extend(guard.metadata.clone());
        let resource = self.registry.register(kind, &guard.id, metadata)?;
        guard.commit();

        info!(kind = %kind, id = %resource.id, stack = %resource.stack, "Provisioned resource");
        Ok(resource)
    }
}

/// Resilient describe call holding a pooled connection for its duration
#[derive(Clone)]
pub struct Describer {
    cloud: Arc<dyn CloudApi>,
    resilience: Arc<Resilience>,
    connections: Arc<ConnectionPool>,
    cache: Arc<TtlCache<String>>,
    region: String,
}

impl Describer {
    pub async fn describe(&self, kind: ResourceKind, id: &str) -> EngineResult<ResourceDescription> {
        let service = cloud_service(kind);
        let _lease = self.connections.lease(&service, &self.region)?;
        let cloud = &self.cloud;
        self.resilience
            .call(
                ErrorContext::new("describe", format!("{kind}/{id}")),
                &service,
                || async { cloud.describe(kind, id).await.map_err(EngineError::from) },
            )
            .await
    }

    /// Provider state, or the last cached state when the provider fails.
    ///
    /// A resource the provider no longer knows is [`MISSING_STATE`], not an
    /// error, so it never falls back.
    pub async fn describe_state(
        &self,
        kind: ResourceKind,
        id: &str,
    ) -> EngineResult<FallbackOutcome<String>> {
        let key = describe_key(kind, id);
        with_fallback(
            "describe",
            || async {
                match self.describe(kind, id).await {
                    Ok(desc) => Ok(desc.state),
                    Err(e) if e.is_not_found() => Ok(MISSING_STATE.to_string()),
                    Err(e) => Err(e),
                }
            },
            || async {
                self.cache
                    .get(&key)?
                    .ok_or_else(|| EngineError::CacheMiss { key: key.clone() })
            },
        )
        .await
    }
}

/// Builder for [`Engine`]
pub struct EngineBuilder {
    config: EngineConfig,
    cloud: Arc<dyn CloudApi>,
    store: Option<StackStore>,
    notifier: Option<Arc<dyn Notifier>>,
    confirm: Option<Arc<dyn Confirm>>,
    progress: Option<ProgressReporter>,
}

impl EngineBuilder {
    /// Use this store instead of the configured state directory
    pub fn store(mut self, store: StackStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Defaults to [`LogNotifier`]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Defaults to [`NeverConfirm`], so manual cleanups skip unless forced
    pub fn confirm(mut self, confirm: Arc<dyn Confirm>) -> Self {
        self.confirm = Some(confirm);
        self
    }

    /// Defaults to stderr, plain when `no_color` is set
    pub fn progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Validate, build and initialize every component.
    pub async fn start(self) -> EngineResult<Engine> {
        let config = self.config;
        config.validate()?;
        let stack = config.stack_name().to_string();

        let store = match self.store {
            Some(store) => store,
            None => match config.state_dir() {
                Some(dir) => StackStore::at(dir),
                None => StackStore::open_default(),
            }
            .map_err(|e| registry_error(&stack, &e))?,
        };
        let registry =
            ResourceRegistry::open(store, &stack, config.region(), config.environment())?;

        let cloud = self.cloud;
        let resilience = Arc::new(Resilience::from_config(&config));
        let progress = Arc::new(
            self.progress
                .unwrap_or_else(|| ProgressReporter::new(config.no_color())),
        );
        let orchestrator = CleanupOrchestrator::new(
            registry.clone(),
            Arc::clone(&cloud),
            Arc::clone(&resilience),
            Arc::clone(&progress),
            self.confirm.unwrap_or_else(|| Arc::new(NeverConfirm)),
        );
        let (sweeper, orphan_sweeper) = create_sweeper(Arc::clone(&cloud));

        let components = Arc::new(Components {
            workers: Arc::new(WorkerPool::new(
                config.workers.max_workers,
                config.job_timeout(),
            )),
            cache: Arc::new(TtlCache::new(config.cache.capacity, Some(config.cache_ttl()))),
            connections: Arc::new(ConnectionPool::new(
                config.connections.max_idle,
                config.connections.max_total,
            )),
            metrics: Arc::new(Metrics::new()),
            notifier: self.notifier.unwrap_or_else(|| Arc::new(LogNotifier)),
            config,
            registry,
            cloud,
            resilience,
            progress,
            orchestrator,
            sweeper,
        });

        let loader = component_loader(&components)?;
        loader.load_group(BASE_GROUP)?;
        loader.load_group(INFRASTRUCTURE_GROUP)?;
        debug!(order = ?loader.load_order(), "Components initialized");

        let sweeper_task = tokio::spawn(orphan_sweeper.run());
        info!(
            stack = %stack,
            region = %components.config.region(),
            resources = components.registry.active_resources().len(),
            "Engine started"
        );

        Ok(Engine {
            components,
            loader,
            dispatcher: Dispatcher::new()?,
            sweeper_task,
        })
    }
}

/// Module graph over the substrate components. Initializers only flip
/// each component's initialized flag.
fn component_loader(components: &Arc<Components>) -> EngineResult<ModuleLoader> {
    let metrics = Arc::clone(&components.metrics);
    let progress = Arc::clone(&components.progress);
    let cache = Arc::clone(&components.cache);
    let connections = Arc::clone(&components.connections);
    let workers = Arc::clone(&components.workers);

    ModuleLoader::builder()
        .module_with_init("metrics", &[], move || {
            metrics.initialize();
            Ok(())
        })
        .module_with_init("progress", &[], move || {
            progress.initialize();
            Ok(())
        })
        .module_with_init("cache", &["metrics"], move || {
            cache.initialize();
            Ok(())
        })
        .module_with_init("connections", &["metrics"], move || {
            connections.initialize();
            Ok(())
        })
        .module_with_init("workers", &["metrics", "progress"], move || {
            workers.initialize();
            Ok(())
        })
        .group(BASE_GROUP, &["metrics", "progress"])
        .group(INFRASTRUCTURE_GROUP, &["cache", "connections", "workers"])
        .build()
}

/// A started engine for one stack
pub struct Engine {
    components: Arc<Components>,
    loader: ModuleLoader,
    dispatcher: Dispatcher,
    sweeper_task: JoinHandle<()>,
}

impl Engine {
    pub fn builder(config: EngineConfig, cloud: Arc<dyn CloudApi>) -> EngineBuilder {
        EngineBuilder {
            config,
            cloud,
            store: None,
            notifier: None,
            confirm: None,
            progress: None,
        }
    }

    /// Run one maintenance operation
    pub async fn dispatch(&self, request: &MaintenanceRequest) -> EngineResult<OperationReport> {
        self.dispatcher.dispatch(&self.components, request).await
    }

    /// See [`Components::provision`]
    pub async fn provision(
        &self,
        kind: ResourceKind,
        properties: Metadata,
    ) -> EngineResult<Resource> {
        self.components.provision(kind, properties).await
    }

    pub fn components(&self) -> &Arc<Components> {
        &self.components
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.components.registry
    }

    pub fn metrics(&self) -> &Metrics {
        &self.components.metrics
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    /// Stop accepting jobs and let the sweeper drain its queue.
    pub async fn shutdown(self) {
        self.components.workers.shutdown();
        self.components.sweeper.shutdown();
        if let Err(e) = self.sweeper_task.await {
            warn!(error = %e, "Orphan sweeper task failed");
        }
        info!(stack = %self.components.registry.stack(), "Engine stopped");
    }
}
