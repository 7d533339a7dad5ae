//! Dependency-ordered module loading
//!
//! Modules declare their dependencies by name. Loading resolves them depth
//! first, runs each module's initializer exactly once, and memoizes the
//! result so repeat loads are a set lookup.

use crate::error::{EngineError, EngineResult};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Mutex;
use tracing::debug;

type Initializer = Box<dyn Fn() -> EngineResult<()> + Send + Sync>;

/// Static declaration of a module
pub struct ModuleDescriptor {
    pub name: String,
    pub dependencies: Vec<String>,
    init: Option<Initializer>,
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("has_init", &self.init.is_some())
            .finish()
    }
}

/// Resolution counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    /// Modules loaded so far
    pub loaded: usize,
    /// Graph nodes visited by full resolutions (memo hits do not count)
    pub visits: u64,
}

#[derive(Default)]
struct LoaderState {
    loaded: HashSet<String>,
    order: Vec<String>,
    visits: u64,
}

/// Loads modules and groups in dependency order
pub struct ModuleLoader {
    modules: HashMap<String, ModuleDescriptor>,
    groups: HashMap<String, Vec<String>>,
    state: Mutex<LoaderState>,
}

impl ModuleLoader {
    pub fn builder() -> ModuleLoaderBuilder {
        ModuleLoaderBuilder::default()
    }

    /// Load a module and everything it depends on.
    ///
    /// Initializers run while the loader is locked and must not call back
    /// into the loader.
    pub fn load(&self, name: &str) -> EngineResult<()> {
        let mut state = self.lock();
        if state.loaded.contains(name) {
            return Ok(());
        }
        let mut path = Vec::new();
        self.visit(name, &mut state, &mut path)
    }

    /// Load each member of a group in declared order
    pub fn load_group(&self, group: &str) -> EngineResult<()> {
        let members = self
            .groups
            .get(group)
            .ok_or_else(|| EngineError::UnknownModule {
                name: group.to_string(),
            })?;
        for member in members {
            self.load(member)?;
        }
        debug!(group = %group, "Loaded module group");
        Ok(())
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.lock().loaded.contains(name)
    }

    /// Modules in the order their initializers ran
    pub fn load_order(&self) -> Vec<String> {
        self.lock().order.clone()
    }

    pub fn stats(&self) -> LoaderStats {
        let state = self.lock();
        LoaderStats {
            loaded: state.loaded.len(),
            visits: state.visits,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LoaderState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn visit(
        &self,
        name: &str,
        state: &mut LoaderState,
        path: &mut Vec<String>,
    ) -> EngineResult<()> {
        if state.loaded.contains(name) {
            return Ok(());
        }
        if let Some(pos) = path.iter().position(|n| n == name) {
            let mut cycle = path[pos..].to_vec();
            cycle.push(name.to_string());
            return Err(EngineError::CircularDependency { cycle });
        }
        let module = self
            .modules
            .get(name)
            .ok_or_else(|| EngineError::UnknownModule {
                name: name.to_string(),
            })?;

        state.visits += 1;
        path.push(name.to_string());
        for dep in &module.dependencies {
            self.visit(dep, state, path)?;
        }
        path.pop();

        if let Some(init) = &module.init {
            init()?;
        }
        state.loaded.insert(name.to_string());
        state.order.push(name.to_string());
        debug!(module = %name, "Loaded module");
        Ok(())
    }
}

/// Builder for [`ModuleLoader`]
#[derive(Default)]
pub struct ModuleLoaderBuilder {
    modules: Vec<ModuleDescriptor>,
    groups: Vec<(String, Vec<String>)>,
}

impl ModuleLoaderBuilder {
    pub fn module(mut self, name: &str, dependencies: &[&str]) -> Self {
        self.modules.push(ModuleDescriptor {
            name: name.to_string(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            init: None,
        });
        self
    }

    pub fn module_with_init<F>(mut self, name: &str, dependencies: &[&str], init: F) -> Self
    where
        F: Fn() -> EngineResult<()> + Send + Sync + 'static,
    {
        self.modules.push(ModuleDescriptor {
            name: name.to_string(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            init: Some(Box::new(init)),
        });
        self
    }

    pub fn group(mut self, name: &str, members: &[&str]) -> Self {
        self.groups.push((
            name.to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        ));
        self
    }

    /// Every group member must be a declared module. Dependencies are
    /// checked lazily at load time, where cycles are also reported.
    pub fn build(self) -> EngineResult<ModuleLoader> {
        let modules: HashMap<String, ModuleDescriptor> = self
            .modules
            .into_iter()
            .map(|m| (m.name.clone(), m))
            .collect();

        for (_, members) in &self.groups {
            if let Some(missing) = members.iter().find(|m| !modules.contains_key(*m)) {
                return Err(EngineError::UnknownModule {
                    name: missing.clone(),
                });
            }
        }

        Ok(ModuleLoader {
            modules,
            groups: self.groups.into_iter().collect(),
            state: Mutex::new(LoaderState::default()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> impl Fn() -> EngineResult<()> + Send + Sync + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_dependencies_load_first() {
        let loader = ModuleLoader::builder()
            .module("app", &["db", "cache"])
            .module("db", &["config"])
            .module("cache", &["config"])
            .module("config", &[])
            .build()
            .unwrap();

        loader.load("app").unwrap();
        assert_eq!(loader.load_order(), ["config", "db", "cache", "app"]);
    }

    #[test]
    fn test_cycle_names_full_path() {
        let loader = ModuleLoader::builder()
            .module("a", &["b"])
            .module("b", &["a"])
            .build()
            .unwrap();

        match loader.load("a").unwrap_err() {
            EngineError::CircularDependency { cycle } => assert_eq!(cycle, ["a", "b", "a"]),
            other => panic!("expected cycle, got {other}"),
        }
        assert!(!loader.is_loaded("a"));
        assert!(!loader.is_loaded("b"));
    }

    #[test]
    fn test_each_module_initialized_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let loader = ModuleLoader::builder()
            .module_with_init("base", &[], counting(&count))
            .module_with_init("left", &["base"], counting(&count))
            .module_with_init("right", &["base"], counting(&count))
            .module_with_init("top", &["left", "right"], counting(&count))
            .build()
            .unwrap();

        loader.load("top").unwrap();
        loader.load("top").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_repeat_load_is_memo_lookup() {
        let loader = ModuleLoader::builder()
            .module("a", &["b"])
            .module("b", &["c"])
            .module("c", &[])
            .group("all", &["a", "b", "c"])
            .build()
            .unwrap();

        loader.load_group("all").unwrap();
        let first = loader.stats();
        assert_eq!(first.loaded, 3);
        assert_eq!(first.visits, 3);

        loader.load_group("all").unwrap();
        assert_eq!(loader.stats(), first);
    }

    #[test]
    fn test_group_skips_loaded_members() {
        let loader = ModuleLoader::builder()
            .module("metrics", &[])
            .module("cache", &["metrics"])
            .group("base", &["metrics"])
            .group("infrastructure", &["cache", "metrics"])
            .build()
            .unwrap();

        loader.load_group("base").unwrap();
        loader.load_group("infrastructure").unwrap();
        assert_eq!(loader.load_order(), ["metrics", "cache"]);
    }

    #[test]
    fn test_unknown_names() {
        let err = ModuleLoader::builder()
            .module("a", &[])
            .group("g", &["a", "missing"])
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::UnknownModule { name } if name == "missing"));

        let loader = ModuleLoader::builder().module("a", &["ghost"]).build().unwrap();
        assert!(matches!(
            loader.load("a"),
            Err(EngineError::UnknownModule { .. })
        ));
        assert!(matches!(
            loader.load_group("nope"),
            Err(EngineError::UnknownModule { .. })
        ));
    }

    #[test]
    fn test_failing_initializer_leaves_module_unloaded() {
        let loader = ModuleLoader::builder()
            .module_with_init("flaky", &[], || {
                Err(EngineError::NotInitialized { component: "flaky" })
            })
            .build()
            .unwrap();

        assert!(loader.load("flaky").is_err());
        assert!(!loader.is_loaded("flaky"));
    }
}
