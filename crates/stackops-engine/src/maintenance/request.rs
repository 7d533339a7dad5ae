//! Maintenance request records and parameter validation

use crate::cleanup::CleanupMode;
use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use stackops_common::{ResourceKind, validate_region, validate_stack_name};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Recognized maintenance operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Fix,
    Cleanup,
    Update,
    Health,
    Backup,
    Restore,
    Validate,
    Optimize,
}

impl OperationKind {
    pub const ALL: [OperationKind; 8] = [
        OperationKind::Fix,
        OperationKind::Cleanup,
        OperationKind::Update,
        OperationKind::Health,
        OperationKind::Backup,
        OperationKind::Restore,
        OperationKind::Validate,
        OperationKind::Optimize,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Fix => "fix",
            OperationKind::Cleanup => "cleanup",
            OperationKind::Update => "update",
            OperationKind::Health => "health",
            OperationKind::Backup => "backup",
            OperationKind::Restore => "restore",
            OperationKind::Validate => "validate",
            OperationKind::Optimize => "optimize",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationKind::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| EngineError::UnknownOperation {
                name: s.to_string(),
            })
    }
}

/// What a cleanup operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Full stack teardown
    Stack,
    /// Every resource of one kind (target names the kind)
    Resources,
    /// Finished worker pool jobs
    Jobs,
    /// Expired cache entries
    Cache,
}

impl FromStr for Scope {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stack" => Ok(Scope::Stack),
            "resources" => Ok(Scope::Resources),
            "jobs" => Ok(Scope::Jobs),
            "cache" => Ok(Scope::Cache),
            other => Err(EngineError::validation(
                "cleanup",
                format!("unknown scope '{other}' (expected stack, resources, jobs or cache)"),
            )),
        }
    }
}

/// Which checks `validate` runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationType {
    Registry,
    Dependencies,
    Config,
    #[default]
    All,
}

impl ValidationType {
    pub fn includes(self, other: ValidationType) -> bool {
        self == ValidationType::All || self == other
    }
}

impl FromStr for ValidationType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registry" => Ok(ValidationType::Registry),
            "dependencies" => Ok(ValidationType::Dependencies),
            "config" => Ok(ValidationType::Config),
            "all" => Ok(ValidationType::All),
            other => Err(EngineError::validation(
                "validate",
                format!("unknown validation type '{other}'"),
            )),
        }
    }
}

/// One maintenance invocation. Constructed per call, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceRequest {
    pub operation: OperationKind,
    pub target: Option<String>,
    pub scope: Option<Scope>,
    pub stack_name: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub notify: bool,
    pub backup_file: Option<PathBuf>,
    pub validation_type: Option<ValidationType>,
    /// Cleanup ignores dependents and confirmation; health skips the cache
    #[serde(default)]
    pub force: bool,
    pub mode: Option<CleanupMode>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl MaintenanceRequest {
    pub fn new(operation: OperationKind) -> Self {
        Self {
            operation,
            target: None,
            scope: None,
            stack_name: None,
            dry_run: false,
            notify: false,
            backup_file: None,
            validation_type: None,
            force: false,
            mode: None,
            parameters: BTreeMap::new(),
        }
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn stack_name(mut self, stack: impl Into<String>) -> Self {
        self.stack_name = Some(stack.into());
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn notify(mut self, notify: bool) -> Self {
        self.notify = notify;
        self
    }

    pub fn backup_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.backup_file = Some(path.into());
        self
    }

    pub fn validation_type(mut self, validation_type: ValidationType) -> Self {
        self.validation_type = Some(validation_type);
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn mode(mut self, mode: CleanupMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Target or the `component` parameter, whichever is set
    pub fn target_or_component(&self) -> Option<&str> {
        self.target
            .as_deref()
            .or_else(|| self.parameters.get("component").map(String::as_str))
    }

    /// Label used in logs and error context
    pub fn label(&self) -> String {
        self.target_or_component()
            .or(self.stack_name.as_deref())
            .map(str::to_string)
            .or_else(|| self.scope.map(|s| format!("{s:?}").to_lowercase()))
            .unwrap_or_else(|| "-".to_string())
    }

    /// Check required parameter combinations. Runs before any side effect.
    pub fn validate(&self) -> EngineResult<()> {
        let op = self.operation.as_str();
        let missing = |what: &str| Err(EngineError::validation(op, format!("{what} is required")));

        if let Some(stack) = &self.stack_name {
            validate_stack_name(stack)?;
        }
        if let Some(region) = self.parameters.get("region") {
            validate_region(region)?;
        }

        match self.operation {
            OperationKind::Fix => {
                if self.target.is_none() {
                    return missing("target");
                }
            }
            OperationKind::Update => {
                if self.target_or_component().is_none() {
                    return missing("target or component");
                }
            }
            OperationKind::Cleanup => match self.scope {
                None => return missing("scope"),
                Some(Scope::Stack) if self.stack_name.is_none() => {
                    return missing("stack name for scope=stack");
                }
                Some(Scope::Resources) => match self.target.as_deref() {
                    None => return missing("target resource type for scope=resources"),
                    Some(t) => {
                        t.parse::<ResourceKind>()
                            .map_err(|e| EngineError::validation(op, e.to_string()))?;
                    }
                },
                Some(_) => {}
            },
            OperationKind::Backup => {
                if self.stack_name.is_none() {
                    return missing("stack name");
                }
            }
            OperationKind::Restore => {
                if self.stack_name.is_none() {
                    return missing("stack name");
                }
                if self.backup_file.is_none() {
                    return missing("backup file");
                }
            }
            OperationKind::Health | OperationKind::Validate | OperationKind::Optimize => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(request: MaintenanceRequest) -> String {
        match request.validate() {
            Err(EngineError::Validation { reason, .. }) => reason,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_operation_parsing() {
        for op in OperationKind::ALL {
            assert_eq!(op.as_str().parse::<OperationKind>().unwrap(), op);
        }
        assert!(matches!(
            "explode".parse::<OperationKind>(),
            Err(EngineError::UnknownOperation { .. })
        ));
    }

    #[test]
    fn test_fix_requires_target() {
        assert!(rejected(MaintenanceRequest::new(OperationKind::Fix)).contains("target"));
        MaintenanceRequest::new(OperationKind::Fix)
            .target("compute")
            .validate()
            .unwrap();
    }

    #[test]
    fn test_cleanup_scope_rules() {
        assert!(rejected(MaintenanceRequest::new(OperationKind::Cleanup)).contains("scope"));
        assert!(
            rejected(MaintenanceRequest::new(OperationKind::Cleanup).scope(Scope::Stack))
                .contains("stack name")
        );
        assert!(
            rejected(
                MaintenanceRequest::new(OperationKind::Cleanup)
                    .scope(Scope::Resources)
                    .target("database")
            )
            .contains("unknown resource kind")
        );
        MaintenanceRequest::new(OperationKind::Cleanup)
            .scope(Scope::Stack)
            .stack_name("web")
            .validate()
            .unwrap();
        MaintenanceRequest::new(OperationKind::Cleanup)
            .scope(Scope::Cache)
            .validate()
            .unwrap();
    }

    #[test]
    fn test_restore_requires_file_and_stack() {
        let reason = rejected(MaintenanceRequest::new(OperationKind::Restore).stack_name("web"));
        assert!(reason.contains("backup file"));
        MaintenanceRequest::new(OperationKind::Restore)
            .stack_name("web")
            .backup_file("/tmp/web.json")
            .validate()
            .unwrap();
    }

    #[test]
    fn test_bad_stack_name_and_region_rejected() {
        let request = MaintenanceRequest::new(OperationKind::Backup).stack_name("Bad_Name");
        assert!(matches!(request.validate(), Err(EngineError::Input(_))));

        let request = MaintenanceRequest::new(OperationKind::Health).parameter("region", "nowhere");
        assert!(matches!(request.validate(), Err(EngineError::Input(_))));
    }

    #[test]
    fn test_update_accepts_component_parameter() {
        assert!(rejected(MaintenanceRequest::new(OperationKind::Update)).contains("target"));
        MaintenanceRequest::new(OperationKind::Update)
            .parameter("component", "compute")
            .validate()
            .unwrap();
    }

    #[test]
    fn test_request_deserializes() {
        let json = r#"{"operation": "cleanup", "scope": "stack", "stack_name": "web", "dry_run": true}"#;
        let request: MaintenanceRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.operation, OperationKind::Cleanup);
        assert_eq!(request.scope, Some(Scope::Stack));
        assert!(request.dry_run);
        request.validate().unwrap();
    }
}
