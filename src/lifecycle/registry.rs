// src/lifecycle/registry.rs

use std::collections::HashSet;

use crate::errors::{Result, WeaveError};
use crate::lifecycle::phases::{
    self, ALL, BUILD, COMPILE, DEPLOY, EACH, INITIALIZE, INSTALL, INTEGRATION_TEST, PACKAGE,
    READY, RESOURCES, SOURCES, TEST, TEST_COMPILE, TEST_RESOURCES, TEST_SOURCES, UNIT_TEST,
    VALIDATE, VERIFY,
};
use crate::lifecycle::{AFTER, Alias, BEFORE, CLEAN, DEFAULT, Lifecycle, Phase, SITE};

const SCOPE_COMPILE: &str = "compile";
const SCOPE_RUNTIME: &str = "runtime";
const SCOPE_TEST_ONLY: &str = "test-only";
const SCOPE_TEST: &str = "test";

/// Source of lifecycle definitions used while computing build plans.
pub trait LifecycleRegistry: Send + Sync {
    /// Every known lifecycle, in lookup order.
    fn lifecycles(&self) -> &[Lifecycle];

    fn lookup(&self, id: &str) -> Option<&Lifecycle> {
        self.lifecycles().iter().find(|l| l.id == id)
    }

    /// First lifecycle that declares a phase called `phase`.
    fn lifecycle_for_phase(&self, phase: &str) -> Option<&Lifecycle> {
        self.lifecycles().iter().find(|l| l.has_phase(phase))
    }

    /// Resolve a legacy phase name against the aliases of every lifecycle.
    fn resolve_alias(&self, phase: &str) -> String {
        self.lifecycles()
            .iter()
            .flat_map(|l| l.aliases.iter())
            .find(|a| a.v3_phase == phase)
            .map(|a| a.v4_phase.clone())
            .unwrap_or_else(|| phase.to_string())
    }

    /// Comma-separated list of every phase name, for error messages.
    fn available_phases(&self) -> String {
        self.lifecycles()
            .iter()
            .flat_map(|l| l.all_phases().into_iter().map(|p| p.name.clone()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Registry holding the built-in `clean`, `default` and `site` lifecycles,
/// plus any extra lifecycles supplied by the caller.
#[derive(Debug, Clone)]
pub struct DefaultLifecycleRegistry {
    lifecycles: Vec<Lifecycle>,
}

impl DefaultLifecycleRegistry {
    pub fn new() -> Self {
        Self {
            lifecycles: vec![clean_lifecycle(), default_lifecycle(), site_lifecycle()],
        }
    }

    /// Built-in lifecycles followed by `extra`.
    ///
    /// Fails if any lifecycle declares the same phase name twice.
    pub fn with_lifecycles(extra: Vec<Lifecycle>) -> Result<Self> {
        let mut registry = Self::new();
        registry.lifecycles.extend(extra);
        for lifecycle in &registry.lifecycles {
            validate_lifecycle(lifecycle)?;
        }
        Ok(registry)
    }
}

impl Default for DefaultLifecycleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleRegistry for DefaultLifecycleRegistry {
    fn lifecycles(&self) -> &[Lifecycle] {
        &self.lifecycles
    }
}

fn validate_lifecycle(lifecycle: &Lifecycle) -> Result<()> {
    let mut seen = HashSet::new();
    for phase in lifecycle.all_phases() {
        if !seen.insert(phase.name.as_str()) {
            return Err(WeaveError::ConfigError(format!(
                "found duplicated phase '{}' in '{}' lifecycle",
                phase.name, lifecycle.id
            )));
        }
    }
    Ok(())
}

fn clean_lifecycle() -> Lifecycle {
    Lifecycle::new(
        CLEAN,
        vec![Phase::new(phases::CLEAN)],
        vec![
            Alias::new("pre-clean", format!("{BEFORE}{}", phases::CLEAN)),
            Alias::new("post-clean", format!("{AFTER}{}", phases::CLEAN)),
        ],
    )
}

fn default_lifecycle() -> Lifecycle {
    let build = Phase::new(BUILD)
        .after(VALIDATE)
        .child(Phase::new(SOURCES))
        .child(Phase::new(RESOURCES))
        .child(
            Phase::new(COMPILE)
                .after(SOURCES)
                .dependencies(SCOPE_COMPILE, READY),
        )
        .child(Phase::new(READY).after(COMPILE).after(RESOURCES))
        .child(
            Phase::new(PACKAGE)
                .after(READY)
                .dependencies(SCOPE_RUNTIME, PACKAGE),
        );

    let unit_test = Phase::new(UNIT_TEST)
        .child(Phase::new(TEST_SOURCES))
        .child(Phase::new(TEST_RESOURCES))
        .child(
            Phase::new(TEST_COMPILE)
                .after(TEST_SOURCES)
                .after(READY)
                .dependencies(SCOPE_TEST_ONLY, READY),
        )
        .child(
            Phase::new(TEST)
                .after(TEST_COMPILE)
                .after(TEST_RESOURCES)
                .dependencies(SCOPE_TEST, READY),
        );

    let each = Phase::new(EACH)
        .child(Phase::new(VALIDATE).child(Phase::new(INITIALIZE)))
        .child(build)
        .child(
            Phase::new(VERIFY)
                .after(VALIDATE)
                .child(unit_test)
                .child(Phase::new(INTEGRATION_TEST)),
        )
        .child(Phase::new(INSTALL).after(PACKAGE))
        .child(Phase::new(DEPLOY).after(PACKAGE));

    Lifecycle::new(
        DEFAULT,
        vec![Phase::new(ALL).child(each)],
        vec![
            Alias::new("generate-sources", SOURCES),
            Alias::new("process-sources", format!("{AFTER}{SOURCES}")),
            Alias::new("generate-resources", RESOURCES),
            Alias::new("process-resources", format!("{AFTER}{RESOURCES}")),
            Alias::new("process-classes", format!("{AFTER}{COMPILE}")),
            Alias::new("generate-test-sources", TEST_SOURCES),
            Alias::new("process-test-sources", format!("{AFTER}{TEST_SOURCES}")),
            Alias::new("generate-test-resources", TEST_RESOURCES),
            Alias::new("process-test-resources", format!("{AFTER}{TEST_RESOURCES}")),
            Alias::new("process-test-classes", format!("{AFTER}{TEST_COMPILE}")),
            Alias::new("prepare-package", format!("{BEFORE}{PACKAGE}")),
            Alias::new("pre-integration-test", format!("{BEFORE}{INTEGRATION_TEST}")),
            Alias::new("post-integration-test", format!("{AFTER}{INTEGRATION_TEST}")),
        ],
    )
}

fn site_lifecycle() -> Lifecycle {
    Lifecycle::new(
        SITE,
        vec![
            Phase::new("site"),
            Phase::new("site-deploy").after("site"),
        ],
        vec![
            Alias::new("pre-site", format!("{BEFORE}site")),
            Alias::new("post-site", format!("{AFTER}site")),
        ],
    )
}
