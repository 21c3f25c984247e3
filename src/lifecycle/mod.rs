// src/lifecycle/mod.rs

//! Lifecycle model: named, nested phases with ordering links.
//!
//! Every phase `X` is expanded into three build steps: `before:X`, `X` and
//! `after:X`. Links describe extra ordering constraints, either inside the
//! project (`after(compile)`), against upstream dependencies
//! (`dependencies(scope, ready)`), or against aggregated child projects.
//!
//! - [`registry`] provides the [`LifecycleRegistry`] trait and the built-in
//!   `clean`, `default` and `site` lifecycles.

pub mod registry;

pub use registry::{DefaultLifecycleRegistry, LifecycleRegistry};

pub const BEFORE: &str = "before:";
pub const AFTER: &str = "after:";
pub const AT: &str = "at:";

pub const CLEAN: &str = "clean";
pub const DEFAULT: &str = "default";
pub const SITE: &str = "site";

/// Phase names of the default lifecycle.
pub mod phases {
    pub const ALL: &str = "all";
    pub const EACH: &str = "each";
    pub const VALIDATE: &str = "validate";
    pub const INITIALIZE: &str = "initialize";
    pub const BUILD: &str = "build";
    pub const SOURCES: &str = "sources";
    pub const RESOURCES: &str = "resources";
    pub const COMPILE: &str = "compile";
    pub const READY: &str = "ready";
    pub const PACKAGE: &str = "package";
    pub const VERIFY: &str = "verify";
    pub const UNIT_TEST: &str = "unit-test";
    pub const TEST_SOURCES: &str = "test-sources";
    pub const TEST_RESOURCES: &str = "test-resources";
    pub const TEST_COMPILE: &str = "test-compile";
    pub const TEST: &str = "test";
    pub const INTEGRATION_TEST: &str = "integration-test";
    pub const INSTALL: &str = "install";
    pub const DEPLOY: &str = "deploy";
    pub const CLEAN: &str = "clean";
}

/// Strip a leading `before:`, `after:` or `at:` marker from a phase name.
pub fn main_phase(phase: &str) -> &str {
    phase
        .strip_prefix(BEFORE)
        .or_else(|| phase.strip_prefix(AFTER))
        .or_else(|| phase.strip_prefix(AT))
        .unwrap_or(phase)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// The owning phase runs after the pointed-to phase.
    After,
    /// The owning phase runs before the pointed-to phase.
    Before,
}

/// What a link points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pointer {
    /// A phase of the same project.
    Project { phase: String },
    /// A phase of every upstream dependency of the project.
    Dependencies { scope: String, phase: String },
    /// A phase of every project aggregated by this one.
    Children { phase: String },
}

impl Pointer {
    pub fn phase(&self) -> &str {
        match self {
            Pointer::Project { phase }
            | Pointer::Dependencies { phase, .. }
            | Pointer::Children { phase } => phase,
        }
    }

    pub fn is_project(&self) -> bool {
        matches!(self, Pointer::Project { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub kind: LinkKind,
    pub pointer: Pointer,
}

/// A lifecycle phase, possibly containing child phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub name: String,
    pub phases: Vec<Phase>,
    pub links: Vec<Link>,
}

impl Phase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phases: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn child(mut self, phase: Phase) -> Self {
        self.phases.push(phase);
        self
    }

    /// Run after `phase` of the same project.
    pub fn after(mut self, phase: &str) -> Self {
        self.links.push(Link {
            kind: LinkKind::After,
            pointer: Pointer::Project {
                phase: phase.to_string(),
            },
        });
        self
    }

    /// Run after `phase` of every upstream dependency in `scope`.
    pub fn dependencies(mut self, scope: &str, phase: &str) -> Self {
        self.links.push(Link {
            kind: LinkKind::After,
            pointer: Pointer::Dependencies {
                scope: scope.to_string(),
                phase: phase.to_string(),
            },
        });
        self
    }

    /// Run after `phase` of every aggregated child project.
    pub fn children(mut self, phase: &str) -> Self {
        self.links.push(Link {
            kind: LinkKind::After,
            pointer: Pointer::Children {
                phase: phase.to_string(),
            },
        });
        self
    }
}

/// Legacy phase name mapped onto its canonical replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub v3_phase: String,
    pub v4_phase: String,
}

impl Alias {
    pub fn new(v3_phase: &str, v4_phase: impl Into<String>) -> Self {
        Self {
            v3_phase: v3_phase.to_string(),
            v4_phase: v4_phase.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lifecycle {
    pub id: String,
    pub phases: Vec<Phase>,
    pub aliases: Vec<Alias>,
}

impl Lifecycle {
    pub fn new(id: impl Into<String>, phases: Vec<Phase>, aliases: Vec<Alias>) -> Self {
        Self {
            id: id.into(),
            phases,
            aliases,
        }
    }

    /// All phases, parents before their children.
    pub fn all_phases(&self) -> Vec<&Phase> {
        fn visit<'a>(phase: &'a Phase, out: &mut Vec<&'a Phase>) {
            out.push(phase);
            for child in &phase.phases {
                visit(child, out);
            }
        }

        let mut out = Vec::new();
        for phase in &self.phases {
            visit(phase, &mut out);
        }
        out
    }

    pub fn has_phase(&self, name: &str) -> bool {
        self.all_phases().iter().any(|p| p.name == name)
    }

    /// Canonical name for `phase` according to this lifecycle's aliases.
    pub fn resolve_alias(&self, phase: &str) -> String {
        self.aliases
            .iter()
            .find(|a| a.v3_phase == phase)
            .map(|a| a.v4_phase.clone())
            .unwrap_or_else(|| phase.to_string())
    }
}
