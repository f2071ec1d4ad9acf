//! Identity of the scenario a worker is executing
//!
//! Every worker owns its own [`ScenarioContext`]; nothing here is shared
//! between threads. The identity names the per-scenario artifacts.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Default directory that holds the `logs/` and `har/` folders
pub const ARTIFACT_ROOT: &str = "target";

const NO_ACTIVE_SCENARIO: &str =
    "ScenarioContext::set_scenario() must be called before accessing the scenario logger or artifacts";

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9 ._-]").expect("file name pattern is valid"));

/// Name, id and tags of one scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioIdentity {
    pub name: String,
    pub id: String,
    pub tags: Vec<String>,
}

impl ScenarioIdentity {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// `<name>-<id>` with anything outside `[a-zA-Z0-9 ._-]` replaced by `-`
    pub fn file_stem(&self) -> String {
        let raw = format!("{}-{}", self.name, self.id);
        UNSAFE_CHARS.replace_all(&raw, "-").into_owned()
    }
}

/// The scenario bound to the current worker, if any
#[derive(Debug, Clone)]
pub struct ScenarioContext {
    scenario: Option<ScenarioIdentity>,
    artifact_root: PathBuf,
}

impl Default for ScenarioContext {
    fn default() -> Self {
        Self::new(ARTIFACT_ROOT)
    }
}

impl ScenarioContext {
    pub fn new(artifact_root: impl Into<PathBuf>) -> Self {
        Self {
            scenario: None,
            artifact_root: artifact_root.into(),
        }
    }

    pub fn set_scenario(&mut self, identity: ScenarioIdentity) {
        self.scenario = Some(identity);
    }

    /// The active scenario.
    ///
    /// # Panics
    ///
    /// When no scenario is bound. That only happens when the harness calls
    /// into a scenario before its start hook, which is a wiring bug rather
    /// than a test failure.
    pub fn scenario(&self) -> &ScenarioIdentity {
        match &self.scenario {
            Some(identity) => identity,
            None => panic!("{}", NO_ACTIVE_SCENARIO),
        }
    }

    pub fn try_scenario(&self) -> Option<&ScenarioIdentity> {
        self.scenario.as_ref()
    }

    pub fn artifact_root(&self) -> &Path {
        &self.artifact_root
    }

    /// `<root>/<category>/<stem>.<extension>` for the active scenario.
    ///
    /// # Panics
    ///
    /// Same condition as [`ScenarioContext::scenario`].
    pub fn file_name_for(&self, category: &str, extension: &str) -> PathBuf {
        self.artifact_root
            .join(category)
            .join(format!("{}.{}", self.scenario().file_stem(), extension))
    }

    pub fn teardown(&mut self) {
        self.scenario = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stem_sanitized() {
        let identity = ScenarioIdentity::new("Create a widget: happy/path", "features/widgets.feature:12");
        assert_eq!(
            identity.file_stem(),
            "Create a widget- happy-path-features-widgets.feature-12"
        );
    }

    #[test]
    fn test_file_name_for() {
        let mut context = ScenarioContext::new("out");
        context.set_scenario(ScenarioIdentity::new("list", "7").with_tags(["@smoke"]));
        assert_eq!(context.file_name_for("har", "har"), PathBuf::from("out/har/list-7.har"));
        assert_eq!(context.scenario().tags, vec!["@smoke".to_string()]);
    }

    #[test]
    fn test_teardown_clears_binding() {
        let mut context = ScenarioContext::default();
        context.set_scenario(ScenarioIdentity::new("a", "1"));
        context.teardown();
        assert!(context.try_scenario().is_none());
    }

    #[test]
    #[should_panic(expected = "must be called before")]
    fn test_missing_scenario_panics() {
        let context = ScenarioContext::default();
        let _ = context.file_name_for("logs", "log");
    }
}
