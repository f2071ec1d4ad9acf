//! Per-scenario state and the before/after hooks
//!
//! A [`ScenarioSession`] is created by the harness when a scenario starts and
//! consumed when it finishes. It is owned by the worker running the
//! scenario, so nothing in it needs locking.

use std::path::PathBuf;

use crate::config::{ConfigKey, ConfigurationManager};
use crate::error::Result;
use crate::har::{HarEntry, HarRecorder};
use crate::logger::ScenarioLogger;
use crate::scenario::{ScenarioContext, ScenarioIdentity, ARTIFACT_ROOT};

/// Files written when a scenario finished
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioArtifacts {
    pub log: Option<PathBuf>,
    pub har: Option<PathBuf>,
}

#[derive(Debug)]
pub struct ScenarioSession {
    context: ScenarioContext,
    har: HarRecorder,
    logger: ScenarioLogger,
    log_always: bool,
    log_on_failure: bool,
}

impl ScenarioSession {
    /// Bind `identity` and set up empty buffers, artifacts under `target/`.
    pub fn start(config: &ConfigurationManager, identity: ScenarioIdentity) -> Result<Self> {
        Self::start_in(config, identity, ARTIFACT_ROOT)
    }

    pub fn start_in(
        config: &ConfigurationManager,
        identity: ScenarioIdentity,
        artifact_root: impl Into<PathBuf>,
    ) -> Result<Self> {
        let settings = config.configuration();
        let mut context = ScenarioContext::new(artifact_root);
        context.set_scenario(identity);

        let mut session = Self {
            context,
            har: HarRecorder::new(),
            logger: ScenarioLogger::from_config(config)?,
            log_always: settings.flag_or(ConfigKey::LogToFileAlways, false),
            log_on_failure: settings.flag_or(ConfigKey::LogToFileOnFailure, false),
        };

        let scenario = session.context.scenario();
        let message = format!("Starting scenario: {} [{}]", scenario.name, scenario.tags.join(", "));
        session.logger.info(message);
        Ok(session)
    }

    pub fn context(&self) -> &ScenarioContext {
        &self.context
    }

    pub fn identity(&self) -> &ScenarioIdentity {
        self.context.scenario()
    }

    pub fn logger(&mut self) -> &mut ScenarioLogger {
        &mut self.logger
    }

    pub fn har(&self) -> &HarRecorder {
        &self.har
    }

    /// Append one exchange to this scenario's HAR
    pub fn record(&mut self, entry: HarEntry) {
        self.har.add_entry(entry);
    }

    /// Persist artifacts per the logging flags, then tear everything down.
    ///
    /// Write failures are logged and leave the corresponding path `None`;
    /// they never prevent teardown.
    pub fn finish(mut self, failed: bool) -> ScenarioArtifacts {
        self.logger.info("Test Complete");
        let persist = self.log_always || (failed && self.log_on_failure);

        let mut artifacts = ScenarioArtifacts::default();
        if persist {
            artifacts.har = self.har.flush(&self.context).unwrap_or_else(|e| {
                tracing::warn!("Failed to write HAR: {}", e);
                None
            });
            artifacts.log = self.logger.flush(&self.context).unwrap_or_else(|e| {
                tracing::warn!("Failed to write scenario log: {}", e);
                None
            });
        }

        self.har.teardown();
        self.logger.teardown();
        self.context.teardown();
        artifacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PropertyFile;
    use crate::har::Exchange;

    fn config(pairs: &[(&str, &str)]) -> ConfigurationManager {
        ConfigurationManager::from_parts("unused", PropertyFile::from_pairs(pairs.iter().copied()))
            .with_env_lookup(|_| None)
    }

    fn entry() -> HarEntry {
        Exchange {
            method: "GET".into(),
            url: "http://localhost/widgets".into(),
            status: 200,
            ..Default::default()
        }
        .into_entry()
    }

    #[test]
    fn test_no_flags_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut session =
            ScenarioSession::start_in(&config(&[]), ScenarioIdentity::new("quiet", "1"), dir.path())
                .unwrap();
        session.record(entry());

        let artifacts = session.finish(true);
        assert_eq!(artifacts, ScenarioArtifacts::default());
        assert!(!dir.path().join("har").exists());
    }

    #[test]
    fn test_log_on_failure_only_when_failed() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&[("logToFileOnFailure", "true")]);

        let mut passed =
            ScenarioSession::start_in(&config, ScenarioIdentity::new("passed", "1"), dir.path()).unwrap();
        passed.record(entry());
        assert_eq!(passed.finish(false), ScenarioArtifacts::default());

        let mut failed =
            ScenarioSession::start_in(&config, ScenarioIdentity::new("failed", "2"), dir.path()).unwrap();
        failed.record(entry());
        let artifacts = failed.finish(true);
        assert_eq!(artifacts.har, Some(dir.path().join("har").join("failed-2.har")));
        assert_eq!(artifacts.log, Some(dir.path().join("logs").join("failed-2.log")));

        let log = std::fs::read_to_string(artifacts.log.unwrap()).unwrap();
        assert!(log.contains("Starting scenario: failed"));
        assert!(log.contains("Test Complete"));
    }

    #[test]
    fn test_log_always_without_calls_skips_har() {
        let dir = tempfile::tempdir().unwrap();
        let session = ScenarioSession::start_in(
            &config(&[("logToFileAlways", "TRUE")]),
            ScenarioIdentity::new("no calls", "3"),
            dir.path(),
        )
        .unwrap();

        let artifacts = session.finish(false);
        assert!(artifacts.har.is_none());
        assert!(artifacts.log.is_some());
    }

    #[test]
    fn test_bad_file_level_fails_start() {
        let config = config(&[("logToFileAlways", "true"), ("minimumLogLevelFile", "LOUD")]);
        assert!(ScenarioSession::start(&config, ScenarioIdentity::new("x", "1")).is_err());
    }
}
