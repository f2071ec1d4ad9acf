//! Cucumber world and the process-wide harness it runs against

use cucumber::World;
use once_cell::sync::OnceCell;
use std::path::PathBuf;

use apicheck_bdd::ApiSteps;
use apicheck_client::HttpTransport;
use apicheck_common::{
    ConfigurationManager, Result, ScenarioArtifacts, ScenarioIdentity, ScenarioSession,
};

/// Shared, read-only state built once before the first scenario
#[derive(Debug)]
pub struct Harness {
    pub config: ConfigurationManager,
    pub transport: Box<dyn HttpTransport>,
    pub requests_dir: PathBuf,
    pub artifact_root: PathBuf,
}

static HARNESS: OnceCell<Harness> = OnceCell::new();

pub fn install(harness: Harness) {
    if HARNESS.set(harness).is_err() {
        tracing::warn!("Harness already installed, keeping the first one");
    }
}

pub fn harness() -> &'static Harness {
    HARNESS.get().expect("harness is installed before cucumber runs")
}

/// One scenario's state. The session is opened by the before hook and
/// closed by the after hook.
#[derive(Debug, World)]
#[world(init = Self::new)]
pub struct ApiWorld {
    pub steps: ApiSteps,
    session: Option<ScenarioSession>,
}

impl ApiWorld {
    fn new() -> Self {
        Self {
            steps: ApiSteps::new(),
            session: None,
        }
    }

    pub fn begin(&mut self, identity: ScenarioIdentity) -> Result<()> {
        let harness = harness();
        let session = ScenarioSession::start_in(&harness.config, identity, &harness.artifact_root)?;
        self.session = Some(session);
        Ok(())
    }

    pub fn session(&mut self) -> &mut ScenarioSession {
        self.session
            .as_mut()
            .expect("No active scenario: the before hook did not start a session")
    }

    /// Step state and the session, borrowed together
    pub fn parts(&mut self) -> (&mut ApiSteps, &mut ScenarioSession) {
        let session = self
            .session
            .as_mut()
            .expect("No active scenario: the before hook did not start a session");
        (&mut self.steps, session)
    }

    pub fn finish(&mut self, failed: bool) -> Option<ScenarioArtifacts> {
        self.session.take().map(|session| session.finish(failed))
    }
}
