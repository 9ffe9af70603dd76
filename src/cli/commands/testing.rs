//! Fixtures for command tests: a mock organization behind wiremock, an
//! in-memory config pointing at it and scripted prompts.

use std::sync::Arc;
use wiremock::MockServer;

use crate::cli::context::{Factory, FactoryBuilder};
use crate::config::{ConfigStore, EnvVars};
use crate::infra::git::RemoteRepo;
use crate::infra::iostreams::TestStreams;
use crate::infra::prompter::{Answer, ScriptedPrompter};
use crate::infra::IoStreams;

pub struct Harness {
    pub factory: Arc<Factory>,
    pub streams: TestStreams,
    pub server: MockServer,
    pub prompter: Arc<ScriptedPrompter>,
}

impl Harness {
    /// Organization `contoso` served by a mock server, current repository
    /// `contoso/myproj/myrepo`
    pub async fn start() -> Self {
        Self::with_answers(Vec::new()).await
    }

    pub async fn with_answers(answers: Vec<Answer>) -> Self {
        let server = MockServer::start().await;
        let (io, streams) = IoStreams::test();
        // Status messages only reach a terminal stderr
        let io = io.with_tty(false, false, true);
        let prompter = Arc::new(ScriptedPrompter::new(answers));
        let yaml = format!(
            "default_organization: contoso\norganizations:\n  contoso:\n    url: {}/contoso\n",
            server.uri()
        );
        let factory = FactoryBuilder::new(io)
            .env(EnvVars::from_pairs([("AZDO_TOKEN", "pat")]))
            .config(ConfigStore::from_yaml(&yaml))
            .prompter(prompter.clone())
            .repo(RemoteRepo {
                organization: "contoso".into(),
                project: "myproj".into(),
                repository: "myrepo".into(),
            })
            .build();
        Self {
            factory: Arc::new(factory),
            streams,
            server,
            prompter,
        }
    }

    /// Standard output so far
    pub fn out(&self) -> String {
        self.streams.out.contents()
    }

    /// Standard error so far
    pub fn err(&self) -> String {
        self.streams.err.contents()
    }
}
