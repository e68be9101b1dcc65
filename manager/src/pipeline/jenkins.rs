//! Jenkins REST client

use async_trait::async_trait;
use openapi_client::models::jenkins::{Artifact, BuildInfo, QueueItem};
use reqwest::header::LOCATION;
use tracing::{debug, info};

use crate::errors::ManagerError;
use crate::http::client::{Auth, HttpClient};
use crate::pipeline::build::{BuildResult, BuildSystem};
use crate::storage::settings::JenkinsSettings;

/// Jenkins server driving parameterized jobs.
///
/// Build identifiers are queue item ids taken from the `Location` header of
/// `buildWithParameters`; the executor build is resolved through the queue.
pub struct JenkinsClient {
    http: HttpClient,
}

impl JenkinsClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn from_settings(settings: &JenkinsSettings) -> Result<Self, ManagerError> {
        let http = HttpClient::new(
            "jenkins",
            &settings.url,
            Auth::Basic {
                username: settings.username.clone(),
                token: settings.api_token.clone(),
            },
        )?;
        Ok(Self::new(http))
    }

    fn job_path(job: &str) -> String {
        job.split('/')
            .filter(|s| !s.is_empty())
            .map(|s| format!("/job/{}", s))
            .collect()
    }
}

/// Trailing numeric segment of a queue item URL such as `.../queue/item/17/`
pub fn parse_queue_id(location: &str, base_url: &str) -> Result<u64, ManagerError> {
    let parsed = match url::Url::parse(location) {
        Ok(u) => u,
        Err(url::ParseError::RelativeUrlWithoutBase) => url::Url::parse(base_url)
            .and_then(|base| base.join(location))
            .map_err(|e| ManagerError::BuildError(format!("invalid Location {}: {}", location, e)))?,
        Err(e) => {
            return Err(ManagerError::BuildError(format!(
                "invalid Location {}: {}",
                location, e
            )))
        }
    };

    parsed
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .and_then(|last| last.parse::<u64>().ok())
        .ok_or_else(|| {
            ManagerError::BuildError(format!("no build identifier in Location {}", location))
        })
}

#[async_trait]
impl BuildSystem for JenkinsClient {
    async fn start_build(
        &self,
        job: &str,
        params: &[(String, String)],
    ) -> Result<u64, ManagerError> {
        let path = format!("{}/buildWithParameters", Self::job_path(job));
        let response = self.http.post_form(&path, params).await?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ManagerError::BuildError(format!("job {} accepted without a Location header", job))
            })?;

        let build_id = parse_queue_id(location, self.http.base_url())?;
        info!("Submitted job {} as queue item {}", job, build_id);
        Ok(build_id)
    }

    async fn poll_build(
        &self,
        job: &str,
        build_id: u64,
    ) -> Result<Option<BuildResult>, ManagerError> {
        let item: QueueItem = self
            .http
            .get(&format!("/queue/item/{}/api/json", build_id))
            .await?;

        if item.cancelled {
            return Ok(Some(BuildResult {
                build_id,
                number: 0,
                url: String::new(),
                result: Some("CANCELLED".to_string()),
                artifacts: Vec::new(),
            }));
        }

        let Some(executable) = item.executable else {
            debug!(
                "Queue item {} still waiting: {}",
                build_id,
                item.why.as_deref().unwrap_or("no reason given")
            );
            return Ok(None);
        };

        let info: BuildInfo = self
            .http
            .get(&format!(
                "{}/{}/api/json",
                Self::job_path(job),
                executable.number
            ))
            .await?;

        if info.building {
            debug!("Build {} of {} is running", info.number, job);
            return Ok(None);
        }

        Ok(Some(BuildResult {
            build_id,
            number: info.number,
            url: info.url,
            result: info.result,
            artifacts: info.artifacts,
        }))
    }

    async fn fetch_artifact(
        &self,
        job: &str,
        build: &BuildResult,
        artifact: &Artifact,
    ) -> Result<Vec<u8>, ManagerError> {
        let path = format!(
            "{}/{}/artifact/{}",
            Self::job_path(job),
            build.number,
            artifact.relative_path
        );
        self.http.get_bytes(&path).await
    }
}
