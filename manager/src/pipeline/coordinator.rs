//! Build pipeline coordinator
//!
//! Bridges one asynchronous build job into a release: submit the job, poll it
//! to completion, stage the packaged artifact locally and publish its name
//! through a merge request against the mainline.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use tracing::{debug, info, warn};

use crate::errors::ManagerError;
use crate::filesys::dir::Dir;
use crate::models::release::{PipelineState, Release};
use crate::pipeline::build::{BuildResult, BuildSystem};
use crate::pipeline::vcs::VersionControl;
use crate::storage::settings::{GitlabSettings, JenkinsSettings};

const DEFAULT_TOOLCHAIN: &str = "miku_go1.22.9";

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub job: String,
    pub bins: Vec<String>,
    pub package_prefix: String,
    pub branch: String,
    pub tag: String,
    /// Per-binary toolchain overrides
    pub toolchains: HashMap<String, String>,
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub mainline: String,
    pub version_file: String,
    pub module: String,
    /// Staging directory for downloaded artifacts
    pub downloads: Dir,
}

impl PipelineOptions {
    pub fn from_settings(jenkins: &JenkinsSettings, gitlab: &GitlabSettings, downloads: Dir) -> Self {
        Self {
            job: jenkins.job.clone(),
            bins: jenkins.bins.clone(),
            package_prefix: jenkins.package_prefix.clone(),
            branch: jenkins.branch.clone(),
            tag: jenkins.tag.clone(),
            toolchains: jenkins.toolchains.clone(),
            poll_interval: Duration::from_secs(jenkins.poll_interval_secs),
            timeout: Duration::from_secs(jenkins.timeout_secs),
            mainline: gitlab.mainline.clone(),
            version_file: gitlab.version_file.clone(),
            module: gitlab.module.clone(),
            downloads,
        }
    }
}

/// What a successful pipeline leaves behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    pub mr_url: String,
    pub tar_file_name: String,
}

/// Receives intermediate pipeline milestones so a restart can resume
#[async_trait]
pub trait PipelineProgress: Send + Sync {
    async fn build_started(
        &self,
        release_id: &str,
        build_id: u64,
        started_at: DateTime<Utc>,
    ) -> Result<(), ManagerError>;

    async fn publishing(&self, release_id: &str) -> Result<(), ManagerError>;
}

/// Toolchain image known to build `bin`
pub fn default_toolchain(bin: &str) -> Option<&'static str> {
    match bin {
        "streamd" => Some("miku_go1.20.11"),
        "collector" => Some("miku_go1.23.4"),
        "etlv2" => Some("miku-ubuntu22.04_mvn"),
        "sched" | "netprobe-srv" | "netprobe-cli" | "agent" | "lived" => Some("miku_go1.22.9"),
        _ => None,
    }
}

/// Toolchain for a build; only single-binary builds get a specific one
pub fn toolchain_for(bins: &[String], overrides: &HashMap<String, String>) -> String {
    match bins {
        [bin] => overrides
            .get(bin)
            .cloned()
            .or_else(|| default_toolchain(bin).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_TOOLCHAIN.to_string()),
        _ => DEFAULT_TOOLCHAIN.to_string(),
    }
}

/// `<PREFIX>.<YYYY-MM-DD-HH-MM-SS>.tar.gz`
pub fn package_name(prefix: &str, at: DateTime<Local>) -> String {
    format!("{}.{}.tar.gz", prefix, at.format("%Y-%m-%d-%H-%M-%S"))
}

/// Title of the merge request publishing `version`
pub fn merge_request_title(version: &str) -> String {
    format!("Release {}", version)
}

/// `<module>_<yy_mm_dd_HH_MM_SS>`
pub fn release_branch_name(module: &str, at: DateTime<Local>) -> String {
    format!("{}_{}", module, at.format("%y_%m_%d_%H_%M_%S"))
}

pub fn build_params(
    options: &PipelineOptions,
    release: &Release,
    at: DateTime<Local>,
) -> Vec<(String, String)> {
    let description = if release.description.is_empty() {
        format!("Release {} of {}", release.version, release.project_id)
    } else {
        release.description.clone()
    };

    let mut params = vec![
        ("DESCRIPTION".to_string(), description),
        ("BRANCH".to_string(), options.branch.clone()),
        (
            "GO_VERSION".to_string(),
            toolchain_for(&options.bins, &options.toolchains),
        ),
    ];
    for bin in &options.bins {
        params.push(("BIN".to_string(), bin.clone()));
    }
    params.push((
        "PACKAGE_NAME".to_string(),
        package_name(&options.package_prefix, at),
    ));
    params.push(("REPORTED".to_string(), "false".to_string()));
    params.push(("TAG".to_string(), options.tag.clone()));
    params
}

/// Rewrite the top-level `version` field of a JSON document
pub fn set_version_field(content: &str, version: &str) -> Result<String, ManagerError> {
    let mut doc: serde_json::Value = serde_json::from_str(content)?;
    let object = doc.as_object_mut().ok_or_else(|| {
        ManagerError::VcsError("version file is not a JSON object".to_string())
    })?;
    object.insert(
        "version".to_string(),
        serde_json::Value::String(version.to_string()),
    );
    Ok(format!("{}\n", serde_json::to_string_pretty(&doc)?))
}

pub struct BuildCoordinator {
    build: Arc<dyn BuildSystem>,
    vcs: Arc<dyn VersionControl>,
    options: PipelineOptions,
}

impl BuildCoordinator {
    pub fn new(
        build: Arc<dyn BuildSystem>,
        vcs: Arc<dyn VersionControl>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            build,
            vcs,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub async fn start_job(&self, params: &[(String, String)]) -> Result<u64, ManagerError> {
        self.build.start_build(&self.options.job, params).await
    }

    /// Poll `build_id` until it finishes or the budget counted from `started_at` runs out.
    ///
    /// A build that finishes without a success classification is an error.
    pub async fn wait_for_completion<S, F>(
        &self,
        build_id: u64,
        started_at: DateTime<Utc>,
        sleep_fn: &S,
    ) -> Result<BuildResult, ManagerError>
    where
        S: Fn(Duration) -> F,
        F: Future<Output = ()>,
    {
        let timeout = chrono::Duration::from_std(self.options.timeout)
            .unwrap_or_else(|_| chrono::Duration::hours(3));

        loop {
            if let Some(result) = self.build.poll_build(&self.options.job, build_id).await? {
                if result.is_success() {
                    info!("Build {} (#{}) succeeded", build_id, result.number);
                    return Ok(result);
                }
                return Err(ManagerError::BuildError(result.failure_reason()));
            }

            let elapsed = Utc::now() - started_at;
            if elapsed >= timeout {
                warn!("Build {} still running after {}s", build_id, elapsed.num_seconds());
                return Err(ManagerError::BuildTimeout {
                    build_id,
                    elapsed_secs: elapsed.num_seconds(),
                });
            }

            debug!("Build {} still running, next check in {:?}", build_id, self.options.poll_interval);
            sleep_fn(self.options.poll_interval).await;
        }
    }

    /// Save `artifact_name` of a finished build into the downloads directory
    pub async fn download_artifact(
        &self,
        build: &BuildResult,
        artifact_name: &str,
    ) -> Result<PathBuf, ManagerError> {
        let artifact = build.artifact(artifact_name).ok_or_else(|| {
            ManagerError::ArtifactMissing(format!(
                "{} not in artifacts of build {}",
                artifact_name, build.build_id
            ))
        })?;

        let bytes = self
            .build
            .fetch_artifact(&self.options.job, build, artifact)
            .await?;

        let file = self.options.downloads.file(artifact_name);
        file.write_atomic(&bytes).await?;
        info!("Downloaded {} ({} bytes) to {:?}", artifact_name, bytes.len(), file.path());
        Ok(file.path().to_path_buf())
    }

    /// Point the tracked version file at `version` through a new merge request, returns its URL
    pub async fn publish_version(&self, version: &str) -> Result<String, ManagerError> {
        let options = &self.options;
        let branch = release_branch_name(&options.module, Local::now());

        self.vcs.create_branch(&branch, &options.mainline).await?;

        let current = self
            .vcs
            .read_file(&options.version_file, &options.mainline)
            .await?;
        let updated = set_version_field(&current, version)?;
        self.vcs
            .write_file(
                &options.version_file,
                &branch,
                &updated,
                &format!("Update version to {}", version),
            )
            .await?;

        let mr = self
            .vcs
            .open_merge_request(
                &branch,
                &options.mainline,
                &merge_request_title(version),
                &format!("Automated release for version {}", version),
            )
            .await?;
        Ok(mr.web_url)
    }

    /// URL of the opened or merged request titled exactly `expected_title`
    pub async fn get_mr_url(&self, expected_title: &str) -> Result<Option<String>, ManagerError> {
        for state in ["opened", "merged"] {
            let requests = self.vcs.list_merge_requests(state).await?;
            if let Some(mr) = requests.into_iter().find(|mr| mr.title == expected_title) {
                return Ok(Some(mr.web_url));
            }
        }
        Ok(None)
    }

    /// Drive the whole pipeline for `release`.
    ///
    /// A release already carrying a build id resumes polling that build within
    /// its original budget instead of submitting a new one. One that was
    /// already publishing reuses a merge request opened before the restart.
    pub async fn run<S, F>(
        &self,
        release: &Release,
        progress: &dyn PipelineProgress,
        sleep_fn: S,
    ) -> Result<PipelineOutput, ManagerError>
    where
        S: Fn(Duration) -> F,
        F: Future<Output = ()>,
    {
        let (build_id, started_at) = match release.pipeline.build_id {
            Some(build_id) => {
                let started_at = release.pipeline.started_at.unwrap_or(release.created_at);
                info!("Resuming build {} of release {}", build_id, release.id);
                (build_id, started_at)
            }
            None => {
                let params = build_params(&self.options, release, Local::now());
                let build_id = self.start_job(&params).await?;
                let started_at = Utc::now();
                progress
                    .build_started(&release.id, build_id, started_at)
                    .await?;
                (build_id, started_at)
            }
        };

        let result = self
            .wait_for_completion(build_id, started_at, &sleep_fn)
            .await?;

        let resumed_publish = release.pipeline.state == PipelineState::Publishing;
        progress.publishing(&release.id).await?;

        let tar_file_name = result
            .tarball()
            .map(|a| a.file_name.clone())
            .ok_or_else(|| ManagerError::ArtifactMissing(result.failure_reason()))?;
        self.download_artifact(&result, &tar_file_name).await?;

        let existing = if resumed_publish {
            self.get_mr_url(&merge_request_title(&tar_file_name)).await?
        } else {
            None
        };
        let mr_url = match existing {
            Some(url) => {
                info!("Reusing merge request {} for release {}", url, release.id);
                url
            }
            None => self.publish_version(&tar_file_name).await?,
        };
        Ok(PipelineOutput {
            mr_url,
            tar_file_name,
        })
    }
}
