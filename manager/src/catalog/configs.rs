//! Config items with an audited change history.
//!
//! Every create, update and delete appends one history entry carrying the
//! operator and reason. A change can also be proposed to the config
//! repository as a merge request against the mainline.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::errors::ManagerError;
use crate::models::config::{
    ChangeAudit, ChangeType, ConfigChangeRequest, ConfigChangeResult, ConfigHistory, ConfigInput,
    ConfigItem, HistoryComparison,
};
use crate::pipeline::VersionControl;
use crate::store::ConfigStore;
use crate::utils::generate_uuid;

fn require(fields: &[(&str, &str)]) -> Result<(), ManagerError> {
    for (field, value) in fields {
        if value.trim().is_empty() {
            return Err(ManagerError::ValidationError(format!("{} is required", field)));
        }
    }
    Ok(())
}

/// Branch-safe form of a config key
fn slug(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

/// `configs/<environment>/<projectId>_<key>.json`
pub fn config_file_path(config: &ConfigItem) -> String {
    format!(
        "configs/{}/{}_{}.json",
        config.environment, config.project_id, config.key
    )
}

fn history_entry(
    config: &ConfigItem,
    change_type: ChangeType,
    old_value: String,
    new_value: String,
    audit: &ChangeAudit,
) -> ConfigHistory {
    ConfigHistory {
        id: generate_uuid(),
        config_id: config.id.clone(),
        project_id: config.project_id.clone(),
        key: config.key.clone(),
        old_value,
        new_value,
        change_type,
        reason: audit.reason.clone(),
        operator: audit.operator.clone(),
        created_at: Utc::now(),
    }
}

pub struct ConfigService {
    store: Arc<dyn ConfigStore>,
    vcs: Arc<dyn VersionControl>,
    mainline: String,
}

impl ConfigService {
    pub fn new(store: Arc<dyn ConfigStore>, vcs: Arc<dyn VersionControl>, mainline: String) -> Self {
        Self {
            store,
            vcs,
            mainline,
        }
    }

    pub async fn list(
        &self,
        project_id: &str,
        environment: &str,
    ) -> Result<Vec<ConfigItem>, ManagerError> {
        self.store.list_configs(project_id, environment).await
    }

    pub async fn get(&self, id: &str) -> Result<ConfigItem, ManagerError> {
        self.store
            .get_config(id)
            .await?
            .ok_or_else(|| ManagerError::NotFound(format!("config {}", id)))
    }

    pub async fn create(
        &self,
        request: ConfigChangeRequest,
    ) -> Result<ConfigChangeResult, ManagerError> {
        let audit = request.audit();
        let input = request.config;
        require(&[
            ("projectId", input.project_id.as_str()),
            ("key", input.key.as_str()),
            ("environment", input.environment.as_str()),
            ("operator", audit.operator.as_str()),
        ])?;

        let now = Utc::now();
        let config = ConfigItem {
            id: generate_uuid(),
            project_id: input.project_id,
            key: input.key,
            value: input.value,
            environment: input.environment,
            description: input.description,
            created_at: now,
            updated_at: now,
        };
        let history = history_entry(
            &config,
            ChangeType::Create,
            String::new(),
            config.value.clone(),
            &audit,
        );
        self.store.insert_config(&config, &history).await?;
        info!(
            "Config {} ({}) created by {}",
            config.id, config.key, audit.operator
        );

        self.finish(config, history, &audit, request.submit_to_gitlab)
            .await
    }

    /// Replace the editable fields of a config; the project stays fixed
    pub async fn update(
        &self,
        id: &str,
        request: ConfigChangeRequest,
    ) -> Result<ConfigChangeResult, ManagerError> {
        let audit = request.audit();
        let input: ConfigInput = request.config;
        require(&[
            ("key", input.key.as_str()),
            ("environment", input.environment.as_str()),
            ("operator", audit.operator.as_str()),
        ])?;

        let current = self.get(id).await?;
        let config = ConfigItem {
            key: input.key,
            value: input.value,
            environment: input.environment,
            description: input.description,
            updated_at: Utc::now(),
            ..current.clone()
        };
        let history = history_entry(
            &config,
            ChangeType::Update,
            current.value,
            config.value.clone(),
            &audit,
        );
        self.store.replace_config(&config, &history).await?;
        info!("Config {} updated by {}", id, audit.operator);

        self.finish(config, history, &audit, request.submit_to_gitlab)
            .await
    }

    pub async fn delete(&self, id: &str, audit: ChangeAudit) -> Result<ConfigHistory, ManagerError> {
        require(&[("operator", audit.operator.as_str())])?;
        let current = self.get(id).await?;
        let history = history_entry(
            &current,
            ChangeType::Delete,
            current.value.clone(),
            String::new(),
            &audit,
        );
        self.store.delete_config(id, &history).await?;
        info!("Config {} deleted by {}", id, audit.operator);
        Ok(history)
    }

    /// History of a config, newest first. Kept after the config is deleted.
    pub async fn history(&self, config_id: &str) -> Result<Vec<ConfigHistory>, ManagerError> {
        self.store.list_config_history(config_id).await
    }

    pub async fn get_history(&self, id: &str) -> Result<ConfigHistory, ManagerError> {
        self.store
            .get_config_history(id)
            .await?
            .ok_or_else(|| ManagerError::NotFound(format!("config history {}", id)))
    }

    pub async fn compare(&self, id1: &str, id2: &str) -> Result<HistoryComparison, ManagerError> {
        require(&[("id1", id1), ("id2", id2)])?;
        let history1 = self.get_history(id1).await?;
        let history2 = self.get_history(id2).await?;
        Ok(HistoryComparison::new(history1, history2))
    }

    /// Commit the config as JSON on a new branch and open a merge request, returns its URL
    pub async fn submit_to_gitlab(
        &self,
        config: &ConfigItem,
        history: &ConfigHistory,
        audit: &ChangeAudit,
    ) -> Result<String, ManagerError> {
        let content = format!("{}\n", serde_json::to_string_pretty(config)?);
        let path = config_file_path(config);
        let suffix: String = history.id.chars().take(8).collect();
        let branch = format!("config-update-{}-{}", slug(&config.key), suffix);

        self.vcs.create_branch(&branch, &self.mainline).await?;
        self.vcs
            .write_file(
                &path,
                &branch,
                &content,
                &format!(
                    "Update config: {}\n\nReason: {}\nOperator: {}",
                    config.key, audit.reason, audit.operator
                ),
            )
            .await?;
        let mr = self
            .vcs
            .open_merge_request(
                &branch,
                &self.mainline,
                &format!("Config update: {}", config.key),
                &format!(
                    "**Key**: {}\n**Environment**: {}\n**Reason**: {}\n**Operator**: {}",
                    config.key, config.environment, audit.reason, audit.operator
                ),
            )
            .await?;
        info!("Config {} proposed in {}", config.id, mr.web_url);
        Ok(mr.web_url)
    }

    async fn finish(
        &self,
        config: ConfigItem,
        history: ConfigHistory,
        audit: &ChangeAudit,
        submit: bool,
    ) -> Result<ConfigChangeResult, ManagerError> {
        let mr_url = if submit {
            match self.submit_to_gitlab(&config, &history, audit).await {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!("Config {} saved but merge request failed: {}", config.id, e);
                    return Err(e);
                }
            }
        } else {
            None
        };
        Ok(ConfigChangeResult {
            config,
            history_id: history.id,
            mr_url,
        })
    }
}
