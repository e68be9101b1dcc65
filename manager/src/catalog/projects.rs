//! Project catalog

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::errors::ManagerError;
use crate::models::project::{Project, ProjectInput, ProjectStatus};
use crate::store::ProjectStore;
use crate::utils::generate_uuid;

pub struct ProjectService {
    store: Arc<dyn ProjectStore>,
}

impl ProjectService {
    pub fn new(store: Arc<dyn ProjectStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<Project>, ManagerError> {
        self.store.list_projects().await
    }

    pub async fn get(&self, id: &str) -> Result<Project, ManagerError> {
        self.store
            .get_project(id)
            .await?
            .ok_or_else(|| ManagerError::NotFound(format!("project {}", id)))
    }

    /// New projects start `active`
    pub async fn create(&self, input: ProjectInput) -> Result<Project, ManagerError> {
        if input.name.trim().is_empty() {
            return Err(ManagerError::ValidationError("name is required".to_string()));
        }
        let now = Utc::now();
        let mut project = Project {
            id: generate_uuid(),
            name: String::new(),
            code: String::new(),
            description: String::new(),
            owner: String::new(),
            repository_url: String::new(),
            github_url: String::new(),
            build_tool: String::new(),
            deployment_type: String::new(),
            status: ProjectStatus::Active,
            created_at: now,
            updated_at: now,
        };
        project.apply(input, now);
        self.store.insert_project(&project).await?;
        info!("Created project {} ({})", project.id, project.name);
        Ok(project)
    }

    pub async fn update(&self, id: &str, input: ProjectInput) -> Result<Project, ManagerError> {
        if input.name.trim().is_empty() {
            return Err(ManagerError::ValidationError("name is required".to_string()));
        }
        let now = Utc::now();
        self.store
            .update_project(id, Box::new(move |p| p.apply(input, now)))
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ManagerError> {
        if !self.store.delete_project(id).await? {
            return Err(ManagerError::NotFound(format!("project {}", id)));
        }
        info!("Deleted project {}", id);
        Ok(())
    }
}
