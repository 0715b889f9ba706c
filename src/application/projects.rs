use crate::application::outcome::{Outcome, Rejection};
use crate::application::runtime::{NowProvider, Reporter, next_id, system_clock};
use crate::application::todos::plan_todo_removal;
use crate::domain::models::{ALL_PROJECTS_ID, Project};
use crate::domain::palette::{ColorId, DEFAULT_PROJECT_ICON, is_known_icon};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::repository::{EntityKey, PlannerRepository, TodoFilter, WriteBatch};
use chrono::{DateTime, Utc};
use std::sync::Arc;

fn renumber(projects: &mut [Project], now: DateTime<Utc>) -> Vec<Project> {
    let mut changed = Vec::new();
    for (index, project) in projects.iter_mut().enumerate() {
        let index = index as u32;
        if project.order_index != index {
            project.order_index = index;
            project.updated_at = now;
            changed.push(project.clone());
        }
    }
    changed
}

pub struct ProjectCatalog<R: PlannerRepository> {
    repository: Arc<R>,
    reporter: Reporter,
    now_provider: NowProvider,
}

impl<R: PlannerRepository> ProjectCatalog<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            reporter: Reporter::default(),
            now_provider: system_clock(),
        }
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.now_provider)()
    }

    fn reject<T>(&self, operation: &'static str, rejection: Rejection) -> Outcome<T> {
        let outcome = Outcome::Rejected(rejection);
        self.reporter.report(operation, &outcome);
        outcome
    }

    fn fail<T>(&self, operation: &'static str, error: InfraError) -> Outcome<T> {
        let outcome = Outcome::PersistenceFailed(error);
        self.reporter.report(operation, &outcome);
        outcome
    }

    async fn commit<T>(&self, operation: &'static str, batch: WriteBatch, value: T) -> Outcome<T> {
        let outcome = match self.repository.save(batch).await {
            Ok(()) => Outcome::Applied(value),
            Err(error) => Outcome::PersistenceFailed(error),
        };
        self.reporter.report(operation, &outcome);
        outcome
    }

    pub async fn list(&self) -> Outcome<Vec<Project>> {
        match self.repository.fetch_projects().await {
            Ok(projects) => Outcome::Applied(projects),
            Err(error) => self.fail("list_projects", error),
        }
    }

    pub async fn selection_list(&self) -> Outcome<Vec<Project>> {
        let now = self.now();
        self.list().await.map(|projects| {
            std::iter::once(Project::all(now))
                .chain(projects)
                .collect()
        })
    }

    pub async fn create(&self, name: &str, color: ColorId, icon: Option<&str>) -> Outcome<Project> {
        const OPERATION: &str = "create_project";
        let name = name.trim();
        if name.is_empty() {
            return self.reject(OPERATION, Rejection::EmptyName);
        }
        let icon = icon.map(str::trim).unwrap_or(DEFAULT_PROJECT_ICON);
        if !is_known_icon(icon) {
            return self.reject(OPERATION, Rejection::UnknownIcon(icon.to_string()));
        }
        let mut projects = match self.repository.fetch_projects().await {
            Ok(projects) => projects,
            Err(error) => return self.fail(OPERATION, error),
        };

        let now = self.now();
        let mut batch = WriteBatch::new();
        for changed in renumber(&mut projects, now) {
            batch.update(changed);
        }
        let project = Project {
            id: next_id("prj"),
            name: name.to_string(),
            color,
            icon: icon.to_string(),
            order_index: projects.len() as u32,
            created_at: now,
            updated_at: now,
        };
        batch.insert(project.clone());
        self.commit(OPERATION, batch, project).await
    }

    async fn update_project(
        &self,
        operation: &'static str,
        project_id: &str,
        edit: impl FnOnce(&mut Project) -> Result<(), Rejection>,
    ) -> Outcome<Project> {
        if project_id == ALL_PROJECTS_ID {
            return self.reject(operation, Rejection::UnknownProject(project_id.to_string()));
        }
        let current = match self.repository.fetch_projects().await {
            Ok(projects) => projects.into_iter().find(|project| project.id == project_id),
            Err(error) => return self.fail(operation, error),
        };
        let Some(current) = current else {
            return self.reject(operation, Rejection::UnknownProject(project_id.to_string()));
        };

        let mut updated = current.clone();
        if let Err(rejection) = edit(&mut updated) {
            return self.reject(operation, rejection);
        }
        if updated == current {
            return self.reject(operation, Rejection::Unchanged);
        }
        updated.updated_at = self.now();
        let mut batch = WriteBatch::new();
        batch.update(updated.clone());
        self.commit(operation, batch, updated).await
    }

    pub async fn rename(&self, project_id: &str, name: &str) -> Outcome<Project> {
        let name = name.trim();
        self.update_project("rename_project", project_id, |project| {
            if name.is_empty() {
                return Err(Rejection::EmptyName);
            }
            project.name = name.to_string();
            Ok(())
        })
        .await
    }

    pub async fn recolor(&self, project_id: &str, color: ColorId) -> Outcome<Project> {
        self.update_project("recolor_project", project_id, |project| {
            project.color = color;
            Ok(())
        })
        .await
    }

    pub async fn set_icon(&self, project_id: &str, icon: &str) -> Outcome<Project> {
        let icon = icon.trim();
        self.update_project("set_project_icon", project_id, |project| {
            if !is_known_icon(icon) {
                return Err(Rejection::UnknownIcon(icon.to_string()));
            }
            project.icon = icon.to_string();
            Ok(())
        })
        .await
    }

    pub async fn reorder(&self, from: usize, to: usize) -> Outcome<Vec<Project>> {
        const OPERATION: &str = "reorder_projects";
        let mut projects = match self.repository.fetch_projects().await {
            Ok(projects) => projects,
            Err(error) => return self.fail(OPERATION, error),
        };
        if from == to || from >= projects.len() || to >= projects.len() {
            return self.reject(OPERATION, Rejection::Unchanged);
        }

        let moved = projects.remove(from);
        projects.insert(to, moved);
        let mut batch = WriteBatch::new();
        for changed in renumber(&mut projects, self.now()) {
            batch.update(changed);
        }
        self.commit(OPERATION, batch, projects).await
    }

    pub async fn delete(&self, project_id: &str) -> Outcome<Project> {
        const OPERATION: &str = "delete_project";
        if project_id == ALL_PROJECTS_ID {
            return self.reject(OPERATION, Rejection::UnknownProject(project_id.to_string()));
        }
        match self.plan_delete(project_id).await {
            Ok(Some((project, batch))) => self.commit(OPERATION, batch, project).await,
            Ok(None) => self.reject(OPERATION, Rejection::UnknownProject(project_id.to_string())),
            Err(error) => self.fail(OPERATION, error),
        }
    }

    async fn plan_delete(&self, project_id: &str) -> Result<Option<(Project, WriteBatch)>, InfraError> {
        let mut projects = self.repository.fetch_projects().await?;
        let Some(position) = projects.iter().position(|project| project.id == project_id) else {
            return Ok(None);
        };
        let project = projects.remove(position);

        let todo_ids = self
            .repository
            .fetch_todos(&TodoFilter::in_project(project_id))
            .await?
            .into_iter()
            .map(|todo| todo.id)
            .collect::<Vec<_>>();
        let now = self.now();
        let mut batch = plan_todo_removal(self.repository.as_ref(), &todo_ids, now).await?;
        for todo_id in todo_ids {
            batch.delete(EntityKey::Todo(todo_id));
        }
        batch.delete(EntityKey::Project(project.id.clone()));
        for changed in renumber(&mut projects, now) {
            batch.update(changed);
        }
        Ok(Some((project, batch)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{TimeBlock, TimeBlockAssignment, Todo};
    use crate::infrastructure::repository::{AssignmentFilter, InMemoryRepository};

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn now() -> DateTime<Utc> {
        fixed_time("2026-02-16T08:00:00Z")
    }

    fn catalog(repository: Arc<InMemoryRepository>) -> ProjectCatalog<InMemoryRepository> {
        ProjectCatalog::new(repository).with_now_provider(Arc::new(now))
    }

    async fn create_three(catalog: &ProjectCatalog<InMemoryRepository>) -> Vec<Project> {
        let mut created = Vec::new();
        for (name, color) in [("Work", ColorId::Blue), ("Home", ColorId::Green), ("Study", ColorId::Purple)] {
            created.push(
                catalog
                    .create(name, color, None)
                    .await
                    .applied()
                    .expect("created"),
            );
        }
        created
    }

    fn summary(projects: &[Project]) -> Vec<(&str, u32)> {
        projects
            .iter()
            .map(|project| (project.name.as_str(), project.order_index))
            .collect()
    }

    #[tokio::test]
    async fn create_appends_and_selection_list_leads_with_all() {
        let catalog = catalog(Arc::new(InMemoryRepository::default()));
        let created = create_three(&catalog).await;
        assert_eq!(created[2].order_index, 2);
        assert_eq!(created[0].icon, DEFAULT_PROJECT_ICON);

        let selection = catalog.selection_list().await.applied().expect("list");
        assert!(selection[0].is_all());
        assert_eq!(summary(&selection[1..]), vec![("Work", 0), ("Home", 1), ("Study", 2)]);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected() {
        let catalog = catalog(Arc::new(InMemoryRepository::default()));
        assert_eq!(
            catalog.create("  ", ColorId::Red, None).await.rejection(),
            Some(&Rejection::EmptyName)
        );
        assert_eq!(
            catalog.create("Work", ColorId::Red, Some("rocket")).await.rejection(),
            Some(&Rejection::UnknownIcon("rocket".to_string()))
        );
        assert_eq!(
            catalog.rename(ALL_PROJECTS_ID, "Everything").await.rejection(),
            Some(&Rejection::UnknownProject(ALL_PROJECTS_ID.to_string()))
        );
        assert_eq!(
            catalog.delete(ALL_PROJECTS_ID).await.rejection(),
            Some(&Rejection::UnknownProject(ALL_PROJECTS_ID.to_string()))
        );
    }

    #[tokio::test]
    async fn edits_update_the_stored_project() {
        let catalog = catalog(Arc::new(InMemoryRepository::default()));
        let created = create_three(&catalog).await;
        let id = created[0].id.as_str();

        catalog.rename(id, " Office ").await.applied().expect("renamed");
        catalog.recolor(id, ColorId::Red).await.applied().expect("recolored");
        catalog.set_icon(id, "briefcase").await.applied().expect("icon");
        assert_eq!(
            catalog.recolor(id, ColorId::Red).await.rejection(),
            Some(&Rejection::Unchanged)
        );

        let listed = catalog.list().await.applied().expect("list");
        let office = listed.iter().find(|project| project.id == id).expect("present");
        assert_eq!(
            (office.name.as_str(), office.color, office.icon.as_str()),
            ("Office", ColorId::Red, "briefcase")
        );
    }

    #[tokio::test]
    async fn reorder_keeps_indices_dense() {
        let catalog = catalog(Arc::new(InMemoryRepository::default()));
        create_three(&catalog).await;

        let reordered = catalog.reorder(0, 2).await.applied().expect("reordered");
        assert_eq!(summary(&reordered), vec![("Home", 0), ("Study", 1), ("Work", 2)]);
        assert_eq!(catalog.reorder(1, 1).await.rejection(), Some(&Rejection::Unchanged));
        assert_eq!(catalog.reorder(0, 9).await.rejection(), Some(&Rejection::Unchanged));

        let listed = catalog.list().await.applied().expect("list");
        assert_eq!(summary(&listed), vec![("Home", 0), ("Study", 1), ("Work", 2)]);
    }

    #[tokio::test]
    async fn delete_cascades_and_renumbers() {
        let repository = Arc::new(InMemoryRepository::default());
        let catalog = catalog(repository.clone());
        let created = create_three(&catalog).await;
        let work = created[0].id.clone();

        let mut batch = WriteBatch::new();
        batch.insert(TimeBlock::new(
            "blk-1",
            "Focus",
            fixed_time("2026-02-16T09:00:00Z"),
            fixed_time("2026-02-16T10:00:00Z"),
            now(),
        ));
        let mut doomed = Todo::new("t-work", "Report", now());
        doomed.project_id = Some(work.clone());
        batch.insert(doomed);
        batch.insert(Todo::new("t-loose", "Groceries", now()));
        for (index, todo_id) in ["t-work", "t-loose"].into_iter().enumerate() {
            batch.insert(TimeBlockAssignment {
                id: format!("a{index}"),
                block_id: "blk-1".to_string(),
                todo_id: todo_id.to_string(),
                order_index: index as u32,
                assigned_at: now(),
            });
        }
        repository.save(batch).await.expect("seed");

        let deleted = catalog.delete(&work).await.applied().expect("deleted");
        assert_eq!(deleted.name, "Work");

        let listed = catalog.list().await.applied().expect("list");
        assert_eq!(summary(&listed), vec![("Home", 0), ("Study", 1)]);
        let todos = repository.fetch_todos(&TodoFilter::all()).await.expect("todos");
        assert_eq!(todos.len(), 1);
        let assignments = repository
            .fetch_assignments(&AssignmentFilter::Blocks(vec!["blk-1".to_string()]))
            .await
            .expect("assignments");
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].todo_id, "t-loose");
        assert_eq!(assignments[0].order_index, 0);
    }
}
