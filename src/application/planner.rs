use crate::application::bootstrap::bootstrap_workspace;
use crate::application::feedback::FeedbackPort;
use crate::application::outcome::Outcome;
use crate::application::projects::ProjectCatalog;
use crate::application::runtime::{NowProvider, Reporter, system_clock};
use crate::application::scheduler::{SchedulerConfig, TimeBlockScheduler};
use crate::application::todos::{NameCommit, TodoService};
use crate::domain::models::{Project, ProjectSelection, Todo};
use crate::domain::palette::ColorId;
use crate::infrastructure::config::{PlannerSettings, load_settings, save_timezone};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::sqlite_repository::SqliteRepository;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

const DEFAULT_LOG_FILTER: &str = "info";

/// A bootstrapped workspace with every service wired to the same SQLite
/// database, feedback port and failure streak. Task and project changes go
/// through the planner so the scheduler's loaded day is reloaded after each
/// applied one.
pub struct Planner {
    pub scheduler: TimeBlockScheduler<SqliteRepository>,
    projects: ProjectCatalog<SqliteRepository>,
    todos: TodoService<SqliteRepository>,
    settings: PlannerSettings,
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
}

impl Planner {
    pub async fn open(
        workspace_root: &Path,
        feedback: Arc<dyn FeedbackPort>,
    ) -> Result<Self, InfraError> {
        Self::open_with_clock(workspace_root, feedback, system_clock()).await
    }

    pub async fn open_with_clock(
        workspace_root: &Path,
        feedback: Arc<dyn FeedbackPort>,
        now_provider: NowProvider,
    ) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(workspace_root)?;
        init_logging(&bootstrap.logs_dir, DEFAULT_LOG_FILTER)?;

        let settings = bootstrap.settings;
        let repository = Arc::new(SqliteRepository::new(&bootstrap.database_path));
        let reporter = Reporter::new(feedback, settings.scheduling.persistence_notice_threshold);
        let today = now_provider().with_timezone(&settings.timezone).date_naive();

        let mut scheduler = TimeBlockScheduler::new(
            repository.clone(),
            SchedulerConfig::from_settings(&settings),
            today,
        )
        .with_reporter(reporter.clone())
        .with_now_provider(now_provider.clone());
        scheduler.load(today).await;

        let projects = ProjectCatalog::new(repository.clone())
            .with_reporter(reporter.clone())
            .with_now_provider(now_provider.clone());
        let todos = TodoService::new(repository)
            .with_reporter(reporter)
            .with_now_provider(now_provider);

        info!(
            workspace = %bootstrap.workspace_root.display(),
            timezone = %settings.timezone,
            "planner opened"
        );

        Ok(Self {
            scheduler,
            projects,
            todos,
            settings,
            config_dir: bootstrap.config_dir,
            database_path: bootstrap.database_path,
            logs_dir: bootstrap.logs_dir,
        })
    }

    pub fn settings(&self) -> &PlannerSettings {
        &self.settings
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub async fn set_timezone(&mut self, timezone: &str) -> Result<(), InfraError> {
        save_timezone(&self.config_dir, timezone)?;
        self.settings = load_settings(&self.config_dir)?;
        self.scheduler
            .reconfigure(SchedulerConfig::from_settings(&self.settings));
        self.scheduler.refresh().await;
        info!(timezone = %self.settings.timezone, "timezone changed");
        Ok(())
    }

    async fn reload_after<T>(&mut self, outcome: Outcome<T>) -> Outcome<T> {
        if outcome.is_applied() {
            self.scheduler.refresh().await;
        }
        outcome
    }

    pub async fn list_projects(&self) -> Outcome<Vec<Project>> {
        self.projects.list().await
    }

    pub async fn project_selection_list(&self) -> Outcome<Vec<Project>> {
        self.projects.selection_list().await
    }

    pub async fn create_project(
        &mut self,
        name: &str,
        color: ColorId,
        icon: Option<&str>,
    ) -> Outcome<Project> {
        let outcome = self.projects.create(name, color, icon).await;
        self.reload_after(outcome).await
    }

    pub async fn rename_project(&mut self, project_id: &str, name: &str) -> Outcome<Project> {
        let outcome = self.projects.rename(project_id, name).await;
        self.reload_after(outcome).await
    }

    pub async fn recolor_project(&mut self, project_id: &str, color: ColorId) -> Outcome<Project> {
        let outcome = self.projects.recolor(project_id, color).await;
        self.reload_after(outcome).await
    }

    pub async fn set_project_icon(&mut self, project_id: &str, icon: &str) -> Outcome<Project> {
        let outcome = self.projects.set_icon(project_id, icon).await;
        self.reload_after(outcome).await
    }

    pub async fn reorder_projects(&mut self, from: usize, to: usize) -> Outcome<Vec<Project>> {
        let outcome = self.projects.reorder(from, to).await;
        self.reload_after(outcome).await
    }

    pub async fn delete_project(&mut self, project_id: &str) -> Outcome<Project> {
        let outcome = self.projects.delete(project_id).await;
        self.reload_after(outcome).await
    }

    pub async fn list_todos(&self, selection: &ProjectSelection) -> Outcome<Vec<Todo>> {
        self.todos.list(selection).await
    }

    pub async fn quick_add_todo(&mut self, name: &str, selection: &ProjectSelection) -> Outcome<Todo> {
        let outcome = self.todos.quick_add(name, selection).await;
        self.reload_after(outcome).await
    }

    pub async fn toggle_todo_completed(&mut self, todo_id: &str) -> Outcome<Todo> {
        let outcome = self.todos.toggle_completed(todo_id).await;
        self.reload_after(outcome).await
    }

    pub async fn toggle_todo_flagged(&mut self, todo_id: &str) -> Outcome<Todo> {
        let outcome = self.todos.toggle_flagged(todo_id).await;
        self.reload_after(outcome).await
    }

    pub async fn set_todo_due_date(
        &mut self,
        todo_id: &str,
        due_date: Option<NaiveDate>,
    ) -> Outcome<Todo> {
        let outcome = self.todos.set_due_date(todo_id, due_date).await;
        self.reload_after(outcome).await
    }

    pub async fn move_todo_to_project(
        &mut self,
        todo_id: &str,
        selection: &ProjectSelection,
    ) -> Outcome<Todo> {
        let outcome = self.todos.move_to_project(todo_id, selection).await;
        self.reload_after(outcome).await
    }

    pub async fn commit_todo_name(&mut self, todo_id: &str, raw_name: &str) -> Outcome<NameCommit> {
        let outcome = self.todos.commit_name(todo_id, raw_name).await;
        self.reload_after(outcome).await
    }

    pub async fn delete_todo(&mut self, todo_id: &str) -> Outcome<Todo> {
        let outcome = self.todos.delete(todo_id).await;
        self.reload_after(outcome).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::feedback::{FeedbackKind, RecordingFeedback};
    use crate::application::outcome::Rejection;
    use chrono::{DateTime, Utc};

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn clock() -> NowProvider {
        Arc::new(|| fixed_time("2026-02-16T08:00:00Z"))
    }

    #[tokio::test]
    async fn state_survives_reopening_the_workspace() {
        let dir = tempfile::tempdir().expect("temp dir");
        let feedback = Arc::new(RecordingFeedback::default());
        {
            let mut planner = Planner::open_with_clock(dir.path(), feedback.clone(), clock())
                .await
                .expect("open");
            let project = planner
                .create_project("Book", ColorId::Indigo, Some("book"))
                .await
                .applied()
                .expect("project");
            let todo = planner
                .quick_add_todo("Outline", &ProjectSelection::Project(project.id.clone()))
                .await
                .applied()
                .expect("todo");
            let block = planner
                .scheduler
                .create_block("Writing", fixed_time("2026-02-16T09:00:00Z"), None)
                .await
                .applied()
                .expect("block");
            assert!(planner.scheduler.assign_task(&todo.id, &block.id).await.is_applied());
        }

        let planner = Planner::open_with_clock(dir.path(), feedback, clock())
            .await
            .expect("reopen");
        let views = planner.scheduler.block_views();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].name, "Writing");
        assert_eq!(views[0].display_color, ColorId::Indigo);
        assert_eq!(views[0].tasks[0].name, "Outline");
        assert!(planner.database_path().exists());
    }

    #[tokio::test]
    async fn timezone_change_moves_the_day_window() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut planner = Planner::open_with_clock(
            dir.path(),
            Arc::new(RecordingFeedback::default()),
            clock(),
        )
        .await
        .expect("open");

        planner.set_timezone("Asia/Tokyo").await.expect("set timezone");
        assert_eq!(planner.settings().timezone, chrono_tz::Asia::Tokyo);
        assert_eq!(planner.scheduler.day().start, fixed_time("2026-02-15T15:00:00Z"));
        assert!(planner.set_timezone("Nowhere/Special").await.is_err());
    }

    #[tokio::test]
    async fn task_and_project_changes_reach_the_loaded_day() {
        let dir = tempfile::tempdir().expect("temp dir");
        let feedback = Arc::new(RecordingFeedback::default());
        let mut planner = Planner::open_with_clock(dir.path(), feedback.clone(), clock())
            .await
            .expect("open");
        let project = planner
            .create_project("Book", ColorId::Indigo, None)
            .await
            .applied()
            .expect("project");
        let todo = planner
            .quick_add_todo("Outline", &ProjectSelection::Project(project.id.clone()))
            .await
            .applied()
            .expect("todo");
        let block = planner
            .scheduler
            .create_block("Writing", fixed_time("2026-02-16T09:00:00Z"), None)
            .await
            .applied()
            .expect("block");
        assert!(planner.scheduler.assign_task(&todo.id, &block.id).await.is_applied());
        assert_eq!(planner.scheduler.display_color(&block.id), Some(ColorId::Indigo));

        assert!(planner.toggle_todo_completed(&todo.id).await.is_applied());
        let view = planner.scheduler.block_view(&block.id).expect("view");
        assert_eq!((view.active_count, view.completed_count), (0, 1));

        assert!(planner.delete_project(&project.id).await.is_applied());
        assert_eq!(planner.scheduler.display_color(&block.id), Some(ColorId::Gray));
        assert!(planner.scheduler.tasks_for_block(&block.id).is_empty());

        let outcome = planner.scheduler.assign_task(&todo.id, &block.id).await;
        assert!(matches!(outcome.rejection(), Some(Rejection::UnknownTask(_))));
        assert_eq!(feedback.count(FeedbackKind::PersistenceFailed), 0);
    }
}
