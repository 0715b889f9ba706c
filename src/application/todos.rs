use crate::application::ledger::AssignmentLedger;
use crate::application::outcome::{Outcome, Rejection};
use crate::application::runtime::{NowProvider, Reporter, next_id, system_clock};
use crate::domain::models::{ProjectSelection, Todo};
use crate::domain::store::DayStore;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::repository::{
    AssignmentFilter, EntityKey, PlannerRepository, TodoFilter, WriteBatch,
};
use chrono::{DateTime, NaiveDate, Utc};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameCommit {
    Renamed(Todo),
    Deleted(Todo),
}

/// Deletes the assignments of `todo_ids` and closes the gaps they leave in
/// every affected block. The todos themselves are not part of the batch.
pub(crate) async fn plan_todo_removal<R: PlannerRepository + ?Sized>(
    repository: &R,
    todo_ids: &[String],
    now: DateTime<Utc>,
) -> Result<WriteBatch, InfraError> {
    if todo_ids.is_empty() {
        return Ok(WriteBatch::new());
    }
    let owned = repository
        .fetch_assignments(&AssignmentFilter::Todos(todo_ids.to_vec()))
        .await?;
    let block_ids = owned
        .iter()
        .map(|assignment| assignment.block_id.clone())
        .collect::<BTreeSet<_>>();
    if block_ids.is_empty() {
        return Ok(WriteBatch::new());
    }
    let siblings = repository
        .fetch_assignments(&AssignmentFilter::Blocks(block_ids.into_iter().collect()))
        .await?;

    let mut scratch = DayStore::new(Vec::new(), Vec::new(), Vec::new(), siblings);
    let mut ledger = AssignmentLedger::new(&mut scratch, now);
    for todo_id in todo_ids {
        ledger.clear_todo(todo_id);
    }
    Ok(ledger.into_batch())
}

/// Open tasks first, then by due date (undated last), then by name.
pub fn compare_todos(left: &Todo, right: &Todo) -> Ordering {
    left.is_completed
        .cmp(&right.is_completed)
        .then_with(|| match (left.due_date, right.due_date) {
            (Some(left), Some(right)) => left.cmp(&right),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| left.name.to_lowercase().cmp(&right.name.to_lowercase()))
        .then_with(|| left.id.cmp(&right.id))
}

pub struct TodoService<R: PlannerRepository> {
    repository: Arc<R>,
    reporter: Reporter,
    now_provider: NowProvider,
}

impl<R: PlannerRepository> TodoService<R> {
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

    async fn find(&self, todo_id: &str) -> Result<Option<Todo>, InfraError> {
        Ok(self
            .repository
            .fetch_todos(&TodoFilter::all())
            .await?
            .into_iter()
            .find(|todo| todo.id == todo_id))
    }

    async fn project_exists(&self, selection: &ProjectSelection) -> Result<bool, InfraError> {
        let Some(project_id) = selection.project_id() else {
            return Ok(true);
        };
        Ok(self
            .repository
            .fetch_projects()
            .await?
            .iter()
            .any(|project| project.id == project_id))
    }

    pub async fn list(&self, selection: &ProjectSelection) -> Outcome<Vec<Todo>> {
        let filter = TodoFilter {
            completed: None,
            project_id: selection.project_id().map(str::to_string),
        };
        match self.repository.fetch_todos(&filter).await {
            Ok(mut todos) => {
                todos.sort_by(compare_todos);
                Outcome::Applied(todos)
            }
            Err(error) => self.fail("list_todos", error),
        }
    }

    pub async fn quick_add(&self, name: &str, selection: &ProjectSelection) -> Outcome<Todo> {
        const OPERATION: &str = "quick_add";
        let name = name.trim();
        if name.is_empty() {
            return self.reject(OPERATION, Rejection::EmptyName);
        }
        match self.project_exists(selection).await {
            Ok(true) => {}
            Ok(false) => {
                let project_id = selection.project_id().unwrap_or_default().to_string();
                return self.reject(OPERATION, Rejection::UnknownProject(project_id));
            }
            Err(error) => return self.fail(OPERATION, error),
        }

        let mut todo = Todo::new(next_id("tsk"), name, self.now());
        todo.project_id = selection.project_id().map(str::to_string);
        let mut batch = WriteBatch::new();
        batch.insert(todo.clone());
        self.commit(OPERATION, batch, todo).await
    }

    async fn update_todo(
        &self,
        operation: &'static str,
        todo_id: &str,
        edit: impl FnOnce(&mut Todo),
    ) -> Outcome<Todo> {
        let current = match self.find(todo_id).await {
            Ok(Some(todo)) => todo,
            Ok(None) => return self.reject(operation, Rejection::UnknownTask(todo_id.to_string())),
            Err(error) => return self.fail(operation, error),
        };
        let mut updated = current.clone();
        edit(&mut updated);
        if updated == current {
            return self.reject(operation, Rejection::Unchanged);
        }

        updated.last_update = self.now();
        let mut batch = WriteBatch::new();
        batch.update(updated.clone());
        self.commit(operation, batch, updated).await
    }

    pub async fn toggle_completed(&self, todo_id: &str) -> Outcome<Todo> {
        self.update_todo("toggle_completed", todo_id, |todo| {
            todo.is_completed = !todo.is_completed;
        })
        .await
    }

    pub async fn toggle_flagged(&self, todo_id: &str) -> Outcome<Todo> {
        self.update_todo("toggle_flagged", todo_id, |todo| {
            todo.is_flagged = !todo.is_flagged;
        })
        .await
    }

    pub async fn set_due_date(&self, todo_id: &str, due_date: Option<NaiveDate>) -> Outcome<Todo> {
        self.update_todo("set_due_date", todo_id, |todo| {
            todo.due_date = due_date;
        })
        .await
    }

    pub async fn move_to_project(&self, todo_id: &str, selection: &ProjectSelection) -> Outcome<Todo> {
        const OPERATION: &str = "move_to_project";
        match self.project_exists(selection).await {
            Ok(true) => {}
            Ok(false) => {
                let project_id = selection.project_id().unwrap_or_default().to_string();
                return self.reject(OPERATION, Rejection::UnknownProject(project_id));
            }
            Err(error) => return self.fail(OPERATION, error),
        }
        let project_id = selection.project_id().map(str::to_string);
        self.update_todo(OPERATION, todo_id, |todo| {
            todo.project_id = project_id;
        })
        .await
    }

    /// Applies an edited name when the field loses focus. A blank name deletes
    /// the task.
    pub async fn commit_name(&self, todo_id: &str, raw_name: &str) -> Outcome<NameCommit> {
        let name = raw_name.trim();
        if name.is_empty() {
            return self.delete(todo_id).await.map(NameCommit::Deleted);
        }
        self.update_todo("rename_todo", todo_id, |todo| {
            todo.name = name.to_string();
        })
        .await
        .map(NameCommit::Renamed)
    }

    pub async fn delete(&self, todo_id: &str) -> Outcome<Todo> {
        const OPERATION: &str = "delete_todo";
        let todo = match self.find(todo_id).await {
            Ok(Some(todo)) => todo,
            Ok(None) => return self.reject(OPERATION, Rejection::UnknownTask(todo_id.to_string())),
            Err(error) => return self.fail(OPERATION, error),
        };

        let ids = [todo.id.clone()];
        let mut batch = match plan_todo_removal(self.repository.as_ref(), &ids, self.now()).await {
            Ok(batch) => batch,
            Err(error) => return self.fail(OPERATION, error),
        };
        batch.delete(EntityKey::Todo(todo.id.clone()));
        self.commit(OPERATION, batch, todo).await
    }
}
