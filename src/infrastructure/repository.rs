use crate::domain::models::{Project, TimeBlock, TimeBlockAssignment, Todo};
use crate::domain::time_grid::DayRange;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Block(TimeBlock),
    Todo(Todo),
    Project(Project),
    Assignment(TimeBlockAssignment),
}

impl Entity {
    pub fn key(&self) -> EntityKey {
        match self {
            Self::Block(block) => EntityKey::Block(block.id.clone()),
            Self::Todo(todo) => EntityKey::Todo(todo.id.clone()),
            Self::Project(project) => EntityKey::Project(project.id.clone()),
            Self::Assignment(assignment) => EntityKey::Assignment(assignment.id.clone()),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Block(block) => block.validate(),
            Self::Todo(todo) => todo.validate(),
            Self::Project(project) => project.validate(),
            Self::Assignment(assignment) => assignment.validate(),
        }
    }
}

impl From<TimeBlock> for Entity {
    fn from(value: TimeBlock) -> Self {
        Self::Block(value)
    }
}

impl From<Todo> for Entity {
    fn from(value: Todo) -> Self {
        Self::Todo(value)
    }
}

impl From<Project> for Entity {
    fn from(value: Project) -> Self {
        Self::Project(value)
    }
}

impl From<TimeBlockAssignment> for Entity {
    fn from(value: TimeBlockAssignment) -> Self {
        Self::Assignment(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Block(String),
    Todo(String),
    Project(String),
    Assignment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Insert(Entity),
    Update(Entity),
    Delete(EntityKey),
}

/// Pending inserts, updates and deletes flushed together by
/// [`PlannerRepository::save`]. Either every change lands or none does.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    changes: Vec<Change>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: impl Into<Entity>) -> &mut Self {
        self.changes.push(Change::Insert(entity.into()));
        self
    }

    pub fn update(&mut self, entity: impl Into<Entity>) -> &mut Self {
        self.changes.push(Change::Update(entity.into()));
        self
    }

    pub fn delete(&mut self, key: EntityKey) -> &mut Self {
        self.changes.push(Change::Delete(key));
        self
    }

    pub fn extend(&mut self, other: WriteBatch) -> &mut Self {
        self.changes.extend(other.changes);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn into_changes(self) -> Vec<Change> {
        self.changes
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentFilter {
    Blocks(Vec<String>),
    Todos(Vec<String>),
}

impl AssignmentFilter {
    pub fn matches(&self, assignment: &TimeBlockAssignment) -> bool {
        match self {
            Self::Blocks(ids) => ids.contains(&assignment.block_id),
            Self::Todos(ids) => ids.contains(&assignment.todo_id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoFilter {
    pub completed: Option<bool>,
    pub project_id: Option<String>,
}

impl TodoFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn not_completed() -> Self {
        Self {
            completed: Some(false),
            project_id: None,
        }
    }

    pub fn in_project(project_id: impl Into<String>) -> Self {
        Self {
            completed: None,
            project_id: Some(project_id.into()),
        }
    }

    pub fn matches(&self, todo: &Todo) -> bool {
        self.completed.is_none_or(|completed| todo.is_completed == completed)
            && self
                .project_id
                .as_deref()
                .is_none_or(|project_id| todo.project_id.as_deref() == Some(project_id))
    }
}

#[async_trait]
pub trait PlannerRepository: Send + Sync {
    async fn fetch_blocks(&self, range: &DayRange) -> Result<Vec<TimeBlock>, InfraError>;

    async fn fetch_assignments(
        &self,
        filter: &AssignmentFilter,
    ) -> Result<Vec<TimeBlockAssignment>, InfraError>;

    async fn fetch_todos(&self, filter: &TodoFilter) -> Result<Vec<Todo>, InfraError>;

    async fn fetch_projects(&self) -> Result<Vec<Project>, InfraError>;

    async fn fetch_unassigned_candidates(&self, filter: &TodoFilter) -> Result<Vec<Todo>, InfraError> {
        self.fetch_todos(filter).await
    }

    async fn save(&self, batch: WriteBatch) -> Result<(), InfraError>;
}

#[derive(Debug, Clone, Default)]
struct Tables {
    blocks: HashMap<String, TimeBlock>,
    todos: HashMap<String, Todo>,
    projects: HashMap<String, Project>,
    assignments: HashMap<String, TimeBlockAssignment>,
}

impl Tables {
    fn apply(&mut self, change: Change) -> Result<(), InfraError> {
        match change {
            Change::Insert(entity) => {
                entity.validate().map_err(InfraError::InvalidRecord)?;
                if self.contains(&entity.key()) {
                    return Err(InfraError::Conflict(format!("{:?} already exists", entity.key())));
                }
                self.check_references(&entity)?;
                self.put(entity);
            }
            Change::Update(entity) => {
                entity.validate().map_err(InfraError::InvalidRecord)?;
                if !self.contains(&entity.key()) {
                    return Err(InfraError::Conflict(format!("{:?} does not exist", entity.key())));
                }
                self.check_references(&entity)?;
                self.put(entity);
            }
            Change::Delete(key) => self.remove(&key),
        }
        Ok(())
    }

    fn contains(&self, key: &EntityKey) -> bool {
        match key {
            EntityKey::Block(id) => self.blocks.contains_key(id),
            EntityKey::Todo(id) => self.todos.contains_key(id),
            EntityKey::Project(id) => self.projects.contains_key(id),
            EntityKey::Assignment(id) => self.assignments.contains_key(id),
        }
    }

    fn check_references(&self, entity: &Entity) -> Result<(), InfraError> {
        match entity {
            Entity::Todo(todo) => match todo.project_id.as_deref() {
                Some(project_id) if !self.projects.contains_key(project_id) => Err(
                    InfraError::Conflict(format!("todo references missing project {project_id}")),
                ),
                _ => Ok(()),
            },
            Entity::Assignment(assignment) => {
                if !self.blocks.contains_key(&assignment.block_id) {
                    return Err(InfraError::Conflict(format!(
                        "assignment references missing block {}",
                        assignment.block_id
                    )));
                }
                if !self.todos.contains_key(&assignment.todo_id) {
                    return Err(InfraError::Conflict(format!(
                        "assignment references missing todo {}",
                        assignment.todo_id
                    )));
                }
                let duplicate = self.assignments.values().any(|existing| {
                    existing.id != assignment.id
                        && existing.block_id == assignment.block_id
                        && existing.todo_id == assignment.todo_id
                });
                if duplicate {
                    return Err(InfraError::Conflict(format!(
                        "todo {} is already assigned to block {}",
                        assignment.todo_id, assignment.block_id
                    )));
                }
                Ok(())
            }
            Entity::Block(_) | Entity::Project(_) => Ok(()),
        }
    }

    fn put(&mut self, entity: Entity) {
        match entity {
            Entity::Block(block) => {
                self.blocks.insert(block.id.clone(), block);
            }
            Entity::Todo(todo) => {
                self.todos.insert(todo.id.clone(), todo);
            }
            Entity::Project(project) => {
                self.projects.insert(project.id.clone(), project);
            }
            Entity::Assignment(assignment) => {
                self.assignments.insert(assignment.id.clone(), assignment);
            }
        }
    }

    // Deletes cascade the same way the SQLite foreign keys do.
    fn remove(&mut self, key: &EntityKey) {
        match key {
            EntityKey::Block(id) => {
                self.blocks.remove(id);
                self.assignments.retain(|_, assignment| &assignment.block_id != id);
            }
            EntityKey::Todo(id) => {
                self.todos.remove(id);
                self.assignments.retain(|_, assignment| &assignment.todo_id != id);
            }
            EntityKey::Project(id) => {
                self.projects.remove(id);
                let orphaned = self
                    .todos
                    .values()
                    .filter(|todo| todo.project_id.as_deref() == Some(id.as_str()))
                    .map(|todo| todo.id.clone())
                    .collect::<Vec<_>>();
                for todo_id in orphaned {
                    self.remove(&EntityKey::Todo(todo_id));
                }
            }
            EntityKey::Assignment(id) => {
                self.assignments.remove(id);
            }
        }
    }
}

/// Process-local repository. A batch is applied to a copy of the tables and
/// swapped in only when every change succeeds.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
    failing_saves: AtomicUsize,
    failing_fetches: AtomicUsize,
}

impl InMemoryRepository {
    pub fn fail_next_saves(&self, count: usize) {
        self.failing_saves.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_fetches(&self, count: usize) {
        self.failing_fetches.store(count, Ordering::SeqCst);
    }

    fn take_fault(counter: &AtomicUsize, operation: &str) -> Result<(), InfraError> {
        let tripped = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| remaining.checked_sub(1))
            .is_ok();
        if tripped {
            return Err(InfraError::Unavailable(format!("injected {operation} failure")));
        }
        Ok(())
    }

    fn read<T>(&self, reader: impl FnOnce(&Tables) -> T) -> Result<T, InfraError> {
        Self::take_fault(&self.failing_fetches, "fetch")?;
        let tables = self
            .tables
            .lock()
            .map_err(|error| InfraError::Unavailable(format!("repository lock poisoned: {error}")))?;
        Ok(reader(&tables))
    }
}

#[async_trait]
impl PlannerRepository for InMemoryRepository {
    async fn fetch_blocks(&self, range: &DayRange) -> Result<Vec<TimeBlock>, InfraError> {
        self.read(|tables| {
            let mut blocks = tables
                .blocks
                .values()
                .filter(|block| range.contains(block.start_at))
                .cloned()
                .collect::<Vec<_>>();
            blocks.sort_by(|left, right| left.start_at.cmp(&right.start_at));
            blocks
        })
    }

    async fn fetch_assignments(
        &self,
        filter: &AssignmentFilter,
    ) -> Result<Vec<TimeBlockAssignment>, InfraError> {
        self.read(|tables| {
            let mut assignments = tables
                .assignments
                .values()
                .filter(|assignment| filter.matches(assignment))
                .cloned()
                .collect::<Vec<_>>();
            assignments.sort_by(|left, right| {
                left.block_id
                    .cmp(&right.block_id)
                    .then_with(|| left.order_index.cmp(&right.order_index))
            });
            assignments
        })
    }

    async fn fetch_todos(&self, filter: &TodoFilter) -> Result<Vec<Todo>, InfraError> {
        self.read(|tables| {
            let mut todos = tables
                .todos
                .values()
                .filter(|todo| filter.matches(todo))
                .cloned()
                .collect::<Vec<_>>();
            todos.sort_by(|left, right| left.id.cmp(&right.id));
            todos
        })
    }

    async fn fetch_projects(&self) -> Result<Vec<Project>, InfraError> {
        self.read(|tables| {
            let mut projects = tables.projects.values().cloned().collect::<Vec<_>>();
            projects.sort_by(|left, right| {
                left.order_index
                    .cmp(&right.order_index)
                    .then_with(|| left.created_at.cmp(&right.created_at))
            });
            projects
        })
    }

    async fn save(&self, batch: WriteBatch) -> Result<(), InfraError> {
        Self::take_fault(&self.failing_saves, "save")?;
        let mut tables = self
            .tables
            .lock()
            .map_err(|error| InfraError::Unavailable(format!("repository lock poisoned: {error}")))?;
        let mut staged = tables.clone();
        for change in batch.into_changes() {
            staged.apply(change)?;
        }
        *tables = staged;
        Ok(())
    }
}
