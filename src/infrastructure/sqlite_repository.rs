use crate::domain::models::{Project, TimeBlock, TimeBlockAssignment, Todo};
use crate::domain::palette::ColorId;
use crate::domain::time_grid::DayRange;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::repository::{
    AssignmentFilter, Change, Entity, EntityKey, PlannerRepository, TodoFilter, WriteBatch,
};
use crate::infrastructure::storage::open_connection;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, Row, params, params_from_iter};
use std::path::{Path, PathBuf};

const BLOCK_COLUMNS: &str = "id, name, notes, icon, start_at, end_at, color, color_is_manual, \
     notify_at_start, notify_at_end, created_at, last_update";
const TODO_COLUMNS: &str = "id, name, is_completed, is_flagged, due_date, project_id, last_update";
const PROJECT_COLUMNS: &str = "id, name, color, icon, order_index, created_at, updated_at";
const ASSIGNMENT_COLUMNS: &str = "id, block_id, todo_id, order_index, assigned_at";

#[derive(Debug, Clone)]
pub struct SqliteRepository {
    db_path: PathBuf,
}

impl SqliteRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    async fn with_connection<T, F>(&self, work: F) -> Result<T, InfraError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, InfraError> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = open_connection(&db_path)?;
            work(&mut connection)
        })
        .await
        .map_err(|error| InfraError::Unavailable(format!("storage task failed: {error}")))?
    }
}

fn encode_timestamp(value: DateTime<Utc>) -> String {
    // Fixed width keeps lexical order equal to chronological order.
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    index: usize,
    error: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, error.into())
}

fn timestamp_column(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| conversion_error(index, error))
}

fn color_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<ColorId>> {
    let raw: Option<String> = row.get(index)?;
    raw.map(|value| value.parse::<ColorId>().map_err(|error| conversion_error(index, error)))
        .transpose()
}

fn date_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(index)?;
    raw.map(|value| {
        NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|error| conversion_error(index, error))
    })
    .transpose()
}

fn block_from_row(row: &Row<'_>) -> rusqlite::Result<TimeBlock> {
    Ok(TimeBlock {
        id: row.get(0)?,
        name: row.get(1)?,
        notes: row.get(2)?,
        icon: row.get(3)?,
        start_at: timestamp_column(row, 4)?,
        end_at: timestamp_column(row, 5)?,
        color: color_column(row, 6)?,
        color_is_manual: row.get(7)?,
        notify_at_start: row.get(8)?,
        notify_at_end: row.get(9)?,
        created_at: timestamp_column(row, 10)?,
        last_update: timestamp_column(row, 11)?,
    })
}

fn todo_from_row(row: &Row<'_>) -> rusqlite::Result<Todo> {
    Ok(Todo {
        id: row.get(0)?,
        name: row.get(1)?,
        is_completed: row.get(2)?,
        is_flagged: row.get(3)?,
        due_date: date_column(row, 4)?,
        project_id: row.get(5)?,
        last_update: timestamp_column(row, 6)?,
    })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    let color = color_column(row, 2)?.ok_or_else(|| conversion_error(2, "project color is required"))?;
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        color,
        icon: row.get(3)?,
        order_index: row.get(4)?,
        created_at: timestamp_column(row, 5)?,
        updated_at: timestamp_column(row, 6)?,
    })
}

fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<TimeBlockAssignment> {
    Ok(TimeBlockAssignment {
        id: row.get(0)?,
        block_id: row.get(1)?,
        todo_id: row.get(2)?,
        order_index: row.get(3)?,
        assigned_at: timestamp_column(row, 4)?,
    })
}

fn map_constraint(error: rusqlite::Error, key: &EntityKey) -> InfraError {
    match error.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => {
            InfraError::Conflict(format!("{key:?} violates a constraint: {error}"))
        }
        _ => InfraError::Sqlite(error),
    }
}

fn insert_entity(connection: &Connection, entity: &Entity) -> rusqlite::Result<usize> {
    match entity {
        Entity::Block(block) => connection.execute(
            &format!("INSERT INTO time_blocks ({BLOCK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"),
            params![
                block.id,
                block.name,
                block.notes,
                block.icon,
                encode_timestamp(block.start_at),
                encode_timestamp(block.end_at),
                block.color.map(ColorId::as_str),
                block.color_is_manual,
                block.notify_at_start,
                block.notify_at_end,
                encode_timestamp(block.created_at),
                encode_timestamp(block.last_update),
            ],
        ),
        Entity::Todo(todo) => connection.execute(
            &format!("INSERT INTO todos ({TODO_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                todo.id,
                todo.name,
                todo.is_completed,
                todo.is_flagged,
                todo.due_date.map(|date| date.format("%Y-%m-%d").to_string()),
                todo.project_id,
                encode_timestamp(todo.last_update),
            ],
        ),
        Entity::Project(project) => connection.execute(
            &format!("INSERT INTO projects ({PROJECT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                project.id,
                project.name,
                project.color.as_str(),
                project.icon,
                project.order_index,
                encode_timestamp(project.created_at),
                encode_timestamp(project.updated_at),
            ],
        ),
        Entity::Assignment(assignment) => connection.execute(
            &format!("INSERT INTO time_block_assignments ({ASSIGNMENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
            params![
                assignment.id,
                assignment.block_id,
                assignment.todo_id,
                assignment.order_index,
                encode_timestamp(assignment.assigned_at),
            ],
        ),
    }
}

fn update_entity(connection: &Connection, entity: &Entity) -> rusqlite::Result<usize> {
    match entity {
        Entity::Block(block) => connection.execute(
            "UPDATE time_blocks SET name = ?2, notes = ?3, icon = ?4, start_at = ?5, end_at = ?6,
               color = ?7, color_is_manual = ?8, notify_at_start = ?9, notify_at_end = ?10,
               last_update = ?11
             WHERE id = ?1",
            params![
                block.id,
                block.name,
                block.notes,
                block.icon,
                encode_timestamp(block.start_at),
                encode_timestamp(block.end_at),
                block.color.map(ColorId::as_str),
                block.color_is_manual,
                block.notify_at_start,
                block.notify_at_end,
                encode_timestamp(block.last_update),
            ],
        ),
        Entity::Todo(todo) => connection.execute(
            "UPDATE todos SET name = ?2, is_completed = ?3, is_flagged = ?4, due_date = ?5,
               project_id = ?6, last_update = ?7
             WHERE id = ?1",
            params![
                todo.id,
                todo.name,
                todo.is_completed,
                todo.is_flagged,
                todo.due_date.map(|date| date.format("%Y-%m-%d").to_string()),
                todo.project_id,
                encode_timestamp(todo.last_update),
            ],
        ),
        Entity::Project(project) => connection.execute(
            "UPDATE projects SET name = ?2, color = ?3, icon = ?4, order_index = ?5, updated_at = ?6
             WHERE id = ?1",
            params![
                project.id,
                project.name,
                project.color.as_str(),
                project.icon,
                project.order_index,
                encode_timestamp(project.updated_at),
            ],
        ),
        Entity::Assignment(assignment) => connection.execute(
            "UPDATE time_block_assignments SET block_id = ?2, todo_id = ?3, order_index = ?4
             WHERE id = ?1",
            params![
                assignment.id,
                assignment.block_id,
                assignment.todo_id,
                assignment.order_index,
            ],
        ),
    }
}

fn delete_entity(connection: &Connection, key: &EntityKey) -> rusqlite::Result<usize> {
    let (table, id) = match key {
        EntityKey::Block(id) => ("time_blocks", id),
        EntityKey::Todo(id) => ("todos", id),
        EntityKey::Project(id) => ("projects", id),
        EntityKey::Assignment(id) => ("time_block_assignments", id),
    };
    connection.execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])
}

fn apply_change(connection: &Connection, change: Change) -> Result<(), InfraError> {
    match change {
        Change::Insert(entity) => {
            entity.validate().map_err(InfraError::InvalidRecord)?;
            insert_entity(connection, &entity).map_err(|error| map_constraint(error, &entity.key()))?;
        }
        Change::Update(entity) => {
            entity.validate().map_err(InfraError::InvalidRecord)?;
            let updated =
                update_entity(connection, &entity).map_err(|error| map_constraint(error, &entity.key()))?;
            if updated == 0 {
                return Err(InfraError::Conflict(format!("{:?} does not exist", entity.key())));
            }
        }
        Change::Delete(key) => {
            delete_entity(connection, &key)?;
        }
    }
    Ok(())
}

#[async_trait]
impl PlannerRepository for SqliteRepository {
    async fn fetch_blocks(&self, range: &DayRange) -> Result<Vec<TimeBlock>, InfraError> {
        let start = encode_timestamp(range.start);
        let end = encode_timestamp(range.end);
        self.with_connection(move |connection| {
            let mut statement = connection.prepare(&format!(
                "SELECT {BLOCK_COLUMNS} FROM time_blocks
                 WHERE start_at >= ?1 AND start_at < ?2
                 ORDER BY start_at ASC"
            ))?;
            let rows = statement.query_map(params![start, end], block_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn fetch_assignments(
        &self,
        filter: &AssignmentFilter,
    ) -> Result<Vec<TimeBlockAssignment>, InfraError> {
        let (column, ids) = match filter {
            AssignmentFilter::Blocks(ids) => ("block_id", ids.clone()),
            AssignmentFilter::Todos(ids) => ("todo_id", ids.clone()),
        };
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.with_connection(move |connection| {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let mut statement = connection.prepare(&format!(
                "SELECT {ASSIGNMENT_COLUMNS} FROM time_block_assignments
                 WHERE {column} IN ({placeholders})
                 ORDER BY block_id ASC, order_index ASC"
            ))?;
            let rows = statement.query_map(params_from_iter(ids.iter()), assignment_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn fetch_todos(&self, filter: &TodoFilter) -> Result<Vec<Todo>, InfraError> {
        let filter = filter.clone();
        self.with_connection(move |connection| {
            let mut statement = connection.prepare(&format!(
                "SELECT {TODO_COLUMNS} FROM todos
                 WHERE (?1 IS NULL OR is_completed = ?1)
                   AND (?2 IS NULL OR project_id = ?2)
                 ORDER BY id ASC"
            ))?;
            let rows = statement.query_map(params![filter.completed, filter.project_id], todo_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn fetch_projects(&self) -> Result<Vec<Project>, InfraError> {
        self.with_connection(|connection| {
            let mut statement = connection.prepare(&format!(
                "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY order_index ASC, created_at ASC"
            ))?;
            let rows = statement.query_map([], project_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn save(&self, batch: WriteBatch) -> Result<(), InfraError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.with_connection(move |connection| {
            let transaction = connection.transaction()?;
            for change in batch.into_changes() {
                apply_change(&transaction, change)?;
            }
            transaction.commit()?;
            Ok(())
        })
        .await
    }
}
