use crate::domain::palette::{ColorId, DEFAULT_BLOCK_ICON};
use crate::domain::time_grid::DayRange;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Fixed id of the virtual "All" project. It is never persisted.
pub const ALL_PROJECTS_ID: &str = "all";
pub const ALL_PROJECTS_NAME: &str = "All";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeBlock {
    pub id: String,
    pub name: String,
    pub notes: Option<String>,
    pub icon: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub color: Option<ColorId>,
    pub color_is_manual: bool,
    pub notify_at_start: bool,
    pub notify_at_end: bool,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

impl TimeBlock {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            notes: None,
            icon: DEFAULT_BLOCK_ICON.to_string(),
            start_at,
            end_at,
            color: None,
            color_is_manual: false,
            notify_at_start: false,
            notify_at_end: false,
            created_at: now,
            last_update: now,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "block.id")?;
        validate_non_empty(&self.name, "block.name")?;
        validate_non_empty(&self.icon, "block.icon")?;
        if self.end_at <= self.start_at {
            return Err("block.end_at must be after block.start_at".to_string());
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        self.end_at - self.start_at
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration().num_minutes()
    }

    pub fn is_within_single_day(&self, tz: Tz) -> bool {
        DayRange::containing(self.start_at, tz).contains_interval(self.start_at, self.end_at)
    }

    pub fn temporal_state(&self, now: DateTime<Utc>) -> TemporalState {
        if self.end_at <= now {
            TemporalState::Past
        } else if self.start_at <= now {
            TemporalState::Current
        } else {
            TemporalState::Future
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_update = now;
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TemporalState {
    Past,
    Current,
    Future,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    Small,
    Medium,
    Large,
}

pub const SMALL_BLOCK_MAX_HEIGHT: f64 = 80.0;
pub const LARGE_BLOCK_MIN_HEIGHT: f64 = 120.0;

impl DisplayMode {
    pub fn for_height(height: f64) -> Self {
        if height < SMALL_BLOCK_MAX_HEIGHT {
            Self::Small
        } else if height < LARGE_BLOCK_MIN_HEIGHT {
            Self::Medium
        } else {
            Self::Large
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    pub id: String,
    pub name: String,
    pub is_completed: bool,
    pub is_flagged: bool,
    pub due_date: Option<NaiveDate>,
    pub project_id: Option<String>,
    pub last_update: DateTime<Utc>,
}

impl Todo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_completed: false,
            is_flagged: false,
            due_date: None,
            project_id: None,
            last_update: now,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "todo.id")?;
        validate_non_empty(&self.name, "todo.name")?;
        if self.project_id.as_deref() == Some(ALL_PROJECTS_ID) {
            return Err("todo.project_id must not reference the All project".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub color: ColorId,
    pub icon: String,
    pub order_index: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn all(now: DateTime<Utc>) -> Self {
        Self {
            id: ALL_PROJECTS_ID.to_string(),
            name: ALL_PROJECTS_NAME.to_string(),
            color: crate::domain::palette::DEFAULT_BLOCK_COLOR,
            icon: "tray".to_string(),
            order_index: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_all(&self) -> bool {
        self.id == ALL_PROJECTS_ID
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "project.id")?;
        validate_non_empty(&self.name, "project.name")?;
        validate_non_empty(&self.icon, "project.icon")?;
        if self.is_all() {
            return Err("project.id is reserved for the All project".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProjectSelection {
    #[default]
    All,
    Project(String),
}

impl ProjectSelection {
    pub fn from_id(id: &str) -> Self {
        let id = id.trim();
        if id.is_empty() || id == ALL_PROJECTS_ID {
            Self::All
        } else {
            Self::Project(id.to_string())
        }
    }

    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Project(id) => Some(id),
        }
    }

    pub fn includes(&self, todo: &Todo) -> bool {
        match self {
            Self::All => true,
            Self::Project(id) => todo.project_id.as_deref() == Some(id.as_str()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeBlockAssignment {
    pub id: String,
    pub block_id: String,
    pub todo_id: String,
    pub order_index: u32,
    pub assigned_at: DateTime<Utc>,
}

impl TimeBlockAssignment {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "assignment.id")?;
        validate_non_empty(&self.block_id, "assignment.block_id")?;
        validate_non_empty(&self.todo_id, "assignment.todo_id")?;
        Ok(())
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_minutes().max(0);
    let hours = total / 60;
    let minutes = total % 60;
    match (hours, minutes) {
        (0, minutes) => format!("{minutes}m"),
        (hours, 0) => format!("{hours}h"),
        (hours, minutes) => format!("{hours}h {minutes}m"),
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
