use crate::domain::color_resolver::resolve_display_color;
use crate::domain::models::{DisplayMode, TemporalState, TimeBlock, Todo, format_duration};
use crate::domain::palette::{ColorId, Palette};
use crate::domain::store::DayStore;
use crate::domain::time_grid::{DayRange, TimeGrid};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const TASK_PREVIEW_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub id: String,
    pub name: String,
    pub is_completed: bool,
    pub is_flagged: bool,
    pub project_id: Option<String>,
}

impl From<&Todo> for TaskSummary {
    fn from(todo: &Todo) -> Self {
        Self {
            id: todo.id.clone(),
            name: todo.name.clone(),
            is_completed: todo.is_completed,
            is_flagged: todo.is_flagged,
            project_id: todo.project_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskPreview {
    pub shown: Vec<TaskSummary>,
    pub remaining: usize,
}

impl TaskPreview {
    pub fn more_label(&self) -> Option<String> {
        (self.remaining > 0).then(|| format!("+{} more", self.remaining))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlockView {
    pub id: String,
    pub name: String,
    pub notes: Option<String>,
    pub icon: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub formatted_duration: String,
    pub tasks: Vec<TaskSummary>,
    pub active_count: usize,
    pub completed_count: usize,
    pub display_color: ColorId,
    pub palette: Palette,
    pub temporal_state: TemporalState,
    pub notify_at_start: bool,
    pub notify_at_end: bool,
    pub top: f64,
    pub height: f64,
    pub display_mode: DisplayMode,
}

impl BlockView {
    pub fn build(
        block: &TimeBlock,
        store: &DayStore,
        grid: &TimeGrid,
        day: &DayRange,
        now: DateTime<Utc>,
    ) -> Self {
        let tasks = store.tasks_for_block(&block.id);
        let display_color =
            resolve_display_color(block, tasks.iter().copied(), |project_id| store.project_color(project_id));
        let completed_count = tasks.iter().filter(|todo| todo.is_completed).count();
        let height = grid.height_for(block.start_at, block.end_at, day);

        Self {
            id: block.id.clone(),
            name: block.name.clone(),
            notes: block.notes.clone(),
            icon: block.icon.clone(),
            start_at: block.start_at,
            end_at: block.end_at,
            duration_minutes: block.duration_minutes(),
            formatted_duration: format_duration(block.duration()),
            active_count: tasks.len() - completed_count,
            completed_count,
            tasks: tasks.into_iter().map(TaskSummary::from).collect(),
            display_color,
            palette: display_color.palette(),
            temporal_state: block.temporal_state(now),
            notify_at_start: block.notify_at_start,
            notify_at_end: block.notify_at_end,
            top: grid.position_for_instant(block.start_at, day),
            height,
            display_mode: DisplayMode::for_height(height),
        }
    }

    pub fn task_preview(&self) -> TaskPreview {
        let shown = self
            .tasks
            .iter()
            .take(TASK_PREVIEW_LIMIT)
            .cloned()
            .collect::<Vec<_>>();
        TaskPreview {
            remaining: self.tasks.len() - shown.len(),
            shown,
        }
    }
}
