//! Day-scoped block scheduling.
//!
//! Every mutation validates against the in-memory day, saves one batch and
//! reloads the day from the repository, so the loaded state always mirrors
//! what was persisted. A failed save therefore rolls back on its own.

use crate::application::block_view::BlockView;
use crate::application::ledger::AssignmentLedger;
use crate::application::outcome::{Outcome, Rejection};
use crate::application::runtime::{NowProvider, Reporter, next_id, system_clock};
use crate::domain::color_resolver::resolve_display_color;
use crate::domain::models::{TimeBlock, TimeBlockAssignment, Todo};
use crate::domain::overlap::{SlotSearch, find_next_free_slot, first_conflict};
use crate::domain::palette::{ColorId, is_known_icon};
use crate::domain::store::DayStore;
use crate::domain::time_grid::{DayRange, TimeGrid};
use crate::infrastructure::config::PlannerSettings;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::repository::{
    AssignmentFilter, EntityKey, PlannerRepository, TodoFilter, WriteBatch,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

const EXTEND_STEP_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    pub grid: TimeGrid,
    pub default_block_minutes: u32,
    pub latest_start: NaiveTime,
}

impl SchedulerConfig {
    pub fn from_settings(settings: &PlannerSettings) -> Self {
        let scheduling = &settings.scheduling;
        Self {
            grid: TimeGrid::new(
                settings.timezone,
                scheduling.hour_height,
                scheduling.grid_interval_minutes,
            ),
            default_block_minutes: scheduling.default_block_minutes,
            latest_start: scheduling
                .latest_start_time()
                .unwrap_or_else(|_| Self::default().latest_start),
        }
    }

    pub fn min_duration(&self) -> Duration {
        self.grid.interval()
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            grid: TimeGrid::default(),
            default_block_minutes: 60,
            latest_start: NaiveTime::from_hms_opt(23, 45, 0).expect("valid fixed time"),
        }
    }
}

/// Stored data that does not fit the day's rules. Reported, never repaired
/// silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityAnomaly {
    CrossesMidnight { block_id: String },
    InvalidRange { block_id: String },
    PrunedAssignment { assignment_id: String },
}

pub struct TimeBlockScheduler<R: PlannerRepository> {
    repository: Arc<R>,
    config: SchedulerConfig,
    reporter: Reporter,
    now_provider: NowProvider,
    day: DayRange,
    store: DayStore,
    anomalies: Vec<IntegrityAnomaly>,
}

impl<R: PlannerRepository> TimeBlockScheduler<R> {
    pub fn new(repository: Arc<R>, config: SchedulerConfig, day: NaiveDate) -> Self {
        Self {
            repository,
            day: config.grid.day(day),
            config,
            reporter: Reporter::default(),
            now_provider: system_clock(),
            store: DayStore::default(),
            anomalies: Vec::new(),
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

    pub fn reconfigure(&mut self, config: SchedulerConfig) {
        self.day = config.grid.day(self.day.day);
        self.config = config;
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.config.grid
    }

    pub fn day(&self) -> &DayRange {
        &self.day
    }

    pub fn store(&self) -> &DayStore {
        &self.store
    }

    pub fn anomalies(&self) -> &[IntegrityAnomaly] {
        &self.anomalies
    }

    pub fn blocks(&self) -> Vec<&TimeBlock> {
        self.store.blocks()
    }

    pub fn block(&self, block_id: &str) -> Option<&TimeBlock> {
        self.store.block(block_id)
    }

    pub fn tasks_for_block(&self, block_id: &str) -> Vec<&Todo> {
        self.store.tasks_for_block(block_id)
    }

    pub fn display_color(&self, block_id: &str) -> Option<ColorId> {
        let block = self.store.block(block_id)?;
        Some(resolve_display_color(
            block,
            self.store.tasks_for_block(block_id),
            |project_id| self.store.project_color(project_id),
        ))
    }

    pub fn block_view(&self, block_id: &str) -> Option<BlockView> {
        let block = self.store.block(block_id)?;
        Some(BlockView::build(block, &self.store, &self.config.grid, &self.day, self.now()))
    }

    pub fn block_views(&self) -> Vec<BlockView> {
        let now = self.now();
        self.store
            .blocks()
            .into_iter()
            .map(|block| BlockView::build(block, &self.store, &self.config.grid, &self.day, now))
            .collect()
    }

    pub fn instant_at(&self, y: f64) -> DateTime<Utc> {
        self.config.grid.instant_for_position(y, &self.day)
    }

    /// Replaces the loaded day. On failure the day is left empty.
    pub async fn load(&mut self, day: NaiveDate) -> Outcome<usize> {
        self.day = self.config.grid.day(day);
        match self.fetch_day().await {
            Ok(store) => {
                self.install(store).await;
                info!(
                    day = %self.day.day,
                    blocks = self.store.block_count(),
                    anomalies = self.anomalies.len(),
                    "day loaded"
                );
                Outcome::Applied(self.store.block_count())
            }
            Err(error) => {
                self.store = DayStore::default();
                self.anomalies.clear();
                let outcome = Outcome::PersistenceFailed(error);
                self.reporter.report("load_day", &outcome);
                outcome
            }
        }
    }

    pub async fn refresh(&mut self) -> Outcome<usize> {
        self.load(self.day.day).await
    }

    async fn fetch_day(&self) -> Result<DayStore, InfraError> {
        let blocks = self.repository.fetch_blocks(&self.day).await?;
        let block_ids = blocks.iter().map(|block| block.id.clone()).collect();
        let assignments = self
            .repository
            .fetch_assignments(&AssignmentFilter::Blocks(block_ids))
            .await?;
        let todos = self.repository.fetch_todos(&TodoFilter::all()).await?;
        let projects = self.repository.fetch_projects().await?;
        Ok(DayStore::new(blocks, todos, projects, assignments))
    }

    async fn install(&mut self, mut store: DayStore) {
        let report = store.prune_invalid_assignments();

        let mut anomalies = Vec::new();
        for block in store.blocks() {
            if block.end_at <= block.start_at {
                warn!(block_id = %block.id, "block ends before it starts");
                anomalies.push(IntegrityAnomaly::InvalidRange {
                    block_id: block.id.clone(),
                });
            } else if !self.day.contains_interval(block.start_at, block.end_at) {
                warn!(block_id = %block.id, "block crosses midnight");
                anomalies.push(IntegrityAnomaly::CrossesMidnight {
                    block_id: block.id.clone(),
                });
            }
        }
        anomalies.extend(report.removed.iter().map(|assignment| {
            IntegrityAnomaly::PrunedAssignment {
                assignment_id: assignment.id.clone(),
            }
        }));

        if !report.is_empty() {
            warn!(
                removed = report.removed.len(),
                renumbered = report.renumbered.len(),
                "repairing assignments"
            );
            let mut batch = WriteBatch::new();
            for removed in &report.removed {
                batch.delete(EntityKey::Assignment(removed.id.clone()));
            }
            for renumbered in report.renumbered {
                batch.update(renumbered);
            }
            if let Err(error) = self.repository.save(batch).await {
                warn!(error = %error, "could not persist assignment repair");
            }
        }

        self.store = store;
        self.anomalies = anomalies;
    }

    async fn commit<T>(&mut self, operation: &'static str, batch: WriteBatch, value: T) -> Outcome<T> {
        let outcome = match self.repository.save(batch).await {
            Ok(()) => Outcome::Applied(value),
            Err(error) => Outcome::PersistenceFailed(error),
        };
        self.reporter.report(operation, &outcome);
        self.refresh().await;
        outcome
    }

    fn reject<T>(&self, operation: &'static str, rejection: Rejection) -> Outcome<T> {
        let outcome = Outcome::Rejected(rejection);
        self.reporter.report(operation, &outcome);
        outcome
    }

    fn check_placement(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        excluding: Option<&str>,
    ) -> Result<(), Rejection> {
        if start >= self.day.end || end <= self.day.start {
            return Err(Rejection::OutsideLoadedDay);
        }
        if start < self.day.start || end > self.day.end {
            return Err(Rejection::CrossesDayBoundary);
        }
        if end <= start {
            return Err(Rejection::DurationTooShort {
                minimum_minutes: self.config.grid.interval_minutes(),
            });
        }
        let existing = self.store.block_list();
        match first_conflict(start, end - start, &existing, excluding) {
            Some(conflict) => Err(Rejection::Overlap {
                with: conflict.id.clone(),
            }),
            None => Ok(()),
        }
    }

    fn block_duration(&self, duration_minutes: Option<u32>) -> Result<Duration, Rejection> {
        let minutes = duration_minutes.unwrap_or(self.config.default_block_minutes);
        if minutes < self.config.grid.interval_minutes() {
            return Err(Rejection::DurationTooShort {
                minimum_minutes: self.config.grid.interval_minutes(),
            });
        }
        Ok(Duration::minutes(i64::from(minutes)))
    }

    pub async fn create_block(
        &mut self,
        name: &str,
        at: DateTime<Utc>,
        duration_minutes: Option<u32>,
    ) -> Outcome<TimeBlock> {
        const OPERATION: &str = "create_block";
        let name = name.trim();
        if name.is_empty() {
            return self.reject(OPERATION, Rejection::EmptyName);
        }
        let duration = match self.block_duration(duration_minutes) {
            Ok(duration) => duration,
            Err(rejection) => return self.reject(OPERATION, rejection),
        };
        let start = self.config.grid.snap_to_grid(at);
        let end = start + duration;
        if let Err(rejection) = self.check_placement(start, end, None) {
            return self.reject(OPERATION, rejection);
        }

        let block = TimeBlock::new(next_id("blk"), name, start, end, self.now());
        let mut batch = WriteBatch::new();
        batch.insert(block.clone());
        self.commit(OPERATION, batch, block).await
    }

    /// Creates a block at the first free grid slot at or after `after`. Without
    /// `after` the search starts now, or at the start of a day that is not today.
    pub async fn create_in_next_free_slot(
        &mut self,
        name: &str,
        after: Option<DateTime<Utc>>,
        duration_minutes: Option<u32>,
    ) -> Outcome<TimeBlock> {
        const OPERATION: &str = "create_in_next_free_slot";
        if name.trim().is_empty() {
            return self.reject(OPERATION, Rejection::EmptyName);
        }
        let duration = match self.block_duration(duration_minutes) {
            Ok(duration) => duration,
            Err(rejection) => return self.reject(OPERATION, rejection),
        };

        let now = self.now();
        let after = after.unwrap_or(if self.day.contains(now) { now } else { self.day.start });
        let latest_start = self
            .day
            .at_local_time(self.config.latest_start)
            .min(self.day.end - duration);
        let search = SlotSearch {
            interval_minutes: self.config.grid.interval_minutes(),
            latest_start,
            tz: self.config.grid.tz(),
        };
        let existing = self.store.block_list();
        match find_next_free_slot(after.max(self.day.start), duration, &existing, search) {
            Some(start) => {
                let minutes = u32::try_from(duration.num_minutes()).unwrap_or(u32::MAX);
                self.create_block(name, start, Some(minutes)).await
            }
            None => self.reject(OPERATION, Rejection::NoFreeSlot),
        }
    }

    pub async fn move_block(&mut self, block_id: &str, new_start: DateTime<Utc>) -> Outcome<TimeBlock> {
        const OPERATION: &str = "move_block";
        let Some(current) = self.store.block(block_id).cloned() else {
            return self.reject(OPERATION, Rejection::UnknownBlock(block_id.to_string()));
        };
        let start = self.config.grid.snap_to_grid(new_start);
        let end = start + current.duration();
        self.reschedule(OPERATION, current, start, end).await
    }

    /// Moves the end to the snapped `new_end`, never closer than one interval
    /// to the start.
    pub async fn resize_end(&mut self, block_id: &str, new_end: DateTime<Utc>) -> Outcome<TimeBlock> {
        const OPERATION: &str = "resize_end";
        let Some(current) = self.store.block(block_id).cloned() else {
            return self.reject(OPERATION, Rejection::UnknownBlock(block_id.to_string()));
        };
        let end = self
            .config
            .grid
            .snap_to_grid(new_end)
            .max(current.start_at + self.config.min_duration());
        let start = current.start_at;
        self.reschedule(OPERATION, current, start, end).await
    }

    /// Moves the start to the snapped `new_start`, never closer than one
    /// interval to the end.
    pub async fn resize_start(&mut self, block_id: &str, new_start: DateTime<Utc>) -> Outcome<TimeBlock> {
        const OPERATION: &str = "resize_start";
        let Some(current) = self.store.block(block_id).cloned() else {
            return self.reject(OPERATION, Rejection::UnknownBlock(block_id.to_string()));
        };
        let start = self
            .config
            .grid
            .snap_to_grid(new_start)
            .min(current.end_at - self.config.min_duration());
        let end = current.end_at;
        self.reschedule(OPERATION, current, start, end).await
    }

    /// Extends the block by five minutes. The new end is not snapped.
    pub async fn add_five_minutes(&mut self, block_id: &str) -> Outcome<TimeBlock> {
        const OPERATION: &str = "add_five_minutes";
        let Some(current) = self.store.block(block_id).cloned() else {
            return self.reject(OPERATION, Rejection::UnknownBlock(block_id.to_string()));
        };
        let start = current.start_at;
        let end = current.end_at + Duration::minutes(EXTEND_STEP_MINUTES);
        self.reschedule(OPERATION, current, start, end).await
    }

    async fn reschedule(
        &mut self,
        operation: &'static str,
        current: TimeBlock,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Outcome<TimeBlock> {
        if start == current.start_at && end == current.end_at {
            return self.reject(operation, Rejection::Unchanged);
        }
        if let Err(rejection) = self.check_placement(start, end, Some(&current.id)) {
            return self.reject(operation, rejection);
        }

        let mut updated = current;
        updated.start_at = start;
        updated.end_at = end;
        updated.touch(self.now());
        let mut batch = WriteBatch::new();
        batch.update(updated.clone());
        self.commit(operation, batch, updated).await
    }

    pub async fn delete_block(&mut self, block_id: &str) -> Outcome<TimeBlock> {
        const OPERATION: &str = "delete_block";
        let Some(block) = self.store.block(block_id).cloned() else {
            return self.reject(OPERATION, Rejection::UnknownBlock(block_id.to_string()));
        };

        let mut draft = self.store.clone();
        let mut ledger = AssignmentLedger::new(&mut draft, self.now());
        ledger.clear_block(block_id);
        let mut batch = ledger.into_batch();
        batch.delete(EntityKey::Block(block_id.to_string()));
        self.commit(OPERATION, batch, block).await
    }

    async fn edit_block(
        &mut self,
        operation: &'static str,
        block_id: &str,
        edit: impl FnOnce(&mut TimeBlock) -> Result<(), Rejection>,
    ) -> Outcome<TimeBlock> {
        let Some(current) = self.store.block(block_id).cloned() else {
            return self.reject(operation, Rejection::UnknownBlock(block_id.to_string()));
        };
        let mut updated = current.clone();
        if let Err(rejection) = edit(&mut updated) {
            return self.reject(operation, rejection);
        }
        if updated == current {
            return self.reject(operation, Rejection::Unchanged);
        }

        updated.touch(self.now());
        let mut batch = WriteBatch::new();
        batch.update(updated.clone());
        self.commit(operation, batch, updated).await
    }

    pub async fn rename_block(&mut self, block_id: &str, name: &str) -> Outcome<TimeBlock> {
        let name = name.trim();
        self.edit_block("rename_block", block_id, |block| {
            if name.is_empty() {
                return Err(Rejection::EmptyName);
            }
            block.name = name.to_string();
            Ok(())
        })
        .await
    }

    pub async fn set_notes(&mut self, block_id: &str, notes: Option<&str>) -> Outcome<TimeBlock> {
        let notes = notes
            .map(str::trim)
            .filter(|notes| !notes.is_empty())
            .map(str::to_string);
        self.edit_block("set_notes", block_id, |block| {
            block.notes = notes;
            Ok(())
        })
        .await
    }

    pub async fn set_icon(&mut self, block_id: &str, icon: &str) -> Outcome<TimeBlock> {
        let icon = icon.trim();
        self.edit_block("set_icon", block_id, |block| {
            if !is_known_icon(icon) {
                return Err(Rejection::UnknownIcon(icon.to_string()));
            }
            block.icon = icon.to_string();
            Ok(())
        })
        .await
    }

    pub async fn set_manual_color(&mut self, block_id: &str, color: ColorId) -> Outcome<TimeBlock> {
        self.edit_block("set_manual_color", block_id, |block| {
            block.color = Some(color);
            block.color_is_manual = true;
            Ok(())
        })
        .await
    }

    pub async fn clear_manual_color(&mut self, block_id: &str) -> Outcome<TimeBlock> {
        self.edit_block("clear_manual_color", block_id, |block| {
            block.color = None;
            block.color_is_manual = false;
            Ok(())
        })
        .await
    }

    pub async fn set_notifications(
        &mut self,
        block_id: &str,
        at_start: bool,
        at_end: bool,
    ) -> Outcome<TimeBlock> {
        self.edit_block("set_notifications", block_id, |block| {
            block.notify_at_start = at_start;
            block.notify_at_end = at_end;
            Ok(())
        })
        .await
    }

    async fn with_ledger<T>(
        &mut self,
        operation: &'static str,
        apply: impl FnOnce(&mut AssignmentLedger<'_>) -> Result<T, Rejection>,
    ) -> Outcome<T> {
        let mut draft = self.store.clone();
        let mut ledger = AssignmentLedger::new(&mut draft, self.now());
        match apply(&mut ledger) {
            Ok(value) => {
                let batch = ledger.into_batch();
                self.commit(operation, batch, value).await
            }
            Err(rejection) => self.reject(operation, rejection),
        }
    }

    pub async fn assign_task(
        &mut self,
        todo_id: &str,
        block_id: &str,
    ) -> Outcome<TimeBlockAssignment> {
        self.with_ledger("assign_task", |ledger| ledger.assign(todo_id, block_id))
            .await
    }

    pub async fn unassign_task(
        &mut self,
        todo_id: &str,
        block_id: &str,
    ) -> Outcome<TimeBlockAssignment> {
        self.with_ledger("unassign_task", |ledger| ledger.unassign(todo_id, block_id))
            .await
    }

    pub async fn move_task_between_blocks(
        &mut self,
        todo_id: &str,
        from_block_id: &str,
        to_block_id: &str,
    ) -> Outcome<TimeBlockAssignment> {
        self.with_ledger("move_task_between_blocks", |ledger| {
            ledger.move_between_blocks(todo_id, from_block_id, to_block_id)
        })
        .await
    }

    pub async fn reorder_within_block(
        &mut self,
        block_id: &str,
        from: usize,
        to: usize,
    ) -> Outcome<Vec<String>> {
        self.with_ledger("reorder_within_block", |ledger| {
            ledger.reorder_within_block(block_id, from, to)
        })
        .await
    }

    pub async fn unassigned_candidates(&self, block_id: &str) -> Outcome<Vec<Todo>> {
        const OPERATION: &str = "unassigned_candidates";
        if self.store.block(block_id).is_none() {
            return self.reject(OPERATION, Rejection::UnknownBlock(block_id.to_string()));
        }
        match self
            .repository
            .fetch_unassigned_candidates(&TodoFilter::not_completed())
            .await
        {
            Ok(todos) => {
                Outcome::Applied(
                    todos
                        .into_iter()
                        .filter(|todo| self.store.assignment_for(block_id, &todo.id).is_none())
                        .collect(),
                )
            }
            Err(error) => {
                let outcome = Outcome::PersistenceFailed(error);
                self.reporter.report(OPERATION, &outcome);
                outcome
            }
        }
    }
}
