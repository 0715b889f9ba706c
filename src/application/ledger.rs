//! Task to block assignments.
//!
//! The ledger edits a [`DayStore`] in place and records every touched record
//! in a [`WriteBatch`]. Callers run it against a scratch copy of the store so
//! a rejected operation leaves nothing behind.

use crate::application::outcome::Rejection;
use crate::application::runtime::next_id;
use crate::domain::models::TimeBlockAssignment;
use crate::domain::store::DayStore;
use crate::infrastructure::repository::{EntityKey, WriteBatch};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

pub struct AssignmentLedger<'a> {
    store: &'a mut DayStore,
    batch: WriteBatch,
    now: DateTime<Utc>,
}

impl<'a> AssignmentLedger<'a> {
    pub fn new(store: &'a mut DayStore, now: DateTime<Utc>) -> Self {
        Self {
            store,
            batch: WriteBatch::new(),
            now,
        }
    }

    pub fn into_batch(self) -> WriteBatch {
        self.batch
    }

    pub fn assign(&mut self, todo_id: &str, block_id: &str) -> Result<TimeBlockAssignment, Rejection> {
        if self.store.block(block_id).is_none() {
            return Err(Rejection::UnknownBlock(block_id.to_string()));
        }
        if self.store.todo(todo_id).is_none() {
            return Err(Rejection::UnknownTask(todo_id.to_string()));
        }
        if self.store.assignment_for(block_id, todo_id).is_some() {
            return Err(Rejection::AlreadyAssigned {
                todo_id: todo_id.to_string(),
                block_id: block_id.to_string(),
            });
        }

        let assignment = TimeBlockAssignment {
            id: next_id("asg"),
            block_id: block_id.to_string(),
            todo_id: todo_id.to_string(),
            order_index: self.store.assignments_for_block(block_id).len() as u32,
            assigned_at: self.now,
        };
        self.store.insert_assignment(assignment.clone());
        self.batch.insert(assignment.clone());
        self.touch_block(block_id);
        Ok(assignment)
    }

    pub fn unassign(&mut self, todo_id: &str, block_id: &str) -> Result<TimeBlockAssignment, Rejection> {
        let assignment_id = self
            .store
            .assignment_for(block_id, todo_id)
            .map(|assignment| assignment.id.clone())
            .ok_or_else(|| Rejection::NotAssigned {
                todo_id: todo_id.to_string(),
                block_id: block_id.to_string(),
            })?;

        let removed = self
            .store
            .remove_assignment(&assignment_id)
            .ok_or_else(|| Rejection::NotAssigned {
                todo_id: todo_id.to_string(),
                block_id: block_id.to_string(),
            })?;
        self.batch.delete(EntityKey::Assignment(removed.id.clone()));
        self.renumber(block_id);
        self.touch_block(block_id);
        Ok(removed)
    }

    /// Moves the task from one block to another in a single batch. When the
    /// target already holds the task, only the source assignment goes away.
    pub fn move_between_blocks(
        &mut self,
        todo_id: &str,
        from_block_id: &str,
        to_block_id: &str,
    ) -> Result<TimeBlockAssignment, Rejection> {
        if from_block_id == to_block_id {
            return Err(Rejection::Unchanged);
        }
        if self.store.block(to_block_id).is_none() {
            return Err(Rejection::UnknownBlock(to_block_id.to_string()));
        }

        self.unassign(todo_id, from_block_id)?;
        if let Some(existing) = self.store.assignment_for(to_block_id, todo_id) {
            return Ok(existing.clone());
        }
        self.assign(todo_id, to_block_id)
    }

    /// Moves the entry at `from` to `to` and renumbers the block. Equal or
    /// out of range indices change nothing.
    pub fn reorder_within_block(
        &mut self,
        block_id: &str,
        from: usize,
        to: usize,
    ) -> Result<Vec<String>, Rejection> {
        if self.store.block(block_id).is_none() {
            return Err(Rejection::UnknownBlock(block_id.to_string()));
        }
        let mut ordered = self
            .store
            .assignments_for_block(block_id)
            .into_iter()
            .map(|assignment| assignment.id.clone())
            .collect::<Vec<_>>();
        if from == to || from >= ordered.len() || to >= ordered.len() {
            return Err(Rejection::Unchanged);
        }

        let moved = ordered.remove(from);
        ordered.insert(to, moved);
        for changed in self.store.apply_order(&ordered) {
            self.batch.update(changed);
        }
        self.touch_block(block_id);

        Ok(self
            .store
            .assignments_for_block(block_id)
            .into_iter()
            .map(|assignment| assignment.todo_id.clone())
            .collect())
    }

    pub fn clear_block(&mut self, block_id: &str) -> usize {
        let ids = self
            .store
            .assignments_for_block(block_id)
            .into_iter()
            .map(|assignment| assignment.id.clone())
            .collect::<Vec<_>>();
        for assignment_id in &ids {
            self.store.remove_assignment(assignment_id);
            self.batch.delete(EntityKey::Assignment(assignment_id.clone()));
        }
        ids.len()
    }

    pub fn clear_todo(&mut self, todo_id: &str) -> usize {
        let removed = self
            .store
            .assignments_for_todo(todo_id)
            .into_iter()
            .map(|assignment| (assignment.id.clone(), assignment.block_id.clone()))
            .collect::<Vec<_>>();
        let mut blocks = BTreeSet::new();
        for (assignment_id, block_id) in &removed {
            self.store.remove_assignment(assignment_id);
            self.batch.delete(EntityKey::Assignment(assignment_id.clone()));
            blocks.insert(block_id.clone());
        }
        for block_id in &blocks {
            self.renumber(block_id);
        }
        removed.len()
    }

    fn renumber(&mut self, block_id: &str) {
        for changed in self.store.renumber_block(block_id) {
            self.batch.update(changed);
        }
    }

    fn touch_block(&mut self, block_id: &str) {
        let now = self.now;
        if let Some(block) = self.store.block_mut(block_id) {
            block.touch(now);
            let updated = block.clone();
            self.batch.update(updated);
        }
    }
}
