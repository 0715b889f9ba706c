//! Id-keyed arena for the entities of one loaded day.
//!
//! Assignments are owned here only. Blocks and todos find theirs by foreign
//! key, so the two sides of the relation cannot drift apart.

use crate::domain::models::{Project, TimeBlock, TimeBlockAssignment, Todo};
use crate::domain::palette::ColorId;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct DayStore {
    blocks: HashMap<String, TimeBlock>,
    todos: HashMap<String, Todo>,
    projects: HashMap<String, Project>,
    assignments: HashMap<String, TimeBlockAssignment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub removed: Vec<TimeBlockAssignment>,
    pub renumbered: Vec<TimeBlockAssignment>,
}

impl PruneReport {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.renumbered.is_empty()
    }
}

impl DayStore {
    pub fn new(
        blocks: Vec<TimeBlock>,
        todos: Vec<Todo>,
        projects: Vec<Project>,
        assignments: Vec<TimeBlockAssignment>,
    ) -> Self {
        Self {
            blocks: blocks.into_iter().map(|block| (block.id.clone(), block)).collect(),
            todos: todos.into_iter().map(|todo| (todo.id.clone(), todo)).collect(),
            projects: projects
                .into_iter()
                .map(|project| (project.id.clone(), project))
                .collect(),
            assignments: assignments
                .into_iter()
                .map(|assignment| (assignment.id.clone(), assignment))
                .collect(),
        }
    }

    pub fn block(&self, block_id: &str) -> Option<&TimeBlock> {
        self.blocks.get(block_id)
    }

    pub(crate) fn block_mut(&mut self, block_id: &str) -> Option<&mut TimeBlock> {
        self.blocks.get_mut(block_id)
    }

    pub fn blocks(&self) -> Vec<&TimeBlock> {
        let mut blocks = self.blocks.values().collect::<Vec<_>>();
        blocks.sort_by(|left, right| {
            left.start_at
                .cmp(&right.start_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        blocks
    }

    pub fn block_list(&self) -> Vec<TimeBlock> {
        self.blocks().into_iter().cloned().collect()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn todo(&self, todo_id: &str) -> Option<&Todo> {
        self.todos.get(todo_id)
    }

    pub fn project(&self, project_id: &str) -> Option<&Project> {
        self.projects.get(project_id)
    }

    pub fn project_color(&self, project_id: &str) -> Option<ColorId> {
        self.projects.get(project_id).map(|project| project.color)
    }

    pub fn assignment_for(&self, block_id: &str, todo_id: &str) -> Option<&TimeBlockAssignment> {
        self.assignments
            .values()
            .find(|assignment| assignment.block_id == block_id && assignment.todo_id == todo_id)
    }

    pub fn assignments_for_block(&self, block_id: &str) -> Vec<&TimeBlockAssignment> {
        let mut assignments = self
            .assignments
            .values()
            .filter(|assignment| assignment.block_id == block_id)
            .collect::<Vec<_>>();
        assignments.sort_by(|left, right| {
            left.order_index
                .cmp(&right.order_index)
                .then_with(|| left.assigned_at.cmp(&right.assigned_at))
                .then_with(|| left.id.cmp(&right.id))
        });
        assignments
    }

    pub fn assignments_for_todo(&self, todo_id: &str) -> Vec<&TimeBlockAssignment> {
        self.assignments
            .values()
            .filter(|assignment| assignment.todo_id == todo_id)
            .collect()
    }

    pub fn tasks_for_block(&self, block_id: &str) -> Vec<&Todo> {
        self.assignments_for_block(block_id)
            .into_iter()
            .filter_map(|assignment| self.todos.get(&assignment.todo_id))
            .collect()
    }

    pub fn order_indices(&self, block_id: &str) -> Vec<u32> {
        self.assignments_for_block(block_id)
            .into_iter()
            .map(|assignment| assignment.order_index)
            .collect()
    }

    pub fn is_valid(&self, assignment: &TimeBlockAssignment) -> bool {
        self.blocks.contains_key(&assignment.block_id) && self.todos.contains_key(&assignment.todo_id)
    }

    pub(crate) fn insert_assignment(&mut self, assignment: TimeBlockAssignment) {
        self.assignments.insert(assignment.id.clone(), assignment);
    }

    pub(crate) fn remove_assignment(&mut self, assignment_id: &str) -> Option<TimeBlockAssignment> {
        self.assignments.remove(assignment_id)
    }

    pub(crate) fn renumber_block(&mut self, block_id: &str) -> Vec<TimeBlockAssignment> {
        let ordered = self
            .assignments_for_block(block_id)
            .into_iter()
            .map(|assignment| assignment.id.clone())
            .collect::<Vec<_>>();
        self.apply_order(&ordered)
    }

    pub(crate) fn apply_order(&mut self, ordered_ids: &[String]) -> Vec<TimeBlockAssignment> {
        let mut changed = Vec::new();
        for (index, assignment_id) in ordered_ids.iter().enumerate() {
            let Some(assignment) = self.assignments.get_mut(assignment_id) else {
                continue;
            };
            let index = index as u32;
            if assignment.order_index != index {
                assignment.order_index = index;
                changed.push(assignment.clone());
            }
        }
        changed
    }

    /// Drops assignments that reference a missing block or todo and repeated
    /// (block, todo) pairs, then renumbers the affected blocks.
    pub fn prune_invalid_assignments(&mut self) -> PruneReport {
        let mut removed = Vec::new();
        let mut seen = HashSet::new();
        let mut affected_blocks = HashSet::new();

        let mut candidates = self.assignments.values().cloned().collect::<Vec<_>>();
        candidates.sort_by(|left, right| {
            left.block_id
                .cmp(&right.block_id)
                .then_with(|| left.order_index.cmp(&right.order_index))
                .then_with(|| left.assigned_at.cmp(&right.assigned_at))
                .then_with(|| left.id.cmp(&right.id))
        });

        for assignment in candidates {
            let duplicate = !seen.insert((assignment.block_id.clone(), assignment.todo_id.clone()));
            if duplicate || !self.is_valid(&assignment) {
                self.assignments.remove(&assignment.id);
                affected_blocks.insert(assignment.block_id.clone());
                removed.push(assignment);
            }
        }

        let mut renumbered = Vec::new();
        for block_id in &self.blocks.keys().cloned().collect::<Vec<_>>() {
            let indices = self.order_indices(block_id);
            let dense = indices.iter().enumerate().all(|(index, value)| *value == index as u32);
            if affected_blocks.contains(block_id) || !dense {
                renumbered.extend(self.renumber_block(block_id));
            }
        }

        PruneReport { removed, renumbered }
    }
}
