pub mod block_view;
pub mod bootstrap;
pub mod feedback;
pub mod ledger;
pub mod outcome;
pub mod planner;
pub mod projects;
pub mod runtime;
pub mod scheduler;
pub mod todos;
