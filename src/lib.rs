//! Task manager core with a time-blocking day calendar.
//!
//! Blocks live on a snapped grid inside one local day and never overlap.
//! Tasks are assigned to blocks in an explicit order, and a block's color is
//! derived from the projects of its tasks unless set by hand.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::block_view::{BlockView, TaskPreview, TaskSummary};
pub use application::bootstrap::{BootstrapResult, bootstrap_workspace};
pub use application::feedback::{FeedbackKind, FeedbackPort, NoopFeedback, RecordingFeedback};
pub use application::ledger::AssignmentLedger;
pub use application::outcome::{Outcome, Rejection};
pub use application::planner::Planner;
pub use application::projects::ProjectCatalog;
pub use application::runtime::{NowProvider, Reporter};
pub use application::scheduler::{IntegrityAnomaly, SchedulerConfig, TimeBlockScheduler};
pub use application::todos::{NameCommit, TodoService};
pub use domain::models::{
    ALL_PROJECTS_ID, DisplayMode, Project, ProjectSelection, TemporalState, TimeBlock,
    TimeBlockAssignment, Todo,
};
pub use domain::palette::ColorId;
pub use domain::time_grid::{DayRange, TimeGrid};
pub use infrastructure::config::PlannerSettings;
pub use infrastructure::error::InfraError;
pub use infrastructure::repository::{InMemoryRepository, PlannerRepository, WriteBatch};
pub use infrastructure::sqlite_repository::SqliteRepository;
