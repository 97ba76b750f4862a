pub mod copy_planner;
pub mod file_filter;
pub mod path_planner;

pub use copy_planner::{CopyPlan, CopyPlanner, PlanEntry, PlanStats};
pub use file_filter::FileFilter;
pub use path_planner::{plan_path, sanitize, SanitizedText};
