//! Table rendering for planner types.

mod plan_ext;

pub use self::plan_ext::PlanExt;
