pub mod plan;

pub use plan::{
    dedup_locations, plan, push_candidates, DiffItem, DiffKind, ExternalLocation, SyncPlan,
};
