pub mod catalog;
pub mod timing;

pub use catalog::{display_label, resolve_pose_id, CatalogEntry, CATALOG, DEFAULT_POSE_ID};
pub use timing::{hold_profile, timing_profile, HoldProfile, PoseTimingProfile};
