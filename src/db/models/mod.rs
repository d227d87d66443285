pub mod practice;
pub mod profile;

pub use practice::{PoseProgressRecord, PracticeRun};
pub use profile::Profile;
