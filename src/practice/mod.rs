pub mod countdown;
pub mod view;

pub use countdown::{CountdownState, CountdownStatus, PracticeCountdown};
pub use view::{PracticeOptions, PracticeView, RunSummary};
