mod aggregator;
mod git;
mod inspect;
mod process;
mod snapshot;

pub use aggregator::{Aggregator, SnapshotHub};
pub use git::branch_for_path;
pub use inspect::{inspect_pane, resolve_state, PaneView};
pub use process::{classify_process, is_process_active, ProcessClass};
pub use snapshot::{SessionWithWindows, SessionsSnapshot, WindowStatus};
