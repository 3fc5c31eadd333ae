pub mod poller;
pub mod snapshot;
pub mod table;

pub use poller::ProcessPoller;
pub use table::{ProcessTable, TableDelta};
