//! Query dispatch and result merging.
//!
//! - [`dispatch`]: concurrent fan-out with per-backend and global deadlines
//! - [`normalize`]: backend-native items to [`ResultRecord`](crate::ResultRecord)
//! - [`merge`]: source-grouped, capped [`ResultSet`](crate::ResultSet)

pub mod dispatch;
pub mod merge;
pub mod normalize;

pub use dispatch::Dispatcher;
pub use merge::{merge, BackendOutcome};
pub use normalize::{normalize, normalize_batch, normalize_from};
