//! Sync Service errors (spec §7: `SyncBackgroundFailed` is logged, not surfaced).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// A foreground (blocking) refresh failed. The caller has no cached data to
    /// fall back to, so this one *is* surfaced.
    #[error("sync failed for user {user_id}: {reason}")]
    ForegroundRefreshFailed { user_id: String, reason: String },
}
