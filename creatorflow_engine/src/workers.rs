//! Background maintenance loops.
//!
//! Both workers run on fixed intervals, independent of request traffic, and never block request
//! serving: the retention sweep runs its deletes through the normal pool, and the heartbeat only
//! touches the in-memory channel registry.
use std::sync::Arc;

use chrono::Duration;
use log::*;
use tokio::task::JoinHandle;

use crate::{
    api::NotificationApi,
    live::NotificationStream,
    traits::{BackOfficeDatabase, NotificationManagement},
};

/// Notifications are kept for 30 days before the retention sweep removes them.
pub const NOTIFICATION_MAX_AGE_DAYS: i64 = 30;
/// How often the retention sweep runs.
pub const RETENTION_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);
/// How often live channels receive a keep-alive ping.
pub const HEARTBEAT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(25);

/// Starts the notification retention worker. Do not await the returned JoinHandle, as it will run
/// indefinitely.
pub fn start_retention_worker<B>(
    api: NotificationApi<B>,
    max_age: Duration,
    sweep_interval: std::time::Duration,
) -> JoinHandle<()>
where
    B: BackOfficeDatabase + NotificationManagement + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(sweep_interval);
        info!("🕰️ Notification retention worker started");
        loop {
            timer.tick().await;
            info!("🕰️ Running notification retention sweep");
            match api.purge_expired(max_age).await {
                Ok(purged) => {
                    info!("🕰️ {purged} expired notifications removed");
                },
                Err(e) => {
                    error!("🕰️ Error running notification retention sweep: {e}");
                },
            }
        }
    })
}

/// Starts the live-channel heartbeat worker. Do not await the returned JoinHandle, as it will run
/// indefinitely.
pub fn start_heartbeat_worker(stream: Arc<NotificationStream>, period: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        info!("🕰️ Live channel heartbeat worker started");
        loop {
            timer.tick().await;
            let pruned = stream.ping_all();
            if pruned > 0 {
                debug!("🕰️ Heartbeat detached {pruned} dead channels");
            }
        }
    })
}
