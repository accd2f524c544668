use std::sync::Arc;

use log::info;
use tokio::time::{sleep, Duration};

use crate::replica::Replica;

/// Drives [`Replica::heartbeat_tick`] once per interval for the life of the
/// process.
pub struct HeartbeatMonitor {
    replica: Arc<Replica>,
    interval: Duration,
}

impl HeartbeatMonitor {
    pub fn new(replica: Arc<Replica>, interval: Duration) -> Self {
        Self { replica, interval }
    }

    pub async fn run(self) {
        info!(
            "Heartbeat monitor started for {} every {:?}",
            self.replica.address(),
            self.interval
        );
        loop {
            sleep(self.interval).await;
            self.replica.heartbeat_tick().await;
        }
    }
}
