//! Per-session turn timer.
//!
//! Every tick the task recomputes the seconds left in the current turn and,
//! once they hit zero, hands the current player to `on_expired`. The task ends
//! when the session has a winner, when it is cancelled, or when `on_expired`
//! returns `false`.

use std::future::Future;
use std::time::Duration;

use log::debug;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::session::now_millis;
use super::SharedSession;

pub struct CountdownHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl CountdownHandle {
    pub fn cancel(&self) {
        let _ = self.stop.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

pub fn spawn<F, Fut>(
    session: SharedSession,
    tick: Duration,
    turn_seconds: u64,
    on_expired: F,
) -> CountdownHandle
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    let (stop, mut stopped) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stopped.changed() => break,
                _ = ticker.tick() => {}
            }

            let expired = {
                let session = session.lock().await;
                if session.is_over() {
                    debug!("Countdown for game {} finished", session.game_id());
                    break;
                }
                if session.seconds_remaining(turn_seconds, now_millis()) == 0 {
                    Some(session.current_player().to_string())
                } else {
                    None
                }
            };

            if let Some(player) = expired {
                if !on_expired(player).await {
                    break;
                }
            }
        }
    });

    CountdownHandle { stop, task }
}
