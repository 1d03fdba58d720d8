use crate::backend::{Backend, BackendError};
use sockpit_core::{LogsResponse, StatusResponse};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::debug;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const EVENT_QUEUE_CAPACITY: usize = 32;

/// One fetch outcome, delivered in completion order. A slow reply can land
/// after a newer one and overwrite it at the consumer; there is no sequence
/// guard.
#[derive(Debug)]
pub enum PollEvent {
    Status(Result<StatusResponse, BackendError>),
    Logs(Result<LogsResponse, BackendError>),
}

/// Fixed-rate polling driver. Every tick fires the status and log fetches as
/// separate tasks, so neither can block or fail the other and a slow round
/// trip never pushes back the next scheduled tick.
pub struct Poller {
    stop: watch::Sender<bool>,
    poke: mpsc::Sender<()>,
}

impl Poller {
    /// Begins polling: the first tick fires at call time, then once per
    /// `interval`.
    pub fn start(backend: Backend, interval: Duration) -> (Self, mpsc::Receiver<PollEvent>) {
        let interval = if interval.is_zero() {
            DEFAULT_POLL_INTERVAL
        } else {
            interval
        };
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (stop_tx, stop_rx) = watch::channel(false);
        let (poke_tx, poke_rx) = mpsc::channel(1);
        tokio::spawn(poll_loop(backend, interval, event_tx, stop_rx, poke_rx));
        (
            Self {
                stop: stop_tx,
                poke: poke_tx,
            },
            event_rx,
        )
    }

    /// Fires an extra tick now, without disturbing the fixed cadence. A poke
    /// while one is already queued coalesces with it.
    pub fn poke(&self) {
        let _ = self.poke.try_send(());
    }

    /// Cloneable handle for [`Poller::poke`], for callers that only ever
    /// request refreshes.
    pub fn poke_handle(&self) -> mpsc::Sender<()> {
        self.poke.clone()
    }

    /// Stops scheduling new ticks. Idempotent. Fetches already in flight are
    /// not cancelled and may each deliver one more event, after which the
    /// event channel closes.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }
}

async fn poll_loop(
    backend: Backend,
    interval: Duration,
    events: mpsc::Sender<PollEvent>,
    mut stop: watch::Receiver<bool>,
    mut poke: mpsc::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    debug!(
        event = "poller_started",
        interval_ms = interval.as_millis() as u64
    );
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                fire_fetches(&backend, &events);
            }
            poked = poke.recv() => {
                // The channel only closes once the owning Poller is gone.
                if poked.is_none() {
                    break;
                }
                fire_fetches(&backend, &events);
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
        }
    }
    debug!(event = "poller_stopped");
}

fn fire_fetches(backend: &Backend, events: &mpsc::Sender<PollEvent>) {
    let status_backend = backend.clone();
    let status_events = events.clone();
    tokio::spawn(async move {
        let result = status_backend.server_status().await;
        let _ = status_events.send(PollEvent::Status(result)).await;
    });

    let log_backend = backend.clone();
    let log_events = events.clone();
    tokio::spawn(async move {
        let result = log_backend.recent_logs().await;
        let _ = log_events.send(PollEvent::Logs(result)).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    const RECV_WINDOW: Duration = Duration::from_secs(5);

    /// Serves canned replies keyed by request path until the test ends.
    async fn spawn_relay_stub(logs_status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
        let addr = listener.local_addr().expect("stub addr");
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let mut head = [0u8; 2048];
                let n = socket.read(&mut head).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&head[..n]).into_owned();
                let (status_line, body) = if request.starts_with("GET /api/logs") {
                    (logs_status_line, r#"{"logs": ["[10:00:01] accept"]}"#)
                } else {
                    ("HTTP/1.1 200 OK", r#"{"running": true, "stats": {"uptime": 5}}"#)
                };
                let reply = format!(
                    "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(reply.as_bytes()).await;
            }
        });
        format!("http://{addr}")
    }

    async fn recv_pair(events: &mut mpsc::Receiver<PollEvent>) -> (PollEvent, PollEvent) {
        let first = timeout(RECV_WINDOW, events.recv())
            .await
            .expect("first event in time")
            .expect("channel open");
        let second = timeout(RECV_WINDOW, events.recv())
            .await
            .expect("second event in time")
            .expect("channel open");
        (first, second)
    }

    fn split_pair(pair: (PollEvent, PollEvent)) -> (PollEvent, PollEvent) {
        // Completion order is not fixed; normalize to (status, logs).
        match pair {
            (status @ PollEvent::Status(_), logs @ PollEvent::Logs(_)) => (status, logs),
            (logs @ PollEvent::Logs(_), status @ PollEvent::Status(_)) => (status, logs),
            other => panic!("expected one status and one logs event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_tick_fires_at_start_time() {
        let url = spawn_relay_stub("HTTP/1.1 200 OK").await;
        // An hour-long interval means any received event came from the
        // immediate tick.
        let (poller, mut events) =
            Poller::start(Backend::new(url), Duration::from_secs(3600));

        let (status, logs) = split_pair(recv_pair(&mut events).await);
        match status {
            PollEvent::Status(Ok(reply)) => assert!(reply.running),
            other => panic!("unexpected status event: {other:?}"),
        }
        match logs {
            PollEvent::Logs(Ok(reply)) => assert_eq!(reply.logs.len(), 1),
            other => panic!("unexpected logs event: {other:?}"),
        }
        poller.stop();
    }

    #[tokio::test]
    async fn log_fetch_failure_does_not_block_the_status_fetch() {
        let url = spawn_relay_stub("HTTP/1.1 500 Internal Server Error").await;
        let (poller, mut events) =
            Poller::start(Backend::new(url), Duration::from_secs(3600));

        let (status, logs) = split_pair(recv_pair(&mut events).await);
        assert!(matches!(status, PollEvent::Status(Ok(_))));
        assert!(matches!(
            logs,
            PollEvent::Logs(Err(BackendError::Status { .. }))
        ));
        poller.stop();
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_closes_the_event_stream() {
        let url = spawn_relay_stub("HTTP/1.1 200 OK").await;
        let (poller, mut events) = Poller::start(Backend::new(url), Duration::from_millis(50));

        let _ = recv_pair(&mut events).await;
        poller.stop();
        poller.stop();

        // Events already in flight may still arrive; afterwards every sender
        // is gone and the channel closes.
        loop {
            match timeout(RECV_WINDOW, events.recv()).await {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(_) => panic!("poller did not shut down"),
            }
        }
    }

    #[tokio::test]
    async fn poke_fires_an_extra_tick_between_scheduled_ones() {
        let url = spawn_relay_stub("HTTP/1.1 200 OK").await;
        let (poller, mut events) =
            Poller::start(Backend::new(url), Duration::from_secs(3600));

        // Drain the immediate tick, then ask for another by hand. The next
        // scheduled tick is an hour out, so this pair can only come from the
        // poke.
        let _ = recv_pair(&mut events).await;
        poller.poke();

        let (status, logs) = split_pair(recv_pair(&mut events).await);
        assert!(matches!(status, PollEvent::Status(Ok(_))));
        assert!(matches!(logs, PollEvent::Logs(Ok(_))));
        poller.stop();
    }

    #[tokio::test]
    async fn zero_interval_falls_back_to_the_default_cadence() {
        let url = spawn_relay_stub("HTTP/1.1 200 OK").await;
        let (poller, mut events) = Poller::start(Backend::new(url), Duration::ZERO);

        let (status, _) = split_pair(recv_pair(&mut events).await);
        assert!(matches!(status, PollEvent::Status(Ok(_))));
        poller.stop();
    }
}
