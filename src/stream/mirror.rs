//! State mirror
//!
//! Folds a stream of state updates into one snapshot on a background task.
//! The task is the only writer; any number of [`StateReader`]s may read
//! concurrently. Each update is merged under one write lock, so readers
//! never see a partially applied message.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::error::{Result, StreamError};

use super::state::StateSource;

/// Latest known value of every state key
pub type Snapshot = Map<String, Value>;

/// Cheap, cloneable read handle onto a mirror's snapshot
#[derive(Debug, Clone, Default)]
pub struct StateReader {
    state: Arc<RwLock<Snapshot>>,
}

impl StateReader {
    /// Copy of the snapshot laid over `defaults` (snapshot values win)
    pub async fn get_state(&self, defaults: Snapshot) -> Snapshot {
        let state = self.state.read().await;
        let mut merged = defaults;
        merged.extend(state.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    /// Copy of the snapshot
    pub async fn snapshot(&self) -> Snapshot {
        self.state.read().await.clone()
    }

    /// Current value of one key
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.state.read().await.get(key).cloned()
    }

    pub async fn is_recording(&self) -> bool {
        self.state
            .read()
            .await
            .get("is_recording")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub async fn frame_number(&self) -> Option<u64> {
        self.state
            .read()
            .await
            .get("frame_number")
            .and_then(Value::as_u64)
    }

    pub async fn frame_time(&self) -> Option<f64> {
        self.state
            .read()
            .await
            .get("frame_time")
            .and_then(Value::as_f64)
    }

    async fn merge(&self, update: Snapshot) {
        let mut state = self.state.write().await;
        for (key, value) in update {
            state.insert(key, value);
        }
    }
}

enum Phase<S> {
    Idle(S),
    Running(JoinHandle<Result<()>>),
    Stopped,
}

/// Keeps a coherent copy of a camera's state
///
/// # Example
/// ```no_run
/// use motif_rs::client::StreamEndpoint;
/// use motif_rs::stream::{StateMirror, StateStreamer};
///
/// # async fn example() -> motif_rs::error::Result<()> {
/// let endpoint = StreamEndpoint { host: "10.0.0.5".into(), port: 5556 };
/// let mut mirror = StateMirror::new(StateStreamer::open(&endpoint).await?);
/// mirror.start();
///
/// let reader = mirror.reader();
/// if reader.is_recording().await {
///     println!("frame {:?}", reader.frame_number().await);
/// }
/// # Ok(())
/// # }
/// ```
pub struct StateMirror<S: StateSource> {
    reader: StateReader,
    phase: Phase<S>,
}

impl<S: StateSource> StateMirror<S> {
    /// Create an idle mirror over `source`
    pub fn new(source: S) -> Self {
        Self {
            reader: StateReader::default(),
            phase: Phase::Idle(source),
        }
    }

    /// Spawn the consumer task. Does nothing if already started.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        let source = match std::mem::replace(&mut self.phase, Phase::Stopped) {
            Phase::Idle(source) => source,
            other => {
                tracing::debug!("State mirror already started");
                self.phase = other;
                return;
            }
        };

        let reader = self.reader.clone();
        let handle = tokio::spawn(consume(source, reader));
        self.phase = Phase::Running(handle);

        tracing::info!("State mirror started");
    }

    /// Handle for reading the snapshot
    pub fn reader(&self) -> StateReader {
        self.reader.clone()
    }

    /// Whether the consumer task is alive
    pub fn is_running(&self) -> bool {
        matches!(&self.phase, Phase::Running(handle) if !handle.is_finished())
    }

    /// Abort the consumer. The last snapshot stays readable.
    pub fn stop(&mut self) {
        if let Phase::Running(handle) = &self.phase {
            handle.abort();
            self.phase = Phase::Stopped;
            tracing::info!("State mirror stopped");
        }
    }

    /// Wait for the consumer to end and return the error that ended it
    pub async fn join(&mut self) -> Result<()> {
        if !matches!(self.phase, Phase::Running(_)) {
            return Ok(());
        }
        let Phase::Running(handle) = std::mem::replace(&mut self.phase, Phase::Stopped) else {
            return Ok(());
        };

        match handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(StreamError::Socket(format!("state mirror task failed: {}", e)).into()),
        }
    }

    pub async fn get_state(&self, defaults: Snapshot) -> Snapshot {
        self.reader.get_state(defaults).await
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.reader.snapshot().await
    }

    pub async fn is_recording(&self) -> bool {
        self.reader.is_recording().await
    }

    pub async fn frame_number(&self) -> Option<u64> {
        self.reader.frame_number().await
    }

    pub async fn frame_time(&self) -> Option<f64> {
        self.reader.frame_time().await
    }
}

impl<S: StateSource> Drop for StateMirror<S> {
    fn drop(&mut self) {
        if let Phase::Running(handle) = &self.phase {
            handle.abort();
        }
    }
}

async fn consume<S: StateSource>(mut source: S, reader: StateReader) -> Result<()> {
    loop {
        match source.next_state().await {
            Ok(update) => reader.merge(update).await,
            Err(e) => {
                tracing::error!(error = %e, "State mirror consumer failed");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::error::Error;

    struct ChannelSource(mpsc::Receiver<Snapshot>);

    impl StateSource for ChannelSource {
        async fn next_state(&mut self) -> Result<Snapshot> {
            self.0
                .recv()
                .await
                .ok_or_else(|| StreamError::Socket("source closed".into()).into())
        }
    }

    fn obj(v: Value) -> Snapshot {
        match v {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn mirror() -> (mpsc::Sender<Snapshot>, StateMirror<ChannelSource>) {
        let (tx, rx) = mpsc::channel(16);
        (tx, StateMirror::new(ChannelSource(rx)))
    }

    async fn wait_for(reader: &StateReader, expected: &Snapshot) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while &reader.snapshot().await != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("snapshot never converged");
    }

    #[tokio::test]
    async fn test_merge_overwrites_and_keeps() {
        let (tx, mut mirror) = mirror();
        mirror.start();

        tx.send(obj(json!({"a": 1}))).await.unwrap();
        tx.send(obj(json!({"b": 2}))).await.unwrap();
        tx.send(obj(json!({"a": 3}))).await.unwrap();

        wait_for(&mirror.reader(), &obj(json!({"a": 3, "b": 2}))).await;
    }

    #[tokio::test]
    async fn test_idle_mirror_is_empty() {
        let (_tx, mirror) = mirror();

        assert!(!mirror.is_running());
        assert!(mirror.snapshot().await.is_empty());
        assert!(!mirror.is_recording().await);
        assert_eq!(mirror.frame_number().await, None);
        assert_eq!(mirror.frame_time().await, None);
    }

    #[tokio::test]
    async fn test_typed_accessors() {
        let (tx, mut mirror) = mirror();
        mirror.start();

        let expected = obj(json!({"is_recording": true, "frame_number": 10, "frame_time": 0.5}));
        tx.send(expected.clone()).await.unwrap();
        wait_for(&mirror.reader(), &expected).await;

        assert!(mirror.is_recording().await);
        assert_eq!(mirror.frame_number().await, Some(10));
        assert_eq!(mirror.frame_time().await, Some(0.5));
    }

    #[tokio::test]
    async fn test_snapshot_wins_over_defaults() {
        let (tx, mut mirror) = mirror();
        mirror.start();

        tx.send(obj(json!({"a": 1}))).await.unwrap();
        wait_for(&mirror.reader(), &obj(json!({"a": 1}))).await;

        let state = mirror.get_state(obj(json!({"a": 0, "z": 9}))).await;
        assert_eq!(state, obj(json!({"a": 1, "z": 9})));
    }

    #[tokio::test]
    async fn test_stop_keeps_snapshot() {
        let (tx, mut mirror) = mirror();
        mirror.start();
        assert!(mirror.is_running());

        tx.send(obj(json!({"a": 1}))).await.unwrap();
        wait_for(&mirror.reader(), &obj(json!({"a": 1}))).await;

        mirror.stop();
        assert!(!mirror.is_running());
        assert_eq!(mirror.snapshot().await, obj(json!({"a": 1})));
        assert!(mirror.join().await.is_ok());
    }

    #[tokio::test]
    async fn test_source_failure_ends_consumer() {
        let (tx, mut mirror) = mirror();
        mirror.start();
        drop(tx);

        let err = mirror.join().await.unwrap_err();
        assert!(matches!(err, Error::Stream(StreamError::Socket(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_torn_reads() {
        let (tx, mut mirror) = mirror();
        mirror.start();

        let mut readers = Vec::new();
        for _ in 0..4 {
            let reader = mirror.reader();
            readers.push(tokio::spawn(async move {
                for _ in 0..500 {
                    let state = reader.snapshot().await;
                    assert_eq!(state.get("x"), state.get("y"), "torn read: {:?}", state);
                    tokio::task::yield_now().await;
                }
            }));
        }

        for i in 0..500 {
            tx.send(obj(json!({"x": i, "y": i}))).await.unwrap();
        }

        for reader in readers {
            reader.await.unwrap();
        }
        wait_for(&mirror.reader(), &obj(json!({"x": 499, "y": 499}))).await;
    }
}
