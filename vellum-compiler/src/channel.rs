//! Generic bidirectional conduit to a background execution unit.
//!
//! One worker task, one dispatch task. The dispatch task is the only reader
//! of the inbound channel, so observers see messages in exactly the order
//! the unit emitted them. Observers form an ordered list: registering a
//! second handler never replaces the first.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("channel is disposed")]
    Disposed,
    #[error("background unit is gone")]
    Closed,
}

type Observer<Res> = Box<dyn Fn(&Res) + Send + Sync>;

/// Typed request/response channel bound to one background unit.
pub struct WorkerChannel<Req, Res> {
    outbound: mpsc::UnboundedSender<Req>,
    observers: Arc<RwLock<Vec<Observer<Res>>>>,
    disposed: Arc<AtomicBool>,
    worker: JoinHandle<()>,
    dispatch: JoinHandle<()>,
}

impl<Req, Res> WorkerChannel<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    /// Spawn the background unit and the observer dispatch task.
    ///
    /// The worker owns the request receiver and the response sender; it
    /// runs until either side closes or the channel is disposed.
    pub fn spawn<W, Fut>(worker: W) -> Self
    where
        W: FnOnce(mpsc::UnboundedReceiver<Req>, mpsc::UnboundedSender<Res>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, mut in_rx) = mpsc::unbounded_channel::<Res>();
        let observers: Arc<RwLock<Vec<Observer<Res>>>> = Arc::new(RwLock::new(Vec::new()));
        let disposed = Arc::new(AtomicBool::new(false));

        let worker = tokio::spawn(worker(out_rx, in_tx));

        let dispatch_observers = observers.clone();
        let dispatch_disposed = disposed.clone();
        let dispatch = tokio::spawn(async move {
            while let Some(res) = in_rx.recv().await {
                if dispatch_disposed.load(Ordering::SeqCst) {
                    break;
                }
                if let Ok(observers) = dispatch_observers.read() {
                    for observer in observers.iter() {
                        observer(&res);
                    }
                }
            }
        });

        Self {
            outbound: out_tx,
            observers,
            disposed,
            worker,
            dispatch,
        }
    }

    /// Fire-and-forget dispatch to the background unit.
    pub fn send(&self, req: Req) -> Result<(), ChannelError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(ChannelError::Disposed);
        }
        self.outbound.send(req).map_err(|_| ChannelError::Closed)
    }

    /// Register a callback for every inbound message.
    ///
    /// Observers are invoked in registration order and never replace one
    /// another, so a logging sink and a feature handler can coexist.
    pub fn add_observer<F>(&self, handler: F)
    where
        F: Fn(&Res) + Send + Sync + 'static,
    {
        if let Ok(mut observers) = self.observers.write() {
            observers.push(Box::new(handler));
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Terminate the background unit. No further messages are delivered;
    /// in-flight requests receive no completion.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.worker.abort();
        self.dispatch.abort();
        log::debug!("worker channel disposed");
    }
}

impl<Req, Res> Drop for WorkerChannel<Req, Res> {
    fn drop(&mut self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            self.worker.abort();
            self.dispatch.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::{sleep, Duration};

    /// Worker that echoes each request back as a response.
    fn echo_channel() -> WorkerChannel<u32, u32> {
        WorkerChannel::spawn(|mut rx, tx| async move {
            while let Some(req) = rx.recv().await {
                if tx.send(req).is_err() {
                    break;
                }
            }
        })
    }

    #[tokio::test]
    async fn test_observers_fire_in_registration_order() {
        let channel = echo_channel();
        let seen: Arc<Mutex<Vec<(&'static str, u32)>>> = Arc::new(Mutex::new(Vec::new()));

        let first = seen.clone();
        channel.add_observer(move |res| first.lock().unwrap().push(("first", *res)));
        let second = seen.clone();
        channel.add_observer(move |res| second.lock().unwrap().push(("second", *res)));
        assert_eq!(channel.observer_count(), 2);

        channel.send(1).unwrap();
        channel.send(2).unwrap();
        sleep(Duration::from_millis(50)).await;

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![("first", 1), ("second", 1), ("first", 2), ("second", 2)]
        );
    }

    #[tokio::test]
    async fn test_delivery_is_fifo() {
        let channel = echo_channel();
        let seen: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        channel.add_observer(move |res| sink.lock().unwrap().push(*res));

        for i in 0..100 {
            channel.send(i).unwrap();
        }
        sleep(Duration::from_millis(100)).await;

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, (0..100).collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn test_send_after_dispose_fails() {
        let channel = echo_channel();
        channel.dispose();
        assert!(channel.is_disposed());
        assert_eq!(channel.send(1), Err(ChannelError::Disposed));
    }

    #[tokio::test]
    async fn test_no_delivery_after_dispose() {
        let channel = echo_channel();
        let seen: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        channel.add_observer(move |res| sink.lock().unwrap().push(*res));

        channel.send(1).unwrap();
        sleep(Duration::from_millis(50)).await;
        channel.dispose();
        sleep(Duration::from_millis(50)).await;

        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let channel = echo_channel();
        channel.dispose();
        channel.dispose();
        assert!(channel.is_disposed());
    }
}
