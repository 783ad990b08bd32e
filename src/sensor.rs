//! Latest-sample subscription to an asynchronous sensor.
//!
//! The producer (camera landmark detector, pitch tracker) runs at its own pace
//! and publishes into a channel. The game loop drains whatever arrived since the
//! last frame without ever blocking, and keeps reusing the newest sample when
//! nothing new came in.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::warn;

use crate::{Error, Result};

const ERROR_BACKOFF: Duration = Duration::from_millis(20);

/// Producer half. Cheap to clone.
#[derive(Clone)]
pub struct Publisher<T> {
    tx: Sender<Result<T>>,
    active: Arc<AtomicBool>,
}

impl<T> Publisher<T> {
    /// Returns false once the subscriber has cancelled or gone away.
    pub fn publish(&self, sample: T) -> bool {
        self.is_active() && self.tx.send(Ok(sample)).is_ok()
    }

    /// Reports an acquisition failure; the subscriber logs it and keeps going.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.report(Error::Sensor(message.into()))
    }

    fn report(&self, err: Error) -> bool {
        self.is_active() && self.tx.send(Err(err)).is_ok()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Consumer half, owned by the game loop.
pub struct Subscription<T> {
    rx: Receiver<Result<T>>,
    active: Arc<AtomicBool>,
    latest: Option<T>,
    errors: u64,
    disconnected: bool,
}

pub fn channel<T>() -> (Publisher<T>, Subscription<T>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let active = Arc::new(AtomicBool::new(true));
    (
        Publisher {
            tx,
            active: active.clone(),
        },
        Subscription {
            rx,
            active,
            latest: None,
            errors: 0,
            disconnected: false,
        },
    )
}

/// Runs `acquire` on its own thread until the subscription is cancelled.
/// Failed acquisitions are reported and retried.
pub fn spawn<T, F>(mut acquire: F) -> Subscription<T>
where
    T: Send + 'static,
    F: FnMut() -> Result<T> + Send + 'static,
{
    let (publisher, subscription) = channel();
    thread::spawn(move || {
        while publisher.is_active() {
            let delivered = match acquire() {
                Ok(sample) => publisher.publish(sample),
                Err(err) => {
                    let sent = publisher.report(err);
                    thread::sleep(ERROR_BACKOFF);
                    sent
                }
            };
            if !delivered {
                break;
            }
        }
    });
    subscription
}

impl<T> Subscription<T> {
    /// Takes everything published since the last call, oldest first. Errors are logged and skipped.
    pub fn drain(&mut self) -> Vec<T>
    where
        T: Clone,
    {
        let mut fresh = Vec::new();
        if !self.is_active() {
            return fresh;
        }
        loop {
            match self.rx.try_recv() {
                Ok(Ok(sample)) => fresh.push(sample),
                Ok(Err(err)) => {
                    self.errors += 1;
                    warn!(errors = self.errors, "sensor acquisition failed, retrying: {err}");
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.disconnected {
                        warn!("sensor producer went away");
                        self.disconnected = true;
                    }
                    break;
                }
            }
        }
        if let Some(last) = fresh.last() {
            self.latest = Some(last.clone());
        }
        fresh
    }

    /// Newest sample ever received, possibly stale.
    pub fn latest(&mut self) -> Option<&T>
    where
        T: Clone,
    {
        self.drain();
        self.latest.as_ref()
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stops the producer and forgets the last sample. Safe to call repeatedly.
    pub fn cancel(&mut self) {
        self.active.store(false, Ordering::Release);
        self.latest = None;
        while self.rx.try_recv().is_ok() {}
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}
