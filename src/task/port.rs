// src/task/port.rs

//! Bounded FIFO ports connecting tasks.
//!
//! Ports wrap `tokio::sync::mpsc` channels of capacity [`BUFSIZE`]. The
//! bound gives back-pressure without deadlocking single-step pipelines:
//! a slow consumer eventually blocks its producer on send. Closure is
//! producer-side only: dropping every sender ends the stream, and
//! `recv()` returning `None` is the "closed and drained" observation the
//! driver loop terminates on.

use tokio::sync::mpsc;

/// Capacity of every port's FIFO buffer.
pub const BUFSIZE: usize = 16;

/// Receiving endpoint of a task, created for each `{i:NAME}` / `{p:NAME}`
/// placeholder.
///
/// A fresh port owns both halves of its own channel so values can be fed
/// manually through [`sender`](InPort::sender); wiring an upstream output
/// port into it via [`connect`](InPort::connect) replaces the receiving
/// half instead. Either action marks the port as wired. A port that is
/// still unwired when the task first tries to receive is a wiring mistake
/// and reported as such by the task.
#[derive(Debug)]
pub struct InPort<T> {
    tx: Option<mpsc::Sender<T>>,
    rx: mpsc::Receiver<T>,
    wired: bool,
}

impl<T> InPort<T> {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::channel(BUFSIZE);
        Self {
            tx: Some(tx),
            rx,
            wired: false,
        }
    }

    /// Replace the receiving half with an upstream output stream.
    pub(crate) fn connect(&mut self, rx: mpsc::Receiver<T>) {
        self.rx = rx;
        self.tx = None;
        self.wired = true;
    }

    /// Hand out a sender for feeding values manually.
    ///
    /// Returns `None` once the port has been connected to an upstream
    /// stream (the internal channel is gone by then).
    pub(crate) fn sender(&mut self) -> Option<mpsc::Sender<T>> {
        let tx = self.tx.as_ref().cloned()?;
        self.wired = true;
        Some(tx)
    }

    /// Send a value through the port's own channel, if still present.
    /// Feeding counts as wiring the port.
    pub(crate) async fn feed(&mut self, value: T) -> bool {
        match &self.tx {
            Some(tx) => {
                self.wired = true;
                tx.send(value).await.is_ok()
            }
            None => false,
        }
    }

    /// Drop the internally held sender so the channel can close once all
    /// externally held senders are gone. Called when the task starts.
    pub(crate) fn seal(&mut self) {
        self.tx = None;
    }

    pub(crate) fn is_wired(&self) -> bool {
        self.wired
    }

    pub(crate) async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

/// Sending endpoint of a task, created for each `{o:NAME}` placeholder.
///
/// The receiving half stays parked inside the port until user code takes
/// it, either to wire it into a downstream input port or to drain the
/// terminal task from a pipeline.
#[derive(Debug)]
pub struct OutPort<T> {
    tx: Option<mpsc::Sender<T>>,
    rx: Option<mpsc::Receiver<T>>,
}

impl<T> OutPort<T> {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::channel(BUFSIZE);
        Self {
            tx: Some(tx),
            rx: Some(rx),
        }
    }

    /// Take the receiving half for wiring or draining.
    ///
    /// Returns `None` if it was already taken.
    pub(crate) fn receiver(&mut self) -> Option<mpsc::Receiver<T>> {
        self.rx.take()
    }

    /// Send a value downstream.
    ///
    /// Returns `false` when the receiving half has been dropped: the
    /// downstream is gone and the producer should stop iterating.
    pub(crate) async fn send(&mut self, value: T) -> bool {
        match &self.tx {
            Some(tx) => tx.send(value).await.is_ok(),
            None => false,
        }
    }

    /// Close the stream by dropping the sending half.
    ///
    /// The producer closes exactly once, after its last value; closure
    /// propagates termination downstream.
    pub(crate) fn close(&mut self) {
        self.tx = None;
    }
}
