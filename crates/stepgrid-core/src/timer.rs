//! Repeating timers for the poll and frame loops.
//!
//! Each timer owns one thread that calls its callback on every tick of a
//! `crossbeam_channel::tick` until the timer is stopped or dropped.

use crossbeam_channel::{select, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A callback invoked at a fixed interval on its own thread.
pub struct RepeatingTimer {
    name: String,
    stop_tx: Option<Sender<()>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl RepeatingTimer {
    /// Spawn a thread calling `tick` every `interval`.
    ///
    /// The first call happens immediately.
    pub fn start<F>(name: &str, interval: Duration, mut tick: F) -> std::io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let ticker = crossbeam_channel::tick(interval);

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                tick();
                loop {
                    select! {
                        // Disconnect (sender dropped) also lands here
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => tick(),
                    }
                }
            })?;

        log::debug!("[TIMER] '{}' started ({:?} interval)", name, interval);
        Ok(Self {
            name: name.to_string(),
            stop_tx: Some(stop_tx),
            thread_handle: Some(thread_handle),
        })
    }

    /// Whether the timer thread is still alive.
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the timer and wait for its thread to exit.
    ///
    /// A tick in progress completes first.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_tx.take();
        if let Some(handle) = self.thread_handle.take() {
            if handle.thread().id() == thread::current().id() {
                // Stopped from inside its own tick; the loop exits on the next select
                return;
            }
            if handle.join().is_err() {
                log::error!("[TIMER] '{}' thread panicked", self.name);
            } else {
                log::debug!("[TIMER] '{}' stopped", self.name);
            }
        }
    }
}

impl Drop for RepeatingTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_timer_ticks_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let timer = RepeatingTimer::start("test-timer", Duration::from_millis(2), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        assert!(timer.is_running());
        timer.stop();

        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop >= 2, "only {after_stop} ticks");
        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_first_tick_is_immediate() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let _timer = RepeatingTimer::start("test-immediate", Duration::from_secs(60), move || {
            let _ = tx.send(());
        })
        .unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
