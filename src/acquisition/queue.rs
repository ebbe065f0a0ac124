//! Record buffer between the readout producer and the polling loop, and the
//! cooperative cancellation flag shared by the two.
//!
//! - Producer: readout thread, appends decoded records (non-blocking, mutex on the deque)
//! - Consumer: session polling loop, drains the whole buffer once per tick

use crate::acquisition::interfaces::EventSource;
use crate::parser::decode_word;
use crate::types::EventRecord;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

type SharedQueue = Arc<Mutex<VecDeque<EventRecord>>>;

/// Creates the two ends of a record queue.
pub fn record_queue() -> (RecordProducer, RecordConsumer) {
    let queue: SharedQueue = Arc::new(Mutex::new(VecDeque::with_capacity(4096)));
    (
        RecordProducer {
            queue: Arc::clone(&queue),
        },
        RecordConsumer { queue },
    )
}

/// Appending end of the queue. Clones share the same buffer; only one of them
/// should be producing at a time.
#[derive(Clone)]
pub struct RecordProducer {
    queue: SharedQueue,
}

impl RecordProducer {
    pub fn push(&self, record: EventRecord) {
        self.queue.lock().push_back(record);
    }

    pub fn extend(&self, records: impl IntoIterator<Item = EventRecord>) {
        self.queue.lock().extend(records);
    }

    /// Decodes raw readout words and appends them in order.
    pub fn push_words(&self, words: &[u32]) {
        self.extend(words.iter().map(|&word| decode_word(word)));
    }
}

/// Draining end of the queue.
pub struct RecordConsumer {
    queue: SharedQueue,
}

impl RecordConsumer {
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl EventSource for RecordConsumer {
    fn take_available(&mut self) -> Vec<EventRecord> {
        self.queue.lock().drain(..).collect()
    }
}

/// Cancellation flag with a timed wait that wakes as soon as it is set.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock() = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Blocks for at most `timeout`. Returns true if the token is cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut cancelled = lock.lock();
        while !*cancelled {
            if cvar.wait_until(&mut cancelled, deadline).timed_out() {
                break;
            }
        }
        *cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn drain_empties_queue_in_order() {
        let (producer, mut consumer) = record_queue();
        for row in 1..=5 {
            producer.push(EventRecord::hit(4, 1, row, 0));
        }
        let drained = consumer.take_available();
        let rows: Vec<u16> = drained.iter().filter_map(|r| r.as_hit()).map(|h| h.row).collect();
        assert_eq!(rows, vec![1, 2, 3, 4, 5]);
        assert!(consumer.is_empty());
        assert!(consumer.take_available().is_empty());
    }

    #[test]
    fn producer_thread_feeds_consumer() {
        let (producer, mut consumer) = record_queue();
        let handle = thread::spawn(move || {
            for row in 1..=100 {
                producer.push(EventRecord::hit(4, 2, row, 1));
            }
        });
        handle.join().unwrap();
        assert_eq!(consumer.len(), 100);
        assert_eq!(consumer.take_available().len(), 100);
    }

    #[test]
    fn wait_times_out_without_cancel() {
        let token = CancellationToken::new();
        let start = Instant::now();
        assert!(!token.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn cancel_wakes_waiter() {
        let token = CancellationToken::new();
        let remote = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            remote.cancel();
        });
        let start = Instant::now();
        assert!(token.wait_timeout(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
        assert!(token.is_cancelled());
    }
}
