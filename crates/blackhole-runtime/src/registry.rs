//! Shared connection registry and the acceptor → worker handoff
//!
//! Two index-parallel arrays (records, poll descriptors) live behind one
//! mutex. The worker holds that mutex for as long as it has connections to
//! service and gives it up only while parked.
//!
//! The acceptor never touches the arrays or their mutex. It pushes new pairs
//! into a lock-free inbox and raises `incoming_pending`; the worker admits
//! the inbox at the top of every cycle. Parking uses a separate `park`
//! mutex that the worker holds only while checking its predicate, so the
//! acceptor's notify never waits behind a busy worker:
//!
//! ```text
//! acceptor                               worker (park mutex held)
//! --------                               ------------------------
//! inbox.push(pair)                       worker_blocked = true      (SeqCst)
//! incoming_pending = true   (SeqCst)     wait while !incoming_pending
//! if worker_blocked:                                  && !shutdown
//!     lock park; notify_all              worker_blocked = false
//! ```
//!
//! Each side stores before it loads, so at least one of them observes the
//! other and no wakeup is lost.

use crate::connection::{close_record, ConnectionRecord, Incoming, PollDescriptor};
use blackhole_core::cancel::CancellationToken;
use blackhole_core::error::{BhError, BhResult};
use blackhole_core::vector::{Destructor, Vector};
use blackhole_core::{kdebug, kerror};
use crossbeam_queue::SegQueue;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// The two arrays. `records.len() == descriptors.len()` outside of a method.
#[derive(Debug)]
pub struct RegistrySlots {
    records: Vector<ConnectionRecord>,
    descriptors: Vector<PollDescriptor>,
}

impl RegistrySlots {
    /// Empty arrays with room for `capacity` connections.
    pub fn with_capacity(capacity: usize) -> BhResult<Self> {
        let mut records = Vector::with_destructor(close_record as Destructor<ConnectionRecord>);
        let mut descriptors = Vector::new();
        records.expand_until(capacity)?;
        descriptors.expand_until(capacity)?;
        Ok(Self {
            records,
            descriptors,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.records.len() == self.descriptors.len()
    }

    /// Append a pair to both arrays.
    ///
    /// Room is reserved in both arrays before either is touched, so a
    /// growth failure leaves them unchanged. The pair's descriptor is closed
    /// in that case.
    pub fn insert(&mut self, incoming: Incoming) -> BhResult<()> {
        let needed = self.records.len() + 1;
        if let Err(e) = self
            .records
            .expand_until(needed)
            .and_then(|_| self.descriptors.expand_until(needed))
        {
            incoming.discard();
            return Err(BhError::Vector(e));
        }
        let Incoming { record, descriptor } = incoming;
        self.records.push(record)?;
        self.descriptors.push(descriptor)?;
        debug_assert!(self.is_consistent());
        Ok(())
    }

    /// Close and drop the connection at `index` from both arrays.
    ///
    /// Later entries shift down by one. Out-of-range is a no-op.
    pub fn remove(&mut self, index: usize) {
        if index >= self.records.len() {
            return;
        }
        self.records.delete(index);
        self.descriptors.delete(index);
        debug_assert!(self.is_consistent());
    }

    #[inline]
    pub fn record(&self, index: usize) -> Option<&ConnectionRecord> {
        self.records.get(index)
    }

    #[inline]
    pub fn record_mut(&mut self, index: usize) -> Option<&mut ConnectionRecord> {
        self.records.get_mut(index)
    }

    #[inline]
    pub fn descriptor(&self, index: usize) -> Option<&PollDescriptor> {
        self.descriptors.get(index)
    }

    /// Contiguous descriptor slice for `poll(2)`.
    #[inline]
    pub fn descriptors_mut(&mut self) -> &mut [PollDescriptor] {
        self.descriptors.as_mut_slice()
    }

    /// Close every descriptor and empty both arrays.
    pub fn close_all(&mut self) {
        self.records.clear();
        self.descriptors.clear();
    }
}

/// State shared by the server, the acceptor and the worker.
pub struct SharedRegistry {
    slots: Mutex<RegistrySlots>,
    park: Mutex<()>,
    handoff: Condvar,
    inbox: SegQueue<Incoming>,
    incoming_pending: AtomicBool,
    worker_blocked: AtomicBool,
    live: AtomicUsize,
    shutdown: CancellationToken,
}

impl SharedRegistry {
    pub fn new(initial_capacity: usize, shutdown: CancellationToken) -> BhResult<Self> {
        Ok(Self {
            slots: Mutex::new(RegistrySlots::with_capacity(initial_capacity)?),
            park: Mutex::new(()),
            handoff: Condvar::new(),
            inbox: SegQueue::new(),
            incoming_pending: AtomicBool::new(false),
            worker_blocked: AtomicBool::new(false),
            live: AtomicUsize::new(0),
            shutdown,
        })
    }

    #[inline]
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Connection count as last published by the worker.
    #[inline]
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn publish_live(&self, n: usize) {
        self.live.store(n, Ordering::Release);
    }

    #[inline]
    pub fn worker_blocked(&self) -> bool {
        self.worker_blocked.load(Ordering::SeqCst)
    }

    /// Number of pairs waiting for admission.
    #[inline]
    pub fn inbox_len(&self) -> usize {
        self.inbox.len()
    }

    /// Lock the arrays. A poisoned mutex is recovered: every mutation
    /// completes before anything that could panic.
    pub fn lock(&self) -> MutexGuard<'_, RegistrySlots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Acceptor side
    // ========================================================================

    /// Hand a freshly accepted pair to the worker. Never takes the slots
    /// mutex.
    pub fn publish(&self, incoming: Incoming) {
        self.inbox.push(incoming);
        self.incoming_pending.store(true, Ordering::SeqCst);
        if self.worker_blocked.load(Ordering::SeqCst) {
            self.wake_worker();
        }
    }

    /// Wake a parked worker so it can observe shutdown.
    pub fn release_worker(&self) {
        self.wake_worker();
    }

    fn wake_worker(&self) {
        let _park = self.park.lock().unwrap_or_else(PoisonError::into_inner);
        self.handoff.notify_all();
    }

    // ========================================================================
    // Worker side
    // ========================================================================

    /// Move every queued pair into the arrays. Returns how many were admitted.
    ///
    /// Called by the worker with the slots mutex held.
    pub fn admit_incoming(&self, slots: &mut RegistrySlots) -> usize {
        if !self.incoming_pending.swap(false, Ordering::SeqCst) {
            return 0;
        }
        let mut admitted = 0;
        while let Some(incoming) = self.inbox.pop() {
            let remote = incoming.record.remote();
            match slots.insert(incoming) {
                Ok(()) => {
                    admitted += 1;
                    kdebug!("admitted {} as #{}", remote, slots.len() - 1);
                }
                Err(e) => kerror!("dropping connection from {}: {}", remote, e),
            }
        }
        self.publish_live(slots.len());
        admitted
    }

    /// Park until a pair is published or shutdown is requested.
    ///
    /// Releases the slots mutex for the duration of the wait and re-acquires
    /// it before returning.
    pub fn park_worker<'a>(
        &'a self,
        slots: MutexGuard<'a, RegistrySlots>,
    ) -> MutexGuard<'a, RegistrySlots> {
        drop(slots);
        {
            let park = self.park.lock().unwrap_or_else(PoisonError::into_inner);
            self.worker_blocked.store(true, Ordering::SeqCst);
            let _park = self
                .handoff
                .wait_while(park, |_| {
                    !self.incoming_pending.load(Ordering::SeqCst) && !self.shutdown.is_cancelled()
                })
                .unwrap_or_else(PoisonError::into_inner);
            self.worker_blocked.store(false, Ordering::SeqCst);
        }
        self.lock()
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Close every registered and queued connection.
    pub fn close_all(&self) -> usize {
        let mut slots = self.lock();
        let mut closed = slots.len();
        slots.close_all();
        while let Some(incoming) = self.inbox.pop() {
            incoming.discard();
            closed += 1;
        }
        self.incoming_pending.store(false, Ordering::SeqCst);
        self.publish_live(0);
        closed
    }
}

impl Drop for SharedRegistry {
    fn drop(&mut self) {
        while let Some(incoming) = self.inbox.pop() {
            incoming.discard();
        }
    }
}

impl std::fmt::Debug for SharedRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegistry")
            .field("live", &self.live())
            .field("inbox", &self.inbox.len())
            .field("incoming_pending", &self.incoming_pending.load(Ordering::Relaxed))
            .field("worker_blocked", &self.worker_blocked.load(Ordering::Relaxed))
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::os::unix::io::IntoRawFd;
    use std::os::unix::net::UnixStream;
    use std::sync::Arc;
    use std::time::Duration;

    fn pair_incoming() -> (Incoming, UnixStream) {
        let (server, client) = UnixStream::pair().unwrap();
        let incoming = Incoming::new(server.into_raw_fd(), "127.0.0.1:9".parse().unwrap());
        (incoming, client)
    }

    /// True once the server end of the pair has been closed.
    fn peer_closed(client: &mut UnixStream) -> bool {
        client.set_nonblocking(true).unwrap();
        let mut buf = [0u8; 1];
        match client.read(&mut buf) {
            Ok(0) => true,
            Ok(_) => false,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => false,
            Err(e) => panic!("read failed: {}", e),
        }
    }

    #[test]
    fn test_insert_remove_keeps_arrays_parallel() {
        let mut slots = RegistrySlots::with_capacity(2).unwrap();
        let mut clients = Vec::new();
        let mut fds = Vec::new();
        for _ in 0..5 {
            let (incoming, client) = pair_incoming();
            fds.push(incoming.record.fd());
            slots.insert(incoming).unwrap();
            clients.push(client);
            assert!(slots.is_consistent());
        }
        assert_eq!(slots.len(), 5);

        slots.remove(1);
        assert!(slots.is_consistent());
        assert_eq!(slots.len(), 4);
        assert!(peer_closed(&mut clients[1]));
        assert!(!peer_closed(&mut clients[2]));
        assert_eq!(slots.record(1).unwrap().fd(), fds[2]);
        assert_eq!(slots.descriptor(1).unwrap().fd(), fds[2]);

        slots.remove(99);
        assert_eq!(slots.len(), 4);

        slots.close_all();
        assert!(slots.is_empty());
        assert!(slots.is_consistent());
        for client in clients.iter_mut() {
            assert!(peer_closed(client));
        }
    }

    #[test]
    fn test_publish_then_admit() {
        let token = CancellationToken::new().unwrap();
        let registry = SharedRegistry::new(4, token).unwrap();
        let mut slots = registry.lock();

        assert_eq!(registry.admit_incoming(&mut slots), 0);

        let (a, _ca) = pair_incoming();
        let (b, _cb) = pair_incoming();
        registry.publish(a);
        registry.publish(b);
        assert_eq!(registry.inbox_len(), 2);

        assert_eq!(registry.admit_incoming(&mut slots), 2);
        assert_eq!(slots.len(), 2);
        assert_eq!(registry.live(), 2);
        assert_eq!(registry.inbox_len(), 0);
        assert_eq!(registry.admit_incoming(&mut slots), 0);
    }

    #[test]
    fn test_parked_worker_wakes_on_publish() {
        let token = CancellationToken::new().unwrap();
        let registry = Arc::new(SharedRegistry::new(4, token).unwrap());

        let worker_registry = Arc::clone(&registry);
        let worker = std::thread::spawn(move || {
            let mut slots = worker_registry.lock();
            slots = worker_registry.park_worker(slots);
            worker_registry.admit_incoming(&mut slots)
        });

        while !registry.worker_blocked() {
            std::thread::sleep(Duration::from_millis(1));
        }
        let (incoming, _client) = pair_incoming();
        registry.publish(incoming);

        assert_eq!(worker.join().unwrap(), 1);
        assert_eq!(registry.live(), 1);
        assert!(!registry.worker_blocked());
    }

    #[test]
    fn test_parked_worker_wakes_on_shutdown() {
        let token = CancellationToken::new().unwrap();
        let registry = Arc::new(SharedRegistry::new(4, token.clone()).unwrap());

        let worker_registry = Arc::clone(&registry);
        let worker = std::thread::spawn(move || {
            let slots = worker_registry.lock();
            let slots = worker_registry.park_worker(slots);
            slots.len()
        });

        while !registry.worker_blocked() {
            std::thread::sleep(Duration::from_millis(1));
        }
        token.cancel();
        registry.release_worker();

        assert_eq!(worker.join().unwrap(), 0);
    }

    #[test]
    fn test_publish_does_not_wait_for_busy_worker() {
        let token = CancellationToken::new().unwrap();
        let registry = Arc::new(SharedRegistry::new(4, token).unwrap());

        // Worker has just left its wait: flag still set, slots mutex held
        // for a long busy stretch.
        let (held_tx, held_rx) = std::sync::mpsc::channel();
        let busy_registry = Arc::clone(&registry);
        let busy = std::thread::spawn(move || {
            let _slots = busy_registry.lock();
            busy_registry.worker_blocked.store(true, Ordering::SeqCst);
            held_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(50));
            busy_registry.worker_blocked.store(false, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(1500));
        });
        held_rx.recv().unwrap();

        let (incoming, _client) = pair_incoming();
        let start = std::time::Instant::now();
        registry.publish(incoming);
        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(registry.inbox_len(), 1);

        busy.join().unwrap();
        assert_eq!(registry.close_all(), 1);
    }

    #[test]
    fn test_close_all_drains_inbox() {
        let token = CancellationToken::new().unwrap();
        let registry = SharedRegistry::new(4, token).unwrap();

        let (admitted, mut c1) = pair_incoming();
        let (queued, mut c2) = pair_incoming();
        registry.publish(admitted);
        {
            let mut slots = registry.lock();
            registry.admit_incoming(&mut slots);
        }
        registry.publish(queued);

        assert_eq!(registry.close_all(), 2);
        assert_eq!(registry.live(), 0);
        assert!(peer_closed(&mut c1));
        assert!(peer_closed(&mut c2));
    }
}
