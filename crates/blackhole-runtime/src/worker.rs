//! Poll worker
//!
//! The worker owns the registry mutex while it has connections. Each cycle:
//!
//! 1. admit pairs published by the acceptor
//! 2. `poll(2)` every descriptor (short timeout while writes are queued)
//! 3. classify readiness per descriptor: hang-up > error > readable
//! 4. read once from each readable descriptor and queue one write per
//!    completed request
//! 5. drain up to `write_budget` queued writes, newest first
//!
//! With zero connections it parks on the registry condvar instead.

use crate::config::ServerConfig;
use crate::connection::{PollDescriptor, Readiness};
use crate::registry::{RegistrySlots, SharedRegistry};
use crate::response::Response;
use blackhole_core::error::BhResult;
use blackhole_core::kprint;
use blackhole_core::vector::Vector;
use blackhole_core::{kdebug, kerror, kinfo, ktrace, kwarn};
use nix::errno::Errno;
use nix::sys::socket::{recv, send, MsgFlags};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counters kept by the worker, returned when it exits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub cycles: u64,
    pub admitted: u64,
    pub requests: u64,
    pub responses: u64,
    pub short_writes: u64,
    pub dropped_writes: u64,
    pub closed: u64,
    pub poll_errors: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl WorkerStats {
    pub fn print(&self, live: usize, elapsed: f64) {
        let rps = if elapsed > 0.0 {
            self.responses as f64 / elapsed
        } else {
            0.0
        };
        kinfo!(
            "[{:.1}s] conns={} admitted={} req={} resp={} rps={:.0} short={} dropped={} \
             closed={} poll_err={} bytes_in={} bytes_out={}",
            elapsed,
            live,
            self.admitted,
            self.requests,
            self.responses,
            rps,
            self.short_writes,
            self.dropped_writes,
            self.closed,
            self.poll_errors,
            self.bytes_in,
            self.bytes_out,
        );
    }
}

/// Registry indices awaiting a response, serviced LIFO.
#[derive(Debug, Default)]
pub struct PendingWrites {
    queue: Vector<usize>,
}

impl PendingWrites {
    pub fn new() -> Self {
        Self { queue: Vector::new() }
    }

    pub fn with_capacity(capacity: usize) -> BhResult<Self> {
        let mut queue = Vector::new();
        queue.expand_until(capacity)?;
        Ok(Self { queue })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn push(&mut self, index: usize) -> BhResult<()> {
        self.queue.push(index)?;
        Ok(())
    }

    /// Most recently queued index.
    pub fn pop(&mut self) -> Option<usize> {
        self.queue.pop()
    }

    /// Account for the removal of registry slot `removed`: its entries are
    /// dropped and every later index shifts down by one.
    pub fn forget(&mut self, removed: usize) {
        let mut j = 0;
        while let Some(&index) = self.queue.get(j) {
            if index == removed {
                self.queue.delete(j);
                continue;
            }
            if index > removed {
                if let Some(slot) = self.queue.get_mut(j) {
                    *slot = index - 1;
                }
            }
            j += 1;
        }
    }

    pub fn as_slice(&self) -> &[usize] {
        self.queue.as_slice()
    }
}

/// The poll thread.
pub struct PollWorker {
    registry: Arc<SharedRegistry>,
    response: Response,
    busy_timeout: Duration,
    idle_timeout: Duration,
    write_budget: usize,
    stats_interval: Duration,
    pending: PendingWrites,
    recv_buf: Box<[u8]>,
    stats: WorkerStats,
}

impl PollWorker {
    pub fn new(
        registry: Arc<SharedRegistry>,
        response: Response,
        config: &ServerConfig,
    ) -> BhResult<Self> {
        Ok(Self {
            registry,
            response,
            busy_timeout: config.busy_poll_timeout,
            idle_timeout: config.idle_poll_timeout,
            write_budget: config.write_budget,
            stats_interval: config.stats_interval,
            pending: PendingWrites::with_capacity(config.initial_capacity)?,
            recv_buf: vec![0u8; config.recv_buffer_size].into_boxed_slice(),
            stats: WorkerStats::default(),
        })
    }

    #[inline]
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    #[inline]
    pub fn pending(&self) -> &PendingWrites {
        &self.pending
    }

    /// Worker thread body. Returns the final counters once shutdown is
    /// observed.
    pub fn run(mut self) -> WorkerStats {
        kprint::set_thread_tag("worker");
        kdebug!("poll worker starting");

        let registry = Arc::clone(&self.registry);
        let start = Instant::now();
        let mut last_stats = start;
        let mut slots = registry.lock();

        loop {
            if registry.shutdown_token().is_cancelled() {
                break;
            }

            self.stats.admitted += registry.admit_incoming(&mut slots) as u64;

            if slots.is_empty() {
                kdebug!("no connections, worker parking");
                slots = registry.park_worker(slots);
                kdebug!("worker woke up");
                continue;
            }

            self.cycle(&mut slots);

            if !self.stats_interval.is_zero() && last_stats.elapsed() >= self.stats_interval {
                self.stats.print(slots.len(), start.elapsed().as_secs_f64());
                last_stats = Instant::now();
            }
        }

        let live = slots.len();
        drop(slots);
        self.stats.print(live, start.elapsed().as_secs_f64());
        kdebug!("poll worker exiting");
        self.stats
    }

    /// One poll/read/write pass over the registered connections.
    pub fn cycle(&mut self, slots: &mut RegistrySlots) {
        self.stats.cycles += 1;
        let timeout = if self.pending.is_empty() {
            self.idle_timeout
        } else {
            self.busy_timeout
        };

        match poll_slots(slots, timeout) {
            Ok(0) => {
                ktrace!("poll timed out with {} connections", slots.len());
            }
            Ok(n) => {
                ktrace!("{} descriptors ready", n);
                self.service_ready(slots);
            }
            Err(Errno::EINTR) => {}
            Err(e) => {
                self.stats.poll_errors += 1;
                kerror!("poll() failed: {}", e.desc());
            }
        }

        self.drain_writes(slots);
        self.registry.publish_live(slots.len());
    }

    fn service_ready(&mut self, slots: &mut RegistrySlots) {
        let mut i = 0;
        while let Some(descriptor) = slots.descriptor(i) {
            match descriptor.readiness() {
                Readiness::Idle => i += 1,
                Readiness::HangUp => {
                    self.remove(slots, i);
                    kinfo!("client #{} hung up, {} clients left", i, slots.len());
                }
                Readiness::Error => {
                    self.remove(slots, i);
                    kerror!("client #{} poll error, {} clients left", i, slots.len());
                }
                Readiness::Readable => {
                    if self.read_one(slots, i) {
                        i += 1;
                    }
                }
            }
        }
    }

    /// Read once from slot `i`. Returns false if the connection was removed.
    fn read_one(&mut self, slots: &mut RegistrySlots, i: usize) -> bool {
        let Some(record) = slots.record_mut(i) else {
            return false;
        };

        match recv(record.fd(), &mut self.recv_buf, MsgFlags::MSG_DONTWAIT) {
            Ok(0) => {
                self.remove(slots, i);
                kinfo!("client #{} closed, {} clients left", i, slots.len());
                false
            }
            Ok(n) => {
                self.stats.bytes_in += n as u64;
                let requests = record.scanner_mut().feed(&self.recv_buf[..n]);
                kdebug!("received {} bytes from #{} ({} requests)", n, i, requests);
                for _ in 0..requests {
                    if let Err(e) = self.pending.push(i) {
                        kerror!("cannot queue response for #{}: {}", i, e);
                        break;
                    }
                    self.stats.requests += 1;
                }
                true
            }
            Err(Errno::EAGAIN) | Err(Errno::EINTR) => true,
            Err(e) => {
                self.remove(slots, i);
                kerror!("recv() from #{} failed: {}, {} clients left", i, e.desc(), slots.len());
                false
            }
        }
    }

    /// Send the response to at most `write_budget` queued connections.
    fn drain_writes(&mut self, slots: &mut RegistrySlots) {
        if self.pending.is_empty() {
            return;
        }
        let mut budget = self.write_budget;
        while budget > 0 {
            let Some(i) = self.pending.pop() else {
                break;
            };
            budget -= 1;

            let Some(record) = slots.record(i) else {
                kwarn!("queued write for vanished slot #{}", i);
                continue;
            };
            let total = self.response.len();
            let flags = MsgFlags::MSG_DONTWAIT | MsgFlags::MSG_NOSIGNAL;

            match send(record.fd(), self.response.as_bytes(), flags) {
                Ok(n) if n == total => {
                    self.stats.responses += 1;
                    self.stats.bytes_out += n as u64;
                    kdebug!("responded to #{}", i);
                }
                Ok(n) => {
                    self.stats.short_writes += 1;
                    self.stats.bytes_out += n as u64;
                    kwarn!("short write to #{}: {}/{} bytes", i, n, total);
                }
                Err(Errno::EAGAIN) | Err(Errno::EINTR) => {
                    self.stats.dropped_writes += 1;
                    kwarn!("send buffer of #{} full, response dropped", i);
                }
                Err(e) => {
                    self.remove(slots, i);
                    kerror!("send() to #{} failed: {}, {} clients left", i, e.desc(), slots.len());
                }
            }
        }
        if !self.pending.is_empty() {
            ktrace!("{} writes deferred to next cycle", self.pending.len());
        }
    }

    fn remove(&mut self, slots: &mut RegistrySlots, i: usize) {
        slots.remove(i);
        self.pending.forget(i);
        self.stats.closed += 1;
    }
}

/// `poll(2)` over the registry's descriptor array.
fn poll_slots(slots: &mut RegistrySlots, timeout: Duration) -> Result<usize, Errno> {
    let descriptors = slots.descriptors_mut();
    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;
    let ret = unsafe {
        libc::poll(
            PollDescriptor::as_raw_mut(descriptors),
            descriptors.len() as libc::nfds_t,
            timeout_ms,
        )
    };
    if ret < 0 {
        Err(Errno::last())
    } else {
        Ok(ret as usize)
    }
}
