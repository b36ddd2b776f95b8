//! Clock synchronization for Hawk timestamps.
//!
//! Hawk servers reject requests whose timestamp is too far from their own clock.  A [`ClockSync`]
//! periodically asks a [`TimeSource`] (by default, an SNTP server) for the local clock's offset
//! and exposes a corrected [`ClockSync::now`].

use crate::config::SntpOptions;
use crate::error::*;
use log::{debug, warn};
use once_cell::sync::OnceCell;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

static GLOBAL: OnceCell<Arc<ClockSync>> = OnceCell::new();

/// A source of clock offsets: the number of milliseconds to add to the local clock to match the
/// reference clock.
pub trait TimeSource: Send + Sync {
    fn offset(&self, options: &SntpOptions) -> Result<i64>;
}

struct Worker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// Manager for the background clock-synchronization job.
///
/// Starting is idempotent: of any number of concurrent `start` calls, exactly one spawns the
/// worker, until `stop` is called.
pub struct ClockSync {
    source: Arc<dyn TimeSource>,
    started: AtomicBool,
    offset_ms: Arc<AtomicI64>,
    worker: Mutex<Option<Worker>>,
}

impl ClockSync {
    /// Create a manager that synchronizes against SNTP servers.
    pub fn new() -> Self {
        ClockSync::with_source(Arc::new(Sntp))
    }

    pub fn with_source(source: Arc<dyn TimeSource>) -> Self {
        ClockSync {
            source,
            started: AtomicBool::new(false),
            offset_ms: Arc::new(AtomicI64::new(0)),
            worker: Mutex::new(None),
        }
    }

    /// The process-wide instance, for callers that share one clock across interceptor chains
    /// and need to stop it at shutdown.
    pub fn global() -> &'static Arc<ClockSync> {
        GLOBAL.get_or_init(|| Arc::new(ClockSync::new()))
    }

    /// Start synchronizing, unless already started.  Returns true if this call started the
    /// worker.
    ///
    /// The worker fetches the offset immediately, calls `on_synced` with it once that first
    /// attempt is over, and then refreshes it every `options.refresh()`.
    pub fn start<F>(&self, options: SntpOptions, on_synced: F) -> bool
    where
        F: FnOnce(i64) + Send + 'static,
    {
        let mut worker = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let (stop, stopped) = mpsc::channel();
        let source = self.source.clone();
        let offset_ms = self.offset_ms.clone();
        let handle = thread::spawn(move || {
            let mut on_synced = Some(on_synced);
            loop {
                match source.offset(&options) {
                    Ok(offset) => {
                        debug!("clock offset from {}: {}ms", options.host, offset);
                        offset_ms.store(offset, Ordering::SeqCst);
                    }
                    Err(e) => warn!("clock sync with {} failed: {}", options.host, e),
                }
                if let Some(cb) = on_synced.take() {
                    cb(offset_ms.load(Ordering::SeqCst));
                }
                match stopped.recv_timeout(options.refresh()) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    _ => break,
                }
            }
        });

        *worker = Some(Worker { stop, handle });
        true
    }

    /// Stop the background job and forget the offset.  Does nothing if not started.
    ///
    /// Blocks until the worker exits, which is at most one SNTP read timeout.
    pub fn stop(&self) {
        // `started` is cleared under the lock, so a concurrent `start` either sees the old worker
        // or gets to spawn a new one.
        let mut guard = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(worker) = guard.take() {
            let _ = worker.stop.send(());
            if worker.handle.join().is_err() {
                warn!("clock sync worker panicked");
            }
            self.offset_ms.store(0, Ordering::SeqCst);
            self.started.store(false, Ordering::SeqCst);
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// The current offset of the local clock, in milliseconds.
    pub fn offset(&self) -> i64 {
        self.offset_ms.load(Ordering::SeqCst)
    }

    /// The current time, corrected by the synchronized offset.
    pub fn now(&self) -> SystemTime {
        let now = SystemTime::now();
        shift(now, self.offset()).unwrap_or(now)
    }
}

impl Default for ClockSync {
    fn default() -> Self {
        ClockSync::new()
    }
}

impl Drop for ClockSync {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Shift a time by a signed number of milliseconds, or None if the result is not representable.
pub(crate) fn shift(time: SystemTime, offset_ms: i64) -> Option<SystemTime> {
    let delta = Duration::from_millis(offset_ms.unsigned_abs());
    if offset_ms >= 0 {
        time.checked_add(delta)
    } else {
        time.checked_sub(delta)
    }
}

/// Seconds between the NTP epoch (1900) and the Unix epoch.
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// A single-exchange SNTP v4 client (RFC 4330).
pub struct Sntp;

impl Sntp {
    fn resolve(options: &SntpOptions) -> Result<SocketAddr> {
        let addr = (options.host.as_str(), options.port)
            .to_socket_addrs()?
            .next()
            .ok_or(Error::Sntp("host did not resolve"))?;
        if options.resolve_reference {
            debug!("sntp reference host {} is {}", options.host, addr);
        }
        Ok(addr)
    }
}

impl TimeSource for Sntp {
    fn offset(&self, options: &SntpOptions) -> Result<i64> {
        let addr = Sntp::resolve(options)?;
        let bind = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind)?;
        socket.set_read_timeout(Some(options.timeout()))?;
        socket.connect(addr)?;

        let mut packet = [0u8; 48];
        // LI = 0, VN = 4, Mode = 3 (client)
        packet[0] = 0b00_100_011;
        let t1 = SystemTime::now();
        packet[40..48].copy_from_slice(&to_ntp(t1).to_be_bytes());
        socket.send(&packet)?;

        let mut reply = [0u8; 48];
        let len = socket.recv(&mut reply)?;
        let t4 = SystemTime::now();

        offset_from_reply(&reply[..len], t1, t4)
    }
}

fn to_ntp(time: SystemTime) -> u64 {
    let since = time.duration_since(UNIX_EPOCH).unwrap_or_default();
    let secs = since.as_secs() + NTP_UNIX_OFFSET;
    let frac = (u64::from(since.subsec_nanos()) << 32) / 1_000_000_000;
    (secs << 32) | frac
}

/// Milliseconds since the Unix epoch for an NTP timestamp.
fn ntp_to_millis(ts: u64) -> i64 {
    let secs = (ts >> 32) as i64 - NTP_UNIX_OFFSET as i64;
    let millis = ((ts & 0xffff_ffff) * 1000 + (1 << 31)) >> 32;
    secs * 1000 + millis as i64
}

fn unix_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Validate an SNTP server reply and compute the clock offset `((T2 - T1) + (T3 - T4)) / 2`.
pub(crate) fn offset_from_reply(reply: &[u8], t1: SystemTime, t4: SystemTime) -> Result<i64> {
    if reply.len() < 48 {
        return Err(Error::Sntp("short reply"));
    }
    let version = (reply[0] >> 3) & 0b111;
    let mode = reply[0] & 0b111;
    if version != 3 && version != 4 {
        return Err(Error::Sntp("unsupported version"));
    }
    // 4 = server, 5 = broadcast
    if mode != 4 && mode != 5 {
        return Err(Error::Sntp("unexpected mode"));
    }
    if reply[1] == 0 {
        return Err(Error::Sntp("kiss-of-death (stratum 0)"));
    }

    let read = |at: usize| {
        let mut b = [0u8; 8];
        b.copy_from_slice(&reply[at..at + 8]);
        u64::from_be_bytes(b)
    };
    let (received, transmitted) = (read(32), read(40));
    if transmitted == 0 {
        return Err(Error::Sntp("missing transmit timestamp"));
    }

    let t1 = unix_millis(t1);
    let t2 = ntp_to_millis(received);
    let t3 = ntp_to_millis(transmitted);
    let t4 = unix_millis(t4);
    Ok(((t2 - t1) + (t3 - t4)) / 2)
}
