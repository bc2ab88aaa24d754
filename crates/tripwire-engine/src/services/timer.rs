use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use tripwire_events::{DomainId, TriggerId};

use crate::error::EngineError;
use crate::host::Subscription;

/// Unique identifier for a registered timer callback
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimerKey {
    pub domain: DomainId,
    pub trigger: TriggerId,
    seq: u64,
}

/// One tick as seen by a callback
#[derive(Debug, Clone)]
pub struct TimerTick {
    /// Seconds elapsed since the first domain attached
    pub elapsed: u64,
    /// Key of the receiving callback, for self-removal
    pub key: TimerKey,
}

pub type TimerCallback = Arc<dyn Fn(TimerTick) + Send + Sync>;

/// How the shared clock advances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickMode {
    /// A spawned task calls [`TimerService::tick`] on this period
    Interval(Duration),
    /// Nothing ticks unless [`TimerService::tick`] is called
    Manual,
}

#[derive(Default)]
struct TimerTable {
    domains: BTreeSet<DomainId>,
    /// Registration order across all domains
    callbacks: Vec<(TimerKey, TimerCallback)>,
    elapsed: u64,
    ticker: Option<JoinHandle<()>>,
}

/// One shared clock for every domain in the process.
///
/// The first attached domain starts the clock, the last detached domain
/// stops it and resets the elapsed counter. Callbacks run outside the table
/// lock, so they may register or remove timers themselves.
pub struct TimerService {
    mode: TickMode,
    table: Mutex<TimerTable>,
    next_seq: AtomicU64,
}

impl TimerService {
    pub fn new(mode: TickMode) -> Self {
        Self {
            mode,
            table: Mutex::new(TimerTable::default()),
            next_seq: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TimerTable> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn mode(&self) -> TickMode {
        self.mode
    }

    /// Add a domain, starting the clock if it is the first
    pub fn attach(self: &Arc<Self>, domain: &DomainId) -> Result<(), EngineError> {
        let mut table = self.lock();
        if table.domains.contains(domain) {
            return Ok(());
        }

        if table.domains.is_empty() {
            if let TickMode::Interval(period) = self.mode {
                let runtime =
                    tokio::runtime::Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
                table.ticker = Some(runtime.spawn(run_ticker(Arc::downgrade(self), period)));
            }
            info!(target: "timer", "Shared timer started by domain {}", domain);
        }

        table.domains.insert(domain.clone());
        debug!(target: "timer", "Domain {} attached", domain);
        Ok(())
    }

    /// Remove a domain and all of its callbacks. Stops the clock and resets
    /// the counter when no domain is left.
    pub fn detach(&self, domain: &DomainId) {
        let mut table = self.lock();
        if !table.domains.remove(domain) {
            return;
        }
        table.callbacks.retain(|(key, _)| &key.domain != domain);
        debug!(target: "timer", "Domain {} detached", domain);

        if table.domains.is_empty() {
            if let Some(ticker) = table.ticker.take() {
                ticker.abort();
            }
            table.elapsed = 0;
            info!(target: "timer", "Shared timer stopped");
        }
    }

    /// Register a callback for a trigger, attaching its domain if needed.
    ///
    /// The returned subscription removes the callback when released.
    pub fn register(
        self: &Arc<Self>,
        domain: &DomainId,
        trigger: &TriggerId,
        callback: TimerCallback,
    ) -> Result<Subscription, EngineError> {
        self.attach(domain)?;

        let key = TimerKey {
            domain: domain.clone(),
            trigger: trigger.clone(),
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };
        self.lock().callbacks.push((key.clone(), callback));
        debug!(target: "timer", "Timer registered for trigger {} in {}", trigger, domain);

        let service = Arc::downgrade(self);
        let id = format!("timer-{}-{}", domain, key.seq);
        Ok(Subscription::new(id, move || {
            if let Some(service) = service.upgrade() {
                service.remove(&key);
            }
        }))
    }

    /// Remove one callback. Returns false when it was already gone.
    pub fn remove(&self, key: &TimerKey) -> bool {
        let mut table = self.lock();
        let before = table.callbacks.len();
        table.callbacks.retain(|(k, _)| k != key);
        before != table.callbacks.len()
    }

    /// Advance the clock by one second and call every callback in
    /// registration order. Returns the new elapsed count.
    pub fn tick(&self) -> u64 {
        let (elapsed, callbacks) = {
            let mut table = self.lock();
            if table.domains.is_empty() {
                return table.elapsed;
            }
            table.elapsed += 1;
            (table.elapsed, table.callbacks.clone())
        };

        for (key, callback) in callbacks {
            callback(TimerTick { elapsed, key });
        }
        elapsed
    }

    pub fn is_running(&self) -> bool {
        !self.lock().domains.is_empty()
    }

    pub fn elapsed(&self) -> u64 {
        self.lock().elapsed
    }

    pub fn domain_count(&self) -> usize {
        self.lock().domains.len()
    }

    /// Number of callbacks across all domains
    pub fn registered_count(&self) -> usize {
        self.lock().callbacks.len()
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        if let Some(ticker) = self.lock().ticker.take() {
            ticker.abort();
        }
    }
}

async fn run_ticker(service: Weak<TimerService>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately
    interval.tick().await;

    loop {
        interval.tick().await;
        match service.upgrade() {
            Some(service) => {
                service.tick();
            }
            None => break,
        }
    }
}
