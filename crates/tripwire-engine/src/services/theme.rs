use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use tripwire_events::{DomainId, TriggerId};

use crate::error::EngineError;
use crate::host::{Host, Query, Snapshot, Subscription, SubscriptionDef, UpdateCallback};

/// Slot holding the active theme id
pub const THEME_SLOT: &str = "theme";

/// Receives `(new, previous)` on every theme change
pub type ThemeCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ThemeKey {
    domain: DomainId,
    trigger: TriggerId,
    seq: u64,
}

#[derive(Default)]
struct ThemeTable {
    domains: BTreeSet<DomainId>,
    callbacks: Vec<(ThemeKey, ThemeCallback)>,
    /// Last theme seen upstream, `None` until the first delivery
    previous: Option<String>,
}

/// Fans one host theme subscription out to every registered trigger.
///
/// The subscription exists while at least one domain is attached.
pub struct ThemeService {
    host: Arc<dyn Host>,
    table: Mutex<ThemeTable>,
    subscription: tokio::sync::Mutex<Option<Subscription>>,
    next_seq: AtomicU64,
}

impl ThemeService {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            table: Mutex::new(ThemeTable::default()),
            subscription: tokio::sync::Mutex::new(None),
            next_seq: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ThemeTable> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a callback for a trigger, attaching its domain and creating
    /// the host subscription if needed.
    ///
    /// The returned subscription removes the callback when released.
    pub async fn register(
        self: &Arc<Self>,
        domain: &DomainId,
        trigger: &TriggerId,
        callback: ThemeCallback,
    ) -> Result<Subscription, EngineError> {
        let mut upstream = self.subscription.lock().await;

        if upstream.is_none() {
            let service = Arc::downgrade(self);
            let on_update: UpdateCallback = Arc::new(move |snapshot: &Snapshot| {
                if let Some(service) = service.upgrade() {
                    service.on_update(snapshot.get(THEME_SLOT));
                }
            });
            let def = SubscriptionDef::new().slot(THEME_SLOT, Query::Theme);
            *upstream = Some(self.host.subscribe(def, on_update).await?);
            info!(target: "theme", "Theme subscription created by domain {}", domain);
        }

        let key = ThemeKey {
            domain: domain.clone(),
            trigger: trigger.clone(),
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };
        {
            let mut table = self.lock();
            if table.domains.insert(domain.clone()) {
                debug!(target: "theme", "Domain {} attached", domain);
            }
            table.callbacks.push((key.clone(), callback));
        }
        debug!(target: "theme", "Theme callback registered for trigger {} in {}", trigger, domain);

        let service = Arc::downgrade(self);
        let id = format!("theme-{}-{}", domain, key.seq);
        Ok(Subscription::new(id, move || {
            if let Some(service) = service.upgrade() {
                service.remove(&key);
            }
        }))
    }

    fn remove(&self, key: &ThemeKey) {
        self.lock().callbacks.retain(|(k, _)| k != key);
    }

    /// Remove a domain and its callbacks. Destroys the host subscription
    /// when no domain is left.
    pub async fn detach(&self, domain: &DomainId) {
        let mut upstream = self.subscription.lock().await;
        let last = {
            let mut table = self.lock();
            if !table.domains.remove(domain) {
                return;
            }
            table.callbacks.retain(|(key, _)| &key.domain != domain);
            debug!(target: "theme", "Domain {} detached", domain);

            let last = table.domains.is_empty();
            if last {
                table.previous = None;
            }
            last
        };

        if last {
            if let Some(subscription) = upstream.take() {
                subscription.unsubscribe();
                info!(target: "theme", "Theme subscription released");
            }
        }
    }

    fn on_update(&self, theme: &str) {
        let (previous, callbacks) = {
            let mut table = self.lock();
            match table.previous.replace(theme.to_string()) {
                None => return,
                Some(previous) if previous == theme => return,
                Some(previous) => (previous, table.callbacks.clone()),
            }
        };

        debug!(target: "theme", "Theme changed from {} to {}", previous, theme);
        for (_, callback) in callbacks {
            callback(theme, &previous);
        }
    }

    /// Whether the host subscription currently exists
    pub async fn is_watching(&self) -> bool {
        self.subscription.lock().await.is_some()
    }

    pub fn domain_count(&self) -> usize {
        self.lock().domains.len()
    }

    /// Number of callbacks across all domains
    pub fn registered_count(&self) -> usize {
        self.lock().callbacks.len()
    }
}
