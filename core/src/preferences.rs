//! Preference store and routing resolution
//!
//! Preferences are local-first: an update is merged in memory and persisted to
//! the local cache before any remote sync is attempted, and a failed sync
//! never reverts the merge. Loading resolves remote → cache → built-in
//! defaults, consulting the cache at most once per store lifetime. Updates
//! made while a load is running are replayed on top of its result.

use crate::remote::NotificationService;
use callsheet_cache::{CacheError, LocalCache, PREFERENCES_KEY};
use schema::{Channel, NotificationKind, PreferencePatch, PreferenceSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where the installed preference set came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceOrigin {
    Remote,
    Cache,
    Defaults,
}

impl PreferenceOrigin {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PreferenceOrigin::Remote => "remote",
            PreferenceOrigin::Cache => "cache",
            PreferenceOrigin::Defaults => "defaults",
        }
    }
}

impl fmt::Display for PreferenceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of routing one notification to the in-app toast channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDecision {
    pub should_show_toast: bool,
}

/// Result of a background preference load
#[derive(Debug, Clone)]
pub struct PreferenceLoad {
    pub preferences: PreferenceSet,
    pub origin: PreferenceOrigin,
    /// Remote failure that forced the fallback, if any
    pub remote_error: Option<String>,
    /// Cache read failure, if any
    pub cache_error: Option<String>,
    /// Issue order among loads
    seq: u64,
    /// Local updates up to this revision are already in the base
    revision: u64,
}

/// What [`PreferenceStore::install`] did with a finished load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The loaded set was installed as is
    Installed,
    /// Local updates made while the load ran were replayed on top of it
    Rebased,
    /// A load started later was already installed; this one was dropped
    Superseded,
}

/// Current preference set plus the machinery to load and update it
pub struct PreferenceStore {
    service: Arc<dyn NotificationService>,
    cache: Arc<dyn LocalCache>,
    current: Option<PreferenceSet>,
    origin: Option<PreferenceOrigin>,
    cache_consulted: bool,
    /// Bumped on every local update
    revision: u64,
    /// Updates made while a load was in flight, keyed by their revision
    pending: Vec<(u64, PreferencePatch)>,
    loads_issued: u64,
    loads_in_flight: usize,
    installed_seq: Option<u64>,
    /// Revision before the first update merged onto placeholder defaults.
    /// Until a load lands, `current` is not written to the cache.
    unsaved_since: Option<u64>,
}

impl PreferenceStore {
    pub fn new(service: Arc<dyn NotificationService>, cache: Arc<dyn LocalCache>) -> Self {
        Self {
            service,
            cache,
            current: None,
            origin: None,
            cache_consulted: false,
            revision: 0,
            pending: Vec::new(),
            loads_issued: 0,
            loads_in_flight: 0,
            installed_seq: None,
            unsaved_since: None,
        }
    }

    /// The installed set, if any load or update has happened yet
    pub fn current(&self) -> Option<&PreferenceSet> {
        self.current.as_ref()
    }

    pub fn origin(&self) -> Option<PreferenceOrigin> {
        self.origin
    }

    /// Whether a notification of `kind` should surface as a toast.
    ///
    /// Fails open: with nothing loaded yet every kind is shown.
    pub fn resolve(&self, kind: NotificationKind) -> RouteDecision {
        RouteDecision {
            should_show_toast: self.allows(kind, Channel::InApp),
        }
    }

    /// Whether `kind` may be delivered on `channel`.
    pub fn allows(&self, kind: NotificationKind, channel: Channel) -> bool {
        match &self.current {
            Some(set) => set.allows(kind, channel),
            None => true,
        }
    }

    /// Start a load. The returned future owns everything it needs so it can
    /// run on its own task; feed its output to [`PreferenceStore::install`].
    pub fn load(&mut self) -> impl Future<Output = PreferenceLoad> + Send + 'static {
        let service = Arc::clone(&self.service);
        let cache = Arc::clone(&self.cache);
        // Nothing has been written while unsaved, so the cache still holds
        // the user's set and must be the base again.
        let read_cache = !self.cache_consulted || self.unsaved_since.is_some();
        self.cache_consulted = true;
        let fallback = self.current.clone().map(|set| {
            let origin = match self.origin {
                Some(PreferenceOrigin::Defaults) | None => PreferenceOrigin::Defaults,
                Some(_) => PreferenceOrigin::Cache,
            };
            (set, origin)
        });
        let revision = self.unsaved_since.unwrap_or(self.revision);
        self.loads_issued += 1;
        let seq = self.loads_issued;
        self.loads_in_flight += 1;

        async move {
            let mut load = PreferenceLoad {
                preferences: PreferenceSet::default(),
                origin: PreferenceOrigin::Defaults,
                remote_error: None,
                cache_error: None,
                seq,
                revision,
            };

            match service.fetch_preferences().await {
                Ok(set) => {
                    load.preferences = set;
                    load.origin = PreferenceOrigin::Remote;
                    return load;
                }
                Err(e) => {
                    warn!("Failed to fetch preferences: {}", e);
                    load.remote_error = Some(e.to_string());
                }
            }

            if read_cache {
                match read_cached(cache.as_ref()).await {
                    Ok(Some(set)) => {
                        load.preferences = set;
                        load.origin = PreferenceOrigin::Cache;
                    }
                    Ok(None) => debug!("No cached preferences, using defaults"),
                    Err(e) => {
                        warn!("Failed to read cached preferences: {}", e);
                        load.cache_error = Some(e.to_string());
                    }
                }
            } else if let Some((set, origin)) = fallback {
                load.preferences = set;
                load.origin = origin;
            }

            load
        }
    }

    /// Install a finished load, replaying any local update made after the
    /// load started on top of it.
    ///
    /// The caller writes the set to the cache for [`InstallOutcome::Rebased`].
    pub fn install(&mut self, load: PreferenceLoad) -> InstallOutcome {
        self.loads_in_flight = self.loads_in_flight.saturating_sub(1);
        if matches!(self.installed_seq, Some(installed) if load.seq < installed) {
            debug!(
                "Dropping preference load #{} (#{:?} already installed)",
                load.seq, self.installed_seq
            );
            if self.loads_in_flight == 0 {
                self.pending.clear();
            }
            return InstallOutcome::Superseded;
        }

        let mut set = load.preferences;
        let mut replayed = 0;
        for (_, patch) in self.pending.iter().filter(|(rev, _)| *rev > load.revision) {
            set.apply(patch);
            replayed += 1;
        }
        self.pending.retain(|(rev, _)| *rev > load.revision);
        if self.loads_in_flight == 0 {
            self.pending.clear();
        }

        let was_unsaved = self.unsaved_since.take().is_some();
        self.current = Some(set);
        self.origin = Some(load.origin);
        self.installed_seq = Some(load.seq);

        if replayed > 0 || was_unsaved {
            debug!("Replayed {} local preference updates onto the load", replayed);
            InstallOutcome::Rebased
        } else {
            InstallOutcome::Installed
        }
    }

    /// Merge `patch` into the current set and persist it.
    ///
    /// With nothing installed yet the base is the cached set, or the defaults
    /// when the cache is empty. While the first load is still running the
    /// merge stays in memory and is written once the load lands. The merge
    /// stands even when persisting fails.
    pub async fn update(&mut self, patch: &PreferencePatch) -> Result<(), CacheError> {
        self.revision += 1;
        if self.loads_in_flight > 0 {
            self.pending.push((self.revision, patch.clone()));
        }

        let mut read_error = None;
        let mut next = match self.current.take() {
            Some(set) => set,
            None if self.loads_in_flight == 0 => {
                self.cache_consulted = true;
                match read_cached(self.cache.as_ref()).await {
                    Ok(Some(set)) => {
                        self.origin = Some(PreferenceOrigin::Cache);
                        set
                    }
                    Ok(None) => PreferenceSet::default(),
                    Err(e) => {
                        warn!("Failed to read cached preferences before update: {}", e);
                        read_error = Some(e);
                        PreferenceSet::default()
                    }
                }
            }
            None => {
                self.unsaved_since = Some(self.revision - 1);
                PreferenceSet::default()
            }
        };
        next.apply(patch);
        self.current = Some(next);
        if self.origin.is_none() {
            self.origin = Some(PreferenceOrigin::Defaults);
        }

        if self.unsaved_since.is_some() {
            debug!("Holding preference write until the pending load lands");
            return Ok(());
        }
        self.persist().await?;
        read_error.map_or(Ok(()), Err)
    }

    /// Write the current set to the local cache.
    pub async fn persist(&self) -> Result<(), CacheError> {
        let Some(set) = &self.current else {
            return Ok(());
        };
        let json = serde_json::to_string(set)?;
        self.cache.set(PREFERENCES_KEY, &json).await
    }
}

async fn read_cached(cache: &dyn LocalCache) -> Result<Option<PreferenceSet>, CacheError> {
    match cache.get(PREFERENCES_KEY).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}
