use crate::cache::TtlCache;
use crate::energy::{EnergyModel, PvSystemConfig, DEFAULT_TEMPERATURE_COEFFICIENT, STC_TEMPERATURE};
use crate::location::Place;
use crate::service::{LocationQuery, MAX_SYSTEMS};
use crate::store::{KvStore, StoreError};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

pub const SESSION_KEY: &str = "pvf:session";

fn default_temperature_coefficient() -> f64 {
    DEFAULT_TEMPERATURE_COEFFICIENT
}

fn default_stc_temperature() -> f64 {
    STC_TEMPERATURE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationMode {
    /// The address is geocoded on every compute.
    Address,
    /// Confirmed coordinates are reused; the address is only a label.
    Locked,
}

/// User-entered configuration that survives reloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub systems: Vec<PvSystemConfig>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub resolved_location: Option<Place>,
    #[serde(default = "default_temperature_coefficient")]
    pub temperature_coefficient: f64,
    #[serde(default = "default_stc_temperature")]
    pub stc_temperature: f64,
    #[serde(default)]
    pub dark_mode: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            systems: Vec::new(),
            address: String::new(),
            resolved_location: None,
            temperature_coefficient: DEFAULT_TEMPERATURE_COEFFICIENT,
            stc_temperature: STC_TEMPERATURE,
            dark_mode: false,
        }
    }
}

impl SessionState {
    pub fn location_mode(&self) -> LocationMode {
        if self.resolved_location.is_some() {
            LocationMode::Locked
        } else {
            LocationMode::Address
        }
    }

    /// Locks onto confirmed coordinates; the place's label becomes the address.
    pub fn lock_location(&mut self, place: Place) {
        self.address = place.address.clone();
        self.resolved_location = Some(place);
    }

    pub fn unlock_location(&mut self) {
        self.resolved_location = None;
    }

    /// What the next compute should use: the locked place, or `fallback_address`.
    pub fn location_query(&self, fallback_address: &str) -> LocationQuery {
        match &self.resolved_location {
            Some(place) => LocationQuery::Locked(place.clone()),
            None => LocationQuery::Address(fallback_address.to_string()),
        }
    }

    pub fn energy_model(&self) -> EnergyModel {
        EnergyModel::new(self.stc_temperature)
    }

    /// A new system seeded with the session-wide temperature coefficient.
    pub fn new_system(&self, power_kw: f64, inclination_deg: f64, azimuth_deg: f64) -> PvSystemConfig {
        PvSystemConfig {
            temperature_coefficient_per_k: self.temperature_coefficient,
            ..PvSystemConfig::new(power_kw, inclination_deg, azimuth_deg)
        }
    }

    pub fn add_system(&mut self, system: PvSystemConfig) -> Result<(), String> {
        if self.systems.len() >= MAX_SYSTEMS {
            return Err(format!("At most {} PV systems are supported", MAX_SYSTEMS));
        }
        self.systems.push(system);
        Ok(())
    }

    pub fn remove_system(&mut self, index: usize) -> Option<PvSystemConfig> {
        (index < self.systems.len()).then(|| self.systems.remove(index))
    }

    /// Records the inputs of a successful compute. In locked mode the address
    /// stays the locked label.
    pub fn record_compute(&mut self, address: &str, systems: &[PvSystemConfig]) {
        if self.location_mode() == LocationMode::Address {
            self.address = address.trim().to_string();
        }
        self.systems = systems.to_vec();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveOutcome {
    Saved,
    /// Requested from inside a loading phase; saving there would persist
    /// half-applied state.
    Suppressed,
    /// The medium refused the write. Already logged.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionLoad {
    Found(SessionState),
    Empty,
    Unreadable,
}

impl SessionLoad {
    pub fn into_state(self) -> Option<SessionState> {
        match self {
            SessionLoad::Found(state) => Some(state),
            SessionLoad::Empty | SessionLoad::Unreadable => None,
        }
    }
}

/// One caller's loading phase. Saves issued through it are suppressed; other
/// callers of the same [`SessionStore`] are unaffected.
pub struct LoadingPhase {
    loaded: SessionLoad,
}

impl LoadingPhase {
    pub fn state(&self) -> Option<&SessionState> {
        match &self.loaded {
            SessionLoad::Found(state) => Some(state),
            SessionLoad::Empty | SessionLoad::Unreadable => None,
        }
    }

    pub fn outcome(&self) -> &SessionLoad {
        &self.loaded
    }

    pub fn save(&self, _state: &SessionState) -> SaveOutcome {
        tracing::debug!("Session save suppressed while loading");
        SaveOutcome::Suppressed
    }

    pub fn finish(self) -> Option<SessionState> {
        self.loaded.into_state()
    }
}

/// Load/save/clear lifecycle for [`SessionState`].
///
/// Persistence never fails a caller: read problems load as "no session",
/// write problems come back as [`SaveOutcome::Failed`] after being logged.
/// Writes are serialized so a read-modify-write never overwrites a change
/// that landed between its read and its write.
pub struct SessionStore {
    store: KvStore,
    cache: TtlCache,
    writer: Mutex<()>,
}

impl SessionStore {
    /// Shares the cache's medium so that `clear` can drop both in one go.
    pub fn new(cache: TtlCache) -> Self {
        Self {
            store: cache.store().clone(),
            cache,
            writer: Mutex::new(()),
        }
    }

    /// Opens a loading phase and reads the stored session into it.
    pub async fn begin_load(&self) -> LoadingPhase {
        LoadingPhase {
            loaded: self.read().await,
        }
    }

    pub async fn load(&self) -> Option<SessionState> {
        self.begin_load().await.finish()
    }

    /// Loads and hands the state to `apply` inside the loading phase, so
    /// anything `apply` saves through the phase cannot write back a partial
    /// session.
    pub async fn load_with<F>(&self, apply: F) -> Option<SessionState>
    where
        F: FnOnce(&SessionState, &LoadingPhase),
    {
        let phase = self.begin_load().await;
        if let Some(state) = phase.state() {
            apply(state, &phase);
        }
        phase.finish()
    }

    /// Replaces the stored session.
    pub async fn save(&self, state: &SessionState) -> SaveOutcome {
        let _writer = self.writer.lock().await;
        self.persist(state).await
    }

    /// Applies `change` to the latest stored session (or a fresh one) and
    /// writes the result back, with no other write in between.
    pub async fn update<F>(&self, change: F) -> (SessionState, SaveOutcome)
    where
        F: FnOnce(&mut SessionState),
    {
        let _writer = self.writer.lock().await;
        let mut state = self.read().await.into_state().unwrap_or_default();
        change(&mut state);
        let outcome = self.persist(&state).await;
        (state, outcome)
    }

    pub async fn health_check(&self) -> Result<(), StoreError> {
        self.store.health_check().await
    }

    /// Removes the session and every resolver/fetcher cache entry. Keys owned
    /// by anything else in the medium are left alone.
    pub async fn clear(&self) -> u64 {
        let _writer = self.writer.lock().await;
        let mut removed = self.cache.clear().await;
        match self.store.get(SESSION_KEY).await {
            Ok(Some(_)) => match self.store.remove(SESSION_KEY).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove session: {}", e),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!("Failed to inspect session before clearing: {}", e),
        }
        tracing::info!("Session cleared ({} entries removed)", removed);
        removed
    }

    async fn read(&self) -> SessionLoad {
        match self.store.get(SESSION_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<SessionState>(&raw) {
                Ok(state) => SessionLoad::Found(state),
                Err(e) => {
                    tracing::warn!("Stored session is unreadable: {}", e);
                    SessionLoad::Unreadable
                }
            },
            Ok(None) => SessionLoad::Empty,
            Err(e) => {
                tracing::warn!("Failed to read session: {}", e);
                SessionLoad::Unreadable
            }
        }
    }

    async fn persist(&self, state: &SessionState) -> SaveOutcome {
        match self.write(state).await {
            Ok(()) => SaveOutcome::Saved,
            Err(e) => {
                tracing::warn!("Failed to persist session: {}", e);
                SaveOutcome::Failed
            }
        }
    }

    async fn write(&self, state: &SessionState) -> Result<(), StoreError> {
        let raw = serde_json::to_string(state)?;
        self.store.put(SESSION_KEY, &raw).await
    }
}
