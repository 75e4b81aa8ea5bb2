//! Begrenzter Worker-Pool fuer die Schluesselableitung
//!
//! PBKDF2 mit zehntausenden Runden ist CPU-lastig und synchron. Der Pool
//! fuehrt jede Operation via `spawn_blocking` aus und begrenzt die Anzahl
//! gleichzeitiger Ableitungen mit einer Semaphore, damit die Event-Loop
//! weiter Handshakes annehmen kann.

use std::sync::Arc;
use std::time::{Duration, Instant};

use echo_core::SessionIdentity;
use tokio::sync::Semaphore;

use crate::envelope;
use crate::error::{CryptoError, CryptoResult};
use crate::identity;
use crate::types::{DerivedKey, KdfParameter};

/// Standardanzahl gleichzeitiger KDF-Worker
pub const STANDARD_WORKER: usize = 4;

/// Callback fuer die gemessene Dauer einer Operation (z.B. Histogramm)
pub type DauerBeobachter = Arc<dyn Fn(Duration) + Send + Sync>;

/// Worker-Pool fuer Envelope-Operationen
///
/// Clone teilt Semaphore und Parameter.
#[derive(Clone)]
pub struct KdfPool {
    slots: Arc<Semaphore>,
    params: KdfParameter,
    beobachter: Option<DauerBeobachter>,
}

impl KdfPool {
    /// Erstellt einen Pool mit `worker` gleichzeitigen Slots (mindestens 1)
    pub fn neu(worker: usize, params: KdfParameter) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(worker.max(1))),
            params,
            beobachter: None,
        }
    }

    /// Haengt einen Beobachter fuer die Operationsdauer an
    pub fn mit_beobachter(mut self, beobachter: DauerBeobachter) -> Self {
        self.beobachter = Some(beobachter);
        self
    }

    pub fn params(&self) -> &KdfParameter {
        &self.params
    }

    /// Anzahl aktuell freier Slots
    pub fn freie_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Leitet einen Schluessel ausserhalb der Event-Loop ab
    pub async fn derive_key(&self, password: String, salt: Vec<u8>) -> CryptoResult<DerivedKey> {
        let params = self.params;
        self.ausfuehren(move || Ok(envelope::derive_key(password.as_bytes(), &salt, &params)))
            .await
    }

    /// Verschluesselt einen String ausserhalb der Event-Loop
    pub async fn encrypt_string(&self, plaintext: String, password: String) -> CryptoResult<String> {
        let params = self.params;
        self.ausfuehren(move || envelope::encrypt_string(&plaintext, &password, &params))
            .await
    }

    /// Entschluesselt einen Envelope ausserhalb der Event-Loop
    pub async fn decrypt_string(&self, daten: String, password: String) -> CryptoResult<String> {
        let params = self.params;
        self.ausfuehren(move || envelope::decrypt_string(&daten, &password, &params))
            .await
    }

    /// Loest ein Bearer-Token zur SessionIdentity auf
    pub async fn resolve_identity(
        &self,
        token: String,
        geheimnis: String,
    ) -> CryptoResult<SessionIdentity> {
        let params = self.params;
        self.ausfuehren(move || identity::resolve_identity(&token, &geheimnis, &params))
            .await
    }

    /// Fuehrt eine blockierende Operation in einem freien Slot aus
    ///
    /// Der Slot bleibt belegt bis die Berechnung fertig ist, auch wenn der
    /// wartende Future vorher verworfen wird.
    async fn ausfuehren<T, F>(&self, aufgabe: F) -> CryptoResult<T>
    where
        F: FnOnce() -> CryptoResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| CryptoError::PoolGeschlossen)?;

        let start = Instant::now();
        let ergebnis = tokio::task::spawn_blocking(move || {
            let ergebnis = aufgabe();
            drop(permit);
            ergebnis
        })
        .await
        .map_err(|e| CryptoError::WorkerAbgebrochen(e.to_string()))?;

        let dauer = start.elapsed();
        tracing::trace!(dauer_ms = dauer.as_millis() as u64, "KDF-Operation abgeschlossen");
        if let Some(beobachter) = &self.beobachter {
            beobachter(dauer);
        }

        ergebnis
    }
}

impl Default for KdfPool {
    fn default() -> Self {
        Self::neu(STANDARD_WORKER, KdfParameter::default())
    }
}

impl std::fmt::Debug for KdfPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KdfPool")
            .field("freie_slots", &self.slots.available_permits())
            .field("params", &self.params)
            .finish()
    }
}
