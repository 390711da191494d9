use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tessera_core::diagnostics::tracing_sink;
use tessera_core::{
    now_millis, Diagnostic, DiagnosticSink, Hash, PublicKey, Sig, SignatureEntry, Transaction,
    TransactionPayload,
};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::MstError;
use crate::state::{
    EntryStatus, MergeOutcome, MergeReport, MstState, MstStateEntry, MstStateUpdate, PendingView,
    RejectedSignature,
};
use crate::validator::{Ed25519Validator, SignatureValidator};

const COMPONENT: &str = "mst";

/// Configuration for the MST aggregator
#[derive(Debug, Clone)]
pub struct MstConfig {
    /// Entries untouched for longer than this are dropped
    pub ttl: Duration,
    /// How often the expiry loop runs
    pub purge_interval: Duration,
    /// Buffer size of the state stream
    pub event_capacity: usize,
}

impl Default for MstConfig {
    fn default() -> Self {
        MstConfig {
            ttl: Duration::from_secs(600),
            purge_interval: Duration::from_secs(10),
            event_capacity: 1024,
        }
    }
}

struct PendingEntry {
    payload: TransactionPayload,
    signatures: BTreeMap<PublicKey, Sig>,
    created_at: u64,
    last_touched: Instant,
}

impl PendingEntry {
    fn transaction(&self) -> Transaction {
        Transaction {
            payload: self.payload.clone(),
            signatures: self
                .signatures
                .iter()
                .map(|(public_key, signature)| SignatureEntry {
                    public_key: *public_key,
                    signature: *signature,
                })
                .collect(),
        }
    }

    fn view(&self, fingerprint: Hash) -> PendingView {
        PendingView {
            fingerprint,
            payload: self.payload.clone(),
            signers: self.signatures.keys().copied().collect(),
            quorum: self.payload.quorum,
            created_at: self.created_at,
        }
    }
}

#[derive(Default)]
struct Entries {
    pending: HashMap<Hash, PendingEntry>,
    /// Recently completed fingerprints, kept for one TTL so late signatures
    /// cannot complete a transaction twice
    completed: HashMap<Hash, Instant>,
}

/// Collects partial signatures until each transaction reaches its quorum.
///
/// Every mutation, expiry included, happens under one mutex. Events are
/// published while the mutex is held so subscribers observe them in merge
/// order.
///
/// State updates go out on a lossy broadcast stream for observers.
/// Completed transactions go to a single unbounded queue that keeps them
/// until its receiver, taken once with [`MstAggregator::take_completed`],
/// reads them.
pub struct MstAggregator {
    config: MstConfig,
    validator: Arc<dyn SignatureValidator>,
    entries: Mutex<Entries>,
    states: broadcast::Sender<MstStateUpdate>,
    completed: mpsc::UnboundedSender<Transaction>,
    completed_rx: StdMutex<Option<mpsc::UnboundedReceiver<Transaction>>>,
    sink: Arc<dyn DiagnosticSink>,
}

impl MstAggregator {
    pub fn new(config: MstConfig) -> Self {
        Self::with_parts(config, Arc::new(Ed25519Validator::new()), tracing_sink())
    }

    pub fn with_parts(
        config: MstConfig,
        validator: Arc<dyn SignatureValidator>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let capacity = config.event_capacity.max(1);
        let (states, _) = broadcast::channel(capacity);
        let (completed, completed_rx) = mpsc::unbounded_channel();
        MstAggregator {
            config,
            validator,
            entries: Mutex::new(Entries::default()),
            states,
            completed,
            completed_rx: StdMutex::new(Some(completed_rx)),
            sink,
        }
    }

    pub fn config(&self) -> &MstConfig {
        &self.config
    }

    pub fn subscribe_states(&self) -> broadcast::Receiver<MstStateUpdate> {
        self.states.subscribe()
    }

    /// The downstream end of the completion queue. Only the first caller
    /// gets it; completions made before that are buffered.
    pub fn take_completed(&self) -> Option<mpsc::UnboundedReceiver<Transaction>> {
        self.completed_rx.lock().ok().and_then(|mut rx| rx.take())
    }

    /// Merge a single partial signature for `payload`.
    ///
    /// A rejected signature leaves any existing entry untouched.
    pub async fn add_signature(
        &self,
        payload: TransactionPayload,
        signature: SignatureEntry,
    ) -> Result<MergeOutcome, MstError> {
        if payload.quorum == 0 {
            return Err(MstError::InvalidQuorum);
        }
        let fingerprint = payload.fingerprint()?;
        self.check(&payload, &fingerprint, &signature)?;

        let mut entries = self.entries.lock().await;
        Ok(self.merge_locked(
            &mut entries,
            fingerprint,
            payload,
            vec![signature],
            Instant::now(),
        ))
    }

    /// Merge every signature a locally submitted transaction carries.
    pub async fn submit(&self, tx: Transaction) -> Result<MergeReport, MstError> {
        if tx.quorum() == 0 {
            return Err(MstError::InvalidQuorum);
        }
        let fingerprint = tx.fingerprint()?;
        let mut report = MergeReport::default();
        let accepted = self.partition(&tx, fingerprint, &mut report);

        if !accepted.is_empty() {
            let mut entries = self.entries.lock().await;
            let outcome =
                self.merge_locked(&mut entries, fingerprint, tx.payload, accepted, Instant::now());
            report.outcomes.push((fingerprint, outcome));
        }
        Ok(report)
    }

    /// Union a peer's view into local state. Local signatures are never
    /// removed; a malformed entry is skipped without touching local state.
    pub async fn merge_remote_state(&self, state: MstState) -> MergeReport {
        let mut report = MergeReport::default();
        let mut validated = Vec::with_capacity(state.entries.len());

        for MstStateEntry {
            fingerprint,
            transaction,
        } in state.entries
        {
            if let Some(reason) = malformed_view(fingerprint, &transaction) {
                self.sink
                    .report(COMPONENT, Diagnostic::RemoteViewIgnored { fingerprint, reason });
                report.ignored.push(fingerprint);
                continue;
            }
            let accepted = self.partition(&transaction, fingerprint, &mut report);
            if !accepted.is_empty() {
                validated.push((fingerprint, transaction.payload, accepted));
            }
        }

        if validated.is_empty() {
            return report;
        }

        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        for (fingerprint, payload, accepted) in validated {
            let outcome = self.merge_locked(&mut entries, fingerprint, payload, accepted, now);
            report.outcomes.push((fingerprint, outcome));
        }
        report
    }

    pub async fn pending(&self, fingerprint: &Hash) -> Option<PendingView> {
        let entries = self.entries.lock().await;
        entries
            .pending
            .get(fingerprint)
            .map(|entry| entry.view(*fingerprint))
    }

    pub async fn pending_count(&self) -> usize {
        self.entries.lock().await.pending.len()
    }

    /// Full view of every pending entry
    pub async fn state(&self) -> MstState {
        let entries = self.entries.lock().await;
        MstState {
            entries: entries
                .pending
                .iter()
                .map(|(fingerprint, entry)| MstStateEntry {
                    fingerprint: *fingerprint,
                    transaction: entry.transaction(),
                })
                .collect(),
        }
    }

    /// Drop entries untouched for longer than the TTL as of `now`.
    pub async fn purge_expired_at(&self, now: Instant) -> Vec<Hash> {
        let ttl = self.config.ttl;
        let mut entries = self.entries.lock().await;

        let expired: Vec<Hash> = entries
            .pending
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_touched) > ttl)
            .map(|(fingerprint, _)| *fingerprint)
            .collect();

        for fingerprint in &expired {
            if let Some(entry) = entries.pending.remove(fingerprint) {
                self.sink.report(
                    COMPONENT,
                    Diagnostic::MstExpired {
                        fingerprint: *fingerprint,
                        signatures: entry.signatures.len(),
                    },
                );
                self.publish(*fingerprint, entry.transaction(), EntryStatus::Expired);
            }
        }
        entries
            .completed
            .retain(|_, completed_at| now.saturating_duration_since(*completed_at) <= ttl);

        expired
    }

    pub async fn purge_expired(&self) -> Vec<Hash> {
        self.purge_expired_at(Instant::now()).await
    }

    /// Periodic expiry until `cancel` fires
    pub async fn run_expiry(&self, cancel: CancellationToken) {
        let period = self.config.purge_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("MST expiry loop stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let expired = self.purge_expired().await;
                    if !expired.is_empty() {
                        debug!("Purged {} expired MST entries", expired.len());
                    }
                }
            }
        }
    }

    fn check(
        &self,
        payload: &TransactionPayload,
        fingerprint: &Hash,
        signature: &SignatureEntry,
    ) -> Result<(), MstError> {
        self.validator
            .validate(payload, fingerprint, signature)
            .map_err(|error| {
                self.sink.report(
                    COMPONENT,
                    Diagnostic::SignatureRejected {
                        fingerprint: *fingerprint,
                        signer: signature.public_key,
                        reason: error.to_string(),
                    },
                );
                error
            })
    }

    /// Validate each signature of `tx`, recording rejections in `report`.
    fn partition(
        &self,
        tx: &Transaction,
        fingerprint: Hash,
        report: &mut MergeReport,
    ) -> Vec<SignatureEntry> {
        let mut accepted = Vec::with_capacity(tx.signatures.len());
        for signature in &tx.signatures {
            match self.check(&tx.payload, &fingerprint, signature) {
                Ok(()) => accepted.push(*signature),
                Err(error) => report.rejected.push(RejectedSignature {
                    fingerprint,
                    signer: signature.public_key,
                    error,
                }),
            }
        }
        accepted
    }

    /// Merge already validated signatures. The signer set never grows past
    /// the quorum; reaching it completes and removes the entry.
    fn merge_locked(
        &self,
        entries: &mut Entries,
        fingerprint: Hash,
        payload: TransactionPayload,
        signatures: Vec<SignatureEntry>,
        now: Instant,
    ) -> MergeOutcome {
        if entries.completed.contains_key(&fingerprint) {
            return MergeOutcome::AlreadyCompleted;
        }

        let entry = entries
            .pending
            .entry(fingerprint)
            .or_insert_with(|| PendingEntry {
                payload,
                signatures: BTreeMap::new(),
                created_at: now_millis(),
                last_touched: now,
            });
        let quorum = entry.payload.quorum;

        let mut changed = false;
        for signature in signatures {
            if entry.signatures.len() >= quorum as usize {
                break;
            }
            if entry.signatures.contains_key(&signature.public_key) {
                continue;
            }
            entry
                .signatures
                .insert(signature.public_key, signature.signature);
            changed = true;
            self.sink.report(
                COMPONENT,
                Diagnostic::SignatureMerged {
                    fingerprint,
                    signer: signature.public_key,
                    count: entry.signatures.len(),
                    quorum,
                },
            );
        }

        if !changed {
            return MergeOutcome::Unchanged;
        }
        entry.last_touched = now;
        let count = entry.signatures.len();
        let transaction = entry.transaction();

        if count < quorum as usize {
            self.publish(fingerprint, transaction, EntryStatus::Pending);
            return MergeOutcome::Pending {
                signatures: count,
                quorum,
            };
        }

        entries.pending.remove(&fingerprint);
        entries.completed.insert(fingerprint, now);
        self.sink
            .report(COMPONENT, Diagnostic::MstCompleted { fingerprint });
        self.publish(fingerprint, transaction.clone(), EntryStatus::Complete);
        // the receiver lives as long as self unless it was taken and dropped
        let _ = self.completed.send(transaction.clone());
        MergeOutcome::Completed(transaction)
    }

    fn publish(&self, fingerprint: Hash, transaction: Transaction, status: EntryStatus) {
        let _ = self.states.send(MstStateUpdate {
            fingerprint,
            transaction,
            status,
        });
    }
}

fn malformed_view(fingerprint: Hash, transaction: &Transaction) -> Option<String> {
    if transaction.quorum() == 0 {
        return Some("quorum is zero".to_string());
    }
    match transaction.fingerprint() {
        Ok(actual) if actual == fingerprint => None,
        Ok(actual) => Some(format!(
            "payload digest {} does not match fingerprint",
            actual.short()
        )),
        Err(e) => Some(e.to_string()),
    }
}
