use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tessera_core::diagnostics::tracing_sink;
use tessera_core::{Diagnostic, DiagnosticSink, Hash, Transaction};
use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::batch::{Batch, DroppedTransaction, FlushReport, Proposal};
use crate::error::OrderingError;
use crate::schedule::ProposerSchedule;
use crate::validator::{QuorumValidator, TransactionValidator};

const COMPONENT: &str = "ordering";

/// Configuration for the ordering gateway
#[derive(Debug, Clone)]
pub struct OrderingConfig {
    /// Queue length that triggers a flush, and the most a batch may hold
    pub max_batch_size: usize,
    /// Longest time between flushes
    pub flush_interval: Duration,
    /// Queue length above which a backlog warning is reported
    pub queue_warn_threshold: usize,
    /// Buffer size of the batch and proposal streams
    pub event_capacity: usize,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        OrderingConfig {
            max_batch_size: 100,
            flush_interval: Duration::from_millis(500),
            queue_warn_threshold: 10_000,
            event_capacity: 256,
        }
    }
}

struct Queue {
    items: VecDeque<(Hash, Transaction)>,
    queued: HashSet<Hash>,
    last_flush: Instant,
    next_sequence: u64,
    backlogged: bool,
}

/// FIFO queue of fully signed transactions, flushed into batches.
///
/// Flushes are serialized by `flushing`, so batch sequence numbers follow
/// queue order even when a size trigger and the timer race.
pub struct OrderingGateway {
    config: OrderingConfig,
    schedule: ProposerSchedule,
    validator: Arc<dyn TransactionValidator>,
    queue: Mutex<Queue>,
    flushing: Mutex<()>,
    batches: broadcast::Sender<Arc<Batch>>,
    proposals: broadcast::Sender<Arc<Proposal>>,
    sink: Arc<dyn DiagnosticSink>,
}

impl OrderingGateway {
    pub fn new(config: OrderingConfig, schedule: ProposerSchedule) -> Self {
        Self::with_parts(config, schedule, Arc::new(QuorumValidator), tracing_sink())
    }

    pub fn with_parts(
        config: OrderingConfig,
        schedule: ProposerSchedule,
        validator: Arc<dyn TransactionValidator>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let capacity = config.event_capacity.max(1);
        let (batches, _) = broadcast::channel(capacity);
        let (proposals, _) = broadcast::channel(capacity);
        OrderingGateway {
            config,
            schedule,
            validator,
            queue: Mutex::new(Queue {
                items: VecDeque::new(),
                queued: HashSet::new(),
                last_flush: Instant::now(),
                next_sequence: 1,
                backlogged: false,
            }),
            flushing: Mutex::new(()),
            batches,
            proposals,
            sink,
        }
    }

    pub fn config(&self) -> &OrderingConfig {
        &self.config
    }

    pub fn schedule(&self) -> &ProposerSchedule {
        &self.schedule
    }

    pub fn subscribe_batches(&self) -> broadcast::Receiver<Arc<Batch>> {
        self.batches.subscribe()
    }

    pub fn subscribe_proposals(&self) -> broadcast::Receiver<Arc<Proposal>> {
        self.proposals.subscribe()
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.items.len()
    }

    /// Queue a fully signed transaction. When the queue reaches
    /// `max_batch_size` a flush runs before returning, and its report is
    /// handed back.
    pub async fn enqueue(&self, tx: Transaction) -> Result<Option<FlushReport>, OrderingError> {
        let fingerprint = tx.fingerprint()?;
        if !tx.is_fully_signed()? {
            return Err(OrderingError::NotFullySigned(fingerprint));
        }

        let len = {
            let mut queue = self.queue.lock().await;
            if !queue.queued.insert(fingerprint) {
                return Err(OrderingError::AlreadyQueued(fingerprint));
            }
            queue.items.push_back((fingerprint, tx));
            let len = queue.items.len();
            self.track_backlog(&mut queue, len);
            len
        };
        debug!("Queued transaction {} ({} pending)", fingerprint, len);

        if len >= self.config.max_batch_size.max(1) {
            return Ok(Some(self.flush().await));
        }
        Ok(None)
    }

    /// Drain up to `max_batch_size` transactions into a batch. An empty
    /// queue produces no events.
    pub async fn flush(&self) -> FlushReport {
        let _flushing = self.flushing.lock().await;

        let (drained, sequence) = {
            let mut queue = self.queue.lock().await;
            queue.last_flush = Instant::now();
            let take = queue.items.len().min(self.config.max_batch_size.max(1));
            let drained: Vec<(Hash, Transaction)> = queue.items.drain(..take).collect();
            for (fingerprint, _) in &drained {
                queue.queued.remove(fingerprint);
            }
            let len = queue.items.len();
            self.track_backlog(&mut queue, len);
            (drained, queue.next_sequence)
        };

        let mut report = FlushReport::default();
        let mut transactions = Vec::with_capacity(drained.len());
        for (fingerprint, tx) in drained {
            match self.validator.validate(&tx) {
                Ok(()) => transactions.push(tx),
                Err(reason) => {
                    self.sink.report(
                        COMPONENT,
                        Diagnostic::TransactionDropped {
                            fingerprint,
                            reason: reason.clone(),
                        },
                    );
                    report.dropped.push(DroppedTransaction { fingerprint, reason });
                }
            }
        }

        if transactions.is_empty() {
            return report;
        }

        self.queue.lock().await.next_sequence = sequence + 1;
        let batch = Arc::new(Batch {
            sequence,
            transactions,
        });
        self.sink.report(
            COMPONENT,
            Diagnostic::BatchProduced {
                sequence,
                size: batch.len(),
            },
        );
        let _ = self.batches.send(Arc::clone(&batch));

        let round = self.schedule.current_round();
        if self.schedule.is_proposer(round) {
            let proposal = Arc::new(Proposal {
                round,
                proposer: self.schedule.local(),
                batch: (*batch).clone(),
            });
            self.sink.report(
                COMPONENT,
                Diagnostic::ProposalProduced {
                    round,
                    size: batch.len(),
                },
            );
            let _ = self.proposals.send(Arc::clone(&proposal));
            report.proposal = Some(proposal);
        }

        report.batch = Some(batch);
        report
    }

    /// Flush if `flush_interval` has passed since the last flush.
    pub async fn flush_if_due(&self) -> Option<FlushReport> {
        let due = {
            let queue = self.queue.lock().await;
            queue.last_flush.elapsed() >= self.config.flush_interval
        };
        if due {
            Some(self.flush().await)
        } else {
            None
        }
    }

    /// Time-triggered flushing until `cancel` fires. Transactions still
    /// queued at cancellation stay queued.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            let deadline = {
                let queue = self.queue.lock().await;
                queue.last_flush + self.config.flush_interval
            };
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Ordering timer stopped");
                    break;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    self.flush_if_due().await;
                }
            }
        }
    }

    fn track_backlog(&self, queue: &mut Queue, len: usize) {
        let threshold = self.config.queue_warn_threshold;
        if len > threshold && !queue.backlogged {
            queue.backlogged = true;
            self.sink
                .report(COMPONENT, Diagnostic::QueueBacklog { len, threshold });
        } else if len <= threshold {
            queue.backlogged = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{Command, KeyPair, NoopSink, RecordingSink, TransactionPayload};
    use tokio::sync::broadcast::error::TryRecvError;

    fn signed_tx(n: u64) -> Transaction {
        Transaction::new(TransactionPayload {
            creator_account_id: "alice@wonderland".to_string(),
            created_time: n,
            quorum: 1,
            commands: vec![Command::SetAccountQuorum {
                account_id: "alice@wonderland".to_string(),
                quorum: 1,
            }],
        })
        .sign(&KeyPair::generate())
        .unwrap()
    }

    fn config(max_batch_size: usize) -> OrderingConfig {
        OrderingConfig {
            max_batch_size,
            flush_interval: Duration::from_secs(3600),
            queue_warn_threshold: 100,
            event_capacity: 16,
        }
    }

    fn gateway_with(
        config: OrderingConfig,
        schedule: ProposerSchedule,
        validator: Arc<dyn TransactionValidator>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> OrderingGateway {
        OrderingGateway::with_parts(config, schedule, validator, sink)
    }

    fn observer_schedule() -> ProposerSchedule {
        // the local node is never the proposer
        ProposerSchedule::new(KeyPair::generate().public, vec![KeyPair::generate().public])
    }

    fn gateway(max_batch_size: usize) -> OrderingGateway {
        gateway_with(
            config(max_batch_size),
            observer_schedule(),
            Arc::new(QuorumValidator),
            Arc::new(NoopSink),
        )
    }

    #[tokio::test]
    async fn test_five_transactions_with_batch_size_three() {
        let gateway = gateway(3);
        let mut batches = gateway.subscribe_batches();
        let txs: Vec<Transaction> = (1..=5).map(signed_tx).collect();

        assert!(gateway.enqueue(txs[0].clone()).await.unwrap().is_none());
        assert!(gateway.enqueue(txs[1].clone()).await.unwrap().is_none());
        let report = gateway.enqueue(txs[2].clone()).await.unwrap().unwrap();
        assert_eq!(report.batch.unwrap().transactions, txs[..3].to_vec());

        gateway.enqueue(txs[3].clone()).await.unwrap();
        gateway.enqueue(txs[4].clone()).await.unwrap();
        assert_eq!(gateway.queue_len().await, 2);

        let report = gateway.flush().await;
        assert_eq!(report.batch.unwrap().transactions, txs[3..].to_vec());

        let first = batches.try_recv().unwrap();
        let second = batches.try_recv().unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 2);
        assert!(matches!(batches.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(gateway.queue_len().await, 0);
    }

    #[tokio::test]
    async fn test_flush_takes_at_most_batch_size() {
        let gateway = gateway(2);
        {
            let mut queue = gateway.queue.lock().await;
            for n in 1..=5 {
                let tx = signed_tx(n);
                queue.queued.insert(tx.fingerprint().unwrap());
                queue.items.push_back((tx.fingerprint().unwrap(), tx));
            }
        }

        let report = gateway.flush().await;
        assert_eq!(report.batch.unwrap().len(), 2);
        assert_eq!(gateway.queue_len().await, 3);
    }

    #[tokio::test]
    async fn test_empty_flush_is_a_no_op() {
        let gateway = gateway(3);
        let mut batches = gateway.subscribe_batches();

        let report = gateway.flush().await;
        assert!(report.is_empty());
        assert!(matches!(batches.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_rejects_unsigned_and_duplicate() {
        let gateway = gateway(10);
        let mut unsigned = signed_tx(1);
        unsigned.signatures.clear();
        assert!(matches!(
            gateway.enqueue(unsigned).await,
            Err(OrderingError::NotFullySigned(_))
        ));

        let tx = signed_tx(2);
        gateway.enqueue(tx.clone()).await.unwrap();
        assert!(matches!(
            gateway.enqueue(tx).await,
            Err(OrderingError::AlreadyQueued(_))
        ));
        assert_eq!(gateway.queue_len().await, 1);
    }

    struct RejectCreatedAt(u64);

    impl TransactionValidator for RejectCreatedAt {
        fn validate(&self, tx: &Transaction) -> Result<(), String> {
            if tx.payload.created_time == self.0 {
                Err("stale".to_string())
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_late_validation_failure_dropped() {
        let sink = RecordingSink::new();
        let gateway = gateway_with(
            config(10),
            observer_schedule(),
            Arc::new(RejectCreatedAt(2)),
            sink.clone(),
        );
        let txs: Vec<Transaction> = (1..=3).map(signed_tx).collect();
        for tx in &txs {
            gateway.enqueue(tx.clone()).await.unwrap();
        }

        let report = gateway.flush().await;
        let batch = report.batch.unwrap();
        assert_eq!(batch.transactions, vec![txs[0].clone(), txs[2].clone()]);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].fingerprint, txs[1].fingerprint().unwrap());
        assert_eq!(
            sink.count(|d| matches!(d, Diagnostic::TransactionDropped { .. })),
            1
        );
    }

    #[tokio::test]
    async fn test_all_dropped_produces_no_batch() {
        let gateway = gateway_with(
            config(10),
            observer_schedule(),
            Arc::new(RejectCreatedAt(1)),
            Arc::new(NoopSink),
        );
        let mut batches = gateway.subscribe_batches();
        gateway.enqueue(signed_tx(1)).await.unwrap();

        let report = gateway.flush().await;
        assert!(report.batch.is_none());
        assert_eq!(report.dropped.len(), 1);
        assert!(matches!(batches.try_recv(), Err(TryRecvError::Empty)));

        // sequence is not consumed by an empty result
        gateway.enqueue(signed_tx(5)).await.unwrap();
        assert_eq!(gateway.flush().await.batch.unwrap().sequence, 1);
    }

    #[tokio::test]
    async fn test_proposer_emits_proposal_in_addition_to_batch() {
        let local = KeyPair::generate().public;
        let gateway = gateway_with(
            config(10),
            ProposerSchedule::solo(local),
            Arc::new(QuorumValidator),
            Arc::new(NoopSink),
        );
        let mut batches = gateway.subscribe_batches();
        let mut proposals = gateway.subscribe_proposals();
        gateway.enqueue(signed_tx(1)).await.unwrap();

        let report = gateway.flush().await;
        let batch = batches.try_recv().unwrap();
        let proposal = proposals.try_recv().unwrap();
        assert_eq!(proposal.proposer, local);
        assert_eq!(proposal.round, 1);
        assert_eq!(proposal.batch, *batch);
        assert_eq!(report.proposal.unwrap(), proposal);
    }

    #[tokio::test]
    async fn test_non_proposer_emits_batch_only() {
        let gateway = gateway(10);
        let mut proposals = gateway.subscribe_proposals();
        gateway.enqueue(signed_tx(1)).await.unwrap();

        let report = gateway.flush().await;
        assert!(report.batch.is_some());
        assert!(report.proposal.is_none());
        assert!(matches!(proposals.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_backlog_warning_on_crossing() {
        let sink = RecordingSink::new();
        let mut config = config(100);
        config.queue_warn_threshold = 2;
        let gateway = gateway_with(
            config,
            observer_schedule(),
            Arc::new(QuorumValidator),
            sink.clone(),
        );

        for n in 1..=5 {
            gateway.enqueue(signed_tx(n)).await.unwrap();
        }
        assert_eq!(
            sink.count(|d| matches!(d, Diagnostic::QueueBacklog { .. })),
            1
        );

        gateway.flush().await;
        gateway.enqueue(signed_tx(6)).await.unwrap();
        gateway.enqueue(signed_tx(7)).await.unwrap();
        gateway.enqueue(signed_tx(8)).await.unwrap();
        assert_eq!(
            sink.count(|d| matches!(d, Diagnostic::QueueBacklog { .. })),
            2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_flushes_and_stops_on_cancel() {
        let mut config = config(100);
        config.flush_interval = Duration::from_millis(200);
        let gateway = Arc::new(gateway_with(
            config,
            observer_schedule(),
            Arc::new(QuorumValidator),
            Arc::new(NoopSink),
        ));
        let mut batches = gateway.subscribe_batches();
        let cancel = CancellationToken::new();
        let handle = {
            let gateway = Arc::clone(&gateway);
            let cancel = cancel.clone();
            tokio::spawn(async move { gateway.run(cancel).await })
        };

        gateway.enqueue(signed_tx(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(batches.try_recv().unwrap().len(), 1);

        cancel.cancel();
        handle.await.unwrap();

        gateway.enqueue(signed_tx(2)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(matches!(batches.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(gateway.queue_len().await, 1);
    }
}
