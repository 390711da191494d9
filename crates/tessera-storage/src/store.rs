use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tessera_core::diagnostics::{tracing_sink, BlockKey};
use tessera_core::{Block, Diagnostic, DiagnosticSink, Hash};
use tokio::sync::RwLock;

use crate::backend::{BlockBackend, MemoryBackend};
use crate::error::StorageError;

const COMPONENT: &str = "block_store";

/// What a `store_block` call displaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreOutcome {
    pub height_overwritten: bool,
    pub hash_overwritten: bool,
}

impl StoreOutcome {
    pub fn overwrote(&self) -> bool {
        self.height_overwritten || self.hash_overwritten
    }
}

/// Both indexes and the backend share one lock, so a reader never sees
/// the height index and the hash index disagree about a block.
struct Indexes {
    by_height: BTreeMap<u64, Arc<Block>>,
    by_hash: HashMap<Hash, Arc<Block>>,
    backend: Box<dyn BlockBackend>,
}

impl Indexes {
    /// Insert with last-write-wins semantics, evicting whatever the new
    /// block displaced from the other index.
    fn insert(&mut self, block: Arc<Block>) -> StoreOutcome {
        let height = block.height();
        let hash = block.hash();

        let displaced_by_height = self.by_height.insert(height, Arc::clone(&block));
        let displaced_by_hash = self.by_hash.insert(hash, Arc::clone(&block));

        if let Some(old) = &displaced_by_height {
            if old.hash() != hash
                && self
                    .by_hash
                    .get(&old.hash())
                    .is_some_and(|entry| entry.height() == height)
            {
                self.by_hash.remove(&old.hash());
            }
        }
        if let Some(old) = &displaced_by_hash {
            if old.height() != height
                && self
                    .by_height
                    .get(&old.height())
                    .is_some_and(|entry| entry.hash() == hash)
            {
                self.by_height.remove(&old.height());
            }
        }

        StoreOutcome {
            height_overwritten: displaced_by_height.is_some(),
            hash_overwritten: displaced_by_hash.is_some(),
        }
    }

}

/// Committed blocks indexed by height and by hash.
///
/// Reads take the shared lock and may run concurrently; `store_block` takes
/// the exclusive lock for the index update and the backend write only.
pub struct BlockStore {
    indexes: RwLock<Indexes>,
    sink: Arc<dyn DiagnosticSink>,
}

impl BlockStore {
    /// Volatile store reporting through `tracing`
    pub fn in_memory() -> Self {
        Self::with_sink(tracing_sink())
    }

    pub fn with_sink(sink: Arc<dyn DiagnosticSink>) -> Self {
        BlockStore {
            indexes: RwLock::new(Indexes {
                by_height: BTreeMap::new(),
                by_hash: HashMap::new(),
                backend: Box::new(MemoryBackend),
            }),
            sink,
        }
    }

    /// Open a store over `backend`, replaying every block it already holds
    /// in the order they were stored.
    pub fn open<B: BlockBackend + 'static>(
        backend: B,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, StorageError> {
        let blocks = backend.load()?;

        let mut indexes = Indexes {
            by_height: BTreeMap::new(),
            by_hash: HashMap::new(),
            backend: Box::new(backend),
        };
        for block in blocks {
            indexes.insert(Arc::new(block));
        }

        Ok(BlockStore {
            indexes: RwLock::new(indexes),
            sink,
        })
    }

    /// Store `block`, replacing any block at the same height or hash.
    ///
    /// Replacement is reported as a warning, never as an error. The only
    /// error is a backend failure; the indexes already hold the new block
    /// when it is returned.
    pub async fn store_block(&self, block: Block) -> Result<StoreOutcome, StorageError> {
        let height = block.height();
        let hash = block.hash();

        let (outcome, persisted) = {
            let mut indexes = self.indexes.write().await;
            let persisted = indexes.backend.append(&block);
            let outcome = indexes.insert(Arc::new(block));
            (outcome, persisted)
        };

        if outcome.height_overwritten {
            self.sink.report(
                COMPONENT,
                Diagnostic::BlockOverwritten {
                    key: BlockKey::Height(height),
                },
            );
        }
        if outcome.hash_overwritten {
            self.sink.report(
                COMPONENT,
                Diagnostic::BlockOverwritten {
                    key: BlockKey::Hash(hash),
                },
            );
        }
        self.sink
            .report(COMPONENT, Diagnostic::BlockStored { height, hash });

        persisted.map(|_| outcome)
    }

    pub async fn get_block_by_height(&self, height: u64) -> Option<Arc<Block>> {
        let found = self.indexes.read().await.by_height.get(&height).cloned();
        if found.is_none() {
            self.sink.report(
                COMPONENT,
                Diagnostic::BlockNotFound {
                    key: BlockKey::Height(height),
                },
            );
        }
        found
    }

    pub async fn get_block_by_hash(&self, hash: &Hash) -> Option<Arc<Block>> {
        let found = self.indexes.read().await.by_hash.get(hash).cloned();
        if found.is_none() {
            self.sink.report(
                COMPONENT,
                Diagnostic::BlockNotFound {
                    key: BlockKey::Hash(*hash),
                },
            );
        }
        found
    }

    /// Block with the greatest stored height
    pub async fn get_top_block(&self) -> Option<Arc<Block>> {
        let top = self
            .indexes
            .read()
            .await
            .by_height
            .last_key_value()
            .map(|(_, block)| Arc::clone(block));
        if top.is_none() {
            self.sink.report(COMPONENT, Diagnostic::StoreEmpty);
        }
        top
    }

    /// Height of the top block, or 0 when empty
    pub async fn height(&self) -> u64 {
        self.indexes
            .read()
            .await
            .by_height
            .last_key_value()
            .map_or(0, |(height, _)| *height)
    }

    pub async fn contains_hash(&self, hash: &Hash) -> bool {
        self.indexes.read().await.by_hash.contains_key(hash)
    }

    pub async fn len(&self) -> usize {
        self.indexes.read().await.by_height.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FileBackend;
    use tessera_core::{Command, KeyPair, RecordingSink, Transaction, TransactionPayload};

    fn block_at(height: u64, created_time: u64) -> Block {
        Block::new(height, Hash::ZERO, created_time, vec![]).unwrap()
    }

    fn recording_store() -> (BlockStore, Arc<RecordingSink>) {
        let sink = RecordingSink::new();
        (BlockStore::with_sink(sink.clone()), sink)
    }

    #[tokio::test]
    async fn test_empty_store_reports_absence() {
        let (store, sink) = recording_store();

        assert!(store.get_top_block().await.is_none());
        assert!(store.get_block_by_height(1).await.is_none());
        assert!(store.get_block_by_hash(&Hash::ZERO).await.is_none());
        assert_eq!(store.height().await, 0);
        assert!(store.is_empty().await);

        assert_eq!(sink.count(|d| matches!(d, Diagnostic::StoreEmpty)), 1);
        assert_eq!(
            sink.count(|d| matches!(d, Diagnostic::BlockNotFound { .. })),
            2
        );
        assert!(sink.warnings().is_empty());
    }

    #[tokio::test]
    async fn test_top_block_follows_max_height() {
        let (store, _) = recording_store();
        for height in [2, 1, 3] {
            store.store_block(block_at(height, height)).await.unwrap();
        }

        let top = store.get_top_block().await.unwrap();
        assert_eq!(top.height(), 3);

        let by_hash = store.get_block_by_hash(&top.hash()).await.unwrap();
        assert!(Arc::ptr_eq(&top, &by_hash));
    }

    #[tokio::test]
    async fn test_overwrite_at_height_warns_and_replaces() {
        let (store, sink) = recording_store();
        for height in 1..=3 {
            let outcome = store.store_block(block_at(height, 100)).await.unwrap();
            assert!(!outcome.overwrote());
        }
        let original = store.get_block_by_height(2).await.unwrap();

        let replacement = block_at(2, 999);
        let replacement_hash = replacement.hash();
        let outcome = store.store_block(replacement).await.unwrap();
        assert!(outcome.height_overwritten);
        assert!(!outcome.hash_overwritten);

        let stored = store.get_block_by_height(2).await.unwrap();
        assert_eq!(stored.hash(), replacement_hash);
        assert_eq!(store.get_top_block().await.unwrap().height(), 3);

        // the displaced block is gone from the hash index too
        assert!(!store.contains_hash(&original.hash()).await);
        assert_eq!(store.len().await, 3);

        assert_eq!(
            sink.warnings(),
            vec![Diagnostic::BlockOverwritten {
                key: BlockKey::Height(2)
            }]
        );
    }

    #[tokio::test]
    async fn test_restoring_same_block_reports_both_overwrites() {
        let (store, sink) = recording_store();
        let block = block_at(1, 5);
        store.store_block(block.clone()).await.unwrap();
        let outcome = store.store_block(block).await.unwrap();

        assert!(outcome.height_overwritten && outcome.hash_overwritten);
        assert_eq!(sink.warnings().len(), 2);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_top_block_keeps_hash_index_consistent() {
        let (store, _) = recording_store();
        let signer = KeyPair::generate();
        let tx = Transaction::new(TransactionPayload {
            creator_account_id: "admin@test".to_string(),
            created_time: 1,
            quorum: 1,
            commands: vec![Command::SetAccountQuorum {
                account_id: "admin@test".to_string(),
                quorum: 1,
            }],
        })
        .sign(&signer)
        .unwrap();

        let block = Block::new(1, Hash::ZERO, 1, vec![tx]).unwrap();
        store.store_block(block.clone()).await.unwrap();

        let top = store.get_top_block().await.unwrap();
        assert_eq!(*top, block);
        assert_eq!(top.transactions().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_readers_never_see_split_indexes() {
        let store = Arc::new(BlockStore::with_sink(Arc::new(tessera_core::NoopSink)));

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for round in 0..200u64 {
                    let height = round % 5 + 1;
                    store.store_block(block_at(height, round)).await.unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    for _ in 0..200 {
                        if let Some(top) = store.get_top_block().await {
                            if let Some(same) = store.get_block_by_hash(&top.hash()).await {
                                assert_eq!(same.hash(), top.hash());
                            }
                        }
                        for height in 1..=5 {
                            if let Some(block) = store.get_block_by_height(height).await {
                                assert_eq!(block.height(), height);
                            }
                        }
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }

        assert_eq!(store.len().await, 5);
        for height in 1..=5 {
            let block = store.get_block_by_height(height).await.unwrap();
            assert!(store.contains_hash(&block.hash()).await);
        }
    }

    #[tokio::test]
    async fn test_file_backend_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blocks.bin");

        {
            let store =
                BlockStore::open(FileBackend::new(&path), Arc::new(tessera_core::NoopSink)).unwrap();
            for height in 1..=3 {
                store.store_block(block_at(height, height)).await.unwrap();
            }
            store.store_block(block_at(3, 42)).await.unwrap();
        }

        let reopened =
            BlockStore::open(FileBackend::new(&path), Arc::new(tessera_core::NoopSink)).unwrap();
        assert_eq!(reopened.len().await, 3);
        let top = reopened.get_top_block().await.unwrap();
        assert_eq!(top.height(), 3);
        assert_eq!(top.created_time(), 42);
    }
}
