//! In-process driver — collections held in memory.
//!
//! Every client opened by one [`MemoryConnector`] sees the same data, the way
//! clients of one server would. Useful for host test suites that want the
//! full bind path without a live server.

use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

use crate::driver::{Client, Connector};
use crate::error::{Error, Result};
use crate::resolver::ConnectionSpec;

type Collections = HashMap<(String, String), Vec<Document>>;

/// Connector whose clients share one in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    collections: Arc<Mutex<Collections>>,
    dialed: Arc<Mutex<Vec<String>>>,
    refuse: Option<String>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector whose every connect attempt fails with `reason`.
    pub fn refusing(reason: &str) -> Self {
        Self {
            refuse: Some(reason.to_string()),
            ..Self::default()
        }
    }

    /// `host:port/database` of every successful connect, in order.
    pub async fn dialed(&self) -> Vec<String> {
        self.dialed.lock().await.clone()
    }
}

impl Connector for MemoryConnector {
    type Client = MemoryClient;

    async fn connect(&self, spec: &ConnectionSpec) -> Result<MemoryClient> {
        if let Some(reason) = &self.refuse {
            return Err(Error::Store(format!("connection refused: {reason}")));
        }
        let address = format!("{}:{}/{}", spec.host(), spec.port(), spec.database());
        debug!(prefix = spec.prefix(), address = %address, "memory client opened");
        self.dialed.lock().await.push(address);
        Ok(MemoryClient {
            collections: Arc::clone(&self.collections),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }
}

/// Client handle onto a [`MemoryConnector`]'s store.
#[derive(Debug, Clone)]
pub struct MemoryClient {
    collections: Arc<Mutex<Collections>>,
    closed: Arc<AtomicBool>,
}

impl MemoryClient {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Store("client is shut down".into()));
        }
        Ok(())
    }
}

fn matches_filter(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(key, expected)| document.get(key) == Some(expected))
}

impl Client for MemoryClient {
    async fn insert_one(&self, database: &str, collection: &str, mut document: Document) -> Result<()> {
        self.check_open()?;
        let id = match document.get("_id") {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                document.insert("_id", id.clone());
                id
            }
        };

        let mut collections = self.collections.lock().await;
        let docs = collections
            .entry((database.to_string(), collection.to_string()))
            .or_default();
        if docs.iter().any(|d| d.get("_id") == Some(&id)) {
            return Err(Error::Store(format!(
                "duplicate key in {database}.{collection}: _id {id}"
            )));
        }
        docs.push(document);
        Ok(())
    }

    async fn find_one(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
    ) -> Result<Option<Document>> {
        self.check_open()?;
        let collections = self.collections.lock().await;
        let found = collections
            .get(&(database.to_string(), collection.to_string()))
            .and_then(|docs| docs.iter().find(|d| matches_filter(d, &filter)))
            .cloned();
        Ok(found)
    }

    async fn ping(&self, _database: &str) -> Result<()> {
        self.check_open()
    }

    async fn shutdown(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
