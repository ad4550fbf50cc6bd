//! Driver seam — the external client that actually talks to the server.
//!
//! The resolver decides *what* to connect to; a [`Connector`] decides *how*.
//! [`MongoConnector`] hands the resolved `ConnectionString` to the `mongodb`
//! crate. [`MemoryConnector`](crate::memory::MemoryConnector) keeps everything
//! in process.

use mongodb::bson::{Document, doc};
use mongodb::options::ClientOptions;
use std::future::Future;
use tracing::debug;

use crate::error::Result;
use crate::resolver::ConnectionSpec;

/// An opened client. Cheap to clone; clones share the underlying connection.
pub trait Client: Clone + Send + Sync + 'static {
    fn insert_one(
        &self,
        database: &str,
        collection: &str,
        document: Document,
    ) -> impl Future<Output = Result<()>> + Send;

    fn find_one(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
    ) -> impl Future<Output = Result<Option<Document>>> + Send;

    fn ping(&self, database: &str) -> impl Future<Output = Result<()>> + Send;

    /// Release the client's resources. Further use is undefined.
    fn shutdown(&self) -> impl Future<Output = ()> + Send;
}

/// Opens clients from resolved specs.
pub trait Connector {
    type Client: Client;

    fn connect(&self, spec: &ConnectionSpec) -> impl Future<Output = Result<Self::Client>> + Send;
}

// ─── MongoDB ────────────────────────────────────────────────────────────────

/// Connector backed by the official `mongodb` driver.
///
/// Connecting builds `ClientOptions` from the resolved options (an SRV URI
/// is looked up in DNS here) and creates the client; the driver dials the
/// server lazily on first operation.
#[derive(Debug, Clone, Default)]
pub struct MongoConnector {
    app_name: Option<String>,
}

impl MongoConnector {
    /// `app_name` is reported to the server unless the URI sets `appName`.
    pub fn new(app_name: Option<String>) -> Self {
        Self { app_name }
    }
}

impl Connector for MongoConnector {
    type Client = MongoClient;

    async fn connect(&self, spec: &ConnectionSpec) -> Result<MongoClient> {
        let mut options = ClientOptions::parse(spec.options().clone()).await?;
        if options.app_name.is_none() {
            options.app_name = self.app_name.clone();
        }
        debug!(prefix = spec.prefix(), hosts = ?options.hosts, "building driver client");
        let inner = mongodb::Client::with_options(options)?;
        Ok(MongoClient { inner })
    }
}

/// A `mongodb::Client` behind the [`Client`] seam.
#[derive(Debug, Clone)]
pub struct MongoClient {
    inner: mongodb::Client,
}

impl MongoClient {
    /// The raw driver client, for anything beyond the seam.
    pub fn inner(&self) -> &mongodb::Client {
        &self.inner
    }
}

impl Client for MongoClient {
    async fn insert_one(&self, database: &str, collection: &str, document: Document) -> Result<()> {
        self.inner
            .database(database)
            .collection::<Document>(collection)
            .insert_one(document)
            .await?;
        Ok(())
    }

    async fn find_one(
        &self,
        database: &str,
        collection: &str,
        filter: Document,
    ) -> Result<Option<Document>> {
        let found = self
            .inner
            .database(database)
            .collection::<Document>(collection)
            .find_one(filter)
            .await?;
        Ok(found)
    }

    async fn ping(&self, database: &str) -> Result<()> {
        self.inner
            .database(database)
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    async fn shutdown(&self) {
        self.inner.clone().shutdown().await;
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
