//! Host — the application object that owns config and bound connections.
//!
//! `Host::bind(prefix)` resolves the prefix from the host's [`ConfigStore`],
//! opens a client through the host's [`Connector`], and records the result in
//! the registry. A prefix binds at most once per host until it is closed;
//! different prefixes coexist freely.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use mongodb::bson::Document;

use crate::config::ConfigStore;
use crate::document::{DocumentClass, Record};
use crate::driver::{Client, Connector};
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::resolver::{ConfigResolver, ConnectionSpec};

// ─── Result Object ──────────────────────────────────────────────────────────

/// Handle to an opened client plus the address it was opened against.
#[derive(Debug, Clone)]
pub struct Connection<K> {
    client: K,
    host: String,
    port: u16,
    document_class: DocumentClass,
}

impl<K: Client> Connection<K> {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Class used to materialize records fetched through this connection.
    pub fn document_class(&self) -> &DocumentClass {
        &self.document_class
    }

    pub fn client(&self) -> &K {
        &self.client
    }

    /// Select a database other than the binding's default.
    pub fn database(&self, name: &str) -> Database<K> {
        Database {
            name: name.to_string(),
            client: self.client.clone(),
            document_class: self.document_class.clone(),
        }
    }
}

/// A database reference on a bound connection.
#[derive(Debug, Clone)]
pub struct Database<K> {
    name: String,
    client: K,
    document_class: DocumentClass,
}

impl<K: Client> Database<K> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection(&self, name: &str) -> Collection<K> {
        Collection {
            database: self.name.clone(),
            name: name.to_string(),
            client: self.client.clone(),
            document_class: self.document_class.clone(),
        }
    }

    pub async fn ping(&self) -> Result<()> {
        self.client.ping(&self.name).await
    }
}

/// A collection whose fetched documents come back as [`Record`]s.
#[derive(Debug, Clone)]
pub struct Collection<K> {
    database: String,
    name: String,
    client: K,
    document_class: DocumentClass,
}

impl<K: Client> Collection<K> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn insert_one(&self, document: Document) -> Result<()> {
        self.client
            .insert_one(&self.database, &self.name, document)
            .await
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<Record>> {
        let found = self
            .client
            .find_one(&self.database, &self.name, filter)
            .await?;
        Ok(found.map(|d| self.document_class.materialize(d)))
    }
}

/// What a successful bind hands back: the spec, the connection, and the
/// selected default database.
#[derive(Debug)]
pub struct Mongo<K> {
    spec: ConnectionSpec,
    connection: Connection<K>,
    database: Database<K>,
}

impl<K: Client> Mongo<K> {
    fn new(spec: ConnectionSpec, client: K) -> Self {
        let connection = Connection {
            client,
            host: spec.host().to_string(),
            port: spec.port(),
            document_class: spec.document_class().clone(),
        };
        let database = connection.database(spec.database());
        Self {
            spec,
            connection,
            database,
        }
    }

    pub fn prefix(&self) -> &str {
        self.spec.prefix()
    }

    pub fn spec(&self) -> &ConnectionSpec {
        &self.spec
    }

    pub fn connection(&self) -> &Connection<K> {
        &self.connection
    }

    pub fn database(&self) -> &Database<K> {
        &self.database
    }
}

// ─── Registry ───────────────────────────────────────────────────────────────

/// Prefix → bound connection, scoped to one [`Host`].
#[derive(Debug)]
pub struct Registry<K> {
    bindings: BTreeMap<String, Arc<Mongo<K>>>,
}

impl<K> Default for Registry<K> {
    fn default() -> Self {
        Self {
            bindings: BTreeMap::new(),
        }
    }
}

impl<K> Registry<K> {
    pub fn contains(&self, prefix: &str) -> bool {
        self.bindings.contains_key(prefix)
    }

    pub fn get(&self, prefix: &str) -> Option<&Arc<Mongo<K>>> {
        self.bindings.get(prefix)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    fn insert(&mut self, prefix: &str, mongo: Arc<Mongo<K>>) {
        self.bindings.insert(prefix.to_string(), mongo);
    }

    fn remove(&mut self, prefix: &str) -> Option<Arc<Mongo<K>>> {
        self.bindings.remove(prefix)
    }
}

// ─── Host ───────────────────────────────────────────────────────────────────

/// The host application object.
pub struct Host<C: Connector> {
    resolver: ConfigResolver,
    config: ConfigStore,
    connector: C,
    registry: Registry<C::Client>,
    metrics: Arc<Metrics>,
}

impl<C: Connector> Host<C> {
    /// `name` is the application name; it doubles as the default database.
    pub fn new(name: Option<&str>, config: ConfigStore, connector: C) -> Self {
        Self {
            resolver: ConfigResolver::new(name.map(String::from)),
            config,
            connector,
            registry: Registry::default(),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.resolver.app_name()
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigStore {
        &mut self.config
    }

    /// For registering named document classes.
    pub fn resolver_mut(&mut self) -> &mut ConfigResolver {
        &mut self.resolver
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn registry(&self) -> &Registry<C::Client> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Resolve `prefix`, open its connection, and register it.
    ///
    /// Fails with [`Error::DuplicatePrefix`] if `prefix` is already bound.
    /// A failed bind leaves the registry untouched.
    pub async fn bind(&mut self, prefix: &str) -> Result<Arc<Mongo<C::Client>>> {
        if self.registry.contains(prefix) {
            Metrics::inc(&self.metrics.duplicate_rejections);
            warn!(prefix, "prefix already bound on this host");
            return Err(Error::DuplicatePrefix {
                prefix: prefix.to_string(),
            });
        }

        let spec = match self.resolver.resolve(&self.config, prefix) {
            Ok(spec) => spec,
            Err(e) => {
                Metrics::inc(&self.metrics.binds_failed);
                return Err(e);
            }
        };
        if spec.is_unauthenticated_uri() {
            Metrics::inc(&self.metrics.unauthenticated_uris);
        }

        let client = match self.connector.connect(&spec).await {
            Ok(client) => client,
            Err(e) => {
                Metrics::inc(&self.metrics.binds_failed);
                warn!(prefix, error = %e, "connect failed");
                return Err(e);
            }
        };

        let mongo = Arc::new(Mongo::new(spec, client));
        self.registry.insert(prefix, Arc::clone(&mongo));
        Metrics::inc(&self.metrics.binds_total);
        Metrics::inc(&self.metrics.connections_open);

        info!(
            prefix,
            host = %mongo.connection.host,
            port = mongo.connection.port,
            database = %mongo.database.name,
            document_class = %mongo.connection.document_class,
            "bound connection"
        );

        Ok(mongo)
    }

    pub fn get(&self, prefix: &str) -> Option<Arc<Mongo<C::Client>>> {
        self.registry.get(prefix).cloned()
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.registry.prefixes()
    }

    /// Unregister `prefix` and shut its client down. The prefix may be bound
    /// again afterwards. Returns false if nothing was bound.
    pub async fn close(&mut self, prefix: &str) -> bool {
        let Some(mongo) = self.registry.remove(prefix) else {
            return false;
        };
        mongo.connection.client.shutdown().await;
        Metrics::dec(&self.metrics.connections_open);
        Metrics::inc(&self.metrics.connections_closed);
        info!(prefix, "closed connection");
        true
    }

    /// Close every bound prefix.
    pub async fn close_all(&mut self) {
        let prefixes: Vec<String> = self.registry.prefixes().map(String::from).collect();
        for prefix in prefixes {
            self.close(&prefix).await;
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConnector;
    use mongodb::bson::doc;

    fn host_with(entries: &[(&str, &str)]) -> Host<MemoryConnector> {
        let mut config = ConfigStore::new();
        for (k, v) in entries {
            config.insert(*k, *v);
        }
        Host::new(Some("test"), config, MemoryConnector::new())
    }

    #[tokio::test]
    async fn bind_exposes_connection_and_database() {
        let mut host = host_with(&[
            ("MONGO_DBNAME", "inventory"),
            ("MONGO_HOST", "localhost"),
            ("MONGO_PORT", "27017"),
        ]);
        let mongo = host.bind("MONGO").await.unwrap();
        assert_eq!(mongo.prefix(), "MONGO");
        assert_eq!(mongo.database().name(), "inventory");
        assert_eq!(mongo.connection().host(), "localhost");
        assert_eq!(mongo.connection().port(), 27017);
        assert!(mongo.connection().document_class().is_generic());
        assert!(Arc::ptr_eq(&mongo, &host.get("MONGO").unwrap()));
    }

    #[tokio::test]
    async fn prefixes_bind_independently() {
        let mut host = host_with(&[("ONE_DBNAME", "ONE"), ("TWO_DBNAME", "TWO")]);
        let one = host.bind("ONE").await.unwrap();
        let two = host.bind("TWO").await.unwrap();
        assert_eq!(one.database().name(), "ONE");
        assert_eq!(two.database().name(), "TWO");
        assert_eq!(host.prefixes().collect::<Vec<_>>(), vec!["ONE", "TWO"]);
        assert_eq!(host.connector().dialed().await.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_prefix_rejected_before_dialing() {
        let mut host = host_with(&[]);
        host.bind("MONGO").await.unwrap();
        let err = host.bind("MONGO").await.unwrap_err();
        assert!(matches!(err, Error::DuplicatePrefix { ref prefix } if prefix == "MONGO"));
        assert_eq!(host.registry().len(), 1);
        assert_eq!(host.metrics().snapshot().duplicate_rejections, 1);
        // Only the first bind reached the driver.
        assert_eq!(host.connector().dialed().await.len(), 1);
    }

    #[tokio::test]
    async fn failed_bind_leaves_registry_untouched() {
        let mut host = host_with(&[("MONGO_PORT", "27017x")]);
        assert!(matches!(
            host.bind("MONGO").await,
            Err(Error::TypeConversion { .. })
        ));
        assert!(host.registry().is_empty());

        host.config_mut().insert("MONGO_PORT", 27017);
        assert!(host.bind("MONGO").await.is_ok());

        let mut refused = Host::new(None, ConfigStore::new(), MemoryConnector::refusing("down"));
        refused.config_mut().insert("MONGO_DBNAME", "db");
        assert!(refused.bind("MONGO").await.is_err());
        assert!(refused.registry().is_empty());
        assert_eq!(refused.metrics().snapshot().binds_failed, 1);
    }

    #[tokio::test]
    async fn close_releases_prefix() {
        let mut host = host_with(&[]);
        let first = host.bind("MONGO").await.unwrap();
        assert!(host.close("MONGO").await);
        assert!(first.connection().client().is_closed());
        assert!(!host.close("MONGO").await);

        let second = host.bind("MONGO").await.unwrap();
        assert!(!second.connection().client().is_closed());
        let snap = host.metrics().snapshot();
        assert_eq!(snap.binds_total, 2);
        assert_eq!(snap.connections_open, 1);
        assert_eq!(snap.connections_closed, 1);

        host.close_all().await;
        assert!(host.registry().is_empty());
    }

    #[tokio::test]
    async fn uri_without_credentials_is_counted() {
        let mut host = host_with(&[("MONGO_URI", "mongodb://localhost/inventory")]);
        let mongo = host.bind("MONGO").await.unwrap();
        assert_eq!(mongo.connection().port(), 27017);
        assert_eq!(host.metrics().snapshot().unauthenticated_uris, 1);
    }

    #[tokio::test]
    async fn records_generic_without_document_class() {
        let mut host = host_with(&[]);
        let mongo = host.bind("MONGO").await.unwrap();
        let things = mongo.database().collection("things");
        assert!(things.find_one(doc! {}).await.unwrap().is_none());

        things
            .insert_one(doc! { "_id": "thing", "val": "foo" })
            .await
            .unwrap();
        let record = things.find_one(doc! {}).await.unwrap().unwrap();
        assert_eq!(record.class(), &DocumentClass::generic());
        assert_eq!(record.get_str("val").unwrap(), "foo");
    }

    #[tokio::test]
    async fn records_tagged_with_configured_class() {
        let mut host = host_with(&[("MONGO_DBNAME", "shared")]);
        host.config_mut().insert("CUSTOM_DBNAME", "shared");
        host.config_mut()
            .insert("CUSTOM_DOCUMENT_CLASS", DocumentClass::new("CustomDict"));

        let default = host.bind("MONGO").await.unwrap();
        let custom = host.bind("CUSTOM").await.unwrap();
        assert_eq!(custom.connection().document_class().name(), "CustomDict");

        let things = custom.database().collection("things");
        assert!(things.find_one(doc! {}).await.unwrap().is_none());
        things
            .insert_one(doc! { "_id": "thing", "val": "foo" })
            .await
            .unwrap();

        let record = things.find_one(doc! {}).await.unwrap().unwrap();
        assert_eq!(record.class().name(), "CustomDict");

        // Same data through the default binding comes back generic.
        let record = default
            .database()
            .collection("things")
            .find_one(doc! { "_id": "thing" })
            .await
            .unwrap()
            .unwrap();
        assert!(record.class().is_generic());
    }

    #[tokio::test]
    async fn registered_class_selected_by_name() {
        let mut host = host_with(&[("MONGO_DOCUMENT_CLASS", "Stamped")]);
        host.resolver_mut()
            .register_class(DocumentClass::with_factory("Stamped", |mut d| {
                d.insert("stamped", true);
                d
            }));
        let mongo = host.bind("MONGO").await.unwrap();
        let c = mongo.database().collection("c");
        c.insert_one(doc! { "_id": 1 }).await.unwrap();
        let record = c.find_one(doc! { "_id": 1 }).await.unwrap().unwrap();
        assert_eq!(record.class().name(), "Stamped");
        assert!(record.get_bool("stamped").unwrap());
    }
}
