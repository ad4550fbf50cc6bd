//! mongolink — prefix-scoped MongoDB connections from host configuration.
//!
//! A [`Host`] owns a [`ConfigStore`]. Binding a prefix such as `MONGO` reads
//! `MONGO_URI`, `MONGO_HOST`, `MONGO_PORT`, `MONGO_DBNAME`,
//! `MONGO_DOCUMENT_CLASS` and friends, resolves them into a
//! [`ConnectionSpec`], opens a client through the host's [`Connector`], and
//! registers the result under the prefix. Several prefixes can live on one
//! host; the same prefix cannot be bound twice.
//!
//! # Modules
//!
//! - [`config`] -- config store, TOML/env loading, CLI settings
//! - [`uri`] -- connection string helpers over the driver's parser
//! - [`resolver`] -- prefix resolution into a [`ConnectionSpec`]
//! - [`document`] -- document classes and materialized records
//! - [`driver`] -- the connector seam and the `mongodb` implementation
//! - [`memory`] -- in-process connector
//! - [`host`] -- host object, registry, bound connections
//! - [`metrics`] -- bind counters
//! - [`error`] -- error taxonomy

pub mod config;
pub mod document;
pub mod driver;
pub mod error;
pub mod host;
pub mod memory;
pub mod metrics;
pub mod resolver;
pub mod uri;

pub use config::{ConfigStore, ConfigValue};
pub use document::{DocumentClass, Record};
pub use driver::{Client, Connector, MongoClient, MongoConnector};
pub use error::Error;
pub use host::{Collection, Connection, Database, Host, Mongo};
pub use memory::{MemoryClient, MemoryConnector};
pub use resolver::{ConfigResolver, ConnectionSpec, ReadPreference};
