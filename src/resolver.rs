//! Config Resolver — turn prefixed configuration keys into a connection spec.
//!
//! For a prefix `P` the resolver reads `P_URI` first and parses it with the
//! driver. Discrete keys (`P_HOST`, `P_PORT`, `P_DBNAME`, credentials and
//! pool options) are then applied as edits to the parsed options. Without a
//! URI the discrete keys stand alone, with `localhost:27017` as defaults and
//! the host application's name as the fallback database.
//!
//! The edited [`ConnectionString`] is what the driver receives, so what a
//! binding reports and what the client connects to cannot drift apart.

use mongodb::options::{
    AuthMechanism, ConnectionString, Credential, HostInfo, ReadPreference as DriverReadPreference,
    ServerAddress,
};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{ConfigStore, ConfigValue};
use crate::document::{DocumentClass, GENERIC_CLASS};
use crate::error::{Error, Result};
use crate::uri::{self, DEFAULT_HOST};

/// Mechanisms that authenticate without a password.
const PASSWORDLESS_MECHANISMS: &[&str] =
    &["MONGODB-X509", "GSSAPI", "MONGODB-AWS", "MONGODB-OIDC"];

// ─── Read Preference ────────────────────────────────────────────────────────

/// Server selection mode accepted by `P_READ_PREFERENCE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPreference {
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
}

impl ReadPreference {
    /// Case-insensitive mode name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "primary" => Some(Self::Primary),
            "primarypreferred" => Some(Self::PrimaryPreferred),
            "secondary" => Some(Self::Secondary),
            "secondarypreferred" => Some(Self::SecondaryPreferred),
            "nearest" => Some(Self::Nearest),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::PrimaryPreferred => "primaryPreferred",
            Self::Secondary => "secondary",
            Self::SecondaryPreferred => "secondaryPreferred",
            Self::Nearest => "nearest",
        }
    }

    /// The driver's equivalent, with no tag sets or staleness bound.
    pub fn to_driver(self) -> DriverReadPreference {
        match self {
            Self::Primary => DriverReadPreference::Primary,
            Self::PrimaryPreferred => DriverReadPreference::PrimaryPreferred { options: None },
            Self::Secondary => DriverReadPreference::Secondary { options: None },
            Self::SecondaryPreferred => DriverReadPreference::SecondaryPreferred { options: None },
            Self::Nearest => DriverReadPreference::Nearest { options: None },
        }
    }
}

impl fmt::Display for ReadPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Connection Spec ────────────────────────────────────────────────────────

/// Fully resolved connection attributes for one prefix.
///
/// `host`, `port` and `database` are read off the driver options after every
/// override has been applied.
#[derive(Clone, PartialEq)]
pub struct ConnectionSpec {
    prefix: String,
    host: String,
    port: u16,
    database: String,
    uri: Option<String>,
    document_class: DocumentClass,
    options: ConnectionString,
}

impl ConnectionSpec {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// First seed host, socket path, or SRV record name.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn document_class(&self) -> &DocumentClass {
        &self.document_class
    }

    /// The raw `P_URI` value, if one was configured.
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// The configured URI with its password masked.
    pub fn redacted_uri(&self) -> Option<String> {
        self.uri.as_deref().map(uri::redact)
    }

    /// Driver options handed to the connector.
    pub fn options(&self) -> &ConnectionString {
        &self.options
    }

    pub fn is_srv(&self) -> bool {
        uri::srv_name(&self.options.host_info).is_some()
    }

    /// Every explicit seed. Empty for SRV.
    pub fn seeds(&self) -> &[ServerAddress] {
        uri::seeds(&self.options.host_info)
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.options.credential.as_ref()
    }

    pub fn replica_set(&self) -> Option<&str> {
        self.options.replica_set.as_deref()
    }

    pub fn read_preference(&self) -> Option<&DriverReadPreference> {
        self.options.read_preference.as_ref()
    }

    pub fn max_pool_size(&self) -> Option<u32> {
        self.options.max_pool_size
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.options.connect_timeout
    }

    /// True when a URI was configured but no credential was resolved.
    pub fn is_unauthenticated_uri(&self) -> bool {
        self.uri.is_some() && self.options.credential.is_none()
    }
}

impl fmt::Debug for ConnectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSpec")
            .field("prefix", &self.prefix)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("uri", &self.redacted_uri())
            .field("document_class", &self.document_class)
            .finish_non_exhaustive()
    }
}

// ─── Resolver ───────────────────────────────────────────────────────────────

/// Resolves prefixed keys from a [`ConfigStore`] into [`ConnectionSpec`]s.
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    app_name: Option<String>,
    classes: HashMap<String, DocumentClass>,
}

impl ConfigResolver {
    pub fn new(app_name: Option<String>) -> Self {
        Self {
            app_name,
            classes: HashMap::new(),
        }
    }

    pub fn app_name(&self) -> Option<&str> {
        self.app_name.as_deref()
    }

    /// Make a class selectable by name through `P_DOCUMENT_CLASS`.
    pub fn register_class(&mut self, class: DocumentClass) {
        self.classes.insert(class.name().to_string(), class);
    }

    pub fn resolve(&self, store: &ConfigStore, prefix: &str) -> Result<ConnectionSpec> {
        let keys = Keys { prefix };
        let uri_key = keys.key("URI");

        let raw_uri = get_string(store, &uri_key)?;
        let mut options = match &raw_uri {
            Some(raw) => uri::parse(&uri_key, raw)?,
            None => ConnectionString::default(),
        };

        // ─── Address ────────────────────────────────────────────────────

        let host_key = keys.key("HOST");
        let port_key = keys.key("PORT");
        let host_override = get_string(store, &host_key)?;
        let port_override = get_integer::<u16>(store, &port_key, "port (0-65535)")?;

        if uri::srv_name(&options.host_info).is_some() {
            if host_override.is_some() {
                return Err(Error::configuration(
                    &host_key,
                    "cannot override the host of a mongodb+srv URI",
                ));
            }
            if port_override.is_some() {
                return Err(Error::configuration(
                    &port_key,
                    "mongodb+srv URIs take their ports from DNS",
                ));
            }
        } else {
            let mut seeds = match host_override {
                Some(host) => vec![uri::inherit_port(
                    uri::server_address(&host_key, &host)?,
                    uri::seeds(&options.host_info).first(),
                )],
                None => uri::seeds(&options.host_info).to_vec(),
            };
            if seeds.is_empty() {
                seeds.push(ServerAddress::Tcp {
                    host: DEFAULT_HOST.to_string(),
                    port: None,
                });
            }
            if let Some(port) = port_override {
                let first = seeds.remove(0);
                seeds.insert(0, uri::with_port(&port_key, first, port)?);
            }
            options.host_info = HostInfo::HostIdentifiers(seeds);
        }
        let (host, port) = uri::primary(&options.host_info);

        // ─── Database ───────────────────────────────────────────────────

        let dbname_key = keys.key("DBNAME");
        let database = get_string(store, &dbname_key)?
            .or_else(|| options.default_database.clone())
            .or_else(|| self.app_name.clone())
            .filter(|db| !db.is_empty())
            .ok_or_else(|| Error::configuration(&dbname_key, "a database name is required"))?;
        options.default_database = Some(database.clone());

        // ─── Credentials ────────────────────────────────────────────────

        let username_key = keys.key("USERNAME");
        let password_key = keys.key("PASSWORD");
        match (
            get_string(store, &username_key)?,
            get_string(store, &password_key)?,
        ) {
            (None, None) => {}
            (None, Some(_)) => {
                return Err(Error::configuration(
                    &password_key,
                    "a password was given without a username",
                ));
            }
            (Some(username), password) => {
                let mut credential = options.credential.take().unwrap_or_default();
                if password.is_none() && !is_passwordless(credential.mechanism.as_ref()) {
                    return Err(Error::configuration(
                        &username_key,
                        "a username was given without a password",
                    ));
                }
                credential.username = Some(username);
                if password.is_some() {
                    credential.password = password;
                }
                options.credential = Some(credential);
            }
        }

        if raw_uri.is_some() && options.credential.is_none() {
            warn!(
                prefix,
                "connection URI carries no credentials, connecting without authentication"
            );
        }

        // ─── Document class ─────────────────────────────────────────────

        let document_class = self.document_class(store, &keys.key("DOCUMENT_CLASS"))?;

        // ─── Options ────────────────────────────────────────────────────

        if let Some(name) = get_string(store, &keys.key("REPLICA_SET"))? {
            options.replica_set = Some(name);
        }

        let read_pref_key = keys.key("READ_PREFERENCE");
        if let Some(mode) = get_string(store, &read_pref_key)? {
            let parsed = ReadPreference::parse(&mode).ok_or_else(|| {
                Error::configuration(&read_pref_key, format!("unknown read preference '{mode}'"))
            })?;
            options.read_preference = Some(parsed.to_driver());
        }

        if let Some(size) =
            get_integer::<u32>(store, &keys.key("MAX_POOL_SIZE"), "non-negative integer")?
        {
            options.max_pool_size = Some(size);
        }

        if let Some(ms) =
            get_integer::<u64>(store, &keys.key("CONNECT_TIMEOUT_MS"), "non-negative integer")?
        {
            options.connect_timeout = Some(Duration::from_millis(ms));
        }

        let spec = ConnectionSpec {
            prefix: prefix.to_string(),
            host,
            port,
            database,
            uri: raw_uri,
            document_class,
            options,
        };

        debug!(
            prefix,
            host = %spec.host,
            port = spec.port,
            srv = spec.is_srv(),
            database = %spec.database,
            document_class = %spec.document_class,
            "resolved connection spec"
        );

        Ok(spec)
    }

    fn document_class(&self, store: &ConfigStore, key: &str) -> Result<DocumentClass> {
        match store.get(key) {
            None => Ok(DocumentClass::generic()),
            Some(ConfigValue::DocumentClass(class)) => Ok(class.clone()),
            Some(ConfigValue::String(name)) => {
                if name == GENERIC_CLASS || name == "document" {
                    return Ok(DocumentClass::generic());
                }
                self.classes.get(name).cloned().ok_or_else(|| {
                    Error::configuration(key, format!("unknown document class '{name}'"))
                })
            }
            Some(other) => Err(Error::configuration(
                key,
                format!("expected a document class, found {}", other.describe()),
            )),
        }
    }
}

fn is_passwordless(mechanism: Option<&AuthMechanism>) -> bool {
    mechanism.is_some_and(|m| PASSWORDLESS_MECHANISMS.contains(&m.as_str()))
}

// ─── Key Helpers ────────────────────────────────────────────────────────────

struct Keys<'a> {
    prefix: &'a str,
}

impl Keys<'_> {
    fn key(&self, suffix: &str) -> String {
        format!("{}_{}", self.prefix, suffix)
    }
}

fn get_string(store: &ConfigStore, key: &str) -> Result<Option<String>> {
    match store.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| Error::type_conversion(key, value.describe(), "string")),
    }
}

/// Integers are taken as-is; strings must parse cleanly (no whitespace, no
/// trailing junk). Anything else, or a value out of range for `T`, fails.
fn get_integer<T: TryFrom<i64>>(
    store: &ConfigStore,
    key: &str,
    expected: &'static str,
) -> Result<Option<T>> {
    let Some(value) = store.get(key) else {
        return Ok(None);
    };
    let fail = || Error::type_conversion(key, value.describe(), expected);
    let n = match value {
        ConfigValue::Integer(i) => *i,
        ConfigValue::String(s) => s.parse::<i64>().map_err(|_| fail())?,
        _ => return Err(fail()),
    };
    T::try_from(n).map(Some).map_err(|_| fail())
}

// ─── Tests ──────────────────────────────────────────────────────────────────
