//! Connection string helpers around the driver's own parser.
//!
//! `mongodb::options::ConnectionString::parse` is the single source of truth
//! for what a URI means. This module maps its failures onto the prefix's
//! `URI` key, edits the seed list when discrete keys override it, and masks
//! passwords for logs.
//!
//! Reference: https://www.mongodb.com/docs/manual/reference/connection-string/

use mongodb::options::{ConnectionString, HostInfo, ServerAddress};

use crate::error::{Error, Result};

// ─── Constants ──────────────────────────────────────────────────────────────

/// Standard MongoDB port.
pub const DEFAULT_PORT: u16 = 27017;

/// Host used when neither a URI nor `{prefix}_HOST` names one.
pub const DEFAULT_HOST: &str = "localhost";

const MASK: &str = "****";

// ─── Parsing ────────────────────────────────────────────────────────────────

/// Parse `raw` with the driver, reporting failures against `key`.
///
/// `socketTimeoutMS` parses but is refused later by the driver, so it is
/// rejected here where the key is still known.
pub fn parse(key: &str, raw: &str) -> Result<ConnectionString> {
    let parsed =
        ConnectionString::parse(raw).map_err(|e| Error::configuration(key, e.to_string()))?;
    #[allow(deprecated)]
    if parsed.socket_timeout.is_some() {
        return Err(Error::configuration(
            key,
            "socketTimeoutMS is not supported by the driver",
        ));
    }
    Ok(parsed)
}

/// Parse a single `host[:port]`, `[ipv6][:port]` or `*.sock` value.
pub fn server_address(key: &str, raw: &str) -> Result<ServerAddress> {
    if raw.contains(',') {
        return Err(Error::configuration(
            key,
            "names more than one server; list seeds in the URI instead",
        ));
    }
    ServerAddress::parse(raw).map_err(|e| Error::configuration(key, e.to_string()))
}

/// Replace the port of a TCP address. Socket paths have no port.
pub fn with_port(key: &str, address: ServerAddress, port: u16) -> Result<ServerAddress> {
    match address {
        ServerAddress::Tcp { host, .. } => Ok(ServerAddress::Tcp {
            host,
            port: Some(port),
        }),
        other => Err(Error::configuration(
            key,
            format!("{other} is a socket path and takes no port"),
        )),
    }
}

/// `address` with the port of `from` when it names none itself.
pub fn inherit_port(address: ServerAddress, from: Option<&ServerAddress>) -> ServerAddress {
    match (address, from) {
        (ServerAddress::Tcp { host, port: None }, Some(ServerAddress::Tcp { port, .. })) => {
            ServerAddress::Tcp { host, port: *port }
        }
        (address, _) => address,
    }
}

// ─── Host Info ──────────────────────────────────────────────────────────────

/// The SRV record name, if the URI used `mongodb+srv://`.
pub fn srv_name(info: &HostInfo) -> Option<&str> {
    match info {
        HostInfo::DnsRecord(name) => Some(name.as_str()),
        _ => None,
    }
}

/// The explicit seed list. Empty for SRV.
pub fn seeds(info: &HostInfo) -> &[ServerAddress] {
    match info {
        HostInfo::HostIdentifiers(seeds) => seeds.as_slice(),
        _ => &[],
    }
}

/// Host and port a binding reports: the first seed, or the SRV name.
///
/// SRV names and socket paths report [`DEFAULT_PORT`]; the driver picks the
/// real port from DNS or ignores it.
pub fn primary(info: &HostInfo) -> (String, u16) {
    if let Some(name) = srv_name(info) {
        return (name.to_string(), DEFAULT_PORT);
    }
    match seeds(info).first() {
        Some(ServerAddress::Tcp { host, port }) => (host.clone(), port.unwrap_or(DEFAULT_PORT)),
        Some(other) => (other.to_string(), DEFAULT_PORT),
        None => (DEFAULT_HOST.to_string(), DEFAULT_PORT),
    }
}

// ─── Redaction ──────────────────────────────────────────────────────────────

/// `raw` with the password in its userinfo replaced by `****`.
///
/// Works on the text as written, so nothing is decoded or re-encoded.
pub fn redact(raw: &str) -> String {
    let Some((scheme, rest)) = raw.split_once("://") else {
        return raw.to_string();
    };
    let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);
    let Some((userinfo, hosts)) = authority.rsplit_once('@') else {
        return raw.to_string();
    };
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:{MASK}@{hosts}{tail}"),
        None => raw.to_string(),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
