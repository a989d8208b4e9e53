//! Service-name catalog keyed by protocol and port.
//!
//! The catalog is built once from a CSV table of `protocol,port,service`
//! rows and is read-only afterwards, so it can be shared between probes
//! through an `Arc` without any locking.

use crate::error::{CatalogError, CatalogResult};
use crate::types::{Port, Protocol};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, trace};

/// Name reported for ports missing from the catalog.
pub const UNKNOWN_SERVICE: &str = "Unknown Service";

/// Compiled-in well-known services, used when no service table is on disk.
const BUILTIN_SERVICES: &[(Protocol, u16, &str)] = &[
    (Protocol::Tcp, 20, "ftp-data"),
    (Protocol::Tcp, 21, "ftp"),
    (Protocol::Tcp, 22, "ssh"),
    (Protocol::Tcp, 23, "telnet"),
    (Protocol::Tcp, 25, "smtp"),
    (Protocol::Tcp, 53, "domain"),
    (Protocol::Udp, 53, "domain"),
    (Protocol::Udp, 67, "bootps"),
    (Protocol::Udp, 68, "bootpc"),
    (Protocol::Udp, 69, "tftp"),
    (Protocol::Tcp, 80, "http"),
    (Protocol::Tcp, 88, "kerberos"),
    (Protocol::Udp, 88, "kerberos"),
    (Protocol::Tcp, 110, "pop3"),
    (Protocol::Tcp, 111, "sunrpc"),
    (Protocol::Udp, 111, "sunrpc"),
    (Protocol::Tcp, 119, "nntp"),
    (Protocol::Udp, 123, "ntp"),
    (Protocol::Tcp, 135, "msrpc"),
    (Protocol::Udp, 137, "netbios-ns"),
    (Protocol::Udp, 138, "netbios-dgm"),
    (Protocol::Tcp, 139, "netbios-ssn"),
    (Protocol::Tcp, 143, "imap"),
    (Protocol::Udp, 161, "snmp"),
    (Protocol::Udp, 162, "snmptrap"),
    (Protocol::Tcp, 179, "bgp"),
    (Protocol::Tcp, 389, "ldap"),
    (Protocol::Tcp, 443, "https"),
    (Protocol::Udp, 443, "https"),
    (Protocol::Tcp, 445, "microsoft-ds"),
    (Protocol::Tcp, 465, "smtps"),
    (Protocol::Udp, 500, "isakmp"),
    (Protocol::Udp, 514, "syslog"),
    (Protocol::Tcp, 515, "printer"),
    (Protocol::Udp, 520, "rip"),
    (Protocol::Tcp, 548, "afp"),
    (Protocol::Tcp, 554, "rtsp"),
    (Protocol::Tcp, 587, "submission"),
    (Protocol::Tcp, 631, "ipp"),
    (Protocol::Tcp, 636, "ldaps"),
    (Protocol::Tcp, 873, "rsync"),
    (Protocol::Tcp, 993, "imaps"),
    (Protocol::Tcp, 995, "pop3s"),
    (Protocol::Tcp, 1080, "socks"),
    (Protocol::Udp, 1194, "openvpn"),
    (Protocol::Tcp, 1433, "ms-sql-s"),
    (Protocol::Udp, 1434, "ms-sql-m"),
    (Protocol::Tcp, 1521, "oracle"),
    (Protocol::Udp, 1701, "l2tp"),
    (Protocol::Tcp, 1723, "pptp"),
    (Protocol::Udp, 1812, "radius"),
    (Protocol::Udp, 1813, "radius-acct"),
    (Protocol::Tcp, 1883, "mqtt"),
    (Protocol::Tcp, 2049, "nfs"),
    (Protocol::Udp, 2049, "nfs"),
    (Protocol::Tcp, 2181, "zookeeper"),
    (Protocol::Tcp, 2375, "docker"),
    (Protocol::Tcp, 2376, "docker-s"),
    (Protocol::Tcp, 3128, "squid-http"),
    (Protocol::Tcp, 3306, "mysql"),
    (Protocol::Tcp, 3389, "ms-wbt-server"),
    (Protocol::Tcp, 3690, "svn"),
    (Protocol::Udp, 5060, "sip"),
    (Protocol::Tcp, 5060, "sip"),
    (Protocol::Tcp, 5222, "xmpp-client"),
    (Protocol::Udp, 5353, "mdns"),
    (Protocol::Tcp, 5432, "postgresql"),
    (Protocol::Tcp, 5672, "amqp"),
    (Protocol::Tcp, 5900, "vnc"),
    (Protocol::Tcp, 6379, "redis"),
    (Protocol::Tcp, 6443, "kubernetes-api"),
    (Protocol::Tcp, 6667, "irc"),
    (Protocol::Tcp, 8080, "http-alt"),
    (Protocol::Tcp, 8443, "https-alt"),
    (Protocol::Tcp, 9092, "kafka"),
    (Protocol::Tcp, 9200, "elasticsearch"),
    (Protocol::Tcp, 11211, "memcache"),
    (Protocol::Udp, 11211, "memcache"),
    (Protocol::Tcp, 27017, "mongodb"),
];

/// Immutable mapping from `(protocol, port)` to a service name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceCatalog {
    entries: HashMap<(Protocol, Port), String>,
}

impl ServiceCatalog {
    /// Load a catalog from a CSV file on disk.
    pub fn load(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| CatalogError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let catalog = Self::from_reader(file)?;
        debug!(path = %path.display(), entries = catalog.len(), "loaded service table");
        Ok(catalog)
    }

    /// Build a catalog from `protocol,port,service` CSV rows.
    ///
    /// Rows with fewer than three fields, or with a port that is not a number
    /// in 1-65535, fail the whole load. Rows for protocols other than TCP and
    /// UDP (including a header row) are skipped. When a `(protocol, port)`
    /// pair repeats, the first row wins.
    pub fn from_reader<R: Read>(reader: R) -> CatalogResult<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = HashMap::new();

        for (index, record) in rdr.records().enumerate() {
            let record = record?;
            let line = record
                .position()
                .map_or(index as u64 + 1, |pos| pos.line());

            if record.len() < 3 {
                return Err(CatalogError::MissingFields {
                    line,
                    found: record.len(),
                });
            }

            let Ok(protocol) = record[0].parse::<Protocol>() else {
                trace!(line, protocol = &record[0], "skipping row");
                continue;
            };

            let port: Port = record[1].parse().map_err(|_| CatalogError::InvalidPort {
                line,
                value: record[1].to_string(),
            })?;

            entries
                .entry((protocol, port))
                .or_insert_with(|| record[2].to_string());
        }

        Ok(Self { entries })
    }

    /// The compiled-in table of well-known services.
    pub fn builtin() -> Self {
        let entries = BUILTIN_SERVICES
            .iter()
            .filter_map(|&(protocol, port, name)| {
                Port::new(port).map(|port| ((protocol, port), name.to_string()))
            })
            .collect();

        Self { entries }
    }

    /// Look up the service name for a port, or [`UNKNOWN_SERVICE`].
    pub fn lookup(&self, protocol: Protocol, port: Port) -> &str {
        self.entries
            .get(&(protocol, port))
            .map_or(UNKNOWN_SERVICE, String::as_str)
    }

    /// Number of `(protocol, port)` entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn port(n: u16) -> Port {
        Port::new(n).unwrap()
    }

    #[test]
    fn test_lookup_hit_and_miss() {
        let catalog = ServiceCatalog::from_reader("tcp,80,HTTP\nudp,53,DNS\n".as_bytes()).unwrap();
        assert_eq!(catalog.lookup(Protocol::Tcp, port(80)), "HTTP");
        assert_eq!(catalog.lookup(Protocol::Udp, port(53)), "DNS");
        assert_eq!(catalog.lookup(Protocol::Udp, port(80)), UNKNOWN_SERVICE);
        assert_eq!(catalog.lookup(Protocol::Tcp, port(8081)), UNKNOWN_SERVICE);
    }

    #[test]
    fn test_protocol_is_case_insensitive() {
        let catalog = ServiceCatalog::from_reader("TCP,22,ssh\nUdp,123,ntp\n".as_bytes()).unwrap();
        assert_eq!(catalog.lookup(Protocol::Tcp, port(22)), "ssh");
        assert_eq!(catalog.lookup(Protocol::Udp, port(123)), "ntp");
    }

    #[test]
    fn test_short_row_is_rejected() {
        let result = ServiceCatalog::from_reader("tcp,80,http\ntcp,81\n".as_bytes());
        assert!(matches!(
            result,
            Err(CatalogError::MissingFields { line: 2, found: 2 })
        ));
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let result = ServiceCatalog::from_reader("tcp,eighty,http\n".as_bytes());
        assert!(matches!(result, Err(CatalogError::InvalidPort { .. })));

        let result = ServiceCatalog::from_reader("udp,0,reserved\n".as_bytes());
        assert!(matches!(result, Err(CatalogError::InvalidPort { .. })));
    }

    #[test]
    fn test_header_and_other_protocols_are_skipped() {
        let table = "protocol,port,service\nsctp,9,discard\ntcp,9,discard\n";
        let catalog = ServiceCatalog::from_reader(table.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.lookup(Protocol::Tcp, port(9)), "discard");
    }

    #[test]
    fn test_first_duplicate_wins() {
        let table = "tcp,8080,http-alt\ntcp,8080,http-proxy\n";
        let catalog = ServiceCatalog::from_reader(table.as_bytes()).unwrap();
        assert_eq!(catalog.lookup(Protocol::Tcp, port(8080)), "http-alt");
    }

    #[test]
    fn test_quoted_and_padded_fields() {
        let table = "tcp , 3389 ,\"Remote Desktop, RDP\"\n";
        let catalog = ServiceCatalog::from_reader(table.as_bytes()).unwrap();
        assert_eq!(
            catalog.lookup(Protocol::Tcp, port(3389)),
            "Remote Desktop, RDP"
        );
    }

    #[test]
    fn test_load_missing_file() {
        let result = ServiceCatalog::load("/definitely/not/here/all.csv");
        assert!(matches!(result, Err(CatalogError::Open { .. })));
    }

    #[test]
    fn test_loading_twice_is_identical() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tcp,80,http").unwrap();
        writeln!(file, "udp,161,snmp").unwrap();
        writeln!(file, "tcp,443,https").unwrap();

        let first = ServiceCatalog::load(file.path()).unwrap();
        let second = ServiceCatalog::load(file.path()).unwrap();
        assert_eq!(first, second);
        for (protocol, n) in [(Protocol::Tcp, 80), (Protocol::Udp, 161), (Protocol::Tcp, 443)] {
            assert_eq!(first.lookup(protocol, port(n)), second.lookup(protocol, port(n)));
        }
    }

    #[test]
    fn test_builtin_table() {
        let catalog = ServiceCatalog::builtin();
        assert!(!catalog.is_empty());
        assert_eq!(catalog.lookup(Protocol::Tcp, port(22)), "ssh");
        assert_eq!(catalog.lookup(Protocol::Udp, port(53)), "domain");
        assert_eq!(catalog.lookup(Protocol::Udp, port(22)), UNKNOWN_SERVICE);
    }
}
