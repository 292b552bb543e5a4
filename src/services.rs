//! Service names for well-known ports.
//!
//! `ServiceCatalog` is built once from a static table and then shared
//! read-only (behind an `Arc`) by every probe in a session. The same table
//! doubles as the well-known port list that `--common` unions into a scan.

use crate::types::{Port, PortSet};
use std::collections::HashMap;

/// Label used for ports the catalog does not know.
pub const UNKNOWN_SERVICE: &str = "UNKNOWN";

/// One authoritative name per port. Ports such as 5432 or 9000 that are
/// commonly claimed by several products keep the most widespread owner.
const SERVICE_TABLE: &[(u16, &str)] = &[
    (7, "Echo"),
    (9, "Discard"),
    (13, "Daytime"),
    (19, "Chargen"),
    (20, "FTP-Data"),
    (21, "FTP"),
    (22, "SSH"),
    (23, "Telnet"),
    (25, "SMTP"),
    (37, "Time"),
    (42, "WINS"),
    (43, "WHOIS"),
    (49, "TACACS"),
    (53, "DNS"),
    (67, "DHCP-Server"),
    (68, "DHCP-Client"),
    (69, "TFTP"),
    (70, "Gopher"),
    (79, "Finger"),
    (80, "HTTP"),
    (81, "HTTP-Alt"),
    (88, "Kerberos"),
    (102, "S7comm"),
    (106, "POP3PW"),
    (110, "POP3"),
    (111, "RPCBind"),
    (113, "Ident"),
    (119, "NNTP"),
    (123, "NTP"),
    (135, "MSRPC"),
    (137, "NetBIOS-NS"),
    (138, "NetBIOS-DGM"),
    (139, "NetBIOS-SSN"),
    (143, "IMAP"),
    (161, "SNMP"),
    (162, "SNMP-Trap"),
    (177, "XDMCP"),
    (179, "BGP"),
    (194, "IRC"),
    (199, "SMUX"),
    (389, "LDAP"),
    (427, "SLP"),
    (443, "HTTPS"),
    (444, "SNPP"),
    (445, "SMB"),
    (464, "Kpasswd"),
    (465, "SMTPS"),
    (500, "ISAKMP"),
    (502, "Modbus"),
    (512, "Rexec"),
    (513, "Rlogin"),
    (514, "RSH"),
    (515, "LPD"),
    (520, "RIP"),
    (523, "IBM-DB2"),
    (543, "Klogin"),
    (544, "Kshell"),
    (548, "AFP"),
    (554, "RTSP"),
    (587, "SMTP-Submission"),
    (593, "RPC-HTTP"),
    (623, "IPMI"),
    (631, "IPP"),
    (636, "LDAPS"),
    (646, "LDP"),
    (873, "Rsync"),
    (902, "VMware-Auth"),
    (989, "FTPS-Data"),
    (990, "FTPS"),
    (993, "IMAPS"),
    (995, "POP3S"),
    (1025, "NFS-or-IIS"),
    (1080, "SOCKS"),
    (1194, "OpenVPN"),
    (1352, "Lotus-Notes"),
    (1433, "MSSQL"),
    (1434, "MSSQL-Monitor"),
    (1521, "Oracle"),
    (1604, "Citrix-ICA"),
    (1701, "L2TP"),
    (1723, "PPTP"),
    (1755, "MMS"),
    (1812, "RADIUS"),
    (1813, "RADIUS-Acct"),
    (1883, "MQTT"),
    (1900, "UPnP-SSDP"),
    (2000, "Cisco-SCCP"),
    (2049, "NFS"),
    (2082, "cPanel"),
    (2083, "cPanel-SSL"),
    (2086, "WHM"),
    (2087, "WHM-SSL"),
    (2121, "FTP-Alt"),
    (2181, "ZooKeeper"),
    (2222, "SSH-Alt"),
    (2375, "Docker"),
    (2376, "Docker-TLS"),
    (2379, "etcd"),
    (2483, "Oracle-DB"),
    (3000, "Grafana"),
    (3128, "Squid"),
    (3268, "LDAP-GC"),
    (3269, "LDAP-GC-SSL"),
    (3306, "MySQL"),
    (3389, "RDP"),
    (3690, "SVN"),
    (4369, "EPMD"),
    (4444, "Metasploit"),
    (4505, "Salt"),
    (4848, "GlassFish"),
    (5000, "UPnP"),
    (5060, "SIP"),
    (5061, "SIP-TLS"),
    (5222, "XMPP"),
    (5269, "XMPP-Server"),
    (5353, "mDNS"),
    (5432, "PostgreSQL"),
    (5601, "Kibana"),
    (5632, "PCAnywhere"),
    (5672, "AMQP"),
    (5800, "VNC-HTTP"),
    (5900, "VNC"),
    (5938, "TeamViewer"),
    (5984, "CouchDB"),
    (5985, "WinRM"),
    (5986, "WinRM-HTTPS"),
    (6000, "X11"),
    (6379, "Redis"),
    (6443, "Kubernetes-API"),
    (6667, "IRC-Alt"),
    (7001, "WebLogic"),
    (7077, "Spark"),
    (7474, "Neo4j"),
    (8000, "HTTP-Alt"),
    (8008, "HTTP-Alt"),
    (8009, "AJP13"),
    (8080, "HTTP-Proxy"),
    (8081, "HTTP-Alt"),
    (8086, "InfluxDB"),
    (8088, "Hadoop-YARN"),
    (8161, "ActiveMQ"),
    (8443, "HTTPS-Alt"),
    (8500, "Consul"),
    (8888, "HTTP-Alt"),
    (9000, "PHP-FPM"),
    (9042, "Cassandra"),
    (9090, "Prometheus"),
    (9092, "Kafka"),
    (9100, "JetDirect"),
    (9200, "Elasticsearch"),
    (9300, "Elasticsearch-Cluster"),
    (9418, "Git"),
    (9999, "Abyss"),
    (10000, "Webmin"),
    (11211, "Memcached"),
    (15672, "RabbitMQ-Mgmt"),
    (27017, "MongoDB"),
    (27018, "MongoDB-Shard"),
    (50000, "SAP"),
    (50070, "HDFS-NameNode"),
];

/// Immutable port → service-name lookup.
#[derive(Debug, Clone)]
pub struct ServiceCatalog {
    names: HashMap<u16, &'static str>,
}

impl ServiceCatalog {
    /// Build the catalog from the static table.
    pub fn builtin() -> Self {
        Self {
            names: SERVICE_TABLE.iter().copied().collect(),
        }
    }

    /// Look up the service name for a port, if known.
    pub fn name(&self, port: u16) -> Option<&'static str> {
        self.names.get(&port).copied()
    }

    /// Service name, or [`UNKNOWN_SERVICE`].
    pub fn name_or_unknown(&self, port: u16) -> &'static str {
        self.name(port).unwrap_or(UNKNOWN_SERVICE)
    }

    /// Every port the catalog names; the `--common` scan set.
    pub fn well_known_ports(&self) -> PortSet {
        self.names.keys().filter_map(|&p| Port::new(p)).collect()
    }

    /// All entries sorted by port.
    pub fn entries(&self) -> Vec<(u16, &'static str)> {
        let mut entries: Vec<_> = self.names.iter().map(|(&p, &n)| (p, n)).collect();
        entries.sort_unstable_by_key(|&(p, _)| p);
        entries
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for ServiceCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_common_ports() {
        let catalog = ServiceCatalog::builtin();
        assert_eq!(catalog.name(22), Some("SSH"));
        assert_eq!(catalog.name(80), Some("HTTP"));
        assert_eq!(catalog.name(443), Some("HTTPS"));
        assert_eq!(catalog.name(3306), Some("MySQL"));
        assert_eq!(catalog.name(6379), Some("Redis"));
        assert_eq!(catalog.name(27017), Some("MongoDB"));
    }

    #[test]
    fn test_unknown_port() {
        let catalog = ServiceCatalog::builtin();
        assert_eq!(catalog.name(12345), None);
        assert_eq!(catalog.name_or_unknown(12345), "UNKNOWN");
    }

    #[test]
    fn test_table_has_no_duplicate_ports() {
        let mut seen = HashSet::new();
        for &(port, name) in SERVICE_TABLE {
            assert!(seen.insert(port), "port {port} ({name}) listed twice");
            assert!(port > 0);
            assert!(!name.is_empty());
        }
    }

    #[test]
    fn test_well_known_catalog_size() {
        let catalog = ServiceCatalog::builtin();
        let ports = catalog.well_known_ports();
        assert_eq!(ports.len(), SERVICE_TABLE.len());
        assert!(ports.len() >= 150);
        assert!(ports.contains(Port::new(22).unwrap()));
    }

    #[test]
    fn test_entries_sorted() {
        let entries = ServiceCatalog::builtin().entries();
        assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
    }
}
