//! Well-known port to service name table.
//!
//! Used as a fallback when the external scanner reports an open port without
//! naming the service behind it.

use crate::types::Port;

/// Sorted by port so lookups can binary search.
const WELL_KNOWN: &[(u16, &str)] = &[
    (20, "ftp-data"),
    (21, "ftp"),
    (22, "ssh"),
    (23, "telnet"),
    (25, "smtp"),
    (53, "domain"),
    (69, "tftp"),
    (80, "http"),
    (88, "kerberos"),
    (110, "pop3"),
    (111, "rpcbind"),
    (123, "ntp"),
    (135, "msrpc"),
    (139, "netbios-ssn"),
    (143, "imap"),
    (161, "snmp"),
    (389, "ldap"),
    (443, "https"),
    (445, "microsoft-ds"),
    (465, "smtps"),
    (514, "syslog"),
    (587, "submission"),
    (631, "ipp"),
    (636, "ldaps"),
    (873, "rsync"),
    (993, "imaps"),
    (995, "pop3s"),
    (1080, "socks"),
    (1433, "ms-sql-s"),
    (1521, "oracle"),
    (1723, "pptp"),
    (1883, "mqtt"),
    (2049, "nfs"),
    (2375, "docker"),
    (2376, "docker-tls"),
    (3000, "ppp"),
    (3128, "squid-http"),
    (3306, "mysql"),
    (3389, "ms-wbt-server"),
    (5432, "postgresql"),
    (5672, "amqp"),
    (5900, "vnc"),
    (5984, "couchdb"),
    (6379, "redis"),
    (6443, "kubernetes-api"),
    (8000, "http-alt"),
    (8080, "http-proxy"),
    (8443, "https-alt"),
    (8888, "sun-answerbook"),
    (9000, "cslistener"),
    (9090, "zeus-admin"),
    (9200, "elasticsearch"),
    (9443, "tungsten-https"),
    (11211, "memcache"),
    (27017, "mongod"),
];

/// Probable service name for a port, if it is well known.
pub fn service_name(port: Port) -> Option<&'static str> {
    WELL_KNOWN
        .binary_search_by_key(&port.as_u16(), |&(p, _)| p)
        .ok()
        .map(|idx| WELL_KNOWN[idx].1)
}

/// Service name for display, `"unknown"` when the port is not recognized.
pub fn service_or_unknown(port: Port) -> &'static str {
    service_name(port).unwrap_or("unknown")
}
