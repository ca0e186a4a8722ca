use std::collections::HashMap;
use regex::Regex;

/// Static detection configuration: three independent tables mapping a
/// protocol tag to the evidence that places it on a port. Built once at
/// startup and passed by reference into the parser.
pub struct RuleSet {
    port_map: HashMap<&'static str, Vec<u16>>,
    service_map: HashMap<&'static str, Vec<&'static str>>,
    version_map: HashMap<&'static str, Vec<Regex>>,
}

impl RuleSet {
    pub fn new() -> Self {
        let mut rules = Self {
            port_map: HashMap::new(),
            service_map: HashMap::new(),
            version_map: HashMap::new(),
        };
        rules.load_port_rules();
        rules.load_service_rules();
        rules.load_version_rules();
        rules
    }

    fn load_port_rules(&mut self) {
        self.port_map.insert("winrm", vec![5985, 5986]);
        self.port_map.insert("rdp", vec![3389]);
        self.port_map.insert("smb", vec![445]);
        self.port_map.insert("ftp", vec![21]);
        self.port_map.insert("nfs", vec![2049]);
        self.port_map.insert("wmi", vec![135]);
    }

    fn load_service_rules(&mut self) {
        self.service_map.insert("mssql", vec!["ms-sql-s"]);
        self.service_map.insert("ldap", vec!["ldap"]);
        self.service_map.insert("smb", vec!["microsoft-ds", "microsoft-ds?"]);
        self.service_map.insert("rdp", vec!["ms-wbt-server"]);
        self.service_map.insert("ftp", vec!["ftp"]);
        self.service_map.insert("vnc", vec!["vnc"]);
        self.service_map.insert("nfs", vec!["nfs"]);
        self.service_map.insert("wmi", vec!["wmi", "wmic"]);
    }

    fn load_version_rules(&mut self) {
        // Nmap's VERSION column often identifies the product even when the
        // service token is generic (e.g. WinRM reported as plain "http").
        self.add_version_rule("winrm", r"(?i)microsoft httpapi");
        self.add_version_rule("mssql", r"(?i)microsoft sql server");
        self.add_version_rule("rdp", r"(?i)microsoft terminal services");
        self.add_version_rule("smb", r"(?i)samba smbd");
        self.add_version_rule("ldap", r"(?i)active directory ldap");
        self.add_version_rule("ftp", r"(?i)microsoft ftpd");
        self.add_version_rule("ftp", r"(?i)vsftpd");
    }

    fn add_version_rule(&mut self, proto: &'static str, pattern: &str) {
        let re = Regex::new(pattern).expect("invalid built-in version pattern");
        self.version_map.entry(proto).or_insert_with(Vec::new).push(re);
    }

    /// Protocols whose well-known port table contains `port`.
    pub fn protocols_for_port(&self, port: u16) -> impl Iterator<Item = &'static str> + '_ {
        self.port_map
            .iter()
            .filter(move |(_, ports)| ports.contains(&port))
            .map(|(proto, _)| *proto)
    }

    /// Protocols whose service table contains `service` exactly, case-sensitive
    /// as Nmap emits it.
    pub fn protocols_for_service<'a>(
        &'a self,
        service: &'a str,
    ) -> impl Iterator<Item = &'static str> + 'a {
        self.service_map
            .iter()
            .filter(move |(_, names)| names.iter().any(|name| *name == service))
            .map(|(proto, _)| *proto)
    }

    /// Protocols with a version fingerprint matching anywhere in `banner`.
    pub fn protocols_for_banner<'a>(
        &'a self,
        banner: &'a str,
    ) -> impl Iterator<Item = &'static str> + 'a {
        self.version_map
            .iter()
            .filter(move |(_, patterns)| patterns.iter().any(|re| re.is_match(banner)))
            .map(|(proto, _)| *proto)
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}
