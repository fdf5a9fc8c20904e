//! proxychains configuration: entry projection and conf rewriting
//!
//! Selected records are projected to `type host port [user pass]` entry
//! lines. The rewrite keeps the rest of the file intact: it drops the
//! stock Tor entry, switches the chain mode to `random_chain` with
//! `chain_len = 1`, disables DNS proxying and appends the entries under
//! `[ProxyList]`.

use crate::error::Result;
use crate::proxy::models::ProxyRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default proxychains configuration file
pub const DEFAULT_CONF_PATH: &str = "/etc/proxychains.conf";

/// The stock configuration routes through a local Tor daemon.
const TOR_DEFAULT_ENTRY: &str = "127.0.0.1 9050";

/// Active directives that get switched off.
static DISABLED_DIRECTIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(strict_chain|dynamic_chain|proxy_dns)\s*$")
        .expect("Invalid directive regex")
});

/// `random_chain`, active or commented out.
static RANDOM_CHAIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*#?\s*random_chain\s*$").expect("Invalid random_chain regex"));

/// `chain_len = N`, active or commented out.
static CHAIN_LEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*#?\s*chain_len\s*=.*$").expect("Invalid chain_len regex"));

static PROXY_LIST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\[ProxyList\]\s*$").expect("Invalid ProxyList regex"));

/// Render one record as a proxychains entry: `type host port [user pass]`.
pub fn conf_line(record: &ProxyRecord) -> String {
    match &record.auth {
        Some(auth) => format!(
            "{} {} {} {} {}",
            record.protocol, record.host, record.port, auth.username, auth.password
        ),
        None => format!("{} {} {}", record.protocol, record.host, record.port),
    }
}

/// Render all records as proxychains entries, preserving order.
pub fn conf_lines(records: &[ProxyRecord]) -> Vec<String> {
    records.iter().map(conf_line).collect()
}

/// Rewrite a proxychains configuration to route through `proxy_lines`.
///
/// Pure text transform: the stock Tor entry is dropped, `strict_chain`,
/// `dynamic_chain` and `proxy_dns` are commented out, `random_chain` and
/// `chain_len = 1` are activated (inserted at the top when the file never
/// mentions them) and the entries go at the end, after `[ProxyList]`.
pub fn rewrite_conf(contents: &str, proxy_lines: &[String]) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut has_random_chain = false;
    let mut has_chain_len = false;
    let mut has_proxy_list = false;

    for line in contents.lines() {
        if line.contains(TOR_DEFAULT_ENTRY) {
            continue;
        }

        if DISABLED_DIRECTIVE_RE.is_match(line) {
            out.push(format!("# {}", line.trim()));
        } else if RANDOM_CHAIN_RE.is_match(line) {
            out.push("random_chain".to_string());
            has_random_chain = true;
        } else if CHAIN_LEN_RE.is_match(line) {
            out.push("chain_len = 1".to_string());
            has_chain_len = true;
        } else {
            if PROXY_LIST_RE.is_match(line) {
                has_proxy_list = true;
            }
            out.push(line.to_string());
        }
    }

    if !has_chain_len {
        out.insert(0, "chain_len = 1".to_string());
    }
    if !has_random_chain {
        out.insert(0, "random_chain".to_string());
    }
    if !has_proxy_list {
        out.push("[ProxyList]".to_string());
    }
    out.extend(proxy_lines.iter().cloned());

    let mut result = out.join("\n");
    result.push('\n');
    result
}

/// The proxychains configuration file plus its backup sibling.
#[derive(Debug, Clone)]
pub struct ProxychainsConf {
    path: PathBuf,
    backup_path: PathBuf,
}

impl ProxychainsConf {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let backup_path = derive_backup_path(&path);
        Self { path, backup_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Copy the configuration aside before touching it.
    pub fn backup(&self) -> Result<()> {
        fs::copy(&self.path, &self.backup_path)?;
        info!(
            "backed up {} to {}",
            self.path.display(),
            self.backup_path.display()
        );
        Ok(())
    }

    /// Rewrite the configuration in place to route through `proxy_lines`.
    pub fn apply(&self, proxy_lines: &[String]) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        fs::write(&self.path, rewrite_conf(&contents, proxy_lines))?;
        info!(
            "added {} proxies to {}",
            proxy_lines.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Put the backed-up configuration back. Missing backups are reported
    /// and ignored.
    pub fn restore(&self) -> Result<()> {
        if !self.backup_path.exists() {
            warn!("no backup found at {}", self.backup_path.display());
            return Ok(());
        }
        fs::copy(&self.backup_path, &self.path)?;
        debug!("restored {} from backup", self.path.display());
        Ok(())
    }
}

/// `<dir>/<stem>_backup.<ext>` next to the configuration file.
fn derive_backup_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("proxychains");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}_backup.{}", stem, ext),
        None => format!("{}_backup", stem),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::models::Protocol;

    const STOCK_CONF: &str = "\
# proxychains.conf  VER 3.1
strict_chain
#dynamic_chain
#random_chain
proxy_dns
#chain_len = 2
tcp_read_time_out 15000
[ProxyList]
socks4  127.0.0.1 9050
";

    #[test]
    fn test_conf_line_without_auth() {
        let record = ProxyRecord::new(Protocol::Socks5, "1.2.3.4".to_string(), 1080);
        assert_eq!(conf_line(&record), "socks5 1.2.3.4 1080");
    }

    #[test]
    fn test_conf_line_with_auth() {
        let record = ProxyRecord::new(Protocol::Http, "1.2.3.4".to_string(), 8080)
            .with_auth("user".to_string(), "pass".to_string());
        assert_eq!(conf_line(&record), "http 1.2.3.4 8080 user pass");
    }

    #[test]
    fn test_conf_lines_preserve_order() {
        let records = vec![
            ProxyRecord::new(Protocol::Http, "1.1.1.1".to_string(), 80),
            ProxyRecord::new(Protocol::Socks4, "2.2.2.2".to_string(), 1080),
        ];
        assert_eq!(
            conf_lines(&records),
            vec!["http 1.1.1.1 80", "socks4 2.2.2.2 1080"]
        );
    }

    #[test]
    fn test_rewrite_replaces_tor_routing() {
        let lines = vec!["http 5.6.7.8 3128".to_string()];
        let rewritten = rewrite_conf(STOCK_CONF, &lines);

        assert!(!rewritten.contains(TOR_DEFAULT_ENTRY));
        assert!(rewritten.contains("# strict_chain"));
        assert!(rewritten.contains("# proxy_dns"));
        assert!(rewritten.contains("\nrandom_chain\n"));
        assert!(rewritten.contains("\nchain_len = 1\n"));
        assert!(rewritten.ends_with("http 5.6.7.8 3128\n"));
        // Unrelated lines survive untouched.
        assert!(rewritten.contains("tcp_read_time_out 15000"));
    }

    #[test]
    fn test_rewrite_keeps_commented_modes_commented() {
        let rewritten = rewrite_conf(STOCK_CONF, &[]);
        assert!(rewritten.contains("#dynamic_chain"));
        assert!(!rewritten.contains("\ndynamic_chain\n"));
    }

    #[test]
    fn test_rewrite_inserts_missing_directives() {
        let lines = vec!["socks5 9.9.9.9 1080".to_string()];
        let rewritten = rewrite_conf("", &lines);

        let expected = "random_chain\nchain_len = 1\n[ProxyList]\nsocks5 9.9.9.9 1080\n";
        assert_eq!(rewritten, expected);
    }

    #[test]
    fn test_backup_path_derivation() {
        let conf = ProxychainsConf::new("/etc/proxychains.conf");
        assert_eq!(
            conf.backup_path(),
            Path::new("/etc/proxychains_backup.conf")
        );

        let conf = ProxychainsConf::new("/tmp/chains");
        assert_eq!(conf.backup_path(), Path::new("/tmp/chains_backup"));
    }

    fn temp_conf(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("geoprox_conf_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_backup_apply_restore_round_trip() {
        let path = temp_conf("roundtrip.conf");
        fs::write(&path, STOCK_CONF).unwrap();
        let conf = ProxychainsConf::new(&path);

        conf.backup().unwrap();
        conf.apply(&["http 5.6.7.8 3128".to_string()]).unwrap();

        let applied = fs::read_to_string(&path).unwrap();
        assert!(applied.contains("http 5.6.7.8 3128"));
        assert!(!applied.contains(TOR_DEFAULT_ENTRY));

        conf.restore().unwrap();
        let restored = fs::read_to_string(&path).unwrap();
        assert_eq!(restored, STOCK_CONF);

        fs::remove_file(&path).unwrap();
        fs::remove_file(conf.backup_path()).unwrap();
    }

    #[test]
    fn test_restore_without_backup_is_not_an_error() {
        let conf = ProxychainsConf::new(temp_conf("nobackup.conf"));
        assert!(conf.restore().is_ok());
    }

    #[test]
    fn test_apply_on_missing_file_fails() {
        let conf = ProxychainsConf::new(temp_conf("missing.conf"));
        assert!(conf.apply(&[]).is_err());
    }
}
