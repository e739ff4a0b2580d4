//! Wordlists for hidden-path discovery.
//!
//! The built-in list is materialized once per process and shared read-only
//! by every path worker.

use crate::error::{ModuleError, ModuleResult};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

const DEFAULT_ENTRIES: &[&str] = &[
    "admin", "administrator", "login", "wp-admin", "wp-login", "dashboard",
    "backup", "backups", "config", "configuration", "conf", "settings",
    "api", "v1", "v2", "test", "testing", "dev", "development", "staging",
    "phpmyadmin", "mysql", "database", "db", "sql", "phpinfo", "info",
    "logs", "log", "error", "errors", "debug", "tmp", "temp", "cache",
    "assets", "static", "public", "private", "secure", "secure_files",
    "uploads", "upload", "files", "file", "images", "img", "media",
    "download", "downloads", "documents", "docs", "documentation",
    "old", "old_files", "archive", "archives", "www", "wwwroot",
    "includes", "include", "includes_files", "lib", "libs", "library",
    "scripts", "script", "js", "css", "styles", "style",
    "robots.txt", "sitemap.xml", ".git", ".svn", ".env", ".htaccess",
    "web.config", "crossdomain.xml", "clientaccesspolicy.xml",
    "readme", "readme.txt", "license", "changelog", "changelog.txt",
    "install", "install.php", "setup", "setup.php", "upgrade",
    "search", "search.php", "index.php.bak", "index.html.bak",
    "admin.php", "admin.html", "admin/index", "admin/login",
    "manager", "management", "control", "controlpanel", "panel",
];

static DEFAULT_WORDLIST: OnceLock<Arc<[String]>> = OnceLock::new();

/// The built-in wordlist, in its fixed order.
pub fn default_wordlist() -> Arc<[String]> {
    DEFAULT_WORDLIST
        .get_or_init(|| DEFAULT_ENTRIES.iter().map(|s| s.to_string()).collect())
        .clone()
}

/// Load a wordlist file: one entry per line, blank lines skipped.
pub async fn load(path: &Path) -> ModuleResult<Arc<[String]>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ModuleError::WordlistLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let entries: Arc<[String]> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();

    if entries.is_empty() {
        return Err(ModuleError::WordlistLoad {
            path: path.to_path_buf(),
            reason: "wordlist contains no entries".to_string(),
        });
    }

    tracing::debug!(path = %path.display(), entries = entries.len(), "loaded wordlist");
    Ok(entries)
}

/// Where the path prober takes its entries from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WordlistSource {
    #[default]
    Default,
    File(PathBuf),
}

impl WordlistSource {
    pub async fn load(&self) -> ModuleResult<Arc<[String]>> {
        match self {
            Self::Default => Ok(default_wordlist()),
            Self::File(path) => load(path).await,
        }
    }
}
