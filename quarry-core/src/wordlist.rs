// Wordlists for brute-force probing

use quarry_scanner::error::{Result, ScanError};
use std::fs;
use std::path::Path;

const COMMON: &str = include_str!("../wordlists/common.txt");
const API: &str = include_str!("../wordlists/api.txt");
const ADMIN: &str = include_str!("../wordlists/admin.txt");
const AUTH: &str = include_str!("../wordlists/auth.txt");

/// Wordlists bundled with the binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinWordlist {
    Common,
    Api,
    Admin,
    Auth,
}

impl BuiltinWordlist {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "common" | "default" => Some(BuiltinWordlist::Common),
            "api" => Some(BuiltinWordlist::Api),
            "admin" => Some(BuiltinWordlist::Admin),
            "auth" => Some(BuiltinWordlist::Auth),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BuiltinWordlist::Common => "common",
            BuiltinWordlist::Api => "api",
            BuiltinWordlist::Admin => "admin",
            BuiltinWordlist::Auth => "auth",
        }
    }

    pub fn words(&self) -> Vec<String> {
        let content = match self {
            BuiltinWordlist::Common => COMMON,
            BuiltinWordlist::Api => API,
            BuiltinWordlist::Admin => ADMIN,
            BuiltinWordlist::Auth => AUTH,
        };
        parse_wordlist(content)
    }
}

/// The wordlist `Scanner::scan` probes
pub fn default_wordlist() -> Vec<String> {
    BuiltinWordlist::Common.words()
}

/// One path per line; blank lines and `#` comments are skipped
pub fn parse_wordlist(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

/// Load wordlist from file
pub fn load_wordlist(path: &Path) -> Result<Vec<String>> {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let content = fs::read_to_string(&expanded)?;

    let words = parse_wordlist(&content);
    if words.is_empty() {
        return Err(ScanError::InvalidConfig(format!(
            "wordlist {} is empty or contains only comments",
            path.display()
        )));
    }

    Ok(words)
}
