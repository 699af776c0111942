//! `.env`-style secret store
//!
//! One `NAME=value` line per secret. Rotation rewrites only the line it owns
//! and leaves every other line, comments included, byte-for-byte intact.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use auditvault_common::SecureString;
use auditvault_core::SecretStore;
use auditvault_domain::{KeyType, Result};
use tracing::debug;
use zeroize::Zeroizing;

use super::atomic::{blocking, write_atomic};

/// [`SecretStore`] backed by a `NAME=value` file.
#[derive(Debug, Clone)]
pub struct EnvFileSecretStore {
    path: PathBuf,
    env_fallback: bool,
}

impl EnvFileSecretStore {
    /// Store at `path`. Secrets absent from the file are looked up in the
    /// process environment.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), env_fallback: true }
    }

    /// Only consult the file.
    pub fn without_env_fallback(mut self) -> Self {
        self.env_fallback = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SecretStore for EnvFileSecretStore {
    async fn read(&self, key_type: KeyType) -> Result<Option<SecureString>> {
        let path = self.path.clone();
        let env_fallback = self.env_fallback;
        let name = key_type.env_name();

        blocking(move || {
            let from_file = match fs::read_to_string(&path) {
                Ok(contents) => {
                    let contents = Zeroizing::new(contents);
                    find_value(&contents, name)
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
                Err(err) => return Err(err.into()),
            };

            let value = match from_file {
                Some(value) => Some(value),
                None if env_fallback => std::env::var(name).ok().filter(|v| !v.is_empty()),
                None => None,
            };
            Ok(value.map(SecureString::new))
        })
        .await
    }

    async fn write(&self, key_type: KeyType, value: &SecureString) -> Result<()> {
        let path = self.path.clone();
        let name = key_type.env_name();
        let value = value.clone();

        blocking(move || {
            let existing = match fs::read_to_string(&path) {
                Ok(contents) => Zeroizing::new(contents),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    Zeroizing::new(String::new())
                }
                Err(err) => return Err(err.into()),
            };

            let updated = Zeroizing::new(upsert_line(&existing, name, value.expose()));
            write_atomic(&path, updated.as_bytes(), None)?;
            debug!(name, path = %path.display(), "secret_store.line_written");
            Ok(())
        })
        .await
    }

    async fn snapshot(&self) -> Result<Option<Zeroizing<Vec<u8>>>> {
        let path = self.path.clone();
        blocking(move || match fs::read(&path) {
            Ok(bytes) => Ok(Some(Zeroizing::new(bytes))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        })
        .await
    }
}

/// Value of the first `name=` line, with surrounding quotes removed.
fn find_value(contents: &str, name: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            return None;
        }
        let rest = trimmed.strip_prefix(name)?.strip_prefix('=')?;
        Some(strip_quotes(rest.trim()).to_string())
    })
}

fn strip_quotes(value: &str) -> &str {
    value.trim_matches(|c| c == '"' || c == '\'')
}

fn is_line_for(line: &str, name: &str) -> bool {
    line.trim().strip_prefix(name).is_some_and(|rest| rest.starts_with('='))
}

/// Replace the first `name=` line, or append one.
fn upsert_line(contents: &str, name: &str, value: &str) -> String {
    let replacement = format!("{name}={value}");
    let mut replaced = false;
    let mut out = String::with_capacity(contents.len() + replacement.len() + 1);

    for segment in contents.split_inclusive('\n') {
        let (line, ending) = match segment.strip_suffix("\r\n") {
            Some(line) => (line, "\r\n"),
            None => match segment.strip_suffix('\n') {
                Some(line) => (line, "\n"),
                None => (segment, ""),
            },
        };

        if !replaced && is_line_for(line, name) {
            out.push_str(&replacement);
            replaced = true;
        } else {
            out.push_str(line);
        }
        out.push_str(ending);
    }

    if !replaced {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&replacement);
        out.push('\n');
    }
    out
}
