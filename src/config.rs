use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use colored::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::DEFAULT_OUTPUT_DIR;

/// How files are laid out under each course folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// `<course>/<category>/<file>`
    #[default]
    Categorized,
    /// `<course>/<section>/<file>`
    Sections,
}

/// Everything a sync run needs, resolved up front
#[derive(Debug, Clone)]
pub struct Settings {
    /// Moodle base URL without trailing slash
    pub base_url: String,
    pub token: String,
    pub ignored_courses: Vec<String>,
    pub output_dir: PathBuf,
    pub layout: Layout,
    pub dry_run: bool,
}

impl Settings {
    /// Build settings from explicit values, falling back to stored credentials.
    ///
    /// Fails before any network activity when the URL or token is missing.
    pub fn resolve(
        base_url: Option<&str>,
        token: Option<&str>,
        stored: Option<&StoredCredentials>,
    ) -> Result<Self, ConfigError> {
        let base_url = non_empty(base_url)
            .or_else(|| stored.and_then(|s| non_empty(Some(s.base_url.as_str()))))
            .ok_or(ConfigError::MissingBaseUrl)?;
        let base_url = normalize_base_url(&base_url)?;

        let token = non_empty(token)
            .or_else(|| {
                stored
                    .filter(|s| s.matches_site(&base_url))
                    .and_then(|s| non_empty(Some(s.token.as_str())))
            })
            .ok_or(ConfigError::MissingToken)?;

        Ok(Self {
            base_url,
            token,
            ignored_courses: Vec::new(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            layout: Layout::default(),
            dry_run: false,
        })
    }

    pub fn with_ignored(mut self, ignored: Vec<String>) -> Self {
        self.ignored_courses = ignored;
        self
    }

    pub fn with_output_dir(mut self, output_dir: PathBuf) -> Self {
        self.output_dir = output_dir;
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Substring match against the raw course fullname
    pub fn is_ignored(&self, course_name: &str) -> bool {
        self.ignored_courses
            .iter()
            .any(|ignored| course_name.contains(ignored.as_str()))
    }
}

/// Split a comma-separated ignore list, dropping blank entries
pub fn parse_ignore_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Trim whitespace and trailing slashes, and check the URL parses
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/').to_string();
    url::Url::parse(&trimmed).map_err(|source| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        source,
    })?;
    Ok(trimmed)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// What the credential store keeps on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub base_url: String,
    pub token: String,
    #[serde(default)]
    pub username: Option<String>,
    pub saved_at: String,
    #[serde(default)]
    pub last_sync: Option<String>,
}

impl StoredCredentials {
    pub fn new(base_url: &str, token: &str, username: Option<String>) -> Self {
        Self {
            base_url: base_url.to_string(),
            token: token.to_string(),
            username,
            saved_at: Utc::now().to_rfc3339(),
            last_sync: None,
        }
    }

    /// A token is only reused for the site it was issued by
    pub fn matches_site(&self, base_url: &str) -> bool {
        self.base_url.trim_end_matches('/') == base_url.trim_end_matches('/')
    }

    pub fn mark_synced(&mut self) {
        self.last_sync = Some(Utc::now().to_rfc3339());
    }
}

/// JSON file holding the last issued token
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// `~/.moodle-sync.json`
    pub fn default_location() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(Self::at(home.join(".moodle-sync.json")))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self) -> PathBuf {
        self.path.with_extension("json.backup")
    }

    /// Load stored credentials; `None` when nothing was saved yet
    pub fn load(&self) -> Result<Option<StoredCredentials>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no stored credentials");
            return Ok(None);
        }

        let data = fs::read_to_string(&self.path).context("Failed to read credentials file")?;

        match serde_json::from_str(&data) {
            Ok(credentials) => Ok(Some(credentials)),
            Err(e) => {
                warn!(error = %e, "credentials file corrupted");
                eprintln!("{} Credentials file corrupted, trying backup...", "⚠️".yellow());
                if let Ok(backup) = self.load_backup() {
                    eprintln!("{} Restored from backup", "✅".green());
                    return Ok(Some(backup));
                }
                Err(e).context("Failed to parse credentials file")
            }
        }
    }

    fn load_backup(&self) -> Result<StoredCredentials> {
        let backup_path = self.backup_path();
        if backup_path.exists() {
            let data =
                fs::read_to_string(&backup_path).context("Failed to read backup file")?;
            serde_json::from_str(&data).context("Failed to parse backup file")
        } else {
            Err(anyhow::anyhow!("No backup file found"))
        }
    }

    /// Save credentials, keeping the previous file as a backup
    pub fn save(&self, credentials: &StoredCredentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).context("Failed to create credentials directory")?;
            }
        }

        if self.path.exists() {
            fs::copy(&self.path, self.backup_path()).context("Failed to create backup")?;
        }

        // Write to temp file first, then rename into place
        let temp_path = self.path.with_extension("json.tmp");
        let data =
            serde_json::to_string_pretty(credentials).context("Failed to serialize credentials")?;
        fs::write(&temp_path, &data).context("Failed to write temp credentials")?;
        fs::rename(&temp_path, &self.path).context("Failed to finalize credentials")?;

        debug!(path = %self.path.display(), "credentials saved");
        Ok(())
    }

    /// Stamp `last_sync` on the stored entry, if there is one for this site
    pub fn record_sync(&self, base_url: &str) -> Result<()> {
        if let Some(mut credentials) = self.load()? {
            if credentials.matches_site(base_url) {
                credentials.mark_synced();
                self.save(&credentials)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stored(url: &str, token: &str) -> StoredCredentials {
        StoredCredentials::new(url, token, Some("student".to_string()))
    }

    #[test]
    fn explicit_values_win() {
        let saved = stored("https://moodle.example.org", "saved-token");
        let settings =
            Settings::resolve(Some("https://moodle.example.org/"), Some("abc"), Some(&saved))
                .unwrap();
        assert_eq!(settings.base_url, "https://moodle.example.org");
        assert_eq!(settings.token, "abc");
        assert_eq!(settings.output_dir, PathBuf::from("materials"));
        assert_eq!(settings.layout, Layout::Categorized);
    }

    #[test]
    fn falls_back_to_stored_credentials() {
        let saved = stored("https://moodle.example.org", "saved-token");
        let settings = Settings::resolve(None, None, Some(&saved)).unwrap();
        assert_eq!(settings.base_url, "https://moodle.example.org");
        assert_eq!(settings.token, "saved-token");
    }

    #[test]
    fn stored_token_is_not_reused_for_another_site() {
        let saved = stored("https://other.example.org", "saved-token");
        let err = Settings::resolve(Some("https://moodle.example.org"), None, Some(&saved))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingToken));
    }

    #[test]
    fn missing_values_are_config_errors() {
        assert!(matches!(
            Settings::resolve(None, Some("abc"), None),
            Err(ConfigError::MissingBaseUrl)
        ));
        assert!(matches!(
            Settings::resolve(Some("https://moodle.example.org"), Some("  "), None),
            Err(ConfigError::MissingToken)
        ));
        assert!(matches!(
            Settings::resolve(Some("not a url"), Some("abc"), None),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn ignore_list_parsing_and_matching() {
        let ignored = parse_ignore_list(" Tutoria, ,Erasmus ,");
        assert_eq!(ignored, vec!["Tutoria".to_string(), "Erasmus".to_string()]);

        let settings = Settings::resolve(Some("https://m.example.org"), Some("t"), None)
            .unwrap()
            .with_ignored(ignored);
        assert!(settings.is_ignored("DEE - Tutoria 2025"));
        assert!(!settings.is_ignored("DEE - tutoria 2025"));
        assert!(!settings.is_ignored("Álgebra"));
    }

    #[test]
    fn store_round_trip_keeps_backup() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::at(dir.path().join("creds.json"));
        assert!(store.load().unwrap().is_none());

        store.save(&stored("https://a.example.org", "one")).unwrap();
        store.save(&stored("https://a.example.org", "two")).unwrap();

        assert_eq!(store.load().unwrap().unwrap().token, "two");
        assert!(dir.path().join("creds.json.backup").exists());
        assert!(!dir.path().join("creds.json.tmp").exists());
    }

    #[test]
    fn corrupted_store_restores_from_backup() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::at(dir.path().join("creds.json"));
        store.save(&stored("https://a.example.org", "one")).unwrap();
        store.save(&stored("https://a.example.org", "two")).unwrap();

        fs::write(store.path(), "{ not json").unwrap();
        assert_eq!(store.load().unwrap().unwrap().token, "one");
    }

    #[test]
    fn record_sync_stamps_matching_site_only() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::at(dir.path().join("creds.json"));
        store.save(&stored("https://a.example.org", "one")).unwrap();

        store.record_sync("https://b.example.org").unwrap();
        assert!(store.load().unwrap().unwrap().last_sync.is_none());

        store.record_sync("https://a.example.org/").unwrap();
        assert!(store.load().unwrap().unwrap().last_sync.is_some());
    }
}
