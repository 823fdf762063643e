use std::path::{Path, PathBuf};

pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
pub const DOCUMENTS_SCOPE: &str = "https://www.googleapis.com/auth/documents";
pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";
pub const DOCUMENTS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/documents.readonly";

/// Scopes requested when none are configured. Both tool sets run under these.
pub const DEFAULT_SCOPES: &[&str] = &[DRIVE_SCOPE, DOCUMENTS_SCOPE];

const CONFIG_DIR_NAME: &str = "drivedocs";

/// Where credential material comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Installed-app OAuth flow. The client secret is the JSON downloaded from the
    /// Google Cloud console; the token cache is written after the first consent.
    OAuthUser {
        client_secret_path: PathBuf,
        token_cache_path: PathBuf,
    },
    /// Static service-account key file.
    ServiceAccount { key_path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub source: CredentialSource,
    pub scopes: Vec<String>,
}

impl AuthSettings {
    pub fn new(source: CredentialSource) -> Self {
        Self {
            source,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the requested scopes. An empty list keeps the defaults.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        if !scopes.is_empty() {
            self.scopes = scopes;
        }
        self
    }

    /// Build settings from optional overrides. A service-account key wins over the
    /// OAuth user flow; missing OAuth paths fall back to the per-user config dir.
    pub fn resolve(
        credentials: Option<PathBuf>,
        token_cache: Option<PathBuf>,
        service_account_key: Option<PathBuf>,
    ) -> Self {
        let source = match service_account_key {
            Some(key_path) => CredentialSource::ServiceAccount { key_path },
            None => CredentialSource::OAuthUser {
                client_secret_path: credentials.unwrap_or_else(default_client_secret_path),
                token_cache_path: token_cache.unwrap_or_else(default_token_cache_path),
            },
        };
        Self::new(source)
    }

    pub fn describe_source(&self) -> String {
        match &self.source {
            CredentialSource::OAuthUser {
                client_secret_path,
                token_cache_path,
            } => format!(
                "oauth user (client secret {}, token cache {})",
                client_secret_path.display(),
                token_cache_path.display()
            ),
            CredentialSource::ServiceAccount { key_path } => {
                format!("service account ({})", key_path.display())
            }
        }
    }
}

/// `~/.config/drivedocs` on Unix, `%APPDATA%/drivedocs` on Windows.
pub fn default_config_dir() -> PathBuf {
    let base = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|p| p.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join(CONFIG_DIR_NAME)
}

pub fn default_client_secret_path() -> PathBuf {
    default_config_dir().join("credentials.json")
}

pub fn default_token_cache_path() -> PathBuf {
    default_config_dir().join("token.json")
}

/// Split a scope list on commas and whitespace.
pub fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Create the parent directory of a token cache so the OAuth flow can persist into it.
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_account_key_takes_precedence() {
        let settings = AuthSettings::resolve(
            Some(PathBuf::from("client.json")),
            None,
            Some(PathBuf::from("sa.json")),
        );
        assert_eq!(
            settings.source,
            CredentialSource::ServiceAccount {
                key_path: PathBuf::from("sa.json")
            }
        );
        assert_eq!(settings.scopes.len(), 2);
    }

    #[test]
    fn oauth_paths_fall_back_to_config_dir() {
        let settings = AuthSettings::resolve(Some(PathBuf::from("client.json")), None, None);
        match settings.source {
            CredentialSource::OAuthUser {
                client_secret_path,
                token_cache_path,
            } => {
                assert_eq!(client_secret_path, PathBuf::from("client.json"));
                assert!(token_cache_path.ends_with("drivedocs/token.json"));
            }
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn scopes_split_on_commas_and_spaces() {
        let scopes = parse_scopes(" a, b  c,,\td ");
        assert_eq!(scopes, vec!["a", "b", "c", "d"]);

        let settings = AuthSettings::resolve(None, None, None).with_scopes(Vec::new());
        assert_eq!(settings.scopes, vec![DRIVE_SCOPE, DOCUMENTS_SCOPE]);
    }

    #[test]
    fn ensure_parent_dir_creates_nested_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a").join("b").join("token.json");
        ensure_parent_dir(&path).unwrap();
        assert!(tmp.path().join("a").join("b").is_dir());
    }
}
