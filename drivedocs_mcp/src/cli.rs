use clap::{Parser, Subcommand};
use std::path::PathBuf;

use drivedocs_core::config::{parse_scopes, AuthSettings};

#[derive(Parser, Debug)]
#[command(name = "drivedocs_mcp")]
#[command(about = "MCP server for Google Drive and Google Docs over stdio")]
#[command(version)]
#[command(after_help = "\x1b[1;36mFirst run:\x1b[0m
  drivedocs_mcp login      Open the Google consent page and cache the token
  drivedocs_mcp            Serve MCP on stdin/stdout

\x1b[1;36mLogging:\x1b[0m
  RUST_LOG=drivedocs_core=debug drivedocs_mcp   Logs go to stderr")]
pub struct Cli {
    /// OAuth client secret JSON downloaded from the Google Cloud console
    #[arg(long, env = "GOOGLE_DRIVE_CREDENTIALS", global = true)]
    pub credentials: Option<PathBuf>,

    /// Where the OAuth token is cached after consent
    #[arg(long, env = "GOOGLE_DRIVE_TOKEN", global = true)]
    pub token_cache: Option<PathBuf>,

    /// Service account key file; takes precedence over the OAuth user flow
    #[arg(long, env = "GOOGLE_SERVICE_ACCOUNT_KEY", global = true)]
    pub service_account_key: Option<PathBuf>,

    /// Comma separated OAuth scopes (default: drive, documents)
    #[arg(long, env = "GOOGLE_DRIVE_SCOPES", global = true)]
    pub scopes: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Serve MCP over stdin/stdout (default)
    Serve,

    /// Run the consent flow now and persist the token cache
    Login,
}

impl Cli {
    pub fn selected_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }

    pub fn auth_settings(&self) -> AuthSettings {
        let scopes = self.scopes.as_deref().map(parse_scopes).unwrap_or_default();
        AuthSettings::resolve(
            self.credentials.clone(),
            self.token_cache.clone(),
            self.service_account_key.clone(),
        )
        .with_scopes(scopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use drivedocs_core::config::{CredentialSource, DEFAULT_SCOPES};

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["drivedocs_mcp"]).unwrap();
        assert_eq!(cli.selected_command(), Commands::Serve);
        let cli = Cli::try_parse_from(["drivedocs_mcp", "login"]).unwrap();
        assert_eq!(cli.selected_command(), Commands::Login);
    }

    #[test]
    fn flags_build_auth_settings() {
        let cli = Cli::try_parse_from([
            "drivedocs_mcp",
            "--credentials",
            "/tmp/client.json",
            "--token-cache",
            "/tmp/token.json",
            "--scopes",
            "https://www.googleapis.com/auth/drive.readonly, https://www.googleapis.com/auth/documents.readonly",
        ])
        .unwrap();
        let settings = cli.auth_settings();
        assert_eq!(
            settings.source,
            CredentialSource::OAuthUser {
                client_secret_path: PathBuf::from("/tmp/client.json"),
                token_cache_path: PathBuf::from("/tmp/token.json"),
            }
        );
        assert_eq!(settings.scopes.len(), 2);
        assert!(settings.scopes[0].ends_with("drive.readonly"));
    }

    #[test]
    fn service_account_flag_selects_key_file() {
        let cli =
            Cli::try_parse_from(["drivedocs_mcp", "serve", "--service-account-key", "sa.json"])
                .unwrap();
        let settings = cli.auth_settings();
        assert_eq!(
            settings.source,
            CredentialSource::ServiceAccount {
                key_path: PathBuf::from("sa.json")
            }
        );
        assert_eq!(settings.scopes.len(), DEFAULT_SCOPES.len());
    }
}
