use std::future::Future;
use std::pin::Pin;

use tracing::info;
use yup_oauth2::authenticator_delegate::InstalledFlowDelegate;

pub mod google_client {
    use hyper::client::HttpConnector;
    use hyper::Client;
    use hyper_rustls::HttpsConnectorBuilder;

    pub type HttpsConnector = hyper_rustls::HttpsConnector<HttpConnector>;

    pub fn new_https_client() -> Client<HttpsConnector, hyper::Body> {
        let https = HttpsConnectorBuilder::new()
            .with_native_roots()
            .https_or_http()
            .enable_http1()
            .build();
        Client::builder().build::<_, hyper::Body>(https)
    }
}

/// Authenticator produced by both the installed-app and the service-account flows.
/// yup-oauth2 brings its own hyper-rustls, separate from the Drive client's connector.
pub type GoogleAuthenticator = yup_oauth2::authenticator::DefaultAuthenticator;

/// Presents the consent URL on stderr. Stdout carries MCP frames and must stay clean.
pub struct StderrFlowDelegate;

impl InstalledFlowDelegate for StderrFlowDelegate {
    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        need_code: bool,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>> {
        Box::pin(async move {
            if need_code {
                return Err(
                    "interactive code entry is not supported; use the HTTP redirect flow"
                        .to_string(),
                );
            }
            info!("Google consent required, waiting for browser redirect");
            eprintln!(
                "Open this URL in your browser to grant Drive/Docs access:\n\n  {}\n",
                url
            );
            Ok(String::new())
        })
    }
}
