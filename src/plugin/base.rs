//! Fallback retrieval plugin for plain HTTP(S) links.
//!
//! Used when no site-specific plugin matched a URL. Fetches the link
//! directly, handles auth challenges through the [`AuthProvider`], and runs
//! the post-download integrity classifier before persisting the body.

use crate::auth::{AuthProvider, Credentials};
use crate::config::Config;
use crate::file::DownloadFile;
use crate::plugin::{PluginFailure, PluginResult, RetrievalPlugin, classify_download};
use crate::utils::{capitalize, name_from_url};

use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// Generic HTTP retrieval plugin
pub struct BasePlugin {
    client: reqwest::Client,
    auth: Arc<dyn AuthProvider>,
    config: Arc<Config>,
}

impl BasePlugin {
    /// Create the plugin with the pool configuration and an account store
    pub fn new(config: Arc<Config>, auth: Arc<dyn AuthProvider>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.retrieval.request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            auth,
            config,
        }
    }

    async fn fetch_once(
        &self,
        file: &DownloadFile,
        creds: Option<&Credentials>,
    ) -> Result<reqwest::Response, PluginFailure> {
        let mut request = self.client.get(file.url());
        if let Some(c) = creds {
            request = request.basic_auth(&c.username, Some(&c.password));
        }
        request.send().await.map_err(|e| transport_failure(&e))
    }
}

#[async_trait]
impl RetrievalPlugin for BasePlugin {
    fn name(&self) -> &str {
        "base"
    }

    async fn preprocess(&self, file: &DownloadFile) -> PluginResult {
        file.set_name(name_from_url(file.url()));

        if !file.url().starts_with("http") {
            return Err(PluginFailure::fail("No plugin matched"));
        }

        let host = Url::parse(file.url())
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();

        let mut creds: Option<Credentials> = None;

        for _attempt in 0..self.config.retrieval.max_attempts {
            if file.abort_requested() {
                return Err(PluginFailure::Abort);
            }

            let response = self.fetch_once(file, creds.as_ref()).await?;
            let status = response.status();

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(PluginFailure::offline());
            }

            if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                if creds.is_none() {
                    if let Some(found) = self.auth.credentials(&host).await {
                        tracing::debug!(host = %host, code = status.as_u16(), "auth required, retrying with stored credentials");
                        creds = Some(found);
                        continue;
                    }
                }
                return Err(PluginFailure::fail("Authorization required"));
            }

            if !status.is_success() {
                return Err(PluginFailure::fail(format!(
                    "HTTP error {}",
                    status.as_u16()
                )));
            }

            let body = response.bytes().await.map_err(|e| transport_failure(&e))?;

            if let Some(kind) = classify_download(&body) {
                return Err(PluginFailure::fail(capitalize(kind)));
            }

            let dir = self.config.download_dir();
            let path = dir.join(file.name());
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| PluginFailure::Other(format!("cannot create download dir: {e}")))?;
            tokio::fs::write(&path, &body)
                .await
                .map_err(|e| PluginFailure::Other(format!("cannot write {}: {e}", path.display())))?;

            tracing::debug!(name = %file.name(), bytes = body.len(), "stored download");
            return Ok(());
        }

        Err(PluginFailure::fail("No file downloaded"))
    }
}

fn transport_failure(e: &reqwest::Error) -> PluginFailure {
    // curl-compatible code classes: 7 = couldn't connect, 28 = timeout
    let code = if e.is_timeout() {
        28
    } else if e.is_connect() {
        7
    } else {
        0
    };
    PluginFailure::Transport {
        code,
        message: e.to_string(),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::NoAuth;
    use crate::types::{FileId, PackageId};

    #[tokio::test]
    async fn unrecognized_scheme_fails_without_network() {
        let plugin = BasePlugin::new(Arc::new(Config::default()), Arc::new(NoAuth));
        let file = DownloadFile::new(FileId(1), PackageId(1), "ftp://example.com/file.bin");

        let result = plugin.preprocess(&file).await;
        assert_eq!(
            result,
            Err(PluginFailure::Fail("No plugin matched".to_string()))
        );
    }

    #[tokio::test]
    async fn preprocess_sets_name_from_url() {
        let plugin = BasePlugin::new(Arc::new(Config::default()), Arc::new(NoAuth));
        let file = DownloadFile::new(FileId(1), PackageId(1), "ftp://example.com/payload.rar");

        let _ = plugin.preprocess(&file).await;
        assert_eq!(file.name(), "payload.rar");
    }
}
