// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP client for the printer directory service.
//
// The directory publishes one read-only endpoint per user:
//
//   GET {api_base}/users/{username}/printers  →  JSON array of printers
//
// A 404 means the user is unknown to the directory and contributes no
// printers; that is normal for local accounts and never an error.

use tracing::{debug, warn};

use spoolsync_core::error::{Error, Result};
use spoolsync_core::types::Printer;
use spoolsync_engine::{Directory, RetryStrategy};

/// Directory service client. One instance serves the whole daemon.
pub struct DirectoryClient {
    api_base: String,
    http: reqwest::Client,
    retry: RetryStrategy,
}

impl DirectoryClient {
    /// A client for the directory rooted at `api_base`. A trailing slash
    /// on the base is tolerated.
    pub fn new(api_base: &str) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            retry: RetryStrategy::default(),
        }
    }

    async fn fetch_user(&self, username: &str) -> Result<Vec<Printer>> {
        let url = user_printers_url(&self.api_base, username);
        self.retry
            .run_when(
                |e| matches!(e, Error::DirectoryUnavailable(_)),
                move || self.fetch_once(url.clone(), username),
            )
            .await
    }

    async fn fetch_once(&self, url: String, username: &str) -> Result<Vec<Printer>> {
        debug!(url = %url, "fetching user printers");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::DirectoryUnavailable(format!("GET {url}: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(user = %username, "user not known to directory");
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(Error::Directory(format!(
                "GET {url} returned status {}",
                response.status()
            )));
        }

        response
            .json::<Vec<Printer>>()
            .await
            .map_err(|e| Error::Directory(format!("decode {url}: {e}")))
    }
}

impl Directory for DirectoryClient {
    /// Fetch every listed user's printers and concatenate them. The
    /// caller deduplicates by printer id; a user failing to resolve
    /// fails the whole fetch so a flaky directory cannot masquerade as
    /// an empty desired set.
    async fn get_printers(&self, usernames: &[String]) -> Result<Vec<Printer>> {
        let mut printers = Vec::new();
        for username in usernames {
            let mut fetched = self.fetch_user(username).await.map_err(|e| {
                warn!(user = %username, error = %e, "directory fetch failed");
                e
            })?;
            debug!(user = %username, count = fetched.len(), "got user printers");
            printers.append(&mut fetched);
        }
        Ok(printers)
    }
}

fn user_printers_url(api_base: &str, username: &str) -> String {
    format!("{api_base}/users/{username}/printers")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_has_base_user_and_resource() {
        assert_eq!(
            user_printers_url("http://directory.local/api/v1", "alice"),
            "http://directory.local/api/v1/users/alice/printers"
        );
    }

    #[test]
    fn trailing_slash_on_base_is_trimmed() {
        let client = DirectoryClient::new("http://directory.local/api/v1/");
        assert_eq!(client.api_base, "http://directory.local/api/v1");
    }
}
