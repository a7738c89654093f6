use anyhow::{bail, Context, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder, Method, RequestBuilder, StatusCode};
use serde_json::Value;

use crate::conf::Auth;
use crate::models::server_info::ServerInfo;

const NDJSON: &str = "application/x-ndjson";

/// Thin wrapper over one cluster endpoint.
#[derive(Debug, Clone)]
pub struct EsClient {
    url: String,
    auth: Auth,
    http_client: Client,
}

pub fn build_http_client(insecure_skip_verify: bool) -> reqwest::Result<Client> {
    ClientBuilder::new()
        .danger_accept_invalid_certs(insecure_skip_verify)
        .build()
}

fn inject_auth(request_builder: RequestBuilder, auth: &Auth) -> RequestBuilder {
    match auth {
        Auth::Basic { username, password } => request_builder.basic_auth(username, Some(password)),
        Auth::ApiKey(key) => request_builder.header(AUTHORIZATION, format!("ApiKey {key}")),
        Auth::None => request_builder,
    }
}

impl EsClient {
    pub fn new(url: &str, auth: Auth, http_client: Client) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            auth,
            http_client,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request_builder = self
            .http_client
            .request(method, format!("{}{}", self.url, path));
        inject_auth(request_builder, &self.auth)
    }

    pub async fn server_info(&self) -> Result<ServerInfo> {
        let response = self
            .request(Method::GET, "/")
            .send()
            .await?
            .error_for_status()?;
        let info = response
            .json::<ServerInfo>()
            .await
            .context("parsing cluster info response")?;
        Ok(info)
    }

    /// `HEAD /{index}`: 200 means present, 404 means absent, anything else
    /// aborts the run.
    pub async fn index_exists(&self, index: &str) -> Result<bool> {
        let response = self
            .request(Method::HEAD, &format!("/{index}"))
            .send()
            .await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => bail!("unexpected status code {status} while checking index {index}"),
        }
    }

    pub async fn delete_index(&self, index: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, &format!("/{index}"))
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("failed to delete index {index}: {}", response.status());
        }
        Ok(())
    }

    pub async fn create_index(&self, index: &str, body: &Value) -> Result<()> {
        let response = self
            .request(Method::PUT, &format!("/{index}"))
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("failed to create index {index}: {status} {detail}");
        }
        Ok(())
    }

    /// One `_bulk` request. A 2xx response is treated as batch success; the
    /// per-item results array is not inspected.
    pub async fn bulk(&self, body: String) -> Result<()> {
        let response = self
            .request(Method::POST, "/_bulk")
            .header(CONTENT_TYPE, NDJSON)
            .body(body)
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("bulk request failed with status {}", response.status());
        }
        Ok(())
    }
}
