//! REST client for Azure DevOps
//!
//! One [`AzdoClient`] per organization. Typed API groups hang off accessor
//! methods (`client.git()`, `client.graph()`...). Every request carries the
//! PAT as Basic auth and an `api-version`, logs under the `azdo::client`
//! target, and races against the invocation's cancellation token.

pub mod api;
pub mod error;
pub mod types;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::{defaults, urls};

pub use error::{ClientError, Result};

use api::{
    CoreApi, EndpointsApi, GitApi, GraphApi, IdentitiesApi, OperationsApi, SecurityApi, WorkApi,
};
use error::ErrorResponse;

/// Continuation header used by paged list APIs.
pub const CONTINUATION_HEADER: &str = "x-ms-continuationtoken";

/// Characters escaped in a single path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Percent-encode one path segment (a project or repository name).
pub fn segment(value: &str) -> String {
    utf8_percent_encode(value, SEGMENT).to_string()
}

/// Which host serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Host {
    /// The organization URL
    Organization,
    /// The identity service (graph, identities)
    Vssps,
}

/// Azure DevOps API client.
#[derive(Clone)]
pub struct AzdoClient {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    http: reqwest::Client,
    organization: String,
    base_url: Url,
    vssps_url: Url,
    token: String,
    cancel: CancellationToken,
    timeout: Duration,
}

impl std::fmt::Debug for AzdoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzdoClient")
            .field("organization", &self.inner.organization)
            .field("base_url", &self.inner.base_url.as_str())
            .finish()
    }
}

/// Identity-service URL for an organization URL.
///
/// `dev.azure.com/ORG` maps to `vssps.dev.azure.com/ORG` and
/// `ORG.visualstudio.com` to `ORG.vssps.visualstudio.com`; other hosts
/// serve identities themselves.
pub fn vssps_url(base: &Url) -> Url {
    let mut url = base.clone();
    match base.host_str() {
        Some(host) if host.eq_ignore_ascii_case(urls::SERVICE_HOST) => {
            let _ = url.set_host(Some(urls::VSSPS_HOST));
        }
        Some(host) => {
            if let Some(org) = host.strip_suffix(".visualstudio.com") {
                if !org.ends_with(".vssps") {
                    let _ = url.set_host(Some(&format!("{org}.vssps.visualstudio.com")));
                }
            }
        }
        None => {}
    }
    url
}

impl AzdoClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Organization name.
    pub fn organization(&self) -> &str {
        &self.inner.organization
    }

    /// Organization URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Projects, processes and connection data.
    pub fn core(&self) -> CoreApi {
        CoreApi::new(self.clone())
    }

    /// Long-running operations.
    pub fn operations(&self) -> OperationsApi {
        OperationsApi::new(self.clone())
    }

    /// Repositories and pull requests.
    pub fn git(&self) -> GitApi {
        GitApi::new(self.clone())
    }

    /// Users, groups and subjects.
    pub fn graph(&self) -> GraphApi {
        GraphApi::new(self.clone())
    }

    /// Identity lookups.
    pub fn identities(&self) -> IdentitiesApi {
        IdentitiesApi::new(self.clone())
    }

    /// Security namespaces and access control.
    pub fn security(&self) -> SecurityApi {
        SecurityApi::new(self.clone())
    }

    /// Service endpoints.
    pub fn endpoints(&self) -> EndpointsApi {
        EndpointsApi::new(self.clone())
    }

    /// Work tracking classification nodes.
    pub fn work(&self) -> WorkApi {
        WorkApi::new(self.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal HTTP methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Build a URL for an already-encoded path such as `proj/_apis/git/repositories`.
    pub(crate) fn url(&self, host: Host, path: &str) -> Result<Url> {
        let base = match host {
            Host::Organization => &self.inner.base_url,
            Host::Vssps => &self.inner.vssps_url,
        };
        Ok(base.join(path.trim_start_matches('/'))?)
    }

    pub(crate) fn request(&self, method: Method, url: Url, api_version: &str) -> RequestBuilder {
        self.inner
            .http
            .request(method, url)
            .basic_auth("", Some(&self.inner.token))
            .query(&[("api-version", api_version)])
            .timeout(self.inner.timeout)
    }

    /// Send a request, honouring cancellation and mapping error statuses.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = request.build()?;
        let method = request.method().clone();
        let url = request.url().clone();
        tracing::trace!(target: "azdo::client", "{} {}", method, url);

        let response = tokio::select! {
            response = self.inner.http.execute(request) => response?,
            () = self.inner.cancel.cancelled() => return Err(ClientError::Cancelled),
        };
        let status = response.status();
        tracing::trace!(target: "azdo::client", "{} {} -> {}", method, url, status.as_u16());

        // A rejected PAT yields a 203 sign-in page rather than 401
        if status.is_success() && status.as_u16() != 203 {
            return Ok(response);
        }
        Err(self.extract_error(response).await)
    }

    async fn extract_error(&self, response: Response) -> ClientError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .map(|e| {
                tracing::debug!(target: "azdo::client", "error type {}", e.type_key);
                e.message
            })
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| match status {
                203 | 401 => "authentication failed: the token is invalid or expired".to_string(),
                403 => "access denied: the token lacks the required scope".to_string(),
                404 => "resource not found".to_string(),
                _ => format!("HTTP {status}"),
            });
        if status == 404 {
            ClientError::NotFound(message)
        } else {
            ClientError::Api { status, message }
        }
    }

    async fn json<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let bytes = tokio::select! {
            bytes = response.bytes() => bytes?,
            () = self.inner.cancel.cancelled() => return Err(ClientError::Cancelled),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// GET and decode.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url, api_version: &str) -> Result<T> {
        let response = self.send(self.request(Method::GET, url, api_version)).await?;
        self.json(response).await
    }

    /// GET with query parameters.
    pub(crate) async fn get_with_query<T, Q>(&self, url: Url, api_version: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let response = self
            .send(self.request(Method::GET, url, api_version).query(query))
            .await?;
        self.json(response).await
    }

    /// GET every page of a continuation-token list, stopping at `limit` items.
    pub(crate) async fn get_all<T, Q>(
        &self,
        url: Url,
        api_version: &str,
        query: &Q,
        limit: Option<usize>,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let mut items: Vec<T> = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut request = self.request(Method::GET, url.clone(), api_version).query(query);
            if let Some(token) = &continuation {
                request = request.query(&[("continuationToken", token)]);
            }
            let response = self.send(request).await?;
            let next = response
                .headers()
                .get(CONTINUATION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .filter(|t| !t.is_empty());
            let page: types::ListResponse<T> = self.json(response).await?;
            items.extend(page.value);

            if limit.is_some_and(|limit| items.len() >= limit) {
                items.truncate(limit.unwrap_or(usize::MAX));
                return Ok(items);
            }
            match next {
                Some(token) if Some(&token) != continuation.as_ref() => continuation = Some(token),
                _ => return Ok(items),
            }
        }
    }

    /// POST a JSON body and decode.
    pub(crate) async fn post<T, B>(&self, url: Url, api_version: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .send(self.request(Method::POST, url, api_version).json(body))
            .await?;
        self.json(response).await
    }

    /// PATCH a JSON body and decode.
    pub(crate) async fn patch<T, B>(&self, url: Url, api_version: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .send(self.request(Method::PATCH, url, api_version).json(body))
            .await?;
        self.json(response).await
    }

    /// DELETE, ignoring any body.
    pub(crate) async fn delete(&self, url: Url, api_version: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, url, api_version))
            .await?;
        Ok(())
    }

    /// DELETE and decode the body.
    pub(crate) async fn delete_json<T: DeserializeOwned>(&self, url: Url, api_version: &str) -> Result<T> {
        let response = self
            .send(self.request(Method::DELETE, url, api_version))
            .await?;
        self.json(response).await
    }
}

/// Builder for creating an AzdoClient.
#[derive(Debug, Default)]
pub struct ClientBuilder {
    organization: Option<String>,
    base_url: Option<String>,
    token: Option<String>,
    cancel: Option<CancellationToken>,
    timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Organization name.
    pub fn organization(mut self, name: impl Into<String>) -> Self {
        self.organization = Some(name.into());
        self
    }

    /// Organization URL, e.g. `https://dev.azure.com/contoso`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Personal access token.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Token that aborts in-flight requests.
    pub fn cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<AzdoClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Config("organization URL is required".to_string()))?;
        let token = self
            .token
            .ok_or_else(|| ClientError::Config("token is required".to_string()))?;

        let mut base_url = Url::parse(&base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        let organization = self.organization.unwrap_or_else(|| {
            crate::core::scope::organization_name(base_url.as_str())
        });

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(format!("azdo/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(AzdoClient {
            inner: Arc::new(ClientInner {
                http,
                organization,
                vssps_url: vssps_url(&base_url),
                base_url,
                token,
                cancel: self.cancel.unwrap_or_default(),
                timeout: self.timeout.unwrap_or(defaults::REQUEST_TIMEOUT),
            }),
        })
    }
}
