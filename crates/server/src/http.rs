//! Outbound HTTPS client shared by the token endpoint and the reporting API.

use crate::error::TransportError;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, USER_AGENT};
use hyper::{Method, Request, StatusCode};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::{Duration, timeout};

const CLIENT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// A buffered response.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_slice(&self.body).map_err(|e| TransportError::Json(e.to_string()))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    }
}

/// Pooled hyper client. Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct HttpClient {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(request_timeout: Duration) -> Result<Self, rustls::Error> {
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())?
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();
        let inner = Client::builder(TokioExecutor::new()).build(connector);
        Ok(Self {
            inner,
            timeout: request_timeout,
        })
    }

    /// POST an `application/x-www-form-urlencoded` body.
    pub async fn post_form(
        &self,
        uri: &str,
        form: &[(&str, &str)],
    ) -> Result<HttpResponse, TransportError> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        self.send(request).await
    }

    pub async fn get_with_bearer(
        &self,
        uri: &str,
        bearer: &str,
    ) -> Result<HttpResponse, TransportError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(AUTHORIZATION, format!("Bearer {bearer}"))
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .body(Full::new(Bytes::new()))
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        self.send(request).await
    }

    pub async fn post_json_with_bearer<B: Serialize>(
        &self,
        uri: &str,
        bearer: &str,
        body: &B,
    ) -> Result<HttpResponse, TransportError> {
        let payload = serde_json::to_vec(body).map_err(|e| TransportError::Json(e.to_string()))?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(AUTHORIZATION, format!("Bearer {bearer}"))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .body(Full::new(Bytes::from(payload)))
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        self.send(request).await
    }

    #[tracing::instrument(name = "http_send", level = "debug", skip(self, request), fields(method = %request.method(), uri = %request.uri()))]
    async fn send(&self, request: Request<Full<Bytes>>) -> Result<HttpResponse, TransportError> {
        let exchange = async {
            let response = self
                .inner
                .request(request)
                .await
                .map_err(|e| TransportError::Network(e.to_string()))?;
            let (parts, body) = response.into_parts();
            let body = body
                .collect()
                .await
                .map_err(|e| TransportError::Network(e.to_string()))?
                .to_bytes();
            Ok::<_, TransportError>(HttpResponse {
                status: parts.status,
                headers: parts.headers,
                body,
            })
        };

        let response = timeout(self.timeout, exchange)
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))??;
        tracing::debug!(status = %response.status, bytes = response.body.len(), "Received response");
        Ok(response)
    }
}
