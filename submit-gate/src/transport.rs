use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tracing::debug;

use crate::error::TransportError;

/// The default document creation endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://ismp.crpt.ru/api/v3/lk/documents/create";

/// Header carrying the document signature.
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// The endpoint's answer to a delivered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResponse {
    pub status: u16,
    pub body: String,
}

/// Turns a document into the bytes that are sent.
pub trait Encoder<D: ?Sized>: Send + Sync {
    fn encode(&self, document: &D) -> Result<Vec<u8>, TransportError>;
}

/// Encodes any `Serialize` document as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl<D> Encoder<D> for JsonEncoder
where
    D: Serialize + ?Sized,
{
    fn encode(&self, document: &D) -> Result<Vec<u8>, TransportError> {
        serde_json::to_vec(document).map_err(|e| TransportError::Encode(e.to_string()))
    }
}

/// Delivers an encoded document.
///
/// Timeouts and any retry policy belong to the implementation. The gate
/// calls `send` at most once per admission.
pub trait Transport: Send + Sync {
    fn send(&self, body: Vec<u8>, signature: &str) -> Result<SubmitResponse, TransportError>;
}

impl<F> Transport for F
where
    F: Fn(Vec<u8>, &str) -> Result<SubmitResponse, TransportError> + Send + Sync,
{
    fn send(&self, body: Vec<u8>, signature: &str) -> Result<SubmitResponse, TransportError> {
        self(body, signature)
    }
}

/// Posts documents to an HTTP endpoint with a blocking client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(endpoint: Url) -> Result<Self, TransportError> {
        let client = Client::builder()
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self::with_client(client, endpoint))
    }

    /// Use a preconfigured client, e.g. one with timeouts or proxies.
    pub fn with_client(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    fn send(&self, body: Vec<u8>, signature: &str) -> Result<SubmitResponse, TransportError> {
        debug!(endpoint = %self.endpoint, bytes = body.len(), "posting document");

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if status.is_success() {
            Ok(SubmitResponse {
                status: status.as_u16(),
                body,
            })
        } else {
            Err(TransportError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;
    use wiremock::matchers::body_bytes;
    use wiremock::matchers::header;
    use wiremock::matchers::method;
    use wiremock::matchers::path;

    use super::*;

    // The blocking client must not run on the async runtime's own threads.
    async fn send(
        endpoint: String,
        body: Vec<u8>,
        signature: &'static str,
    ) -> Result<SubmitResponse, TransportError> {
        tokio::task::spawn_blocking(move || {
            let url = Url::parse(&endpoint).unwrap();
            HttpTransport::new(url)?.send(body, signature)
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn it_posts_json_with_signature() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/create"))
            .and(header("x-signature", "sig-123"))
            .and(header("content-type", "application/json"))
            .and(body_bytes(b"{\"a\":1}".to_vec()))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"value\":\"ok\"}"))
            .expect(1)
            .mount(&server)
            .await;

        let response = send(
            format!("{}/create", server.uri()),
            b"{\"a\":1}".to_vec(),
            "sig-123",
        )
        .await
        .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, "{\"value\":\"ok\"}");
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/create"))
            .and(header("x-signature", "sig"))
            .respond_with(ResponseTemplate::new(403).set_body_string("bad signature"))
            .expect(1)
            .mount(&server)
            .await;

        let err = send(format!("{}/create", server.uri()), Vec::new(), "sig")
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TransportError::Status {
                status: 403,
                body: "bad signature".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_network_error() {
        let server = MockServer::start().await;
        let endpoint = format!("{}/create", server.uri());
        drop(server);

        let err = send(endpoint, Vec::new(), "sig").await.unwrap_err();
        assert!(matches!(err, TransportError::Network(_)));
    }

    #[test]
    fn test_json_encoder() {
        let body = JsonEncoder.encode(&serde_json::json!({"k": [1, 2]})).unwrap();
        assert_eq!(body, b"{\"k\":[1,2]}");
    }
}
