//! S3 and Lambda REST clients for a cloud emulator (LocalStack and similar)
//!
//! Requests are path-style and carry an unsigned credential scope; emulators
//! accept any signature for the configured test credentials.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CloudConfig;
use crate::error::{Error, Result};
use crate::retry::{Failure, RetryPolicy};

use super::{FunctionInvoker, ObjectInfo, ObjectStore};

/// Lambda API version segment
const LAMBDA_API_VERSION: &str = "2015-03-31";

/// First retry waits this long, later ones double it
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// Shared HTTP client for the emulator endpoints
pub struct EmulatorClient {
    http: Client,
    endpoint: Url,
    access_key_id: String,
    secret_access_key: String,
    region: String,
    retry: RetryPolicy,
}

impl EmulatorClient {
    /// Create a client for `config.endpoint_url`
    pub fn new(config: &CloudConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint_url).map_err(|e| {
            Error::Config(format!("Invalid endpoint URL '{}': {}", config.endpoint_url, e))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "Endpoint URL '{}' cannot be used as a base",
                config.endpoint_url
            )));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint,
            access_key_id: config.access_key_id.clone(),
            secret_access_key: config.secret_access_key.clone(),
            region: config.region.clone(),
            retry: RetryPolicy::new(config.max_attempts, RETRY_BASE_DELAY),
        })
    }

    /// Endpoint URL with `segments` appended as percent-encoded path segments
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config("Endpoint URL cannot be used as a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Credential-scope headers for `service`
    fn authorize(&self, request: RequestBuilder, service: &str) -> RequestBuilder {
        let now = chrono::Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/{}/aws4_request", date, self.region, service);
        let signature = hex::encode(Sha256::digest(
            format!("{}:{}", self.secret_access_key, scope).as_bytes(),
        ));

        request
            .header("x-amz-date", amz_date)
            .header("x-amz-content-sha256", "UNSIGNED-PAYLOAD")
            .header(
                reqwest::header::AUTHORIZATION,
                format!(
                    "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders=host;x-amz-date, Signature={}",
                    self.access_key_id, scope, signature
                ),
            )
    }

    /// Send a request, retrying transport failures and 5xx responses
    async fn send<F>(&self, service: &str, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder + Sync,
    {
        let build = &build;
        self.retry
            .run(service, move || async move {
                let request = self.authorize(build(&self.http), service);
                let response = request.send().await.map_err(|e| {
                    Failure::Transient(Error::cloud(format!("{} request failed: {}", service, e)))
                })?;

                let status = response.status();
                if status.is_server_error() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(Failure::Transient(Error::cloud(format!(
                        "{} request failed: HTTP {} - {}",
                        service,
                        status,
                        body.trim()
                    ))));
                }
                Ok(response)
            })
            .await
    }
}

/// Turn a non-success response into a cloud error carrying its body
async fn error_for_status(response: Response, action: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(Error::cloud(format!("{} failed: HTTP {} - {}", action, status, body)))
}

/// S3-compatible bucket on the emulator
pub struct EmulatorObjectStore {
    client: Arc<EmulatorClient>,
    bucket: String,
}

impl EmulatorObjectStore {
    /// Store for `bucket` using a shared client
    pub fn new(client: Arc<EmulatorClient>, bucket: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
        }
    }

    fn object_url(&self, key: &str) -> Result<Url> {
        let mut segments = vec![self.bucket.as_str()];
        segments.extend(key.split('/'));
        self.client.url(&segments)
    }
}

#[async_trait]
impl ObjectStore for EmulatorObjectStore {
    async fn create_bucket(&self) -> Result<()> {
        let url = self.client.url(&[&self.bucket])?;
        let response = self
            .client
            .send("s3", |http| http.put(url.clone()))
            .await?;

        if response.status() == StatusCode::CONFLICT {
            let body = response.text().await.unwrap_or_default();
            if body.contains("BucketAlreadyOwnedByYou") {
                tracing::debug!("Bucket '{}' already exists", self.bucket);
                return Ok(());
            }
            return Err(Error::cloud(format!("Create bucket failed: {}", body)));
        }

        error_for_status(response, "Create bucket").await?;
        Ok(())
    }

    async fn put_object(&self, key: &str, data: Bytes, content_type: &str) -> Result<()> {
        let url = self.object_url(key)?;
        let response = self
            .client
            .send("s3", |http| {
                http.put(url.clone())
                    .header(reqwest::header::CONTENT_TYPE, content_type)
                    .body(data.clone())
            })
            .await?;
        error_for_status(response, "Put object").await?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes> {
        let url = self.object_url(key)?;
        let response = self
            .client
            .send("s3", |http| http.get(url.clone()))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::DocumentNotFound(format!("object {}", key)));
        }
        let response = error_for_status(response, "Get object").await?;
        Ok(response.bytes().await?)
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let base = self.client.url(&[&self.bucket])?;
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut url = base.clone();
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("list-type", "2").append_pair("prefix", prefix);
                if let Some(token) = &continuation {
                    query.append_pair("continuation-token", token);
                }
            }

            let response = self
                .client
                .send("s3", |http| http.get(url.clone()))
                .await?;
            let body = error_for_status(response, "List objects").await?.text().await?;
            let page = parse_list_objects(&body)?;

            objects.extend(page.objects);
            match page.next_token {
                Some(token) if page.is_truncated => continuation = Some(token),
                _ => break,
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn name(&self) -> &str {
        "emulator"
    }
}

/// One page of a ListObjectsV2 response
#[derive(Debug, Default)]
struct ListPage {
    objects: Vec<ObjectInfo>,
    is_truncated: bool,
    next_token: Option<String>,
}

/// Parse a ListObjectsV2 XML body
fn parse_list_objects(xml: &str) -> Result<ListPage> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut page = ListPage::default();
    let mut current: Option<ObjectInfo> = None;
    let mut element = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                element = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if element == "Contents" {
                    current = Some(ObjectInfo {
                        key: String::new(),
                        size: 0,
                        last_modified: None,
                    });
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| Error::cloud(format!("Invalid list response: {}", e)))?
                    .to_string();
                match (element.as_str(), current.as_mut()) {
                    ("Key", Some(obj)) => obj.key = text,
                    ("Size", Some(obj)) => obj.size = text.parse().unwrap_or(0),
                    ("LastModified", Some(obj)) => obj.last_modified = Some(text),
                    ("IsTruncated", None) => page.is_truncated = text == "true",
                    ("NextContinuationToken", None) => page.next_token = Some(text),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"Contents" {
                    if let Some(obj) = current.take() {
                        page.objects.push(obj);
                    }
                }
                element.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::cloud(format!("Invalid list response: {}", e))),
            _ => {}
        }
    }

    Ok(page)
}

/// Lambda-compatible function invoker on the emulator
pub struct EmulatorFunctionInvoker {
    client: Arc<EmulatorClient>,
}

impl EmulatorFunctionInvoker {
    /// Invoker using a shared client
    pub fn new(client: Arc<EmulatorClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FunctionInvoker for EmulatorFunctionInvoker {
    async fn invoke(&self, function_name: &str, payload: &serde_json::Value) -> Result<serde_json::Value> {
        let url = self
            .client
            .url(&[LAMBDA_API_VERSION, "functions", function_name, "invocations"])?;
        let body = serde_json::to_vec(payload)?;

        let response = self
            .client
            .send("lambda", |http| {
                http.post(url.clone())
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(body.clone())
            })
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::cloud(format!("Function not found: {}", function_name)));
        }
        let text = error_for_status(response, "Invoke function").await?.text().await?;
        tracing::info!("Invoked function {}", function_name);
        Ok(parse_invocation_result(&text))
    }
}

/// JSON result, or the raw text as a JSON string
fn parse_invocation_result(text: &str) -> serde_json::Value {
    if text.trim().is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_server;
    use axum::{
        extract::{Path, Query, State},
        http::{HeaderMap, StatusCode as Status},
        routing::{get, post, put},
        Router,
    };
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn client(endpoint: &str) -> EmulatorClient {
        EmulatorClient::new(&CloudConfig {
            endpoint_url: endpoint.to_string(),
            ..CloudConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_urls_are_path_style() {
        let client = client("http://localhost:4566");
        let store = EmulatorObjectStore::new(Arc::new(client), "enterprise-documents");
        assert_eq!(
            store.object_url("documents/a b.txt").unwrap().as_str(),
            "http://localhost:4566/enterprise-documents/documents/a%20b.txt"
        );
    }

    #[test]
    fn test_lambda_url() {
        let client = client("http://localhost:4566/");
        let url = client
            .url(&[LAMBDA_API_VERSION, "functions", "process", "invocations"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:4566/2015-03-31/functions/process/invocations"
        );
    }

    #[test]
    fn test_invalid_endpoint_is_config_error() {
        let result = EmulatorClient::new(&CloudConfig {
            endpoint_url: "not a url".to_string(),
            ..CloudConfig::default()
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_parse_list_objects() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>enterprise-documents</Name>
  <Prefix>documents/</Prefix>
  <KeyCount>2</KeyCount>
  <IsTruncated>true</IsTruncated>
  <NextContinuationToken>token-1</NextContinuationToken>
  <Contents>
    <Key>documents/a.pdf</Key>
    <LastModified>2024-01-01T00:00:00.000Z</LastModified>
    <Size>1024</Size>
  </Contents>
  <Contents>
    <Key>documents/b&amp;c.txt</Key>
    <Size>7</Size>
  </Contents>
</ListBucketResult>"#;

        let page = parse_list_objects(xml).unwrap();
        assert!(page.is_truncated);
        assert_eq!(page.next_token.as_deref(), Some("token-1"));
        assert_eq!(page.objects.len(), 2);
        assert_eq!(page.objects[0].key, "documents/a.pdf");
        assert_eq!(page.objects[0].size, 1024);
        assert_eq!(
            page.objects[0].last_modified.as_deref(),
            Some("2024-01-01T00:00:00.000Z")
        );
        assert_eq!(page.objects[1].key, "documents/b&c.txt");
        assert_eq!(page.objects[1].last_modified, None);
    }

    #[test]
    fn test_parse_empty_listing() {
        let xml = "<ListBucketResult><IsTruncated>false</IsTruncated></ListBucketResult>";
        let page = parse_list_objects(xml).unwrap();
        assert!(page.objects.is_empty());
        assert!(!page.is_truncated);
    }

    #[test]
    fn test_parse_invocation_result() {
        assert_eq!(parse_invocation_result(r#"{"ok":true}"#), json!({"ok": true}));
        assert_eq!(parse_invocation_result("plain"), json!("plain"));
        assert_eq!(parse_invocation_result(""), serde_json::Value::Null);
    }

    fn store_at(endpoint: &str, bucket: &str) -> EmulatorObjectStore {
        EmulatorObjectStore::new(Arc::new(client(endpoint)), bucket)
    }

    #[tokio::test]
    async fn test_bucket_already_owned_is_success() {
        let router = Router::new().route(
            "/:bucket",
            put(|Path(bucket): Path<String>| async move {
                let code = if bucket == "mine" {
                    "BucketAlreadyOwnedByYou"
                } else {
                    "BucketAlreadyExists"
                };
                (
                    Status::CONFLICT,
                    format!("<Error><Code>{}</Code></Error>", code),
                )
            }),
        );
        let base = spawn_server(router).await;

        assert!(store_at(&base, "mine").create_bucket().await.is_ok());
        assert!(matches!(
            store_at(&base, "theirs").create_bucket().await,
            Err(Error::Cloud(_))
        ));
    }

    #[tokio::test]
    async fn test_list_follows_continuation_tokens() {
        let router = Router::new().route(
            "/:bucket",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let well_formed = params.get("list-type").map(String::as_str) == Some("2")
                    && params.get("prefix").map(String::as_str) == Some("documents/");
                if !well_formed {
                    return (Status::BAD_REQUEST, String::new());
                }
                let body = match params.get("continuation-token").map(String::as_str) {
                    None => "<ListBucketResult><IsTruncated>true</IsTruncated>\
                             <NextContinuationToken>page-2</NextContinuationToken>\
                             <Contents><Key>documents/b.txt</Key><Size>2</Size></Contents>\
                             </ListBucketResult>",
                    Some("page-2") => "<ListBucketResult><IsTruncated>false</IsTruncated>\
                                       <Contents><Key>documents/a.txt</Key><Size>1</Size></Contents>\
                                       </ListBucketResult>",
                    Some(_) => return (Status::BAD_REQUEST, String::new()),
                };
                (Status::OK, body.to_string())
            }),
        );
        let base = spawn_server(router).await;

        let objects = store_at(&base, "enterprise-documents")
            .list_objects("documents/")
            .await
            .unwrap();
        let keys: Vec<_> = objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["documents/a.txt", "documents/b.txt"]);
        assert_eq!(objects[1].size, 2);
    }

    #[tokio::test]
    async fn test_server_errors_retried_up_to_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let router = Router::new()
            .route(
                "/:bucket/*key",
                put(
                    |State(calls): State<Arc<AtomicU32>>, Path((_, key)): Path<(String, String)>| async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        if key == "documents/flaky.txt" && n == 0 {
                            Status::INTERNAL_SERVER_ERROR
                        } else if key == "documents/down.txt" {
                            Status::SERVICE_UNAVAILABLE
                        } else {
                            Status::OK
                        }
                    },
                ),
            )
            .with_state(calls.clone());
        let base = spawn_server(router).await;
        let store = store_at(&base, "enterprise-documents");

        store
            .put_object("documents/flaky.txt", Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap();
        assert_eq!(calls.swap(0, Ordering::SeqCst), 2);

        let err = store
            .put_object("documents/down.txt", Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cloud(ref m) if m.contains("503")));
        assert_eq!(calls.load(Ordering::SeqCst), CloudConfig::default().max_attempts);
    }

    #[tokio::test]
    async fn test_get_object_and_credential_scope() {
        let router = Router::new().route(
            "/:bucket/*key",
            get(|headers: HeaderMap, Path((_, key)): Path<(String, String)>| async move {
                let scoped = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|v| v.contains("Credential=test/") && v.contains("/us-east-1/s3/"));
                match (scoped, key.as_str()) {
                    (false, _) => (Status::FORBIDDEN, Vec::new()),
                    (true, "documents/a.txt") => (Status::OK, b"hello".to_vec()),
                    (true, _) => (Status::NOT_FOUND, Vec::new()),
                }
            }),
        );
        let base = spawn_server(router).await;
        let store = store_at(&base, "enterprise-documents");

        let data = store.get_object("documents/a.txt").await.unwrap();
        assert_eq!(&data[..], b"hello");
        assert!(matches!(
            store.get_object("documents/missing.txt").await,
            Err(Error::DocumentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_invoke_returns_json_or_text() {
        let router = Router::new().route(
            "/2015-03-31/functions/:name/invocations",
            post(|Path(name): Path<String>, body: Bytes| async move {
                match name.as_str() {
                    "echo" => {
                        let payload: serde_json::Value =
                            serde_json::from_slice(&body).unwrap_or_default();
                        (Status::OK, json!({ "received": payload }).to_string())
                    }
                    "plain" => (Status::OK, "done".to_string()),
                    _ => (Status::NOT_FOUND, String::new()),
                }
            }),
        );
        let base = spawn_server(router).await;
        let invoker = EmulatorFunctionInvoker::new(Arc::new(client(&base)));

        let result = invoker.invoke("echo", &json!({"document": "a.txt"})).await.unwrap();
        assert_eq!(result, json!({"received": {"document": "a.txt"}}));
        assert_eq!(invoker.invoke("plain", &json!({})).await.unwrap(), json!("done"));
        assert!(matches!(
            invoker.invoke("missing", &json!({})).await,
            Err(Error::Cloud(_))
        ));
    }
}
