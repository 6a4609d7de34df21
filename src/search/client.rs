//! Blocking HTTP client for Elasticsearch.

use super::{BulkItem, BulkOutcome, CollectionKind, Page, SearchBackend};
use crate::config::{ConnectionConfig, Credentials, SCROLL_KEEP_ALIVE};
use crate::document::Document;
use crate::error::{DumpError, Result};
use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use secrecy::ExposeSecret as _;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Elasticsearch over HTTP(S), one blocking request at a time.
#[derive(Debug, Clone)]
pub struct ElasticClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
}

impl ElasticClient {
    /// Build a client. No request is sent.
    ///
    /// # Errors
    ///
    /// Returns [`DumpError::Config`] when credentials are missing or the host is
    /// empty, before anything touches the network.
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        let credentials = config.credentials()?;
        let base_url = config.base_url()?;

        let http = Client::builder()
            .danger_accept_invalid_certs(!config.verify_certs)
            .build()
            .map_err(|e| DumpError::Config(format!("http client build failed: {e}")))?;

        log::debug!("elasticsearch endpoint: {base_url}");
        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.credentials {
            Credentials::Basic { username, password } => {
                builder.basic_auth(username, Some(password.expose_secret()))
            }
            Credentials::ApiKey(key) => {
                builder.header(AUTHORIZATION, format!("ApiKey {}", key.expose_secret()))
            }
        }
    }

    fn send<T: DeserializeOwned>(&self, builder: RequestBuilder, what: &str) -> Result<T> {
        let response = builder
            .send()
            .map_err(|e| DumpError::RemoteFetch(format!("{what} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(DumpError::RemoteFetch(format!(
                "{what} returned status {status}: {}",
                error_reason(&body)
            )));
        }

        response
            .json()
            .map_err(|e| DumpError::RemoteFetch(format!("{what} decode failed: {e}")))
    }
}

impl SearchBackend for ElasticClient {
    fn search(&self, collection: &str, page_size: usize) -> Result<Page> {
        let builder = self
            .request(Method::POST, &format!("{collection}/_search"))
            .query(&[("scroll", SCROLL_KEEP_ALIVE)])
            .json(&json!({
                "query": {"match_all": {}},
                "size": page_size,
            }));
        let response: SearchResponse = self.send(builder, &format!("search of {collection}"))?;
        Ok(response.into())
    }

    fn advance(&self, cursor: &str) -> Result<Page> {
        let builder = self
            .request(Method::POST, "_search/scroll")
            .json(&json!({
                "scroll": SCROLL_KEEP_ALIVE,
                "scroll_id": cursor,
            }));
        let response: SearchResponse = self.send(builder, "scroll")?;
        Ok(response.into())
    }

    fn clear_cursor(&self, cursor: &str) -> Result<()> {
        let builder = self
            .request(Method::DELETE, "_search/scroll")
            .json(&json!({ "scroll_id": [cursor] }));
        let _: Value = self.send(builder, "clear scroll")?;
        Ok(())
    }

    fn bulk_ingest(&self, items: &[BulkItem]) -> Result<Vec<BulkOutcome>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let body = bulk_body(items)?;
        let builder = self
            .request(Method::POST, "_bulk")
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body);
        let response: BulkResponse = self.send(builder, "bulk request")?;

        if response.items.len() != items.len() {
            return Err(DumpError::RemoteFetch(format!(
                "bulk request returned {} results for {} items",
                response.items.len(),
                items.len()
            )));
        }
        Ok(response.items.into_iter().map(BulkOutcome::from).collect())
    }

    fn list_collections(&self, kind: CollectionKind) -> Result<Vec<String>> {
        let mut names: Vec<String> = match kind {
            CollectionKind::Index => {
                let aliases: BTreeMap<String, Value> =
                    self.send(self.request(Method::GET, "_alias"), "index listing")?;
                aliases.into_keys().collect()
            }
            CollectionKind::DataStream => {
                let listing: DataStreamListing = self.send(
                    self.request(Method::GET, "_data_stream"),
                    "data stream listing",
                )?;
                listing.data_streams.into_iter().map(|ds| ds.name).collect()
            }
        };
        names.sort();
        Ok(names)
    }
}

/// NDJSON body: an action line then the source line, per item.
///
/// `create` is the only operation data streams accept and behaves like `index`
/// on regular indices when no id is given.
fn bulk_body(items: &[BulkItem]) -> Result<String> {
    let mut body = String::new();
    for item in items {
        let mut action = serde_json::Map::new();
        action.insert("_index".to_owned(), Value::String(item.target.clone()));
        if let Some(pipeline) = &item.pipeline {
            action.insert("pipeline".to_owned(), Value::String(pipeline.clone()));
        }
        body.push_str(&serde_json::to_string(&json!({ "create": action }))?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&item.document)?);
        body.push('\n');
    }
    Ok(body)
}

/// Pull `error.reason` out of an error body, falling back to the raw text.
fn error_reason(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/reason")
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "_scroll_id")]
    scroll_id: Option<String>,
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    total: Option<TotalHits>,
    #[serde(default)]
    hits: Vec<Document>,
}

/// `hits.total` is an object since 7.0 and a bare number before.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Object { value: u64 },
    Count(u64),
}

impl From<SearchResponse> for Page {
    fn from(response: SearchResponse) -> Self {
        Self {
            documents: response.hits.hits,
            cursor: response.scroll_id,
            total: response.hits.total.map(|total| match total {
                TotalHits::Object { value } | TotalHits::Count(value) => value,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    items: Vec<BTreeMap<String, BulkItemResult>>,
}

#[derive(Debug, Deserialize)]
struct BulkItemResult {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(default)]
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

impl From<BTreeMap<String, BulkItemResult>> for BulkOutcome {
    fn from(item: BTreeMap<String, BulkItemResult>) -> Self {
        let Some(result) = item.into_values().next() else {
            return Self::failed("empty bulk item result");
        };
        match result.error {
            Some(error) => Self::failed(
                error
                    .get("reason")
                    .and_then(Value::as_str)
                    .map_or_else(|| error.to_string(), str::to_owned),
            ),
            None if result.status >= 300 => Self::failed(format!("status {}", result.status)),
            None => Self::ok(result.id.unwrap_or_default()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DataStreamListing {
    data_streams: Vec<DataStreamEntry>,
}

#[derive(Debug, Deserialize)]
struct DataStreamEntry {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use secrecy::SecretString;

    fn client_for(server: &mockito::Server) -> ElasticClient {
        let config = ConnectionConfig {
            host: server.url(),
            password: Some(SecretString::from("changeme".to_owned())),
            ..ConnectionConfig::default()
        };
        ElasticClient::connect(&config).unwrap()
    }

    #[test]
    fn test_connect_without_credentials_fails_early() {
        let config = ConnectionConfig {
            host: "http://127.0.0.1:1".to_owned(),
            ..ConnectionConfig::default()
        };
        assert!(matches!(
            ElasticClient::connect(&config),
            Err(DumpError::Config(_))
        ));
    }

    #[test]
    fn test_search_opens_scroll() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/orders/_search")
            .match_query(Matcher::UrlEncoded("scroll".into(), "1m".into()))
            .match_header("authorization", Matcher::Regex("^Basic ".into()))
            .match_body(Matcher::PartialJsonString(r#"{"size": 2}"#.into()))
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"_scroll_id":"c1","hits":{"total":{"value":3,"relation":"eq"},
                    "hits":[{"_id":"a","_source":{"n":1}},{"_id":"b","_source":{"n":2}}]}}"#,
            )
            .create();

        let page = client_for(&server).search("orders", 2).unwrap();
        mock.assert();

        assert_eq!(page.cursor.as_deref(), Some("c1"));
        assert_eq!(page.total, Some(3));
        assert_eq!(page.documents.len(), 2);
        assert_eq!(page.documents[1].id, "b");
    }

    #[test]
    fn test_advance_sends_cursor() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/_search/scroll")
            .match_body(Matcher::Json(
                serde_json::json!({"scroll": "1m", "scroll_id": "c1"}),
            ))
            .with_header("content-type", "application/json")
            .with_body(r#"{"_scroll_id":"c2","hits":{"hits":[]}}"#)
            .create();

        let page = client_for(&server).advance("c1").unwrap();
        mock.assert();
        assert!(page.documents.is_empty());
        assert_eq!(page.cursor.as_deref(), Some("c2"));
    }

    #[test]
    fn test_http_error_is_remote_fetch() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/_search/scroll")
            .with_status(404)
            .with_body(r#"{"error":{"reason":"No search context found"}}"#)
            .create();

        let err = client_for(&server).advance("gone").unwrap_err();
        assert!(matches!(&err, DumpError::RemoteFetch(msg) if msg.contains("No search context found")));
    }

    #[test]
    fn test_api_key_header() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/_data_stream")
            .match_header("authorization", "ApiKey secret-key")
            .with_header("content-type", "application/json")
            .with_body(r#"{"data_streams":[{"name":"logs-b"},{"name":"logs-a"}]}"#)
            .create();

        let config = ConnectionConfig {
            host: server.url(),
            api_key: Some(SecretString::from("secret-key".to_owned())),
            ..ConnectionConfig::default()
        };
        let client = ElasticClient::connect(&config).unwrap();
        let names = client.list_collections(CollectionKind::DataStream).unwrap();
        mock.assert();
        assert_eq!(names, ["logs-a", "logs-b"]);
    }

    #[test]
    fn test_list_indices_sorted() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/_alias")
            .with_header("content-type", "application/json")
            .with_body(r#"{"orders":{"aliases":{}},"customers":{"aliases":{}}}"#)
            .create();

        let names = client_for(&server)
            .list_collections(CollectionKind::Index)
            .unwrap();
        assert_eq!(names, ["customers", "orders"]);
    }

    #[test]
    fn test_bulk_ingest_reports_each_item() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/_bulk")
            .match_header("content-type", "application/x-ndjson")
            .match_body(Matcher::Regex(
                r#"\{"create":\{"_index":"restore","pipeline":"p1"\}\}"#.into(),
            ))
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"errors":true,"items":[
                    {"create":{"_id":"x1","status":201}},
                    {"create":{"status":400,"error":{"type":"mapper_parsing_exception","reason":"bad field"}}}
                ]}"#,
            )
            .create();

        let items = vec![
            BulkItem {
                target: "restore".to_owned(),
                pipeline: Some("p1".to_owned()),
                document: serde_json::json!({"ok": true}),
            },
            BulkItem {
                target: "restore".to_owned(),
                pipeline: Some("p1".to_owned()),
                document: serde_json::json!({"ok": false}),
            },
        ];
        let outcomes = client_for(&server).bulk_ingest(&items).unwrap();
        mock.assert();

        assert_eq!(
            outcomes,
            [BulkOutcome::ok("x1"), BulkOutcome::failed("bad field")]
        );
    }

    #[test]
    fn test_bulk_body_layout() {
        let body = bulk_body(&[BulkItem {
            target: "t".to_owned(),
            pipeline: None,
            document: serde_json::json!({"a": 1}),
        }])
        .unwrap();
        assert_eq!(body, "{\"create\":{\"_index\":\"t\"}}\n{\"a\":1}\n");
    }
}
