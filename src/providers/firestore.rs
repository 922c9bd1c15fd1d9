//! Cloud Firestore over its REST API.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Number, Value, json};
use tracing::{debug, instrument, warn};

use crate::core::auth::SharedToken;
use crate::core::document::{Document, DocumentError, DocumentStore, Fields};

pub struct FirestoreDocumentStore {
    documents_url: String,
    client: reqwest::Client,
    token: SharedToken,
}

impl FirestoreDocumentStore {
    /// `base_url` is the service root, `https://firestore.googleapis.com`
    /// in production.
    pub fn new(base_url: &str, project_id: &str, token: SharedToken) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("fintrack/1.0")
            .build()?;
        Ok(Self {
            documents_url: format!(
                "{}/v1/projects/{}/databases/(default)/documents",
                base_url.trim_end_matches('/'),
                project_id
            ),
            client,
            token,
        })
    }

    /// URL of one document. The id is percent-encoded as a single path
    /// segment; empty and dot-segment ids are rejected.
    fn document_url(&self, collection: &str, id: &str) -> Result<Url, DocumentError> {
        if matches!(id, "" | "." | "..") {
            return Err(DocumentError::Malformed {
                id: id.to_string(),
                reason: "not a valid document id".to_string(),
            });
        }
        let mut url = Url::parse(&self.documents_url).context("Invalid Firestore URL")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Firestore URL cannot take a path"))?
            .push(collection)
            .push(id);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = match self.token.get().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        request.send().await.context("Firestore request failed")
    }
}

#[derive(Debug, Deserialize)]
struct RestDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    document: Option<RestDocument>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl RestDocument {
    fn into_document(self) -> Result<Document, DocumentError> {
        let id = self
            .name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let fields = decode_fields(&self.fields).map_err(|e| DocumentError::Malformed {
            id: id.clone(),
            reason: e.to_string(),
        })?;
        Ok(Document { id, fields })
    }
}

/// Turns a non-success response into an error carrying Firestore's message.
async fn error_for(response: Response) -> anyhow::Error {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error.message)
        .unwrap_or(text);
    anyhow!("Firestore returned {}: {}", status, message)
}

/// Wraps a plain JSON value in Firestore's typed value representation.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(values) => {
            json!({ "arrayValue": { "values": values.iter().map(encode_value).collect::<Vec<_>>() } })
        }
        Value::Object(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

pub fn encode_fields(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(key, value)| (key.clone(), encode_value(value)))
            .collect(),
    )
}

/// Inverse of [`encode_value`]. Timestamps and references come back as
/// strings.
pub fn decode_value(typed: &Value) -> Result<Value> {
    let (kind, inner) = typed
        .as_object()
        .and_then(|o| o.iter().next())
        .ok_or_else(|| anyhow!("Not a typed value: {}", typed))?;

    let value = match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().unwrap_or_default()),
        "integerValue" => {
            let i = match inner {
                Value::String(s) => s.parse::<i64>().context("Invalid integerValue")?,
                other => other.as_i64().context("Invalid integerValue")?,
            };
            Value::from(i)
        }
        "doubleValue" => inner
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => {
            Value::String(inner.as_str().unwrap_or_default().to_string())
        }
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect::<Result<Vec<_>>>())
                .transpose()?
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(match inner.get("fields").and_then(Value::as_object) {
            Some(fields) => decode_fields(fields)?,
            None => Fields::new(),
        }),
        "geoPointValue" => inner.clone(),
        other => return Err(anyhow!("Unsupported value type: {}", other)),
    };
    Ok(value)
}

pub fn decode_fields(fields: &Map<String, Value>) -> Result<Fields> {
    fields
        .iter()
        .map(|(key, typed)| {
            decode_value(typed)
                .with_context(|| format!("Field '{key}'"))
                .map(|value| (key.clone(), value))
        })
        .collect()
}

#[async_trait]
impl DocumentStore for FirestoreDocumentStore {
    #[instrument(name = "FirestoreGet", skip(self))]
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, DocumentError> {
        let url = self.document_url(collection, id)?;
        let response = self.send(self.client.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_for(response).await.into());
        }
        let document: RestDocument = response
            .json()
            .await
            .context("Failed to parse Firestore document")?;
        document.into_document().map(Some)
    }

    #[instrument(name = "FirestoreQuery", skip(self, value))]
    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, DocumentError> {
        let url = format!("{}:runQuery", self.documents_url);
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": field },
                        "op": "EQUAL",
                        "value": encode_value(value),
                    }
                }
            }
        });
        debug!("Requesting documents from {}", url);

        let response = self.send(self.client.post(&url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(error_for(response).await.into());
        }
        let items: Vec<RunQueryItem> = response
            .json()
            .await
            .context("Failed to parse Firestore query response")?;

        Ok(items
            .into_iter()
            .filter_map(|item| item.document)
            .filter_map(|document| {
                document
                    .into_document()
                    .map_err(|e| warn!(error = %e, "Skipping undecodable Firestore document"))
                    .ok()
            })
            .collect())
    }

    #[instrument(name = "FirestoreAdd", skip(self, fields))]
    async fn add(&self, collection: &str, fields: Fields) -> Result<String, DocumentError> {
        let url = format!("{}/{}", self.documents_url, collection);
        let body = json!({ "fields": encode_fields(&fields) });

        let response = self.send(self.client.post(&url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(error_for(response).await.into());
        }
        let created: RestDocument = response
            .json()
            .await
            .context("Failed to parse created Firestore document")?;
        Ok(created.into_document()?.id)
    }

    #[instrument(name = "FirestoreSet", skip(self, fields))]
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), DocumentError> {
        let url = self.document_url(collection, id)?;
        let body = json!({ "fields": encode_fields(&fields) });

        let response = self.send(self.client.patch(url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(error_for(response).await.into());
        }
        Ok(())
    }

    #[instrument(name = "FirestoreUpdate", skip(self, fields))]
    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), DocumentError> {
        let mut url = self.document_url(collection, id)?;
        {
            let mut query = url.query_pairs_mut();
            for key in fields.keys() {
                query.append_pair("updateMask.fieldPaths", key);
            }
            query.append_pair("currentDocument.exists", "true");
        }
        let body = json!({ "fields": encode_fields(&fields) });

        let response = self.send(self.client.patch(url).json(&body)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(DocumentError::not_found(collection, id));
        }
        if !response.status().is_success() {
            return Err(error_for(response).await.into());
        }
        Ok(())
    }

    #[instrument(name = "FirestoreDelete", skip(self))]
    async fn delete(&self, collection: &str, id: &str) -> Result<(), DocumentError> {
        let mut url = self.document_url(collection, id)?;
        url.query_pairs_mut()
            .append_pair("currentDocument.exists", "true");

        let response = self.send(self.client.delete(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(DocumentError::not_found(collection, id));
        }
        if !response.status().is_success() {
            return Err(error_for(response).await.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DOCS: &str = "/v1/projects/demo/databases/(default)/documents";

    async fn store(server: &MockServer) -> FirestoreDocumentStore {
        let token = SharedToken::new();
        token.set("id-token").await;
        FirestoreDocumentStore::new(&server.uri(), "demo", token).unwrap()
    }

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_value_encoding() {
        let encoded = encode_fields(&fields(json!({
            "amount": 100,
            "rate": 2.5,
            "category": "Salary",
            "tags": ["a"],
            "meta": {"ok": true, "none": null},
        })));
        assert_eq!(encoded["amount"], json!({"integerValue": "100"}));
        assert_eq!(encoded["rate"], json!({"doubleValue": 2.5}));
        assert_eq!(encoded["category"], json!({"stringValue": "Salary"}));
        assert_eq!(
            encoded["tags"],
            json!({"arrayValue": {"values": [{"stringValue": "a"}]}})
        );
        assert_eq!(
            encoded["meta"]["mapValue"]["fields"]["ok"],
            json!({"booleanValue": true})
        );
    }

    #[test]
    fn test_value_decoding() {
        let decoded = decode_fields(
            json!({
                "amount": {"integerValue": "42"},
                "rate": {"doubleValue": 0.5},
                "date": {"timestampValue": "2023-01-06T00:00:00Z"},
                "nested": {"mapValue": {"fields": {"n": {"nullValue": null}}}},
                "empty": {"arrayValue": {}},
            })
            .as_object()
            .unwrap(),
        )
        .unwrap();
        assert_eq!(decoded["amount"], json!(42));
        assert_eq!(decoded["rate"], json!(0.5));
        assert_eq!(decoded["date"], json!("2023-01-06T00:00:00Z"));
        assert_eq!(decoded["nested"], json!({"n": null}));
        assert_eq!(decoded["empty"], json!([]));

        assert!(decode_value(&json!({"integerValue": "x"})).is_err());
        assert!(decode_value(&json!("bare")).is_err());
    }

    #[tokio::test]
    async fn test_query_eq_returns_documents() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{DOCS}:runQuery")))
            .and(header("authorization", "Bearer id-token"))
            .and(body_partial_json(json!({
                "structuredQuery": {
                    "from": [{"collectionId": "transactions"}],
                    "where": {"fieldFilter": {
                        "field": {"fieldPath": "userId"},
                        "op": "EQUAL",
                        "value": {"stringValue": "user1"}
                    }}
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "document": {
                        "name": "projects/demo/databases/(default)/documents/transactions/abc",
                        "fields": {
                            "userId": {"stringValue": "user1"},
                            "amount": {"integerValue": "100"}
                        }
                    },
                    "readTime": "2024-01-01T00:00:00Z"
                }
            ])))
            .mount(&server)
            .await;

        let docs = store(&server)
            .await
            .query_eq("transactions", "userId", &json!("user1"))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "abc");
        assert_eq!(docs[0].fields["amount"], json!(100));
    }

    #[tokio::test]
    async fn test_query_eq_with_no_matches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{DOCS}:runQuery")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{"readTime": "2024-01-01T00:00:00Z"}])),
            )
            .mount(&server)
            .await;

        let docs = store(&server)
            .await
            .query_eq("transactions", "userId", &json!("nobody"))
            .await
            .unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_add_returns_generated_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{DOCS}/transactions")))
            .and(body_partial_json(json!({
                "fields": {"category": {"stringValue": "Food"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/demo/databases/(default)/documents/transactions/gen-1",
                "fields": {"category": {"stringValue": "Food"}}
            })))
            .mount(&server)
            .await;

        let id = store(&server)
            .await
            .add("transactions", fields(json!({"category": "Food"})))
            .await
            .unwrap();
        assert_eq!(id, "gen-1");
    }

    #[tokio::test]
    async fn test_update_requires_existing_document() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(format!("{DOCS}/transactions/missing")))
            .and(query_param("currentDocument.exists", "true"))
            .and(query_param("updateMask.fieldPaths", "amount"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": 404, "message": "No document to update", "status": "NOT_FOUND"}
            })))
            .mount(&server)
            .await;

        let err = store(&server)
            .await
            .update("transactions", "missing", fields(json!({"amount": 5})))
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_and_backend_errors() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("{DOCS}/transactions/abc")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("{DOCS}/transactions/locked")))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "Missing or insufficient permissions.", "status": "PERMISSION_DENIED"}
            })))
            .mount(&server)
            .await;

        let store = store(&server).await;
        store.delete("transactions", "abc").await.unwrap();

        let err = store.delete("transactions", "locked").await.unwrap_err();
        assert!(matches!(err, DocumentError::Backend(_)));
        assert!(err.to_string().contains("Missing or insufficient permissions."));
    }

    #[tokio::test]
    async fn test_get_missing_document_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{DOCS}/users/uid-1")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(store(&server)
            .await
            .get("users", "uid-1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_query_eq_skips_undecodable_documents() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{DOCS}:runQuery")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "document": {
                        "name": "projects/demo/databases/(default)/documents/transactions/bad",
                        "fields": {"amount": {"integerValue": "not-a-number"}}
                    }
                },
                {
                    "document": {
                        "name": "projects/demo/databases/(default)/documents/transactions/good",
                        "fields": {"amount": {"integerValue": "7"}}
                    }
                }
            ])))
            .mount(&server)
            .await;

        let docs = store(&server)
            .await
            .query_eq("transactions", "userId", &json!("user1"))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "good");
    }

    #[tokio::test]
    async fn test_ids_are_encoded_as_one_path_segment() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("{DOCS}/transactions/a%2Fb%3Fc")))
            .and(query_param("currentDocument.exists", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let store = store(&server).await;
        store.delete("transactions", "a/b?c").await.unwrap();

        let err = store.delete("transactions", "..").await.unwrap_err();
        assert!(matches!(err, DocumentError::Malformed { .. }));
        let err = store.get("transactions", "").await.unwrap_err();
        assert!(matches!(err, DocumentError::Malformed { .. }));
    }
}
