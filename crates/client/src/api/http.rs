//! REST implementation of `AbstractApi`
//!
//! All response-shape handling lives in [`read_envelope`] and
//! [`list_items`]; callers only ever see typed data or a `ClientError`.

use super::{AbstractApi, AttachmentKind, Download, ListScope};
use crate::errors::{ClientError, ClientResult};
use crate::session::Session;
use async_trait::async_trait;
use atlas_common::abstracts::{
    Abstract, AbstractSettings, AssignmentReport, AssignmentRequest, AttachmentInput,
    AutoAssignReport, ReviewInput, RevisionInput, StatusChange, SubmitAbstractRequest,
};
use atlas_common::config::ClientConfig;
use atlas_common::export::{filename_from_content_disposition, ExportFilters};
use atlas_common::listing::ListQuery;
use reqwest::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Payload of a successful envelope
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Envelope {
    pub message: Option<String>,
    pub data: Option<Value>,
}

fn failure_message(body: Option<&Value>, status: u16) -> String {
    body.and_then(|b| b.get("message"))
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Request failed with status {}", status))
}

/// Some endpoints wrap the payload twice (`data.data`)
fn unwrap_nested(mut value: Value) -> Value {
    loop {
        let nested = match &value {
            Value::Object(map) if map.contains_key("data") && !map.contains_key("id") => {
                map.get("data").cloned()
            }
            _ => None,
        };
        match nested {
            Some(inner) => value = inner,
            None => return value,
        }
    }
}

/// Validate the `{success, message?, data?}` contract. Anything else is a
/// failure, including a 2xx with a non-envelope body.
pub(crate) fn read_envelope(status: u16, body: &[u8]) -> ClientResult<Envelope> {
    let ok_status = (200..300).contains(&status);
    let parsed: Option<Value> = serde_json::from_slice(body).ok();

    let success = parsed
        .as_ref()
        .and_then(|b| b.get("success"))
        .and_then(Value::as_bool);

    match (ok_status, success) {
        (true, Some(true)) => {}
        (true, None) => {
            return Err(ClientError::MalformedResponse(
                "response is not a {success, data} envelope".to_string(),
            ))
        }
        _ => {
            return Err(ClientError::Server {
                status: Some(status),
                message: failure_message(parsed.as_ref(), status),
            })
        }
    }

    let mut body = parsed.unwrap_or(Value::Null);
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string);
    let data = body
        .get_mut("data")
        .map(Value::take)
        .filter(|d| !d.is_null())
        .map(unwrap_nested);

    Ok(Envelope { message, data })
}

/// A list payload may be a bare array or an object carrying the array
pub(crate) fn list_items(data: Option<Value>) -> Vec<Value> {
    match data {
        Some(Value::Array(items)) => items,
        Some(Value::Object(mut map)) => ["items", "abstracts", "data"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> ClientResult<T> {
    serde_json::from_value(value).map_err(|e| ClientError::MalformedResponse(e.to_string()))
}

fn require_data<T: DeserializeOwned>(envelope: Envelope) -> ClientResult<T> {
    let data = envelope
        .data
        .ok_or_else(|| ClientError::MalformedResponse("response carries no data".to_string()))?;
    decode(data)
}

pub struct HttpAbstractApi {
    client: Client,
    base_url: String,
    bulk_concurrency: usize,
}

impl HttpAbstractApi {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bulk_concurrency: config.bulk_concurrency.max(1),
        })
    }

    fn abstracts_url(&self, event_id: &str, tail: &str) -> String {
        format!("{}/events/{}/abstracts{}", self.base_url, event_id, tail)
    }

    async fn send(&self, request: RequestBuilder, session: &Session) -> ClientResult<Envelope> {
        let response = request
            .header(AUTHORIZATION, session.bearer())
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Request to Atlas API failed");
                ClientError::Transport(e.to_string())
            })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| ClientError::Transport(e.to_string()))?;
        let envelope = read_envelope(status, &body);

        if let Err(ref err) = envelope {
            tracing::debug!(status, error = %err, "Atlas API returned a failure");
        }
        envelope
    }

    async fn send_data<T: DeserializeOwned>(&self, request: RequestBuilder, session: &Session) -> ClientResult<T> {
        require_data(self.send(request, session).await?)
    }
}

#[async_trait]
impl AbstractApi for HttpAbstractApi {
    async fn list_abstracts(
        &self,
        session: &Session,
        event_id: &str,
        scope: ListScope,
        query: &ListQuery,
    ) -> ClientResult<Vec<Abstract>> {
        let tail = match scope {
            ListScope::Own => "",
            ListScope::Event => "/all-event-abstracts",
        };
        let request = self.client.get(self.abstracts_url(event_id, tail)).query(query);
        let envelope = self.send(request, session).await?;

        list_items(envelope.data).into_iter().map(decode).collect()
    }

    async fn get_abstract(&self, session: &Session, event_id: &str, id: &str) -> ClientResult<Abstract> {
        let request = self.client.get(self.abstracts_url(event_id, &format!("/{}", id)));
        self.send_data(request, session).await
    }

    async fn create_abstract(
        &self,
        session: &Session,
        event_id: &str,
        request: &SubmitAbstractRequest,
    ) -> ClientResult<Abstract> {
        let request = self.client.post(self.abstracts_url(event_id, "")).json(request);
        self.send_data(request, session).await
    }

    async fn update_abstract(
        &self,
        session: &Session,
        event_id: &str,
        id: &str,
        request: &SubmitAbstractRequest,
    ) -> ClientResult<Abstract> {
        let request = self
            .client
            .put(self.abstracts_url(event_id, &format!("/{}", id)))
            .json(request);
        self.send_data(request, session).await
    }

    async fn delete_abstract(&self, session: &Session, event_id: &str, id: &str) -> ClientResult<()> {
        let request = self.client.delete(self.abstracts_url(event_id, &format!("/{}", id)));
        self.send(request, session).await.map(|_| ())
    }

    async fn update_status(
        &self,
        session: &Session,
        event_id: &str,
        id: &str,
        change: &StatusChange,
    ) -> ClientResult<Abstract> {
        let request = self
            .client
            .put(self.abstracts_url(event_id, &format!("/{}/status", id)))
            .json(change);
        self.send_data(request, session).await
    }

    async fn attach(
        &self,
        session: &Session,
        event_id: &str,
        id: &str,
        kind: AttachmentKind,
        file: &AttachmentInput,
    ) -> ClientResult<Abstract> {
        let request = self
            .client
            .post(self.abstracts_url(event_id, &format!("/{}/{}", id, kind.path())))
            .json(file);
        self.send_data(request, session).await
    }

    async fn verify_registration(&self, session: &Session, event_id: &str, id: &str) -> ClientResult<Abstract> {
        let request = self
            .client
            .put(self.abstracts_url(event_id, &format!("/{}/verify-registration", id)));
        self.send_data(request, session).await
    }

    async fn request_revision(
        &self,
        session: &Session,
        event_id: &str,
        id: &str,
        revision: &RevisionInput,
    ) -> ClientResult<Abstract> {
        let request = self
            .client
            .post(self.abstracts_url(event_id, &format!("/{}/request-revision", id)))
            .json(revision);
        self.send_data(request, session).await
    }

    async fn submit_review(
        &self,
        session: &Session,
        event_id: &str,
        id: &str,
        review: &ReviewInput,
    ) -> ClientResult<Abstract> {
        let request = self
            .client
            .post(self.abstracts_url(event_id, &format!("/{}/review", id)))
            .json(review);
        self.send_data(request, session).await
    }

    async fn assign_reviewers(
        &self,
        session: &Session,
        event_id: &str,
        request: &AssignmentRequest,
    ) -> ClientResult<AssignmentReport> {
        let request = self
            .client
            .post(self.abstracts_url(event_id, "/assign-reviewers"))
            .json(request);
        self.send_data(request, session).await
    }

    async fn auto_assign_reviewers(&self, session: &Session, event_id: &str) -> ClientResult<AutoAssignReport> {
        let request = self
            .client
            .post(self.abstracts_url(event_id, "/auto-assign-reviewers"));
        let envelope = self.send(request, session).await?;
        // Older deployments answer with only a message
        envelope.data.map(decode).transpose().map(Option::unwrap_or_default)
    }

    async fn get_settings(&self, session: &Session, event_id: &str) -> ClientResult<AbstractSettings> {
        let url = format!("{}/events/{}/abstract-settings", self.base_url, event_id);
        self.send_data(self.client.get(url), session).await
    }

    async fn download(&self, session: &Session, event_id: &str, filters: &ExportFilters) -> ClientResult<Download> {
        let response = self
            .client
            .get(self.abstracts_url(event_id, "/download"))
            .query(filters)
            .header(AUTHORIZATION, session.bearer())
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let bytes = response.bytes().await.map_err(|e| ClientError::Transport(e.to_string()))?;

        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Errors, and some failures with 200, come back as JSON envelopes
        let is_json = content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("application/json"));
        if !(200..300).contains(&status) || is_json {
            read_envelope(status, &bytes)?;
            return Err(ClientError::MalformedResponse(
                "export response carries no artifact".to_string(),
            ));
        }

        if bytes.is_empty() {
            return Err(ClientError::MalformedResponse("export artifact is empty".to_string()));
        }

        let filename = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_content_disposition);

        Ok(Download {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        })
    }

    fn bulk_concurrency(&self) -> usize {
        self.bulk_concurrency
    }
}
