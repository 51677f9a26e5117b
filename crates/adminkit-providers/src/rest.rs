// ── Simple JSON-REST data provider ──
//
// Speaks the flat REST dialect many admin backends expose:
//
//   GET    /{resource}?sort=["field","ASC"]&range=[0,9]&filter={...}
//   GET    /{resource}/{id}
//   POST   /{resource}
//   PUT    /{resource}/{id}
//   DELETE /{resource}/{id}
//
// List totals come from `Content-Range: items 0-9/100` (or the
// `X-Total-Count` fallback). Bodies are plain JSON objects/arrays.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;
use url::Url;

use adminkit_core::{DataProvider, ListPage, ListQuery, ProviderError, Record, RecordId};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("adminkit/", env!("CARGO_PKG_VERSION"));

/// REST-backed data provider.
pub struct RestProvider {
    base: Url,
    client: reqwest::Client,
}

impl RestProvider {
    /// Build a provider for `base` with default transport settings.
    pub fn new(base: &str) -> Result<Self, ProviderError> {
        Self::builder(base)?.build()
    }

    pub fn builder(base: &str) -> Result<RestProviderBuilder, ProviderError> {
        let base = parse_base(base)?;
        Ok(RestProviderBuilder {
            base,
            timeout: DEFAULT_TIMEOUT,
            bearer_token: None,
        })
    }

    /// Wrap a preconfigured `reqwest::Client` (custom TLS, proxies, ...).
    pub fn from_client(base: &str, client: reqwest::Client) -> Result<Self, ProviderError> {
        Ok(Self {
            base: parse_base(base)?,
            client,
        })
    }

    fn resource_url(&self, resource: &str) -> Result<Url, ProviderError> {
        self.base
            .join(resource)
            .map_err(|err| ProviderError::Invalid {
                message: format!("invalid resource path '{resource}': {err}"),
            })
    }

    fn record_url(&self, resource: &str, id: &RecordId) -> Result<Url, ProviderError> {
        self.base
            .join(&format!("{resource}/{id}"))
            .map_err(|err| ProviderError::Invalid {
                message: format!("invalid record path '{resource}/{id}': {err}"),
            })
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Response, ProviderError> {
        debug!(method = %method, url = %url, "dispatching request");
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(transport_error)?;
        check_status(response).await
    }

    async fn json_record(response: Response) -> Result<Record, ProviderError> {
        let value: Value = response.json().await.map_err(|err| {
            ProviderError::Deserialization {
                message: err.to_string(),
            }
        })?;
        Record::from_value(value).ok_or_else(|| ProviderError::Deserialization {
            message: "expected a JSON object".into(),
        })
    }

    async fn json_records(response: Response) -> Result<Vec<Record>, ProviderError> {
        let value: Value = response.json().await.map_err(|err| {
            ProviderError::Deserialization {
                message: err.to_string(),
            }
        })?;
        match value {
            Value::Array(items) => Ok(items.into_iter().filter_map(Record::from_value).collect()),
            _ => Err(ProviderError::Deserialization {
                message: "expected a JSON array".into(),
            }),
        }
    }
}

/// Transport configuration for [`RestProvider`].
pub struct RestProviderBuilder {
    base: Url,
    timeout: Duration,
    bearer_token: Option<SecretString>,
}

impl RestProviderBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send `Authorization: Bearer <token>` on every request.
    pub fn bearer_token(mut self, token: SecretString) -> Self {
        self.bearer_token = Some(token);
        self
    }

    pub fn build(self) -> Result<RestProvider, ProviderError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.bearer_token {
            let value = format!("Bearer {}", token.expose_secret());
            let mut value =
                HeaderValue::from_str(&value).map_err(|_| ProviderError::Invalid {
                    message: "bearer token contains non-header characters".into(),
                })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|err| ProviderError::Connection {
                message: format!("failed to build HTTP client: {err}"),
            })?;

        Ok(RestProvider {
            base: self.base,
            client,
        })
    }
}

#[async_trait]
impl DataProvider for RestProvider {
    async fn get_list(&self, resource: &str, query: &ListQuery) -> Result<ListPage, ProviderError> {
        let mut url = self.resource_url(resource)?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(sort) = &query.sort {
                pairs.append_pair(
                    "sort",
                    &Value::from(vec![
                        Value::from(sort.field.clone()),
                        Value::from(sort.order.to_string()),
                    ])
                    .to_string(),
                );
            }
            let start = query.pagination.offset();
            let end = start + query.pagination.per_page.saturating_sub(1);
            pairs.append_pair("range", &format!("[{start},{end}]"));
            if !query.filter.is_empty() {
                pairs.append_pair("filter", &query.filter.canonical_json());
            }
        }

        let response = self.send(Method::GET, url, None).await?;
        let total = parse_total(response.headers())?;
        let records = Self::json_records(response).await?;
        Ok(ListPage { records, total })
    }

    async fn get_one(&self, resource: &str, id: &RecordId) -> Result<Record, ProviderError> {
        let url = self.record_url(resource, id)?;
        let response = self
            .send(Method::GET, url, None)
            .await
            .map_err(|err| not_found_for(err, resource, id))?;
        Self::json_record(response).await
    }

    async fn get_many(
        &self,
        resource: &str,
        ids: &[RecordId],
    ) -> Result<Vec<Record>, ProviderError> {
        let mut url = self.resource_url(resource)?;
        let id_values: Vec<Value> = ids.iter().map(RecordId::to_value).collect();
        let filter = serde_json::json!({ "id": id_values });
        url.query_pairs_mut()
            .append_pair("filter", &filter.to_string());

        let response = self.send(Method::GET, url, None).await?;
        Self::json_records(response).await
    }

    async fn create(&self, resource: &str, data: Record) -> Result<Record, ProviderError> {
        let url = self.resource_url(resource)?;
        let body = Value::Object(data.into_fields());
        let response = self.send(Method::POST, url, Some(&body)).await?;
        Self::json_record(response).await
    }

    async fn update(
        &self,
        resource: &str,
        id: &RecordId,
        data: Record,
    ) -> Result<Record, ProviderError> {
        let url = self.record_url(resource, id)?;
        let body = Value::Object(data.into_fields());
        let response = self
            .send(Method::PUT, url, Some(&body))
            .await
            .map_err(|err| not_found_for(err, resource, id))?;
        Self::json_record(response).await
    }

    async fn delete(&self, resource: &str, id: &RecordId) -> Result<Record, ProviderError> {
        let url = self.record_url(resource, id)?;
        let response = self
            .send(Method::DELETE, url, None)
            .await
            .map_err(|err| not_found_for(err, resource, id))?;
        // Some backends answer 204 with no body; synthesize the id.
        let body: Value = response.json().await.unwrap_or(Value::Null);
        match Record::from_value(body) {
            Some(record) => Ok(record),
            None => {
                let mut record = Record::new();
                record.set(adminkit_core::ID_FIELD, id.to_value());
                Ok(record)
            }
        }
    }
}

// ── Response handling ───────────────────────────────────────────────

/// Require a trailing slash so `Url::join` appends resources instead of
/// replacing the last path segment.
fn parse_base(base: &str) -> Result<Url, ProviderError> {
    let normalized = if base.ends_with('/') {
        base.to_owned()
    } else {
        format!("{base}/")
    };
    normalized.parse().map_err(|err| ProviderError::Invalid {
        message: format!("invalid base URL '{base}': {err}"),
    })
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    ProviderError::Connection {
        message: err.to_string(),
    }
}

async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .ok()
        .filter(|body| !body.is_empty())
        .unwrap_or_else(|| status.to_string());
    Err(ProviderError::Http {
        message,
        code: None,
        status: status.as_u16(),
    })
}

/// Promote a 404 on a record URL into the typed NotFound variant.
fn not_found_for(err: ProviderError, resource: &str, id: &RecordId) -> ProviderError {
    match err {
        ProviderError::Http { status, .. } if status == StatusCode::NOT_FOUND.as_u16() => {
            ProviderError::NotFound {
                resource: resource.into(),
                id: id.to_string(),
            }
        }
        other => other,
    }
}

/// Read the list total from `Content-Range: items 0-9/100`, falling
/// back to `X-Total-Count`.
fn parse_total(headers: &HeaderMap) -> Result<u64, ProviderError> {
    if let Some(range) = headers.get(reqwest::header::CONTENT_RANGE) {
        let raw = range.to_str().map_err(|_| ProviderError::Deserialization {
            message: "unreadable Content-Range header".into(),
        })?;
        return raw
            .rsplit('/')
            .next()
            .and_then(|total| total.trim().parse().ok())
            .ok_or_else(|| ProviderError::Deserialization {
                message: format!("malformed Content-Range header '{raw}'"),
            });
    }
    if let Some(count) = headers.get("x-total-count") {
        return count
            .to_str()
            .ok()
            .and_then(|raw| raw.trim().parse().ok())
            .ok_or_else(|| ProviderError::Deserialization {
                message: "malformed X-Total-Count header".into(),
            });
    }
    Err(ProviderError::Deserialization {
        message: "list response carries neither Content-Range nor X-Total-Count".into(),
    })
}
