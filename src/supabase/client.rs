//! Thin PostgREST client.

use std::fmt;
use std::time::Duration;

use log::debug;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{KioskError, Result, SearchStage};

/// Connection and naming settings for the Supabase backend.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    #[serde(skip_serializing)]
    pub anon_key: String,
    /// Table holding one embedding row per product.
    pub vector_table: String,
    /// Table holding product records.
    pub product_table: String,
    /// Similarity RPC name.
    pub similarity_query: String,
    /// Keyword RPC name.
    pub keyword_query: String,
    #[serde(with = "crate::hybrid::config::duration_millis")]
    pub timeout: Duration,
}

impl fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("anon_key", &"<redacted>")
            .field("vector_table", &self.vector_table)
            .field("product_table", &self.product_table)
            .field("similarity_query", &self.similarity_query)
            .field("keyword_query", &self.keyword_query)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            vector_table: "product_embedding".to_string(),
            product_table: "products".to_string(),
            similarity_query: "match_products".to_string(),
            keyword_query: "kw_match_products".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl SupabaseConfig {
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(KioskError::config("missing Supabase URL"));
        }
        if self.anon_key.trim().is_empty() {
            return Err(KioskError::config("missing Supabase anon key"));
        }
        for (name, value) in [
            ("vector table", &self.vector_table),
            ("product table", &self.product_table),
            ("similarity query", &self.similarity_query),
            ("keyword query", &self.keyword_query),
        ] {
            if value.trim().is_empty() {
                return Err(KioskError::config(format!("Supabase {name} name is empty")));
            }
        }
        Ok(())
    }
}

/// Shared HTTP handle for the PostgREST API.
///
/// Cloning is cheap; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    http: Client,
    rest_url: String,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        config.validate()?;

        let key = config.anon_key.trim();
        let mut headers = HeaderMap::new();
        let apikey = HeaderValue::from_str(key)
            .map_err(|e| KioskError::config(format!("invalid Supabase key: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| KioskError::config(format!("invalid Supabase key: {e}")))?;
        headers.insert("apikey", apikey);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| KioskError::config(format!("failed to build Supabase HTTP client: {e}")))?;

        Ok(Self {
            http,
            rest_url: format!("{}/rest/v1", config.url.trim_end_matches('/')),
        })
    }

    /// URL of a table or RPC path under `/rest/v1`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.rest_url, path.trim_start_matches('/'))
    }

    /// Call a stored procedure and decode its rows.
    pub async fn rpc<B, R>(&self, stage: SearchStage, name: &str, body: &B) -> Result<Vec<R>>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let request = self.http.post(self.endpoint(&format!("rpc/{name}"))).json(body);
        let response = send(stage, request).await?;
        decode(stage, response).await
    }

    /// Select rows from `table` with PostgREST query parameters.
    pub async fn select<R: DeserializeOwned>(
        &self,
        stage: SearchStage,
        table: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<R>> {
        let request = self.http.get(self.endpoint(table)).query(params);
        let response = send(stage, request).await?;
        decode(stage, response).await
    }

    /// Insert rows, replacing existing rows with the same primary key.
    pub async fn upsert<B>(&self, stage: SearchStage, table: &str, rows: &[B]) -> Result<()>
    where
        B: Serialize + Sync,
    {
        if rows.is_empty() {
            return Ok(());
        }
        let request = self
            .http
            .post(self.endpoint(table))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows);
        send(stage, request).await?;
        debug!("upserted {} rows into {}", rows.len(), table);
        Ok(())
    }

    /// Update the rows matched by `params` with the columns in `body`.
    pub async fn update<B>(
        &self,
        stage: SearchStage,
        table: &str,
        params: &[(&str, String)],
        body: &B,
    ) -> Result<()>
    where
        B: Serialize + ?Sized + Sync,
    {
        let request = self
            .http
            .patch(self.endpoint(table))
            .query(params)
            .header("Prefer", "return=minimal")
            .json(body);
        send(stage, request).await?;
        Ok(())
    }

    /// Like [`update`](Self::update), but returns the ids of the rows that
    /// were changed. An empty result means the filter matched nothing.
    pub async fn update_returning_ids<B>(
        &self,
        stage: SearchStage,
        table: &str,
        params: &[(&str, String)],
        body: &B,
    ) -> Result<Vec<String>>
    where
        B: Serialize + ?Sized + Sync,
    {
        let request = self
            .http
            .patch(self.endpoint(table))
            .query(params)
            .query(&[("select", "id")])
            .header("Prefer", "return=representation")
            .json(body);
        let response = send(stage, request).await?;
        let rows: Vec<IdRow> = decode(stage, response).await?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    /// Delete the rows of `table` whose id is in `ids`.
    pub async fn delete_ids(&self, stage: SearchStage, table: &str, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let request = self
            .http
            .delete(self.endpoint(table))
            .query(&[("id", in_filter(ids))])
            .header("Prefer", "return=minimal");
        send(stage, request).await?;
        debug!("deleted {} rows from {}", ids.len(), table);
        Ok(())
    }

    /// Delete every row of `table`. PostgREST refuses unfiltered deletes, so
    /// this filters on a non-null id.
    pub async fn delete_all(&self, stage: SearchStage, table: &str) -> Result<()> {
        let request = self
            .http
            .delete(self.endpoint(table))
            .query(&[("id", "not.is.null")])
            .header("Prefer", "return=minimal");
        send(stage, request).await?;
        debug!("deleted all rows from {}", table);
        Ok(())
    }

    /// Exact row count of `table`.
    pub async fn count(&self, stage: SearchStage, table: &str) -> Result<usize> {
        let request = self
            .http
            .head(self.endpoint(table))
            .query(&[("select", "id")])
            .header("Prefer", "count=exact");
        let response = send(stage, request).await?;
        let range = response
            .headers()
            .get("content-range")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| failure(stage, format!("{table}: response has no Content-Range")))?;
        parse_content_range_total(range)
            .ok_or_else(|| failure(stage, format!("{table}: unreadable Content-Range {range:?}")))
    }
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: String,
}

/// Attribute a storage failure to the stage it happened in.
pub(crate) fn failure(stage: SearchStage, message: String) -> KioskError {
    match stage {
        SearchStage::Other | SearchStage::Validate => KioskError::storage(message),
        stage => KioskError::index(stage, message),
    }
}

async fn send(stage: SearchStage, request: RequestBuilder) -> Result<Response> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            failure(stage, format!("Supabase request timed out: {e}"))
        } else {
            failure(stage, format!("Supabase request failed: {e}"))
        }
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(failure(stage, format!("Supabase error (status {status}): {body}")))
}

async fn decode<R: DeserializeOwned>(stage: SearchStage, response: Response) -> Result<Vec<R>> {
    let body = response
        .text()
        .await
        .map_err(|e| failure(stage, format!("failed to read Supabase response: {e}")))?;
    serde_json::from_str(&body)
        .map_err(|e| failure(stage, format!("malformed Supabase response: {e}")))
}

/// Total from a `Content-Range` header such as `0-24/3573` or `*/0`.
fn parse_content_range_total(value: &str) -> Option<usize> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

/// PostgREST `in.(..)` filter with every value double-quoted.
pub(crate) fn in_filter(ids: &[String]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("\"{}\"", id.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}
