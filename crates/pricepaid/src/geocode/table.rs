//! HTTP client for a table-storage geocoding store.
//!
//! Entities are addressed as `{table}(PartitionKey='{outward}',RowKey='{inward}')`
//! and fetched without OData metadata.

use std::fmt;

use async_trait::async_trait;
use reqwest::{
    Client, Request, StatusCode, Url,
    header::{ACCEPT, HeaderValue},
};
use tracing::{debug, instrument, warn};

use super::{GeocodeEntity, GeocodeError, GeocodeStore, error::Result};
use crate::query::escape_string_literal;

const TABLE_ACCEPT: &str = "application/json;odata=nometadata";
const TABLE_SERVICE_VERSION: &str = "2019-02-02";

/// [`GeocodeStore`] backed by a table-storage REST endpoint.
#[derive(Clone)]
pub struct TableGeocodeStore {
    client: Client,
    endpoint: Url,
    table: String,
    /// Opaque query string appended to every request, e.g. a pre-signed token.
    credentials: Option<String>,
}

impl fmt::Debug for TableGeocodeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableGeocodeStore")
            .field("endpoint", &self.endpoint.as_str())
            .field("table", &self.table)
            .field("has_credentials", &self.credentials.is_some())
            .finish_non_exhaustive()
    }
}

impl TableGeocodeStore {
    /// Create a store using `client` for all requests.
    ///
    /// The client is expected to be shared with the rest of the process; it
    /// is never recreated per call.
    pub fn with_client(client: Client, endpoint: &str, table: impl Into<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| GeocodeError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(GeocodeError::InvalidEndpoint(endpoint.to_string()));
        }
        Ok(Self {
            client,
            endpoint,
            table: table.into(),
            credentials: None,
        })
    }

    pub fn new(endpoint: &str, table: impl Into<String>) -> Result<Self> {
        Self::with_client(Client::new(), endpoint, table)
    }

    /// Append `query` (without the leading `?`) to every request URL.
    pub fn with_credentials(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        let query = query.trim_start_matches('?');
        self.credentials = (!query.is_empty()).then(|| query.to_string());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// URL of the entity addressed by `(partition_key, row_key)`.
    pub fn entity_url(&self, partition_key: &str, row_key: &str) -> Result<Url> {
        let resource = format!(
            "{}(PartitionKey='{}',RowKey='{}')",
            self.table,
            escape_string_literal(partition_key),
            escape_string_literal(row_key)
        );
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| GeocodeError::InvalidEndpoint(self.endpoint.to_string()))?
            .pop_if_empty()
            .push(&resource);
        url.set_query(self.credentials.as_deref());
        Ok(url)
    }

    pub fn build_request(&self, partition_key: &str, row_key: &str) -> Result<Request> {
        let url = self.entity_url(partition_key, row_key)?;
        let request = self
            .client
            .get(url)
            .header(ACCEPT, HeaderValue::from_static(TABLE_ACCEPT))
            .header("x-ms-version", HeaderValue::from_static(TABLE_SERVICE_VERSION))
            .build()?;
        Ok(request)
    }
}

#[async_trait]
impl GeocodeStore for TableGeocodeStore {
    #[instrument(name = "Table Point Read", skip(self), fields(table = %self.table), level = "debug")]
    async fn point_read(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<GeocodeEntity>> {
        let request = self.build_request(partition_key, row_key)?;
        let response = self.client.execute(request).await?;
        let status = response.status();
        let body = if status.is_success() {
            response.text().await?
        } else {
            response.text().await.unwrap_or_default()
        };
        decode_point_read(status, &body)
    }
}

/// Interpret a point-read response.
///
/// `404` means the entity does not exist. Any other non-success status is a
/// store failure carrying the response body.
pub fn decode_point_read(status: StatusCode, body: &str) -> Result<Option<GeocodeEntity>> {
    if status == StatusCode::NOT_FOUND {
        debug!("No geocoding entity for key");
        return Ok(None);
    }
    if !status.is_success() {
        warn!(status = status.as_u16(), "Geocoding store request failed");
        return Err(GeocodeError::Status {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }
    let entity = serde_json::from_str::<GeocodeEntity>(body)?;
    Ok(Some(entity))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TableGeocodeStore {
        TableGeocodeStore::new("https://example.table.core.windows.net", "postcodes").unwrap()
    }

    #[test]
    fn test_entity_url() {
        let url = store().entity_url("SW1A", "1AA").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.table.core.windows.net/postcodes(PartitionKey='SW1A',RowKey='1AA')"
        );
    }

    #[test]
    fn test_entity_url_with_trailing_slash_and_base_path() {
        let store =
            TableGeocodeStore::new("http://127.0.0.1:10002/devstoreaccount1/", "postcodes")
                .unwrap();
        let url = store.entity_url("M1", "1AE").unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:10002/devstoreaccount1/postcodes(PartitionKey='M1',RowKey='1AE')"
        );
    }

    #[test]
    fn test_entity_url_escapes_keys() {
        let url = store().entity_url("O'X", "1 A").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.table.core.windows.net/postcodes(PartitionKey='O''X',RowKey='1%20A')"
        );
    }

    #[test]
    fn test_credentials_are_appended() {
        let store = store().with_credentials("?sv=2019-02-02&sig=abc");
        let url = store.entity_url("SW1A", "1AA").unwrap();
        assert_eq!(url.query(), Some("sv=2019-02-02&sig=abc"));

        let cleared = store.with_credentials("");
        assert_eq!(cleared.entity_url("SW1A", "1AA").unwrap().query(), None);
    }

    #[test]
    fn test_request_headers() {
        let request = store().build_request("SW1A", "1AA").unwrap();
        assert_eq!(request.method(), &reqwest::Method::GET);
        assert_eq!(
            request.headers().get(ACCEPT).unwrap(),
            "application/json;odata=nometadata"
        );
        assert!(request.headers().contains_key("x-ms-version"));
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            TableGeocodeStore::new("not a url", "postcodes"),
            Err(GeocodeError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            TableGeocodeStore::new("mailto:someone@example.com", "postcodes"),
            Err(GeocodeError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_decode_point_read_found() {
        let entity = decode_point_read(
            StatusCode::OK,
            r#"{"PartitionKey":"SW1A","RowKey":"1AA","Lat":51.5,"Long":-0.14}"#,
        )
        .unwrap()
        .expect("Entity should be present");
        assert_eq!(
            entity.coordinate(),
            Some(crate::geocode::GeoCoordinate::new(51.5, -0.14))
        );
    }

    #[test]
    fn test_decode_point_read_not_found() {
        let body = r#"{"odata.error":{"code":"ResourceNotFound"}}"#;
        assert_eq!(decode_point_read(StatusCode::NOT_FOUND, body).unwrap(), None);
    }

    #[test]
    fn test_decode_point_read_failure_status() {
        let err = decode_point_read(StatusCode::SERVICE_UNAVAILABLE, "busy").unwrap_err();
        assert!(matches!(
            err,
            GeocodeError::Status { status: 503, ref body } if body == "busy"
        ));

        assert!(matches!(
            decode_point_read(StatusCode::FORBIDDEN, ""),
            Err(GeocodeError::Status { status: 403, .. })
        ));
    }

    #[test]
    fn test_decode_point_read_malformed_body() {
        assert!(matches!(
            decode_point_read(StatusCode::OK, "<html>not json</html>"),
            Err(GeocodeError::Decode(_))
        ));
    }

    #[test]
    fn test_debug_hides_credentials() {
        let store = store().with_credentials("sig=secret");
        let rendered = format!("{store:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("has_credentials: true"));
    }
}
