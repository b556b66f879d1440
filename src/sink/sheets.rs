//! Google Sheets v4 REST client implementing [`TableStore`].
//!
//! Authentication is a bearer token supplied by the caller; obtaining one
//! from a service account is left to the deployment.

use crate::config::SheetsSettings;
use crate::error::SheetError;
use crate::sink::traits::{SubtableHandle, TableHandle, TableStore};
use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Grid size of a freshly created tab
const NEW_TAB_ROWS: u32 = 1000;
const NEW_TAB_COLUMNS: u32 = 10;

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

pub struct SheetsClient {
    client: Client,
    base_url: Url,
    token: String,
}

impl SheetsClient {
    pub fn new(settings: &SheetsSettings) -> Result<Self, SheetError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let base_url = Url::parse(&settings.base_url)
            .map_err(|e| SheetError::Url(format!("{}: {e}", settings.base_url)))?;

        Ok(Self {
            client,
            base_url,
            token: settings.token.clone(),
        })
    }

    /// `{base}/spreadsheets/{segments...}` with each segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url, SheetError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| SheetError::Url(format!("{} cannot be a base", self.base_url)))?;
            path.pop_if_empty().push("spreadsheets");
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    /// A1 range pointing at the first cell of `title`
    pub fn tab_range(title: &str) -> String {
        format!("'{}'!A1", title.replace('\'', "''"))
    }

    async fn check(response: Response) -> Result<Response, SheetError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or(body);
        Err(SheetError::Api {
            status: status.as_u16(),
            message,
        })
    }

    fn header_cells(header: &[&str]) -> Vec<Value> {
        header
            .iter()
            .map(|h| json!({ "userEnteredValue": { "stringValue": h } }))
            .collect()
    }
}

#[async_trait]
impl TableStore for SheetsClient {
    async fn open_table(&self, table_id: &str) -> Result<TableHandle, SheetError> {
        let url = self.endpoint(&[table_id])?;
        debug!("Opening spreadsheet {}", table_id);

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(&[("fields", "sheets.properties.title")])
            .send()
            .await?;
        let meta: SpreadsheetMeta = Self::check(response).await?.json().await?;

        Ok(TableHandle {
            table_id: table_id.to_string(),
            subtables: meta.sheets.into_iter().map(|s| s.properties.title).collect(),
        })
    }

    async fn get_or_create_subtable(
        &self,
        table: &TableHandle,
        name: &str,
        header: &[&str],
    ) -> Result<SubtableHandle, SheetError> {
        let handle = SubtableHandle {
            table_id: table.table_id.clone(),
            title: name.to_string(),
        };
        if table.subtables.iter().any(|t| t == name) {
            return Ok(handle);
        }

        // addSheet and the header write go in one atomic batchUpdate, so a
        // tab never exists without its header and only its creator writes one
        let sheet_id: i32 = rand::rng().random_range(1..i32::MAX);
        let body = json!({
            "requests": [
                {
                    "addSheet": {
                        "properties": {
                            "sheetId": sheet_id,
                            "title": name,
                            "gridProperties": {
                                "rowCount": NEW_TAB_ROWS,
                                "columnCount": NEW_TAB_COLUMNS
                            }
                        }
                    }
                },
                {
                    "updateCells": {
                        "start": { "sheetId": sheet_id, "rowIndex": 0, "columnIndex": 0 },
                        "rows": [{ "values": Self::header_cells(header) }],
                        "fields": "userEnteredValue"
                    }
                }
            ]
        });

        let url = self.endpoint(&[&format!("{}:batchUpdate", table.table_id)])?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        match Self::check(response).await {
            Ok(_) => {
                info!("Created tab '{}' with header row", name);
                Ok(handle)
            }
            Err(e) if e.is_duplicate_title(name) => {
                info!("Tab '{}' was created by another writer", name);
                Ok(handle)
            }
            Err(e) => Err(e),
        }
    }

    async fn append_rows(
        &self,
        subtable: &SubtableHandle,
        rows: &[Vec<String>],
    ) -> Result<(), SheetError> {
        let range = format!("{}:append", Self::tab_range(&subtable.title));
        let url = self.endpoint(&[&subtable.table_id, "values", &range])?;

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({ "majorDimension": "ROWS", "values": rows }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SheetsClient {
        SheetsClient::new(&SheetsSettings {
            base_url: server.uri(),
            token: "test-token".to_string(),
        })
        .unwrap()
    }

    fn handle(subtables: &[&str]) -> TableHandle {
        TableHandle {
            table_id: "sheet-1".to_string(),
            subtables: subtables.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn tab_range_quotes_title() {
        assert_eq!(SheetsClient::tab_range("Data"), "'Data'!A1");
        assert_eq!(SheetsClient::tab_range("Bob's"), "'Bob''s'!A1");
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let client = SheetsClient::new(&SheetsSettings {
            base_url: "https://sheets.googleapis.com/v4".to_string(),
            token: "t".to_string(),
        })
        .unwrap();
        let url = client.endpoint(&["abc:batchUpdate"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc:batchUpdate"
        );
    }

    #[tokio::test]
    async fn open_table_lists_tab_titles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/spreadsheets/sheet-1"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sheets": [
                    { "properties": { "title": "Data", "sheetId": 0 } },
                    { "properties": { "title": "Archive", "sheetId": 7 } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let table = client_for(&server).open_table("sheet-1").await.unwrap();
        assert_eq!(table.subtables, vec!["Data", "Archive"]);
    }

    #[tokio::test]
    async fn existing_tab_is_not_recreated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let sub = client_for(&server)
            .get_or_create_subtable(&handle(&["Data"]), "Data", &["Date"])
            .await
            .unwrap();
        assert_eq!(sub.title, "Data");
    }

    #[tokio::test]
    async fn missing_tab_is_created_with_header_in_one_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/spreadsheets/sheet-1:batchUpdate"))
            .and(body_partial_json(json!({
                "requests": [
                    { "addSheet": { "properties": { "title": "Data" } } },
                    { "updateCells": { "fields": "userEnteredValue" } }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let sub = client_for(&server)
            .get_or_create_subtable(&handle(&["Sheet1"]), "Data", &["Date", "Time"])
            .await
            .unwrap();
        assert_eq!(sub.table_id, "sheet-1");
    }

    #[tokio::test]
    async fn losing_creation_race_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/spreadsheets/sheet-1:batchUpdate"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": 400,
                    "message": "Invalid requests[0].addSheet: A sheet with the name \"Data\" already exists. Please enter another name.",
                    "status": "INVALID_ARGUMENT"
                }
            })))
            .mount(&server)
            .await;

        let result = client_for(&server)
            .get_or_create_subtable(&handle(&[]), "Data", &["Date"])
            .await;
        assert!(result.is_ok(), "expected Ok, got: {result:?}");
    }

    #[tokio::test]
    async fn sheet_id_clash_is_an_error_so_the_attempt_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/spreadsheets/sheet-1:batchUpdate"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": 400,
                    "message": "Invalid requests[0].addSheet: Sheet with ID 42 already exists.",
                    "status": "INVALID_ARGUMENT"
                }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .get_or_create_subtable(&handle(&[]), "Data", &["Date"])
            .await
            .unwrap_err();
        assert!(matches!(err, SheetError::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn append_posts_all_rows_raw() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/spreadsheets/sheet-1/values/.*Data.*:append$"))
            .and(query_param("valueInputOption", "RAW"))
            .and(query_param("insertDataOption", "INSERT_ROWS"))
            .and(body_partial_json(json!({
                "values": [["a", "1"], ["b", "2"]]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let sub = SubtableHandle {
            table_id: "sheet-1".to_string(),
            title: "Data".to_string(),
        };
        let rows = vec![
            vec!["a".to_string(), "1".to_string()],
            vec!["b".to_string(), "2".to_string()],
        ];
        client_for(&server).append_rows(&sub, &rows).await.unwrap();
    }

    #[tokio::test]
    async fn rate_limit_surfaces_as_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "code": 429, "message": "Quota exceeded for quota metric 'Write requests'" }
            })))
            .mount(&server)
            .await;

        let sub = SubtableHandle {
            table_id: "sheet-1".to_string(),
            title: "Data".to_string(),
        };
        let err = client_for(&server)
            .append_rows(&sub, &[vec!["x".to_string()]])
            .await
            .unwrap_err();
        assert!(
            matches!(err, SheetError::Api { status: 429, ref message } if message.starts_with("Quota exceeded"))
        );
    }
}
