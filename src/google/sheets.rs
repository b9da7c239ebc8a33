//! Minimal Google Sheets v4 values client.

use std::sync::Arc;

use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::google::auth::AccessTokenProvider;
use crate::http::check_status;

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Values API of one spreadsheet.
pub struct SheetsClient {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl SheetsClient {
    pub fn new(
        client: Client,
        base_url: &str,
        spreadsheet_id: impl Into<String>,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            tokens,
        }
    }

    fn url(&self, tail: &[&str]) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProviderError::local(format!("invalid sheets base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::local("sheets base url cannot be a base"))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str()])
            .extend(tail);
        Ok(url)
    }

    /// Cell values of `range` as displayed strings. Rows are ragged:
    /// trailing empty cells are omitted by the API.
    pub async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, ProviderError> {
        let url = self.url(&["values", range])?;
        let token = self.tokens.access_token().await?;
        let response = self.client.get(url).bearer_auth(token).send().await?;
        let body: ValueRange = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::invalid(format!("sheet values: {}", e)))?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    /// Write several ranges in one request.
    pub async fn batch_update(&self, data: &[(String, Vec<Vec<String>>)]) -> Result<(), ProviderError> {
        if data.is_empty() {
            return Ok(());
        }
        let url = self.url(&["values:batchUpdate"])?;
        let body = json!({
            "valueInputOption": "RAW",
            "data": data
                .iter()
                .map(|(range, values)| json!({ "range": range, "values": values }))
                .collect::<Vec<_>>(),
        });
        let token = self.tokens.access_token().await?;
        let response = self.client.post(url).bearer_auth(token).json(&body).send().await?;
        check_status(response).await?;
        Ok(())
    }

    /// Append rows after the last row of the table found in `range`.
    pub async fn append(&self, range: &str, rows: &[Vec<String>]) -> Result<(), ProviderError> {
        let segment = format!("{}:append", range);
        let mut url = self.url(&[segment.as_str()])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "values": rows }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A1 column letters for a zero-based column index.
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// `sheet!range`, quoting the sheet name when it is not a plain word.
pub fn a1_range(sheet: &str, range: &str) -> String {
    if sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        format!("{}!{}", sheet, range)
    } else {
        format!("'{}'!{}", sheet.replace('\'', "''"), range)
    }
}
