use crate::infrastructure::config::BackendConfig;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

pub type Record = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortType {
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderBy {
    #[serde(rename = "fieldName")]
    pub field_name: String,
    #[serde(rename = "SortType")]
    pub sort_type: SortType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WhereOperator {
    ExactMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhereClause {
    #[serde(rename = "fieldName")]
    pub field_name: String,
    pub operator: WhereOperator,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FetchQuery {
    pub fields: Vec<String>,
    #[serde(rename = "orderBy", skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderBy>,
    #[serde(rename = "where", skip_serializing_if = "Vec::is_empty")]
    pub where_clauses: Vec<WhereClause>,
}

impl FetchQuery {
    pub fn new(fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|field| field.to_string()).collect(),
            order_by: Vec::new(),
            where_clauses: Vec::new(),
        }
    }

    pub fn order_by(mut self, field_name: &str, sort_type: SortType) -> Self {
        self.order_by.push(OrderBy {
            field_name: field_name.to_string(),
            sort_type,
        });
        self
    }

    pub fn where_exact(mut self, field_name: &str, value: Value) -> Self {
        self.where_clauses.push(WhereClause {
            field_name: field_name.to_string(),
            operator: WhereOperator::ExactMatch,
            values: vec![value],
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MutationResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Record>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MutationResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub results: Vec<MutationResult>,
}

impl MutationResponse {
    pub fn first_success(&self) -> Option<&MutationResult> {
        if !self.success {
            return None;
        }
        self.results.first().filter(|result| result.success)
    }

    pub fn failure_message(&self) -> Option<String> {
        self.results
            .first()
            .and_then(|result| result.message.clone())
            .or_else(|| self.message.clone())
            .map(|message| message.trim().to_string())
            .filter(|message| !message.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeleteResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[async_trait]
pub trait RecordGateway: Send + Sync {
    async fn fetch_records(&self, table: &str, query: &FetchQuery) -> Result<Vec<Record>, InfraError>;

    async fn get_record_by_id(
        &self,
        table: &str,
        record_id: i64,
        fields: &[String],
    ) -> Result<Option<Record>, InfraError>;

    async fn create_records(&self, table: &str, records: Vec<Record>) -> Result<MutationResponse, InfraError>;

    async fn update_records(&self, table: &str, records: Vec<Record>) -> Result<MutationResponse, InfraError>;

    async fn delete_records(&self, table: &str, record_ids: &[i64]) -> Result<DeleteResponse, InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestRecordGateway {
    client: Client,
    base_url: Url,
    project_id: String,
    public_key: String,
}

#[derive(Debug, Deserialize)]
struct FetchRecordsResponse {
    #[serde(default = "default_success")]
    success: bool,
    message: Option<String>,
    data: Option<Vec<Record>>,
}

#[derive(Debug, Deserialize)]
struct GetRecordResponse {
    #[serde(default = "default_success")]
    success: bool,
    message: Option<String>,
    data: Option<Record>,
}

#[derive(Debug, Serialize)]
struct RecordsPayload {
    records: Vec<Record>,
}

#[derive(Debug, Serialize)]
struct DeletePayload<'a> {
    #[serde(rename = "RecordIds")]
    record_ids: &'a [i64],
}

fn default_success() -> bool {
    true
}

impl ReqwestRecordGateway {
    pub fn new(config: &BackendConfig) -> Result<Self, InfraError> {
        let mut base_url = Url::parse(config.base_url.trim())
            .map_err(|error| InfraError::InvalidConfig(format!("invalid backend base url: {error}")))?;
        if base_url.cannot_be_a_base() {
            return Err(InfraError::InvalidConfig(
                "backend base url cannot be a base".to_string(),
            ));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self::ensure_non_empty(&config.project_id, "project id")
            .map_err(|_| InfraError::InvalidConfig("project id must not be empty".to_string()))?;
        Self::ensure_non_empty(&config.public_key, "public key")
            .map_err(|_| InfraError::InvalidConfig("public key must not be empty".to_string()))?;

        Ok(Self {
            client: Client::new(),
            base_url,
            project_id: config.project_id.trim().to_string(),
            public_key: config.public_key.trim().to_string(),
        })
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::Remote(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn remote_http_error(status: StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("record store error: http {}", status.as_u16())
        } else {
            format!("record store error: http {}; body={body}", status.as_u16())
        };
        InfraError::Remote(message)
    }

    fn records_endpoint(&self, table: &str) -> Result<Url, InfraError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| InfraError::Remote("record store URL cannot be a base".to_string()))?;
            segments.pop_if_empty();
            segments.push("projects");
            segments.push(&self.project_id);
            segments.push("tables");
            segments.push(table);
            segments.push("records");
        }
        Ok(url)
    }

    fn record_endpoint(&self, table: &str, suffix: &str) -> Result<Url, InfraError> {
        let mut url = self.records_endpoint(table)?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| InfraError::Remote("record store URL cannot be a base".to_string()))?;
            segments.push(suffix);
        }
        Ok(url)
    }

    async fn execute(&self, request: RequestBuilder, action: &str) -> Result<(StatusCode, String), InfraError> {
        let response = request
            .bearer_auth(&self.public_key)
            .send()
            .await
            .map_err(|error| InfraError::Remote(format!("network error while {action}: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Remote(format!("failed reading response while {action}: {error}")))?;
        Ok((status, body))
    }

    fn parse_body<T: DeserializeOwned>(body: &str, action: &str) -> Result<T, InfraError> {
        serde_json::from_str(body).map_err(|error| {
            InfraError::Remote(format!("invalid payload while {action}: {error}; body={body}"))
        })
    }

    async fn mutate(&self, request: RequestBuilder, action: &str) -> Result<MutationResponse, InfraError> {
        let (status, body) = self.execute(request, action).await?;
        if !status.is_success() {
            return Err(Self::remote_http_error(status, &body));
        }
        Self::parse_body(&body, action)
    }
}

#[async_trait]
impl RecordGateway for ReqwestRecordGateway {
    async fn fetch_records(&self, table: &str, query: &FetchQuery) -> Result<Vec<Record>, InfraError> {
        Self::ensure_non_empty(table, "table")?;
        let endpoint = self.record_endpoint(table, "query")?;
        let (status, body) = self
            .execute(self.client.post(endpoint).json(query), "fetching records")
            .await?;
        if !status.is_success() {
            return Err(Self::remote_http_error(status, &body));
        }

        let parsed: FetchRecordsResponse = Self::parse_body(&body, "fetching records")?;
        if !parsed.success {
            return Err(InfraError::Remote(
                parsed
                    .message
                    .unwrap_or_else(|| format!("fetch from table {table} failed")),
            ));
        }
        Ok(parsed.data.unwrap_or_default())
    }

    async fn get_record_by_id(
        &self,
        table: &str,
        record_id: i64,
        fields: &[String],
    ) -> Result<Option<Record>, InfraError> {
        Self::ensure_non_empty(table, "table")?;
        let endpoint = self.record_endpoint(table, &record_id.to_string())?;
        let mut request = self.client.get(endpoint);
        if !fields.is_empty() {
            request = request.query(&[("fields", fields.join(","))]);
        }

        let (status, body) = self.execute(request, "fetching record by id").await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::remote_http_error(status, &body));
        }

        let parsed: GetRecordResponse = Self::parse_body(&body, "fetching record by id")?;
        if !parsed.success {
            return Err(InfraError::Remote(
                parsed
                    .message
                    .unwrap_or_else(|| format!("get record {record_id} from table {table} failed")),
            ));
        }
        Ok(parsed.data)
    }

    async fn create_records(&self, table: &str, records: Vec<Record>) -> Result<MutationResponse, InfraError> {
        Self::ensure_non_empty(table, "table")?;
        let endpoint = self.records_endpoint(table)?;
        let request = self.client.post(endpoint).json(&RecordsPayload { records });
        self.mutate(request, "creating records").await
    }

    async fn update_records(&self, table: &str, records: Vec<Record>) -> Result<MutationResponse, InfraError> {
        Self::ensure_non_empty(table, "table")?;
        let endpoint = self.records_endpoint(table)?;
        let request = self.client.put(endpoint).json(&RecordsPayload { records });
        self.mutate(request, "updating records").await
    }

    async fn delete_records(&self, table: &str, record_ids: &[i64]) -> Result<DeleteResponse, InfraError> {
        Self::ensure_non_empty(table, "table")?;
        let endpoint = self.records_endpoint(table)?;
        let request = self
            .client
            .delete(endpoint)
            .json(&DeletePayload { record_ids });

        let (status, body) = self.execute(request, "deleting records").await?;
        if !status.is_success() {
            return Err(Self::remote_http_error(status, &body));
        }
        Self::parse_body(&body, "deleting records")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config(base_url: &str) -> BackendConfig {
        BackendConfig {
            base_url: base_url.to_string(),
            project_id: "proj-1".to_string(),
            public_key: "pk-test".to_string(),
        }
    }

    #[test]
    fn fetch_query_serializes_store_field_names() {
        let query = FetchQuery::new(&["Id", "title"])
            .order_by("created_at", SortType::Desc)
            .where_exact("completed", Value::Bool(true));

        let value = serde_json::to_value(&query).expect("serialize query");
        assert_eq!(
            value,
            serde_json::json!({
                "fields": ["Id", "title"],
                "orderBy": [{ "fieldName": "created_at", "SortType": "DESC" }],
                "where": [{ "fieldName": "completed", "operator": "ExactMatch", "values": [true] }]
            })
        );
    }

    #[test]
    fn fetch_query_omits_empty_clauses() {
        let value = serde_json::to_value(FetchQuery::new(&["Name"])).expect("serialize query");
        assert_eq!(value, serde_json::json!({ "fields": ["Name"] }));
    }

    #[test]
    fn first_success_requires_top_level_and_first_result_success() {
        let response: MutationResponse = serde_json::from_value(serde_json::json!({
            "success": true,
            "results": [{ "success": false, "message": "title is required" }]
        }))
        .expect("deserialize response");
        assert!(response.first_success().is_none());
        assert_eq!(response.failure_message().as_deref(), Some("title is required"));

        let response: MutationResponse = serde_json::from_value(serde_json::json!({
            "success": true,
            "results": [{ "success": true, "data": { "Id": 7 } }]
        }))
        .expect("deserialize response");
        assert!(response.first_success().is_some());
    }

    #[test]
    fn failure_message_falls_back_to_top_level_message() {
        let response = MutationResponse {
            success: false,
            message: Some("quota exceeded".to_string()),
            results: Vec::new(),
        };
        assert_eq!(response.failure_message().as_deref(), Some("quota exceeded"));
        assert!(MutationResponse::default().failure_message().is_none());
    }

    #[test]
    fn endpoints_are_scoped_to_project_and_table() {
        let gateway = ReqwestRecordGateway::new(&sample_config("https://records.test/api")).expect("gateway");
        let url = gateway.record_endpoint("task", "query").expect("endpoint");
        assert_eq!(
            url.as_str(),
            "https://records.test/api/projects/proj-1/tables/task/records/query"
        );
    }

    #[test]
    fn new_rejects_missing_credentials() {
        let mut config = sample_config("https://records.test/");
        config.public_key = "  ".to_string();
        assert!(matches!(
            ReqwestRecordGateway::new(&config),
            Err(InfraError::InvalidConfig(_))
        ));
    }
}
