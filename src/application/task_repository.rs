use crate::application::NowProvider;
use crate::application::error::AppError;
use crate::domain::models::{Task, TaskDraft, TaskFilter};
use crate::infrastructure::record_gateway::{FetchQuery, MutationResponse, RecordGateway, SortType};
use crate::infrastructure::task_records::{
    FIELD_COMPLETED, FIELD_CREATED_AT, TASK_FIELDS, TASK_TABLE, decode_task, encode_new_task,
    encode_task_update, parse_record_id,
};
use chrono::Utc;
use chrono_tz::Tz;
use serde_json::Value;
use std::sync::Arc;

pub struct TaskRepository<G>
where
    G: RecordGateway,
{
    gateway: Arc<G>,
    timezone: Tz,
    now_provider: NowProvider,
}

impl<G> TaskRepository<G>
where
    G: RecordGateway,
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            timezone: Tz::UTC,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn query_for(filter: TaskFilter) -> FetchQuery {
        let query = FetchQuery::new(TASK_FIELDS).order_by(FIELD_CREATED_AT, SortType::Desc);
        match filter.completed_predicate() {
            Some(completed) => query.where_exact(FIELD_COMPLETED, Value::Bool(completed)),
            None => query,
        }
    }

    pub async fn fetch_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, AppError> {
        let query = Self::query_for(filter);
        let records = self
            .gateway
            .fetch_records(TASK_TABLE, &query)
            .await
            .map_err(|error| {
                tracing::warn!(filter = filter.as_str(), %error, "task fetch failed");
                AppError::Fetch(error.to_string())
            })?;

        let now = (self.now_provider)();
        let tasks = records
            .iter()
            .filter_map(|record| {
                let decoded = decode_task(record, now, self.timezone);
                if decoded.is_none() {
                    tracing::warn!("skipping task record without id");
                }
                decoded
            })
            .collect::<Vec<_>>();
        tracing::debug!(filter = filter.as_str(), count = tasks.len(), "fetched tasks");
        Ok(tasks)
    }

    pub async fn get_task_by_id(&self, task_id: &str) -> Result<Option<Task>, AppError> {
        let Some(record_id) = parse_record_id(task_id) else {
            return Ok(None);
        };
        let fields = TASK_FIELDS.iter().map(|field| field.to_string()).collect::<Vec<_>>();
        let record = self
            .gateway
            .get_record_by_id(TASK_TABLE, record_id, &fields)
            .await
            .map_err(|error| AppError::Fetch(error.to_string()))?;

        let now = (self.now_provider)();
        Ok(record.and_then(|record| decode_task(&record, now, self.timezone)))
    }

    pub async fn create_task(&self, draft: &TaskDraft) -> Result<Option<Task>, AppError> {
        draft.validate().map_err(AppError::Validation)?;
        let now = (self.now_provider)();
        let record = encode_new_task(draft, now);
        let response = self
            .gateway
            .create_records(TASK_TABLE, vec![record])
            .await
            .map_err(|error| AppError::Create(error.to_string()))?;

        let created = self
            .first_task(&response)
            .map_err(|message| AppError::Create(message.unwrap_or_else(|| "Failed to create task".to_string())))?;
        tracing::info!(task_id = created.as_ref().map(|task| task.id.as_str()), "created task");
        Ok(created)
    }

    pub async fn update_task(&self, task_id: &str, draft: &TaskDraft) -> Result<Option<Task>, AppError> {
        let record_id = parse_record_id(task_id)
            .ok_or_else(|| AppError::Update(format!("invalid task id: {task_id}")))?;
        let record = encode_task_update(record_id, draft);
        let response = self
            .gateway
            .update_records(TASK_TABLE, vec![record])
            .await
            .map_err(|error| AppError::Update(error.to_string()))?;

        let updated = self
            .first_task(&response)
            .map_err(|message| AppError::Update(message.unwrap_or_else(|| "Failed to update task".to_string())))?;
        tracing::info!(task_id, "updated task");
        Ok(updated)
    }

    pub async fn delete_task(&self, task_id: &str) -> Result<(), AppError> {
        let record_id = parse_record_id(task_id)
            .ok_or_else(|| AppError::Delete(format!("invalid task id: {task_id}")))?;
        let response = self
            .gateway
            .delete_records(TASK_TABLE, &[record_id])
            .await
            .map_err(|error| AppError::Delete(error.to_string()))?;

        if !response.success {
            return Err(AppError::Delete(
                response
                    .message
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| "Failed to delete task".to_string()),
            ));
        }
        tracing::info!(task_id, "deleted task");
        Ok(())
    }

    fn first_task(&self, response: &MutationResponse) -> Result<Option<Task>, Option<String>> {
        let Some(result) = response.first_success() else {
            return Err(response.failure_message());
        };
        let now = (self.now_provider)();
        Ok(result
            .data
            .as_ref()
            .and_then(|record| decode_task(record, now, self.timezone)))
    }
}
