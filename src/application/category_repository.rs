use crate::application::error::AppError;
use crate::domain::models::{Category, CategoryDraft, fallback_categories};
use crate::infrastructure::record_gateway::{FetchQuery, RecordGateway, SortType};
use crate::infrastructure::task_records::{
    CATEGORY_FIELDS, CATEGORY_TABLE, FIELD_NAME, decode_category, encode_new_category,
    parse_record_id,
};
use std::sync::Arc;

pub struct CategoryRepository<G>
where
    G: RecordGateway,
{
    gateway: Arc<G>,
}

impl<G> CategoryRepository<G>
where
    G: RecordGateway,
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    pub async fn fetch_categories(&self) -> Vec<Category> {
        let query = FetchQuery::new(CATEGORY_FIELDS).order_by(FIELD_NAME, SortType::Asc);
        let records = match self.gateway.fetch_records(CATEGORY_TABLE, &query).await {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!(%error, "category fetch failed; using fallback categories");
                return fallback_categories();
            }
        };

        let categories = records.iter().filter_map(decode_category).collect::<Vec<_>>();
        if categories.is_empty() {
            tracing::debug!("no stored categories; using fallback categories");
            return fallback_categories();
        }
        categories
    }

    pub async fn create_category(&self, draft: &CategoryDraft) -> Result<Option<Category>, AppError> {
        draft.validate().map_err(AppError::Validation)?;
        let response = self
            .gateway
            .create_records(CATEGORY_TABLE, vec![encode_new_category(draft)])
            .await
            .map_err(|error| AppError::Create(error.to_string()))?;

        let Some(result) = response.first_success() else {
            return Err(AppError::Create(
                response
                    .failure_message()
                    .unwrap_or_else(|| "Failed to create category".to_string()),
            ));
        };
        tracing::info!(name = draft.name.trim(), "created category");
        Ok(result.data.as_ref().and_then(decode_category))
    }

    pub async fn delete_category(&self, category_id: &str) -> Result<(), AppError> {
        let record_id = parse_record_id(category_id)
            .ok_or_else(|| AppError::Delete(format!("invalid category id: {category_id}")))?;
        let response = self
            .gateway
            .delete_records(CATEGORY_TABLE, &[record_id])
            .await
            .map_err(|error| AppError::Delete(error.to_string()))?;
        if !response.success {
            return Err(AppError::Delete("Failed to delete category".to_string()));
        }
        tracing::info!(category_id, "deleted category");
        Ok(())
    }
}
