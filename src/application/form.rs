use crate::application::error::AppError;
use crate::domain::models::{DEFAULT_CATEGORY_ID, Priority, Task, TaskDraft};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub const BLANK_TITLE_MESSAGE: &str = "Please enter a task title";
const DATE_INPUT_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskForm {
    pub open: bool,
    pub editing_task_id: Option<String>,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: String,
    pub category_id: String,
}

impl TaskForm {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            open: false,
            editing_task_id: None,
            title: String::new(),
            description: String::new(),
            priority: Priority::Medium,
            due_date: today.format(DATE_INPUT_FORMAT).to_string(),
            category_id: DEFAULT_CATEGORY_ID.to_string(),
        }
    }

    pub fn reset(&mut self, today: NaiveDate) {
        *self = Self::new(today);
    }

    pub fn begin_edit(&mut self, task: &Task, timezone: Tz) {
        *self = Self {
            open: true,
            editing_task_id: Some(task.id.clone()),
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority,
            due_date: task.due_date_in(timezone).format(DATE_INPUT_FORMAT).to_string(),
            category_id: task.category_id.clone(),
        };
    }

    pub fn is_editing(&self) -> bool {
        self.editing_task_id.is_some()
    }

    pub fn to_draft(&self) -> Result<TaskDraft, AppError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(AppError::Validation(BLANK_TITLE_MESSAGE.to_string()));
        }

        let due_date = match self.due_date.trim() {
            "" => None,
            raw => Some(NaiveDate::parse_from_str(raw, DATE_INPUT_FORMAT).map_err(|_| {
                AppError::Validation("Please enter a due date as YYYY-MM-DD".to_string())
            })?),
        };

        Ok(TaskDraft {
            title: title.to_string(),
            description: self.description.trim().to_string(),
            completed: false,
            priority: self.priority,
            due_date,
            category_id: match self.category_id.trim() {
                "" => DEFAULT_CATEGORY_ID.to_string(),
                category_id => category_id.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date")
    }

    #[test]
    fn defaults_match_a_fresh_form() {
        let form = TaskForm::new(today());
        assert!(!form.open);
        assert!(!form.is_editing());
        assert_eq!(form.due_date, "2026-02-16");
        assert_eq!(form.priority, Priority::Medium);
        assert_eq!(form.category_id, "personal");
    }

    #[test]
    fn blank_title_is_a_validation_error() {
        let mut form = TaskForm::new(today());
        form.title = "   ".to_string();
        match form.to_draft() {
            Err(AppError::Validation(message)) => assert_eq!(message, BLANK_TITLE_MESSAGE),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_due_date_is_rejected_and_blank_is_none() {
        let mut form = TaskForm::new(today());
        form.title = "Pay rent".to_string();
        form.due_date = "16/02/2026".to_string();
        assert!(matches!(form.to_draft(), Err(AppError::Validation(_))));

        form.due_date = String::new();
        assert_eq!(form.to_draft().expect("draft").due_date, None);
    }

    #[test]
    fn begin_edit_copies_task_fields() {
        let task = Task {
            id: "4".to_string(),
            title: "Call dentist".to_string(),
            description: "Schedule appointment".to_string(),
            completed: true,
            priority: Priority::Low,
            due_date: DateTime::parse_from_rfc3339("2026-02-17T00:00:00Z")
                .expect("valid datetime")
                .with_timezone(&Utc),
            category_id: "personal".to_string(),
            created_at: Utc::now(),
        };
        let mut form = TaskForm::new(today());
        form.begin_edit(&task, Tz::UTC);

        assert!(form.open);
        assert_eq!(form.editing_task_id.as_deref(), Some("4"));
        assert_eq!(form.due_date, "2026-02-17");

        let draft = form.to_draft().expect("draft");
        assert_eq!(draft.title, "Call dentist");
        assert_eq!(draft.priority, Priority::Low);

        form.reset(today());
        assert_eq!(form, TaskForm::new(today()));
    }
}
