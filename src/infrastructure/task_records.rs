use crate::domain::models::{
    Category, CategoryDraft, DEFAULT_CATEGORY_ICON, DEFAULT_CATEGORY_ID, Priority, Task, TaskDraft,
};
use crate::infrastructure::record_gateway::Record;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;

pub const TASK_TABLE: &str = "task";
pub const CATEGORY_TABLE: &str = "category";

pub const FIELD_ID: &str = "Id";
pub const FIELD_NAME: &str = "Name";
pub const FIELD_TITLE: &str = "title";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_COMPLETED: &str = "completed";
pub const FIELD_PRIORITY: &str = "priority";
pub const FIELD_DUE_DATE: &str = "due_date";
pub const FIELD_CATEGORY_ID: &str = "category_id";
pub const FIELD_CREATED_AT: &str = "created_at";
pub const FIELD_ICON: &str = "icon";

pub const TASK_FIELDS: &[&str] = &[
    "Id",
    "Name",
    "Tags",
    "Owner",
    "CreatedOn",
    "CreatedBy",
    "ModifiedOn",
    "ModifiedBy",
    "title",
    "description",
    "completed",
    "priority",
    "due_date",
    "category_id",
    "created_at",
];

pub const CATEGORY_FIELDS: &[&str] = &[
    "Id",
    "Name",
    "Tags",
    "Owner",
    "CreatedOn",
    "CreatedBy",
    "ModifiedOn",
    "ModifiedBy",
    "icon",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_record_id(id: &str) -> Option<i64> {
    id.trim().parse::<i64>().ok()
}

fn record_id_string(record: &Record) -> Option<String> {
    let id = match record.get(FIELD_ID)? {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.trim().to_string(),
        _ => return None,
    };
    Some(id).filter(|id| !id.is_empty())
}

fn text_field<'a>(record: &'a Record, field: &str) -> Option<&'a str> {
    record
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn bool_field(record: &Record, field: &str) -> bool {
    match record.get(field) {
        Some(Value::Bool(value)) => *value,
        Some(Value::String(text)) => text.trim().eq_ignore_ascii_case("true"),
        Some(Value::Number(number)) => number.as_i64() == Some(1),
        _ => false,
    }
}

fn start_of_day(date: NaiveDate, timezone: Tz) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(0, 0, 0)?;
    timezone
        .from_local_datetime(&naive)
        .earliest()
        .map(|value| value.with_timezone(&Utc))
}

pub fn parse_store_datetime(value: &Value, timezone: Tz) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                return Some(parsed.with_timezone(&Utc));
            }
            let date_part = text.get(..10).unwrap_or(text);
            NaiveDate::parse_from_str(date_part, DATE_FORMAT)
                .ok()
                .and_then(|date| start_of_day(date, timezone))
        }
        Value::Number(number) => number
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}

pub fn format_due_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn decode_task(record: &Record, now: DateTime<Utc>, timezone: Tz) -> Option<Task> {
    let id = record_id_string(record)?;
    let title = text_field(record, FIELD_TITLE)
        .or_else(|| text_field(record, FIELD_NAME))
        .unwrap_or_default()
        .to_string();
    let parse_date = |field: &str| {
        record
            .get(field)
            .and_then(|value| parse_store_datetime(value, timezone))
            .unwrap_or(now)
    };

    Some(Task {
        id,
        title,
        description: record
            .get(FIELD_DESCRIPTION)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        completed: bool_field(record, FIELD_COMPLETED),
        priority: Priority::parse_or_default(record.get(FIELD_PRIORITY).and_then(Value::as_str)),
        due_date: parse_date(FIELD_DUE_DATE),
        category_id: text_field(record, FIELD_CATEGORY_ID)
            .unwrap_or(DEFAULT_CATEGORY_ID)
            .to_string(),
        created_at: parse_date(FIELD_CREATED_AT),
    })
}

fn draft_fields(draft: &TaskDraft, completed: bool) -> Record {
    let title = draft.title.trim().to_string();
    let mut record = Record::new();
    record.insert(FIELD_NAME.to_string(), Value::String(title.clone()));
    record.insert(FIELD_TITLE.to_string(), Value::String(title));
    record.insert(
        FIELD_DESCRIPTION.to_string(),
        Value::String(draft.description.clone()),
    );
    record.insert(FIELD_COMPLETED.to_string(), Value::Bool(completed));
    record.insert(
        FIELD_PRIORITY.to_string(),
        Value::String(draft.priority.as_str().to_string()),
    );
    record.insert(
        FIELD_DUE_DATE.to_string(),
        draft
            .due_date
            .map(|date| Value::String(format_due_date(date)))
            .unwrap_or(Value::Null),
    );
    record.insert(
        FIELD_CATEGORY_ID.to_string(),
        Value::String(draft.category_or_default().to_string()),
    );
    record
}

pub fn encode_new_task(draft: &TaskDraft, now: DateTime<Utc>) -> Record {
    let mut record = draft_fields(draft, false);
    record.insert(
        FIELD_CREATED_AT.to_string(),
        Value::String(now.to_rfc3339()),
    );
    record
}

pub fn encode_task_update(record_id: i64, draft: &TaskDraft) -> Record {
    let mut record = draft_fields(draft, draft.completed);
    record.insert(FIELD_ID.to_string(), Value::from(record_id));
    record
}

pub fn decode_category(record: &Record) -> Option<Category> {
    Some(Category {
        id: record_id_string(record)?,
        name: record
            .get(FIELD_NAME)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        icon: text_field(record, FIELD_ICON)
            .unwrap_or(DEFAULT_CATEGORY_ICON)
            .to_string(),
    })
}

pub fn encode_new_category(draft: &CategoryDraft) -> Record {
    let mut record = Record::new();
    record.insert(
        FIELD_NAME.to_string(),
        Value::String(draft.name.trim().to_string()),
    );
    record.insert(
        FIELD_ICON.to_string(),
        Value::String(draft.icon_or_default().to_string()),
    );
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().expect("object literal")
    }

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-16T09:00:00Z")
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    #[test]
    fn decode_task_fills_defaults() {
        let task = decode_task(&record(json!({ "Id": 5, "Name": "From name" })), fixed_now(), Tz::UTC)
            .expect("decoded task");

        assert_eq!(task.id, "5");
        assert_eq!(task.title, "From name");
        assert_eq!(task.description, "");
        assert!(!task.completed);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.category_id, "personal");
        assert_eq!(task.due_date, fixed_now());
        assert_eq!(task.created_at, fixed_now());
    }

    #[test]
    fn decode_task_reads_stored_values() {
        let task = decode_task(
            &record(json!({
                "Id": "17",
                "Name": "ignored",
                "title": "Buy milk",
                "description": "2 liters",
                "completed": true,
                "priority": "low",
                "due_date": "2024-01-10",
                "category_id": "shopping",
                "created_at": "2024-01-02T10:00:00Z"
            })),
            fixed_now(),
            chrono_tz::Asia::Tokyo,
        )
        .expect("decoded task");

        assert_eq!(task.id, "17");
        assert_eq!(task.title, "Buy milk");
        assert!(task.completed);
        assert_eq!(task.priority, Priority::Low);
        assert_eq!(
            task.due_date_in(chrono_tz::Asia::Tokyo),
            NaiveDate::from_ymd_opt(2024, 1, 10).expect("valid date")
        );
        assert_eq!(task.due_date.to_rfc3339(), "2024-01-09T15:00:00+00:00");
        assert_eq!(task.created_at.to_rfc3339(), "2024-01-02T10:00:00+00:00");
    }

    #[test]
    fn decode_task_without_id_is_skipped() {
        assert!(decode_task(&record(json!({ "title": "orphan" })), fixed_now(), Tz::UTC).is_none());
    }

    #[test]
    fn encode_new_task_forces_incomplete_and_stamps_creation() {
        let mut draft = TaskDraft::new(" Buy milk ");
        draft.completed = true;
        draft.priority = Priority::Low;
        draft.due_date = NaiveDate::from_ymd_opt(2024, 1, 10);
        draft.category_id = String::new();

        let encoded = encode_new_task(&draft, fixed_now());
        assert_eq!(encoded.get("completed"), Some(&json!(false)));
        assert_eq!(encoded.get("Name"), Some(&json!("Buy milk")));
        assert_eq!(encoded.get("title"), Some(&json!("Buy milk")));
        assert_eq!(encoded.get("due_date"), Some(&json!("2024-01-10")));
        assert_eq!(encoded.get("category_id"), Some(&json!("personal")));
        assert_eq!(encoded.get("created_at"), Some(&json!("2026-02-16T09:00:00+00:00")));
        assert!(!encoded.contains_key("Id"));
    }

    #[test]
    fn encode_task_update_sends_full_record_with_id() {
        let mut draft = TaskDraft::new("Call dentist");
        draft.completed = true;
        let encoded = encode_task_update(3, &draft);

        assert_eq!(encoded.get("Id"), Some(&json!(3)));
        assert_eq!(encoded.get("completed"), Some(&json!(true)));
        assert_eq!(encoded.get("due_date"), Some(&Value::Null));
        for field in ["Name", "title", "description", "priority", "category_id"] {
            assert!(encoded.contains_key(field), "missing {field}");
        }
        assert!(!encoded.contains_key("created_at"));
    }

    #[test]
    fn category_mapping_defaults_icon() {
        let category = decode_category(&record(json!({ "Id": 2, "Name": "Garden" }))).expect("category");
        assert_eq!(category, Category::new("2", "Garden", "Folder"));

        let encoded = encode_new_category(&CategoryDraft {
            name: "Garden".to_string(),
            icon: None,
        });
        assert_eq!(encoded.get("icon"), Some(&json!("Folder")));
    }

    #[test]
    fn store_datetime_accepts_epoch_millis() {
        let parsed = parse_store_datetime(&json!(1_700_000_000_000i64), Tz::UTC).expect("millis");
        assert_eq!(parsed.timestamp(), 1_700_000_000);
        assert!(parse_store_datetime(&json!("not a date"), Tz::UTC).is_none());
        assert_eq!(parse_record_id(" 42 "), Some(42));
        assert_eq!(parse_record_id("abc"), None);
    }
}
