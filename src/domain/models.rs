use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CATEGORY_ID: &str = "personal";
pub const DEFAULT_CATEGORY_ICON: &str = "Folder";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("high") => Self::High,
            Some("low") => Self::Low,
            _ => Self::Medium,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::High => "High Priority",
            Self::Medium => "Medium Priority",
            Self::Low => "Low Priority",
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            Self::High => "priority-high",
            Self::Medium => "priority-medium",
            Self::Low => "priority-low",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskFilter {
    #[default]
    All,
    Active,
    Completed,
    Overdue,
}

impl TaskFilter {
    pub const ALL: [TaskFilter; 4] = [
        TaskFilter::All,
        TaskFilter::Active,
        TaskFilter::Completed,
        TaskFilter::Overdue,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Overdue => "overdue",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Some(Self::All),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "overdue" => Some(Self::Overdue),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::All => "All Tasks",
            Self::Active => "Active",
            Self::Completed => "Completed",
            Self::Overdue => "Overdue",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::All => "List",
            Self::Active => "Circle",
            Self::Completed => "CheckCircle",
            Self::Overdue => "AlertCircle",
        }
    }

    pub fn completed_predicate(self) -> Option<bool> {
        match self {
            Self::Active => Some(false),
            Self::Completed => Some(true),
            Self::All | Self::Overdue => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub priority: Priority,
    pub due_date: DateTime<Utc>,
    pub category_id: String,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn due_date_in(&self, timezone: Tz) -> NaiveDate {
        self.due_date.with_timezone(&timezone).date_naive()
    }

    pub fn to_draft(&self, timezone: Tz) -> TaskDraft {
        TaskDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            completed: self.completed,
            priority: self.priority,
            due_date: Some(self.due_date_in(timezone)),
            category_id: self.category_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub category_id: String,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            completed: false,
            priority: Priority::Medium,
            due_date: None,
            category_id: DEFAULT_CATEGORY_ID.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.title, "task.title")
    }

    pub fn category_or_default(&self) -> &str {
        let category_id = self.category_id.trim();
        if category_id.is_empty() {
            DEFAULT_CATEGORY_ID
        } else {
            category_id
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub icon: String,
}

impl Category {
    pub fn new(id: &str, name: &str, icon: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            icon: icon.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryDraft {
    pub name: String,
    pub icon: Option<String>,
}

impl CategoryDraft {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.name, "category.name")
    }

    pub fn icon_or_default(&self) -> &str {
        self.icon
            .as_deref()
            .map(str::trim)
            .filter(|icon| !icon.is_empty())
            .unwrap_or(DEFAULT_CATEGORY_ICON)
    }
}

pub fn fallback_categories() -> Vec<Category> {
    vec![
        Category::new("work", "Work", "Briefcase"),
        Category::new("personal", "Personal", "User"),
        Category::new("shopping", "Shopping", "ShoppingCart"),
    ]
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}
