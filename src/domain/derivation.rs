use crate::domain::models::{Category, Priority, Task, TaskFilter};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;

pub const UNKNOWN_CATEGORY_NAME: &str = "Unknown";
pub const UNKNOWN_CATEGORY_ICON: &str = "Circle";

pub fn today(now: DateTime<Utc>, timezone: Tz) -> NaiveDate {
    now.with_timezone(&timezone).date_naive()
}

pub fn is_overdue(task: &Task, now: DateTime<Utc>, timezone: Tz) -> bool {
    !task.completed && task.due_date < now && task.due_date_in(timezone) != today(now, timezone)
}

pub fn matches_filter(task: &Task, filter: TaskFilter, now: DateTime<Utc>, timezone: Tz) -> bool {
    match filter {
        TaskFilter::All => true,
        TaskFilter::Active => !task.completed,
        TaskFilter::Completed => task.completed,
        TaskFilter::Overdue => is_overdue(task, now, timezone),
    }
}

pub fn filter_tasks<'a>(
    tasks: &'a [Task],
    filter: TaskFilter,
    now: DateTime<Utc>,
    timezone: Tz,
) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|task| matches_filter(task, filter, now, timezone))
        .collect()
}

pub fn date_label(due_date: DateTime<Utc>, now: DateTime<Utc>, timezone: Tz) -> String {
    let due_day = due_date.with_timezone(&timezone).date_naive();
    let today = today(now, timezone);
    if due_day == today {
        return "Today".to_string();
    }
    if today.succ_opt() == Some(due_day) {
        return "Tomorrow".to_string();
    }
    if due_date < now {
        return "Overdue".to_string();
    }
    due_day.format("%b %d").to_string()
}

pub fn priority_class(priority: Priority) -> &'static str {
    priority.css_class()
}

pub fn resolve_category(categories: &[Category], category_id: &str) -> Category {
    categories
        .iter()
        .find(|category| category.id == category_id)
        .cloned()
        .unwrap_or_else(|| Category {
            id: category_id.to_string(),
            name: UNKNOWN_CATEGORY_NAME.to_string(),
            icon: UNKNOWN_CATEGORY_ICON.to_string(),
        })
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct FilterOption {
    pub filter: TaskFilter,
    pub label: &'static str,
    pub icon: &'static str,
    pub selected: bool,
}

pub fn filter_options(current: TaskFilter) -> Vec<FilterOption> {
    TaskFilter::ALL
        .into_iter()
        .map(|filter| FilterOption {
            filter,
            label: filter.label(),
            icon: filter.icon(),
            selected: filter == current,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PriorityOption {
    pub priority: Priority,
    pub label: &'static str,
    pub class: &'static str,
}

pub fn priority_options() -> Vec<PriorityOption> {
    Priority::ALL
        .into_iter()
        .map(|priority| PriorityOption {
            priority,
            label: priority.label(),
            class: priority_class(priority),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct TaskCounts {
    pub pending: usize,
    pub completed: usize,
}

pub fn task_counts<'a, I>(tasks: I) -> TaskCounts
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks.into_iter().fold(TaskCounts::default(), |mut counts, task| {
        if task.completed {
            counts.completed += 1;
        } else {
            counts.pending += 1;
        }
        counts
    })
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TaskView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub priority: Priority,
    pub priority_label: String,
    pub priority_class: String,
    pub due_date: String,
    pub date_label: String,
    pub overdue: bool,
    pub category_id: String,
    pub category_name: String,
    pub category_icon: String,
}

pub fn task_view(task: &Task, categories: &[Category], now: DateTime<Utc>, timezone: Tz) -> TaskView {
    let category = resolve_category(categories, &task.category_id);
    TaskView {
        id: task.id.clone(),
        title: task.title.clone(),
        description: task.description.clone(),
        completed: task.completed,
        priority: task.priority,
        priority_label: task.priority.label().to_string(),
        priority_class: priority_class(task.priority).to_string(),
        due_date: task.due_date_in(timezone).format("%Y-%m-%d").to_string(),
        date_label: date_label(task.due_date, now, timezone),
        overdue: is_overdue(task, now, timezone),
        category_id: task.category_id.clone(),
        category_name: category.name,
        category_icon: category.icon,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::fallback_categories;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-10T15:30:00Z")
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn task_due(id: &str, due_date: DateTime<Utc>, completed: bool) -> Task {
        Task {
            id: id.to_string(),
            title: format!("task {id}"),
            description: String::new(),
            completed,
            priority: Priority::Medium,
            due_date,
            category_id: "personal".to_string(),
            created_at: fixed_now(),
        }
    }

    fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
        Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight"))
    }

    #[test]
    fn date_label_scenarios() {
        let now = fixed_now();
        let today = today(now, Tz::UTC);

        assert_eq!(date_label(start_of_day(today), now, Tz::UTC), "Today");
        assert_eq!(date_label(now + Duration::hours(2), now, Tz::UTC), "Today");
        assert_eq!(date_label(start_of_day(today + Duration::days(1)), now, Tz::UTC), "Tomorrow");
        assert_eq!(date_label(start_of_day(today - Duration::days(1)), now, Tz::UTC), "Overdue");
        assert_eq!(date_label(start_of_day(today + Duration::days(10)), now, Tz::UTC), "Mar 20");
    }

    #[test]
    fn date_label_uses_display_timezone() {
        // 01:00 UTC on the 11th is still the 10th in New York.
        let now = Utc.with_ymd_and_hms(2026, 3, 11, 1, 0, 0).single().expect("valid now");
        let due = Utc.with_ymd_and_hms(2026, 3, 10, 16, 0, 0).single().expect("valid due");
        assert_eq!(date_label(due, now, chrono_tz::America::New_York), "Today");
        assert_eq!(date_label(due, now, Tz::UTC), "Overdue");
    }

    #[test]
    fn overdue_excludes_today_completed_and_future() {
        let now = fixed_now();
        let yesterday = start_of_day(today(now, Tz::UTC) - Duration::days(1));

        assert!(is_overdue(&task_due("1", yesterday, false), now, Tz::UTC));
        assert!(!is_overdue(&task_due("2", yesterday, true), now, Tz::UTC));
        assert!(!is_overdue(&task_due("3", now - Duration::hours(3), false), now, Tz::UTC));
        assert!(!is_overdue(&task_due("4", now + Duration::days(3), false), now, Tz::UTC));
    }

    #[test]
    fn resolve_category_handles_dangling_reference() {
        let categories = fallback_categories();
        let work = resolve_category(&categories, "work");
        assert_eq!(work.icon, "Briefcase");

        let missing = resolve_category(&categories, "garden");
        assert_eq!(missing.name, "Unknown");
        assert_eq!(missing.icon, "Circle");
        assert_eq!(missing.id, "garden");
    }

    #[test]
    fn task_view_combines_labels() {
        let now = fixed_now();
        let mut task = task_due("9", now + Duration::days(1), false);
        task.priority = Priority::High;
        task.category_id = "shopping".to_string();

        let view = task_view(&task, &fallback_categories(), now, Tz::UTC);
        assert_eq!(view.date_label, "Tomorrow");
        assert_eq!(view.priority_class, "priority-high");
        assert_eq!(view.category_icon, "ShoppingCart");
        assert_eq!(view.due_date, "2026-03-11");
        assert!(!view.overdue);
    }

    #[test]
    fn options_carry_display_metadata() {
        let filters = filter_options(TaskFilter::Overdue);
        let labels = filters.iter().map(|option| option.label).collect::<Vec<_>>();
        assert_eq!(labels, vec!["All Tasks", "Active", "Completed", "Overdue"]);
        assert_eq!(
            filters.iter().filter(|option| option.selected).map(|option| option.icon).collect::<Vec<_>>(),
            vec!["AlertCircle"]
        );

        let priorities = priority_options();
        assert_eq!(priorities.len(), 3);
        assert_eq!(priorities[0].label, "High Priority");
        assert_eq!(priorities[2].class, "priority-low");
    }

    #[test]
    fn counts_split_pending_and_completed() {
        let now = fixed_now();
        let tasks = vec![
            task_due("1", now, false),
            task_due("2", now, true),
            task_due("3", now, false),
        ];
        assert_eq!(
            task_counts(&tasks),
            TaskCounts {
                pending: 2,
                completed: 1
            }
        );
    }

    fn arbitrary_tasks() -> impl Strategy<Value = Vec<Task>> {
        prop::collection::vec((-2_000i64..2_000i64, any::<bool>()), 0..40).prop_map(|entries| {
            entries
                .into_iter()
                .enumerate()
                .map(|(index, (offset_hours, completed))| {
                    task_due(
                        &index.to_string(),
                        fixed_now() + Duration::hours(offset_hours),
                        completed,
                    )
                })
                .collect()
        })
    }

    // Active and completed partition the full list.
    proptest! {
        #[test]
        fn active_and_completed_partition_all(tasks in arbitrary_tasks()) {
            let now = fixed_now();
            let all = filter_tasks(&tasks, TaskFilter::All, now, Tz::UTC)
                .iter()
                .map(|task| task.id.clone())
                .collect::<HashSet<_>>();
            let active = filter_tasks(&tasks, TaskFilter::Active, now, Tz::UTC)
                .iter()
                .map(|task| task.id.clone())
                .collect::<HashSet<_>>();
            let completed = filter_tasks(&tasks, TaskFilter::Completed, now, Tz::UTC)
                .iter()
                .map(|task| task.id.clone())
                .collect::<HashSet<_>>();

            prop_assert!(active.is_disjoint(&completed));
            prop_assert_eq!(active.union(&completed).cloned().collect::<HashSet<_>>(), all);
        }
    }

    // Overdue holds exactly for incomplete tasks due before now on an earlier day.
    proptest! {
        #[test]
        fn overdue_matches_definition(
            offset_minutes in -20_000i64..20_000i64,
            completed in any::<bool>(),
            zone_index in 0usize..3usize
        ) {
            let zones = [Tz::UTC, chrono_tz::Asia::Tokyo, chrono_tz::America::Los_Angeles];
            let timezone = zones[zone_index];
            let now = fixed_now();
            let due = now + Duration::minutes(offset_minutes);
            let task = task_due("p", due, completed);

            let due_day = due.with_timezone(&timezone).date_naive();
            let expected = !completed && due < now && due_day != today(now, timezone);
            prop_assert_eq!(is_overdue(&task, now, timezone), expected);

            let listed = filter_tasks(std::slice::from_ref(&task), TaskFilter::Overdue, now, timezone);
            prop_assert_eq!(listed.len() == 1, expected);
            if expected {
                prop_assert_eq!(date_label(due, now, timezone), "Overdue");
            }
        }
    }
}
