use crate::application::NowProvider;
use crate::application::category_repository::CategoryRepository;
use crate::application::error::AppError;
use crate::application::form::TaskForm;
use crate::application::task_repository::TaskRepository;
use crate::domain::derivation::{
    FilterOption, PriorityOption, TaskCounts, TaskView, filter_options, filter_tasks, priority_options,
    task_counts, task_view, today,
};
use crate::domain::models::{Category, CategoryDraft, Task, TaskDraft, TaskFilter, fallback_categories};
use crate::infrastructure::record_gateway::RecordGateway;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

const TASK_COMPLETED_MESSAGE: &str = "Task completed! 🎉";
const TASK_REOPENED_MESSAGE: &str = "Task marked as active";
const TASK_CREATED_MESSAGE: &str = "Task created successfully!";
const TASK_UPDATED_MESSAGE: &str = "Task updated successfully!";
const TASK_DELETED_MESSAGE: &str = "Task deleted";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum OperationState {
    #[default]
    Idle,
    InFlight,
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct OperationStates {
    pub tasks: OperationState,
    pub categories: OperationState,
    pub submit: OperationState,
    pub delete: OperationState,
    pub toggle: OperationState,
}

#[derive(Debug, Clone, Copy)]
enum Mutation {
    Submit,
    Delete,
    Toggle,
}

impl OperationStates {
    fn mutation_mut(&mut self, mutation: Mutation) -> &mut OperationState {
        match mutation {
            Mutation::Submit => &mut self.submit,
            Mutation::Delete => &mut self.delete,
            Mutation::Toggle => &mut self.toggle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied(usize),
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerSnapshot {
    pub filter: TaskFilter,
    pub tasks: Vec<TaskView>,
    pub counts: TaskCounts,
    pub categories: Vec<Category>,
    pub operations: OperationStates,
    pub form: TaskForm,
    pub filters: Vec<FilterOption>,
    pub priorities: Vec<PriorityOption>,
}

#[derive(Debug)]
struct ControllerState {
    tasks: Vec<Task>,
    categories: Vec<Category>,
    filter: TaskFilter,
    operations: OperationStates,
    form: TaskForm,
    notifications: Vec<Notification>,
    latest_load: u64,
}

impl ControllerState {
    fn notify(&mut self, level: NotificationLevel, message: impl Into<String>) {
        self.notifications.push(Notification {
            level,
            message: message.into(),
        });
    }
}

pub struct TaskListController<G>
where
    G: RecordGateway,
{
    task_repository: TaskRepository<G>,
    category_repository: CategoryRepository<G>,
    state: Mutex<ControllerState>,
    timezone: Tz,
    now_provider: NowProvider,
}

impl<G> TaskListController<G>
where
    G: RecordGateway,
{
    pub fn new(gateway: Arc<G>) -> Self {
        let now_provider: NowProvider = Arc::new(Utc::now);
        let form = TaskForm::new(today(now_provider(), Tz::UTC));
        Self {
            task_repository: TaskRepository::new(Arc::clone(&gateway)),
            category_repository: CategoryRepository::new(gateway),
            state: Mutex::new(ControllerState {
                tasks: Vec::new(),
                categories: fallback_categories(),
                filter: TaskFilter::All,
                operations: OperationStates::default(),
                form,
                notifications: Vec::new(),
                latest_load: 0,
            }),
            timezone: Tz::UTC,
            now_provider,
        }
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self.task_repository = self.task_repository.with_timezone(timezone);
        self.reset_form_in_place();
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.task_repository = self.task_repository.with_now_provider(Arc::clone(&now_provider));
        self.now_provider = now_provider;
        self.reset_form_in_place();
        self
    }

    fn reset_form_in_place(&mut self) {
        let today = self.today();
        if let Ok(state) = self.state.get_mut() {
            state.form.reset(today);
        }
    }

    fn now(&self) -> DateTime<Utc> {
        (self.now_provider)()
    }

    fn today(&self) -> NaiveDate {
        today(self.now(), self.timezone)
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, ControllerState>, AppError> {
        self.state
            .lock()
            .map_err(|error| AppError::State(format!("controller lock poisoned: {error}")))
    }

    pub async fn mount(&self) -> Result<LoadOutcome, AppError> {
        let filter = self.lock_state()?.filter;
        let (tasks, categories) = tokio::join!(self.load_tasks(filter), self.load_categories());
        categories?;
        tasks
    }

    pub async fn set_filter(&self, filter: TaskFilter) -> Result<LoadOutcome, AppError> {
        self.load_tasks(filter).await
    }

    pub async fn retry(&self) -> Result<LoadOutcome, AppError> {
        let filter = self.lock_state()?.filter;
        self.load_tasks(filter).await
    }

    async fn load_tasks(&self, filter: TaskFilter) -> Result<LoadOutcome, AppError> {
        let token = {
            let mut state = self.lock_state()?;
            state.latest_load += 1;
            state.filter = filter;
            state.operations.tasks = OperationState::InFlight;
            state.latest_load
        };

        let result = self.task_repository.fetch_tasks(filter).await;

        let mut state = self.lock_state()?;
        if state.latest_load != token {
            tracing::debug!(
                filter = filter.as_str(),
                token,
                latest = state.latest_load,
                "discarding superseded task load"
            );
            return Ok(LoadOutcome::Superseded);
        }

        match result {
            Ok(tasks) => {
                let count = tasks.len();
                state.tasks = tasks;
                state.operations.tasks = OperationState::Succeeded;
                Ok(LoadOutcome::Applied(count))
            }
            Err(error) => {
                state.operations.tasks = OperationState::Failed(error.user_message());
                Err(error)
            }
        }
    }

    async fn load_categories(&self) -> Result<(), AppError> {
        self.lock_state()?.operations.categories = OperationState::InFlight;
        let categories = self.category_repository.fetch_categories().await;

        let mut state = self.lock_state()?;
        state.categories = categories;
        state.operations.categories = OperationState::Succeeded;
        Ok(())
    }

    async fn reload_after_mutation(&self) {
        if let Err(error) = self.retry().await {
            tracing::warn!(%error, "reload after mutation failed");
        }
    }

    fn begin_mutation(&self, mutation: Mutation) -> Result<(), AppError> {
        *self.lock_state()?.operations.mutation_mut(mutation) = OperationState::InFlight;
        Ok(())
    }

    fn finish_mutation<T, F>(&self, mutation: Mutation, result: Result<T, AppError>, success_message: F) -> Result<T, AppError>
    where
        F: FnOnce(&T) -> String,
    {
        let mut state = self.lock_state()?;
        match &result {
            Ok(value) => {
                *state.operations.mutation_mut(mutation) = OperationState::Succeeded;
                state.notify(NotificationLevel::Success, success_message(value));
            }
            Err(error) => {
                let message = error.user_message();
                tracing::warn!(?mutation, %error, "task mutation failed");
                *state.operations.mutation_mut(mutation) = OperationState::Failed(message.clone());
                state.notify(NotificationLevel::Error, message);
            }
        }
        result
    }

    async fn find_task(&self, task_id: &str) -> Result<Task, AppError> {
        let cached = self
            .lock_state()?
            .tasks
            .iter()
            .find(|task| task.id == task_id)
            .cloned();
        match cached {
            Some(task) => Ok(task),
            None => self
                .task_repository
                .get_task_by_id(task_id)
                .await?
                .ok_or_else(|| AppError::State(format!("task not found: {task_id}"))),
        }
    }

    pub async fn toggle(&self, task_id: &str) -> Result<bool, AppError> {
        self.begin_mutation(Mutation::Toggle)?;
        let result = async {
            let task = self.find_task(task_id).await?;
            let mut draft = task.to_draft(self.timezone);
            draft.completed = !task.completed;
            self.task_repository.update_task(task_id, &draft).await?;
            Ok::<_, AppError>(draft.completed)
        }
        .await;

        let completed = self.finish_mutation(Mutation::Toggle, result, |completed| {
            if *completed {
                TASK_COMPLETED_MESSAGE.to_string()
            } else {
                TASK_REOPENED_MESSAGE.to_string()
            }
        })?;
        self.reload_after_mutation().await;
        Ok(completed)
    }

    pub async fn delete(&self, task_id: &str) -> Result<(), AppError> {
        self.begin_mutation(Mutation::Delete)?;
        let result = self.task_repository.delete_task(task_id).await;
        self.finish_mutation(Mutation::Delete, result, |_| TASK_DELETED_MESSAGE.to_string())?;

        {
            let today = self.today();
            let mut state = self.lock_state()?;
            if state.form.editing_task_id.as_deref() == Some(task_id) {
                state.form.reset(today);
            }
        }
        self.reload_after_mutation().await;
        Ok(())
    }

    pub async fn submit(&self) -> Result<SubmitOutcome, AppError> {
        let form = self.lock_state()?.form.clone();
        let draft = match form.to_draft() {
            Ok(draft) => draft,
            Err(error) => {
                self.lock_state()?
                    .notify(NotificationLevel::Error, error.user_message());
                return Err(error);
            }
        };

        self.begin_mutation(Mutation::Submit)?;
        let result = match form.editing_task_id.as_deref() {
            Some(task_id) => self
                .update_from_form(task_id, draft)
                .await
                .map(|_| SubmitOutcome::Updated),
            None => self
                .task_repository
                .create_task(&draft)
                .await
                .map(|_| SubmitOutcome::Created),
        };

        let outcome = self.finish_mutation(Mutation::Submit, result, |outcome| match outcome {
            SubmitOutcome::Created => TASK_CREATED_MESSAGE.to_string(),
            SubmitOutcome::Updated => TASK_UPDATED_MESSAGE.to_string(),
        })?;

        {
            let today = self.today();
            self.lock_state()?.form.reset(today);
        }
        self.reload_after_mutation().await;
        Ok(outcome)
    }

    async fn update_from_form(&self, task_id: &str, mut draft: TaskDraft) -> Result<(), AppError> {
        let existing = self.find_task(task_id).await.map_err(|error| match error {
            AppError::State(message) => AppError::Update(message),
            other => other,
        })?;
        draft.completed = existing.completed;
        self.task_repository.update_task(task_id, &draft).await?;
        Ok(())
    }

    pub async fn edit_begin(&self, task_id: &str) -> Result<TaskForm, AppError> {
        let task = self.find_task(task_id).await?;
        let mut state = self.lock_state()?;
        state.form.begin_edit(&task, self.timezone);
        Ok(state.form.clone())
    }

    pub fn open_form(&self) -> Result<TaskForm, AppError> {
        let today = self.today();
        let mut state = self.lock_state()?;
        state.form.reset(today);
        state.form.open = true;
        Ok(state.form.clone())
    }

    pub fn cancel_form(&self) -> Result<TaskForm, AppError> {
        let today = self.today();
        let mut state = self.lock_state()?;
        state.form.reset(today);
        Ok(state.form.clone())
    }

    pub fn update_form<F>(&self, edit: F) -> Result<TaskForm, AppError>
    where
        F: FnOnce(&mut TaskForm),
    {
        let mut state = self.lock_state()?;
        edit(&mut state.form);
        Ok(state.form.clone())
    }

    pub async fn create_category(&self, draft: CategoryDraft) -> Result<(), AppError> {
        match self.category_repository.create_category(&draft).await {
            Ok(_) => {
                self.lock_state()?
                    .notify(NotificationLevel::Success, "Category created");
            }
            Err(error) => {
                self.lock_state()?
                    .notify(NotificationLevel::Error, error.user_message());
                return Err(error);
            }
        }
        self.load_categories().await
    }

    pub async fn delete_category(&self, category_id: &str) -> Result<(), AppError> {
        match self.category_repository.delete_category(category_id).await {
            Ok(()) => {
                self.lock_state()?
                    .notify(NotificationLevel::Success, "Category deleted");
            }
            Err(error) => {
                self.lock_state()?
                    .notify(NotificationLevel::Error, error.user_message());
                return Err(error);
            }
        }
        self.load_categories().await
    }

    pub fn tasks(&self) -> Result<Vec<Task>, AppError> {
        Ok(self.lock_state()?.tasks.clone())
    }

    pub fn categories(&self) -> Result<Vec<Category>, AppError> {
        Ok(self.lock_state()?.categories.clone())
    }

    pub fn filter(&self) -> Result<TaskFilter, AppError> {
        Ok(self.lock_state()?.filter)
    }

    pub fn operations(&self) -> Result<OperationStates, AppError> {
        Ok(self.lock_state()?.operations.clone())
    }

    pub fn form(&self) -> Result<TaskForm, AppError> {
        Ok(self.lock_state()?.form.clone())
    }

    pub fn drain_notifications(&self) -> Result<Vec<Notification>, AppError> {
        Ok(std::mem::take(&mut self.lock_state()?.notifications))
    }

    pub fn snapshot(&self) -> Result<ControllerSnapshot, AppError> {
        let now = self.now();
        let state = self.lock_state()?;
        let visible = filter_tasks(&state.tasks, state.filter, now, self.timezone);
        Ok(ControllerSnapshot {
            filter: state.filter,
            counts: task_counts(visible.iter().copied()),
            tasks: visible
                .into_iter()
                .map(|task| task_view(task, &state.categories, now, self.timezone))
                .collect(),
            categories: state.categories.clone(),
            operations: state.operations.clone(),
            form: state.form.clone(),
            filters: filter_options(state.filter),
            priorities: priority_options(),
        })
    }
}
