use crate::application::NowProvider;
use crate::application::bootstrap::{BootstrapResult, bootstrap_workspace};
use crate::application::controller::{ControllerSnapshot, Notification, TaskListController};
use crate::application::error::AppError;
use crate::application::form::TaskForm;
use crate::domain::models::{Category, CategoryDraft, Priority, TaskFilter};
use crate::infrastructure::config::{
    AppConfig, load_backend_config_from_env, save_backend_settings,
};
use crate::infrastructure::credential_store::{CredentialStore, KeyringCredentialStore};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::record_gateway::{RecordGateway, ReqwestRecordGateway};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: Option<UserProfile>,
}

impl Session {
    pub fn signed_in(user: UserProfile) -> Self {
        Self { user: Some(user) }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFormInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub category_id: Option<String>,
}

impl TaskFormInput {
    fn apply(self, form: &mut TaskForm) {
        if let Some(title) = self.title {
            form.title = title;
        }
        if let Some(description) = self.description {
            form.description = description;
        }
        if let Some(priority) = self.priority {
            form.priority = Priority::parse_or_default(Some(&priority));
        }
        if let Some(due_date) = self.due_date {
            form.due_date = due_date;
        }
        if let Some(category_id) = self.category_id {
            form.category_id = category_id;
        }
    }
}

pub struct AppState<G = ReqwestRecordGateway>
where
    G: RecordGateway,
{
    config_dir: PathBuf,
    logs_dir: PathBuf,
    app_config: AppConfig,
    controller: TaskListController<G>,
    session: Mutex<Session>,
    log_guard: Mutex<()>,
}

impl AppState<ReqwestRecordGateway> {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        Self::from_bootstrap(bootstrap_workspace(&workspace_root)?)
    }

    pub fn from_bootstrap(bootstrap: BootstrapResult) -> Result<Self, InfraError> {
        let backend = load_backend_config_from_env(&bootstrap.app_config, &KeyringCredentialStore::default())?;
        let gateway = Arc::new(ReqwestRecordGateway::new(&backend)?);
        Ok(Self::from_parts(bootstrap, gateway))
    }
}

impl<G> AppState<G>
where
    G: RecordGateway,
{
    pub fn with_gateway(workspace_root: PathBuf, gateway: Arc<G>) -> Result<Self, InfraError> {
        Ok(Self::from_parts(bootstrap_workspace(&workspace_root)?, gateway))
    }

    fn from_parts(bootstrap: BootstrapResult, gateway: Arc<G>) -> Self {
        let app_config = bootstrap.app_config;
        let controller = TaskListController::new(gateway).with_timezone(app_config.timezone);

        Self {
            config_dir: bootstrap.config_dir,
            logs_dir: bootstrap.logs_dir,
            app_config,
            controller,
            session: Mutex::new(Session::default()),
            log_guard: Mutex::new(()),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.controller = self.controller.with_now_provider(now_provider);
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn app_config(&self) -> &AppConfig {
        &self.app_config
    }

    pub fn command_error(&self, command: &str, error: &AppError) -> String {
        self.log_error(command, &error.to_string());
        error.user_message()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    fn lock_session(&self) -> Result<MutexGuard<'_, Session>, AppError> {
        self.session
            .lock()
            .map_err(|error| AppError::State(format!("session lock poisoned: {error}")))
    }

    fn require_user(&self) -> Result<UserProfile, AppError> {
        self.lock_session()?.user.clone().ok_or(AppError::Unauthenticated)
    }
}

fn required_id(field_name: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field_name} must not be empty")));
    }
    Ok(value.to_string())
}

pub fn configure_backend_impl<S>(
    workspace_root: &Path,
    credentials: &S,
    base_url: String,
    project_id: String,
    public_key: Option<String>,
) -> Result<(), AppError>
where
    S: CredentialStore + ?Sized,
{
    let bootstrap = bootstrap_workspace(workspace_root)?;
    save_backend_settings(&bootstrap.config_dir, &base_url, &project_id)?;
    if let Some(public_key) = public_key {
        credentials.save_public_key(&public_key)?;
    }
    Ok(())
}

pub fn set_session_impl<G: RecordGateway>(state: &AppState<G>, session: Session) -> Result<(), AppError> {
    let user_id = session.user.as_ref().map(|user| user.id.clone());
    *state.lock_session()? = session;
    match user_id {
        Some(user_id) => state.log_info("set_session", &format!("signed in user_id={user_id}")),
        None => state.log_info("set_session", "signed out"),
    }
    Ok(())
}

pub fn snapshot_impl<G: RecordGateway>(state: &AppState<G>) -> Result<ControllerSnapshot, AppError> {
    state.controller.snapshot()
}

pub async fn load_impl<G: RecordGateway>(state: &AppState<G>) -> Result<ControllerSnapshot, AppError> {
    state.require_user()?;
    match state.controller.mount().await {
        Ok(outcome) => state.log_info("load", &format!("mounted outcome={outcome:?}")),
        Err(error) => state.log_error("load", &error.to_string()),
    }
    state.controller.snapshot()
}

pub async fn set_filter_impl<G: RecordGateway>(
    state: &AppState<G>,
    filter: String,
) -> Result<ControllerSnapshot, AppError> {
    state.require_user()?;
    let filter = TaskFilter::parse(&filter)
        .ok_or_else(|| AppError::Validation(format!("unsupported filter: {}", filter.trim())))?;
    match state.controller.set_filter(filter).await {
        Ok(outcome) => state.log_info(
            "set_filter",
            &format!("filter={} outcome={outcome:?}", filter.as_str()),
        ),
        Err(error) => state.log_error("set_filter", &error.to_string()),
    }
    state.controller.snapshot()
}

pub async fn retry_impl<G: RecordGateway>(state: &AppState<G>) -> Result<ControllerSnapshot, AppError> {
    state.require_user()?;
    match state.controller.retry().await {
        Ok(outcome) => state.log_info("retry", &format!("outcome={outcome:?}")),
        Err(error) => state.log_error("retry", &error.to_string()),
    }
    state.controller.snapshot()
}

pub async fn submit_impl<G: RecordGateway>(state: &AppState<G>) -> Result<ControllerSnapshot, AppError> {
    state.require_user()?;
    let outcome = state.controller.submit().await?;
    state.log_info("submit", &format!("outcome={outcome:?}"));
    state.controller.snapshot()
}

pub async fn toggle_impl<G: RecordGateway>(
    state: &AppState<G>,
    task_id: String,
) -> Result<ControllerSnapshot, AppError> {
    state.require_user()?;
    let task_id = required_id("task_id", &task_id)?;
    let completed = state.controller.toggle(&task_id).await?;
    state.log_info("toggle", &format!("task_id={task_id} completed={completed}"));
    state.controller.snapshot()
}

pub async fn delete_impl<G: RecordGateway>(
    state: &AppState<G>,
    task_id: String,
) -> Result<ControllerSnapshot, AppError> {
    state.require_user()?;
    let task_id = required_id("task_id", &task_id)?;
    state.controller.delete(&task_id).await?;
    state.log_info("delete", &format!("deleted task_id={task_id}"));
    state.controller.snapshot()
}

pub async fn edit_begin_impl<G: RecordGateway>(state: &AppState<G>, task_id: String) -> Result<TaskForm, AppError> {
    state.require_user()?;
    let task_id = required_id("task_id", &task_id)?;
    state.controller.edit_begin(&task_id).await
}

pub fn open_form_impl<G: RecordGateway>(state: &AppState<G>) -> Result<TaskForm, AppError> {
    state.require_user()?;
    state.controller.open_form()
}

pub fn cancel_form_impl<G: RecordGateway>(state: &AppState<G>) -> Result<TaskForm, AppError> {
    state.require_user()?;
    state.controller.cancel_form()
}

pub fn update_form_impl<G: RecordGateway>(state: &AppState<G>, input: TaskFormInput) -> Result<TaskForm, AppError> {
    state.require_user()?;
    state.controller.update_form(|form| input.apply(form))
}

pub fn drain_notifications_impl<G: RecordGateway>(state: &AppState<G>) -> Result<Vec<Notification>, AppError> {
    state.require_user()?;
    state.controller.drain_notifications()
}

pub async fn create_category_impl<G: RecordGateway>(
    state: &AppState<G>,
    name: String,
    icon: Option<String>,
) -> Result<Vec<Category>, AppError> {
    state.require_user()?;
    let draft = CategoryDraft { name, icon };
    state.controller.create_category(draft).await?;
    state.log_info("create_category", "created category");
    state.controller.categories()
}

pub async fn delete_category_impl<G: RecordGateway>(
    state: &AppState<G>,
    category_id: String,
) -> Result<Vec<Category>, AppError> {
    state.require_user()?;
    let category_id = required_id("category_id", &category_id)?;
    state.controller.delete_category(&category_id).await?;
    state.log_info("delete_category", &format!("deleted category_id={category_id}"));
    state.controller.categories()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::controller::{NotificationLevel, OperationState};
    use crate::infrastructure::config::load_app_config;
    use crate::infrastructure::in_memory_gateway::InMemoryRecordGateway;
    use crate::infrastructure::task_records::TASK_TABLE;
    use chrono::DateTime;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    struct TempWorkspace {
        path: PathBuf,
        gateway: Arc<InMemoryRecordGateway>,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "taskflow-command-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self {
                path,
                gateway: Arc::new(InMemoryRecordGateway::default()),
            }
        }

        fn app_state(&self) -> AppState<InMemoryRecordGateway> {
            AppState::with_gateway(self.path.clone(), Arc::clone(&self.gateway))
                .expect("initialize app state")
                .with_now_provider(Arc::new(|| {
                    DateTime::parse_from_rfc3339("2026-02-16T10:00:00Z")
                        .expect("valid datetime")
                        .with_timezone(&Utc)
                }))
        }

        fn signed_in_state(&self) -> AppState<InMemoryRecordGateway> {
            let state = self.app_state();
            set_session_impl(
                &state,
                Session::signed_in(UserProfile {
                    id: "user-1".to_string(),
                    email: Some("ada@example.com".to_string()),
                    display_name: None,
                }),
            )
            .expect("sign in");
            state
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn configure_backend_persists_settings_and_key() {
        use crate::infrastructure::config::load_backend_config_from_lookup;
        use crate::infrastructure::credential_store::InMemoryCredentialStore;

        let workspace = TempWorkspace::new();
        let credentials = InMemoryCredentialStore::default();
        configure_backend_impl(
            &workspace.path,
            &credentials,
            "https://records.test/api".to_string(),
            "proj-9".to_string(),
            Some("pk-live".to_string()),
        )
        .expect("configure backend");

        let app = load_app_config(&workspace.path.join("config")).expect("load app config");
        let backend = load_backend_config_from_lookup(&app, &credentials, |_| None).expect("backend config");
        assert_eq!(backend.base_url, "https://records.test/api");
        assert_eq!(backend.project_id, "proj-9");
        assert_eq!(backend.public_key, "pk-live");

        assert!(matches!(
            configure_backend_impl(&workspace.path, &credentials, " ".to_string(), "p".to_string(), None),
            Err(AppError::Infra(InfraError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn bootstrap_writes_default_config() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();
        assert!(state.config_dir().join("app.json").exists());
        assert_eq!(state.app_config().app_name, "TaskFlow");
    }

    #[test]
    fn state_keeps_the_bootstrapped_config() {
        let workspace = TempWorkspace::new();
        let bootstrap = bootstrap_workspace(&workspace.path).expect("bootstrap");
        let expected = bootstrap.app_config.clone();
        fs::write(bootstrap.config_dir.join("app.json"), "{ not json").expect("corrupt config");

        let state = AppState::from_parts(bootstrap, Arc::clone(&workspace.gateway));

        assert_eq!(state.app_config(), &expected);
        assert_eq!(state.app_config().timezone, chrono_tz::Tz::UTC);
    }

    #[tokio::test]
    async fn commands_require_a_session() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state();

        assert!(matches!(load_impl(&state).await, Err(AppError::Unauthenticated)));
        assert!(matches!(open_form_impl(&state), Err(AppError::Unauthenticated)));
        assert_eq!(workspace.gateway.call_count(), 0);

        let snapshot = snapshot_impl(&state).expect("snapshot without session");
        assert!(snapshot.tasks.is_empty());
        assert_eq!(snapshot.categories.len(), 3);
    }

    #[tokio::test]
    async fn signing_out_blocks_further_commands() {
        let workspace = TempWorkspace::new();
        let state = workspace.signed_in_state();
        load_impl(&state).await.expect("load while signed in");

        set_session_impl(&state, Session::default()).expect("sign out");
        assert!(matches!(retry_impl(&state).await, Err(AppError::Unauthenticated)));
    }

    #[tokio::test]
    async fn create_toggle_and_delete_flow() {
        let workspace = TempWorkspace::new();
        let state = workspace.signed_in_state();
        load_impl(&state).await.expect("load");

        open_form_impl(&state).expect("open form");
        update_form_impl(
            &state,
            TaskFormInput {
                title: Some("Buy milk".to_string()),
                priority: Some("low".to_string()),
                due_date: Some("2026-02-17".to_string()),
                category_id: Some("shopping".to_string()),
                ..TaskFormInput::default()
            },
        )
        .expect("update form");

        let snapshot = submit_impl(&state).await.expect("submit");
        assert_eq!(snapshot.tasks.len(), 1);
        let task = &snapshot.tasks[0];
        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.priority_label, "Low Priority");
        assert_eq!(task.category_name, "Shopping");
        assert_eq!(task.date_label, "Tomorrow");
        assert!(!snapshot.form.open);

        let snapshot = toggle_impl(&state, task.id.clone()).await.expect("toggle");
        assert!(snapshot.tasks[0].completed);
        assert_eq!(snapshot.counts.completed, 1);

        let snapshot = delete_impl(&state, task.id.clone()).await.expect("delete");
        assert!(snapshot.tasks.is_empty());
        assert_eq!(workspace.gateway.row_count(TASK_TABLE).expect("count"), 0);

        let messages = drain_notifications_impl(&state)
            .expect("notifications")
            .into_iter()
            .map(|notification| notification.message)
            .collect::<Vec<_>>();
        assert_eq!(
            messages,
            vec!["Task created successfully!", "Task completed! 🎉", "Task deleted"]
        );
    }

    #[tokio::test]
    async fn load_reports_fetch_failure_in_snapshot() {
        let workspace = TempWorkspace::new();
        let state = workspace.signed_in_state();
        workspace
            .gateway
            .fail_table(TASK_TABLE, "network error while fetching records")
            .expect("arm");

        let snapshot = load_impl(&state).await.expect("load answers with snapshot");
        assert!(matches!(snapshot.operations.tasks, OperationState::Failed(_)));

        workspace.gateway.heal_table(TASK_TABLE).expect("heal");
        let snapshot = retry_impl(&state).await.expect("retry");
        assert_eq!(snapshot.operations.tasks, OperationState::Succeeded);

        let log = fs::read_to_string(workspace.path.join("logs").join("commands.log")).expect("command log");
        let first = log.lines().find(|line| line.contains("\"load\"")).expect("load entry");
        let entry: serde_json::Value = serde_json::from_str(first).expect("json line");
        assert_eq!(entry["level"], "error");
    }

    #[tokio::test]
    async fn blank_submit_is_rejected_with_notification() {
        let workspace = TempWorkspace::new();
        let state = workspace.signed_in_state();
        open_form_impl(&state).expect("open form");

        let error = submit_impl(&state).await.expect_err("blank title");
        assert_eq!(state.command_error("submit", &error), "Please enter a task title");
        assert_eq!(workspace.gateway.call_count(), 0);

        let notifications = drain_notifications_impl(&state).expect("notifications");
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].level, NotificationLevel::Error);
    }

    #[tokio::test]
    async fn set_filter_rejects_unknown_names() {
        let workspace = TempWorkspace::new();
        let state = workspace.signed_in_state();
        assert!(matches!(
            set_filter_impl(&state, "someday".to_string()).await,
            Err(AppError::Validation(_))
        ));

        let snapshot = set_filter_impl(&state, "Completed".to_string()).await.expect("filter");
        assert_eq!(snapshot.filter, TaskFilter::Completed);
    }

    #[tokio::test]
    async fn categories_can_be_created_and_deleted() {
        let workspace = TempWorkspace::new();
        let state = workspace.signed_in_state();

        let categories = create_category_impl(&state, "Garden".to_string(), None)
            .await
            .expect("create category");
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].icon, "Folder");

        let categories = delete_category_impl(&state, categories[0].id.clone())
            .await
            .expect("delete category");
        assert_eq!(categories.len(), 3);
        assert!(matches!(
            delete_category_impl(&state, "  ".to_string()).await,
            Err(AppError::Validation(_))
        ));
    }
}
