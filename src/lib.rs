pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod logging;

use application::bootstrap::bootstrap_workspace;
use application::commands::{
    cancel_form_impl, configure_backend_impl, create_category_impl, delete_category_impl, delete_impl,
    drain_notifications_impl, edit_begin_impl, load_impl, open_form_impl, retry_impl,
    set_filter_impl, set_session_impl, snapshot_impl, submit_impl, toggle_impl,
    update_form_impl,
};
use infrastructure::credential_store::KeyringCredentialStore;
use infrastructure::record_gateway::RecordGateway;
use std::path::Path;

pub use application::commands::{AppState, Session, TaskFormInput, UserProfile};
pub use application::controller::{ControllerSnapshot, Notification};
pub use application::form::TaskForm;
pub use domain::models::Category;

const USER_ID_ENV: &str = "TASKFLOW_USER_ID";
const DEFAULT_USER_ID: &str = "local";

pub fn set_session<G: RecordGateway>(state: &AppState<G>, session: Session) -> Result<(), String> {
    set_session_impl(state, session).map_err(|error| state.command_error("set_session", &error))
}

pub fn snapshot<G: RecordGateway>(state: &AppState<G>) -> Result<ControllerSnapshot, String> {
    snapshot_impl(state).map_err(|error| state.command_error("snapshot", &error))
}

pub async fn load<G: RecordGateway>(state: &AppState<G>) -> Result<ControllerSnapshot, String> {
    load_impl(state)
        .await
        .map_err(|error| state.command_error("load", &error))
}

pub async fn set_filter<G: RecordGateway>(state: &AppState<G>, filter: String) -> Result<ControllerSnapshot, String> {
    set_filter_impl(state, filter)
        .await
        .map_err(|error| state.command_error("set_filter", &error))
}

pub async fn retry<G: RecordGateway>(state: &AppState<G>) -> Result<ControllerSnapshot, String> {
    retry_impl(state)
        .await
        .map_err(|error| state.command_error("retry", &error))
}

pub async fn submit<G: RecordGateway>(state: &AppState<G>) -> Result<ControllerSnapshot, String> {
    submit_impl(state)
        .await
        .map_err(|error| state.command_error("submit", &error))
}

pub async fn toggle<G: RecordGateway>(state: &AppState<G>, task_id: String) -> Result<ControllerSnapshot, String> {
    toggle_impl(state, task_id)
        .await
        .map_err(|error| state.command_error("toggle", &error))
}

pub async fn delete<G: RecordGateway>(state: &AppState<G>, task_id: String) -> Result<ControllerSnapshot, String> {
    delete_impl(state, task_id)
        .await
        .map_err(|error| state.command_error("delete", &error))
}

pub async fn edit_begin<G: RecordGateway>(state: &AppState<G>, task_id: String) -> Result<TaskForm, String> {
    edit_begin_impl(state, task_id)
        .await
        .map_err(|error| state.command_error("edit_begin", &error))
}

pub fn open_form<G: RecordGateway>(state: &AppState<G>) -> Result<TaskForm, String> {
    open_form_impl(state).map_err(|error| state.command_error("open_form", &error))
}

pub fn cancel_form<G: RecordGateway>(state: &AppState<G>) -> Result<TaskForm, String> {
    cancel_form_impl(state).map_err(|error| state.command_error("cancel_form", &error))
}

pub fn update_form<G: RecordGateway>(state: &AppState<G>, input: TaskFormInput) -> Result<TaskForm, String> {
    update_form_impl(state, input).map_err(|error| state.command_error("update_form", &error))
}

pub fn drain_notifications<G: RecordGateway>(state: &AppState<G>) -> Result<Vec<Notification>, String> {
    drain_notifications_impl(state).map_err(|error| state.command_error("drain_notifications", &error))
}

pub async fn create_category<G: RecordGateway>(
    state: &AppState<G>,
    name: String,
    icon: Option<String>,
) -> Result<Vec<Category>, String> {
    create_category_impl(state, name, icon)
        .await
        .map_err(|error| state.command_error("create_category", &error))
}

pub async fn delete_category<G: RecordGateway>(
    state: &AppState<G>,
    category_id: String,
) -> Result<Vec<Category>, String> {
    delete_category_impl(state, category_id)
        .await
        .map_err(|error| state.command_error("delete_category", &error))
}

pub fn configure_backend(
    workspace_root: &Path,
    base_url: String,
    project_id: String,
    public_key: Option<String>,
) -> Result<(), String> {
    configure_backend_impl(
        workspace_root,
        &KeyringCredentialStore::default(),
        base_url,
        project_id,
        public_key,
    )
    .map_err(|error| error.user_message())
}

pub fn run() -> Result<(), String> {
    let workspace_root = std::env::current_dir().map_err(|error| error.to_string())?;
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    match args.first().map(String::as_str) {
        None => {}
        Some("configure") => {
            let [_, base_url, project_id, rest @ ..] = args.as_slice() else {
                return Err("usage: taskflow configure <base-url> <project-id> [public-key]".to_string());
            };
            configure_backend(
                &workspace_root,
                base_url.clone(),
                project_id.clone(),
                rest.first().cloned(),
            )?;
            println!("backend settings saved");
            return Ok(());
        }
        Some(other) => return Err(format!("unknown command: {other}")),
    }

    let bootstrap = bootstrap_workspace(&workspace_root).map_err(|error| error.to_string())?;
    let (_, _log_guard) = logging::init_logging(&bootstrap.logs_dir).map_err(|error| error.to_string())?;

    let state = AppState::from_bootstrap(bootstrap).map_err(|error| error.to_string())?;
    let user_id = std::env::var(USER_ID_ENV)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_USER_ID.to_string());
    set_session(
        &state,
        Session::signed_in(UserProfile {
            id: user_id,
            email: None,
            display_name: None,
        }),
    )?;

    let runtime = tokio::runtime::Runtime::new().map_err(|error| error.to_string())?;
    let snapshot = runtime.block_on(load(&state))?;
    for notification in drain_notifications(&state)? {
        tracing::info!(level = ?notification.level, message = %notification.message, "notification");
    }

    let rendered = serde_json::to_string_pretty(&snapshot).map_err(|error| error.to_string())?;
    println!("{rendered}");
    Ok(())
}
