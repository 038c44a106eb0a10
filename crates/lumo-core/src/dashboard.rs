use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use lumo_shared::TaskPatch;
use tracing::{debug, info, warn};

use crate::action::{Action, Outcome, Page};
use crate::api::{AuthToken, Gateway};
use crate::config::Config;
use crate::datetime::resolve_display_timezone;
use crate::model::{GroupedTasks, List, Status, Task};
use crate::render::{RenderContext, ViewNode, map_status, render_dashboard};
use crate::session::{Session, SessionStore};
use crate::toast::{Toast, ToastKind, ToastQueue};

pub const PLACEHOLDER_NAME: &str = "Usuario";
pub const BOARD_TITLE: &str = "Tablero Kanban";
pub const TASKS_ERROR: &str = "Error cargando tareas";
pub const CONFIRM_DELETE_LIST: &str = "¿Eliminar esta lista y todas sus tareas?";
pub const CONFIRM_DELETE_TASK: &str = "¿Eliminar esta tarea?";

/// Blocking yes/no question shown before destructive actions.
pub trait Confirm {
    fn confirm(&mut self, message: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, message: &str) -> bool {
        self(message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardState {
    Empty,
    ListView { list_id: String, title: String },
    BucketView(Status),
    FullKanban,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskArea {
    Placeholder,
    Tasks(Vec<Task>),
    Message(String),
    Board(GroupedTasks),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserHeader {
    pub display_name: String,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub timezone: Tz,
    pub toast_ttl: Duration,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::UTC,
            toast_ttl: Duration::milliseconds(crate::config::DEFAULT_TOAST_MS as i64),
        }
    }
}

impl DashboardSettings {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            timezone: resolve_display_timezone(cfg.get("display.timezone").as_deref()),
            toast_ttl: cfg.toast_duration()?,
        })
    }
}

/// Everything the view shows at one instant.
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub state: DashboardState,
    pub header: Option<UserHeader>,
    pub lists: Vec<List>,
    pub title: String,
    pub task_area: TaskArea,
    pub create_task_visible: bool,
    pub toasts: Vec<Toast>,
}

impl DashboardSnapshot {
    pub fn active_list_id(&self) -> Option<&str> {
        match &self.state {
            DashboardState::ListView { list_id, .. } => Some(list_id.as_str()),
            _ => None,
        }
    }
}

pub struct Dashboard<G, S, P> {
    gateway: G,
    session: Session<S>,
    prompt: P,
    settings: DashboardSettings,
    state: DashboardState,
    header: Option<UserHeader>,
    lists: Vec<List>,
    title: String,
    task_area: TaskArea,
    toasts: ToastQueue,
    request_seq: u64,
}

impl<G, S, P> Dashboard<G, S, P>
where
    G: Gateway,
    S: SessionStore,
    P: Confirm,
{
    pub fn new(gateway: G, store: S, prompt: P, settings: DashboardSettings) -> Self {
        let toasts = ToastQueue::new(settings.toast_ttl);
        Self {
            gateway,
            session: Session::new(store),
            prompt,
            settings,
            state: DashboardState::Empty,
            header: None,
            lists: vec![],
            title: String::new(),
            task_area: TaskArea::Placeholder,
            toasts,
            request_seq: 0,
        }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn lists(&self) -> &[List] {
        &self.lists
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn task_area(&self) -> &TaskArea {
        &self.task_area
    }

    pub fn header(&self) -> Option<&UserHeader> {
        self.header.as_ref()
    }

    pub fn toasts(&self) -> &ToastQueue {
        &self.toasts
    }

    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn settings(&self) -> &DashboardSettings {
        &self.settings
    }

    /// Number of transitions started so far. Each one tags its log span with the
    /// sequence number it was given.
    pub fn request_seq(&self) -> u64 {
        self.request_seq
    }

    pub fn into_session(self) -> Session<S> {
        self.session
    }

    /// Creating a task only makes sense inside a concrete list.
    pub fn create_task_visible(&self) -> bool {
        matches!(self.state, DashboardState::ListView { .. })
    }

    #[tracing::instrument(skip(self), fields(request_id = tracing::field::Empty))]
    pub async fn bootstrap(&mut self) -> Outcome {
        self.begin_request();
        let Ok(token) = AuthToken::require(self.session.token()) else {
            info!("no session token; login required");
            return Outcome::Navigate(Page::Login);
        };

        self.header = Some(self.load_header(&token).await);
        self.lists = self.gateway.fetch_lists(&token).await;

        if let Some(stored_id) = self.session.current_list_id() {
            let stored = self.lists.iter().find(|list| list.id == stored_id).cloned();
            match stored {
                Some(list) => {
                    debug!(list_id = %list.id, "restoring persisted list");
                    self.show_list(&token, list.id, list.title).await;
                    return Outcome::Rendered;
                }
                None => {
                    warn!(list_id = %stored_id, "persisted list no longer exists");
                    self.session.clear_list_selection();
                }
            }
        }

        self.select_first_or_empty(&token).await;
        Outcome::Rendered
    }

    pub async fn dispatch(&mut self, action: Action) -> Outcome {
        debug!(action = action.name(), "dispatching");
        match action {
            Action::SelectList { list_id, title } => self.select_list(&list_id, &title).await,
            Action::SelectBucket(status) => self.select_bucket(status).await,
            Action::EnterKanban => self.enter_kanban().await,
            Action::DeleteList { list_id } => self.delete_list(&list_id).await,
            Action::DeleteTask { task_id } => self.delete_task(&task_id).await,
            Action::ToggleTask { task_id, done } => self.toggle_task(&task_id, done).await,
            Action::EditTask { task_id, list_id } => self.edit_task(&task_id, &list_id),
            Action::NewTask => self.new_task(),
            Action::NewList => Outcome::Navigate(Page::CreateList),
        }
    }

    #[tracing::instrument(skip(self), fields(request_id = tracing::field::Empty))]
    pub async fn select_list(&mut self, list_id: &str, title: &str) -> Outcome {
        self.begin_request();
        let Some(token) = self.token() else {
            return Outcome::Ignored;
        };
        self.show_list(&token, list_id.to_string(), title.to_string())
            .await;
        Outcome::Rendered
    }

    #[tracing::instrument(skip(self), fields(request_id = tracing::field::Empty))]
    pub async fn select_bucket(&mut self, status: Status) -> Outcome {
        self.begin_request();
        let Some(token) = self.token() else {
            return Outcome::Ignored;
        };

        self.session.select_bucket(&status);
        self.title = map_status(&status).label;
        self.state = DashboardState::BucketView(status.clone());
        self.task_area = match self.gateway.fetch_tasks_grouped(&token).await {
            Ok(grouped) => {
                let tasks = match status.known() {
                    Some(known) => grouped.bucket(known).to_vec(),
                    None => grouped.iter().filter(|t| t.status == status).cloned().collect(),
                };
                info!(%status, count = tasks.len(), "showing bucket");
                TaskArea::Tasks(tasks)
            }
            Err(err) => {
                warn!(%status, error = %err, "failed to load bucket");
                TaskArea::Message(TASKS_ERROR.to_string())
            }
        };
        Outcome::Rendered
    }

    #[tracing::instrument(skip(self), fields(request_id = tracing::field::Empty))]
    pub async fn enter_kanban(&mut self) -> Outcome {
        self.begin_request();
        let Some(token) = self.token() else {
            return Outcome::Ignored;
        };

        self.session.enter_full_kanban();
        self.title = BOARD_TITLE.to_string();
        self.state = DashboardState::FullKanban;
        self.task_area = match self.gateway.fetch_tasks_grouped(&token).await {
            Ok(grouped) => {
                info!(count = grouped.len(), "showing board");
                TaskArea::Board(grouped)
            }
            Err(err) => {
                warn!(error = %err, "failed to load board");
                TaskArea::Message(TASKS_ERROR.to_string())
            }
        };
        Outcome::Rendered
    }

    #[tracing::instrument(skip(self), fields(request_id = tracing::field::Empty))]
    pub async fn delete_list(&mut self, list_id: &str) -> Outcome {
        self.begin_request();
        let Some(token) = self.token() else {
            return Outcome::Ignored;
        };
        if !self.prompt.confirm(CONFIRM_DELETE_LIST) {
            debug!("list deletion cancelled");
            return Outcome::Cancelled;
        }

        if let Err(err) = self.gateway.delete_list(&token, list_id).await {
            warn!(error = %err, "failed to delete list");
            self.notify("No se pudo eliminar la lista", ToastKind::Error);
            return Outcome::Rendered;
        }

        let was_active = self.session.current_list_id().as_deref() == Some(list_id)
            || matches!(&self.state, DashboardState::ListView { list_id: active, .. } if active == list_id);
        if was_active {
            self.session.clear_list_selection();
            self.state = DashboardState::Empty;
            self.title.clear();
            self.task_area = TaskArea::Placeholder;
        } else {
            self.drop_list_cards(list_id);
        }

        self.lists = self.gateway.fetch_lists(&token).await;
        info!(remaining = self.lists.len(), was_active, "list deleted");
        self.notify("Lista eliminada", ToastKind::Success);

        if self.state == DashboardState::Empty {
            self.select_first_or_empty(&token).await;
        }
        Outcome::Rendered
    }

    #[tracing::instrument(skip(self), fields(request_id = tracing::field::Empty))]
    pub async fn delete_task(&mut self, task_id: &str) -> Outcome {
        self.begin_request();
        let Some(token) = self.token() else {
            return Outcome::Ignored;
        };
        if !self.prompt.confirm(CONFIRM_DELETE_TASK) {
            debug!("task deletion cancelled");
            return Outcome::Cancelled;
        }

        match self.gateway.delete_task(&token, task_id).await {
            Ok(()) => {
                self.remove_card(task_id);
                self.notify("Tarea eliminada", ToastKind::Success);
            }
            Err(err) => {
                warn!(error = %err, "failed to delete task");
                self.notify("No se pudo eliminar la tarea", ToastKind::Error);
            }
        }
        Outcome::Rendered
    }

    /// Marks a task done, or back to unassigned when `done` is false.
    #[tracing::instrument(skip(self), fields(request_id = tracing::field::Empty))]
    pub async fn toggle_task(&mut self, task_id: &str, done: bool) -> Outcome {
        self.begin_request();
        let Some(token) = self.token() else {
            return Outcome::Ignored;
        };

        let status = if done {
            lumo_shared::TaskStatus::Done
        } else {
            lumo_shared::TaskStatus::Unassigned
        };
        match self
            .gateway
            .update_task(&token, task_id, &TaskPatch::status(status))
            .await
        {
            Ok(updated) => {
                self.replace_card(updated);
                self.notify("Tarea actualizada", ToastKind::Success);
            }
            Err(err) => {
                warn!(error = %err, "failed to toggle task");
                self.notify("No se pudo actualizar la tarea", ToastKind::Error);
            }
        }
        Outcome::Rendered
    }

    pub fn edit_task(&mut self, task_id: &str, list_id: &str) -> Outcome {
        self.session.set_edit_task(task_id, list_id);
        info!(task_id, list_id, "handing off to task editor");
        Outcome::Navigate(Page::EditTask)
    }

    pub fn new_task(&self) -> Outcome {
        match &self.state {
            DashboardState::ListView { list_id, .. } => Outcome::Navigate(Page::CreateTask {
                list_id: list_id.clone(),
            }),
            _ => Outcome::Ignored,
        }
    }

    pub fn render_context(&self) -> RenderContext {
        RenderContext {
            timezone: self.settings.timezone,
            selected_list_id: self.session.current_list_id(),
        }
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> DashboardSnapshot {
        DashboardSnapshot {
            state: self.state.clone(),
            header: self.header.clone(),
            lists: self.lists.clone(),
            title: self.title.clone(),
            task_area: self.task_area.clone(),
            create_task_visible: self.create_task_visible(),
            toasts: self.toasts.visible(now).cloned().collect(),
        }
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.snapshot_at(Utc::now())
    }

    pub fn render(&self) -> ViewNode {
        render_dashboard(&self.snapshot(), &self.render_context())
    }

    fn begin_request(&mut self) {
        self.request_seq += 1;
        tracing::Span::current().record("request_id", self.request_seq);
        self.toasts.prune(Utc::now());
    }

    fn token(&self) -> Option<AuthToken> {
        match AuthToken::require(self.session.token()) {
            Ok(token) => Some(token),
            Err(_) => {
                debug!("no session token; ignoring");
                None
            }
        }
    }

    fn notify(&mut self, message: &str, kind: ToastKind) {
        self.toasts.push(message, kind, Utc::now());
    }

    async fn load_header(&self, token: &AuthToken) -> UserHeader {
        let display_name = match self.gateway.fetch_profile(token).await {
            Ok(profile) => {
                let name = profile.display_name();
                if name.trim().is_empty() {
                    PLACEHOLDER_NAME.to_string()
                } else {
                    name
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to load profile; using placeholder name");
                PLACEHOLDER_NAME.to_string()
            }
        };
        UserHeader {
            display_name,
            last_activity: Utc::now(),
        }
    }

    async fn show_list(&mut self, token: &AuthToken, list_id: String, title: String) {
        self.session.select_list(&list_id, &title);
        self.task_area = match self.gateway.fetch_tasks_for_list(token, &list_id).await {
            Ok(tasks) => {
                info!(%list_id, count = tasks.len(), "showing list");
                TaskArea::Tasks(tasks)
            }
            Err(err) => {
                warn!(%list_id, error = %err, "failed to load tasks");
                TaskArea::Message(TASKS_ERROR.to_string())
            }
        };
        self.title = title.clone();
        self.state = DashboardState::ListView { list_id, title };
    }

    async fn select_first_or_empty(&mut self, token: &AuthToken) {
        match self.lists.first().cloned() {
            Some(first) => self.show_list(token, first.id, first.title).await,
            None => {
                debug!("no lists; dashboard is empty");
                self.session.clear_list_selection();
                self.state = DashboardState::Empty;
                self.title.clear();
                self.task_area = TaskArea::Placeholder;
            }
        }
    }

    fn remove_card(&mut self, task_id: &str) {
        match &mut self.task_area {
            TaskArea::Tasks(tasks) => tasks.retain(|task| task.id != task_id),
            TaskArea::Board(grouped) => {
                grouped.remove(task_id);
            }
            TaskArea::Placeholder | TaskArea::Message(_) => {}
        }
    }

    /// Cards of a deleted list vanish from bucket and board views.
    fn drop_list_cards(&mut self, list_id: &str) {
        let keep = |task: &Task| task.list_id.as_deref() != Some(list_id);
        match &mut self.task_area {
            TaskArea::Tasks(tasks) => tasks.retain(keep),
            TaskArea::Board(grouped) => grouped.retain(keep),
            TaskArea::Placeholder | TaskArea::Message(_) => {}
        }
    }

    /// Puts the server's copy of a task back into the view. A bucket only keeps
    /// tasks that still carry its status.
    fn replace_card(&mut self, updated: Task) {
        let bucket = match &self.state {
            DashboardState::BucketView(status) => Some(status.clone()),
            _ => None,
        };
        match &mut self.task_area {
            TaskArea::Tasks(tasks) => {
                let leaves_bucket = bucket.is_some_and(|status| status != updated.status);
                if leaves_bucket {
                    tasks.retain(|task| task.id != updated.id);
                } else if let Some(slot) = tasks.iter_mut().find(|task| task.id == updated.id) {
                    *slot = updated;
                }
            }
            TaskArea::Board(grouped) => {
                grouped.remove(&updated.id);
                grouped.push(updated);
            }
            TaskArea::Placeholder | TaskArea::Message(_) => {}
        }
    }
}
