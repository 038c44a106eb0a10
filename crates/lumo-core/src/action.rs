use crate::model::Status;

/// Everything a user can trigger on the dashboard. Rendered affordances carry one of these
/// and the UI adapter hands it back to `Dashboard::dispatch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SelectList { list_id: String, title: String },
    SelectBucket(Status),
    EnterKanban,
    DeleteList { list_id: String },
    DeleteTask { task_id: String },
    ToggleTask { task_id: String, done: bool },
    EditTask { task_id: String, list_id: String },
    NewTask,
    NewList,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SelectList { .. } => "select-list",
            Self::SelectBucket(_) => "select-bucket",
            Self::EnterKanban => "enter-kanban",
            Self::DeleteList { .. } => "delete-list",
            Self::DeleteTask { .. } => "delete-task",
            Self::ToggleTask { .. } => "toggle-task",
            Self::EditTask { .. } => "edit-task",
            Self::NewTask => "new-task",
            Self::NewList => "new-list",
        }
    }

    /// `data-*` attributes identifying the payload in serialized markup.
    pub fn data_attrs(&self) -> Vec<(&'static str, String)> {
        let mut attrs = vec![("data-action", self.name().to_string())];
        match self {
            Self::SelectList { list_id, title } => {
                attrs.push(("data-list-id", list_id.clone()));
                attrs.push(("data-list-title", title.clone()));
            }
            Self::SelectBucket(status) => attrs.push(("data-status", status.to_string())),
            Self::DeleteList { list_id } => attrs.push(("data-list-id", list_id.clone())),
            Self::DeleteTask { task_id } => attrs.push(("data-task-id", task_id.clone())),
            Self::ToggleTask { task_id, done } => {
                attrs.push(("data-task-id", task_id.clone()));
                attrs.push(("data-done", done.to_string()));
            }
            Self::EditTask { task_id, list_id } => {
                attrs.push(("data-task-id", task_id.clone()));
                attrs.push(("data-list-id", list_id.clone()));
            }
            Self::EnterKanban | Self::NewTask | Self::NewList => {}
        }
        attrs
    }
}

/// Pages outside the dashboard. Navigation itself belongs to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Login,
    Dashboard,
    CreateList,
    CreateTask { list_id: String },
    EditTask,
    Home,
}

impl Page {
    pub fn path(&self) -> String {
        match self {
            Self::Login => "/login/".to_string(),
            Self::Dashboard => "/dashboard/".to_string(),
            Self::CreateList => "/create-list/".to_string(),
            Self::CreateTask { list_id } => format!("/create-task/?listId={list_id}"),
            Self::EditTask => "/edit-task/".to_string(),
            Self::Home => "/".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The view changed (or a toast was raised) and should be redrawn.
    Rendered,
    /// The user declined a confirmation prompt.
    Cancelled,
    /// Nothing to do: no token, or the affordance is not available in this state.
    Ignored,
    Navigate(Page),
}
