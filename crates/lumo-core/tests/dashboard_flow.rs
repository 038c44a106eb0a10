use std::cell::RefCell;
use std::collections::BTreeMap;

use chrono::Duration;
use lumo_core::action::{Action, Outcome, Page};
use lumo_core::api::{ApiError, ApiResult, AuthToken, Gateway};
use lumo_core::dashboard::{
    Confirm, Dashboard, DashboardSettings, DashboardState, PLACEHOLDER_NAME, TASKS_ERROR,
    TaskArea,
};
use lumo_core::model::{GroupedTasks, List, Status, Task};
use lumo_core::session::{
    CURRENT_LIST_ID_KEY, EDIT_TASK_ID_KEY, MemorySessionStore, SessionStore, TOKEN_KEY,
    VIEW_MODE_KEY,
};
use lumo_shared::{TaskCreate, TaskPatch, UserProfile};

#[derive(Default)]
struct FakeGateway {
    lists: RefCell<Vec<List>>,
    tasks: RefCell<BTreeMap<String, Vec<Task>>>,
    fail_lists: bool,
    fail_tasks: bool,
    fail_profile: bool,
    fail_mutations: bool,
    calls: RefCell<Vec<String>>,
}

impl FakeGateway {
    fn with_lists(lists: &[(&str, &str)]) -> Self {
        let gateway = Self::default();
        *gateway.lists.borrow_mut() = lists
            .iter()
            .map(|(id, title)| List {
                id: id.to_string(),
                title: title.to_string(),
            })
            .collect();
        gateway
    }

    fn add_task(&self, list_id: &str, id: &str, status: Status) {
        self.tasks
            .borrow_mut()
            .entry(list_id.to_string())
            .or_default()
            .push(task(id, status, Some(list_id)));
    }

    fn log(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn count(&self, call: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.as_str() == call).count()
    }

    fn failure() -> ApiError {
        ApiError::RequestFailed {
            status: 500,
            body: "boom".to_string(),
        }
    }
}

impl Gateway for FakeGateway {
    async fn request_lists(&self, _: &AuthToken) -> ApiResult<Vec<List>> {
        self.log("lists".to_string());
        if self.fail_lists {
            return Err(Self::failure());
        }
        Ok(self.lists.borrow().clone())
    }

    async fn create_list(&self, _: &AuthToken, title: &str) -> ApiResult<List> {
        self.log(format!("create-list {title}"));
        let list = List {
            id: format!("L{}", self.lists.borrow().len() + 1),
            title: title.to_string(),
        };
        self.lists.borrow_mut().push(list.clone());
        Ok(list)
    }

    async fn delete_list(&self, _: &AuthToken, list_id: &str) -> ApiResult<()> {
        self.log(format!("delete-list {list_id}"));
        if self.fail_mutations {
            return Err(Self::failure());
        }
        self.lists.borrow_mut().retain(|list| list.id != list_id);
        self.tasks.borrow_mut().remove(list_id);
        Ok(())
    }

    async fn fetch_tasks_for_list(&self, _: &AuthToken, list_id: &str) -> ApiResult<Vec<Task>> {
        self.log(format!("tasks {list_id}"));
        if self.fail_tasks {
            return Err(Self::failure());
        }
        Ok(self.tasks.borrow().get(list_id).cloned().unwrap_or_default())
    }

    async fn fetch_tasks_grouped(&self, _: &AuthToken) -> ApiResult<GroupedTasks> {
        self.log("grouped".to_string());
        if self.fail_tasks {
            return Err(Self::failure());
        }
        let mut grouped = GroupedTasks::default();
        for task in self.tasks.borrow().values().flatten() {
            grouped.push(task.clone());
        }
        Ok(grouped)
    }

    async fn create_task(
        &self,
        _: &AuthToken,
        list_id: &str,
        fields: &TaskCreate,
    ) -> ApiResult<Task> {
        self.log(format!("create-task {list_id}"));
        let created = Task {
            title: fields.title.clone(),
            ..task("T-new", fields.status.into(), Some(list_id))
        };
        Ok(created)
    }

    async fn update_task(
        &self,
        _: &AuthToken,
        task_id: &str,
        fields: &TaskPatch,
    ) -> ApiResult<Task> {
        self.log(format!("update-task {task_id}"));
        if self.fail_mutations {
            return Err(Self::failure());
        }
        let mut tasks = self.tasks.borrow_mut();
        let stored = tasks
            .values_mut()
            .flatten()
            .find(|task| task.id == task_id)
            .ok_or(ApiError::RequestFailed {
                status: 404,
                body: "not found".to_string(),
            })?;
        if let Some(status) = fields.status {
            stored.status = status.into();
        }
        Ok(stored.clone())
    }

    async fn delete_task(&self, _: &AuthToken, task_id: &str) -> ApiResult<()> {
        self.log(format!("delete-task {task_id}"));
        if self.fail_mutations {
            return Err(Self::failure());
        }
        for tasks in self.tasks.borrow_mut().values_mut() {
            tasks.retain(|task| task.id != task_id);
        }
        Ok(())
    }

    async fn fetch_profile(&self, _: &AuthToken) -> ApiResult<UserProfile> {
        self.log("profile".to_string());
        if self.fail_profile {
            return Err(Self::failure());
        }
        Ok(UserProfile {
            first_name: "Ana".to_string(),
            last_name: "López".to_string(),
            age: Some(30),
            email: "ana@mail.com".to_string(),
        })
    }
}

struct Prompt {
    answer: bool,
    asked: Vec<String>,
}

impl Confirm for Prompt {
    fn confirm(&mut self, message: &str) -> bool {
        self.asked.push(message.to_string());
        self.answer
    }
}

fn task(id: &str, status: Status, list_id: Option<&str>) -> Task {
    Task {
        id: id.to_string(),
        title: format!("task {id}"),
        description: String::new(),
        status,
        due_date: None,
        created_at: None,
        list_id: list_id.map(str::to_string),
    }
}

fn logged_in(extra: &[(&str, &str)]) -> MemorySessionStore {
    let mut store = MemorySessionStore::with_entries([(TOKEN_KEY, "jwt")]);
    for (key, value) in extra {
        store.set(key, value);
    }
    store
}

fn dashboard(
    gateway: FakeGateway,
    store: MemorySessionStore,
    answer: bool,
) -> Dashboard<FakeGateway, MemorySessionStore, Prompt> {
    Dashboard::new(
        gateway,
        store,
        Prompt {
            answer,
            asked: vec![],
        },
        DashboardSettings::default(),
    )
}

fn home_and_work() -> FakeGateway {
    let gateway = FakeGateway::with_lists(&[("L1", "Home"), ("L2", "Work")]);
    gateway.add_task("L1", "T1", Status::Unassigned);
    gateway.add_task("L1", "T2", Status::Done);
    gateway.add_task("L2", "T3", Status::Done);
    gateway.add_task("L2", "T4", Status::Ongoing);
    gateway
}

fn stored(dash: &Dashboard<FakeGateway, MemorySessionStore, Prompt>, key: &str) -> Option<String> {
    dash.session().store().get(key)
}

fn visible_ids(dash: &Dashboard<FakeGateway, MemorySessionStore, Prompt>) -> Vec<String> {
    match dash.task_area() {
        TaskArea::Tasks(tasks) => tasks.iter().map(|t| t.id.clone()).collect(),
        TaskArea::Board(grouped) => grouped.iter().map(|t| t.id.clone()).collect(),
        other => panic!("expected tasks, got {other:?}"),
    }
}

/// List selection, bucket and board are never active at the same time.
fn assert_exclusive(dash: &Dashboard<FakeGateway, MemorySessionStore, Prompt>) {
    let list = stored(dash, CURRENT_LIST_ID_KEY);
    match dash.state() {
        DashboardState::ListView { list_id, .. } => {
            assert_eq!(list.as_deref(), Some(list_id.as_str()));
            assert!(dash.create_task_visible());
        }
        DashboardState::BucketView(_) | DashboardState::FullKanban | DashboardState::Empty => {
            assert_eq!(list, None);
            assert!(!dash.create_task_visible());
        }
    }
}

#[tokio::test]
async fn first_visit_selects_first_list() {
    let mut dash = dashboard(home_and_work(), logged_in(&[]), true);

    assert_eq!(dash.bootstrap().await, Outcome::Rendered);

    assert_eq!(
        dash.state(),
        &DashboardState::ListView {
            list_id: "L1".to_string(),
            title: "Home".to_string(),
        }
    );
    assert_eq!(dash.title(), "Home");
    assert_eq!(stored(&dash, CURRENT_LIST_ID_KEY).as_deref(), Some("L1"));
    assert_eq!(visible_ids(&dash), ["T1", "T2"]);
    assert_eq!(dash.gateway().count("tasks L1"), 1);
    assert_eq!(
        dash.header().map(|h| h.display_name.as_str()),
        Some("Ana López")
    );
    assert_exclusive(&dash);
}

#[tokio::test]
async fn persisted_selection_is_restored() {
    let mut dash = dashboard(
        home_and_work(),
        logged_in(&[(CURRENT_LIST_ID_KEY, "L2")]),
        true,
    );
    dash.bootstrap().await;

    assert_eq!(dash.title(), "Work");
    assert_eq!(visible_ids(&dash), ["T3", "T4"]);
    assert_eq!(dash.gateway().count("tasks L1"), 0);
    assert_exclusive(&dash);
}

#[tokio::test]
async fn stale_selection_falls_back_to_first_list() {
    let mut dash = dashboard(
        home_and_work(),
        logged_in(&[(CURRENT_LIST_ID_KEY, "L9")]),
        true,
    );
    dash.bootstrap().await;

    assert_eq!(stored(&dash, CURRENT_LIST_ID_KEY).as_deref(), Some("L1"));
    assert_eq!(dash.title(), "Home");
    assert_eq!(dash.gateway().count("tasks L9"), 0);
}

#[tokio::test]
async fn missing_token_redirects_to_login_without_network() {
    let mut dash = dashboard(home_and_work(), MemorySessionStore::new(), true);

    assert_eq!(dash.bootstrap().await, Outcome::Navigate(Page::Login));
    assert!(dash.gateway().calls.borrow().is_empty());

    assert_eq!(dash.enter_kanban().await, Outcome::Ignored);
    assert_eq!(dash.delete_task("T1").await, Outcome::Ignored);
    assert!(dash.gateway().calls.borrow().is_empty());
}

#[tokio::test]
async fn edit_hand_off_needs_no_token() {
    let mut dash = dashboard(home_and_work(), MemorySessionStore::new(), true);

    assert_eq!(
        dash.edit_task("T1", "L1"),
        Outcome::Navigate(Page::EditTask)
    );
    assert_eq!(stored(&dash, EDIT_TASK_ID_KEY).as_deref(), Some("T1"));
    assert_eq!(dash.new_task(), Outcome::Ignored);
    assert!(dash.gateway().calls.borrow().is_empty());
}

#[tokio::test]
async fn bucket_view_drops_list_selection() {
    let mut dash = dashboard(home_and_work(), logged_in(&[]), true);
    dash.bootstrap().await;

    let outcome = dash.dispatch(Action::SelectBucket(Status::Done)).await;

    assert_eq!(outcome, Outcome::Rendered);
    assert_eq!(dash.state(), &DashboardState::BucketView(Status::Done));
    assert_eq!(stored(&dash, CURRENT_LIST_ID_KEY), None);
    assert_eq!(stored(&dash, VIEW_MODE_KEY).as_deref(), Some("bucket:done"));
    assert_eq!(dash.title(), "Completada");
    assert_eq!(visible_ids(&dash), ["T2", "T3"]);
    assert!(!dash.create_task_visible());
    assert!(dash.render().find_by_class("new-task-btn").is_empty());
    assert_eq!(dash.new_task(), Outcome::Ignored);
}

#[tokio::test]
async fn selections_stay_mutually_exclusive() {
    let mut dash = dashboard(home_and_work(), logged_in(&[]), true);
    dash.bootstrap().await;

    let script = [
        Action::SelectList {
            list_id: "L2".to_string(),
            title: "Work".to_string(),
        },
        Action::SelectBucket(Status::Ongoing),
        Action::EnterKanban,
        Action::SelectList {
            list_id: "L1".to_string(),
            title: "Home".to_string(),
        },
        Action::EnterKanban,
        Action::SelectBucket(Status::Unassigned),
    ];
    for action in script {
        dash.dispatch(action).await;
        assert_exclusive(&dash);
    }
    assert_eq!(visible_ids(&dash), ["T1"]);
}

#[tokio::test]
async fn kanban_board_groups_every_task() {
    let mut dash = dashboard(home_and_work(), logged_in(&[]), true);
    dash.bootstrap().await;
    dash.enter_kanban().await;

    let TaskArea::Board(grouped) = dash.task_area() else {
        panic!("expected board");
    };
    assert_eq!(grouped.unassigned.len(), 1);
    assert_eq!(grouped.ongoing.len(), 1);
    assert_eq!(grouped.done.len(), 2);

    let view = dash.render();
    assert_eq!(view.find_by_class("kanban-column").len(), 3);
    assert!(view.find_by_class("task-check").is_empty());
}

#[tokio::test]
async fn deleting_task_removes_card_and_shows_toast() {
    let mut dash = dashboard(home_and_work(), logged_in(&[]), true);
    dash.bootstrap().await;

    let outcome = dash
        .dispatch(Action::DeleteTask {
            task_id: "T1".to_string(),
        })
        .await;

    assert_eq!(outcome, Outcome::Rendered);
    assert_eq!(visible_ids(&dash), ["T2"]);
    assert_eq!(dash.gateway().count("tasks L1"), 1);

    let toast = dash.toasts().latest().cloned().expect("toast");
    assert_eq!(toast.message, "Tarea eliminada");
    let shown = dash.snapshot_at(toast.created_at + Duration::milliseconds(2999));
    assert_eq!(shown.toasts.len(), 1);
    let gone = dash.snapshot_at(toast.created_at + Duration::milliseconds(3000));
    assert!(gone.toasts.is_empty());
}

#[tokio::test]
async fn declined_confirmation_changes_nothing() {
    let mut dash = dashboard(home_and_work(), logged_in(&[]), false);
    dash.bootstrap().await;

    assert_eq!(dash.delete_task("T1").await, Outcome::Cancelled);
    assert_eq!(dash.delete_list("L1").await, Outcome::Cancelled);

    assert_eq!(dash.gateway().count("delete-task T1"), 0);
    assert_eq!(dash.gateway().count("delete-list L1"), 0);
    assert_eq!(visible_ids(&dash), ["T1", "T2"]);
    assert!(dash.toasts().is_empty());
}

#[tokio::test]
async fn deleting_active_list_selects_next_one() {
    let mut dash = dashboard(home_and_work(), logged_in(&[]), true);
    dash.bootstrap().await;

    dash.delete_list("L1").await;

    assert_eq!(
        dash.lists().iter().map(|l| l.id.as_str()).collect::<Vec<_>>(),
        ["L2"]
    );
    assert_eq!(stored(&dash, CURRENT_LIST_ID_KEY).as_deref(), Some("L2"));
    assert_eq!(visible_ids(&dash), ["T3", "T4"]);
    assert_eq!(
        dash.toasts().latest().map(|t| t.message.as_str()),
        Some("Lista eliminada")
    );
    assert_exclusive(&dash);
}

#[tokio::test]
async fn deleting_other_list_keeps_selection() {
    let mut dash = dashboard(
        home_and_work(),
        logged_in(&[(CURRENT_LIST_ID_KEY, "L2")]),
        true,
    );
    dash.bootstrap().await;

    dash.delete_list("L1").await;

    assert_eq!(dash.title(), "Work");
    assert_eq!(stored(&dash, CURRENT_LIST_ID_KEY).as_deref(), Some("L2"));
    assert_eq!(dash.gateway().count("tasks L2"), 1);
}

#[tokio::test]
async fn deleting_last_list_empties_dashboard() {
    let gateway = FakeGateway::with_lists(&[("L1", "Home")]);
    let mut dash = dashboard(gateway, logged_in(&[]), true);
    dash.bootstrap().await;

    dash.delete_list("L1").await;

    assert_eq!(dash.state(), &DashboardState::Empty);
    assert_eq!(dash.task_area(), &TaskArea::Placeholder);
    assert_eq!(stored(&dash, CURRENT_LIST_ID_KEY), None);
    assert!(dash.render().text_content().contains("No hay listas"));
}

#[tokio::test]
async fn deleting_list_from_board_drops_its_cards() {
    let mut dash = dashboard(home_and_work(), logged_in(&[]), true);
    dash.bootstrap().await;
    dash.enter_kanban().await;

    assert_eq!(dash.delete_list("L1").await, Outcome::Rendered);

    assert_eq!(dash.state(), &DashboardState::FullKanban);
    assert_eq!(
        dash.lists().iter().map(|l| l.id.as_str()).collect::<Vec<_>>(),
        ["L2"]
    );
    assert_eq!(visible_ids(&dash), ["T4", "T3"]);
    assert_exclusive(&dash);
}

#[tokio::test]
async fn deleting_list_from_bucket_drops_its_cards() {
    let mut dash = dashboard(home_and_work(), logged_in(&[]), true);
    dash.bootstrap().await;
    dash.select_bucket(Status::Done).await;

    dash.delete_list("L1").await;

    assert_eq!(dash.state(), &DashboardState::BucketView(Status::Done));
    assert_eq!(visible_ids(&dash), ["T3"]);
    assert_eq!(dash.gateway().count("grouped"), 1);
    assert_exclusive(&dash);
}

#[tokio::test]
async fn deleting_task_on_board_removes_it_from_its_column() {
    let mut dash = dashboard(home_and_work(), logged_in(&[]), true);
    dash.bootstrap().await;
    dash.enter_kanban().await;

    dash.delete_task("T3").await;

    let TaskArea::Board(grouped) = dash.task_area() else {
        panic!("expected board");
    };
    assert_eq!(
        grouped.done.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
        ["T2"]
    );
    assert_eq!(grouped.len(), 3);
    assert_eq!(dash.render().find_by_class("task-card").len(), 3);
}

#[tokio::test]
async fn toggling_on_board_moves_card_to_new_column() {
    let mut dash = dashboard(home_and_work(), logged_in(&[]), true);
    dash.bootstrap().await;
    dash.enter_kanban().await;

    dash.toggle_task("T1", true).await;

    let TaskArea::Board(grouped) = dash.task_area() else {
        panic!("expected board");
    };
    assert!(grouped.unassigned.is_empty());
    assert_eq!(
        grouped.done.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
        ["T2", "T3", "T1"]
    );
    assert_eq!(dash.state(), &DashboardState::FullKanban);
}

#[tokio::test]
async fn failed_mutation_keeps_view_and_reports_error() {
    let gateway = FakeGateway {
        fail_mutations: true,
        ..home_and_work()
    };
    let mut dash = dashboard(gateway, logged_in(&[]), true);
    dash.bootstrap().await;

    dash.delete_task("T1").await;
    assert_eq!(visible_ids(&dash), ["T1", "T2"]);

    dash.delete_list("L1").await;
    assert_eq!(dash.lists().len(), 2);
    assert_eq!(stored(&dash, CURRENT_LIST_ID_KEY).as_deref(), Some("L1"));

    let errors = dash
        .snapshot()
        .toasts
        .iter()
        .filter(|t| t.kind.css_class() == "error")
        .count();
    assert_eq!(errors, 2);
}

#[tokio::test]
async fn list_fetch_failure_degrades_to_empty() {
    let gateway = FakeGateway {
        fail_lists: true,
        ..home_and_work()
    };
    let mut dash = dashboard(gateway, logged_in(&[]), true);

    assert_eq!(dash.bootstrap().await, Outcome::Rendered);
    assert!(dash.lists().is_empty());
    assert_eq!(dash.state(), &DashboardState::Empty);
}

#[tokio::test]
async fn task_fetch_failure_shows_inline_message() {
    let gateway = FakeGateway {
        fail_tasks: true,
        ..home_and_work()
    };
    let mut dash = dashboard(gateway, logged_in(&[]), true);
    dash.bootstrap().await;

    assert_eq!(dash.task_area(), &TaskArea::Message(TASKS_ERROR.to_string()));
    dash.enter_kanban().await;
    assert_eq!(dash.task_area(), &TaskArea::Message(TASKS_ERROR.to_string()));
}

#[tokio::test]
async fn profile_failure_uses_placeholder_name() {
    let gateway = FakeGateway {
        fail_profile: true,
        ..home_and_work()
    };
    let mut dash = dashboard(gateway, logged_in(&[]), true);
    dash.bootstrap().await;

    assert_eq!(
        dash.header().map(|h| h.display_name.as_str()),
        Some(PLACEHOLDER_NAME)
    );
}

#[tokio::test]
async fn toggling_in_bucket_moves_task_out() {
    let mut dash = dashboard(home_and_work(), logged_in(&[]), true);
    dash.bootstrap().await;
    dash.select_bucket(Status::Unassigned).await;

    let outcome = dash
        .dispatch(Action::ToggleTask {
            task_id: "T1".to_string(),
            done: true,
        })
        .await;

    assert_eq!(outcome, Outcome::Rendered);
    assert!(visible_ids(&dash).is_empty());
    assert_eq!(dash.gateway().count("update-task T1"), 1);
}

#[tokio::test]
async fn toggling_in_list_updates_card_in_place() {
    let mut dash = dashboard(home_and_work(), logged_in(&[]), true);
    dash.bootstrap().await;

    dash.toggle_task("T2", false).await;

    let TaskArea::Tasks(tasks) = dash.task_area() else {
        panic!("expected tasks");
    };
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[1].status, Status::Unassigned);
}

#[tokio::test]
async fn edit_hands_off_task_and_list() {
    let mut dash = dashboard(home_and_work(), logged_in(&[]), true);
    dash.bootstrap().await;

    let outcome = dash
        .dispatch(Action::EditTask {
            task_id: "T4".to_string(),
            list_id: "L2".to_string(),
        })
        .await;

    assert_eq!(outcome, Outcome::Navigate(Page::EditTask));
    assert_eq!(stored(&dash, EDIT_TASK_ID_KEY).as_deref(), Some("T4"));
    assert_eq!(stored(&dash, CURRENT_LIST_ID_KEY).as_deref(), Some("L2"));
}

#[tokio::test]
async fn new_task_targets_current_list() {
    let mut dash = dashboard(home_and_work(), logged_in(&[]), true);
    dash.bootstrap().await;

    assert_eq!(
        dash.dispatch(Action::NewTask).await,
        Outcome::Navigate(Page::CreateTask {
            list_id: "L1".to_string(),
        })
    );
    assert_eq!(
        dash.dispatch(Action::NewList).await,
        Outcome::Navigate(Page::CreateList)
    );
}

#[tokio::test]
async fn every_transition_gets_a_request_id() {
    let mut dash = dashboard(home_and_work(), logged_in(&[]), true);
    dash.bootstrap().await;
    dash.enter_kanban().await;
    dash.select_list("L2", "Work").await;
    assert_eq!(dash.request_seq(), 3);
}

#[tokio::test]
async fn find_task_by_id_scans_grouped_view() {
    let gateway = home_and_work();
    let token = AuthToken::require(Some("jwt".to_string())).expect("token");

    let found = gateway.find_task_by_id(&token, "T4").await.expect("lookup");
    assert_eq!(found.map(|t| t.status), Some(Status::Ongoing));
    assert_eq!(gateway.find_task_by_id(&token, "nope").await, Ok(None));
}

#[tokio::test]
async fn rendered_dashboard_carries_actions() {
    let mut dash = dashboard(home_and_work(), logged_in(&[]), true);
    dash.bootstrap().await;

    let view = dash.render();
    let actions = view.actions();
    assert!(actions.contains(&&Action::ToggleTask {
        task_id: "T1".to_string(),
        done: true,
    }));
    assert!(actions.contains(&&Action::ToggleTask {
        task_id: "T2".to_string(),
        done: false,
    }));
    assert!(actions.contains(&&Action::NewTask));
    assert_eq!(view.find_by_class("active").len(), 1);

    let html = view.to_html();
    assert!(html.contains("Bienvenido/a,"));
    assert!(html.contains("data-action=\"delete-task\""));
}
