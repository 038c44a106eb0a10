use chrono_tz::Tz;

use crate::action::Action;
use crate::dashboard::{DashboardSnapshot, DashboardState, TaskArea, UserHeader};
use crate::datetime::format_display;
use crate::model::{GroupedTasks, List, Status, Task};
use crate::toast::Toast;

pub const EMPTY_LISTS: &str = "No hay listas";
pub const EMPTY_TASKS: &str = "No hay tareas. ¡Crea una tarea!";
pub const EMPTY_COLUMN: &str = "Sin tareas";
pub const NO_SELECTION: &str = "Crea una lista para empezar";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewNode {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: &'static str,
    pub classes: Vec<String>,
    pub attrs: Vec<(String, String)>,
    pub action: Option<Action>,
    pub children: Vec<ViewNode>,
}

impl Element {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            classes: vec![],
            attrs: vec![],
            action: None,
            children: vec![],
        }
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        let class = class.into();
        if !class.is_empty() {
            self.classes.push(class);
        }
        self
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((key.into(), value.into()));
        self
    }

    pub fn on_click(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn child(mut self, child: impl Into<ViewNode>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ViewNode>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.child(ViewNode::Text(text.into()))
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn attr_value(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl From<Element> for ViewNode {
    fn from(value: Element) -> Self {
        Self::Element(value)
    }
}

impl ViewNode {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(element) => Some(element),
            Self::Text(_) => None,
        }
    }

    pub fn text_content(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Element(element) => element
                .children
                .iter()
                .map(ViewNode::text_content)
                .collect(),
        }
    }

    /// Depth-first search, including this node.
    pub fn find_by_class(&self, class: &str) -> Vec<&Element> {
        let mut found = vec![];
        collect_by_class(self, class, &mut found);
        found
    }

    pub fn actions(&self) -> Vec<&Action> {
        let mut found = vec![];
        collect_actions(self, &mut found);
        found
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_html(self, &mut out);
        out
    }
}

fn collect_by_class<'a>(node: &'a ViewNode, class: &str, found: &mut Vec<&'a Element>) {
    if let ViewNode::Element(element) = node {
        if element.has_class(class) {
            found.push(element);
        }
        for child in &element.children {
            collect_by_class(child, class, found);
        }
    }
}

fn collect_actions<'a>(node: &'a ViewNode, found: &mut Vec<&'a Action>) {
    if let ViewNode::Element(element) = node {
        if let Some(action) = &element.action {
            found.push(action);
        }
        for child in &element.children {
            collect_actions(child, found);
        }
    }
}

fn write_html(node: &ViewNode, out: &mut String) {
    let element = match node {
        ViewNode::Text(text) => {
            out.push_str(&escape_html(text));
            return;
        }
        ViewNode::Element(element) => element,
    };

    out.push('<');
    out.push_str(element.tag);
    if !element.classes.is_empty() {
        out.push_str(&format!(" class=\"{}\"", escape_html(&element.classes.join(" "))));
    }
    let action_attrs = element
        .action
        .as_ref()
        .map(Action::data_attrs)
        .unwrap_or_default();
    for (key, value) in element
        .attrs
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .chain(action_attrs.iter().map(|(k, v)| (*k, v.as_str())))
    {
        out.push_str(&format!(" {key}=\"{}\"", escape_html(value)));
    }
    out.push('>');

    if matches!(element.tag, "input" | "br" | "img") {
        return;
    }
    for child in &element.children {
        write_html(child, out);
    }
    out.push_str(&format!("</{}>", element.tag));
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusBadge {
    pub label: String,
    pub css: &'static str,
}

pub fn map_status(status: &Status) -> StatusBadge {
    let (label, css) = match status {
        Status::Unassigned => ("Por hacer", "todo"),
        Status::Ongoing => ("Haciendo", "doing"),
        Status::Done => ("Completada", "done"),
        Status::Other(raw) => (raw.as_str(), ""),
    };
    StatusBadge {
        label: label.to_string(),
        css,
    }
}

/// What the renderer needs besides the data itself.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub timezone: Tz,
    pub selected_list_id: Option<String>,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::UTC,
            selected_list_id: None,
        }
    }
}

pub fn render_lists(lists: &[List], active_list_id: Option<&str>) -> ViewNode {
    let container = Element::new("ul").class("lists").attr("id", "lists-container");

    if lists.is_empty() {
        return container
            .child(Element::new("li").child(Element::new("span").class("list-name").text(EMPTY_LISTS)))
            .into();
    }

    container
        .children(lists.iter().map(|list| {
            let active = active_list_id == Some(list.id.as_str());
            Element::new("li")
                .class("list-item")
                .class(if active { "active" } else { "" })
                .child(
                    Element::new("a")
                        .class("list-link")
                        .attr("href", "#")
                        .on_click(Action::SelectList {
                            list_id: list.id.clone(),
                            title: list.title.clone(),
                        })
                        .child(Element::new("span").class("list-name").text(&list.title)),
                )
                .child(
                    Element::new("div")
                        .class("list-menu")
                        .child(Element::new("button").class("list-menu-toggle").text("⋮"))
                        .child(
                            Element::new("ul").class("list-menu-options").child(
                                Element::new("li").child(
                                    Element::new("button")
                                        .class("delete-list")
                                        .on_click(Action::DeleteList {
                                            list_id: list.id.clone(),
                                        })
                                        .text("Eliminar"),
                                ),
                            ),
                        ),
                )
        }))
        .into()
}

pub fn render_tasks(tasks: &[Task], ctx: &RenderContext) -> ViewNode {
    let container = Element::new("div").class("task-list");
    if tasks.is_empty() {
        return container
            .child(Element::new("p").class("empty-state").text(EMPTY_TASKS))
            .into();
    }
    container
        .children(tasks.iter().map(|task| task_card(task, ctx, true)))
        .into()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KanbanColumns {
    pub unassigned: ViewNode,
    pub ongoing: ViewNode,
    pub done: ViewNode,
}

pub fn render_kanban_board(grouped: &GroupedTasks, ctx: &RenderContext) -> KanbanColumns {
    KanbanColumns {
        unassigned: kanban_column(&Status::Unassigned, &grouped.unassigned, ctx),
        ongoing: kanban_column(&Status::Ongoing, &grouped.ongoing, ctx),
        done: kanban_column(&Status::Done, &grouped.done, ctx),
    }
}

fn kanban_column(status: &Status, tasks: &[Task], ctx: &RenderContext) -> ViewNode {
    let badge = map_status(status);
    let cards = Element::new("div").class("kanban-cards");
    let cards = if tasks.is_empty() {
        cards.child(Element::new("p").class("kanban-empty").text(EMPTY_COLUMN))
    } else {
        cards.children(tasks.iter().map(|task| task_card(task, ctx, false)))
    };

    Element::new("section")
        .class("kanban-column")
        .class(badge.css)
        .attr("data-status", status.as_str())
        .child(
            Element::new("h3")
                .class("kanban-column-title")
                .text(format!("{} ({})", badge.label, tasks.len())),
        )
        .child(cards)
        .into()
}

/// Due date when present, otherwise creation date.
pub fn task_date_label(task: &Task, tz: Tz) -> String {
    match (task.due_date, task.created_at) {
        (Some(due), _) => format!("Vence: {}", format_display(due, tz)),
        (None, Some(created)) => format!("Creada: {}", format_display(created, tz)),
        (None, None) => String::new(),
    }
}

fn task_card(task: &Task, ctx: &RenderContext, with_checkbox: bool) -> Element {
    let badge = map_status(&task.status);
    let list_id = task.resolved_list_id(ctx.selected_list_id.as_deref());
    let done = task.status == Status::Done;

    let mut card = Element::new("article")
        .class("task-card")
        .attr("data-task-id", &task.id);

    if with_checkbox {
        let checkbox = Element::new("input")
            .class("task-check")
            .attr("type", "checkbox")
            .on_click(Action::ToggleTask {
                task_id: task.id.clone(),
                done: !done,
            });
        card = card.child(if done { checkbox.attr("checked", "checked") } else { checkbox });
    }

    card.child(Element::new("h3").class("task-title").text(&task.title))
        .child(Element::new("p").class("task-desc").text(&task.description))
        .child(
            Element::new("div")
                .class("task-meta")
                .child(
                    Element::new("span")
                        .class("task-date")
                        .text(task_date_label(task, ctx.timezone)),
                )
                .child(
                    Element::new("span")
                        .class("status-badge")
                        .class(badge.css)
                        .text(badge.label),
                ),
        )
        .child(
            Element::new("div")
                .class("task-actions")
                .child(
                    Element::new("button")
                        .class("edit-task")
                        .on_click(Action::EditTask {
                            task_id: task.id.clone(),
                            list_id,
                        })
                        .text("Editar"),
                )
                .child(
                    Element::new("button")
                        .class("delete-task")
                        .on_click(Action::DeleteTask {
                            task_id: task.id.clone(),
                        })
                        .text("Eliminar"),
                ),
        )
}

pub fn render_header(header: &UserHeader, tz: Tz) -> ViewNode {
    Element::new("div")
        .class("user-info")
        .attr("id", "user-info")
        .child(Element::new("span").class("name").text("Bienvenido/a,"))
        .child(Element::new("span").class("name").text(&header.display_name))
        .child(Element::new("span").class("last-time").text("Última actividad:"))
        .child(
            Element::new("span")
                .class("last-time")
                .text(format_display(header.last_activity, tz)),
        )
        .into()
}

pub fn render_bucket_nav(active: Option<&Status>, board_active: bool) -> ViewNode {
    let bucket_links = Status::COLUMNS.into_iter().map(|status| {
        let badge = map_status(&status);
        Element::new("li").child(
            Element::new("a")
                .class("bucket-link")
                .class(if active == Some(&status) { "active" } else { "" })
                .attr("href", "#")
                .on_click(Action::SelectBucket(status))
                .text(badge.label),
        )
    });

    Element::new("ul")
        .class("kanban-statuses")
        .attr("id", "kanban-statuses")
        .children(bucket_links)
        .child(
            Element::new("li").child(
                Element::new("a")
                    .class("board-link")
                    .class(if board_active { "active" } else { "" })
                    .attr("href", "#")
                    .on_click(Action::EnterKanban)
                    .text("Tablero"),
            ),
        )
        .into()
}

pub fn render_toasts(toasts: &[Toast]) -> ViewNode {
    Element::new("div")
        .class("toast-container")
        .children(toasts.iter().map(|toast| {
            Element::new("div")
                .class("toast")
                .class(toast.kind.css_class())
                .attr("data-toast-id", toast.id.to_string())
                .text(&toast.message)
        }))
        .into()
}

/// Whole dashboard page.
pub fn render_dashboard(snapshot: &DashboardSnapshot, ctx: &RenderContext) -> ViewNode {
    let active_list = snapshot.active_list_id();
    let active_bucket = match &snapshot.state {
        DashboardState::BucketView(status) => Some(status),
        _ => None,
    };
    let board_active = snapshot.state == DashboardState::FullKanban;

    let mut page = Element::new("div").class("dashboard");
    if let Some(header) = &snapshot.header {
        page = page.child(render_header(header, ctx.timezone));
    }

    let sidebar = Element::new("aside")
        .class("sidebar")
        .attr("id", "sidebar")
        .child(
            Element::new("button")
                .class("create-list-btn")
                .attr("id", "create-list-btn")
                .on_click(Action::NewList)
                .text("+ Nueva lista"),
        )
        .child(render_lists(&snapshot.lists, active_list))
        .child(render_bucket_nav(active_bucket, board_active));

    let mut content = Element::new("main")
        .class("content")
        .child(Element::new("h2").class("current-list-title").text(&snapshot.title));

    if snapshot.create_task_visible {
        content = content.child(
            Element::new("button")
                .class("new-task-btn")
                .on_click(Action::NewTask)
                .text("+ Nueva tarea"),
        );
    }

    let task_container = Element::new("div").class("task-container").attr("id", "task-container");
    content = match &snapshot.task_area {
        TaskArea::Placeholder => content.child(
            task_container.child(Element::new("p").class("placeholder").text(NO_SELECTION)),
        ),
        TaskArea::Tasks(tasks) => content.child(task_container.child(render_tasks(tasks, ctx))),
        TaskArea::Message(message) => content.child(
            task_container.child(Element::new("p").class("inline-error").text(message)),
        ),
        TaskArea::Board(grouped) => {
            let columns = render_kanban_board(grouped, ctx);
            content.child(task_container.class("hidden")).child(
                Element::new("div")
                    .class("kanban-board")
                    .child(columns.unassigned)
                    .child(columns.ongoing)
                    .child(columns.done),
            )
        }
    };

    page.child(sidebar)
        .child(content)
        .child(render_toasts(&snapshot.toasts))
        .into()
}
