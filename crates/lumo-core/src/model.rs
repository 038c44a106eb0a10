use std::fmt;

use chrono::{DateTime, Utc};
use lumo_shared::TaskStatus;
use serde_json::Value;
use tracing::{debug, warn};

use crate::datetime::parse_timestamp;

pub const UNTITLED_LIST: &str = "Sin título";

/// Task status as received from the server. Unknown values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    Unassigned,
    Ongoing,
    Done,
    Other(String),
}

impl Status {
    pub const COLUMNS: [Status; 3] = [Status::Unassigned, Status::Ongoing, Status::Done];

    pub fn parse(raw: &str) -> Self {
        match TaskStatus::parse(raw) {
            Some(known) => known.into(),
            None => Self::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Unassigned => "unassigned",
            Self::Ongoing => "ongoing",
            Self::Done => "done",
            Self::Other(raw) => raw.as_str(),
        }
    }

    pub fn known(&self) -> Option<TaskStatus> {
        match self {
            Self::Unassigned => Some(TaskStatus::Unassigned),
            Self::Ongoing => Some(TaskStatus::Ongoing),
            Self::Done => Some(TaskStatus::Done),
            Self::Other(_) => None,
        }
    }
}

impl From<TaskStatus> for Status {
    fn from(value: TaskStatus) -> Self {
        match value {
            TaskStatus::Unassigned => Self::Unassigned,
            TaskStatus::Ongoing => Self::Ongoing,
            TaskStatus::Done => Self::Done,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct List {
    pub id: String,
    pub title: String,
}

impl List {
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = string_field(value, &["_id", "id"])?;
        let title = string_field(value, &["title", "name"])
            .unwrap_or_else(|| UNTITLED_LIST.to_string());
        Some(Self { id, title })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: Status,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub list_id: Option<String>,
}

impl Task {
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = string_field(value, &["_id", "id"])?;
        let status = value
            .get("status")
            .and_then(Value::as_str)
            .filter(|raw| !raw.trim().is_empty())
            .map(Status::parse)
            .unwrap_or(Status::Unassigned);

        Some(Self {
            title: string_field(value, &["title"]).unwrap_or_default(),
            description: value
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            status,
            due_date: timestamp_field(value, &id, "dueDate"),
            created_at: timestamp_field(value, &id, "createdAt"),
            list_id: list_reference(value),
            id,
        })
    }

    /// List this task belongs to, falling back to the selected list. Never invents an id.
    pub fn resolved_list_id(&self, fallback: Option<&str>) -> String {
        self.list_id
            .as_deref()
            .or(fallback)
            .unwrap_or_default()
            .to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedTasks {
    pub unassigned: Vec<Task>,
    pub ongoing: Vec<Task>,
    pub done: Vec<Task>,
}

impl GroupedTasks {
    /// Accepts `{unassignedTasks|unassigned, ongoingTasks|ongoing, doneTasks|done}`,
    /// `{tasks: [...]}` or a flat array.
    pub fn from_value(value: &Value) -> Option<Self> {
        if let Some(flat) = parse_tasks(value) {
            let mut grouped = Self::default();
            for task in flat {
                grouped.push(task);
            }
            return Some(grouped);
        }

        let object = value.as_object()?;
        let bucket = |keys: [&str; 2]| -> Vec<Task> {
            keys.iter()
                .find_map(|key| object.get(*key).and_then(Value::as_array))
                .map(|items| parse_task_items(items))
                .unwrap_or_default()
        };

        Some(Self {
            unassigned: bucket(["unassignedTasks", "unassigned"]),
            ongoing: bucket(["ongoingTasks", "ongoing"]),
            done: bucket(["doneTasks", "done"]),
        })
    }

    pub fn bucket(&self, status: TaskStatus) -> &[Task] {
        match status {
            TaskStatus::Unassigned => &self.unassigned,
            TaskStatus::Ongoing => &self.ongoing,
            TaskStatus::Done => &self.done,
        }
    }

    fn bucket_mut(&mut self, status: TaskStatus) -> &mut Vec<Task> {
        match status {
            TaskStatus::Unassigned => &mut self.unassigned,
            TaskStatus::Ongoing => &mut self.ongoing,
            TaskStatus::Done => &mut self.done,
        }
    }

    /// Unknown statuses land in the unassigned bucket.
    pub fn push(&mut self, task: Task) {
        let status = task.status.known().unwrap_or(TaskStatus::Unassigned);
        self.bucket_mut(status).push(task);
    }

    pub fn find(&self, task_id: &str) -> Option<&Task> {
        self.iter().find(|task| task.id == task_id)
    }

    pub fn remove(&mut self, task_id: &str) -> Option<Task> {
        for status in [TaskStatus::Unassigned, TaskStatus::Ongoing, TaskStatus::Done] {
            let bucket = self.bucket_mut(status);
            if let Some(idx) = bucket.iter().position(|task| task.id == task_id) {
                return Some(bucket.remove(idx));
            }
        }
        None
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Task) -> bool,
    {
        self.unassigned.retain(&mut keep);
        self.ongoing.retain(&mut keep);
        self.done.retain(&mut keep);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.unassigned
            .iter()
            .chain(self.ongoing.iter())
            .chain(self.done.iter())
    }

    pub fn len(&self) -> usize {
        self.unassigned.len() + self.ongoing.len() + self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lists payload: an array, or an object wrapping one under `lists`.
pub fn parse_lists(value: &Value) -> Option<Vec<List>> {
    let items = value
        .as_array()
        .or_else(|| value.get("lists").and_then(Value::as_array))?;

    let lists: Vec<List> = items
        .iter()
        .filter_map(|item| {
            let parsed = List::from_value(item);
            if parsed.is_none() {
                warn!(entry = %item, "dropping list without id");
            }
            parsed
        })
        .collect();

    debug!(count = lists.len(), "normalized lists");
    Some(lists)
}

/// Tasks payload: an array, or an object wrapping one under `tasks`.
pub fn parse_tasks(value: &Value) -> Option<Vec<Task>> {
    let items = value
        .as_array()
        .or_else(|| value.get("tasks").and_then(Value::as_array))?;
    Some(parse_task_items(items))
}

fn parse_task_items(items: &[Value]) -> Vec<Task> {
    items
        .iter()
        .filter_map(|item| {
            let parsed = Task::from_value(item);
            if parsed.is_none() {
                warn!(entry = %item, "dropping task without id");
            }
            parsed
        })
        .collect()
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

fn timestamp_field(value: &Value, task_id: &str, key: &str) -> Option<DateTime<Utc>> {
    let raw = value.get(key)?.as_str()?;
    let parsed = parse_timestamp(raw);
    if parsed.is_none() {
        warn!(task_id, field = key, raw, "unparseable task timestamp");
    }
    parsed
}

fn list_reference(value: &Value) -> Option<String> {
    match value.get("list") {
        Some(Value::String(id)) if !id.trim().is_empty() => return Some(id.clone()),
        Some(object @ Value::Object(_)) => {
            if let Some(id) = string_field(object, &["_id", "id"]) {
                return Some(id);
            }
        }
        _ => {}
    }
    string_field(value, &["listId"])
}
