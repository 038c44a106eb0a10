use std::io::{self, IsTerminal, Write};

use chrono_tz::Tz;
use lumo_shared::UserProfile;
use unicode_width::UnicodeWidthStr;

use crate::action::Outcome;
use crate::config::Config;
use crate::dashboard::{DashboardSnapshot, TaskArea};
use crate::datetime::format_display;
use crate::model::{GroupedTasks, Status, Task};
use crate::render::{EMPTY_COLUMN, EMPTY_LISTS, EMPTY_TASKS, NO_SELECTION, map_status, task_date_label};
use crate::toast::ToastKind;

/// Plain-text rendering of dashboard snapshots for the terminal.
#[derive(Debug, Clone)]
pub struct Terminal {
    color: bool,
}

impl Terminal {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, out, snapshot))]
    pub fn print_dashboard<W: Write>(
        &self,
        out: &mut W,
        snapshot: &DashboardSnapshot,
        tz: Tz,
    ) -> anyhow::Result<()> {
        if let Some(header) = &snapshot.header {
            writeln!(
                out,
                "Bienvenido/a, {}  ·  Última actividad: {}",
                self.paint(&header.display_name, "1"),
                format_display(header.last_activity, tz)
            )?;
            writeln!(out)?;
        }

        writeln!(out, "{}", self.paint("Listas", "1"))?;
        if snapshot.lists.is_empty() {
            writeln!(out, "  {EMPTY_LISTS}")?;
        } else {
            let active = snapshot.active_list_id();
            let rows = snapshot
                .lists
                .iter()
                .map(|list| {
                    let marker = if active == Some(list.id.as_str()) {
                        self.paint("*", "32")
                    } else {
                        String::new()
                    };
                    vec![marker, self.paint(&list.id, "33"), list.title.clone()]
                })
                .collect();
            write_table(&mut *out, headers(&["", "ID", "Título"]), rows)?;
        }
        writeln!(out)?;

        if !snapshot.title.is_empty() {
            writeln!(out, "{}", self.paint(&snapshot.title, "1;4"))?;
        }
        match &snapshot.task_area {
            TaskArea::Placeholder => writeln!(out, "  {NO_SELECTION}")?,
            TaskArea::Message(message) => writeln!(out, "  {}", self.paint(message, "31"))?,
            TaskArea::Tasks(tasks) => self.write_tasks(&mut *out, tasks, tz)?,
            TaskArea::Board(grouped) => self.write_board(&mut *out, grouped, tz)?,
        }

        if snapshot.create_task_visible {
            writeln!(out)?;
            writeln!(out, "  + Nueva tarea: lumo new-task")?;
        }

        for toast in &snapshot.toasts {
            let code = match toast.kind {
                ToastKind::Info => "34",
                ToastKind::Success => "32",
                ToastKind::Error => "31",
            };
            writeln!(
                out,
                "{} {}",
                self.paint(&format!("[{}]", toast.kind.css_class()), code),
                toast.message
            )?;
        }

        Ok(())
    }

    fn write_tasks<W: Write>(&self, out: &mut W, tasks: &[Task], tz: Tz) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "  {EMPTY_TASKS}")?;
            return Ok(());
        }

        let rows = tasks
            .iter()
            .map(|task| {
                let check = if task.status == Status::Done { "[x]" } else { "[ ]" };
                vec![
                    check.to_string(),
                    self.paint(&task.id, "33"),
                    self.status_cell(&task.status),
                    task_date_label(task, tz),
                    task.title.clone(),
                ]
            })
            .collect();
        write_table(out, headers(&["", "ID", "Estado", "Fecha", "Título"]), rows)
    }

    fn write_board<W: Write>(&self, out: &mut W, grouped: &GroupedTasks, tz: Tz) -> anyhow::Result<()> {
        for status in Status::COLUMNS {
            let tasks: &[Task] = match status.known() {
                Some(known) => grouped.bucket(known),
                None => &[],
            };
            let badge = map_status(&status);
            writeln!(out, "{} ({})", self.paint(&badge.label, "1"), tasks.len())?;
            if tasks.is_empty() {
                writeln!(out, "  {EMPTY_COLUMN}")?;
                continue;
            }
            let rows = tasks
                .iter()
                .map(|task| {
                    vec![
                        self.paint(&task.id, "33"),
                        task_date_label(task, tz),
                        task.title.clone(),
                    ]
                })
                .collect();
            write_table(&mut *out, headers(&["ID", "Fecha", "Título"]), rows)?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, out, task))]
    pub fn print_task<W: Write>(&self, out: &mut W, task: &Task, tz: Tz) -> anyhow::Result<()> {
        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "title       {}", task.title)?;
        writeln!(out, "description {}", task.description)?;
        writeln!(out, "status      {}", self.status_cell(&task.status))?;
        writeln!(out, "list        {}", task.list_id.clone().unwrap_or_default())?;
        if let Some(due) = task.due_date {
            writeln!(out, "due         {}", format_display(due, tz))?;
        }
        if let Some(created) = task.created_at {
            writeln!(out, "created     {}", format_display(created, tz))?;
        }
        Ok(())
    }

    pub fn print_profile<W: Write>(&self, out: &mut W, profile: &UserProfile) -> anyhow::Result<()> {
        writeln!(out, "Nombre completo: {}", profile.display_name())?;
        writeln!(
            out,
            "Edad:            {}",
            profile.age.map(|age| age.to_string()).unwrap_or_default()
        )?;
        writeln!(out, "Correo:          {}", profile.email)?;
        Ok(())
    }

    pub fn print_outcome<W: Write>(&self, out: &mut W, outcome: &Outcome) -> anyhow::Result<()> {
        match outcome {
            Outcome::Rendered => {}
            Outcome::Cancelled => writeln!(out, "cancelled")?,
            Outcome::Ignored => writeln!(out, "nothing to do")?,
            Outcome::Navigate(page) => writeln!(out, "-> {}", page.path())?,
        }
        Ok(())
    }

    fn status_cell(&self, status: &Status) -> String {
        let badge = map_status(status);
        let code = match badge.css {
            "todo" => "34",
            "doing" => "33",
            "done" => "32",
            _ => "0",
        };
        self.paint(&badge.label, code)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(header.as_str()))
        .collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(header, width)| pad(header, *width))
        .collect();
    writeln!(writer, "{}", header_line.join(" ").trim_end())?;

    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    writeln!(writer, "{}", rule.join(" ").trim_end())?;

    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| pad(cell, *width))
            .collect();
        writeln!(writer, "{}", cells.join(" ").trim_end())?;
    }

    Ok(())
}

fn pad(cell: &str, width: usize) -> String {
    let visible = UnicodeWidthStr::width(strip_ansi(cell).as_str());
    format!("{cell}{}", " ".repeat(width.saturating_sub(visible)))
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }
        if ch == '\x1b' {
            escaped = true;
            continue;
        }
        out.push(ch);
    }

    out
}
