use std::io::{self, BufRead, Write};

use anyhow::{Context, anyhow};
use lumo_shared::TaskStatus;
use tracing::{debug, info, warn};

use crate::action::{Action, Outcome};
use crate::api::{Accounts, Gateway};
use crate::cli::{Command, ProfileArgs, TaskArgs};
use crate::dashboard::{Confirm, Dashboard, DashboardSettings};
use crate::model::Status;
use crate::pages::{self, ProfileForm, RegisterForm, TaskDraft};
use crate::session::{Session, SessionStore};
use crate::term::Terminal;

/// Asks on stderr and reads the answer from stdin.
#[derive(Debug, Clone, Copy)]
pub struct StdinConfirm {
    pub assume_yes: bool,
}

impl Confirm for StdinConfirm {
    fn confirm(&mut self, message: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        eprint!("{message} [s/N] ");
        if let Err(err) = io::stderr().flush() {
            warn!(error = %err, "failed to flush confirmation prompt");
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(
            answer.trim().to_lowercase().as_str(),
            "s" | "si" | "sí" | "y" | "yes"
        )
    }
}

#[derive(Debug, Clone)]
pub struct Output<'a> {
    pub terminal: &'a Terminal,
    pub settings: DashboardSettings,
    pub html: bool,
}

#[tracing::instrument(skip_all)]
pub async fn dispatch<G, S, W>(
    gateway: G,
    store: S,
    output: Output<'_>,
    out: &mut W,
    command: Command,
) -> anyhow::Result<()>
where
    G: Gateway + Accounts,
    S: SessionStore,
    W: Write,
{
    let term = output.terminal;
    match command {
        Command::Login { email, password } => {
            let password = match password {
                Some(password) => password,
                None => read_secret("Contraseña: ")?,
            };
            let mut session = Session::new(store);
            let page = pages::login(&gateway, &mut session, &email, &password).await?;
            writeln!(out, "¡Login exitoso!")?;
            term.print_outcome(out, &Outcome::Navigate(page))
        }
        Command::Register(args) => {
            let form = RegisterForm {
                first_name: args.first_name,
                last_name: args.last_name,
                age: args.age,
                email: args.email,
                password: args.password,
                confirm_password: args.confirm_password,
            };
            let page = pages::register(&gateway, &form).await?;
            writeln!(out, "¡Registrado exitosamente!")?;
            term.print_outcome(out, &Outcome::Navigate(page))
        }
        Command::ForgotPassword { email } => {
            pages::forgot_password(&gateway, &email).await?;
            writeln!(out, "Se ha enviado un enlace de recuperación a {}", email.trim())?;
            Ok(())
        }
        Command::ResetPassword {
            token,
            password,
            confirm,
        } => {
            let page = pages::reset_password(&gateway, &token, &password, &confirm).await?;
            writeln!(out, "Contraseña actualizada correctamente.")?;
            term.print_outcome(out, &Outcome::Navigate(page))
        }
        Command::Logout => {
            let page = pages::logout(&mut Session::new(store));
            writeln!(out, "¡Sesión cerrada exitosamente!")?;
            term.print_outcome(out, &Outcome::Navigate(page))
        }
        Command::CreateList { title } => {
            let session = Session::new(store);
            let list = pages::create_list(&gateway, &session, &title).await?;
            writeln!(out, "Lista creada: {} ({})", list.title, list.id)?;
            Ok(())
        }
        Command::CreateTask(args) => {
            let session = Session::new(store);
            let list_override = args.list_id.clone();
            let task =
                pages::create_task(&gateway, &session, list_override.as_deref(), &draft(args))
                    .await?;
            writeln!(out, "Tarea creada: {} ({})", task.title, task.id)?;
            Ok(())
        }
        Command::ShowEdit => {
            let session = Session::new(store);
            let task = pages::load_edit_task(&gateway, &session).await?;
            term.print_task(out, &task, output.settings.timezone)
        }
        Command::UpdateTask(args) => {
            let mut session = Session::new(store);
            let task = pages::submit_edit_task(&gateway, &mut session, &draft(args)).await?;
            writeln!(out, "Tarea actualizada con éxito: {}", task.id)?;
            Ok(())
        }
        Command::Profile => {
            let session = Session::new(store);
            let profile = pages::load_profile(&gateway, &session).await?;
            term.print_profile(out, &profile)
        }
        Command::EditProfile(args) => {
            let session = Session::new(store);
            pages::edit_profile(&gateway, &session, &profile_form(args)).await?;
            writeln!(out, "Perfil actualizado con éxito")?;
            Ok(())
        }
        Command::ChangePassword { password, confirm } => {
            let session = Session::new(store);
            pages::update_password(&gateway, &session, &password, &confirm).await?;
            writeln!(out, "Contraseña actualizada")?;
            Ok(())
        }
        Command::DeleteProfile { yes } => {
            let mut session = Session::new(store);
            let mut prompt = StdinConfirm { assume_yes: yes };
            let outcome = pages::delete_profile(&gateway, &mut session, &mut prompt).await?;
            term.print_outcome(out, &outcome)
        }
        command => {
            let yes = matches!(
                command,
                Command::DeleteList { yes: true, .. } | Command::DeleteTask { yes: true, .. }
            );
            let dashboard = Dashboard::new(
                gateway,
                store,
                StdinConfirm { assume_yes: yes },
                output.settings.clone(),
            );
            run_dashboard(dashboard, &output, out, command).await
        }
    }
}

/// One page load of the dashboard, optionally followed by a single action.
async fn run_dashboard<G, S, P, W>(
    mut dashboard: Dashboard<G, S, P>,
    output: &Output<'_>,
    out: &mut W,
    command: Command,
) -> anyhow::Result<()>
where
    G: Gateway,
    S: SessionStore,
    P: Confirm,
    W: Write,
{
    let outcome = dashboard.bootstrap().await;
    if let Outcome::Navigate(_) = outcome {
        writeln!(out, "No hay sesión activa. Usa `lumo login`.")?;
        return output.terminal.print_outcome(out, &outcome);
    }

    let outcome = match dashboard_action(&dashboard, command)? {
        Some(action) => dashboard.dispatch(action).await,
        None => outcome,
    };
    debug!(?outcome, request_seq = dashboard.request_seq(), "dashboard settled");

    if !matches!(outcome, Outcome::Navigate(_)) {
        if output.html {
            writeln!(out, "{}", dashboard.render().to_html())?;
        } else {
            output
                .terminal
                .print_dashboard(out, &dashboard.snapshot(), output.settings.timezone)?;
        }
    }
    output.terminal.print_outcome(out, &outcome)?;
    info!(?outcome, "dashboard command finished");
    Ok(())
}

fn dashboard_action<G, S, P>(
    dashboard: &Dashboard<G, S, P>,
    command: Command,
) -> anyhow::Result<Option<Action>>
where
    G: Gateway,
    S: SessionStore,
    P: Confirm,
{
    let action = match command {
        Command::Dashboard => return Ok(None),
        Command::Select { list_id } => {
            let list = dashboard
                .lists()
                .iter()
                .find(|list| list.id == list_id)
                .ok_or_else(|| anyhow!("unknown list: {list_id}"))?;
            Action::SelectList {
                list_id: list.id.clone(),
                title: list.title.clone(),
            }
        }
        Command::Bucket { status } => {
            let known = TaskStatus::parse(&status).ok_or_else(|| {
                anyhow!("unknown status '{status}' (expected unassigned, ongoing or done)")
            })?;
            Action::SelectBucket(Status::from(known))
        }
        Command::Kanban => Action::EnterKanban,
        Command::DeleteList { list_id, .. } => Action::DeleteList { list_id },
        Command::DeleteTask { task_id, .. } => Action::DeleteTask { task_id },
        Command::ToggleTask { task_id, undo } => Action::ToggleTask {
            task_id,
            done: !undo,
        },
        Command::EditTask { task_id, list_id } => Action::EditTask {
            task_id,
            list_id: list_id.unwrap_or_default(),
        },
        Command::NewTask => Action::NewTask,
        other => {
            return Err(anyhow!("not a dashboard command: {other:?}"));
        }
    };
    Ok(Some(action))
}

fn draft(args: TaskArgs) -> TaskDraft {
    TaskDraft {
        title: args.title,
        description: args.description,
        date: args.date,
        time: args.time,
        status: args.status,
    }
}

fn profile_form(args: ProfileArgs) -> ProfileForm {
    ProfileForm {
        first_name: args.first_name.unwrap_or_default(),
        last_name: args.last_name.unwrap_or_default(),
        age: args.age.unwrap_or_default(),
        email: args.email.unwrap_or_default(),
    }
}

fn read_secret(prompt: &str) -> anyhow::Result<String> {
    eprint!("{prompt}");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
