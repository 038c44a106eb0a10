use std::sync::LazyLock;

use anyhow::{Context, anyhow, bail};
use lumo_shared::{
    ForgotPasswordRequest, LoginRequest, ProfileUpdate, RegisterRequest, ResetPasswordRequest,
    TaskCreate, TaskPatch, TaskStatus, UserProfile,
};
use regex::Regex;
use tracing::{info, instrument};

use crate::action::{Outcome, Page};
use crate::api::{Accounts, AuthToken, Gateway};
use crate::dashboard::Confirm;
use crate::datetime::compose_due;
use crate::model::{List, Task};
use crate::session::{Session, SessionStore};

pub const CONFIRM_DELETE_PROFILE: &str =
    "¿Está seguro de que desea eliminar su perfil? Esta acción no se puede deshacer.";
pub const INVALID_RESET_LINK: &str =
    "Enlace inválido o vencido. Solicita uno nuevo desde \"Olvidé mi contraseña\".";

static LOGIN_EMAIL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^.+@.+\..+$").ok());
static EMAIL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());
static NAME_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-zÁÉÍÓÚáéíóúÑñ]+$").ok());
static UPPER_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[A-Z]").ok());
static LOWER_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[a-z]").ok());
static DIGIT_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\d").ok());
static SYMBOL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[^\w\s]").ok());

fn is_match(re: &LazyLock<Option<Regex>>, text: &str) -> bool {
    LazyLock::force(re)
        .as_ref()
        .is_some_and(|re| re.is_match(text))
}

#[instrument(skip(accounts, session, password))]
pub async fn login<A, S>(
    accounts: &A,
    session: &mut Session<S>,
    email: &str,
    password: &str,
) -> anyhow::Result<Page>
where
    A: Accounts,
    S: SessionStore,
{
    if session.token().is_some() {
        bail!("Ya tienes una sesión activa. Cierra sesión para acceder al login.");
    }

    let email = email.trim();
    if email.is_empty() || password.is_empty() || !is_match(&LOGIN_EMAIL_RE, email) {
        bail!("Por favor, completa todos los campos correctamente.");
    }

    let token = accounts
        .login(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })
        .await
        .context("login failed")?;
    session.set_token(&token);
    info!("logged in");
    Ok(Page::Home)
}

/// Raw registration form input, before validation.
#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub first_name: String,
    pub last_name: String,
    pub age: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> anyhow::Result<RegisterRequest> {
        let first_name = self.first_name.trim();
        let last_name = self.last_name.trim();
        check_name(first_name, "El nombre")?;
        check_name(last_name, "El apellido")?;

        let age_raw = self.age.trim();
        if age_raw.is_empty() {
            bail!("La edad es obligatoria.");
        }
        let age: u32 = age_raw
            .parse()
            .map_err(|_| anyhow!("La edad debe ser un número."))?;
        if !(13..=112).contains(&age) {
            bail!("La edad debe ser entre 13 y 112.");
        }

        let email = self.email.trim();
        if email.is_empty() {
            bail!("El correo electrónico es obligatorio.");
        }
        if !is_match(&EMAIL_RE, email) {
            bail!("El correo electrónico no es válido.");
        }

        let password = self.password.trim();
        if password.is_empty() {
            bail!("La contraseña es obligatoria.");
        }
        let missing = password_gaps(password);
        if !missing.is_empty() {
            bail!("La contraseña debe contener: {}.", missing.join(", "));
        }
        let confirm = self.confirm_password.trim();
        if confirm.is_empty() {
            bail!("Debes confirmar la contraseña.");
        }
        if password != confirm {
            bail!("Las contraseñas no coinciden.");
        }

        Ok(RegisterRequest {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            age,
            email: email.to_string(),
            password: self.password.clone(),
            confirm_password: self.confirm_password.clone(),
        })
    }
}

fn check_name(value: &str, field: &str) -> anyhow::Result<()> {
    if value.is_empty() {
        bail!("{field} es obligatorio.");
    }
    if !is_match(&NAME_RE, value) {
        bail!("{field} solo puede contener letras.");
    }
    if value.chars().count() > 10 {
        bail!("{field} no puede tener más de 10 caracteres.");
    }
    Ok(())
}

fn password_gaps(password: &str) -> Vec<&'static str> {
    let mut missing = vec![];
    if password.chars().count() < 8 {
        missing.push("al menos 8 caracteres");
    }
    for (re, label) in [
        (&UPPER_RE, "una letra mayúscula"),
        (&LOWER_RE, "una letra minúscula"),
        (&DIGIT_RE, "un número"),
        (&SYMBOL_RE, "un carácter especial"),
    ] {
        if !is_match(re, password) {
            missing.push(label);
        }
    }
    missing
}

/// Reset-page wording, one sentence per unmet rule.
fn reset_password_errors(password: &str) -> Vec<&'static str> {
    let mut errors = vec![];
    if password.chars().count() < 8 {
        errors.push("Debe tener al menos 8 caracteres.");
    }
    for (re, message) in [
        (&LOWER_RE, "Falta una letra minúscula."),
        (&UPPER_RE, "Falta una letra mayúscula."),
        (&DIGIT_RE, "Falta un número."),
        (&SYMBOL_RE, "Falta un símbolo."),
    ] {
        if !is_match(re, password) {
            errors.push(message);
        }
    }
    errors
}

#[instrument(skip(accounts, form), fields(email = %form.email))]
pub async fn register<A: Accounts>(accounts: &A, form: &RegisterForm) -> anyhow::Result<Page> {
    let request = form.validate()?;
    accounts
        .register(&request)
        .await
        .context("registration failed")?;
    info!("registered");
    Ok(Page::Login)
}

#[instrument(skip(accounts))]
pub async fn forgot_password<A: Accounts>(accounts: &A, email: &str) -> anyhow::Result<()> {
    let email = email.trim();
    if !is_match(&EMAIL_RE, email) {
        bail!("Por favor ingresa un correo válido.");
    }
    accounts
        .forgot_password(&ForgotPasswordRequest {
            email: email.to_string(),
        })
        .await
        .context("Error al enviar el correo de recuperación.")?;
    info!("recovery link requested");
    Ok(())
}

#[instrument(skip(accounts, reset_token, password, confirm))]
pub async fn reset_password<A: Accounts>(
    accounts: &A,
    reset_token: &str,
    password: &str,
    confirm: &str,
) -> anyhow::Result<Page> {
    let reset_token = reset_token.trim();
    if reset_token.is_empty() {
        bail!(INVALID_RESET_LINK);
    }
    let password = password.trim();
    let confirm = confirm.trim();

    let errors = reset_password_errors(password);
    if !errors.is_empty() {
        bail!("La contraseña no cumple los requisitos: {}", errors.join(" "));
    }
    if password != confirm {
        bail!("Las contraseñas no coinciden.");
    }

    accounts
        .reset_password(
            reset_token,
            &ResetPasswordRequest {
                password: password.to_string(),
                confirm_password: confirm.to_string(),
            },
        )
        .await
        .context("No se pudo restablecer la contraseña.")?;
    info!("password reset");
    Ok(Page::Login)
}

pub fn logout<S: SessionStore>(session: &mut Session<S>) -> Page {
    session.logout();
    info!("logged out");
    Page::Home
}

fn require_token<S: SessionStore>(session: &Session<S>) -> anyhow::Result<AuthToken> {
    AuthToken::require(session.token()).context("login required")
}

#[instrument(skip(gateway, session))]
pub async fn create_list<G, S>(
    gateway: &G,
    session: &Session<S>,
    title: &str,
) -> anyhow::Result<List>
where
    G: Gateway,
    S: SessionStore,
{
    let token = require_token(session)?;
    let title = title.trim();
    if title.is_empty() {
        bail!("El título de la lista es obligatorio.");
    }
    let list = gateway
        .create_list(&token, title)
        .await
        .context("failed to create list")?;
    info!(list_id = %list.id, "list created");
    Ok(list)
}

/// Task form input shared by the create and edit pages.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub date: Option<String>,
    pub time: Option<String>,
    pub status: Option<String>,
}

impl TaskDraft {
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            date: task.due_date.map(|due| due.format("%Y-%m-%d").to_string()),
            time: task.due_date.map(|due| due.format("%H:%M").to_string()),
            status: Some(task.status.to_string()),
        }
    }

    fn status(&self) -> anyhow::Result<TaskStatus> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(TaskStatus::Unassigned),
            Some(raw) => TaskStatus::parse(raw).ok_or_else(|| anyhow!("unknown status: {raw}")),
        }
    }

    fn title(&self) -> anyhow::Result<String> {
        let title = self.title.trim();
        if title.is_empty() {
            bail!("El título de la tarea es obligatorio.");
        }
        Ok(title.to_string())
    }
}

#[instrument(skip(gateway, session, draft))]
pub async fn create_task<G, S>(
    gateway: &G,
    session: &Session<S>,
    list_override: Option<&str>,
    draft: &TaskDraft,
) -> anyhow::Result<Task>
where
    G: Gateway,
    S: SessionStore,
{
    let token = require_token(session)?;
    let list_id = list_override
        .map(str::to_string)
        .filter(|id| !id.trim().is_empty())
        .or_else(|| session.current_list_id())
        .ok_or_else(|| anyhow!("No se encontró la lista seleccionada."))?;

    let fields = TaskCreate {
        list: list_id.clone(),
        title: draft.title()?,
        description: draft.description.trim().to_string(),
        status: draft.status()?,
        due_date: compose_due(draft.date.as_deref(), draft.time.as_deref())?,
    };
    let task = gateway
        .create_task(&token, &list_id, &fields)
        .await
        .context("Error creando tarea")?;
    info!(task_id = %task.id, %list_id, "task created");
    Ok(task)
}

#[instrument(skip(gateway, session))]
pub async fn load_edit_task<G, S>(gateway: &G, session: &Session<S>) -> anyhow::Result<Task>
where
    G: Gateway,
    S: SessionStore,
{
    let token = require_token(session)?;
    let task_id = session
        .edit_task_id()
        .ok_or_else(|| anyhow!("No se encontró la tarea a editar."))?;
    gateway
        .find_task_by_id(&token, &task_id)
        .await
        .context("Error cargando tarea")?
        .ok_or_else(|| anyhow!("No se encontró la tarea {task_id}"))
}

#[instrument(skip(gateway, session, draft))]
pub async fn submit_edit_task<G, S>(
    gateway: &G,
    session: &mut Session<S>,
    draft: &TaskDraft,
) -> anyhow::Result<Task>
where
    G: Gateway,
    S: SessionStore,
{
    let token = require_token(session)?;
    let task_id = session
        .edit_task_id()
        .ok_or_else(|| anyhow!("No se encontró la tarea a editar."))?;

    let patch = TaskPatch {
        title: Some(draft.title()?),
        description: Some(draft.description.trim().to_string()),
        status: Some(draft.status()?),
        due_date: Some(compose_due(draft.date.as_deref(), draft.time.as_deref())?),
    };
    let task = gateway
        .update_task(&token, &task_id, &patch)
        .await
        .context("Error actualizando tarea")?;
    session.clear_edit_task();
    info!(%task_id, "task updated");
    Ok(task)
}

#[instrument(skip(gateway, session))]
pub async fn load_profile<G, S>(gateway: &G, session: &Session<S>) -> anyhow::Result<UserProfile>
where
    G: Gateway,
    S: SessionStore,
{
    let token = require_token(session)?;
    gateway
        .fetch_profile(&token)
        .await
        .context("failed to load profile")
}

/// Edit-profile form. Blank fields are left untouched on the server.
#[derive(Debug, Clone, Default)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub age: String,
    pub email: String,
}

impl ProfileForm {
    pub fn to_update(&self) -> anyhow::Result<ProfileUpdate> {
        let filled = |value: &str| Some(value.trim().to_string()).filter(|v| !v.is_empty());

        let age = match self.age.trim() {
            "" => None,
            raw => {
                let age: u32 = raw
                    .parse()
                    .map_err(|_| anyhow!("La edad debe ser un número."))?;
                Some(age).filter(|age| *age > 0)
            }
        };

        let update = ProfileUpdate {
            first_name: filled(&self.first_name),
            last_name: filled(&self.last_name),
            age,
            email: filled(&self.email),
            ..ProfileUpdate::default()
        };
        if update == ProfileUpdate::default() {
            bail!("No hay cambios para guardar.");
        }
        Ok(update)
    }
}

#[instrument(skip(accounts, session, form))]
pub async fn edit_profile<A, S>(
    accounts: &A,
    session: &Session<S>,
    form: &ProfileForm,
) -> anyhow::Result<ProfileUpdate>
where
    A: Accounts,
    S: SessionStore,
{
    let token = require_token(session)?;
    let update = form.to_update()?;
    accounts
        .update_profile(&token, &update)
        .await
        .context("Error al actualizar el perfil")?;
    info!("profile updated");
    Ok(update)
}

#[instrument(skip(accounts, session, password, confirm))]
pub async fn update_password<A, S>(
    accounts: &A,
    session: &Session<S>,
    password: &str,
    confirm: &str,
) -> anyhow::Result<()>
where
    A: Accounts,
    S: SessionStore,
{
    let token = require_token(session)?;
    if password.trim().is_empty() {
        bail!("La contraseña es obligatoria.");
    }
    if password != confirm {
        bail!("Las contraseñas no coinciden.");
    }
    let update = ProfileUpdate {
        password: Some(password.to_string()),
        confirm_password: Some(confirm.to_string()),
        ..ProfileUpdate::default()
    };
    accounts
        .update_profile(&token, &update)
        .await
        .context("failed to update password")?;
    info!("password updated");
    Ok(())
}

#[instrument(skip(accounts, session, prompt))]
pub async fn delete_profile<A, S, P>(
    accounts: &A,
    session: &mut Session<S>,
    prompt: &mut P,
) -> anyhow::Result<Outcome>
where
    A: Accounts,
    S: SessionStore,
    P: Confirm,
{
    let token = require_token(session)?;
    if !prompt.confirm(CONFIRM_DELETE_PROFILE) {
        return Ok(Outcome::Cancelled);
    }
    accounts
        .delete_profile(&token)
        .await
        .context("Hubo un error al eliminar el perfil.")?;
    session.logout();
    info!("profile deleted");
    Ok(Outcome::Navigate(Page::Home))
}
