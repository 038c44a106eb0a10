use std::fmt;

use anyhow::{Context, bail};
use lumo_shared::{
    ForgotPasswordRequest, ListCreate, LoginRequest, LoginResponse, ProfileUpdate,
    RegisterRequest, ResetPasswordRequest, TaskCreate, TaskPatch, UserProfile,
};
use reqwest::{Method, Url};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, instrument, warn};

use crate::model::{GroupedTasks, List, Task, parse_lists, parse_tasks};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("not authenticated: no session token")]
    Unauthenticated,
    #[error("request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("transport error: {0}")]
    Transport(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Bearer token taken from the session. Holding one is the only way to call an
/// authenticated operation, so a missing token fails before any request is built.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn require(token: Option<String>) -> ApiResult<Self> {
        match token {
            Some(token) if !token.trim().is_empty() => Ok(Self(token)),
            _ => Err(ApiError::Unauthenticated),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

/// List and task operations the dashboard needs from the backend.
#[allow(async_fn_in_trait)]
pub trait Gateway {
    async fn request_lists(&self, token: &AuthToken) -> ApiResult<Vec<List>>;

    /// Lists for the sidebar. Any failure degrades to an empty collection.
    async fn fetch_lists(&self, token: &AuthToken) -> Vec<List> {
        match self.request_lists(token).await {
            Ok(lists) => lists,
            Err(err) => {
                warn!(error = %err, "failed to fetch lists; showing none");
                vec![]
            }
        }
    }

    async fn create_list(&self, token: &AuthToken, title: &str) -> ApiResult<List>;

    async fn delete_list(&self, token: &AuthToken, list_id: &str) -> ApiResult<()>;

    async fn fetch_tasks_for_list(&self, token: &AuthToken, list_id: &str)
    -> ApiResult<Vec<Task>>;

    async fn fetch_tasks_grouped(&self, token: &AuthToken) -> ApiResult<GroupedTasks>;

    async fn create_task(
        &self,
        token: &AuthToken,
        list_id: &str,
        fields: &TaskCreate,
    ) -> ApiResult<Task>;

    async fn update_task(
        &self,
        token: &AuthToken,
        task_id: &str,
        fields: &TaskPatch,
    ) -> ApiResult<Task>;

    async fn delete_task(&self, token: &AuthToken, task_id: &str) -> ApiResult<()>;

    async fn fetch_profile(&self, token: &AuthToken) -> ApiResult<UserProfile>;

    /// There is no lookup endpoint; scans the grouped view.
    async fn find_task_by_id(&self, token: &AuthToken, task_id: &str) -> ApiResult<Option<Task>> {
        let grouped = self.fetch_tasks_grouped(token).await?;
        Ok(grouped.find(task_id).cloned())
    }
}

/// Account endpoints used by the login, register and profile pages.
#[allow(async_fn_in_trait)]
pub trait Accounts {
    async fn login(&self, request: &LoginRequest) -> ApiResult<String>;

    async fn register(&self, request: &RegisterRequest) -> ApiResult<()>;

    async fn forgot_password(&self, request: &ForgotPasswordRequest) -> ApiResult<()>;

    /// `reset_token` comes from the recovery link, not from the session.
    async fn reset_password(
        &self,
        reset_token: &str,
        request: &ResetPasswordRequest,
    ) -> ApiResult<()>;

    async fn update_profile(&self, token: &AuthToken, update: &ProfileUpdate) -> ApiResult<()>;

    async fn delete_profile(&self, token: &AuthToken) -> ApiResult<()>;
}

#[derive(Debug, Clone)]
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url.trim())
            .with_context(|| format!("invalid API url: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            bail!("API url cannot carry a path: {base_url}");
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("lumo/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Appends `segments` to the base url, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Transport(format!("cannot extend {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<B>(
        &self,
        method: Method,
        segments: &[&str],
        token: Option<&AuthToken>,
        body: Option<&B>,
    ) -> ApiResult<Value>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(segments)?;
        let path = url.path().to_string();
        debug!(%method, %url, "sending request");

        let mut request = self.http.request(method.clone(), url.clone());
        if let Some(token) = token {
            request = request.bearer_auth(token.as_str());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| ApiError::Transport(err.to_string()))?;

        if !status.is_success() {
            warn!(%method, %url, status = status.as_u16(), body = %text, "request failed");
            return Err(ApiError::RequestFailed {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|err| {
            error!(%method, %url, error = %err, "response body is not JSON");
            ApiError::MalformedResponse(format!("{path}: {err}"))
        })
    }
}

const LISTS: [&str; 2] = ["api", "lists"];
const TASKS: [&str; 2] = ["api", "tasks"];
const USERS: [&str; 2] = ["api", "users"];

impl Gateway for HttpGateway {
    #[instrument(skip(self, token))]
    async fn request_lists(&self, token: &AuthToken) -> ApiResult<Vec<List>> {
        let value = self
            .send(Method::GET, &[LISTS[0], LISTS[1], "get-user-lists"], Some(token), None::<&()>)
            .await?;
        parse_lists(&value)
            .ok_or_else(|| malformed("/api/lists/get-user-lists", "expected an array of lists"))
    }

    #[instrument(skip(self, token))]
    async fn create_list(&self, token: &AuthToken, title: &str) -> ApiResult<List> {
        let body = ListCreate {
            title: title.to_string(),
        };
        let value = self
            .send(Method::POST, &LISTS, Some(token), Some(&body))
            .await?;
        unwrap_entity(&value, "list", List::from_value)
            .ok_or_else(|| malformed("/api/lists", "created list has no id"))
    }

    #[instrument(skip(self, token))]
    async fn delete_list(&self, token: &AuthToken, list_id: &str) -> ApiResult<()> {
        self.send(Method::DELETE, &[LISTS[0], LISTS[1], list_id], Some(token), None::<&()>)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn fetch_tasks_for_list(
        &self,
        token: &AuthToken,
        list_id: &str,
    ) -> ApiResult<Vec<Task>> {
        let value = self
            .send(
                Method::GET,
                &[LISTS[0], LISTS[1], "get-tasks", list_id],
                Some(token),
                None::<&()>,
            )
            .await?;
        parse_tasks(&value).ok_or_else(|| {
            malformed(&format!("/api/lists/get-tasks/{list_id}"), "expected an array of tasks")
        })
    }

    #[instrument(skip(self, token))]
    async fn fetch_tasks_grouped(&self, token: &AuthToken) -> ApiResult<GroupedTasks> {
        let value = self
            .send(Method::GET, &TASKS, Some(token), None::<&()>)
            .await?;
        GroupedTasks::from_value(&value)
            .ok_or_else(|| malformed("/api/tasks", "expected grouped tasks or a task array"))
    }

    #[instrument(skip(self, token, fields))]
    async fn create_task(
        &self,
        token: &AuthToken,
        list_id: &str,
        fields: &TaskCreate,
    ) -> ApiResult<Task> {
        let body = TaskCreate {
            list: list_id.to_string(),
            ..fields.clone()
        };
        let value = self
            .send(Method::POST, &TASKS, Some(token), Some(&body))
            .await?;
        unwrap_entity(&value, "task", Task::from_value)
            .ok_or_else(|| malformed("/api/tasks", "created task has no id"))
    }

    #[instrument(skip(self, token, fields))]
    async fn update_task(
        &self,
        token: &AuthToken,
        task_id: &str,
        fields: &TaskPatch,
    ) -> ApiResult<Task> {
        let value = self
            .send(Method::PUT, &[TASKS[0], TASKS[1], task_id], Some(token), Some(fields))
            .await?;
        unwrap_entity(&value, "task", Task::from_value)
            .ok_or_else(|| malformed(&format!("/api/tasks/{task_id}"), "updated task has no id"))
    }

    #[instrument(skip(self, token))]
    async fn delete_task(&self, token: &AuthToken, task_id: &str) -> ApiResult<()> {
        self.send(Method::DELETE, &[TASKS[0], TASKS[1], task_id], Some(token), None::<&()>)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn fetch_profile(&self, token: &AuthToken) -> ApiResult<UserProfile> {
        let value = self
            .send(Method::GET, &[USERS[0], USERS[1], "user-profile"], Some(token), None::<&()>)
            .await?;
        serde_json::from_value(value)
            .map_err(|err| malformed("/api/users/user-profile", &err.to_string()))
    }
}

impl Accounts for HttpGateway {
    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn login(&self, request: &LoginRequest) -> ApiResult<String> {
        let value = self
            .send(Method::POST, &[USERS[0], USERS[1], "login"], None, Some(request))
            .await?;
        let response: LoginResponse = serde_json::from_value(value)
            .map_err(|err| malformed("/api/users/login", &err.to_string()))?;
        response
            .token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| malformed("/api/users/login", "no token in response"))
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn register(&self, request: &RegisterRequest) -> ApiResult<()> {
        self.send(Method::POST, &USERS, None, Some(request))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn forgot_password(&self, request: &ForgotPasswordRequest) -> ApiResult<()> {
        self.send(Method::POST, &[USERS[0], USERS[1], "forgot-password"], None, Some(request))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, reset_token, request))]
    async fn reset_password(
        &self,
        reset_token: &str,
        request: &ResetPasswordRequest,
    ) -> ApiResult<()> {
        self.send(
            Method::POST,
            &[USERS[0], USERS[1], "reset-password", reset_token],
            None,
            Some(request),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, token, update))]
    async fn update_profile(&self, token: &AuthToken, update: &ProfileUpdate) -> ApiResult<()> {
        self.send(Method::PUT, &[USERS[0], USERS[1], "update-profile"], Some(token), Some(update))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn delete_profile(&self, token: &AuthToken) -> ApiResult<()> {
        self.send(Method::DELETE, &[USERS[0], USERS[1], "delete-user"], Some(token), None::<&()>)
            .await?;
        Ok(())
    }
}

fn malformed(path: &str, reason: &str) -> ApiError {
    error!(path, reason, "malformed response");
    ApiError::MalformedResponse(format!("{path}: {reason}"))
}

/// Created/updated entities come back either bare or wrapped under their name.
fn unwrap_entity<T>(value: &Value, key: &str, parse: fn(&Value) -> Option<T>) -> Option<T> {
    parse(value).or_else(|| value.get(key).and_then(parse))
}
