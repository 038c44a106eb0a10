use serde::{
  Deserialize,
  Serialize
};

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
  #[default]
  Unassigned,
  Ongoing,
  Done
}

impl TaskStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      | Self::Unassigned => "unassigned",
      | Self::Ongoing => "ongoing",
      | Self::Done => "done"
    }
  }

  pub fn parse(
    raw: &str
  ) -> Option<Self> {
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "unassigned" => {
        Some(Self::Unassigned)
      }
      | "ongoing" => Some(Self::Ongoing),
      | "done" => Some(Self::Done),
      | _ => None
    }
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct ListCreate {
  pub title: String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreate {
  pub list:        String,
  pub title:       String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub status:      TaskStatus,
  pub due_date:    Option<String>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Default,
)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub title:       Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub description: Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub status:      Option<TaskStatus>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date:
    Option<Option<String>>
}

impl TaskPatch {
  pub fn status(
    status: TaskStatus
  ) -> Self {
    Self {
      status: Some(status),
      ..Self::default()
    }
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct LoginRequest {
  pub email:    String,
  pub password: String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
)]
pub struct LoginResponse {
  #[serde(default)]
  pub token: Option<String>
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
  pub first_name:       String,
  pub last_name:        String,
  pub age:              u32,
  pub email:            String,
  pub password:         String,
  pub confirm_password: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct ForgotPasswordRequest {
  pub email: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
  pub password:         String,
  pub confirm_password: String
}

/// Partial profile update. Only fields
/// that are set go over the wire.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Default,
)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub first_name:       Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub last_name:        Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub age:              Option<u32>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub email:            Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub password:         Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub confirm_password: Option<String>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
  #[serde(default)]
  pub first_name: String,
  #[serde(default)]
  pub last_name:  String,
  #[serde(default)]
  pub age:        Option<u32>,
  #[serde(default)]
  pub email:      String
}

impl UserProfile {
  pub fn display_name(
    &self
  ) -> String {
    format!(
      "{} {}",
      self.first_name.trim(),
      self.last_name.trim()
    )
    .trim()
    .to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn task_create_sends_null_due_date_and_lowercase_status()
   {
    let payload = TaskCreate {
      list:        "L1".to_string(),
      title:       "Comprar pan"
        .to_string(),
      description: String::new(),
      status:      TaskStatus::Ongoing,
      due_date:    None
    };

    let value =
      serde_json::to_value(&payload)
        .expect("serialize");
    assert_eq!(value["list"], "L1");
    assert_eq!(value["status"], "ongoing");
    assert!(value["dueDate"].is_null());
  }

  #[test]
  fn task_patch_omits_untouched_fields_but_keeps_explicit_null()
   {
    let patch = TaskPatch {
      title: Some("x".to_string()),
      due_date: Some(None),
      ..TaskPatch::default()
    };

    let value =
      serde_json::to_value(&patch)
        .expect("serialize");
    let object = value
      .as_object()
      .expect("object");
    assert_eq!(object.len(), 2);
    assert!(object["dueDate"].is_null());
    assert!(
      !object.contains_key("status")
    );
  }

  #[test]
  fn profile_update_sends_only_filled_fields()
  {
    let update = ProfileUpdate {
      last_name: Some("Ruiz".to_string()),
      age: Some(31),
      ..ProfileUpdate::default()
    };

    let value =
      serde_json::to_value(&update)
        .expect("serialize");
    assert_eq!(
      value,
      serde_json::json!({
        "lastName": "Ruiz",
        "age": 31
      })
    );

    let reset = ResetPasswordRequest {
      password:         "Nueva1!x"
        .to_string(),
      confirm_password: "Nueva1!x"
        .to_string()
    };
    let value =
      serde_json::to_value(&reset)
        .expect("serialize");
    assert_eq!(
      value["confirmPassword"],
      "Nueva1!x"
    );
  }

  #[test]
  fn profile_display_name_tolerates_missing_parts()
   {
    let profile: UserProfile =
      serde_json::from_str(
        r#"{"firstName":"Ana","email":"ana@mail.com"}"#
      )
      .expect("deserialize");
    assert_eq!(
      profile.display_name(),
      "Ana"
    );
  }

  #[test]
  fn status_parse_is_case_insensitive()
  {
    assert_eq!(
      TaskStatus::parse("DONE"),
      Some(TaskStatus::Done)
    );
    assert_eq!(
      TaskStatus::parse("weird"),
      None
    );
  }
}
