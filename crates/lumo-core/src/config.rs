use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

pub const DEFAULT_API_URL: &str =
  "https://lumo-back-1.onrender.com";
pub const DEFAULT_TOAST_MS: u64 = 3000;

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  pub fn defaults() -> Self {
    let mut cfg = Config {
      map:          HashMap::new(),
      loaded_files: vec![]
    };

    cfg.map.insert(
      "api.url".to_string(),
      DEFAULT_API_URL.to_string()
    );
    cfg.map.insert(
      "session.location".to_string(),
      "~/.lumo/session.json".to_string()
    );
    cfg.map.insert(
      "color".to_string(),
      "on".to_string()
    );
    cfg.map.insert(
      "toast.duration".to_string(),
      DEFAULT_TOAST_MS.to_string()
    );
    cfg
  }

  #[tracing::instrument(skip(
    lumorc_override
  ))]
  pub fn load(
    lumorc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::defaults();

    let lumorc = resolve_lumorc_path(
      lumorc_override
    )?;
    if let Some(path) = lumorc {
      info!(lumorc = %path.display(), "loading lumorc");
      cfg.load_file(&path)?;
    } else {
      warn!(
        "no lumorc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    let Some(raw) = self.map.get(key)
    else {
      return Ok(None);
    };
    parse_bool(raw)
      .map(Some)
      .ok_or_else(|| {
        anyhow!(
          "invalid {key} setting: {raw}"
        )
      })
  }

  pub fn api_url(&self) -> String {
    self
      .get("api.url")
      .map(|url| {
        url
          .trim()
          .trim_end_matches('/')
          .to_string()
      })
      .filter(|url| !url.is_empty())
      .unwrap_or_else(|| {
        DEFAULT_API_URL.to_string()
      })
  }

  pub fn toast_duration(
    &self
  ) -> anyhow::Result<chrono::Duration>
  {
    let Some(raw) =
      self.get("toast.duration")
    else {
      return Ok(
        chrono::Duration::milliseconds(
          DEFAULT_TOAST_MS as i64
        )
      );
    };

    let millis = raw
      .trim()
      .parse::<u32>()
      .map_err(|_| {
        anyhow!(
          "invalid toast.duration \
           (milliseconds): {raw}"
        )
      })?;
    Ok(chrono::Duration::milliseconds(
      i64::from(millis)
    ))
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let line = raw_line
        .split_once('#')
        .map(|(before, _)| before)
        .unwrap_or(raw_line)
        .trim();
      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  cfg,
  override_path
))]
pub fn resolve_session_path(
  cfg: &Config,
  override_path: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let path = if let Some(path) =
    override_path
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("session.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_session_path()?
  };

  if let Some(dir) = path.parent()
    && !dir.as_os_str().is_empty()
    && !dir.exists()
  {
    info!(dir = %dir.display(), "creating session directory");
    fs::create_dir_all(dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(path)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_lumorc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(lumorc_env) =
    std::env::var("LUMORC")
  {
    if lumorc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      lumorc_env
    )));
  }

  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  let candidate = home.join(".lumorc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_session_path()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home
    .join(".lumo")
    .join("session.json"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::{
    Config,
    DEFAULT_API_URL,
    resolve_session_path
  };

  #[test]
  fn rc_file_with_include_and_comments()
   {
    let temp =
      tempdir().expect("tempdir");
    let extra =
      temp.path().join("extra.rc");
    fs::write(
      &extra,
      "toast.duration = 1500\n"
    )
    .expect("write include");

    let main =
      temp.path().join("lumorc");
    fs::write(
      &main,
      "# lumo settings\napi.url = \
       http://localhost:8080/ # \
       local\ninclude extra.rc\n"
    )
    .expect("write lumorc");

    let cfg = Config::load(Some(&main))
      .expect("load config");
    assert_eq!(
      cfg.api_url(),
      "http://localhost:8080"
    );
    assert_eq!(
      cfg
        .toast_duration()
        .expect("duration")
        .num_milliseconds(),
      1500
    );
    assert_eq!(cfg.loaded_files.len(), 2);
  }

  #[test]
  fn overrides_strip_rc_prefix() {
    let mut cfg = Config::defaults();
    cfg.apply_overrides(vec![
      (
        "rc.color".to_string(),
        "off".to_string()
      ),
      (
        "api.url".to_string(),
        "  ".to_string()
      ),
    ]);
    assert_eq!(
      cfg
        .get_bool("color")
        .expect("color"),
      Some(false)
    );
    assert_eq!(
      cfg
        .get_bool("missing")
        .expect("missing"),
      None
    );

    cfg.apply_overrides(vec![(
      "color".to_string(),
      "maybe".to_string()
    )]);
    assert!(
      cfg.get_bool("color").is_err()
    );
    assert_eq!(
      cfg.api_url(),
      DEFAULT_API_URL
    );
  }

  #[test]
  fn malformed_line_is_rejected() {
    let temp =
      tempdir().expect("tempdir");
    let main =
      temp.path().join("lumorc");
    fs::write(&main, "no equals\n")
      .expect("write lumorc");
    assert!(
      Config::load(Some(&main)).is_err()
    );
  }

  #[test]
  fn invalid_toast_duration_errors() {
    let mut cfg = Config::defaults();
    cfg.apply_overrides(vec![(
      "toast.duration".to_string(),
      "soon".to_string()
    )]);
    assert!(
      cfg.toast_duration().is_err()
    );
  }

  #[test]
  fn session_path_override_creates_parent()
   {
    let temp =
      tempdir().expect("tempdir");
    let wanted = temp
      .path()
      .join("nested")
      .join("session.json");
    let resolved = resolve_session_path(
      &Config::defaults(),
      Some(&wanted)
    )
    .expect("resolve");
    assert_eq!(resolved, wanted);
    assert!(
      wanted
        .parent()
        .expect("parent")
        .exists()
    );
  }
}
