pub mod action;
pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod dashboard;
pub mod datetime;
pub mod model;
pub mod pages;
pub mod render;
pub mod session;
pub mod term;
pub mod toast;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting lumo CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.lumorc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let session_path =
    config::resolve_session_path(
      &cfg,
      cli.session.as_deref()
    )
    .context(
      "failed to resolve session \
       location"
    )?;

  let store =
    session::FileSessionStore::open(
      &session_path
    )
    .with_context(|| {
      format!(
        "failed to open session at {}",
        session_path.display()
      )
    })?;

  let gateway =
    api::HttpGateway::new(&cfg.api_url())?;
  info!(
    api = gateway.base_url(),
    "using backend"
  );

  let terminal =
    term::Terminal::new(&cfg)?;
  let settings =
    dashboard::DashboardSettings::from_config(
      &cfg
    )?;

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  let command = cli
    .command
    .unwrap_or(cli::Command::Dashboard);
  let output = commands::Output {
    terminal: &terminal,
    settings,
    html: cli.html
  };
  let mut out = std::io::stdout().lock();

  runtime.block_on(commands::dispatch(
    gateway, store, output, &mut out,
    command
  ))?;

  info!("done");
  Ok(())
}
