//! Thin command-line shell around the provisioning pipeline.
//!
//! Argument parsing, logging setup, and the process exit code live here;
//! everything with behavior lives in the library.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use touchless::prelude::*;
use tracing_subscriber::EnvFilter;

/// Unattended server provisioning with AI-assisted remediation.
#[derive(Debug, Parser)]
#[command(name = "touchless", version, about)]
struct Cli {
    /// Fully-qualified domain to create.
    domain_name: String,

    /// NetBIOS short name for the domain.
    netbios_name: String,

    /// Directory-services recovery password.
    dsrm_password: String,

    /// Organization name for the application installer.
    organization: String,

    /// Directory holding the application setup media.
    #[arg(long)]
    setup_path: Option<PathBuf>,

    /// Journal directory (log file and fix scripts).
    #[arg(long, default_value = "Logs")]
    log_dir: PathBuf,

    /// Reasoning-service model used for remediation.
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// Disable the reasoning service's web-search tool.
    #[arg(long)]
    no_web_search: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // Paths are anchored next to the executable, so the resume state and
    // journal survive reboots at a well-known location.
    let base = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    let mut config = DeployConfig::new(
        cli.domain_name,
        cli.netbios_name,
        cli.dsrm_password,
        cli.organization,
    )
    .with_log_dir(cli.log_dir)
    .with_advisor_model(cli.model)
    .with_advisor_web_search(!cli.no_web_search);
    if let Some(setup_path) = cli.setup_path {
        config = config.with_app_setup_dir(setup_path);
    }
    let config = config.anchored_at(&base);

    let journal =
        Arc::new(Journal::create(&config.log_dir).context("creating the deployment journal")?);
    let advisor = Arc::new(
        OpenAiAdvisor::from_env(&config.advisor_model)
            .context("configuring the remediation advisor")?
            .with_shell_name(&config.shell.display_name)
            .with_web_search(config.advisor_web_search),
    );
    let exec = Arc::new(ProcessRunner::new());

    let engine = RemediationEngine::new(
        journal.clone(),
        advisor,
        exec.clone(),
        config.shell.clone(),
    )
    .with_reboot(config.reboot_command.clone());

    let runner = PipelineRunner::new(
        provision_plan(&config),
        Arc::new(FileResumeStore::new(&config.resume_file)),
        engine,
        StageCx::new(exec, Arc::new(ConsoleProgressSink)),
    );

    match runner.run().await {
        Ok(report) => {
            println!();
            if report.succeeded() {
                println!("Provisioning succeeded.");
            } else {
                println!("Provisioning paused: a fix was applied and a restart is scheduled.");
            }
            std::process::exit(report.exit_code());
        }
        Err(err) => {
            // One failure indicator for the console; detail goes to the
            // journal, which already holds the remediation transcript.
            let _ = journal.append(&format!("fatal: {err}")).await;
            println!();
            eprintln!("Provisioning failed. See {} for details.", journal.path().display());
            std::process::exit(1);
        }
    }
}
