//! Deployment configuration.
//!
//! Everything host- or site-specific lives here: target identity, stage
//! command parameters, filesystem layout, and the shell fix scripts run
//! under. The pipeline core only ever sees the resulting values.

use crate::exec::CommandSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The shell remediation scripts are written for and executed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostShell {
    /// Interpreter program.
    pub program: String,
    /// Arguments placed before the script path.
    pub args: Vec<String>,
    /// Script file extension (no dot).
    pub extension: String,
    /// Name used in advisor prompts ("PowerShell", "POSIX sh").
    pub display_name: String,
}

impl HostShell {
    /// POSIX `sh`.
    #[must_use]
    pub fn sh() -> Self {
        Self {
            program: "sh".to_string(),
            args: Vec::new(),
            extension: "sh".to_string(),
            display_name: "POSIX sh".to_string(),
        }
    }

    /// Windows PowerShell with profile and execution policy bypassed.
    #[must_use]
    pub fn powershell() -> Self {
        Self {
            program: "powershell.exe".to_string(),
            args: vec![
                "-NoProfile".to_string(),
                "-ExecutionPolicy".to_string(),
                "Bypass".to_string(),
                "-File".to_string(),
            ],
            extension: "ps1".to_string(),
            display_name: "PowerShell".to_string(),
        }
    }

    /// The invocation that runs `script` under this shell.
    #[must_use]
    pub fn command_for(&self, script: &Path) -> CommandSpec {
        CommandSpec::new(&self.program)
            .args(self.args.iter().cloned())
            .arg(script.display().to_string())
    }
}

impl Default for HostShell {
    fn default() -> Self {
        if cfg!(windows) {
            Self::powershell()
        } else {
            Self::sh()
        }
    }
}

/// Site-specific parameters for one provisioning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Fully-qualified domain to create or join.
    pub domain_name: String,
    /// NetBIOS short name for the domain.
    pub netbios_name: String,
    /// Directory-services recovery password, interpolated into the
    /// promotion script.
    pub dsrm_password: String,
    /// Organization name passed to the application installer.
    pub organization: String,
    /// Directory holding the application setup media.
    pub app_setup_dir: PathBuf,
    /// Installer executable inside [`app_setup_dir`](Self::app_setup_dir).
    pub app_installer: String,
    /// Host time zone identifier.
    pub time_zone: String,
    /// Prerequisite packages installed before promotion.
    pub prereq_packages: Vec<String>,
    /// Number of seeded user accounts.
    pub user_count: usize,
    /// Where the seeded credentials file is written.
    pub users_file: PathBuf,
    /// Journal directory (log + fix scripts).
    pub log_dir: PathBuf,
    /// Resume-state file.
    pub resume_file: PathBuf,
    /// Shell for remediation scripts.
    pub shell: HostShell,
    /// Restart invocation shared by remediation and the final stage.
    pub reboot_command: CommandSpec,
    /// Advisor model identifier.
    pub advisor_model: String,
    /// Whether the advisor may use its web-search tool.
    pub advisor_web_search: bool,
}

impl DeployConfig {
    /// Creates a config with the required target identity; everything else
    /// gets host defaults.
    #[must_use]
    pub fn new(
        domain_name: impl Into<String>,
        netbios_name: impl Into<String>,
        dsrm_password: impl Into<String>,
        organization: impl Into<String>,
    ) -> Self {
        Self {
            domain_name: domain_name.into(),
            netbios_name: netbios_name.into(),
            dsrm_password: dsrm_password.into(),
            organization: organization.into(),
            app_setup_dir: PathBuf::from(r"C:\Setup-Software\App"),
            app_installer: "Setup.exe".to_string(),
            time_zone: "Eastern Standard Time".to_string(),
            prereq_packages: vec![
                "netfx-4.8".to_string(),
                "vcredist2012".to_string(),
                "vcredist2013".to_string(),
                "UCMA4".to_string(),
            ],
            user_count: 10,
            users_file: PathBuf::from("users.txt"),
            log_dir: PathBuf::from("Logs"),
            resume_file: PathBuf::from("state.txt"),
            shell: HostShell::default(),
            reboot_command: default_reboot_command(),
            advisor_model: "gpt-4o-mini".to_string(),
            advisor_web_search: true,
        }
    }

    /// Sets the application setup directory.
    #[must_use]
    pub fn with_app_setup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.app_setup_dir = dir.into();
        self
    }

    /// Sets the journal directory.
    #[must_use]
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    /// Sets the resume-state file path.
    #[must_use]
    pub fn with_resume_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.resume_file = path.into();
        self
    }

    /// Sets the advisor model.
    #[must_use]
    pub fn with_advisor_model(mut self, model: impl Into<String>) -> Self {
        self.advisor_model = model.into();
        self
    }

    /// Enables or disables the advisor's web-search tool.
    #[must_use]
    pub fn with_advisor_web_search(mut self, enabled: bool) -> Self {
        self.advisor_web_search = enabled;
        self
    }

    /// Sets the shell used for remediation scripts.
    #[must_use]
    pub fn with_shell(mut self, shell: HostShell) -> Self {
        self.shell = shell;
        self
    }

    /// Sets the restart invocation.
    #[must_use]
    pub fn with_reboot_command(mut self, command: CommandSpec) -> Self {
        self.reboot_command = command;
        self
    }

    /// Resolves the relative path fields against `base` (the directory of
    /// the running executable, conventionally).
    #[must_use]
    pub fn anchored_at(mut self, base: &Path) -> Self {
        if self.log_dir.is_relative() {
            self.log_dir = base.join(&self.log_dir);
        }
        if self.resume_file.is_relative() {
            self.resume_file = base.join(&self.resume_file);
        }
        if self.users_file.is_relative() {
            self.users_file = base.join(&self.users_file);
        }
        self
    }
}

fn default_reboot_command() -> CommandSpec {
    if cfg!(windows) {
        CommandSpec::new("shutdown").args(["/r", "/t", "5", "/f"])
    } else {
        CommandSpec::new("shutdown").args(["-r", "+1"])
    }
}
