//! The standard provisioning plan.
//!
//! Ten stages, in a fixed order that is part of the resume contract: the
//! runner persists stage *indices*, so inserting or reordering entries
//! breaks resumption on machines mid-deployment. Command content comes
//! from [`DeployConfig`]; the pipeline core treats it as opaque data.

use crate::config::DeployConfig;
use crate::errors::StageError;
use crate::exec::CommandSpec;
use crate::pipeline::{CommandStage, Stage, StageCx};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Builds the ordered stage list for one target machine.
#[must_use]
pub fn provision_plan(config: &DeployConfig) -> Vec<Arc<dyn Stage>> {
    let prereqs = prereq_script(&config.prereq_packages);
    let forest = forest_script(config);
    let homepage = format!("https://mail.{}/owa", config.domain_name);

    vec![
        Arc::new(
            CommandStage::new("OptimizeSystem").with_intro(10, "Applying system optimizations"),
        ),
        Arc::new(
            CommandStage::new("SystemConfig")
                .with_intro(20, "Configuring system settings")
                .command(CommandSpec::new("tzutil").args(["/s", config.time_zone.as_str()]))
                .command(CommandSpec::new("reg").args([
                    "add",
                    r"HKLM\SYSTEM\CurrentControlSet\Control\Terminal Server",
                    "/v",
                    "fDenyTSConnections",
                    "/t",
                    "REG_DWORD",
                    "/d",
                    "0",
                    "/f",
                ])),
        ),
        Arc::new(
            CommandStage::new("Prereqs")
                .with_intro(30, "Installing prerequisites")
                .command(CommandSpec::new("powershell.exe").args([
                    "-NoProfile",
                    "-ExecutionPolicy",
                    "Bypass",
                    "-Command",
                    prereqs.as_str(),
                ])),
        ),
        Arc::new(
            CommandStage::new("DirectoryForest")
                .with_intro(40, "Promoting directory services")
                .command(CommandSpec::new("powershell.exe").args([
                    "-NoProfile",
                    "-ExecutionPolicy",
                    "Bypass",
                    "-Command",
                    forest.as_str(),
                ])),
        ),
        Arc::new(
            CommandStage::new("ExplorerSetup")
                .with_intro(50, "Configuring shell and power settings")
                .command(CommandSpec::new("reg").args([
                    "add",
                    r"HKCU\Software\Microsoft\Windows\CurrentVersion\Explorer\Advanced",
                    "/v",
                    "Hidden",
                    "/t",
                    "REG_DWORD",
                    "/d",
                    "1",
                    "/f",
                ]))
                .command(CommandSpec::new("powercfg").args(["/change", "standby-timeout-ac", "0"]))
                .command(CommandSpec::new("powercfg").arg("-hibernate").arg("off")),
        ),
        Arc::new(UserGenerationStage {
            count: config.user_count,
            output: config.users_file.clone(),
        }),
        Arc::new(
            CommandStage::new("AppInstall")
                .with_intro(70, "Installing the application")
                .command(
                    CommandSpec::new(
                        config.app_setup_dir.join(&config.app_installer).display().to_string(),
                    )
                    .args([
                        "/mode:Install".to_string(),
                        "/roles:Mailbox,ClientAccess".to_string(),
                        format!("/OrganizationName:{}", config.organization),
                        format!("/DomainController:{}", config.domain_name),
                        "/IAcceptLicenseTerms".to_string(),
                    ]),
                ),
        ),
        Arc::new(CommandStage::new("MailboxTasks").with_intro(80, "Running post-install tasks")),
        Arc::new(
            CommandStage::new("BrowserConfig")
                .with_intro(85, "Applying browser policy")
                .command(CommandSpec::new("reg").args([
                    "add",
                    r"HKLM\SOFTWARE\Policies\Google\Chrome",
                    "/v",
                    "HomepageLocation",
                    "/t",
                    "REG_SZ",
                    "/d",
                    homepage.as_str(),
                    "/f",
                ])),
        ),
        Arc::new(
            CommandStage::new("Finalize")
                .with_intro(90, "Restarting to finish provisioning")
                .command(config.reboot_command.clone()),
        ),
    ]
}

fn prereq_script(packages: &[String]) -> String {
    format!(
        "iex ((New-Object System.Net.WebClient).DownloadString('https://community.chocolatey.org/install.ps1')); \
         choco install {} -y --ignore-checksums",
        packages.join(" ")
    )
}

fn forest_script(config: &DeployConfig) -> String {
    format!(
        "Install-WindowsFeature AD-Domain-Services -IncludeManagementTools; \
         Import-Module ADDSDeployment; \
         $dsrm = ConvertTo-SecureString '{}' -AsPlainText -Force; \
         Install-ADDSForest -DomainName '{}' -DomainNetbiosName '{}' \
         -SafeModeAdministratorPassword $dsrm -InstallDns -NoRebootOnCompletion -Force;",
        config.dsrm_password, config.domain_name, config.netbios_name
    )
}

/// Seeds local user accounts and writes their credentials to a file.
///
/// Account-creation commands are fire-and-forget (an existing account is
/// not an error, since the stage re-runs after a crash), but the
/// credentials file must be written.
struct UserGenerationStage {
    count: usize,
    output: PathBuf,
}

#[async_trait]
impl Stage for UserGenerationStage {
    fn name(&self) -> &str {
        "UserGeneration"
    }

    async fn run(&self, cx: &StageCx) -> Result<(), StageError> {
        cx.report(self.name(), 60, "Creating seeded user accounts");

        let mut credentials = String::new();
        for i in 1..=self.count {
            let user = format!("user{i}");
            let password = generate_password();
            let _ = writeln!(credentials, "{user}:{password}");

            let _ = cx
                .run(&CommandSpec::new("net").args([
                    "user".to_string(),
                    user,
                    password,
                    "/add".to_string(),
                ]))
                .await?;
        }

        tokio::fs::write(&self.output, credentials).await?;
        Ok(())
    }
}

fn generate_password() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    simple[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::CollectingProgressSink;
    use crate::testing::StaticRunner;

    fn config() -> DeployConfig {
        DeployConfig::new("corp.example.com", "CORP", "Recovery!1", "Example Corp")
    }

    #[test]
    fn plan_has_the_stable_stage_order() {
        let plan = provision_plan(&config());
        let names: Vec<&str> = plan.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "OptimizeSystem",
                "SystemConfig",
                "Prereqs",
                "DirectoryForest",
                "ExplorerSetup",
                "UserGeneration",
                "AppInstall",
                "MailboxTasks",
                "BrowserConfig",
                "Finalize",
            ]
        );
    }

    #[test]
    fn forest_script_interpolates_the_target_identity() {
        let script = forest_script(&config());
        assert!(script.contains("corp.example.com"));
        assert!(script.contains("CORP"));
        assert!(script.contains("Recovery!1"));
        assert!(script.contains("-NoRebootOnCompletion"));
    }

    #[test]
    fn prereq_script_lists_all_packages() {
        let script = prereq_script(&["netfx-4.8".to_string(), "UCMA4".to_string()]);
        assert!(script.contains("choco install netfx-4.8 UCMA4"));
    }

    #[test]
    fn generated_passwords_are_twelve_chars_and_unique() {
        let a = generate_password();
        let b = generate_password();
        assert_eq!(a.len(), 12);
        assert_eq!(b.len(), 12);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn user_generation_writes_the_credentials_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("users.txt");
        let runner = Arc::new(StaticRunner::succeeding());
        let sink = Arc::new(CollectingProgressSink::new());
        let cx = StageCx::new(runner.clone(), sink);

        let stage = UserGenerationStage {
            count: 3,
            output: output.clone(),
        };
        stage.run(&cx).await.unwrap();

        // One `net user` invocation per account.
        assert_eq!(runner.recorded().len(), 3);
        assert!(runner.recorded().iter().all(|s| s.program == "net"));

        let contents = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("user1:"));
        assert!(lines[2].starts_with("user3:"));
    }

    #[tokio::test]
    async fn user_generation_tolerates_existing_accounts() {
        // `net user /add` exiting 2 (already exists) must not fail the
        // stage: it re-runs after a crash.
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("users.txt");
        let runner = Arc::new(StaticRunner::with_results(vec![crate::exec::CommandResult {
            exit_code: 2,
            stdout: String::new(),
            stderr: "account exists".to_string(),
        }]));
        let cx = StageCx::new(runner, Arc::new(CollectingProgressSink::new()));

        let stage = UserGenerationStage { count: 2, output };
        stage.run(&cx).await.unwrap();
    }
}
