// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use pmem_contracts::SutShell;
use pmem_provisioning::{
    Collaborators, FailurePolicy, Ledger, Orchestrator, Profile, RunReport, TracingStepReporter,
    logging, profile, report,
};
use pmem_sys::{CommandKnobApplier, LocalShell, SshRebootSynchronizer, SshShell, SshTarget};

#[derive(Debug, Parser)]
#[command(name = "pmem-provision")]
#[command(about = "Provision and verify persistent memory on a system under test")]
struct ProvisionCli {
    /// Log to stdout only
    #[arg(long, global = true)]
    no_log_file: bool,

    #[command(subcommand)]
    command: ProvisionCommand,
}

#[derive(Debug, Subcommand)]
enum ProvisionCommand {
    /// Run the full provisioning sequence
    Run {
        /// Profile name under resources/profiles, or a path to a .toml file
        profile: String,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        fail_fast: bool,
        /// Clean up partitions and namespaces after verifying
        #[arg(long)]
        teardown: bool,
    },
    /// Verify partitions and mounts left by an earlier run
    Verify {
        profile: String,
        #[arg(long)]
        host: Option<String>,
    },
    /// Remove mounts, partitions, namespaces and the ledger
    Teardown {
        profile: String,
        #[arg(long)]
        host: Option<String>,
    },
    /// Inspect or clear the partition ledger
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// List shipped profiles
    Profiles,
}

#[derive(Debug, Subcommand)]
enum LedgerAction {
    Show,
    Clear,
}

fn load_profile(reference: &str, host: Option<String>) -> anyhow::Result<Profile> {
    let path = Path::new(reference);
    let mut profile = if path.extension().is_some_and(|ext| ext == "toml") && path.exists() {
        profile::load_from_path(path)?
    } else {
        profile::load_by_name(reference)?
    };
    profile.apply_env_overrides()?;
    if let Some(host) = host {
        profile.apply_overrides(|name| (name == "PMEM_PROVISION_SUT_HOST").then(|| host.clone()))?;
    }
    Ok(profile)
}

fn collaborators(profile: &Profile) -> anyhow::Result<Collaborators> {
    let sut = profile.sut.as_ref().ok_or_else(|| {
        anyhow!(
            "profile {} has no [sut] section; pass --host or set PMEM_PROVISION_SUT_HOST",
            profile.name
        )
    })?;

    let ssh = Arc::new(SshShell::new(SshTarget {
        host: sut.host.clone(),
        user: sut.user.clone(),
        port: sut.port,
        identity_file: sut.identity_file.clone(),
    })?);
    let reboot = Arc::new(SshRebootSynchronizer::new(ssh.clone(), profile.platform));
    // knob tooling runs on the controller, not on the SUT
    let bios = Arc::new(CommandKnobApplier::new(
        Arc::new(LocalShell::new()),
        reboot.clone(),
        profile.bios.apply_command.clone(),
        profile.command_timeout(),
        profile.reboot_timeout(),
    ));
    let shell: Arc<dyn SutShell> = ssh;

    Ok(Collaborators {
        shell,
        reboot,
        bios,
        reporter: Arc::new(TracingStepReporter),
    })
}

fn print_report(report: &RunReport) {
    for step in &report.steps {
        let status = if step.skipped {
            "SKIP"
        } else if step.verdict {
            "PASS"
        } else {
            "FAIL"
        };
        println!("[{:>2}] {} {}", step.number, status, step.description);
        if let Some(error) = &step.error {
            println!("       {}", error);
        }
    }
    println!(
        "{}: {} after {} reboots",
        report.profile,
        if report.verdict { "PASS" } else { "FAIL" },
        report.boots
    );
}

/// Print, persist, and turn a false verdict into a failing exit
fn conclude(
    orchestrator: &Orchestrator,
    outcome: pmem_provisioning::Result<RunReport>,
) -> anyhow::Result<()> {
    let report = match &outcome {
        Ok(report) => report.clone(),
        Err(_) => orchestrator.report(),
    };
    print_report(&report);

    let dir = report::run_dir(&report.profile)?;
    let summary = report::write_summary(&dir, &report)?;
    println!("summary: {}", summary.display());

    outcome.with_context(|| format!("provisioning with {} aborted", report.profile))?;
    if !report.verdict {
        return Err(anyhow!("{} failed verification", report.profile));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = ProvisionCli::parse();
    logging::init(!cli.no_log_file);

    match cli.command {
        ProvisionCommand::Run {
            profile,
            host,
            fail_fast,
            teardown,
        } => {
            let mut profile = load_profile(&profile, host)?;
            if fail_fast {
                profile.run.policy = FailurePolicy::FailFast;
            }
            profile.run.teardown |= teardown;
            let collaborators = collaborators(&profile)?;
            let mut orchestrator = Orchestrator::new(profile, collaborators);
            let outcome = orchestrator.run().await;
            conclude(&orchestrator, outcome)
        }
        ProvisionCommand::Verify { profile, host } => {
            let profile = load_profile(&profile, host)?;
            let collaborators = collaborators(&profile)?;
            let mut orchestrator = Orchestrator::new(profile, collaborators);
            let outcome = orchestrator.verify().await;
            conclude(&orchestrator, outcome)
        }
        ProvisionCommand::Teardown { profile, host } => {
            let profile = load_profile(&profile, host)?;
            let collaborators = collaborators(&profile)?;
            let mut orchestrator = Orchestrator::new(profile, collaborators);
            let outcome = orchestrator.teardown().await;
            conclude(&orchestrator, outcome)
        }
        ProvisionCommand::Ledger { action, path } => {
            let ledger = path.map(Ledger::new).unwrap_or_else(Ledger::in_working_dir);
            match action {
                LedgerAction::Show => {
                    for entry in ledger.read()? {
                        println!("{}", entry);
                    }
                }
                LedgerAction::Clear => {
                    ledger.delete()?;
                    println!("removed {}", ledger.path().display());
                }
            }
            Ok(())
        }
        ProvisionCommand::Profiles => {
            for name in profile::list_profiles()? {
                println!("{}", name);
            }
            Ok(())
        }
    }
}
