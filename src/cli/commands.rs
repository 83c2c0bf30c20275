//! Command dispatch

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::services::{RunReport, StepOutcome};
use crate::application::ApplicationError;
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, Settings};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    debug!("settings: {:?}", settings);
    let container = ServiceContainer::new(settings);

    match &cli.command {
        Some(Commands::Run { file, quiet }) => cmd_run(&container, file, *quiet),
        Some(Commands::Check { file }) => cmd_check(&container, file),
        Some(Commands::New { file, force }) => cmd_new(&container, file, *force),
        Some(Commands::Config { command }) => cmd_config(&container, command),
        Some(Commands::Completion { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        None => Err(CliError::Usage(
            "no command given (try `scopetree --help`)".to_string(),
        )),
    }
}

#[instrument(skip(container))]
fn cmd_run(container: &ServiceContainer, file: &Path, quiet: bool) -> CliResult<()> {
    let scenario = container.scenarios.load(file)?;
    let report = container.scenarios.run(&scenario)?;
    print_report(&report, quiet);
    report.into_result()?;
    Ok(())
}

fn print_report(report: &RunReport, quiet: bool) {
    if !quiet {
        output::header(report.name.as_deref().unwrap_or("scenario"));
    }
    for record in &report.steps {
        let line = format!("step {}: {} -> {}", record.index, record.step, record.outcome);
        match &record.outcome {
            StepOutcome::Failed(_) => output::failure(&line),
            StepOutcome::Rendered(lines) if !quiet => {
                output::success_detail(&format!("step {}: {}", record.index, record.step));
                for tree_line in lines {
                    output::tree_line(tree_line);
                }
            }
            _ if !quiet => output::success_detail(&line),
            _ => {}
        }
    }
    if !quiet {
        if !report.invoked_actions.is_empty() {
            output::header("retry actions");
            for action in &report.invoked_actions {
                output::detail(action);
            }
        }
        output::header("final tree");
        for line in &report.final_tree {
            output::tree_line(line);
        }
    }
    let failed = report.failures().count();
    if failed == 0 {
        output::success(&format!("{} steps passed", report.steps.len()));
    } else {
        output::error(&format!("{} of {} steps failed", failed, report.steps.len()));
    }
}

#[instrument(skip(container))]
fn cmd_check(container: &ServiceContainer, file: &Path) -> CliResult<()> {
    let scenario = container.scenarios.load(file)?;
    output::success(&format!(
        "{}: {} scopes, {} steps",
        file.display(),
        scenario.scopes.len(),
        scenario.steps.len()
    ));
    Ok(())
}

#[instrument(skip(container))]
fn cmd_new(container: &ServiceContainer, file: &Path, force: bool) -> CliResult<()> {
    container.scenarios.write_template(file, force)?;
    output::action("Created", &file.display());
    Ok(())
}

fn cmd_config(container: &ServiceContainer, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            output::info(&container.settings.to_toml()?);
            Ok(())
        }
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::action("global", &path.display()),
                None => output::warning("no config directory available on this system"),
            }
            Ok(())
        }
        ConfigCommands::Init { path, force } => {
            let target: PathBuf = match path {
                Some(path) => path.clone(),
                None => global_config_path().ok_or_else(|| ApplicationError::Config {
                    message: "no config directory available on this system".to_string(),
                })?,
            };
            if container.fs.exists(&target) && !force {
                return Err(CliError::Usage(format!(
                    "{} exists (use --force to overwrite)",
                    target.display()
                )));
            }
            container
                .fs
                .ensure_parent(&target)
                .map_err(|e| InfraError::io(format!("create directory for {}", target.display()), e))?;
            container
                .fs
                .write(&target, &Settings::template())
                .map_err(|e| InfraError::io(format!("write {}", target.display()), e))?;
            output::action("Created", &target.display());
            Ok(())
        }
    }
}
