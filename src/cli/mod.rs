//! CLI command handling
//!
//! Dispatches CLI commands to the suite engine and formats output.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use colored::Colorize;

use crate::commands::Commands;
use crate::common::config::{Config, MAX_TIMEOUT_SECS};
use crate::common::{Error, Result};
use crate::suite::{self, RunSettings, SuiteOptions, TestGroup, TestTable};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Run {
            table,
            login,
            logout,
            only,
            timeout,
            command_timeout,
            prebuilt,
        } => {
            let table = load_table(table, config)?;
            let settings = RunSettings {
                console_log: login.unwrap_or_else(|| config.paths.console_log.clone()),
                run_log: logout.unwrap_or_else(|| config.paths.run_log.clone()),
                poll_interval: config.tail.poll_interval(),
                queue_capacity: config.tail.queue_capacity,
                only,
                options: SuiteOptions {
                    expect_timeout: timeout
                        .map(Duration::from_secs)
                        .unwrap_or_else(|| config.timeouts.expect()),
                    command_timeout: command_timeout
                        .map(Duration::from_secs)
                        .or_else(|| config.timeouts.command()),
                    skip_build: prebuilt,
                },
            };
            check_timeout("expectation timeout", Some(settings.options.expect_timeout))?;
            check_timeout("command timeout", settings.options.command_timeout)?;

            let summary = suite::run_suite(&table, &settings).await?;
            println!(
                "\n{} {} groups, {} steps passed in {:.1}s (log: {})",
                "✓".green().bold(),
                summary.groups_passed,
                summary.steps_passed,
                summary.elapsed.as_secs_f64(),
                settings.run_log.display()
            );
            Ok(())
        }

        Commands::List { table, json } => {
            let table = load_table(table, config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&table)?);
            } else {
                for group in &table.groups {
                    print_group(group);
                }
            }
            Ok(())
        }

        Commands::Check { table } => {
            let table = load_table(table, config)?;
            let steps: usize = table.groups.iter().map(|g| g.steps.len()).sum();
            println!(
                "{} table is valid: {} groups, {} steps",
                "✓".green(),
                table.groups.len(),
                steps
            );

            let programs: BTreeSet<&str> = table.commands().filter_map(|c| c.program()).collect();
            let mut missing = Vec::new();
            for program in programs {
                match which::which(program) {
                    Ok(path) => println!("  {} {} ({})", "✓".green(), program, path.display()),
                    Err(_) => {
                        println!("  {} {} not found", "✗".red(), program);
                        missing.push(program);
                    }
                }
            }

            if missing.is_empty() {
                Ok(())
            } else {
                Err(Error::Config(format!(
                    "programs not found on PATH: {}",
                    missing.join(", ")
                )))
            }
        }
    }
}

fn check_timeout(what: &str, limit: Option<Duration>) -> Result<()> {
    match limit {
        Some(limit) if limit.is_zero() || limit > Duration::from_secs(MAX_TIMEOUT_SECS) => {
            Err(Error::Config(format!(
                "{} must be between 1 and {} seconds",
                what, MAX_TIMEOUT_SECS
            )))
        }
        _ => Ok(()),
    }
}

/// Table from the flag, then the config file, then the built-in one
fn load_table(flag: Option<PathBuf>, config: &Config) -> Result<TestTable> {
    let path = flag.or_else(|| config.paths.table.clone());
    let table = TestTable::load_or_builtin(path.as_deref())?;
    tracing::debug!(
        source = %path.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "built-in".to_string()),
        groups = table.groups.len(),
        "Loaded test table"
    );
    Ok(table)
}

fn print_group(group: &TestGroup) {
    match &group.short_name {
        Some(short) => println!("{} ({})", group.name.bold(), short.dimmed()),
        None => println!("{}", group.name.bold()),
    }
    for (i, step) in group.steps.iter().enumerate() {
        let join = |cmds: &[suite::CommandVector]| {
            cmds.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" ")
        };
        if !step.build.is_empty() {
            println!("  {:>2}. build  {}", i + 1, join(&step.build));
            println!("      run    {}", join(&step.commands));
        } else {
            println!("  {:>2}. run    {}", i + 1, join(&step.commands));
        }
        match step.timeout_secs {
            Some(secs) => println!("      expect {:?} (within {}s)", step.expect, secs),
            None => println!("      expect {:?}", step.expect),
        }
    }
}
