//! jjtask CLI - task tracking on top of the jj revision graph.

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use jjtask::config::{self, LoadedConfig};
use jjtask::{
    Advisory, BatchReport, ChangeId, CreateOptions, CreatedTask, DropMode, Engine, JjStore,
    Revision, SquashOutcome, tag,
};
use log::info;
use std::fs;
use std::path::PathBuf;

mod cli;

use cli::{Cli, Command, OutputFormat};

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("jjtask")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("jjtask.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn open_engine(cli: &Cli, loaded: &LoadedConfig) -> Engine<JjStore> {
    let mut store = JjStore::new(&loaded.config.jj);
    if let Some(repo) = &cli.repository {
        store = store.with_repository(repo);
    }
    Engine::new(store)
}

fn print_advisories(advisories: &[Advisory]) {
    for advisory in advisories {
        match advisory {
            Advisory::Orphans(ids) => print_orphan_warning(ids),
            other => eprintln!("{} {}", "Warning:".yellow().bold(), other),
        }
    }
}

fn print_orphan_warning(orphans: &[ChangeId]) {
    let ids: Vec<&str> = orphans.iter().map(ChangeId::as_str).collect();
    eprintln!();
    eprintln!(
        "{} {}",
        "Warning:".yellow().bold(),
        Advisory::Orphans(orphans.to_vec())
    );
    eprintln!("These tasks were never 'wip' - their specs won't be in linear history.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  1. Consolidate specs into @ description, then abandon tasks");
    eprintln!("  2. Linearize into ancestry (may conflict)");
    eprintln!("  3. Leave as-is (manual cleanup later)");
    eprintln!();
    eprintln!(
        "View specs: jj log -r '{}' --no-graph -T description",
        ids.join(" | ")
    );
    eprintln!();
}

/// Print failures and turn them into an error for the exit code.
fn finish_batch<T>(report: &BatchReport<T>, action: &str) -> Result<()> {
    print_advisories(&report.advisories);
    for (rev, error) in &report.errors {
        eprintln!("{} {} {}: {}", "✗".red(), action, rev.cyan(), error);
    }
    if report.is_success() {
        Ok(())
    } else {
        eyre::bail!(
            "{} of {} revision(s) failed",
            report.errors.len(),
            report.errors.len() + report.completed.len()
        )
    }
}

fn print_created(task: &CreatedTask) {
    println!(
        "{} Created task {} {}",
        "✓".green(),
        task.change_id.as_str().cyan(),
        task.description.render().lines().next().unwrap_or("")
    );
}

fn print_tasks(tasks: &[Revision]) {
    let width = tasks.iter().map(|t| t.change_id.as_str().len()).max().unwrap_or(0);
    for task in tasks {
        println!(
            "{:width$}  {}",
            task.change_id.as_str().cyan(),
            task.first_line(),
            width = width
        );
    }
}

fn run(cli: Cli) -> Result<()> {
    let cwd = current_dir();
    let loaded = config::load(cli.repository.as_deref().unwrap_or(&cwd))?;
    let mut engine = open_engine(&cli, &loaded);

    match cli.command {
        Command::Create {
            title,
            body,
            parent,
            chain,
            draft,
        } => {
            let options = CreateOptions { parent, chain, draft };
            let task = engine
                .create(&title, body.as_deref(), &options)
                .context("Failed to create task")?;
            print_advisories(&task.advisories);
            print_created(&task);
        }

        Command::Parallel { titles, parent, draft } => {
            let created = engine.parallel(&titles, Some(parent.as_str()), draft)?;
            for task in &created {
                print_advisories(&task.advisories);
                print_created(task);
            }
            println!(
                "{} Created {} parallel task branches from {}",
                "→".blue(),
                created.len(),
                parent
            );
        }

        Command::Wip { revs } => {
            let report = engine.wip(&revs);
            for task in &report.completed {
                let how = if task.in_place {
                    "editing in place"
                } else if task.added {
                    "added to @"
                } else {
                    "already in @"
                };
                println!("{} wip: {} ({})", "→".blue(), task.change_id.as_str().cyan(), how);
            }
            finish_batch(&report, "wip")?;
        }

        Command::Done { revs } => {
            let report = engine.done(&revs);
            for task in &report.completed {
                println!("{} done: {}", "✓".green(), task.change_id.as_str().cyan());
                if let Some(linearization) = &task.linearized {
                    let chain: Vec<&str> = linearization.chain.iter().map(ChangeId::as_str).collect();
                    println!("  linearized: {} -> @", chain.join(" -> "));
                }
            }
            finish_batch(&report, "done")?;
        }

        Command::Drop { revs, abandon } => {
            let mode = if abandon { DropMode::Abandon } else { DropMode::Standby };
            let report = engine.drop_tasks(&revs, mode);
            for task in &report.completed {
                match task.mode {
                    DropMode::Abandon => println!("Abandoned {}", task.change_id.as_str().cyan()),
                    DropMode::Standby => println!("Marked {} as standby", task.change_id.as_str().cyan()),
                }
            }
            finish_batch(&report, "drop")?;
        }

        Command::Squash { keep_tasks } => match engine.squash(keep_tasks)? {
            SquashOutcome::NoParents => println!("No parents to squash"),
            SquashOutcome::SingleParent(_) => println!("Only one parent, nothing to merge-squash"),
            SquashOutcome::Squashed { parents, completed, .. } => {
                println!(
                    "{} Squashed {} tasks into linear commit",
                    "✓".green(),
                    parents.len()
                );
                for id in completed {
                    println!("  marked {} done", id.as_str().cyan());
                }
            }
        },

        Command::Flag { flag, rev } => {
            engine.set_flag(&rev, flag).context("Failed to set flag")?;
            println!("{} {} is now {}", "✓".green(), rev.cyan(), tag::tag(flag));
        }

        Command::Find { status, revset } => {
            let repos = loaded.repos(&cwd);
            if loaded.is_multi_repo() && cli.repository.is_none() {
                for (name, path) in repos {
                    println!("--- {} ---", name);
                    let repo_engine = Engine::new(JjStore::new(&loaded.config.jj).with_repository(path));
                    let tasks = repo_engine.find(status, revset.as_deref())?;
                    print_tasks(&tasks);
                }
            } else {
                let tasks = engine.find(status, revset.as_deref())?;
                if tasks.is_empty() {
                    println!("{}", "No tasks found".dimmed());
                } else {
                    print_tasks(&tasks);
                }
            }
        }

        Command::Stale => {
            let stale = engine.stale().context("Failed to find stale tasks")?;
            if stale.is_empty() {
                println!("{}", "No stale done tasks found".dimmed());
            } else {
                println!("Stale done tasks (not in @'s ancestry):");
                println!();
                for task in &stale {
                    println!("  {} {}", task.change_id.as_str().cyan(), task.first_line());
                }
                println!();
                println!("These may be superseded, orphaned, or exploratory.");
                println!("Use `jj abandon REV` to clean up, or `jj rebase -s REV -d @` to integrate.");
            }
        }

        Command::ShowDesc { revision, rev, format } => {
            let rev = revision.unwrap_or(rev);
            let shown = engine.show(&rev)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&shown)?),
                OutputFormat::Text => print!("{}", shown.description),
            }
        }

        Command::Checkpoint { message } => {
            let checkpoint = engine.checkpoint(message.as_deref())?;
            match &checkpoint.message {
                Some(message) => println!(
                    "Checkpoint '{}' at operation: {}",
                    message, checkpoint.operation_id
                ),
                None => println!("Checkpoint at operation: {}", checkpoint.operation_id),
            }
            println!("  Restore with: jj op restore {}", checkpoint.operation_id);
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    info!("Command: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
