use std::io::BufRead;

use anyhow::Context;
use colored::Colorize;
use kit_store::{AuthorConfig, CommitOutcome, StoreConfig, VersionedStore};
use kit_types::{ObjectMeta, ObjectRecord};
use serde_json::json;
use tracing::warn;

use crate::cli::*;
use crate::input::{self, Op};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = store_config(&cli)?;
    let format = cli.format;
    let store = VersionedStore::open(&config)?;

    match cli.command {
        Command::Write(args) => cmd_object(&store, Op::Write, args, format),
        Command::Delete(args) => cmd_object(&store, Op::Delete, args, format),
        Command::Apply(args) => cmd_apply(&store, args, format),
        Command::Show(args) => cmd_show(&store, args),
        Command::List(args) => cmd_list(&store, args, format),
        Command::Log(args) => cmd_log(&store, args, format),
    }
}

/// Config file first, then flags and environment on top.
fn store_config(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    if let Some(root) = &cli.repository {
        config.root = root.clone();
    }
    let AuthorConfig { name, email } = config.author.clone();
    config.author = AuthorConfig::new(
        cli.author_name.clone().unwrap_or(name),
        cli.author_email.clone().unwrap_or(email),
    );
    Ok(config)
}

fn cmd_object(
    store: &VersionedStore,
    op: Op,
    args: ObjectArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let reader = input::open(args.file.as_deref())?;
    let document = input::read_document(reader)?;
    let record = ObjectRecord::try_from(document).context("invalid object")?;

    let outcome = match op {
        Op::Write => store.write_record(&args.group, &record),
        Op::Delete => store.delete_meta(&args.group, record.meta()),
    }
    .with_context(|| format!("failed to {}", op.as_str()))?;

    let path = store.paths(&args.group, record.meta())?.file.relative;
    match format {
        OutputFormat::Text => print_outcome(&path.display().to_string(), &outcome),
        OutputFormat::Json => println!(
            "{}",
            json!({
                "op": op.as_str(),
                "path": path,
                "committed": outcome.is_committed(),
                "revision": outcome.revision().map(|r| r.to_string()),
            })
        ),
    }
    Ok(())
}

/// Totals from applying an event stream.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub events: usize,
    pub committed: usize,
    pub failed: usize,
}

/// Apply every event in order. Failures are logged and counted; they never
/// stop the stream.
pub fn apply_events(store: &VersionedStore, reader: impl BufRead) -> ApplySummary {
    let mut summary = ApplySummary::default();

    for (lineno, line) in reader.lines().enumerate() {
        let parsed = line
            .context("failed to read event stream")
            .and_then(|l| input::parse_event(&l));
        let event = match parsed {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                summary.events += 1;
                summary.failed += 1;
                warn!(line = lineno + 1, error = %format!("{e:#}"), "skipping event");
                continue;
            }
        };
        summary.events += 1;

        let result = match event.op {
            Op::Write => store.write(&event.group, &event.object),
            Op::Delete => store.delete(&event.group, &event.object),
        };
        match result {
            Ok(outcome) if outcome.is_committed() => summary.committed += 1,
            Ok(_) => {}
            Err(e) => {
                summary.failed += 1;
                warn!(line = lineno + 1, group = %event.group, error = %e, "failed to {}", event.op.as_str());
            }
        }
    }

    summary
}

fn cmd_apply(store: &VersionedStore, args: ApplyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let reader = input::open(args.file.as_deref())?;
    let summary = apply_events(store, reader);

    match format {
        OutputFormat::Text => println!(
            "{} events, {} commits, {} failed",
            summary.events.to_string().bold(),
            summary.committed.to_string().green(),
            if summary.failed > 0 {
                summary.failed.to_string().red()
            } else {
                summary.failed.to_string().normal()
            },
        ),
        OutputFormat::Json => println!(
            "{}",
            json!({
                "events": summary.events,
                "committed": summary.committed,
                "failed": summary.failed,
            })
        ),
    }

    if summary.failed > 0 {
        anyhow::bail!("{} of {} events failed", summary.failed, summary.events);
    }
    Ok(())
}

fn cmd_show(store: &VersionedStore, args: ShowArgs) -> anyhow::Result<()> {
    let meta = ObjectMeta::new(args.namespace, args.name);
    let record = store
        .read(&args.group, &meta)?
        .with_context(|| format!("object not found: {}/{}/{}", meta.namespace, args.group, meta.name))?;
    print!("{}", String::from_utf8_lossy(&kit_store::serialize::to_yaml(&record)?));
    Ok(())
}

fn cmd_list(store: &VersionedStore, args: ListArgs, format: OutputFormat) -> anyhow::Result<()> {
    let objects = store.list(args.group.as_deref())?;
    match format {
        OutputFormat::Text => {
            if objects.is_empty() {
                println!("No objects stored.");
            }
            for o in &objects {
                println!("{} {} {}", o.namespace.cyan(), o.group.yellow(), o.name.bold());
            }
        }
        OutputFormat::Json => {
            let rows: Vec<_> = objects
                .iter()
                .map(|o| json!({"namespace": o.namespace, "group": o.group, "name": o.name, "path": o.relative}))
                .collect();
            println!("{}", serde_json::Value::Array(rows));
        }
    }
    Ok(())
}

fn cmd_log(store: &VersionedStore, args: LogArgs, format: OutputFormat) -> anyhow::Result<()> {
    let log = store.history(args.limit)?;
    match format {
        OutputFormat::Text => {
            if log.is_empty() {
                println!("No commits yet.");
            }
            for c in &log {
                let rev = c.revision.to_string();
                println!(
                    "{} {} {}",
                    rev[..rev.len().min(8)].yellow(),
                    c.time.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                    c.message.trim_end()
                );
            }
        }
        OutputFormat::Json => {
            let rows: Vec<_> = log
                .iter()
                .map(|c| {
                    json!({
                        "revision": c.revision.to_string(),
                        "message": c.message.trim_end(),
                        "author": c.author,
                        "email": c.email,
                        "time": c.time.to_rfc3339(),
                    })
                })
                .collect();
            println!("{}", serde_json::Value::Array(rows));
        }
    }
    Ok(())
}

fn print_outcome(path: &str, outcome: &CommitOutcome) {
    match outcome {
        CommitOutcome::Committed(rev) => {
            let rev = rev.to_string();
            println!("{} {} ({})", "✓".green().bold(), path.bold(), rev[..8].yellow());
        }
        CommitOutcome::SkippedClean | CommitOutcome::Unchanged => {
            println!("{} {} unchanged", "·".dimmed(), path);
        }
    }
}
