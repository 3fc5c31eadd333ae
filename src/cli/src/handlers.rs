use crate::commands::{Command, RecordArgs};
use anyhow::{bail, Result};
use colored::Colorize;
use perfcap_client::config::Config;
use perfcap_client::process_watcher::snapshot::capture_snapshot;
use perfcap_client::process_watcher::TableDelta;
use perfcap_client::{ClientEvents, RecordClient};
use perfcap_common::constants::DEFAULT_OUTPUT_FILE;
use perfcap_common::settings::SettingsStore;
use perfcap_common::types::record::{PerfOptions, RecordTarget, SessionEvent};
use std::path::PathBuf;
use tracing::warn;

pub async fn dispatch(command: Command, config: Config) -> Result<()> {
    match command {
        Command::Record(args) => run_record(args, config).await,
        Command::Ps { watch, json } => run_ps(watch, json, config).await,
        Command::History => run_history(config),
    }
}

async fn run_record(args: RecordArgs, mut config: Config) -> Result<()> {
    if let Some(recorder) = args.recorder {
        config.recorder_path = recorder;
    }

    let target = if !args.pids.is_empty() {
        RecordTarget::Attach { pids: args.pids }
    } else if !args.command.is_empty() {
        RecordTarget::Launch {
            program: PathBuf::from(&args.command[0]),
            args: args.command[1..].to_vec(),
            working_dir: args.cwd,
        }
    } else {
        bail!("nothing to record: pass a program to launch, or --pid to attach");
    };

    let options = PerfOptions {
        unwind: args.call_graph,
        event_type: args.event,
    };
    let output_path = match args.output {
        Some(path) => path,
        None => std::env::current_dir()
            .map(|dir| dir.join(DEFAULT_OUTPUT_FILE))
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_OUTPUT_FILE)),
    };

    let (mut client, mut events) = RecordClient::new(config)?;
    let output_path = client.start_recording(options, output_path, target)?;
    println!("{} {}", "recording to".green(), output_path.display());

    loop {
        tokio::select! {
            maybe_event = events.session.recv() => {
                match maybe_event {
                    Some(SessionEvent::Output(line)) => println!("{line}"),
                    Some(SessionEvent::Finished(path)) => {
                        println!("{} {}", "recording saved to".green(), path.display());
                        return Ok(());
                    }
                    Some(SessionEvent::Failed(message)) => bail!("recording failed: {message}"),
                    None => bail!("recorder event channel closed unexpectedly"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("{}", "stopping recording".yellow());
                if let Err(e) = client.stop_recording() {
                    warn!("stop request failed: {e:#}");
                }
            }
        }
    }
}

async fn run_ps(watch: bool, json: bool, config: Config) -> Result<()> {
    if !watch {
        let mut records = capture_snapshot().await?;
        records.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

        if json {
            println!("{}", serde_json::to_string_pretty(&records)?);
        } else {
            println!("{:>8}  {}", "PID", "NAME");
            for record in records {
                println!("{:>8}  {}", record.pid, record.name);
            }
        }
        return Ok(());
    }

    let (mut client, events) = RecordClient::new(config)?;
    client.set_attach_view_active(true);
    let result = watch_processes(&client, events).await;
    client.set_attach_view_active(false);
    result
}

async fn watch_processes(client: &RecordClient, mut events: ClientEvents) -> Result<()> {
    println!("{:>8}  {}", "PID", "NAME");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            maybe_deltas = events.table.recv() => {
                let Some(deltas) = maybe_deltas else { return Ok(()) };
                let table = client.table();
                let table = table.read().await;
                for delta in deltas {
                    match delta {
                        TableDelta::Inserted { pid, .. } => {
                            if let Some(row) = table.get_by_pid(pid) {
                                println!("{} {:>8}  {}", "+".green(), pid, row.name);
                            }
                        }
                        TableDelta::Removed { pid, .. } => {
                            println!("{} {:>8}", "-".red(), pid);
                        }
                        TableDelta::Updated { pid, .. } => {
                            if let Some(row) = table.get_by_pid(pid) {
                                println!("{} {:>8}  {} ({})", "~".yellow(), pid, row.name, row.state);
                            }
                        }
                    }
                }
            }
        }
    }
}

fn run_history(config: Config) -> Result<()> {
    let settings_path = config
        .settings_path
        .unwrap_or_else(SettingsStore::default_path);
    let store = SettingsStore::open(settings_path)?;

    println!("{}", "recent applications:".bold());
    for application in store.recent_applications() {
        match store.application(application) {
            Some(remembered) if !remembered.params.is_empty() => {
                println!("  {application} {}", remembered.params.dimmed());
            }
            _ => println!("  {application}"),
        }
    }

    println!("{}", "recent event types:".bold());
    for event_type in store.recent_event_types() {
        println!("  {event_type}");
    }

    if let Some(method) = store.unwind_method() {
        println!("{} {method}", "unwind method:".bold());
    }

    Ok(())
}
