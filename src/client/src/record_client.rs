use crate::config::Config;
use crate::process_watcher::poller::ProcessPoller;
use crate::process_watcher::table::{ProcessTable, TableDelta};
use crate::recording::session::PerfRecorder;
use crate::validation::{
    ensure_data_extension, resolve_application, validate_output_path, validate_working_dir,
    InputError,
};
use anyhow::{bail, Context, Result};
use perfcap_common::cpu;
use perfcap_common::settings::SettingsStore;
use perfcap_common::types::process::ProcessInfo;
use perfcap_common::types::record::{
    PerfOptions, RecordRequest, RecordTarget, SessionEvent, UnwindMethod,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::info;

/// Receivers for everything the background machinery reports back: table
/// deltas from the attach-view poller and lifecycle events of the recording
/// session.
pub struct ClientEvents {
    pub table: mpsc::UnboundedReceiver<Vec<TableDelta>>,
    pub session: mpsc::UnboundedReceiver<SessionEvent>,
}

/// The record page's state, minus any rendering: the process table with its
/// poller, the recorder, and the persisted history. A front-end calls the
/// methods here in response to user input and drains [`ClientEvents`] to
/// update itself; background tasks never touch front-end state directly.
pub struct RecordClient {
    config: Config,
    settings: SettingsStore,
    table: Arc<RwLock<ProcessTable>>,
    poller: ProcessPoller,
    recorder: PerfRecorder,
}

impl RecordClient {
    pub fn new(config: Config) -> Result<(Self, ClientEvents)> {
        let settings_path = config
            .settings_path
            .clone()
            .unwrap_or_else(SettingsStore::default_path);
        let settings = SettingsStore::open(settings_path).context("failed to open settings")?;

        let table = Arc::new(RwLock::new(ProcessTable::new()));
        let (poller, table_rx) = ProcessPoller::new(
            table.clone(),
            Duration::from_millis(config.process_polling_interval_ms),
        );
        let (recorder, session_rx) = PerfRecorder::new(
            config.recorder_path.clone(),
            Duration::from_millis(config.stop_grace_period_ms),
        );

        let client = RecordClient {
            config,
            settings,
            table,
            poller,
            recorder,
        };
        let events = ClientEvents {
            table: table_rx,
            session: session_rx,
        };
        Ok((client, events))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn table(&self) -> Arc<RwLock<ProcessTable>> {
        self.table.clone()
    }

    /// The attach view drives polling through this: shown starts the
    /// refresher, hidden stops it and drops in-flight results.
    pub fn set_attach_view_active(&mut self, active: bool) {
        self.poller.set_active(active);
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_active()
    }

    pub async fn processes(&self) -> Vec<ProcessInfo> {
        self.table.read().await.rows().to_vec()
    }

    pub async fn select_process(&self, pid: u32) -> bool {
        self.table.write().await.select(pid)
    }

    pub async fn deselect_process(&self, pid: u32) -> bool {
        self.table.write().await.deselect(pid)
    }

    pub async fn selected_pids(&self) -> Vec<u32> {
        self.table.read().await.selected_pids()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    /// Validates the form input, fixes up the output extension, persists the
    /// MRU history and hands the request to the recorder. Returns the
    /// effective output path.
    pub fn start_recording(
        &mut self,
        options: PerfOptions,
        output_path: PathBuf,
        target: RecordTarget,
    ) -> Result<PathBuf> {
        if self.recorder.is_recording() {
            bail!("a recording session is already active");
        }
        if options.unwind == UnwindMethod::LastBranchRecord
            && !cpu::supports_last_branch_record()
        {
            return Err(InputError::LbrUnsupported.into());
        }

        let output_path = ensure_data_extension(output_path);
        validate_output_path(&output_path)?;

        let target = match target {
            RecordTarget::Launch {
                program,
                args,
                working_dir,
            } => {
                let program = resolve_application(&program.to_string_lossy())?;
                // default to the application's own directory, like the form's
                // placeholder does
                let working_dir = match working_dir {
                    Some(dir) => Some(dir),
                    None => program.parent().map(|parent| parent.to_path_buf()),
                };
                if let Some(dir) = &working_dir {
                    validate_working_dir(dir)?;
                }

                self.settings.remember_application(
                    &program.to_string_lossy(),
                    &args.join(" "),
                    &working_dir
                        .as_deref()
                        .map(|dir| dir.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                )?;

                RecordTarget::Launch {
                    program,
                    args,
                    working_dir,
                }
            }
            RecordTarget::Attach { pids } => {
                if pids.is_empty() {
                    return Err(InputError::NoProcessSelected.into());
                }
                RecordTarget::Attach { pids }
            }
        };

        if let Some(event) = options.event_type.as_deref().filter(|e| !e.is_empty()) {
            self.settings.remember_event_type(event)?;
        }
        self.settings
            .set_unwind_method(&options.unwind.to_string())?;

        info!("starting recording to {}", output_path.display());
        self.recorder.start(RecordRequest {
            options,
            output_path: output_path.clone(),
            target,
        })?;

        Ok(output_path)
    }

    /// Starts an attach recording of the processes currently selected in the
    /// table.
    pub async fn start_recording_selected(
        &mut self,
        options: PerfOptions,
        output_path: PathBuf,
    ) -> Result<PathBuf> {
        let pids = self.selected_pids().await;
        self.start_recording(options, output_path, RecordTarget::Attach { pids })
    }

    pub fn stop_recording(&self) -> Result<()> {
        self.recorder.stop()
    }
}
