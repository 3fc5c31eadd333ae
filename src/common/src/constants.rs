pub const WORK_DIR: &str = "/tmp/perfcap/";
pub const LOG_FILE: &str = "/tmp/perfcap/perfcap.log";

pub const DEFAULT_RECORDER: &str = "perf";
pub const DEFAULT_OUTPUT_FILE: &str = "perf.data";
pub const DATA_FILE_EXTENSION: &str = ".data";

pub const PROCESS_POLL_INTERVAL_MS: u64 = 1000;
pub const STOP_GRACE_PERIOD_MS: u64 = 5000;

pub const SETTINGS_DIR: &str = "perfcap";
pub const SETTINGS_FILE: &str = "settings.toml";

/// Most-recently-used history lists are capped to this many entries.
pub const MAX_RECENT_ENTRIES: usize = 10;
