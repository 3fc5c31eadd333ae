use clap::{Args, Parser, Subcommand};
use perfcap_common::types::record::UnwindMethod;
use std::path::PathBuf;

#[derive(Parser)]
#[clap(
    name = "perfcap",
    about = "A front-end for perf record: launch or attach, watch processes, capture profiles",
    version
)]
pub struct Cli {
    /// Path to a configuration file overriding the built-in defaults
    #[clap(long, global = true)]
    pub config: Option<String>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Record a profile of a launched program or of running processes
    Record(RecordArgs),

    /// List running processes
    Ps {
        /// Keep refreshing and print incremental changes until interrupted
        #[clap(long)]
        watch: bool,

        /// Output the process list in JSON format
        #[clap(long)]
        json: bool,
    },

    /// Show remembered applications, event types and the last unwind method
    History,
}

#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    /// Attach to these process ids instead of launching a program
    #[clap(long = "pid", value_delimiter = ',')]
    pub pids: Vec<u32>,

    /// Output file for the recording (defaults to ./perf.data)
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Stack unwind method: none, dwarf, fp or lbr
    #[clap(long = "call-graph", default_value = "dwarf")]
    pub call_graph: UnwindMethod,

    /// Event type to sample, e.g. cycles:Pu (recorder default when omitted)
    #[clap(long)]
    pub event: Option<String>,

    /// Working directory for the launched program
    #[clap(long)]
    pub cwd: Option<PathBuf>,

    /// Recorder executable to invoke instead of the configured one
    #[clap(long)]
    pub recorder: Option<PathBuf>,

    /// Program to launch, followed by its arguments
    #[clap(trailing_var_arg = true)]
    pub command: Vec<String>,
}
