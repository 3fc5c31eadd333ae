use itertools::Itertools;
use perfcap_common::types::record::{PerfOptions, RecordTarget};
use std::path::Path;

/// Builds the argument vector for one `record` invocation:
/// `record [options…] --output <path> <target args…>`.
/// For an attach target the pids travel as a single comma separated
/// `--pid` value; for a launch target the program and its arguments come
/// last (the working directory is applied when spawning, not here).
pub fn build_record_args(
    options: &PerfOptions,
    output_path: &Path,
    target: &RecordTarget,
) -> Vec<String> {
    let mut args = vec!["record".to_string()];
    args.extend(options.to_args());
    args.push("--output".to_string());
    args.push(output_path.display().to_string());

    match target {
        RecordTarget::Attach { pids } => {
            args.push("--pid".to_string());
            args.push(pids.iter().map(|pid| pid.to_string()).join(","));
        }
        RecordTarget::Launch { program, args: program_args, .. } => {
            args.push(program.display().to_string());
            args.extend(program_args.iter().cloned());
        }
    }

    args
}
