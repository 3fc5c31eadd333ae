//! CPU capability detection for the optional hardware unwind mode.

use std::fs;

/// Whether the host CPU supports Last Branch Record unwinding. LBR is an
/// Intel feature, so the vendor string decides whether to offer it.
pub fn supports_last_branch_record() -> bool {
    match fs::read_to_string("/proc/cpuinfo") {
        Ok(content) => is_intel(&content),
        Err(_) => false,
    }
}

fn is_intel(cpuinfo: &str) -> bool {
    for line in cpuinfo.lines() {
        if line.starts_with("vendor_id") {
            if let Some(value) = line.split(':').nth(1) {
                return value.trim() == "GenuineIntel";
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_intel_vendor() {
        let cpuinfo = "processor\t: 0\nvendor_id\t: GenuineIntel\nmodel name\t: Intel(R) Core(TM)";
        assert!(is_intel(cpuinfo));
    }

    #[test]
    fn rejects_other_vendors() {
        let cpuinfo = "processor\t: 0\nvendor_id\t: AuthenticAMD\nmodel name\t: AMD Ryzen";
        assert!(!is_intel(cpuinfo));
    }

    #[test]
    fn missing_vendor_line_means_unsupported() {
        assert!(!is_intel("processor\t: 0\nmodel name\t: something"));
    }
}
