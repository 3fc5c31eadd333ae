//! Synchronous input validation for the record form. Everything here is
//! computed from the current input state and blocks starting a session until
//! the user corrects it; nothing touches the session machinery.

use perfcap_common::constants::DATA_FILE_EXTENSION;
use std::fmt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputError {
    ApplicationNotFound(String),
    ApplicationNotAFile(PathBuf),
    ApplicationNotExecutable(PathBuf),
    WorkingDirNotFound(PathBuf),
    WorkingDirNotADirectory(PathBuf),
    WorkingDirNotWritable(PathBuf),
    OutputDirNotFound(PathBuf),
    OutputDirNotADirectory(PathBuf),
    OutputDirNotWritable(PathBuf),
    OutputWrongExtension(PathBuf),
    NoProcessSelected,
    LbrUnsupported,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::ApplicationNotFound(name) => {
                write!(f, "application file cannot be found: {name}")
            }
            InputError::ApplicationNotAFile(path) => {
                write!(f, "application file is not valid: {}", path.display())
            }
            InputError::ApplicationNotExecutable(path) => {
                write!(f, "application file is not executable: {}", path.display())
            }
            InputError::WorkingDirNotFound(path) => {
                write!(f, "working directory cannot be found: {}", path.display())
            }
            InputError::WorkingDirNotADirectory(path) => {
                write!(f, "working directory is not valid: {}", path.display())
            }
            InputError::WorkingDirNotWritable(path) => {
                write!(f, "working directory is not writable: {}", path.display())
            }
            InputError::OutputDirNotFound(path) => {
                write!(f, "output directory cannot be found: {}", path.display())
            }
            InputError::OutputDirNotADirectory(path) => {
                write!(f, "output directory is not valid: {}", path.display())
            }
            InputError::OutputDirNotWritable(path) => {
                write!(f, "output directory is not writable: {}", path.display())
            }
            InputError::OutputWrongExtension(path) => {
                write!(
                    f,
                    "output file {} must end with {DATA_FILE_EXTENSION}",
                    path.display()
                )
            }
            InputError::NoProcessSelected => write!(f, "no process selected to attach to"),
            InputError::LbrUnsupported => {
                write!(f, "this machine does not support last branch record unwinding")
            }
        }
    }
}

impl std::error::Error for InputError {}

/// Expands a leading `~` to the user's home directory, like the shell would.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Resolves the application the user typed to an executable path: tilde
/// expansion, then a PATH lookup for bare names, then file and permission
/// checks.
pub fn resolve_application(input: &str) -> Result<PathBuf, InputError> {
    let expanded = expand_tilde(input);

    let candidate = if expanded.components().count() > 1 || expanded.is_absolute() {
        expanded
    } else {
        match which::which(&expanded) {
            Ok(found) => found,
            Err(_) => return Err(InputError::ApplicationNotFound(input.to_string())),
        }
    };

    let metadata = match std::fs::metadata(&candidate) {
        Ok(metadata) => metadata,
        Err(_) => return Err(InputError::ApplicationNotFound(input.to_string())),
    };
    if !metadata.is_file() {
        return Err(InputError::ApplicationNotAFile(candidate));
    }
    if metadata.permissions().mode() & 0o111 == 0 {
        return Err(InputError::ApplicationNotExecutable(candidate));
    }

    Ok(candidate)
}

pub fn validate_working_dir(dir: &Path) -> Result<(), InputError> {
    let metadata = match std::fs::metadata(dir) {
        Ok(metadata) => metadata,
        Err(_) => return Err(InputError::WorkingDirNotFound(dir.to_path_buf())),
    };
    if !metadata.is_dir() {
        return Err(InputError::WorkingDirNotADirectory(dir.to_path_buf()));
    }
    if !is_writable_dir(dir) {
        return Err(InputError::WorkingDirNotWritable(dir.to_path_buf()));
    }
    Ok(())
}

/// Checks the directory an output file would land in, and the `.data`
/// extension the result viewer expects.
pub fn validate_output_path(path: &Path) -> Result<(), InputError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let metadata = match std::fs::metadata(&dir) {
        Ok(metadata) => metadata,
        Err(_) => return Err(InputError::OutputDirNotFound(dir)),
    };
    if !metadata.is_dir() {
        return Err(InputError::OutputDirNotADirectory(dir));
    }
    if !is_writable_dir(&dir) {
        return Err(InputError::OutputDirNotWritable(dir));
    }
    if !path
        .to_string_lossy()
        .ends_with(DATA_FILE_EXTENSION)
    {
        return Err(InputError::OutputWrongExtension(path.to_path_buf()));
    }
    Ok(())
}

/// Appends the expected extension when the user left it off.
pub fn ensure_data_extension(path: PathBuf) -> PathBuf {
    if path.to_string_lossy().ends_with(DATA_FILE_EXTENSION) {
        path
    } else {
        let mut corrected = path.into_os_string();
        corrected.push(DATA_FILE_EXTENSION);
        PathBuf::from(corrected)
    }
}

// Permission bits lie on shared mounts and ACLs; actually creating a file is
// the only check that matches what the recorder will do.
fn is_writable_dir(dir: &Path) -> bool {
    tempfile::tempfile_in(dir).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn resolves_bare_names_through_path() {
        let resolved = resolve_application("sh").unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("sh"));
    }

    #[test]
    fn resolves_absolute_paths_directly() {
        assert_eq!(
            resolve_application("/bin/true").unwrap(),
            PathBuf::from("/bin/true")
        );
    }

    #[test]
    fn missing_application_is_reported() {
        assert_eq!(
            resolve_application("no-such-binary-blorp"),
            Err(InputError::ApplicationNotFound(
                "no-such-binary-blorp".to_string()
            ))
        );
    }

    #[test]
    fn directory_is_not_an_application() {
        assert_eq!(
            resolve_application("/tmp"),
            Err(InputError::ApplicationNotAFile(PathBuf::from("/tmp")))
        );
    }

    #[test]
    fn non_executable_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.txt");
        std::fs::write(&path, "data").unwrap();

        assert_eq!(
            resolve_application(&path.to_string_lossy()),
            Err(InputError::ApplicationNotExecutable(path))
        );
    }

    #[test]
    fn tilde_expands_to_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/bin/tool"), home.join("bin/tool"));
            assert_eq!(expand_tilde("~"), home);
        }
        assert_eq!(expand_tilde("/opt/tool"), PathBuf::from("/opt/tool"));
    }

    #[test]
    fn working_dir_checks() {
        let dir = TempDir::new().unwrap();
        assert_eq!(validate_working_dir(dir.path()), Ok(()));
        assert_eq!(
            validate_working_dir(Path::new("/no/such/dir")),
            Err(InputError::WorkingDirNotFound(PathBuf::from("/no/such/dir")))
        );

        let file = dir.path().join("file");
        std::fs::write(&file, "x").unwrap();
        assert_eq!(
            validate_working_dir(&file),
            Err(InputError::WorkingDirNotADirectory(file))
        );
    }

    #[test]
    fn output_path_requires_existing_writable_dir_and_extension() {
        let dir = TempDir::new().unwrap();

        let good = dir.path().join("profile.data");
        assert_eq!(validate_output_path(&good), Ok(()));

        let wrong_ext = dir.path().join("profile.perf");
        assert_eq!(
            validate_output_path(&wrong_ext),
            Err(InputError::OutputWrongExtension(wrong_ext))
        );

        let missing_dir = Path::new("/no/such/dir/profile.data");
        assert_eq!(
            validate_output_path(missing_dir),
            Err(InputError::OutputDirNotFound(PathBuf::from("/no/such/dir")))
        );
    }

    #[test]
    fn extension_is_appended_when_missing() {
        assert_eq!(
            ensure_data_extension(PathBuf::from("/tmp/profile")),
            PathBuf::from("/tmp/profile.data")
        );
        assert_eq!(
            ensure_data_extension(PathBuf::from("/tmp/profile.data")),
            PathBuf::from("/tmp/profile.data")
        );
    }

    #[test]
    fn error_messages_are_human_readable() {
        let message = InputError::ApplicationNotFound("vim".to_string()).to_string();
        assert!(message.contains("vim"));
        assert!(message.contains("cannot be found"));
    }
}
