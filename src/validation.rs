//! Path resolution and certificate file checks for operator input

use crate::error::{PublishError, Result};
use crate::warn;
use std::io::Write;
use std::path::{Path, PathBuf};
use termcolor::WriteColor;

/// Expand tilde in path, returning error if HOME is not set
///
/// When HOME is unset, `shellexpand` leaves `~` unchanged, so a leading `~`
/// that survives expansion is reported instead of being treated as a
/// relative directory named `~`.
pub fn expand_tilde_path(path: &str) -> Result<String> {
    let expanded = shellexpand::tilde(path).to_string();

    if path.starts_with('~') && expanded.starts_with('~') {
        return Err(PublishError::InvalidConfig(
            "Could not expand ~ in path (HOME environment variable not set).\n\
             Please use absolute path instead.\n\
             Example: /Users/username/dist.p12 instead of ~/dist.p12"
                .to_string(),
        ));
    }

    Ok(expanded)
}

/// Expand `~` and resolve `input` against `base` when it is relative.
pub fn resolve_path(input: &str, base: &Path) -> Result<PathBuf> {
    let expanded = PathBuf::from(expand_tilde_path(input.trim())?);
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(base.join(expanded))
    }
}

/// Prompt transform: turn operator input into an absolute path string.
pub fn absolute_path_transform(input: &str) -> std::result::Result<String, String> {
    let cwd = std::env::current_dir().map_err(|e| format!("Cannot resolve current directory: {e}"))?;
    resolve_path(input, &cwd)
        .map(|path| path.display().to_string())
        .map_err(|e| e.to_string())
}

/// Validate that a path points to a readable, non-empty certificate file
///
/// Checks:
/// - File exists
/// - Is a regular file (not directory)
/// - Has .p12 extension (warning if not)
/// - Is not empty
pub fn validate_certificate_file(path: &Path) -> Result<()> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PublishError::InvalidConfig(format!(
                "File not found: {}\n   \
                 Please verify the path is correct",
                path.display()
            )));
        }
        Err(e) => {
            return Err(PublishError::InvalidConfig(format!(
                "Cannot access file: {}\n   \
                 Error: {}\n   \
                 Please check file permissions",
                path.display(),
                e
            )));
        }
    };

    if !metadata.is_file() {
        return Err(PublishError::InvalidConfig(format!(
            "Path is not a file: {}\n   \
             Please provide path to a .p12 file",
            path.display()
        )));
    }

    if metadata.len() == 0 {
        return Err(PublishError::InvalidConfig(format!(
            "File is empty: {}\n   \
             Please provide a PKCS#12 (.p12) certificate export",
            path.display()
        )));
    }

    match path.extension().and_then(|e| e.to_str()) {
        Some("p12") | Some("pfx") => {}
        Some(ext) => {
            warn!("Expected .p12 extension, found .{}", ext);
            println!("   File: {}", path.display());
        }
        None => {
            warn!("Certificate file has no extension");
            println!("   Expected: .p12 file");
            println!("   File: {}", path.display());
        }
    }

    Ok(())
}

/// Prompt validator for certificate paths already made absolute by
/// [`absolute_path_transform`].
pub fn certificate_path_validator(input: &str) -> std::result::Result<(), String> {
    validate_certificate_file(Path::new(input)).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path_resolves_against_base() {
        let base = Path::new("/work/project");
        let resolved = resolve_path("certs/dist.p12", base).unwrap();
        assert_eq!(resolved, PathBuf::from("/work/project/certs/dist.p12"));
    }

    #[test]
    fn test_absolute_path_is_kept() {
        let resolved = resolve_path("/tmp/dist.p12", Path::new("/ignored")).unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/dist.p12"));
    }

    #[test]
    fn test_tilde_is_expanded() {
        if let Some(home) = dirs::home_dir() {
            let resolved = resolve_path("~/dist.p12", Path::new("/ignored")).unwrap();
            assert_eq!(resolved, home.join("dist.p12"));
        }
    }

    #[test]
    fn test_missing_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_certificate_file(&dir.path().join("missing.p12")).unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn test_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_certificate_file(dir.path()).unwrap_err();
        assert!(err.to_string().contains("not a file"));
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.p12");
        std::fs::write(&path, b"").unwrap();
        assert!(validate_certificate_file(&path).is_err());
    }

    #[test]
    fn test_certificate_file_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dist.p12");
        std::fs::write(&path, [0x30, 0x82, 0x01]).unwrap();
        assert!(certificate_path_validator(path.to_str().unwrap()).is_ok());
    }
}
