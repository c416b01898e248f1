//! Publishing generated units to disk
//!
//! Units are written into a staging directory next to the destination and
//! moved into place with a rename once every file is on disk, so a failed run
//! never leaves a partial output tree behind.

use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use sha2::{Digest, Sha256};

use crate::{
    code_generator::RegistrationUnit,
    errors::{GenerationError, Result},
    pipeline::GeneratedPackage,
};

pub const MANIFEST_FILENAME: &str = "cppwg_manifest.txt";

/// A published file and the SHA-256 digest of its contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: PathBuf,
    pub digest: String,
}

fn digest(contents: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contents.as_bytes());
    hasher
        .finalize()
        .iter()
        .fold(String::with_capacity(64), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        })
}

/// Manifest text: one `<digest>  <path>` line per unit, in output order
pub fn render_manifest(entries: &[ManifestEntry]) -> String {
    entries
        .iter()
        .map(|e| {
            let path = e
                .path
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            format!("{}  {path}\n", e.digest)
        })
        .collect()
}

fn write_unit(root: &Path, unit: &RegistrationUnit) -> Result<ManifestEntry> {
    let path = root.join(&unit.path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| GenerationError::io(parent, e))?;
    }
    fs::write(&path, &unit.contents).map_err(|e| GenerationError::io(&path, e))?;
    Ok(ManifestEntry {
        path: unit.path.clone(),
        digest: digest(&unit.contents),
    })
}

/// Move `staged` to `dest`. Previous output is moved aside first and put back
/// if the final rename fails.
fn replace_dir(staged: &Path, dest: &Path, parent: &Path) -> Result<()> {
    if !dest.exists() {
        return fs::rename(staged, dest).map_err(|e| GenerationError::io(dest, e));
    }
    let holder = tempfile::Builder::new()
        .prefix(".cppbind-previous-")
        .tempdir_in(parent)
        .map_err(|e| GenerationError::io(parent, e))?;
    let moved = holder.path().join("output");
    fs::rename(dest, &moved).map_err(|e| GenerationError::io(dest, e))?;
    if let Err(err) = fs::rename(staged, dest) {
        if let Err(restore) = fs::rename(&moved, dest) {
            warn!(
                "Could not restore previous output to {}: {restore}",
                dest.display()
            );
            // Keep the old tree on disk rather than deleting it with the holder.
            let kept = holder.keep();
            warn!("Previous output left in {}", kept.join("output").display());
        }
        return Err(GenerationError::io(dest, err));
    }
    Ok(())
}

/// Write every unit of `package` plus a manifest to `dest`, replacing any
/// previous output there
pub fn publish(package: &GeneratedPackage, dest: &Path) -> Result<Vec<ManifestEntry>> {
    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| GenerationError::io(&parent, e))?;

    let staging = tempfile::Builder::new()
        .prefix(".cppbind-staging-")
        .tempdir_in(&parent)
        .map_err(|e| GenerationError::io(&parent, e))?;
    debug!("Staging output in {}", staging.path().display());

    let entries = package
        .units
        .iter()
        .map(|unit| write_unit(staging.path(), unit))
        .collect::<Result<Vec<_>>>()?;
    let manifest = staging.path().join(MANIFEST_FILENAME);
    fs::write(&manifest, render_manifest(&entries))
        .map_err(|e| GenerationError::io(&manifest, e))?;

    replace_dir(staging.path(), dest, &parent)?;

    info!(
        "Published {} files to {}",
        entries.len() + 1,
        dest.display()
    );
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::plan::WrapPlan;

    fn package(units: Vec<RegistrationUnit>) -> GeneratedPackage {
        GeneratedPackage {
            plan: WrapPlan::default(),
            modules: Vec::new(),
            units,
        }
    }

    #[test]
    fn test_digest_is_sha256_hex() {
        assert_eq!(
            digest(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_publish_replaces_previous_output() {
        let root = tempfile::tempdir().expect("tempdir");
        let dest = root.path().join("wrappers");
        fs::create_dir_all(dest.join("stale")).expect("stale dir");
        fs::write(dest.join("stale/old.cppwg.cpp"), "old").expect("stale file");

        let entries = publish(
            &package(vec![RegistrationUnit {
                path: PathBuf::from("shapes/Point.cppwg.hpp"),
                contents: String::new(),
            }]),
            &dest,
        )
        .expect("publishes");

        assert!(!dest.join("stale").exists());
        assert_eq!(
            fs::read_to_string(dest.join("shapes/Point.cppwg.hpp")).expect("unit"),
            ""
        );
        assert_eq!(
            fs::read_to_string(dest.join(MANIFEST_FILENAME)).expect("manifest"),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855  \
             shapes/Point.cppwg.hpp\n"
        );
        assert_eq!(entries.len(), 1);

        let leftovers: Vec<_> = fs::read_dir(root.path())
            .expect("read root")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("wrappers")]);
    }

    #[test]
    fn test_failed_swap_restores_previous_output() {
        let root = tempfile::tempdir().expect("tempdir");
        let dest = root.path().join("wrappers");
        fs::create_dir_all(&dest).expect("dest dir");
        fs::write(dest.join("Point.cppwg.cpp"), "kept").expect("old unit");

        let err = replace_dir(&root.path().join("missing-staging"), &dest, root.path())
            .unwrap_err();
        assert_eq!(err.kind(), "IoError");
        assert_eq!(
            fs::read_to_string(dest.join("Point.cppwg.cpp")).expect("old unit survives"),
            "kept"
        );

        let leftovers: Vec<_> = fs::read_dir(root.path())
            .expect("read root")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("wrappers")]);
    }
}
