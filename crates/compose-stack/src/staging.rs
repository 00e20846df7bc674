//! Staging of in-memory manifests to disk.
//!
//! The compiler only reads files, so manifests supplied as readers are written
//! to a directory keyed by the current working directory. Repeated runs from
//! the same directory reuse the same location.

use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

const STAGING_ROOT: &str = "compose-harness";

/// Staging directory for `current_dir`, e.g.
/// `/tmp/compose-harness/my-service-2f686f6d652f676f666f7262726f6b65`
pub fn staging_dir(current_dir: &Path) -> PathBuf {
    let project_name = current_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());
    let digest = hex::encode(Sha256::digest(current_dir.as_os_str().as_encoded_bytes()));

    std::env::temp_dir()
        .join(STAGING_ROOT)
        .join(format!("{}-{}", project_name, &digest[..32]))
}

/// Write every reader to the staging directory and return the paths in input order.
///
/// # Panics
///
/// Panics if the current working directory cannot be determined.
pub fn stage_readers<R: Read>(readers: impl IntoIterator<Item = R>) -> Result<Vec<PathBuf>> {
    let current_dir = std::env::current_dir().expect("Failed to get current directory");
    let dir = staging_dir(&current_dir);

    std::fs::create_dir_all(&dir).map_err(|source| Error::Staging {
        path: dir.clone(),
        source,
    })?;

    let mut paths = Vec::new();
    for (idx, mut reader) in readers.into_iter().enumerate() {
        let path = dir.join(format!("docker-compose-{}.yaml", idx));

        let mut content = Vec::new();
        reader
            .read_to_end(&mut content)
            .map_err(|source| Error::Staging {
                path: path.clone(),
                source,
            })?;
        std::fs::write(&path, content).map_err(|source| Error::Staging {
            path: path.clone(),
            source,
        })?;

        debug!("Staged compose file {}", path.display());
        paths.push(path);
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_dir_is_deterministic() {
        let dir = Path::new("/home/user/my-service");
        let first = staging_dir(dir);

        assert_eq!(first, staging_dir(dir));
        assert_ne!(first, staging_dir(Path::new("/home/other/my-service")));

        let name = first.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("my-service-"));
        assert_eq!(name.len(), "my-service-".len() + 32);
        assert!(first.parent().unwrap().ends_with(STAGING_ROOT));
    }

    #[test]
    fn test_stage_readers_writes_in_order() {
        let manifests = ["services: {a: {image: alpine}}\n", "services: {b: {image: alpine}}\n"];
        let paths = stage_readers(manifests.iter().map(|m| m.as_bytes())).unwrap();

        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("docker-compose-0.yaml"));
        assert!(paths[1].ends_with("docker-compose-1.yaml"));
        assert_eq!(std::fs::read_to_string(&paths[1]).unwrap(), manifests[1]);
    }
}
