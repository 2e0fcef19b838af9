//! Writing assembled VHDL to disk.

use crate::DriverError;
use corvid_config::{OutputConfig, OutputMode};
use corvid_vhdl::VhdlLibrary;
use std::path::{Path, PathBuf};

/// Writes `vhdl` below `root` according to the `[output]` section.
///
/// In single mode the whole library goes to `<root>/<directory>.vhd`; in
/// per-entity mode every entity gets `<root>/<directory>/<entity>.vhd`.
/// Returns the written paths in emission order.
pub fn write_output(
    vhdl: &VhdlLibrary,
    output: &OutputConfig,
    root: &Path,
) -> Result<Vec<PathBuf>, DriverError> {
    match output.mode {
        OutputMode::Single => {
            let path = root.join(format!("{}.vhd", output.directory));
            let write = || -> std::io::Result<()> {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, vhdl.write())
            };
            write().map_err(|source| DriverError::Write {
                path: path.clone(),
                source,
            })?;
            log::info!("wrote {}", path.display());
            Ok(vec![path])
        }
        OutputMode::PerEntity => {
            let dir = root.join(&output.directory);
            let paths = vhdl
                .write_dir(&dir)
                .map_err(|source| DriverError::Write { path: dir.clone(), source })?;
            log::info!("wrote {} files to {}", paths.len(), dir.display());
            Ok(paths)
        }
    }
}
