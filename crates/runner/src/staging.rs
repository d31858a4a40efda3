use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tempfile::NamedTempFile;

/// Code written to a temporary `.py` file for bind-mounting into the
/// container. The file is removed when this value is dropped.
pub struct StagedCode {
    file: NamedTempFile,
}

impl StagedCode {
    /// Write `code` into a new file under `dir` (the system temp dir if
    /// `None`). The file is world-readable so the container user can read it.
    pub fn write(code: &str, dir: Option<&Path>) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("coderun-").suffix(".py");
        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(code.as_bytes())?;
        file.flush()?;
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644))?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
