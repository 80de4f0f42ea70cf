use snafu::{ResultExt, Snafu};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Snafu)]
pub enum ScriptError {
    #[snafu(display("Failed to open action script {}: {}", path, source))]
    Open {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("Failed to append to action script: {}", source))]
    Append { source: std::io::Error },
}

type Result<T, E = ScriptError> = std::result::Result<T, E>;

/// Append-only SQL output, one `<statement>;` per line. Every append is
/// flushed immediately so a timed-out run still leaves a valid, replayable
/// prefix on disk.
pub struct ActionScript {
    out: File,
    path: String,
}

impl ActionScript {
    pub fn create(path: &Path) -> Result<Self> {
        let display_path = path.display().to_string();
        let out = File::create(path).context(OpenSnafu {
            path: display_path.as_str(),
        })?;
        Ok(Self {
            out,
            path: display_path,
        })
    }

    pub fn append(&mut self, statement: &str) -> Result<()> {
        writeln!(self.out, "{statement};").context(AppendSnafu)?;
        self.out.flush().context(AppendSnafu)?;
        debug!("Emitted action: {statement}");
        Ok(())
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}
