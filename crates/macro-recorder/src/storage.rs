//! Macro persistence - a pretty-printed JSON array of events

use crate::events::EventLog;
use macro_core::{Error, ErrorCode, Result};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const EXTENSION: &str = "json";

/// Write the full ordered log to `path`, replacing any existing file.
pub fn save_macro(log: &EventLog, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::io(path, &e))?;
    let mut w = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut w, log).map_err(|e| {
        let err = io::Error::from(e);
        Error::io(path, &err)
    })?;
    writeln!(w).map_err(|e| Error::io(path, &e))?;
    w.flush().map_err(|e| Error::io(path, &e))?;

    tracing::info!(path = %path.display(), events = log.len(), "macro saved");
    Ok(())
}

/// Read a log back. Every element must be a well-formed event of a known kind.
pub fn load_macro(path: impl AsRef<Path>) -> Result<EventLog> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::not_found(path),
        _ => Error::io(path, &e),
    })?;

    let log: EventLog = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        if e.is_io() {
            Error::io(path, &io::Error::from(e))
        } else {
            Error::malformed(path, e)
        }
    })?;

    tracing::info!(path = %path.display(), events = log.len(), "macro loaded");
    Ok(log)
}

/// A directory of saved macros
pub struct MacroLibrary {
    dir: PathBuf,
}

impl MacroLibrary {
    /// `$HOME/.macro-recorder`
    pub fn new() -> Result<Self> {
        let home = std::env::var("HOME").map_err(|_| {
            Error::new(ErrorCode::NotFound, "HOME not set")
                .with_suggestions(vec!["pass an explicit directory".to_string()])
        })?;
        Self::with_dir(PathBuf::from(home).join(".macro-recorder"))
    }

    pub fn with_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, &e))?;
        Ok(Self { dir })
    }

    /// Save under `<name>_<timestamp>.json` and return the full path.
    pub fn save(&self, name: &str, log: &EventLog) -> Result<PathBuf> {
        let ts = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let filename = format!("{}_{}.{}", sanitize(name), ts, EXTENSION);
        let path = self.dir.join(filename);
        save_macro(log, &path)?;
        Ok(path)
    }

    pub fn load(&self, filename: &str) -> Result<EventLog> {
        load_macro(self.resolve(filename))
    }

    /// List saved macros, sorted by name
    pub fn list(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(|e| Error::io(&self.dir, &e))? {
            let entry = entry.map_err(|e| Error::io(&self.dir, &e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(EXTENSION) {
                if let Some(s) = entry.file_name().to_str() {
                    files.push(s.to_string());
                }
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn delete(&self, filename: &str) -> Result<()> {
        let path = self.resolve(filename);
        fs::remove_file(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::not_found(&path),
            _ => Error::io(&path, &e),
        })?;
        tracing::info!(path = %path.display(), "macro deleted");
        Ok(())
    }

    /// Absolute paths pass through; bare names resolve inside the library.
    pub fn resolve(&self, filename: &str) -> PathBuf {
        let p = Path::new(filename);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.dir.join(p)
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
