//! Day- and size-rolling log file writer.
//!
//! Files are named `<stem><yyyyMMdd>[_NNN]<ext>`: the date changes at local
//! midnight and the `_NNN` sequence grows each time the current file would
//! pass the size limit.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};

use crate::path::LogPath;

const DATE_FORMAT: &str = "%Y%m%d";
const DATE_DIGITS: usize = 8;

/// Default size limit per file (1 GiB).
pub const DEFAULT_FILE_SIZE_LIMIT: u64 = 1024 * 1024 * 1024;
/// Default number of files kept on disk.
pub const DEFAULT_RETAINED_FILE_COUNT: usize = 31;

/// Size and retention limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingOptions {
    pub file_size_limit: u64,
    pub retained_file_count: usize,
}

impl Default for RollingOptions {
    fn default() -> Self {
        Self {
            file_size_limit: DEFAULT_FILE_SIZE_LIMIT,
            retained_file_count: DEFAULT_RETAINED_FILE_COUNT,
        }
    }
}

type Clock = Box<dyn Fn() -> NaiveDate + Send>;

struct CurrentFile {
    file: File,
    date: NaiveDate,
    sequence: u32,
    written: u64,
}

/// Writer behind the file sink.
pub struct RollingFileWriter {
    dir: PathBuf,
    stem: String,
    ext: String,
    options: RollingOptions,
    clock: Clock,
    current: Option<CurrentFile>,
}

impl RollingFileWriter {
    /// Opens today's file for `path`, creating the directory if needed.
    pub fn new(path: &LogPath, options: RollingOptions) -> io::Result<Self> {
        Self::with_clock(path, options, || Local::now().date_naive())
    }

    pub fn with_clock(
        path: &LogPath,
        options: RollingOptions,
        clock: impl Fn() -> NaiveDate + Send + 'static,
    ) -> io::Result<Self> {
        let dir = path
            .directory()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&dir)?;

        let file_name = path.file_name();
        let (stem, ext) = file_name.split();

        let mut writer = Self {
            dir,
            stem: stem.to_string(),
            ext: ext.to_string(),
            options,
            clock: Box::new(clock),
            current: None,
        };
        let today = (writer.clock)();
        writer.open_for(today)?;
        Ok(writer)
    }

    /// Path of the file currently written to.
    pub fn current_path(&self) -> Option<PathBuf> {
        self.current
            .as_ref()
            .map(|c| self.dir.join(self.file_name_for(c.date, c.sequence)))
    }

    fn file_name_for(&self, date: NaiveDate, sequence: u32) -> String {
        let date = date.format(DATE_FORMAT);
        if sequence == 0 {
            format!("{}{}{}", self.stem, date, self.ext)
        } else {
            format!("{}{}_{:03}{}", self.stem, date, sequence, self.ext)
        }
    }

    /// Opens the newest file for `date`, appending to it unless it is full.
    fn open_for(&mut self, date: NaiveDate) -> io::Result<()> {
        let mut sequence = 0;
        while self.dir.join(self.file_name_for(date, sequence + 1)).exists() {
            sequence += 1;
        }

        let existing = fs::metadata(self.dir.join(self.file_name_for(date, sequence)))
            .map(|m| m.len())
            .unwrap_or(0);
        if existing >= self.options.file_size_limit {
            sequence += 1;
        }

        self.open(date, sequence)
    }

    fn open(&mut self, date: NaiveDate, sequence: u32) -> io::Result<()> {
        let path = self.dir.join(self.file_name_for(date, sequence));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();

        if let Some(mut old) = self.current.take() {
            let _ = old.file.flush();
        }
        self.current = Some(CurrentFile {
            file,
            date,
            sequence,
            written,
        });
        self.prune()
    }

    fn roll_if_needed(&mut self, incoming: usize) -> io::Result<()> {
        let today = (self.clock)();
        let Some(current) = self.current.as_ref() else {
            return self.open_for(today);
        };

        if current.date != today {
            return self.open_for(today);
        }

        let incoming = incoming as u64;
        if current.written > 0 && current.written + incoming > self.options.file_size_limit {
            let (date, next) = (current.date, current.sequence + 1);
            return self.open(date, next);
        }
        Ok(())
    }

    /// Deletes the oldest matching files beyond the retention count.
    fn prune(&self) -> io::Result<()> {
        let mut files: Vec<String> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| self.is_rolled_name(name))
            .collect();

        if files.len() <= self.options.retained_file_count {
            return Ok(());
        }

        // Zero-padded dates and sequences sort chronologically
        files.sort();
        let excess = files.len() - self.options.retained_file_count;
        for name in files.into_iter().take(excess) {
            let _ = fs::remove_file(self.dir.join(name));
        }
        Ok(())
    }

    fn is_rolled_name(&self, name: &str) -> bool {
        let Some(middle) = name
            .strip_prefix(self.stem.as_str())
            .and_then(|rest| rest.strip_suffix(self.ext.as_str()))
        else {
            return false;
        };

        if middle.len() < DATE_DIGITS || !middle.is_char_boundary(DATE_DIGITS) {
            return false;
        }
        let (date, rest) = middle.split_at(DATE_DIGITS);
        if !date.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }

        match rest.strip_prefix('_') {
            None => rest.is_empty(),
            Some(seq) => !seq.is_empty() && seq.bytes().all(|b| b.is_ascii_digit()),
        }
    }
}

impl Write for RollingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.roll_if_needed(buf.len())?;
        let current = self
            .current
            .as_mut()
            .ok_or_else(|| io::Error::other("log file is not open"))?;
        current.file.write_all(buf)?;
        current.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.current.as_mut() {
            Some(current) => current.file.flush(),
            None => Ok(()),
        }
    }
}
