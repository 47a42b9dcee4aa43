use fnv::FnvHashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum LineMapError {
    #[error("line {line} is outside of the preprocessed range 1..={last_line}")]
    LineOutOfRange { line: u32, last_line: u32 },
}

// one contiguous run of output lines that came from the same file
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawSpan {
    abs_start: u32,
    abs_end: u32,
    rel_start: u32,
}

/// Line provenance as it is collected during preprocessing
///
/// For each source file the preprocessor records the output line ranges
/// `[abs_start, abs_end)` that were copied from it, together with the
/// zero-based line offset inside the source file where each range begins.
#[derive(Debug, Clone, Default)]
pub struct RawLineMap {
    spans: FnvHashMap<String, Vec<RawSpan>>,
}

impl RawLineMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// record that output lines `abs_start..abs_end` came from `file`, starting at
    /// the zero-based source line `rel_start`
    pub fn add_span(&mut self, file: &str, abs_start: u32, abs_end: u32, rel_start: u32) {
        if abs_end > abs_start {
            self.spans.entry(file.to_string()).or_default().push(RawSpan {
                abs_start,
                abs_end,
                rel_start,
            });
        }
    }

    /// the spans recorded for one file, in the order they were added
    pub fn spans(&self, file: &str) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.spans
            .get(file)
            .into_iter()
            .flatten()
            .map(|span| (span.abs_start, span.abs_end))
    }
}

/// One entry of a `LineMap`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMapEntry {
    pub abs_start: u32,
    pub abs_end: u32,
    pub rel_start: u32,
    pub rel_end: u32,
    file: usize,
}

/// Maps line numbers of the preprocessed output back to the source file and line
#[derive(Debug, Clone, Default)]
pub struct LineMap {
    files: Vec<String>,
    entries: Vec<LineMapEntry>,
    last_line: u32,
}

impl LineMap {
    /// build the lookup table from the spans collected during preprocessing
    #[must_use]
    pub fn build(raw: RawLineMap) -> Self {
        let mut files: Vec<String> = Vec::with_capacity(raw.spans.len());
        let mut entries = Vec::new();
        for (file, spans) in raw.spans {
            let file_idx = files.len();
            files.push(file);
            entries.extend(spans.into_iter().map(|span| LineMapEntry {
                abs_start: span.abs_start,
                abs_end: span.abs_end,
                rel_start: span.rel_start,
                rel_end: span.rel_start + (span.abs_end - span.abs_start),
                file: file_idx,
            }));
        }
        entries.sort_by_key(|entry| entry.abs_start);
        let last_line = entries.last().map_or(0, |entry| entry.abs_end - 1);

        Self {
            files,
            entries,
            last_line,
        }
    }

    /// find the source file and the one-based source line for a line of the preprocessed output
    ///
    /// # Errors
    ///
    /// [`LineMapError::LineOutOfRange`] if `line` is not in `1..=last_line()`
    pub fn lookup(&self, line: u32) -> Result<(&str, u32), LineMapError> {
        let out_of_range = LineMapError::LineOutOfRange {
            line,
            last_line: self.last_line,
        };
        if line == 0 || line > self.last_line {
            return Err(out_of_range);
        }
        let pos = self.entries.partition_point(|entry| entry.abs_start <= line);
        if pos == 0 {
            return Err(out_of_range);
        }
        let entry = &self.entries[pos - 1];
        if line >= entry.abs_end {
            return Err(out_of_range);
        }

        Ok((
            &self.files[entry.file],
            line - (entry.abs_start - entry.rel_start) + 1,
        ))
    }

    /// the highest line number that can be looked up
    #[must_use]
    pub fn last_line(&self) -> u32 {
        self.last_line
    }

    /// the table entries, sorted by `abs_start`
    #[must_use]
    pub fn entries(&self) -> &[LineMapEntry] {
        &self.entries
    }

    /// the file that an entry refers to
    #[must_use]
    pub fn entry_file(&self, entry: &LineMapEntry) -> &str {
        &self.files[entry.file]
    }
}
