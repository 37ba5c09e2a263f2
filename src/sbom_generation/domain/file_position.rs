use std::fmt;

/// Inclusive, 1-based range. Zero means "unset".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub start: usize,
    pub end: usize,
}

impl Position {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Single-line range.
    pub fn at(line: usize) -> Self {
        Self {
            start: line,
            end: line,
        }
    }

    pub fn is_set(&self) -> bool {
        self.start > 0 && self.end > 0
    }
}

/// A line/column range inside a named file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilePosition {
    pub filename: String,
    pub line: Position,
    pub column: Position,
}

impl FilePosition {
    pub fn new(filename: impl Into<String>, line: Position, column: Position) -> Self {
        Self {
            filename: filename.into(),
            line,
            column,
        }
    }

    /// Attaches a filename to a position computed from text alone.
    pub fn in_file(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// True when every coordinate is positive and the filename is known.
    ///
    /// Only such positions are kept by the grouper.
    pub fn is_extracted(&self) -> bool {
        self.line.is_set() && self.column.is_set() && !self.filename.is_empty()
    }

    /// True when any coordinate has been recorded, even partially.
    pub fn is_set(&self) -> bool {
        self.line.start > 0 || self.line.end > 0 || self.column.start > 0 || self.column.end > 0
    }

    /// Whether `other` lies inside this range by line.
    pub fn contains_lines(&self, other: &FilePosition) -> bool {
        self.line.start <= other.line.start && other.line.end <= self.line.end
    }

    /// Moves the range down by `lines`, for positions computed on a slice of a file.
    pub fn shifted(mut self, lines: usize) -> Self {
        self.line.start += lines;
        self.line.end += lines;
        self
    }
}

impl fmt::Display for FilePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}-{}:{}",
            self.filename, self.line.start, self.column.start, self.line.end, self.column.end
        )
    }
}

/// Block, name and version positions of one dependency declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileLocations {
    pub block: FilePosition,
    pub name: Option<FilePosition>,
    pub version: Option<FilePosition>,
}

impl FileLocations {
    pub fn new(block: FilePosition) -> Self {
        Self {
            block,
            name: None,
            version: None,
        }
    }

    pub fn with_name(mut self, name: Option<FilePosition>) -> Self {
        self.name = name;
        self
    }

    pub fn with_version(mut self, version: Option<FilePosition>) -> Self {
        self.version = version;
        self
    }

    /// Applies `rewrite` to every filename carried by these locations.
    pub fn map_filenames<F>(&mut self, rewrite: F)
    where
        F: Fn(&str) -> String,
    {
        self.block.filename = rewrite(&self.block.filename);
        for position in [self.name.as_mut(), self.version.as_mut()].into_iter().flatten() {
            position.filename = rewrite(&position.filename);
        }
    }
}
