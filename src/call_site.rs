use std::{fmt::Display, panic::Location, path::Path};

use backtrace::{Backtrace, BacktraceSymbol};

/// Source location a record was logged from, rendered as `[file:line]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    file: String,
    line: u32,
}

impl CallSite {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    pub fn unknown() -> Self {
        Self::new("???", 0)
    }

    /// Resolves the call site `skip_frames` frames above `location`.
    ///
    /// `location` comes from `#[track_caller]` and is used as is for a skip of
    /// zero. Otherwise the stack is walked from the frame executing
    /// `location`, and [`CallSite::unknown`] is returned when the walk runs
    /// out of frames or the target frame has no debug info.
    pub fn resolve(location: &Location<'_>, skip_frames: usize) -> Self {
        if skip_frames == 0 {
            return Self::new(base_name(Path::new(location.file())), location.line());
        }

        Self::walk(location, skip_frames).unwrap_or_else(Self::unknown)
    }

    fn walk(location: &Location<'_>, skip_frames: usize) -> Option<Self> {
        let trace = Backtrace::new();
        let mut symbols = trace.frames().iter().flat_map(|frame| frame.symbols());

        symbols.find(|symbol| executes(symbol, location))?;
        let target = symbols.nth(skip_frames - 1)?;

        Some(Self::new(base_name(target.filename()?), target.lineno()?))
    }
}

fn executes(symbol: &BacktraceSymbol, location: &Location<'_>) -> bool {
    symbol.lineno() == Some(location.line())
        && symbol
            .filename()
            .is_some_and(|file| file.ends_with(location.file()))
}

fn base_name(file: &Path) -> &str {
    file.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("???")
}

impl Display for CallSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}]", self.file, self.line)
    }
}
