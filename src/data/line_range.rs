use thiserror::Error;

/// A slice of a file's lines, zero-based, that a fix replaces wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub length: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LineRangeError {
    #[error("line range {start}+{length} exceeds the {total} available lines")]
    OutOfBounds {
        start: usize,
        length: usize,
        total: usize,
    },
}

impl LineRange {
    pub fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }

    /// The whole of a file with `total` lines.
    pub fn whole(total: usize) -> Self {
        Self {
            start: 0,
            length: total,
        }
    }

    /// The window of `radius` lines above and below a 1-based `line`.
    ///
    /// A line of 0 or past the end selects the whole file.
    pub fn around(line: usize, radius: usize, total: usize) -> Self {
        if line == 0 || line > total {
            return Self::whole(total);
        }
        let start = (line - 1).saturating_sub(radius);
        let end = (line + radius).min(total);
        Self {
            start,
            length: end - start,
        }
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }

    pub fn covers_whole(&self, total: usize) -> bool {
        self.start == 0 && self.length == total
    }

    pub fn check(&self, total: usize) -> Result<(), LineRangeError> {
        if self.end() > total {
            return Err(LineRangeError::OutOfBounds {
                start: self.start,
                length: self.length,
                total,
            });
        }
        Ok(())
    }

    /// Lines of `lines` inside the range.
    pub fn slice<'a>(&self, lines: &'a [String]) -> Result<&'a [String], LineRangeError> {
        self.check(lines.len())?;
        Ok(&lines[self.start..self.end()])
    }

    /// Replaces exactly this range of `lines` with `replacement`.
    ///
    /// Lines outside the range are left untouched.
    pub fn splice(
        &self,
        lines: &mut Vec<String>,
        replacement: Vec<String>,
    ) -> Result<(), LineRangeError> {
        self.check(lines.len())?;
        lines.splice(self.start..self.end(), replacement);
        Ok(())
    }

    /// Human-readable 1-based description used in prompts and console output
    pub fn describe(&self, total: usize) -> String {
        if self.covers_whole(total) {
            "whole file".to_string()
        } else {
            format!("lines {} to {}", self.start + 1, self.end())
        }
    }
}
