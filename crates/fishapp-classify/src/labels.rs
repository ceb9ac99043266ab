//! Class names, index-aligned with the model's output.

use std::path::Path;

use crate::error::LoadError;

/// Ordered class names; label `i` names logit `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    /// Parse one label per line.
    ///
    /// Surrounding whitespace is trimmed from each line and trailing
    /// blank lines are dropped. Blank lines in the middle are kept as
    /// empty labels so indices stay aligned with the model.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::EmptyLabels`] if no labels remain.
    pub fn from_lines(text: &str) -> Result<Self, LoadError> {
        let mut labels: Vec<String> = text.lines().map(|l| l.trim().to_owned()).collect();
        while labels.last().is_some_and(String::is_empty) {
            labels.pop();
        }
        if labels.is_empty() {
            return Err(LoadError::EmptyLabels);
        }
        Ok(Self { labels })
    }

    /// Read and parse a label file.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Io`] if the file cannot be read, or
    /// [`LoadError::EmptyLabels`] if it holds no labels.
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_lines(&text)
    }

    /// Number of labels.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the table has no labels. Tables built by
    /// [`from_lines`](Self::from_lines) or [`from_file`](Self::from_file)
    /// never do.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The label at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Labels in index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn trims_and_drops_trailing_blanks() {
        let table = LabelTable::from_lines("  cod \nhaddock\r\n\nsaithe\n\n  \n").unwrap();
        assert_eq!(
            table.iter().collect::<Vec<_>>(),
            ["cod", "haddock", "", "saithe"]
        );
        assert_eq!(table.len(), 4);
        assert_eq!(table.get(3), Some("saithe"));
        assert_eq!(table.get(4), None);
    }

    #[test]
    fn empty_table_is_an_error() {
        assert!(matches!(
            LabelTable::from_lines(""),
            Err(LoadError::EmptyLabels)
        ));
        assert!(matches!(
            LabelTable::from_lines("\n \n"),
            Err(LoadError::EmptyLabels)
        ));
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cod\nling").unwrap();
        let table = LabelTable::from_file(file.path()).unwrap();
        assert_eq!(table.iter().collect::<Vec<_>>(), ["cod", "ling"]);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = LabelTable::from_file(Path::new("/nonexistent/labels.txt")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/labels.txt"));
    }
}
