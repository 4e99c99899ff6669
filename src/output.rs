//! Output formatting for scan results.
//!
//! Provides functions to render classified files as aligned text columns,
//! a Markdown table, JSON, or bare paths, plus the stable sorts used for
//! display.

use crate::ClassifiedFile;
use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Markdown,
    Json,
    /// One path per line, nothing else.
    Paths,
}

impl OutputFormat {
    /// Returns the conventional file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Text | OutputFormat::Paths => "txt",
            OutputFormat::Json => "json",
        }
    }
}

/// Column to order results by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortKey {
    Path,
    /// Release chronology, oldest first when ascending.
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Stable sort; equal keys keep their discovery order in both directions.
pub fn sort_results(files: &mut [ClassifiedFile], key: SortKey, order: SortOrder) {
    files.sort_by(|a, b| {
        let ord = match key {
            SortKey::Path => a.path.cmp(&b.path),
            SortKey::Version => a.version.release().cmp(&b.version.release()),
        };
        match order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    });
}

/// Formats the results into a string.
pub fn format_results(
    files: &[ClassifiedFile],
    format: OutputFormat,
    pretty: bool,
) -> Result<String, ScanError> {
    match format {
        OutputFormat::Text => Ok(format_text(files)),
        OutputFormat::Markdown => Ok(format_markdown(files)),
        OutputFormat::Json => format_json(files, pretty),
        OutputFormat::Paths => Ok(format_paths(files)),
    }
}

/// Writes the formatted results to a file and returns where they went.
///
/// A path without an extension gets the format's conventional one.
pub fn write_results_to_file(
    files: &[ClassifiedFile],
    format: OutputFormat,
    path: impl AsRef<Path>,
    pretty: bool,
) -> Result<PathBuf, ScanError> {
    let path = path.as_ref();
    let target = if path.extension().is_none() {
        path.with_extension(format.extension())
    } else {
        path.to_path_buf()
    };
    let content = format_results(files, format, pretty)?;
    fs::write(&target, content).map_err(|e| ScanError::io(&target, e))?;
    Ok(target)
}

// ----------------------- Internal formatting -----------------------

fn format_text(files: &[ClassifiedFile]) -> String {
    let rows: Vec<(String, &str, &str)> = files
        .iter()
        .map(|f| {
            (
                f.path.display().to_string(),
                f.version.as_str(),
                f.version.release_name(),
            )
        })
        .collect();
    let path_width = rows.iter().map(|r| r.0.chars().count()).max().unwrap_or(0);
    let code_width = rows.iter().map(|r| r.1.chars().count()).max().unwrap_or(0);
    let mut out = String::with_capacity(rows.len() * (path_width + code_width + 32));
    for (path, code, name) in &rows {
        let line = format!("{path:<path_width$}  {code:<code_width$}  {name}");
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

fn format_markdown(files: &[ClassifiedFile]) -> String {
    let mut out = String::with_capacity(64 + files.len() * 64);
    out.push_str("| Path | Version | Release |\n");
    out.push_str("|------|---------|---------|\n");
    for file in files {
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            escape_cell(&file.path.display().to_string()),
            escape_cell(file.version.as_str()),
            file.version.release_name()
        ));
    }
    out
}

fn format_paths(files: &[ClassifiedFile]) -> String {
    files
        .iter()
        .map(|f| format!("{}\n", f.path.display()))
        .collect()
}

fn format_json(files: &[ClassifiedFile], pretty: bool) -> Result<String, ScanError> {
    let json = if pretty {
        serde_json::to_string_pretty(files)
    } else {
        serde_json::to_string(files)
    };
    json.map_err(ScanError::Serialize)
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DrawingVersion;
    use tempfile::tempdir;

    fn file(path: &str, version: DrawingVersion) -> ClassifiedFile {
        ClassifiedFile {
            path: PathBuf::from(path),
            version,
        }
    }

    #[test]
    fn text_columns_are_aligned() {
        let files = vec![
            file("a.dwg", DrawingVersion::Ac1015),
            file("longer/name.dwg", DrawingVersion::Ac12),
        ];
        let text = format_results(&files, OutputFormat::Text, false).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            "a.dwg            AC1015  AutoCAD 2000/2000i/2002"
        );
        assert_eq!(lines[1], "longer/name.dwg  AC1.2   Release 1.2");
    }

    #[test]
    fn version_sort_is_stable_and_reversible() {
        let mut files = vec![
            file("b.dwg", DrawingVersion::Ac1032),
            file("a.dwg", DrawingVersion::Mc00),
            file("c.dwg", DrawingVersion::Ac1032),
        ];
        sort_results(&mut files, SortKey::Version, SortOrder::Ascending);
        let names: Vec<_> = files.iter().map(|f| f.path.to_str().unwrap()).collect();
        assert_eq!(names, ["a.dwg", "b.dwg", "c.dwg"]);
        sort_results(&mut files, SortKey::Version, SortOrder::Descending);
        let names: Vec<_> = files.iter().map(|f| f.path.to_str().unwrap()).collect();
        assert_eq!(names, ["b.dwg", "c.dwg", "a.dwg"]);
        sort_results(&mut files, SortKey::Path, SortOrder::Descending);
        assert_eq!(files[0].path, PathBuf::from("c.dwg"));
    }

    #[test]
    fn markdown_and_json_render() {
        let files = vec![file("x.dwg", DrawingVersion::Ac1018)];
        let md = format_results(&files, OutputFormat::Markdown, false).unwrap();
        assert!(md.contains("| x.dwg | AC1018 | AutoCAD 2004/2005/2006 |"));
        let json = format_results(&files, OutputFormat::Json, false).unwrap();
        assert_eq!(json, r#"[{"path":"x.dwg","version":"AC1018"}]"#);
        let paths = format_results(&files, OutputFormat::Paths, false).unwrap();
        assert_eq!(paths, "x.dwg\n");
    }

    #[test]
    fn written_file_gets_the_format_extension() {
        let dir = tempdir().unwrap();
        let files = vec![file("x.dwg", DrawingVersion::Ac1018)];
        let target =
            write_results_to_file(&files, OutputFormat::Markdown, dir.path().join("report"), false)
                .unwrap();
        assert_eq!(target, dir.path().join("report.md"));
        assert!(fs::read_to_string(&target).unwrap().contains("| x.dwg |"));
        let explicit = dir.path().join("out.csv");
        let target = write_results_to_file(&files, OutputFormat::Json, &explicit, true).unwrap();
        assert_eq!(target, explicit);
        assert!(fs::read_to_string(&target).unwrap().starts_with("[\n"));
    }
}
