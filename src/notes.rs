//! Exporting generated notes as a downloadable file.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

/// Export formats for notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotesFormat {
    /// The raw Markdown notes.
    Markdown,
    /// Notes with Markdown syntax removed.
    Text,
}

impl NotesFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            NotesFormat::Markdown => "md",
            NotesFormat::Text => "txt",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            NotesFormat::Markdown => "text/markdown",
            NotesFormat::Text => "text/plain",
        }
    }
}

impl FromStr for NotesFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md" | "markdown" => Ok(NotesFormat::Markdown),
            "txt" | "text" => Ok(NotesFormat::Text),
            other => Err(format!("unsupported notes format: {}", other)),
        }
    }
}

impl fmt::Display for NotesFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotesExport {
    pub file_name: String,
    pub mime: &'static str,
    pub content: String,
}

/// `notes_<title>` with every non-alphanumeric character replaced by `_`,
/// lowercased. An empty title becomes `notes_export`.
pub fn export_file_name(title: &str, format: NotesFormat) -> String {
    let stem: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let stem = if stem.is_empty() { "export".to_string() } else { stem };
    format!("notes_{}.{}", stem, format.extension())
}

pub fn export(title: &str, notes: &str, format: NotesFormat) -> NotesExport {
    let content = match format {
        NotesFormat::Markdown => notes.to_string(),
        NotesFormat::Text => markdown_to_text(notes),
    };
    NotesExport { file_name: export_file_name(title, format), mime: format.mime(), content }
}

fn text_rules() -> &'static [(Regex, &'static str)] {
    static RULES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    RULES.get_or_init(|| {
        [
            (r"(?m)^ {0,3}#{1,6}[ \t]+", ""),
            (r"!?\[([^\]]*)\]\([^)]*\)", "$1"),
            (r"(?m)^```.*$", ""),
            (r"\*\*|__|`", ""),
            (r"[ \t]*\n[ \t]*", "\n"),
            (r"\n{3,}", "\n\n"),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
        .collect()
    })
}

/// Plain-text rendition of Markdown notes: headings, emphasis markers, code
/// fences and link targets are dropped, blank runs collapse to one line.
pub fn markdown_to_text(notes: &str) -> String {
    let mut text = notes.replace("\r\n", "\n");
    for (pattern, replacement) in text_rules() {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_is_sanitized() {
        assert_eq!(export_file_name("Cell Division: Mitosis!", NotesFormat::Markdown), "notes_cell_division__mitosis_.md");
        assert_eq!(export_file_name("", NotesFormat::Text), "notes_export.txt");
    }

    #[test]
    fn test_markdown_export_is_verbatim() {
        let notes = "# Cells\n\n**Mitosis** splits cells.";
        let export = export("Cells", notes, NotesFormat::Markdown);
        assert_eq!(export.content, notes);
        assert_eq!(export.mime, "text/markdown");
    }

    #[test]
    fn test_text_export_strips_markup() {
        let notes = "# Cells\r\n\r\n\r\n\r\n  **Mitosis** makes `two` cells.  \n## See [docs](https://example.com)\n```\ncode\n```";
        assert_eq!(markdown_to_text(notes), "Cells\n\nMitosis makes two cells.\nSee docs\n\ncode");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("MD".parse::<NotesFormat>(), Ok(NotesFormat::Markdown));
        assert_eq!("txt".parse::<NotesFormat>(), Ok(NotesFormat::Text));
        assert!("pdf".parse::<NotesFormat>().is_err());
    }
}
