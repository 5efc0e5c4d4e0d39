//! Sectioned `key=value` documents
//!
//! The format behind state snapshots and excluded-words lists:
//!
//! ```text
//! # comment
//! [section]
//! key=value
//! ```
//!
//! Keys are trimmed; values are taken verbatim up to the end of the line
//! (a trailing `\r` is dropped) so delimiter sets starting with a space
//! survive. Backslash and newline inside values are escaped as `\\` and
//! `\n`. Sections and keys keep insertion order.

use std::fmt::Write as _;

use thiserror::Error;

/// Malformed document
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfFileError {
    #[error("line {line}: key outside of a section")]
    KeyOutsideSection { line: usize },

    #[error("line {line}: unterminated section header")]
    UnterminatedSection { line: usize },

    #[error("line {line}: expected key=value")]
    MissingSeparator { line: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

/// In-memory sectioned document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    comment: Vec<String>,
    sections: Vec<Section>,
}

impl ConfigDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Result<Self, ConfFileError> {
        let mut document = Self::new();
        let mut current: Option<usize> = None;

        for (index, raw) in text.split('\n').enumerate() {
            let line_no = index + 1;
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if let Some(header) = trimmed.strip_prefix('[') {
                let name = header
                    .trim_end()
                    .strip_suffix(']')
                    .ok_or(ConfFileError::UnterminatedSection { line: line_no })?;
                current = Some(document.section_index(name.trim()));
                continue;
            }
            let slot = current.ok_or(ConfFileError::KeyOutsideSection { line: line_no })?;
            let (key, value) = trimmed
                .split_once('=')
                .ok_or(ConfFileError::MissingSeparator { line: line_no })?;
            let entries = &mut document.sections[slot].entries;
            let key = key.trim().to_string();
            let value = unescape(value);
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => entries.push((key, value)),
            }
        }
        Ok(document)
    }

    /// Comment lines written above the first section
    pub fn set_comment(&mut self, lines: &[&str]) {
        self.comment = lines.iter().map(|l| l.to_string()).collect();
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.comment {
            let _ = writeln!(out, "# {}", line);
        }
        for section in &self.sections {
            if !out.is_empty() {
                out.push('\n');
            }
            let _ = writeln!(out, "[{}]", section.name);
            for (key, value) in &section.entries {
                let _ = writeln!(out, "{}={}", key, escape(value));
            }
        }
        out
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.sections.iter().any(|s| s.name == name)
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.name == section)?
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_parsed<T: std::str::FromStr>(&self, section: &str, key: &str) -> Option<T> {
        self.get(section, key)?.trim().parse().ok()
    }

    pub fn get_bool(&self, section: &str, key: &str) -> Option<bool> {
        match self.get(section, key)?.trim() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        }
    }

    pub fn set(&mut self, section: &str, key: &str, value: impl ToString) {
        let slot = self.section_index(section);
        let value = value.to_string();
        let entries = &mut self.sections[slot].entries;
        match entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => entries.push((key.to_string(), value)),
        }
    }

    fn section_index(&mut self, name: &str) -> usize {
        match self.sections.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.sections.push(Section {
                    name: name.to_string(),
                    entries: Vec::new(),
                });
                self.sections.len() - 1
            }
        }
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\n', "\\n")
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sections_and_values() {
        let text = "# header\n[search.engine]\nminStringLength = 3\nstringDelimiters= |~,\r\n\n[domains]\nlength=2\n";
        let doc = ConfigDocument::parse(text).unwrap();
        assert_eq!(doc.get_parsed::<usize>("search.engine", "minStringLength"), Some(3));
        assert_eq!(doc.get("search.engine", "stringDelimiters"), Some(" |~,"));
        assert_eq!(doc.get_parsed::<usize>("domains", "length"), Some(2));
        assert_eq!(doc.get("domains", "missing"), None);
    }

    #[test]
    fn test_render_then_parse_preserves_escapes() {
        let mut doc = ConfigDocument::new();
        doc.set_comment(&["state snapshot"]);
        doc.set("a", "path", "C:\\data\nnext");
        doc.set("a", "flag", true);
        let text = doc.render();
        assert!(text.starts_with("# state snapshot\n"));
        assert!(text.contains("path=C:\\\\data\\nnext"));

        let parsed = ConfigDocument::parse(&text).unwrap();
        assert_eq!(parsed.get("a", "path"), Some("C:\\data\nnext"));
        assert_eq!(parsed.get_bool("a", "flag"), Some(true));
    }

    #[test]
    fn test_malformed_lines() {
        assert_eq!(
            ConfigDocument::parse("key=value"),
            Err(ConfFileError::KeyOutsideSection { line: 1 })
        );
        assert_eq!(
            ConfigDocument::parse("[open\nkey=value"),
            Err(ConfFileError::UnterminatedSection { line: 1 })
        );
        assert_eq!(
            ConfigDocument::parse("[s]\nnovalue"),
            Err(ConfFileError::MissingSeparator { line: 2 })
        );
    }

    #[test]
    fn test_set_overwrites_in_place() {
        let mut doc = ConfigDocument::new();
        doc.set("s", "k", 1);
        doc.set("s", "k", 2);
        assert_eq!(doc.get("s", "k"), Some("2"));
        assert_eq!(doc.render(), "[s]\nk=2\n");
    }
}
