//! Byte-preserving model of one top-level YAML mapping keyed by version
//!
//! Both recipe files keep their pins in block-style mappings (`versions:` in
//! config.yml, `sources:` and `patches:` in conandata.yml). A file is split
//! into three parts so untouched bytes survive a round-trip:
//! - head: everything up to and including the section line
//! - one block per version entry (key line, field lines, trailing blanks/comments)
//! - tail: everything after the mapping

use crate::error::ManifestError;
use crate::version::Version;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static KEY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\s+)(?:"([^"]+)"|'([^']+)'|([^\s"'#:][^:#]*?))\s*:\s*(#.*)?$"#)
        .expect("valid key regex")
});

/// Quoting used for version keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    Double,
    Single,
    Plain,
}

impl Quote {
    fn wrap(&self, key: &str) -> String {
        match self {
            Quote::Double => format!("\"{}\"", key),
            Quote::Single => format!("'{}'", key),
            Quote::Plain => key.to_string(),
        }
    }
}

/// Text of one version entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EntryBlock {
    /// Unquoted version key
    pub key: String,
    /// Key line and field lines
    pub body: String,
    /// Blank and comment lines following the entry
    pub trailer: String,
}

/// Byte-preserving layout of a version-keyed mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MappingLayout {
    head: String,
    pub blocks: Vec<EntryBlock>,
    tail: String,
    indent: String,
    field_indent: String,
    quote: Quote,
    newline: &'static str,
}

impl MappingLayout {
    /// Split `content` around the block-style `section:` mapping
    pub fn parse(path: &Path, content: &str, section: &str) -> Result<Self, ManifestError> {
        Self::find(path, content, section)?.ok_or_else(|| {
            ManifestError::unsupported_layout(
                path,
                format!("missing block-style `{}:` mapping", section),
            )
        })
    }

    /// Like `parse`, but a missing or flow-style section yields None
    pub fn find(path: &Path, content: &str, section: &str) -> Result<Option<Self>, ManifestError> {
        let section_line = Regex::new(&format!(r"^{}:\s*(#.*)?$", regex::escape(section)))
            .map_err(|e| ManifestError::unsupported_layout(path, e.to_string()))?;
        let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };
        let lines: Vec<&str> = content.split_inclusive('\n').collect();

        let Some(section_idx) = lines
            .iter()
            .position(|line| section_line.is_match(strip_eol(line)))
        else {
            return Ok(None);
        };

        let mut layout = MappingLayout {
            head: lines[..=section_idx].concat(),
            blocks: Vec::new(),
            tail: String::new(),
            indent: String::new(),
            field_indent: String::new(),
            quote: Quote::Double,
            newline,
        };

        let mut idx = section_idx + 1;
        while idx < lines.len() {
            let line = lines[idx];
            let text = strip_eol(line);
            let trimmed = text.trim_start();

            if trimmed.is_empty() || trimmed.starts_with('#') {
                match layout.blocks.last_mut() {
                    Some(block) => block.trailer.push_str(line),
                    None => layout.head.push_str(line),
                }
                idx += 1;
                continue;
            }

            let indent = &text[..text.len() - trimmed.len()];
            if indent.is_empty() {
                break;
            }

            if layout.blocks.is_empty() {
                layout.indent = indent.to_string();
            }

            // list items may sit at the key's own indentation
            let field = indent.len() > layout.indent.len()
                || (indent == layout.indent && trimmed.starts_with('-'));

            if indent == layout.indent && !field {
                let caps = KEY_LINE.captures(text).ok_or_else(|| {
                    ManifestError::unsupported_layout(
                        path,
                        format!("line {} is not a version key", idx + 1),
                    )
                })?;
                let (key, quote) = if let Some(m) = caps.get(2) {
                    (m.as_str(), Quote::Double)
                } else if let Some(m) = caps.get(3) {
                    (m.as_str(), Quote::Single)
                } else {
                    let m = caps.get(4).ok_or_else(|| {
                        ManifestError::unsupported_layout(path, "empty version key")
                    })?;
                    (m.as_str(), Quote::Plain)
                };
                if layout.blocks.is_empty() {
                    layout.quote = quote;
                }
                layout.blocks.push(EntryBlock {
                    key: key.trim().to_string(),
                    body: line.to_string(),
                    trailer: String::new(),
                });
            } else if field && indent.starts_with(&layout.indent) {
                let block = layout.blocks.last_mut().ok_or_else(|| {
                    ManifestError::unsupported_layout(path, "field outside of a version entry")
                })?;
                if layout.field_indent.is_empty() && indent != layout.indent {
                    layout.field_indent = indent.to_string();
                }
                let trailer = std::mem::take(&mut block.trailer);
                block.body.push_str(&trailer);
                block.body.push_str(line);
            } else {
                return Err(ManifestError::unsupported_layout(
                    path,
                    format!("inconsistent indentation at line {}", idx + 1),
                ));
            }
            idx += 1;
        }

        layout.tail = lines[idx..].concat();

        if layout.indent.is_empty() {
            layout.indent = "  ".to_string();
        }
        if layout.field_indent.is_empty() {
            layout.field_indent = format!("{}  ", layout.indent);
        }

        Ok(Some(layout))
    }

    /// Serialize back to text
    pub fn render(&self) -> String {
        let mut out = self.head.clone();
        for block in &self.blocks {
            out.push_str(&block.body);
            out.push_str(&block.trailer);
        }
        out.push_str(&self.tail);
        out
    }

    /// Block with the given key
    pub fn block(&self, key: &str) -> Option<&EntryBlock> {
        self.blocks.iter().find(|b| b.key == key)
    }

    /// Whether `key` is present
    pub fn contains(&self, key: &str) -> bool {
        self.block(key).is_some()
    }

    /// Render an entry in this file's style; field values are written as given
    pub fn render_entry(&self, key: &str, fields: &[(&str, String)]) -> String {
        let nl = self.newline;
        let mut body = format!("{}{}:{}", self.indent, self.quote.wrap(key), nl);
        for (name, value) in fields {
            body.push_str(&format!("{}{}: {}{}", self.field_indent, name, value, nl));
        }
        body
    }

    /// Copy of an existing block's body under a new key
    pub fn rekey(&self, block: &EntryBlock, key: &str) -> String {
        let mut lines = block.body.split_inclusive('\n');
        let mut body = format!("{}{}:{}", self.indent, self.quote.wrap(key), self.newline);
        lines.next();
        for line in lines {
            body.push_str(line);
        }
        if !body.ends_with('\n') {
            body.push_str(self.newline);
        }
        body
    }

    /// Index at which `version` keeps the mapping's sort direction
    ///
    /// The mapping counts as ascending only when its first key is older than
    /// its last one; otherwise new keys go before the first older key.
    pub fn position_for(&self, version: &Version) -> usize {
        let keys: Vec<Version> = self.blocks.iter().map(|b| Version::parse(&b.key)).collect();
        let ascending = match (keys.first(), keys.last()) {
            (Some(first), Some(last)) => first < last,
            _ => true,
        };
        let position = if ascending {
            keys.iter().position(|k| k > version)
        } else {
            keys.iter().position(|k| k < version)
        };
        position.unwrap_or(keys.len())
    }

    /// Insert a new block at `index`
    pub fn insert(&mut self, index: usize, key: &str, body: String) {
        let index = index.min(self.blocks.len());
        let mut trailer = String::new();

        if index > 0 {
            let prev = &mut self.blocks[index - 1];
            if prev.trailer.is_empty() && !prev.body.ends_with('\n') {
                prev.body.push_str(self.newline);
            } else if !prev.trailer.is_empty() && !prev.trailer.ends_with('\n') {
                prev.trailer.push_str(self.newline);
            }
            if index == self.blocks.len() {
                trailer = std::mem::take(&mut self.blocks[index - 1].trailer);
            }
        } else if !self.head.ends_with('\n') {
            self.head.push_str(self.newline);
        }

        self.blocks.insert(
            index,
            EntryBlock {
                key: key.to_string(),
                body,
                trailer,
            },
        );
    }
}

fn strip_eol(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}
