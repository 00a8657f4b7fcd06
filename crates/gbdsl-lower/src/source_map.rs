//! Source mapping: emitted C line → authoring location.
//!
//! Each entry maps the first emitted line of a recorded statement back to
//! the authoring call that produced it, so a toolchain error or a debugger
//! line can be resolved to game code.

use gbdsl_ir::SourceLocation;
use serde::{Deserialize, Serialize};

/// A complete source map for one generated file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMap {
    pub entries: Vec<SourceMapEntry>,
}

/// A single source map entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMapEntry {
    /// 1-based line in the generated source.
    pub emitted_line: u32,
    pub origin_file: String,
    pub origin_line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_column: Option<u32>,
    /// Enclosing generated function (e.g. "scene_title_frame").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Push a new entry.
    pub fn push(&mut self, emitted_line: u32, origin: &SourceLocation, symbol: Option<&str>) {
        self.entries.push(SourceMapEntry {
            emitted_line,
            origin_file: origin.file.clone(),
            origin_line: origin.line,
            origin_column: origin.column,
            symbol: symbol.map(str::to_string),
            snippet: origin.snippet.clone(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The entry recorded for exactly this emitted line.
    pub fn find_by_line(&self, line: u32) -> Option<&SourceMapEntry> {
        self.entries.iter().find(|e| e.emitted_line == line)
    }

    /// The closest entry at or before `line`, for lines inside a
    /// multi-line statement.
    pub fn nearest_before(&self, line: u32) -> Option<&SourceMapEntry> {
        self.entries
            .iter()
            .filter(|e| e.emitted_line <= line)
            .max_by_key(|e| e.emitted_line)
    }

    /// Every emitted line that came from an authoring location.
    pub fn find_by_origin(&self, file: &str, line: u32) -> Vec<&SourceMapEntry> {
        self.entries
            .iter()
            .filter(|e| e.origin_file == file && e.origin_line == line)
            .collect()
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Deserialize from JSON bytes.
    pub fn from_json(data: &[u8]) -> Option<Self> {
        serde_json::from_slice(data).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: u32) -> SourceLocation {
        SourceLocation::new("game.rs", line).with_column(9)
    }

    #[test]
    fn round_trip_json() {
        let mut sm = SourceMap::new();
        sm.push(40, &loc(12), Some("scene_title_frame"));
        sm.push(44, &loc(13).with_snippet("score += 1"), None);

        let json = sm.to_json();
        let sm2 = SourceMap::from_json(&json).expect("parse failed");
        assert_eq!(sm2, sm);
        assert_eq!(sm2.entries[1].snippet.as_deref(), Some("score += 1"));
    }

    #[test]
    fn find_by_line_and_origin() {
        let mut sm = SourceMap::new();
        sm.push(40, &loc(12), Some("scene_title_frame"));
        sm.push(52, &loc(12), Some("scene_level_frame"));
        sm.push(60, &loc(20), None);

        assert_eq!(
            sm.find_by_line(40).unwrap().symbol.as_deref(),
            Some("scene_title_frame")
        );
        assert!(sm.find_by_line(41).is_none());
        assert_eq!(sm.nearest_before(55).unwrap().emitted_line, 52);
        assert!(sm.nearest_before(10).is_none());
        assert_eq!(sm.find_by_origin("game.rs", 12).len(), 2);
        assert!(sm.find_by_origin("other.rs", 12).is_empty());
    }
}
