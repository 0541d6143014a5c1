use serde::{Deserialize, Serialize};

/// One page pulled from the dump stream: identity, latest revision timestamp
/// (epoch seconds), and raw wikitext. Owned by the reader until a worker
/// consumes it.
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub title: String,
    pub timestamp: Option<f64>,
    pub source: String,
}

/// One section of a document. `sub_sections` are exactly one heading level
/// deeper than the node itself, mirroring the heading nesting of the markup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionNode {
    pub title: String,
    pub leading: String,
    pub sub_sections: Vec<SectionNode>,
}

/// Title-only mirror of a [`SectionNode`], same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocNode {
    pub title: String,
    #[serde(rename = "sub")]
    pub sub: Vec<TocNode>,
}

/// Everything the markup transform produces for a page, minus its identity.
///
/// Field names are renamed on the wire (`subSections`, `redirectedTo`) to stay
/// byte-compatible with stores written by earlier versions of this tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentBody {
    pub leading: String,
    pub infobox: Option<String>,
    pub toc: Vec<TocNode>,
    pub sub_sections: Vec<SectionNode>,
    pub references: Vec<String>,
    pub redirected_to: Option<String>,
}

/// A fully structured page as persisted to the shard files, one JSON object
/// per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredDocument {
    pub title: String,
    pub timestamp: Option<f64>,
    #[serde(flatten)]
    pub body: DocumentBody,
}

/// Exact position of a record: shard directory, file within it, and the
/// 0-based line inside that file. Serialized as `[dir, file, line]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u32, u32, u64)", into = "(u32, u32, u64)")]
pub struct StorageLocation {
    pub dir_id: u32,
    pub file_id: u32,
    pub line: u64,
}

impl From<(u32, u32, u64)> for StorageLocation {
    fn from((dir_id, file_id, line): (u32, u32, u64)) -> Self {
        Self {
            dir_id,
            file_id,
            line,
        }
    }
}

impl From<StorageLocation> for (u32, u32, u64) {
    fn from(loc: StorageLocation) -> Self {
        (loc.dir_id, loc.file_id, loc.line)
    }
}

/// Rotation state of the currently open shard file. `byte_size` equals the
/// file's length on disk (line terminators included), which lets a resumed run
/// truncate away a partial trailing line before appending.
/// Serialized as `[dir, file, bytes, lines]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u32, u32, u64, u64)", into = "(u32, u32, u64, u64)")]
pub struct Progress {
    pub dir_id: u32,
    pub file_id: u32,
    pub byte_size: u64,
    pub line_count: u64,
}

impl From<(u32, u32, u64, u64)> for Progress {
    fn from((dir_id, file_id, byte_size, line_count): (u32, u32, u64, u64)) -> Self {
        Self {
            dir_id,
            file_id,
            byte_size,
            line_count,
        }
    }
}

impl From<Progress> for (u32, u32, u64, u64) {
    fn from(p: Progress) -> Self {
        (p.dir_id, p.file_id, p.byte_size, p.line_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_location_serializes_as_array() {
        let loc = StorageLocation {
            dir_id: 1,
            file_id: 12,
            line: 345,
        };
        let json = serde_json::to_string(&loc).unwrap();
        assert_eq!(json, "[1,12,345]");
        let back: StorageLocation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, loc);
    }

    #[test]
    fn progress_serializes_as_array() {
        let p = Progress {
            dir_id: 0,
            file_id: 3,
            byte_size: 4096,
            line_count: 17,
        };
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "[0,3,4096,17]");
        let back: Progress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn document_uses_compatible_field_names() {
        let doc = StructuredDocument {
            title: "A".to_string(),
            timestamp: Some(1700000000.0),
            body: DocumentBody {
                leading: "lead".to_string(),
                infobox: None,
                toc: vec![TocNode {
                    title: "S".to_string(),
                    sub: vec![],
                }],
                sub_sections: vec![SectionNode {
                    title: "S".to_string(),
                    leading: "== S ==".to_string(),
                    sub_sections: vec![],
                }],
                references: vec![],
                redirected_to: Some("B".to_string()),
            },
        };
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("\"subSections\""));
        assert!(json.contains("\"redirectedTo\":\"B\""));
        assert!(json.contains("\"sub\":[]"));
        assert!(!json.contains("sub_sections"));
    }

    #[test]
    fn document_roundtrips_through_json() {
        let doc = StructuredDocument {
            title: "Page".to_string(),
            timestamp: None,
            body: DocumentBody {
                leading: "text".to_string(),
                infobox: Some("{{Infobox x}}".to_string()),
                toc: vec![],
                sub_sections: vec![],
                references: vec!["<ref>a</ref>".to_string()],
                redirected_to: None,
            },
        };
        let json = serde_json::to_string(&doc).unwrap();
        let back: StructuredDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }
}
