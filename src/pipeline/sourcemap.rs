// src/pipeline/sourcemap.rs

//! Line-granular Source Map v3 support.
//!
//! Maps are tracked per generated line: each line points at a line of one of
//! the original sources, or at nothing. That is enough for concatenation to
//! stay exact; transforms that reshape a file collapse its map to file-level
//! precision (every line points at the first line of the first source).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

use crate::pipeline::stage::{Stage, StageContext, TransformError};
use crate::pipeline::Asset;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMap {
    pub sources: Vec<String>,
    pub sources_content: Vec<String>,
    /// One entry per generated line: `(source index, original line)`.
    pub lines: Vec<Option<(u32, u32)>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceMapJson<'a> {
    version: u8,
    file: &'a str,
    sources: &'a [String],
    sources_content: &'a [String],
    names: [&'a str; 0],
    mappings: String,
}

pub fn line_count(text: &str) -> usize {
    text.split('\n').count()
}

impl SourceMap {
    /// Map where generated line `n` is line `n` of `source`.
    pub fn identity(source: impl Into<String>, content: &str) -> Self {
        let n = line_count(content) as u32;
        Self {
            sources: vec![source.into()],
            sources_content: vec![content.to_string()],
            lines: (0..n).map(|l| Some((0, l))).collect(),
        }
    }

    /// Adjust to new generated content of `new_lines` lines.
    pub fn realign(&mut self, new_lines: usize) {
        if new_lines == self.lines.len() {
            return;
        }
        let anchor = if self.sources.is_empty() { None } else { Some((0, 0)) };
        self.lines = vec![anchor; new_lines];
    }

    /// Concatenate per-file maps in order. `parts` pairs each file's map (if
    /// any) with its generated line count.
    pub fn concat(parts: &[(Option<&SourceMap>, usize)]) -> Self {
        let mut out = SourceMap {
            sources: Vec::new(),
            sources_content: Vec::new(),
            lines: Vec::new(),
        };
        for (map, count) in parts {
            match map {
                Some(map) => {
                    let offset = out.sources.len() as u32;
                    out.sources.extend(map.sources.iter().cloned());
                    out.sources_content.extend(map.sources_content.iter().cloned());
                    out.lines.extend(
                        map.lines
                            .iter()
                            .map(|l| l.map(|(src, line)| (src + offset, line))),
                    );
                    // Guard against maps that drifted from their content.
                    out.lines.resize(out.lines.len() + count.saturating_sub(map.lines.len()), None);
                }
                None => out.lines.extend(std::iter::repeat_n(None, *count)),
            }
        }
        out
    }

    /// The `mappings` field: one segment at column 0 per mapped line.
    pub fn mappings(&self) -> String {
        let mut out = String::new();
        let mut prev_src: i64 = 0;
        let mut prev_line: i64 = 0;
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                out.push(';');
            }
            if let Some((src, orig)) = line {
                let (src, orig) = (*src as i64, *orig as i64);
                encode_vlq(&mut out, 0);
                encode_vlq(&mut out, src - prev_src);
                encode_vlq(&mut out, orig - prev_line);
                encode_vlq(&mut out, 0);
                prev_src = src;
                prev_line = orig;
            }
        }
        out
    }

    pub fn to_json(&self, file: &str) -> String {
        let json = SourceMapJson {
            version: 3,
            file,
            sources: &self.sources,
            sources_content: &self.sources_content,
            names: [],
            mappings: self.mappings(),
        };
        // Serialising plain strings cannot fail.
        serde_json::to_string(&json).unwrap_or_default()
    }
}

const BASE64_CHARS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Base64 VLQ encoding as used by the Source Map v3 format.
pub fn encode_vlq(out: &mut String, value: i64) {
    let mut v: u64 = if value < 0 {
        ((-value as u64) << 1) | 1
    } else {
        (value as u64) << 1
    };
    loop {
        let mut digit = (v & 0b11111) as usize;
        v >>= 5;
        if v > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64_CHARS[digit] as char);
        if v == 0 {
            break;
        }
    }
}

/// `sourcemap-init`: attach an identity map to every asset.
#[derive(Debug, Default)]
pub struct SourceMapInit;

impl Stage for SourceMapInit {
    fn name(&self) -> &'static str {
        "sourcemap-init"
    }

    fn apply(&self, assets: Vec<Asset>, _ctx: &StageContext<'_>) -> Result<Vec<Asset>, TransformError> {
        assets
            .into_iter()
            .map(|mut asset| {
                let rel = asset.relative_str();
                let map = SourceMap::identity(rel, asset.text(self.name())?);
                asset.source_map = Some(map);
                Ok(asset)
            })
            .collect()
    }
}

/// `sourcemap-write`: inline the map as a trailing comment.
#[derive(Debug, Default)]
pub struct SourceMapWrite;

impl Stage for SourceMapWrite {
    fn name(&self) -> &'static str {
        "sourcemap-write"
    }

    fn apply(&self, assets: Vec<Asset>, _ctx: &StageContext<'_>) -> Result<Vec<Asset>, TransformError> {
        assets
            .into_iter()
            .map(|mut asset| {
                let Some(map) = asset.source_map.take() else {
                    return Ok(asset);
                };
                let file = asset.file_name();
                let encoded = STANDARD.encode(map.to_json(&file));
                let url = format!("sourceMappingURL=data:application/json;charset=utf8;base64,{encoded}");
                let comment = if asset.extension() == "css" {
                    format!("\n/*# {url} */\n")
                } else {
                    format!("\n//# {url}\n")
                };
                let mut text = asset.text(self.name())?.to_string();
                text.push_str(&comment);
                asset.contents = Some(text.into_bytes());
                Ok(asset)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vlq(v: i64) -> String {
        let mut s = String::new();
        encode_vlq(&mut s, v);
        s
    }

    #[test]
    fn vlq_matches_reference_values() {
        assert_eq!(vlq(0), "A");
        assert_eq!(vlq(1), "C");
        assert_eq!(vlq(-1), "D");
        assert_eq!(vlq(15), "e");
        assert_eq!(vlq(16), "gB");
        assert_eq!(vlq(-17), "jB");
    }

    #[test]
    fn identity_map_encodes_one_segment_per_line() {
        let map = SourceMap::identity("a.js", "x\ny\nz");
        assert_eq!(map.mappings(), "AAAA;AACA;AACA");
    }

    #[test]
    fn concat_offsets_sources_and_keeps_unmapped_lines() {
        let a = SourceMap::identity("a.js", "a1\na2");
        let b = SourceMap::identity("b.js", "b1");
        let merged = SourceMap::concat(&[(Some(&a), 2), (None, 1), (Some(&b), 1)]);
        assert_eq!(merged.sources, vec!["a.js", "b.js"]);
        assert_eq!(
            merged.lines,
            vec![Some((0, 0)), Some((0, 1)), None, Some((1, 0))]
        );
        assert_eq!(merged.mappings(), "AAAA;AACA;;ACDA");
    }

    #[test]
    fn realign_collapses_when_line_count_changes() {
        let mut map = SourceMap::identity("a.scss", "a\nb\nc");
        map.realign(3);
        assert_eq!(map.lines[2], Some((0, 2)));
        map.realign(1);
        assert_eq!(map.lines, vec![Some((0, 0))]);
    }
}
