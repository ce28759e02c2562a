//
// metadata.rs
//
// Structural metadata consumed by the parser, and a line-based extractor
//

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Inclusive, zero-based line range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineSpan {
    pub start: usize,
    pub end: usize,
}

impl LineSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn contains_line(&self, line: usize) -> bool {
        self.start <= line && line <= self.end
    }

    pub fn covers(&self, other: &LineSpan) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingInfo {
    pub heading: String,
    pub level: u8,
    pub line: usize,
}

/// A typed span of the document: "heading", "callout", "math", "paragraph", ...
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSpan {
    #[serde(rename = "type")]
    pub kind: String,
    pub position: LineSpan,
    /// Stable block id declared with a trailing `^id` marker
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOccurrence {
    /// Link target as written, e.g. `notes/a#^eq1`
    pub link: String,
    pub display: Option<String>,
    pub line: usize,
    pub embed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontmatterLink {
    pub link: String,
    pub display: Option<String>,
}

/// Everything the parser needs to know about a document's structure besides its text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub headings: Vec<HeadingInfo>,
    pub sections: Vec<BlockSpan>,
    pub links: Vec<LinkOccurrence>,
    pub frontmatter_links: Vec<FrontmatterLink>,
}

// ============================================================================
// Line-based extractor
// ============================================================================

struct Patterns {
    heading: Regex,
    fence: Regex,
    list_item: Regex,
    trailing_block_id: Regex,
    lone_block_id: Regex,
    wikilink: Regex,
    markdown_link: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        heading: Regex::new(r"^(#{1,6})\s+(.*?)\s*#*\s*$").unwrap(),
        fence: Regex::new(r"^\s*(```|~~~)").unwrap(),
        list_item: Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s").unwrap(),
        trailing_block_id: Regex::new(r"\s\^([A-Za-z0-9-]+)\s*$").unwrap(),
        lone_block_id: Regex::new(r"^\s*\^([A-Za-z0-9-]+)\s*$").unwrap(),
        wikilink: Regex::new(r"(!?)\[\[([^\]\|]+?)(?:\|([^\]]*))?\]\]").unwrap(),
        markdown_link: Regex::new(r"(!?)\[([^\]]*)\]\(([^)\s]+?\.md(?:#[^)\s]*)?)\)").unwrap(),
    })
}

fn collect_links(line: &str, line_no: usize, out: &mut Vec<LinkOccurrence>) {
    let pats = patterns();
    for caps in pats.wikilink.captures_iter(line) {
        out.push(LinkOccurrence {
            link: caps[2].trim().to_string(),
            display: caps.get(3).map(|m| m.as_str().trim().to_string()),
            line: line_no,
            embed: !caps[1].is_empty(),
        });
    }
    for caps in pats.markdown_link.captures_iter(line) {
        out.push(LinkOccurrence {
            link: caps[3].replace("%20", " "),
            display: Some(caps[2].to_string()).filter(|d| !d.is_empty()),
            line: line_no,
            embed: !caps[1].is_empty(),
        });
    }
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn is_quote(line: &str) -> bool {
    line.trim_start().starts_with('>')
}

/// Extract structural metadata from markdown text.
///
/// Recognizes front matter, ATX headings, fenced code, `$$` display math,
/// callouts and block quotes, lists and paragraphs. A block id is taken
/// from a trailing ` ^id` on the block's last line, or from a `^id` line
/// following the block after at most one blank line.
pub fn extract_metadata(text: &str) -> FileMetadata {
    let pats = patterns();
    let lines: Vec<&str> = text.lines().collect();
    let mut meta = FileMetadata::default();
    let mut i = 0;

    if lines.first().map(|l| l.trim_end()) == Some("---") {
        if let Some(close) = lines.iter().skip(1).position(|l| l.trim_end() == "---") {
            let end = close + 1;
            let mut links = Vec::new();
            for (n, line) in lines[1..end].iter().enumerate() {
                collect_links(line, n + 1, &mut links);
            }
            meta.frontmatter_links = links
                .into_iter()
                .map(|l| FrontmatterLink {
                    link: l.link,
                    display: l.display,
                })
                .collect();
            meta.sections.push(BlockSpan {
                kind: "yaml".to_string(),
                position: LineSpan::new(0, end),
                id: None,
            });
            i = end + 1;
        }
    }

    while i < lines.len() {
        let line = lines[i];
        if is_blank(line) {
            i += 1;
            continue;
        }

        if let Some(caps) = pats.lone_block_id.captures(line) {
            // `^id` on its own line labels the preceding block
            if let Some(prev) = meta.sections.last_mut() {
                if prev.id.is_none() && prev.kind != "heading" && prev.kind != "yaml" {
                    prev.id = Some(caps[1].to_string());
                    i += 1;
                    continue;
                }
            }
        }

        let start = i;
        let kind;
        if let Some(caps) = pats.heading.captures(line) {
            meta.headings.push(HeadingInfo {
                heading: caps[2].to_string(),
                level: caps[1].len() as u8,
                line: i,
            });
            kind = "heading";
        } else if let Some(caps) = pats.fence.captures(line) {
            let marker = caps[1].to_string();
            let mut j = i + 1;
            while j < lines.len() && !lines[j].trim_start().starts_with(&marker) {
                j += 1;
            }
            i = j.min(lines.len() - 1);
            kind = "code";
        } else if line.trim_start().starts_with("$$") {
            let rest = &line.trim_start()[2..];
            if !rest.contains("$$") {
                let mut j = i + 1;
                while j < lines.len() && !lines[j].contains("$$") {
                    j += 1;
                }
                i = j.min(lines.len() - 1);
            }
            kind = "math";
        } else if is_quote(line) {
            while i + 1 < lines.len() && is_quote(lines[i + 1]) {
                i += 1;
            }
            kind = if line.trim_start().trim_start_matches('>').trim_start().starts_with("[!") {
                "callout"
            } else {
                "blockquote"
            };
        } else if pats.list_item.is_match(line) {
            while i + 1 < lines.len()
                && !is_blank(lines[i + 1])
                && (pats.list_item.is_match(lines[i + 1]) || lines[i + 1].starts_with(&[' ', '\t'][..]))
            {
                i += 1;
            }
            kind = "list";
        } else {
            while i + 1 < lines.len()
                && !is_blank(lines[i + 1])
                && !pats.heading.is_match(lines[i + 1])
                && !pats.fence.is_match(lines[i + 1])
                && !lines[i + 1].trim_start().starts_with("$$")
                && !is_quote(lines[i + 1])
                && !pats.list_item.is_match(lines[i + 1])
            {
                i += 1;
            }
            kind = "paragraph";
        }

        let end = i;
        let id = if kind == "heading" {
            None
        } else {
            pats.trailing_block_id
                .captures(lines[end])
                .map(|caps| caps[1].to_string())
        };
        meta.sections.push(BlockSpan {
            kind: kind.to_string(),
            position: LineSpan::new(start, end),
            id,
        });
        if kind != "code" {
            for (n, line) in lines[start..=end].iter().enumerate() {
                collect_links(line, start + n, &mut meta.links);
            }
        }
        i += 1;
    }

    meta
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(meta: &FileMetadata) -> Vec<(&str, usize, usize)> {
        meta.sections
            .iter()
            .map(|s| (s.kind.as_str(), s.position.start, s.position.end))
            .collect()
    }

    #[test]
    fn test_headings_and_paragraphs() {
        let text = "# Title\nintro line\nmore intro\n\n## Part ##\ntext\n";
        let meta = extract_metadata(text);
        assert_eq!(
            meta.headings,
            vec![
                HeadingInfo { heading: "Title".into(), level: 1, line: 0 },
                HeadingInfo { heading: "Part".into(), level: 2, line: 4 },
            ]
        );
        assert_eq!(
            kinds(&meta),
            vec![("heading", 0, 0), ("paragraph", 1, 2), ("heading", 4, 4), ("paragraph", 5, 5)]
        );
    }

    #[test]
    fn test_math_and_block_ids() {
        let text = "$$\nx = 1 \\tag{A}\n$$\n\n^eq-a\n\n$$ y = 2 $$ ^eq-b\n";
        let meta = extract_metadata(text);
        assert_eq!(kinds(&meta), vec![("math", 0, 2), ("math", 6, 6)]);
        assert_eq!(meta.sections[0].id.as_deref(), Some("eq-a"));
        assert_eq!(meta.sections[1].id.as_deref(), Some("eq-b"));
    }

    #[test]
    fn test_callouts_and_quotes() {
        let text = "> [!thm] Title\n> body\n\n> just a quote\n";
        let meta = extract_metadata(text);
        assert_eq!(kinds(&meta), vec![("callout", 0, 1), ("blockquote", 3, 3)]);
    }

    #[test]
    fn test_code_fence_hides_headings_and_links() {
        let text = "```\n# not a heading [[x]]\n```\nafter [[y]]\n";
        let meta = extract_metadata(text);
        assert!(meta.headings.is_empty());
        assert_eq!(kinds(&meta), vec![("code", 0, 2), ("paragraph", 3, 3)]);
        assert_eq!(meta.links.len(), 1);
        assert_eq!(meta.links[0].link, "y");
    }

    #[test]
    fn test_links() {
        let text = "See [[a#^eq1|eq]] and ![[b]] and [c](notes/c%20d.md#^x).\n";
        let meta = extract_metadata(text);
        let links: Vec<_> = meta
            .links
            .iter()
            .map(|l| (l.link.as_str(), l.display.as_deref(), l.embed))
            .collect();
        assert_eq!(
            links,
            vec![
                ("a#^eq1", Some("eq"), false),
                ("b", None, true),
                ("notes/c d.md#^x", Some("c"), false),
            ]
        );
    }

    #[test]
    fn test_frontmatter_links() {
        let text = "---\nup: \"[[index]]\"\n---\nbody\n";
        let meta = extract_metadata(text);
        assert_eq!(meta.frontmatter_links.len(), 1);
        assert_eq!(meta.frontmatter_links[0].link, "index");
        assert!(meta.links.is_empty());
        assert_eq!(kinds(&meta), vec![("yaml", 0, 2), ("paragraph", 3, 3)]);
    }

    #[test]
    fn test_lists() {
        let text = "- a\n  continued\n- b\n\npara\n";
        let meta = extract_metadata(text);
        assert_eq!(kinds(&meta), vec![("list", 0, 2), ("paragraph", 4, 4)]);
    }
}
