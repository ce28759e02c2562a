//
// parser.rs
//
// Builds the page -> section -> block tree from text and structural metadata
//

use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;

use crate::link::{basename, Link};
use crate::metadata::{BlockSpan, FileMetadata, LineSpan};
use crate::model::{Block, BlockKind, EquationBlock, Page, Section, TheoremBlock};
use crate::theorem::parse_theorem_callout;

struct BodyPatterns {
    math: Regex,
    tag: Regex,
    main_comment: Regex,
    meta_comment: Regex,
    latex_comment: Regex,
}

fn patterns() -> &'static BodyPatterns {
    static PATTERNS: OnceLock<BodyPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| BodyPatterns {
        math: Regex::new(r"(?s)\$\$(.*)\$\$").unwrap(),
        tag: Regex::new(r"\\tag\{(.*)\}").unwrap(),
        main_comment: Regex::new(r"(?i)%%\s*main\s*%%").unwrap(),
        meta_comment: Regex::new(r"%%\s*(label|display)\s*:\s*(.*?)\s*%%").unwrap(),
        latex_comment: Regex::new(r"(?m)^\s*%\s*(label|display)\s*:\s*(.*?)\s*$").unwrap(),
    })
}

/// Strip the `$$` delimiters from display math.
pub fn trim_math_text(text: &str) -> String {
    match patterns().math.captures(text) {
        Some(caps) => caps[1].trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Contents of the first `\tag{...}` in the math, if any
pub fn manual_tag(math: &str) -> Option<String> {
    patterns()
        .tag
        .captures(math)
        .map(|caps| caps[1].trim().to_string())
}

fn add_link(links: &mut Vec<Link>, link: Link) {
    if !links.contains(&link) {
        links.push(link);
    }
}

fn slice_lines(lines: &[&str], span: LineSpan) -> String {
    if span.start >= lines.len() {
        return String::new();
    }
    let end = span.end.min(lines.len() - 1);
    lines[span.start..=end].join("\n")
}

fn read_comment_metadata(regex: &Regex, body: &str) -> (Option<String>, Option<String>) {
    let mut label = None;
    let mut display = None;
    for caps in regex.captures_iter(body) {
        let value = caps[2].to_string();
        match &caps[1] {
            "label" => label = Some(value),
            _ => display = Some(value),
        }
    }
    (label, display)
}

fn make_block(path: &str, ordinal: usize, span: &BlockSpan, lines: &[&str]) -> Block {
    let pats = patterns();
    let text = slice_lines(lines, span.position);

    let kind = match span.kind.as_str() {
        "math" => {
            let math = trim_math_text(&text);
            let tag = manual_tag(&math);
            let (label, display) = read_comment_metadata(&pats.latex_comment, &math);
            let mut equation = EquationBlock::new(math, tag);
            equation.label = label;
            equation.display = display;
            BlockKind::Equation(equation)
        }
        "callout" => {
            let header = lines.get(span.position.start).copied().unwrap_or_default();
            match parse_theorem_callout(header) {
                Ok(Some(settings)) => {
                    let mut theorem = TheoremBlock::new(settings);
                    theorem.main = pats.main_comment.is_match(&text);
                    let (label, display) = read_comment_metadata(&pats.meta_comment, &text);
                    theorem.label = label;
                    theorem.display = display;
                    BlockKind::Theorem(theorem)
                }
                Ok(None) => BlockKind::Generic,
                Err(err) => {
                    log::debug!(
                        "Treating callout at {}:{} as a plain block: {}",
                        path,
                        span.position.start,
                        err
                    );
                    BlockKind::Generic
                }
            }
        }
        _ => BlockKind::Generic,
    };

    Block {
        id: Block::make_id(path, ordinal),
        file: path.to_string(),
        ordinal,
        position: span.position,
        links: Vec::new(),
        block_id: span.id.clone(),
        block_type: span.kind.clone(),
        kind,
        parent: None,
        revision: 0,
    }
}

fn derive_sections(path: &str, lines: &[&str], metadata: &FileMetadata) -> Vec<Section> {
    let last_line = lines.len().saturating_sub(1);
    let mut headings = metadata.headings.clone();
    headings.sort_by_key(|h| h.line);

    let section = |ordinal: usize, title: String, level: u8, position: LineSpan| Section {
        id: Section::make_id(path, ordinal, &title),
        file: path.to_string(),
        ordinal,
        title,
        level,
        position,
        links: Vec::new(),
        blocks: Vec::new(),
        block_ids: Vec::new(),
        parent: None,
        revision: 0,
    };

    let mut sections = Vec::with_capacity(headings.len() + 1);

    let preamble_end = match headings.first() {
        Some(first) if first.line == 0 => None,
        Some(first) => Some(first.line - 1),
        None if lines.is_empty() => None,
        None => Some(last_line),
    };
    if let Some(end) = preamble_end.filter(|_| !lines.is_empty()) {
        let end = end.min(last_line);
        if lines[..=end].iter().any(|l| !l.trim().is_empty()) {
            sections.push(section(0, basename(path).to_string(), 1, LineSpan::new(0, end)));
        }
    }

    for (i, heading) in headings.iter().enumerate() {
        let end = match headings.get(i + 1) {
            Some(next) => next.line.saturating_sub(1).max(heading.line),
            None => last_line.max(heading.line),
        };
        sections.push(section(
            i + 1,
            heading.heading.clone(),
            heading.level,
            LineSpan::new(heading.line, end),
        ));
    }
    sections
}

/// Build the object tree for one document.
///
/// Link paths are kept as written; see [`Page::normalize_links`].
pub fn parse_page(path: &str, text: &str, metadata: &FileMetadata) -> Page {
    let lines: Vec<&str> = text.lines().collect();
    let mut sections = derive_sections(path, &lines, metadata);

    let mut spans: Vec<&BlockSpan> = metadata
        .sections
        .iter()
        .filter(|s| s.kind != "heading")
        .collect();
    spans.sort_by_key(|s| (s.position.start, s.position.end));
    let mut blocks: Vec<Block> = spans
        .iter()
        .enumerate()
        .map(|(i, span)| make_block(path, i + 1, span, &lines))
        .collect();

    let mut page_links = Vec::new();
    for occurrence in &metadata.links {
        let link = Link::infer(&occurrence.link, occurrence.embed, occurrence.display.clone());
        let line = occurrence.line;
        add_link(&mut page_links, link.clone());

        if let Some(section) = sections.iter_mut().rev().find(|s| s.position.start <= line) {
            if section.position.end >= line {
                add_link(&mut section.links, link.clone());
            }
        }
        if let Some(block) = blocks.iter_mut().rev().find(|b| b.position.start <= line) {
            if block.position.end >= line {
                add_link(&mut block.links, link.clone());
            }
        }
        // The first block starting at or below the line records it too; for a
        // link on a block's own first line that is the same block.
        if let Some(block) = blocks.iter_mut().find(|b| b.position.start >= line) {
            if block.position.end >= line {
                add_link(&mut block.links, link);
            }
        }
    }
    for fm in &metadata.frontmatter_links {
        add_link(&mut page_links, Link::infer(&fm.link, false, fm.display.clone()));
    }

    let mut block_ids = IndexMap::new();
    for block in blocks {
        if let Some(bid) = &block.block_id {
            block_ids.entry(bid.clone()).or_insert_with(|| block.id.clone());
        }
        let owner = sections
            .iter_mut()
            .rev()
            .find(|s| s.position.start <= block.position.start);
        match owner {
            Some(section) if section.position.end >= block.position.end => {
                section.block_ids.push(block.id.clone());
                section.blocks.push(block);
            }
            _ => log::trace!("Block {} is outside every section of {}", block.id, path),
        }
    }

    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_string())
        .unwrap_or_else(|| "md".to_string());

    Page {
        path: path.to_string(),
        extension,
        position: LineSpan::new(0, lines.len().saturating_sub(1)),
        links: page_links,
        section_ids: sections.iter().map(|s| s.id.clone()).collect(),
        sections,
        block_ids,
        ref_name: None,
        revision: 0,
    }
}

fn normalize_list(links: &mut Vec<Link>, normalize: &dyn Fn(&Link) -> Link) {
    let mut out = Vec::with_capacity(links.len());
    for link in links.iter() {
        add_link(&mut out, normalize(link));
    }
    *links = out;
}

impl Page {
    /// Rewrite every link in the tree through `normalize` (typically vault
    /// path resolution), keeping each list free of duplicates.
    pub fn normalize_links(&mut self, normalize: &dyn Fn(&Link) -> Link) {
        normalize_list(&mut self.links, normalize);
        for section in &mut self.sections {
            normalize_list(&mut section.links, normalize);
            for block in &mut section.blocks {
                normalize_list(&mut block.links, normalize);
            }
        }
    }
}
