//
// model.rs
//
// Indexed objects: pages, sections and the block variants
//

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::link::Link;
use crate::metadata::LineSpan;

// Capability tags carried in `types`
pub const FILE_TYPE: &str = "file";
pub const MARKDOWN_TYPE: &str = "markdown";
pub const PAGE_TYPE: &str = "page";
pub const SECTION_TYPE: &str = "section";
pub const BLOCK_TYPE: &str = "block";
pub const NUMBERED_TYPE: &str = "block-numbered";
pub const THEOREM_TYPE: &str = "block-theorem";
pub const EQUATION_TYPE: &str = "block-equation";
pub const LINKABLE_TYPE: &str = "linkable";
pub const LINKBEARING_TYPE: &str = "linkbearing";

const PAGE_TYPES: &[&str] = &[FILE_TYPE, MARKDOWN_TYPE, PAGE_TYPE, LINKABLE_TYPE, LINKBEARING_TYPE];
const SECTION_TYPES: &[&str] = &[MARKDOWN_TYPE, SECTION_TYPE, LINKABLE_TYPE, LINKBEARING_TYPE];
const GENERIC_BLOCK_TYPES: &[&str] = &[MARKDOWN_TYPE, BLOCK_TYPE, LINKBEARING_TYPE];
const THEOREM_BLOCK_TYPES: &[&str] = &[
    MARKDOWN_TYPE,
    BLOCK_TYPE,
    NUMBERED_TYPE,
    THEOREM_TYPE,
    LINKBEARING_TYPE,
];
const EQUATION_BLOCK_TYPES: &[&str] = &[MARKDOWN_TYPE, BLOCK_TYPE, NUMBERED_TYPE, EQUATION_TYPE];

/// Anything the object store can hold.
pub trait Indexable {
    fn id(&self) -> &str;
    fn types(&self) -> &'static [&'static str];
    fn revision(&self) -> u64;
    fn set_revision(&mut self, revision: u64);
    fn parent(&self) -> Option<&str>;
    fn set_parent(&mut self, parent: Option<String>);
    fn file(&self) -> &str;

    /// Outgoing links, only meaningful for link-bearing objects
    fn links(&self) -> &[Link] {
        &[]
    }

    /// The link that points at this object, if it can be linked to
    fn link(&self) -> Option<Link> {
        None
    }

    fn has_type(&self, ty: &str) -> bool {
        self.types().iter().any(|t| *t == ty)
    }
}

// ============================================================================
// Page
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub path: String,
    pub extension: String,
    pub position: LineSpan,
    pub links: Vec<Link>,
    /// Owned sections in document order. Emptied when the page is stored;
    /// the store keeps them as separate objects.
    pub sections: Vec<Section>,
    pub section_ids: Vec<String>,
    /// Block id (`^id`) -> object id of the block carrying it
    pub block_ids: IndexMap<String, String>,
    /// Reference name of the main theorem, filled in by numbering
    pub ref_name: Option<String>,
    pub revision: u64,
}

impl Page {
    pub fn take_sections(&mut self) -> Vec<Section> {
        std::mem::take(&mut self.sections)
    }
}

impl Indexable for Page {
    fn id(&self) -> &str {
        &self.path
    }
    fn types(&self) -> &'static [&'static str] {
        PAGE_TYPES
    }
    fn revision(&self) -> u64 {
        self.revision
    }
    fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }
    fn parent(&self) -> Option<&str> {
        None
    }
    fn set_parent(&mut self, _parent: Option<String>) {}
    fn file(&self) -> &str {
        &self.path
    }
    fn links(&self) -> &[Link] {
        &self.links
    }
    fn link(&self) -> Option<Link> {
        Some(Link::file(self.path.clone()))
    }
}

// ============================================================================
// Section
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub id: String,
    pub file: String,
    pub ordinal: usize,
    pub title: String,
    pub level: u8,
    pub position: LineSpan,
    pub links: Vec<Link>,
    /// Owned blocks in document order. Emptied when stored.
    pub blocks: Vec<Block>,
    pub block_ids: Vec<String>,
    pub parent: Option<String>,
    pub revision: u64,
}

impl Section {
    pub fn make_id(file: &str, ordinal: usize, title: &str) -> String {
        let short: String = title.chars().take(8).collect();
        let mut slug = String::with_capacity(short.len());
        let mut in_gap = false;
        for c in short.chars() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                slug.push(c);
                in_gap = false;
            } else if !in_gap {
                slug.push('-');
                in_gap = true;
            }
        }
        format!("{file}/section{ordinal}/{slug}")
    }

    pub fn take_blocks(&mut self) -> Vec<Block> {
        std::mem::take(&mut self.blocks)
    }
}

impl Indexable for Section {
    fn id(&self) -> &str {
        &self.id
    }
    fn types(&self) -> &'static [&'static str] {
        SECTION_TYPES
    }
    fn revision(&self) -> u64 {
        self.revision
    }
    fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }
    fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }
    fn set_parent(&mut self, parent: Option<String>) {
        self.parent = parent;
    }
    fn file(&self) -> &str {
        &self.file
    }
    fn links(&self) -> &[Link] {
        &self.links
    }
    fn link(&self) -> Option<Link> {
        Some(Link::header(self.file.clone(), self.title.clone()))
    }
}

// ============================================================================
// Blocks
// ============================================================================

/// Settings written on a theorem callout line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TheoremSettings {
    /// Canonical kind id, e.g. `theorem`
    #[serde(rename = "type")]
    pub kind: String,
    /// `auto`, empty (unnumbered) or a literal number
    pub number: String,
    pub title: Option<String>,
    /// `+`, `-` or empty
    pub fold: String,
    /// Settings came from the JSON `[!math|{...}]` form
    pub legacy: bool,
}

impl TheoremSettings {
    pub fn is_auto(&self) -> bool {
        self.number == "auto"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TheoremBlock {
    pub settings: TheoremSettings,
    pub main: bool,
    pub label: Option<String>,
    pub display: Option<String>,
    pub main_title: Option<String>,
    pub title_suffix: Option<String>,
    pub ref_name: Option<String>,
    pub formatted_label: Option<String>,
}

impl TheoremBlock {
    pub fn new(settings: TheoremSettings) -> Self {
        Self {
            settings,
            main: false,
            label: None,
            display: None,
            main_title: None,
            title_suffix: None,
            ref_name: None,
            formatted_label: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquationBlock {
    pub math: String,
    pub manual_tag: Option<String>,
    pub label: Option<String>,
    pub display: Option<String>,
    pub print_name: Option<String>,
    pub ref_name: Option<String>,
}

impl EquationBlock {
    pub fn new(math: String, manual_tag: Option<String>) -> Self {
        Self {
            math,
            manual_tag,
            label: None,
            display: None,
            print_name: None,
            ref_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Generic,
    Theorem(TheoremBlock),
    Equation(EquationBlock),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: String,
    pub file: String,
    pub ordinal: usize,
    pub position: LineSpan,
    pub links: Vec<Link>,
    /// Stable `^id`
    pub block_id: Option<String>,
    /// Span type reported by the metadata ("paragraph", "callout", "math", ...)
    pub block_type: String,
    pub kind: BlockKind,
    pub parent: Option<String>,
    pub revision: u64,
}

impl Block {
    pub fn make_id(file: &str, ordinal: usize) -> String {
        format!("{file}/block{ordinal}")
    }

    pub fn theorem(&self) -> Option<&TheoremBlock> {
        match &self.kind {
            BlockKind::Theorem(t) => Some(t),
            _ => None,
        }
    }

    pub fn theorem_mut(&mut self) -> Option<&mut TheoremBlock> {
        match &mut self.kind {
            BlockKind::Theorem(t) => Some(t),
            _ => None,
        }
    }

    pub fn equation(&self) -> Option<&EquationBlock> {
        match &self.kind {
            BlockKind::Equation(e) => Some(e),
            _ => None,
        }
    }

    pub fn equation_mut(&mut self) -> Option<&mut EquationBlock> {
        match &mut self.kind {
            BlockKind::Equation(e) => Some(e),
            _ => None,
        }
    }

    /// Block link targets in other documents (or this one)
    pub fn block_link_targets(&self) -> impl Iterator<Item = &Link> {
        self.links.iter().filter(|l| l.block_id().is_some())
    }
}

impl Indexable for Block {
    fn id(&self) -> &str {
        &self.id
    }
    fn types(&self) -> &'static [&'static str] {
        match self.kind {
            BlockKind::Generic => GENERIC_BLOCK_TYPES,
            BlockKind::Theorem(_) => THEOREM_BLOCK_TYPES,
            BlockKind::Equation(_) => EQUATION_BLOCK_TYPES,
        }
    }
    fn revision(&self) -> u64 {
        self.revision
    }
    fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }
    fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }
    fn set_parent(&mut self, parent: Option<String>) {
        self.parent = parent;
    }
    fn file(&self) -> &str {
        &self.file
    }
    fn links(&self) -> &[Link] {
        &self.links
    }
    fn link(&self) -> Option<Link> {
        self.block_id
            .as_ref()
            .map(|id| Link::block(self.file.clone(), id.clone()))
    }
}

// ============================================================================
// Store object
// ============================================================================

/// One entry of the object store
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Page(Page),
    Section(Section),
    Block(Block),
}

impl Object {
    fn inner(&self) -> &dyn Indexable {
        match self {
            Object::Page(p) => p,
            Object::Section(s) => s,
            Object::Block(b) => b,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Indexable {
        match self {
            Object::Page(p) => p,
            Object::Section(s) => s,
            Object::Block(b) => b,
        }
    }

    pub fn as_page(&self) -> Option<&Page> {
        match self {
            Object::Page(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_section(&self) -> Option<&Section> {
        match self {
            Object::Section(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Object::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_block_mut(&mut self) -> Option<&mut Block> {
        match self {
            Object::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_page_mut(&mut self) -> Option<&mut Page> {
        match self {
            Object::Page(p) => Some(p),
            _ => None,
        }
    }
}

impl Indexable for Object {
    fn id(&self) -> &str {
        self.inner().id()
    }
    fn types(&self) -> &'static [&'static str] {
        self.inner().types()
    }
    fn revision(&self) -> u64 {
        self.inner().revision()
    }
    fn set_revision(&mut self, revision: u64) {
        self.inner_mut().set_revision(revision)
    }
    fn parent(&self) -> Option<&str> {
        self.inner().parent()
    }
    fn set_parent(&mut self, parent: Option<String>) {
        self.inner_mut().set_parent(parent)
    }
    fn file(&self) -> &str {
        self.inner().file()
    }
    fn links(&self) -> &[Link] {
        self.inner().links()
    }
    fn link(&self) -> Option<Link> {
        self.inner().link()
    }
}

impl From<Page> for Object {
    fn from(page: Page) -> Self {
        Object::Page(page)
    }
}

impl From<Section> for Object {
    fn from(section: Section) -> Self {
        Object::Section(section)
    }
}

impl From<Block> for Object {
    fn from(block: Block) -> Self {
        Object::Block(block)
    }
}

// ============================================================================
// Plain records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BlockData {
    Generic,
    Theorem {
        settings: TheoremSettings,
        main: bool,
        label: Option<String>,
        main_title: Option<String>,
        ref_name: Option<String>,
    },
    Equation {
        math: String,
        manual_tag: Option<String>,
        label: Option<String>,
        print_name: Option<String>,
        ref_name: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub id: String,
    pub ordinal: usize,
    pub position: LineSpan,
    pub block_id: Option<String>,
    pub block_type: String,
    pub links: Vec<String>,
    #[serde(flatten)]
    pub data: BlockData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRecord {
    pub id: String,
    pub ordinal: usize,
    pub title: String,
    pub level: u8,
    pub position: LineSpan,
    pub links: Vec<String>,
    pub blocks: Vec<BlockRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub path: String,
    pub revision: u64,
    pub ref_name: Option<String>,
    pub links: Vec<String>,
    pub sections: Vec<SectionRecord>,
}

fn canonical_links(links: &[Link]) -> Vec<String> {
    links.iter().map(Link::canonical).collect()
}

impl Block {
    pub fn to_record(&self) -> BlockRecord {
        let data = match &self.kind {
            BlockKind::Generic => BlockData::Generic,
            BlockKind::Theorem(t) => BlockData::Theorem {
                settings: t.settings.clone(),
                main: t.main,
                label: t.label.clone(),
                main_title: t.main_title.clone(),
                ref_name: t.ref_name.clone(),
            },
            BlockKind::Equation(e) => BlockData::Equation {
                math: e.math.clone(),
                manual_tag: e.manual_tag.clone(),
                label: e.label.clone(),
                print_name: e.print_name.clone(),
                ref_name: e.ref_name.clone(),
            },
        };
        BlockRecord {
            id: self.id.clone(),
            ordinal: self.ordinal,
            position: self.position,
            block_id: self.block_id.clone(),
            block_type: self.block_type.clone(),
            links: canonical_links(&self.links),
            data,
        }
    }
}

impl Section {
    pub fn to_record(&self, blocks: Vec<BlockRecord>) -> SectionRecord {
        SectionRecord {
            id: self.id.clone(),
            ordinal: self.ordinal,
            title: self.title.clone(),
            level: self.level,
            position: self.position,
            links: canonical_links(&self.links),
            blocks,
        }
    }
}

impl Page {
    pub fn to_record(&self, sections: Vec<SectionRecord>) -> PageRecord {
        PageRecord {
            path: self.path.clone(),
            revision: self.revision,
            ref_name: self.ref_name.clone(),
            links: canonical_links(&self.links),
            sections,
        }
    }
}
