//
// store.rs
//
// Revision-tracked object store with ownership and inverted indices
//

use indexmap::IndexSet;
use std::collections::HashMap;

use crate::link::Link;
use crate::model::{Block, Indexable, Object, Page, PageRecord, LINKBEARING_TYPE, PAGE_TYPE};

/// Key -> set of object ids
#[derive(Debug, Default)]
pub struct InvertedIndex {
    map: HashMap<String, IndexSet<String>>,
}

impl InvertedIndex {
    pub fn set<I, K>(&mut self, id: &str, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        for key in keys {
            self.map.entry(key.into()).or_default().insert(id.to_string());
        }
    }

    pub fn delete<I, K>(&mut self, id: &str, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        for key in keys {
            let key = key.as_ref();
            if let Some(ids) = self.map.get_mut(key) {
                ids.shift_remove(id);
                if ids.is_empty() {
                    self.map.remove(key);
                }
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&IndexSet<String>> {
        self.map.get(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

/// Callback that registers the objects owned by `object` through `add`.
pub type Substorer<'s> = &'s dyn Fn(&mut Object, &mut Adder<'_>);

/// Handle given to a [`Substorer`]; everything added through it is owned by
/// the object being stored and shares its revision.
pub struct Adder<'a> {
    store: &'a mut ObjectStore,
    revision: u64,
    parent: String,
}

impl Adder<'_> {
    pub fn add(&mut self, objects: Vec<Object>, substorer: Option<Substorer<'_>>) {
        for object in objects {
            let child = object.id().to_string();
            self.store
                .store_one(object, self.revision, Some(self.parent.clone()), substorer);
            self.store
                .children
                .entry(self.parent.clone())
                .or_default()
                .insert(child);
        }
    }
}

fn page_substorer(object: &mut Object, add: &mut Adder<'_>) {
    if let Object::Page(page) = object {
        let sections = page.take_sections().into_iter().map(Object::Section).collect();
        let sub: Substorer<'_> = &section_substorer;
        add.add(sections, Some(sub));
    }
}

fn section_substorer(object: &mut Object, add: &mut Adder<'_>) {
    if let Object::Section(section) = object {
        let blocks = section.take_blocks().into_iter().map(Object::Block).collect();
        add.add(blocks, None);
    }
}

/// In-memory object graph.
///
/// Every structural change (`store`, a successful `delete`, `touch`,
/// `clear`) bumps the revision. Objects record their parent by id and the
/// store keeps the parent -> children adjacency, so deleting an object
/// always takes its owned objects with it.
#[derive(Debug, Default)]
pub struct ObjectStore {
    revision: u64,
    objects: HashMap<String, Object>,
    children: HashMap<String, IndexSet<String>>,
    types: InvertedIndex,
    links: InvertedIndex,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Bump the revision without a structural change.
    pub fn touch(&mut self) {
        self.revision += 1;
    }

    pub fn clear(&mut self) {
        self.objects.clear();
        self.children.clear();
        self.types.clear();
        self.links.clear();
        self.revision += 1;
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Store `objects`, replacing any previous objects with the same ids
    /// (and everything those owned). All objects stored by this call, nested
    /// ones included, carry the revision current at the time of the call.
    pub fn store(&mut self, objects: Vec<Object>, substorer: Option<Substorer<'_>>) {
        let revision = self.revision;
        for object in objects {
            self.store_one(object, revision, None, substorer);
        }
        self.revision += 1;
    }

    /// Store a parsed page together with its sections and blocks.
    pub fn store_page(&mut self, page: Page) {
        let sub: Substorer<'_> = &page_substorer;
        self.store(vec![Object::Page(page)], Some(sub));
    }

    fn store_one(
        &mut self,
        mut object: Object,
        revision: u64,
        parent: Option<String>,
        substorer: Option<Substorer<'_>>,
    ) {
        let id = object.id().to_string();
        self.delete_recursive(&id);
        object.set_revision(revision);
        object.set_parent(parent);

        if let Some(sub) = substorer {
            let mut adder = Adder {
                store: self,
                revision,
                parent: id.clone(),
            };
            sub(&mut object, &mut adder);
        }

        self.index(&object);
        self.objects.insert(id, object);
    }

    /// Remove an object and everything it owns. Returns false, leaving the
    /// revision alone, when the id is unknown.
    pub fn delete(&mut self, id: &str) -> bool {
        if self.delete_recursive(id) {
            self.revision += 1;
            true
        } else {
            false
        }
    }

    fn delete_recursive(&mut self, id: &str) -> bool {
        let Some(object) = self.objects.remove(id) else {
            return false;
        };
        if let Some(siblings) = object.parent().and_then(|p| self.children.get_mut(p)) {
            siblings.shift_remove(id);
        }
        if let Some(children) = self.children.remove(id) {
            for child in &children {
                self.delete_recursive(child);
            }
        }
        self.unindex(&object);
        true
    }

    fn index(&mut self, object: &Object) {
        self.types.set(object.id(), object.types().iter().copied());
        if object.has_type(LINKBEARING_TYPE) {
            self.links
                .set(object.id(), object.links().iter().map(Link::canonical));
        }
    }

    fn unindex(&mut self, object: &Object) {
        self.types.delete(object.id(), object.types().iter());
        if object.has_type(LINKBEARING_TYPE) {
            self.links
                .delete(object.id(), object.links().iter().map(Link::canonical));
        }
    }

    /// Mutable access to a stored block for filling in computed fields.
    /// Links and kind must not change here; they are indexed.
    pub fn block_mut(&mut self, id: &str) -> Option<&mut Block> {
        self.objects.get_mut(id).and_then(Object::as_block_mut)
    }

    pub fn page_mut(&mut self, path: &str) -> Option<&mut Page> {
        self.objects.get_mut(path).and_then(Object::as_page_mut)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn load(&self, id: &str) -> Option<&Object> {
        self.objects.get(id)
    }

    /// Absent ids are skipped.
    pub fn load_many<'a, I>(&self, ids: I) -> Vec<&Object>
    where
        I: IntoIterator<Item = &'a str>,
    {
        ids.into_iter().filter_map(|id| self.objects.get(id)).collect()
    }

    pub fn get_by_type(&self, ty: &str) -> IndexSet<String> {
        self.types.get(ty).cloned().unwrap_or_default()
    }

    /// Ids of objects whose links point at `link`
    pub fn backlinks_to(&self, link: &Link) -> IndexSet<String> {
        self.links.get(&link.canonical()).cloned().unwrap_or_default()
    }

    /// Ids of objects linking to `object`; empty when it cannot be linked to.
    pub fn get_backlinks(&self, object: &dyn Indexable) -> IndexSet<String> {
        object
            .link()
            .map(|link| self.backlinks_to(&link))
            .unwrap_or_default()
    }

    pub fn is_linked(&self, object: &dyn Indexable) -> bool {
        object
            .link()
            .and_then(|link| self.links.get(&link.canonical()))
            .is_some_and(|ids| !ids.is_empty())
    }

    pub fn children_of(&self, id: &str) -> Vec<&str> {
        self.children
            .get(id)
            .map(|c| c.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn page(&self, path: &str) -> Option<&Page> {
        self.objects.get(path).and_then(Object::as_page)
    }

    pub fn pages(&self) -> Vec<&Page> {
        let ids = self.types.get(PAGE_TYPE);
        let mut pages: Vec<&Page> = ids
            .into_iter()
            .flatten()
            .filter_map(|id| self.page(id))
            .collect();
        pages.sort_by(|a, b| a.path.cmp(&b.path));
        pages
    }

    /// Block object ids of a page in document order
    pub fn block_ids_of(&self, path: &str) -> Vec<String> {
        let Some(page) = self.page(path) else {
            return Vec::new();
        };
        page.section_ids
            .iter()
            .filter_map(|sid| self.objects.get(sid).and_then(Object::as_section))
            .flat_map(|section| section.block_ids.iter().cloned())
            .collect()
    }

    pub fn blocks_of(&self, path: &str) -> Vec<&Block> {
        self.block_ids_of(path)
            .iter()
            .filter_map(|id| self.objects.get(id).and_then(Object::as_block))
            .collect()
    }

    pub fn block_at_line(&self, path: &str, line: usize) -> Option<&Block> {
        self.blocks_of(path)
            .into_iter()
            .find(|b| b.position.contains_line(line))
    }

    /// Look up a block by its `^id` within a page
    pub fn block_by_block_id(&self, path: &str, block_id: &str) -> Option<&Block> {
        let page = self.page(path)?;
        let id = page.block_ids.get(block_id)?;
        self.objects.get(id).and_then(Object::as_block)
    }

    /// Plain-record projection of a stored page and everything it owns
    pub fn page_record(&self, path: &str) -> Option<PageRecord> {
        let page = self.page(path)?;
        let sections = page
            .section_ids
            .iter()
            .filter_map(|sid| self.objects.get(sid).and_then(Object::as_section))
            .map(|section| {
                let blocks = section
                    .block_ids
                    .iter()
                    .filter_map(|bid| self.objects.get(bid).and_then(Object::as_block))
                    .map(Block::to_record)
                    .collect();
                section.to_record(blocks)
            })
            .collect();
        Some(page.to_record(sections))
    }
}
