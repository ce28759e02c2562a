//
// numbering.rs
//
// Theorem and equation numbering over one stored document
//

use regex::Regex;

use crate::link::basename;
use crate::model::{BlockKind, TheoremBlock, TheoremSettings};
use crate::settings::{NumberingSettings, TheoremRefFormat};
use crate::store::ObjectStore;
use crate::theorem::{display_name, kind_prefix};

/// What a numbering pass assigned in one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NumberingSummary {
    pub theorems: usize,
    pub numbered_equations: usize,
    /// Object id of the main theorem
    pub main_theorem: Option<String>,
}

/// Prefix inferred from `source` (usually the document's base name), always
/// ending with `.`.
pub fn infer_number_prefix(source: &str, pattern: &str) -> Option<String> {
    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(err) => {
            log::warn!("Invalid number prefix pattern '{}': {}", pattern, err);
            return None;
        }
    };
    let found = regex.find(source)?;
    let mut prefix = found.as_str().trim().to_string();
    if prefix.is_empty() {
        return None;
    }
    if !prefix.ends_with('.') {
        prefix.push('.');
    }
    Some(prefix)
}

fn theorem_number_prefix(settings: &NumberingSettings, path: &str) -> String {
    if !settings.number_prefix.is_empty() {
        return settings.number_prefix.clone();
    }
    if settings.infer_number_prefix {
        return infer_number_prefix(basename(path), &settings.infer_number_prefix_regexp)
            .unwrap_or_default();
    }
    String::new()
}

fn equation_number_prefix(settings: &NumberingSettings, path: &str) -> String {
    if !settings.eq_number_prefix.is_empty() {
        return settings.eq_number_prefix.clone();
    }
    if settings.infer_eq_number_prefix {
        return infer_number_prefix(basename(path), &settings.infer_eq_number_prefix_regexp)
            .unwrap_or_default();
    }
    String::new()
}

/// `Kind N`: the kind's display name followed by the number, if any.
///
/// `index` is the zero-based position among auto-numbered theorems; an
/// auto theorem without one gets no number.
pub fn format_main_title(
    theorem: &TheoremSettings,
    index: Option<u32>,
    settings: &NumberingSettings,
    prefix: &str,
) -> String {
    let mut title = display_name(&settings.profile, &theorem.kind);
    if theorem.number.is_empty() {
        return title;
    }
    if theorem.is_auto() {
        if let Some(index) = index {
            let number = settings.number_style.format(index.saturating_add(settings.number_init));
            title.push_str(&format!(" {}{}{}", prefix, number, settings.number_suffix));
        }
    } else {
        title.push(' ');
        title.push_str(&theorem.number);
    }
    title
}

pub fn format_ref_name(main_title: &str, title: Option<&str>, format: TheoremRefFormat) -> String {
    match (format, title) {
        (TheoremRefFormat::TypeNumberTitle, Some(title)) => format!("{main_title} ({title})"),
        (TheoremRefFormat::TitleOrTypeNumber, Some(title)) => title.to_string(),
        (TheoremRefFormat::TitleWithTypeNumber, Some(title)) => format!("{title} ({main_title})"),
        _ => main_title.to_string(),
    }
}

/// Heading shown on a rendered theorem: main title, subtitle and suffix.
pub fn display_title(theorem: &TheoremBlock) -> Option<String> {
    let mut title = theorem.main_title.clone()?;
    if let Some(subtitle) = &theorem.settings.title {
        title.push_str(&format!(" ({subtitle})"));
    }
    if let Some(suffix) = &theorem.title_suffix {
        title.push_str(suffix);
    }
    Some(title)
}

/// Assign theorem titles, equation numbers and reference names for the
/// stored document at `path`.
///
/// Equations are numbered only when something links to them (or they carry
/// a manual `\tag`). Fields are written in place; the store revision is
/// left alone.
pub fn update_names(
    store: &mut ObjectStore,
    path: &str,
    settings: &NumberingSettings,
    set_only_theorem_as_main: bool,
) -> NumberingSummary {
    let mut summary = NumberingSummary::default();
    if store.page(path).is_none() {
        log::trace!("No stored page for {}, nothing to number", path);
        return summary;
    }

    let number_prefix = theorem_number_prefix(settings, path);
    let eq_prefix = equation_number_prefix(settings, path);

    let mut theorems: Vec<String> = Vec::new();
    let mut auto_count: u32 = 0;
    let mut eq_number = settings.eq_number_init;

    for id in store.block_ids_of(path) {
        let linked = store.load(&id).is_some_and(|object| store.is_linked(object));
        let Some(block) = store.block_mut(&id) else {
            continue;
        };
        match &mut block.kind {
            BlockKind::Theorem(theorem) => {
                theorems.push(id.clone());
                if theorem.main {
                    summary.main_theorem = Some(id.clone());
                }
                let index = if theorem.settings.is_auto() {
                    auto_count += 1;
                    Some(auto_count - 1)
                } else {
                    None
                };
                let main_title =
                    format_main_title(&theorem.settings, index, settings, &number_prefix);
                theorem.ref_name = Some(format_ref_name(
                    &main_title,
                    theorem.settings.title.as_deref(),
                    settings.ref_format,
                ));
                theorem.main_title = Some(main_title);
                theorem.title_suffix = Some(settings.title_suffix.clone());
                theorem.formatted_label = theorem.label.as_ref().map(|label| {
                    format!(
                        "{}{}:{}",
                        settings.label_prefix,
                        kind_prefix(&theorem.settings.kind).unwrap_or_default(),
                        label
                    )
                });
            }
            BlockKind::Equation(equation) => {
                let print_name = if let Some(tag) = &equation.manual_tag {
                    Some(format!("({tag})"))
                } else if linked {
                    let name = format!(
                        "({}{}{})",
                        eq_prefix,
                        settings.eq_number_style.format(eq_number),
                        settings.eq_number_suffix
                    );
                    eq_number = eq_number.saturating_add(1);
                    summary.numbered_equations += 1;
                    Some(name)
                } else {
                    None
                };
                equation.ref_name = print_name
                    .as_ref()
                    .map(|name| format!("{}{}{}", settings.eq_ref_prefix, name, settings.eq_ref_suffix));
                equation.print_name = print_name;
            }
            BlockKind::Generic => {}
        }
    }

    if set_only_theorem_as_main && theorems.len() == 1 {
        if let Some(theorem) = store.block_mut(&theorems[0]).and_then(|b| b.theorem_mut()) {
            theorem.main = true;
        }
        summary.main_theorem = Some(theorems[0].clone());
    }
    summary.theorems = theorems.len();

    let ref_name = summary
        .main_theorem
        .as_deref()
        .and_then(|id| store.load(id))
        .and_then(|object| object.as_block())
        .and_then(|block| block.theorem())
        .and_then(|theorem| theorem.ref_name.clone());
    if let Some(page) = store.page_mut(path) {
        page.ref_name = ref_name;
    }

    log::trace!(
        "Numbered {}: {} theorems, {} equations",
        path,
        summary.theorems,
        summary.numbered_equations
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::extract_metadata;
    use crate::model::{Block, EquationBlock};
    use crate::numeral::NumberStyle;
    use crate::parser::parse_page;

    fn store_doc(store: &mut ObjectStore, path: &str, text: &str) {
        store.store_page(parse_page(path, text, &extract_metadata(text)));
    }

    fn number(store: &mut ObjectStore, path: &str) -> NumberingSummary {
        update_names(store, path, &NumberingSettings::default(), false)
    }

    fn theorem<'a>(store: &'a ObjectStore, path: &str, ordinal: usize) -> &'a TheoremBlock {
        store
            .load(&Block::make_id(path, ordinal))
            .and_then(|o| o.as_block())
            .and_then(|b| b.theorem())
            .expect("theorem block")
    }

    fn equation<'a>(store: &'a ObjectStore, path: &str, ordinal: usize) -> &'a EquationBlock {
        store
            .load(&Block::make_id(path, ordinal))
            .and_then(|o| o.as_block())
            .and_then(|b| b.equation())
            .expect("equation block")
    }

    const EQUATIONS: &str = "$$\na\n$$ ^e1\n\n$$\nb\n$$ ^e2\n";

    #[test]
    fn test_single_theorem_unlinked_equation() {
        let mut store = ObjectStore::new();
        store_doc(&mut store, "n.md", "# Notes\n\n> [!theorem]\n> body\n\n$$ a = b $$\n");
        number(&mut store, "n.md");
        assert_eq!(theorem(&store, "n.md", 1).main_title.as_deref(), Some("Theorem 1"));
        assert_eq!(equation(&store, "n.md", 2).print_name, None);
        assert_eq!(equation(&store, "n.md", 2).ref_name, None);
    }

    #[test]
    fn test_only_linked_equations_are_numbered() {
        let mut store = ObjectStore::new();
        store_doc(&mut store, "a.md", EQUATIONS);
        store_doc(&mut store, "b.md", "see [[a.md#^e1]]\n");
        number(&mut store, "a.md");
        assert_eq!(equation(&store, "a.md", 1).print_name.as_deref(), Some("(1)"));
        assert_eq!(equation(&store, "a.md", 2).print_name, None);

        store_doc(&mut store, "b.md", "see [[a.md#^e2]]\n");
        number(&mut store, "a.md");
        assert_eq!(equation(&store, "a.md", 1).print_name, None);
        assert_eq!(equation(&store, "a.md", 2).print_name.as_deref(), Some("(1)"));
    }

    #[test]
    fn test_manual_tag_skips_counter() {
        let mut store = ObjectStore::new();
        store_doc(
            &mut store,
            "a.md",
            "$$\nx \\tag{A}\n$$ ^e1\n\n$$\ny\n$$ ^e2\n\n$$\nz\n$$ ^e3\n",
        );
        store_doc(&mut store, "b.md", "[[a.md#^e2]] [[a.md#^e3]]\n");
        let summary = number(&mut store, "a.md");
        assert_eq!(equation(&store, "a.md", 1).print_name.as_deref(), Some("(A)"));
        assert_eq!(equation(&store, "a.md", 2).print_name.as_deref(), Some("(1)"));
        assert_eq!(equation(&store, "a.md", 3).print_name.as_deref(), Some("(2)"));
        assert_eq!(summary.numbered_equations, 2);
    }

    #[test]
    fn test_equation_without_block_id_stays_unnumbered() {
        let mut store = ObjectStore::new();
        store_doc(&mut store, "a.md", "$$\nx\n$$\n");
        number(&mut store, "a.md");
        assert_eq!(equation(&store, "a.md", 1).print_name, None);
    }

    #[test]
    fn test_equation_style_prefix_and_ref() {
        let mut store = ObjectStore::new();
        store_doc(&mut store, "a.md", EQUATIONS);
        store_doc(&mut store, "b.md", "[[a.md#^e1]] [[a.md#^e2]]\n");
        let settings = NumberingSettings {
            eq_number_prefix: "2.".into(),
            eq_number_init: 3,
            eq_number_style: NumberStyle::RomanLower,
            eq_ref_prefix: "eq. ".into(),
            ..Default::default()
        };
        update_names(&mut store, "a.md", &settings, false);
        assert_eq!(equation(&store, "a.md", 1).print_name.as_deref(), Some("(2.iii)"));
        assert_eq!(equation(&store, "a.md", 2).print_name.as_deref(), Some("(2.iv)"));
        assert_eq!(equation(&store, "a.md", 2).ref_name.as_deref(), Some("eq. (2.iv)"));
    }

    #[test]
    fn test_counters_saturate_at_the_top_of_the_range() {
        let mut store = ObjectStore::new();
        store_doc(&mut store, "a.md", "> [!thm]\n\n> [!thm]\n\n$$\na\n$$ ^e1\n\n$$\nb\n$$ ^e2\n");
        store_doc(&mut store, "b.md", "[[a.md#^e1]] [[a.md#^e2]]\n");
        let settings = NumberingSettings {
            number_init: u32::MAX,
            eq_number_init: u32::MAX,
            ..Default::default()
        };
        update_names(&mut store, "a.md", &settings, false);
        let top = format!("Theorem {}", u32::MAX);
        assert_eq!(theorem(&store, "a.md", 2).main_title.as_deref(), Some(top.as_str()));
        let top = format!("({})", u32::MAX);
        assert_eq!(equation(&store, "a.md", 4).print_name.as_deref(), Some(top.as_str()));
    }

    #[test]
    fn test_theorem_numbering_mixed_directives() {
        let mut store = ObjectStore::new();
        let text = "> [!thm]\n\n> [!lem|*] Zorn\n\n> [!cor|7.4]\n\n> [!def] Group\n";
        store_doc(&mut store, "a.md", text);
        let summary = number(&mut store, "a.md");
        assert_eq!(summary.theorems, 4);
        assert_eq!(theorem(&store, "a.md", 1).main_title.as_deref(), Some("Theorem 1"));
        assert_eq!(theorem(&store, "a.md", 2).main_title.as_deref(), Some("Lemma"));
        assert_eq!(theorem(&store, "a.md", 3).main_title.as_deref(), Some("Corollary 7.4"));
        // the auto counter is shared across kinds and skips non-auto theorems
        assert_eq!(theorem(&store, "a.md", 4).main_title.as_deref(), Some("Definition 2"));
        assert_eq!(theorem(&store, "a.md", 4).ref_name.as_deref(), Some("Definition 2 (Group)"));
        assert_eq!(theorem(&store, "a.md", 4).title_suffix.as_deref(), Some("."));
        assert_eq!(
            display_title(theorem(&store, "a.md", 4)).as_deref(),
            Some("Definition 2 (Group).")
        );
    }

    #[test]
    fn test_theorem_style_and_prefix() {
        let mut store = ObjectStore::new();
        store_doc(&mut store, "ch/1.2 Groups.md", "> [!thm]\n\n> [!thm]\n");
        let settings = NumberingSettings {
            number_init: 0,
            number_style: NumberStyle::AlphUpper,
            infer_number_prefix: true,
            number_suffix: "'".into(),
            ..Default::default()
        };
        update_names(&mut store, "ch/1.2 Groups.md", &settings, false);
        // index 0 + init 0 has no letters
        assert_eq!(
            theorem(&store, "ch/1.2 Groups.md", 1).main_title.as_deref(),
            Some("Theorem 1.2.'")
        );
        assert_eq!(
            theorem(&store, "ch/1.2 Groups.md", 2).main_title.as_deref(),
            Some("Theorem 1.2.A'")
        );
    }

    #[test]
    fn test_ref_formats() {
        let settings = NumberingSettings::default();
        let thm = TheoremSettings {
            kind: "theorem".into(),
            number: "auto".into(),
            title: Some("Pythagoras".into()),
            fold: String::new(),
            legacy: false,
        };
        let main = format_main_title(&thm, Some(2), &settings, "");
        assert_eq!(main, "Theorem 3");
        let title = thm.title.as_deref();
        assert_eq!(
            format_ref_name(&main, title, TheoremRefFormat::TypeNumberTitle),
            "Theorem 3 (Pythagoras)"
        );
        assert_eq!(format_ref_name(&main, title, TheoremRefFormat::TypeNumber), "Theorem 3");
        assert_eq!(
            format_ref_name(&main, title, TheoremRefFormat::TitleOrTypeNumber),
            "Pythagoras"
        );
        assert_eq!(
            format_ref_name(&main, title, TheoremRefFormat::TitleWithTypeNumber),
            "Pythagoras (Theorem 3)"
        );
        assert_eq!(
            format_ref_name(&main, None, TheoremRefFormat::TitleWithTypeNumber),
            "Theorem 3"
        );
        // auto without an index
        assert_eq!(format_main_title(&thm, None, &settings, ""), "Theorem");
    }

    #[test]
    fn test_only_theorem_becomes_main() {
        let mut store = ObjectStore::new();
        store_doc(&mut store, "a.md", "> [!prop] Key fact\n");
        let summary = update_names(&mut store, "a.md", &NumberingSettings::default(), true);
        assert_eq!(summary.main_theorem.as_deref(), Some("a.md/block1"));
        assert!(theorem(&store, "a.md", 1).main);
        assert_eq!(
            store.page("a.md").unwrap().ref_name.as_deref(),
            Some("Proposition 1 (Key fact)")
        );

        // disabled: no main, no page ref name
        store_doc(&mut store, "a.md", "> [!prop] Key fact\n");
        number(&mut store, "a.md");
        assert_eq!(store.page("a.md").unwrap().ref_name, None);
    }

    #[test]
    fn test_explicit_main_comment() {
        let mut store = ObjectStore::new();
        store_doc(
            &mut store,
            "a.md",
            "> [!lem]\n\n> [!thm] Big\n> %% main %%\n> %% label: big %%\n",
        );
        let summary = number(&mut store, "a.md");
        assert_eq!(summary.main_theorem.as_deref(), Some("a.md/block2"));
        assert_eq!(
            store.page("a.md").unwrap().ref_name.as_deref(),
            Some("Theorem 2 (Big)")
        );
        assert_eq!(theorem(&store, "a.md", 2).formatted_label.as_deref(), Some("thm:big"));
    }

    #[test]
    fn test_profile_display_names() {
        let mut store = ObjectStore::new();
        store_doc(&mut store, "a.md", "> [!thm]\n");
        let settings = NumberingSettings {
            profile: "日本語".into(),
            ..Default::default()
        };
        update_names(&mut store, "a.md", &settings, false);
        assert_eq!(theorem(&store, "a.md", 1).main_title.as_deref(), Some("定理 1"));
    }

    #[test]
    fn test_missing_page_is_noop() {
        let mut store = ObjectStore::new();
        assert_eq!(number(&mut store, "nope.md"), NumberingSummary::default());
    }

    #[test]
    fn test_numbering_keeps_revision() {
        let mut store = ObjectStore::new();
        store_doc(&mut store, "a.md", "> [!thm]\n");
        let before = store.revision();
        number(&mut store, "a.md");
        assert_eq!(store.revision(), before);
    }

    #[test]
    fn test_infer_number_prefix() {
        assert_eq!(infer_number_prefix("3.1 Limits", r"^[0-9]+(\.[0-9]+)*").as_deref(), Some("3.1."));
        assert_eq!(infer_number_prefix("4. Series", r"^[0-9]+\.?").as_deref(), Some("4."));
        assert_eq!(infer_number_prefix("Limits", r"^[0-9]+(\.[0-9]+)*"), None);
        assert_eq!(infer_number_prefix("3 x", r"(unclosed"), None);
    }
}
