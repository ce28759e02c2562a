//
// staticify.rs
//
// Writing computed equation numbers back into a document as \tag{..}
//

use crate::metadata::LineSpan;
use crate::store::ObjectStore;

/// Result of a document rewrite request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The document was rewritten; carries the number of equations tagged
    Written(usize),
    /// A range to rewrite contains the line being edited; nothing was written
    Refused,
    /// No numbered, untagged equations
    Unchanged,
}

/// Replacement text for one equation block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquationRewrite {
    pub position: LineSpan,
    pub replacement: String,
}

/// Rewrites for every numbered equation of `path` that has no manual tag.
/// `lines` is the current document text; a trailing `^id` on the closing
/// line is carried over.
pub fn plan_rewrites(store: &ObjectStore, path: &str, lines: &[&str]) -> Vec<EquationRewrite> {
    let mut rewrites = Vec::new();
    for block in store.blocks_of(path) {
        let Some(equation) = block.equation() else {
            continue;
        };
        if equation.manual_tag.is_some() {
            continue;
        }
        let Some(print_name) = &equation.print_name else {
            continue;
        };
        if block.position.end >= lines.len() {
            log::debug!("Equation {} is past the end of {}", block.id, path);
            continue;
        }
        let tag = print_name
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .unwrap_or(print_name);

        let mut closing = "$$".to_string();
        if let Some(id) = &block.block_id {
            let marker = format!("^{id}");
            if lines[block.position.end].trim_end().ends_with(&marker) {
                closing.push(' ');
                closing.push_str(&marker);
            }
        }

        rewrites.push(EquationRewrite {
            position: block.position,
            replacement: format!("$$\n{} \\tag{{{}}}\n{}", equation.math, tag, closing),
        });
    }
    rewrites
}

/// Apply non-overlapping rewrites to `text`, keeping a trailing newline.
pub fn apply_rewrites(text: &str, rewrites: &[EquationRewrite]) -> String {
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    let mut ordered: Vec<&EquationRewrite> = rewrites.iter().collect();
    ordered.sort_by_key(|r| std::cmp::Reverse(r.position.start));

    for rewrite in ordered {
        let LineSpan { start, end } = rewrite.position;
        if start >= lines.len() {
            continue;
        }
        let end = end.min(lines.len() - 1);
        lines.splice(start..=end, rewrite.replacement.lines().map(str::to_string));
    }

    let mut out = lines.join("\n");
    if text.ends_with('\n') {
        out.push('\n');
    }
    out
}
