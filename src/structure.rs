//! Pure markup-to-tree transform: comment stripping, footnote deduplication,
//! redirect detection and recursive section decomposition. Stateless, so the
//! coordinator runs it concurrently across pages in any order.

use crate::config::MAX_HEADING_LEVEL;
use crate::models::{DocumentBody, SectionNode, TocNode};
use crate::segment;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rustc_hash::{FxHashMap, FxHashSet};

const INFOBOX_PREFIX: &str = "{{Infobox";

static COMMENT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

static REF_PAIRED_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<ref[^>]*?(?: name="([^"]*)")?[^>]*?>([^<]*?)</ref>"#).unwrap()
});

// Also matches self-closing `<ref ... />` occurrences for the rewrite pass.
static REF_ANY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<ref[^>]*?(?: name="([^"]*)")?[^>]*?(?:>[^<]*?</ref>|/>)"#).unwrap()
});

static REDIRECT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^#redirect\s?\[\[([^\[\]]*?)(?:\|[^\[\]]*?)?\]\]").unwrap()
});

pub fn strip_comments(source: &str) -> String {
    COMMENT_REGEX.replace_all(source, "").into_owned()
}

/// Deduplicates footnote tags and rewrites every occurrence to a normalized
/// `<ref>N</ref>` marker.
///
/// The returned list holds each distinct full tag text once, in first-seen
/// order; markers carry the 1-based index into that list. Named occurrences
/// resolve through a name table in which the most recently scanned distinct
/// tag text wins, while numbering keeps first-seen order. A name that was
/// never defined by a paired tag resolves to the literal `unknown`.
pub fn filter_refs(source: &str) -> (String, Vec<String>) {
    let mut unique: Vec<String> = Vec::new();
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut name_to_ref: FxHashMap<&str, &str> = FxHashMap::default();

    for caps in REF_PAIRED_REGEX.captures_iter(source) {
        let full = caps.get(0).unwrap().as_str();
        if !seen.insert(full) {
            continue;
        }
        unique.push(full.to_string());
        if let Some(name) = caps.get(1) {
            name_to_ref.insert(name.as_str(), full);
        }
    }

    let ref_to_id: FxHashMap<&str, usize> = unique
        .iter()
        .enumerate()
        .map(|(i, text)| (text.as_str(), i + 1))
        .collect();

    let replaced = REF_ANY_REGEX.replace_all(source, |caps: &Captures| {
        let resolved = match caps.get(1) {
            Some(name) => name_to_ref.get(name.as_str()).copied().unwrap_or("unknown"),
            None => caps.get(0).unwrap().as_str(),
        };
        match ref_to_id.get(resolved) {
            Some(id) => format!("<ref>{id}</ref>"),
            None => "<ref>unknown</ref>".to_string(),
        }
    });

    (replaced.into_owned(), unique)
}

/// Target of a `#REDIRECT [[...]]` page, with any `|display text` dropped.
/// Case-insensitive, and only recognized at the very start of the text.
pub fn parse_redirect(source: &str) -> Option<String> {
    REDIRECT_REGEX
        .captures(source)
        .map(|caps| caps[1].to_string())
}

/// Recursively decomposes one segment whose heading sits at `level - 1`,
/// splitting out children at `level`. Heading levels cannot exceed
/// [`MAX_HEADING_LEVEL`], which bounds the recursion by construction.
fn parse_section(text: &str, level: usize) -> SectionNode {
    let (leading, children) = if level <= MAX_HEADING_LEVEL {
        segment::split_sections(text, level)
    } else {
        (text, Vec::new())
    };
    SectionNode {
        title: leading
            .lines()
            .next()
            .unwrap_or("")
            .replace('=', "")
            .trim()
            .to_string(),
        leading: leading.to_string(),
        sub_sections: children
            .into_iter()
            .map(|child| parse_section(child, level + 1))
            .collect(),
    }
}

fn toc_of(section: &SectionNode) -> TocNode {
    TocNode {
        title: section.title.clone(),
        sub: section.sub_sections.iter().map(toc_of).collect(),
    }
}

/// Structures one page's raw wikitext. Pure and side-effect free.
pub fn structure(source: &str) -> DocumentBody {
    let source = strip_comments(source);
    let (source, references) = filter_refs(&source);
    let redirected_to = parse_redirect(&source);

    let (lead, top_segments) = segment::split_sections(&source, 2);

    let infobox = segment::templates(lead)
        .into_iter()
        .find(|tpl| tpl.starts_with(INFOBOX_PREFIX))
        .map(str::to_string);
    let leading = match &infobox {
        Some(infobox) => lead.replace(infobox.as_str(), ""),
        None => lead.to_string(),
    };

    let sub_sections: Vec<SectionNode> = top_segments
        .into_iter()
        .map(|seg| parse_section(seg, 3))
        .collect();
    let toc = sub_sections.iter().map(toc_of).collect();

    DocumentBody {
        leading,
        infobox,
        toc,
        sub_sections,
        references,
        redirected_to,
    }
}
