//! End-to-end tests for the extraction pipeline and the lookup path.
//!
//! Tests run a real extraction into a TempDir and then validate the store
//! through the public lookup API and by inspecting the files on disk:
//!
//! - **Pipeline tests** -- dump in, structured JSONL shards plus index out
//! - **Lookup tests** -- redirect following, cycle detection, error cases
//! - **Resume tests** -- a rerun skips stored titles, appends instead of
//!   rewriting, and recovers from a partial trailing line left by a crash
//!
//! All tests share a `sample_xml()` fixture: one full article with an
//! infobox, nested sections and references ("Ada Lovelace"), one redirect to
//! it ("Ada"), and one plain article ("Charles Babbage"). Each test gets its
//! own TempDir.

use ariadne::config::ExtractOptions;
use ariadne::extract::run_extraction;
use ariadne::lookup::{resolve, LookupError};
use bzip2::write::BzEncoder;
use bzip2::Compression;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn page(title: &str, text: &str) -> String {
    format!(
        "<page><title>{title}</title><revision>\
         <timestamp>2024-01-15T10:30:00Z</timestamp>\
         <format>text/x-wiki</format><text>{text}</text>\
         </revision></page>"
    )
}

const ADA_TEXT: &str = "{{Infobox person
| name = Ada Lovelace
| born = 1815
}}
Ada Lovelace was an English mathematician.&lt;ref&gt;Primary source&lt;/ref&gt;

== Early life ==
Born in London.&lt;ref&gt;Primary source&lt;/ref&gt;

=== Childhood ===
Tutored at home.

== Legacy ==
Honored widely.&lt;ref&gt;Another source&lt;/ref&gt;
";

fn sample_xml() -> String {
    format!(
        "<mediawiki>{}{}{}</mediawiki>",
        page("Ada Lovelace", ADA_TEXT),
        page("Ada", "#REDIRECT [[Ada Lovelace]]"),
        page(
            "Charles Babbage",
            "Charles Babbage designed the analytical engine.\n\n\
             == Difference engine ==\nNever completed in his lifetime.\n"
        ),
    )
}

/// Same dump plus one extra article, as a later snapshot would look.
fn extended_xml() -> String {
    let base = sample_xml();
    let extra = page("Mary Somerville", "Mary Somerville was a polymath.\n");
    base.replace("</mediawiki>", &format!("{extra}</mediawiki>"))
}

fn write_dump(dir: &Path, xml: &str) -> PathBuf {
    let path = dir.join("dump.xml");
    fs::write(&path, xml).unwrap();
    path
}

fn write_bz2_dump(dir: &Path, xml: &str) -> PathBuf {
    let path = dir.join("dump.xml.bz2");
    let file = fs::File::create(&path).unwrap();
    let mut encoder = BzEncoder::new(file, Compression::fast());
    encoder.write_all(xml.as_bytes()).unwrap();
    encoder.finish().unwrap();
    path
}

#[test]
fn extract_builds_a_resolvable_store() {
    let tmp = TempDir::new().unwrap();
    let dump = write_dump(tmp.path(), &sample_xml());
    let store = tmp.path().join("store");

    let stats = run_extraction(&dump, &store, &ExtractOptions::default()).unwrap();
    assert_eq!(stats.written(), 3);
    assert_eq!(stats.skipped(), 0);
    assert_eq!(stats.failed(), 0);

    let doc = resolve(&store, "Ada Lovelace", true).unwrap();
    assert_eq!(doc.title, "Ada Lovelace");
    assert_eq!(doc.timestamp, Some(1705314600.0));
    assert!(doc.body.leading.contains("English mathematician"));
    assert!(doc
        .body
        .infobox
        .as_deref()
        .unwrap()
        .starts_with("{{Infobox person"));
    // the infobox text is lifted out of the lead
    assert!(!doc.body.leading.contains("Infobox"));
    assert!(doc.body.redirected_to.is_none());

    // duplicated reference collapses to one entry, markers are 1-based
    assert_eq!(
        doc.body.references,
        vec!["<ref>Primary source</ref>", "<ref>Another source</ref>"]
    );
    assert!(doc.body.leading.contains("<ref>1</ref>"));

    // section tree and table of contents mirror the heading nesting
    assert_eq!(doc.body.sub_sections.len(), 2);
    assert_eq!(doc.body.sub_sections[0].title, "Early life");
    assert_eq!(doc.body.sub_sections[0].sub_sections[0].title, "Childhood");
    assert_eq!(doc.body.sub_sections[1].title, "Legacy");
    assert_eq!(doc.body.toc.len(), 2);
    assert_eq!(doc.body.toc[0].title, "Early life");
    assert_eq!(doc.body.toc[0].sub[0].title, "Childhood");
}

#[test]
fn extract_reads_bz2_dumps() {
    let tmp = TempDir::new().unwrap();
    let dump = write_bz2_dump(tmp.path(), &sample_xml());
    let store = tmp.path().join("store");

    let stats = run_extraction(&dump, &store, &ExtractOptions::default()).unwrap();
    assert_eq!(stats.written(), 3);
    assert!(resolve(&store, "Charles Babbage", true).is_ok());
}

#[test]
fn lookup_follows_redirect_chain() {
    let tmp = TempDir::new().unwrap();
    let dump = write_dump(tmp.path(), &sample_xml());
    let store = tmp.path().join("store");
    run_extraction(&dump, &store, &ExtractOptions::default()).unwrap();

    let doc = resolve(&store, "Ada", true).unwrap();
    assert_eq!(doc.title, "Ada Lovelace");
    assert!(doc.body.redirected_to.is_none());
}

#[test]
fn lookup_can_return_the_redirect_stub() {
    let tmp = TempDir::new().unwrap();
    let dump = write_dump(tmp.path(), &sample_xml());
    let store = tmp.path().join("store");
    run_extraction(&dump, &store, &ExtractOptions::default()).unwrap();

    let doc = resolve(&store, "Ada", false).unwrap();
    assert_eq!(doc.title, "Ada");
    assert_eq!(doc.body.redirected_to.as_deref(), Some("Ada Lovelace"));
}

#[test]
fn lookup_detects_circular_redirects() {
    let tmp = TempDir::new().unwrap();
    let xml = format!(
        "<mediawiki>{}{}</mediawiki>",
        page("Loop A", "#REDIRECT [[Loop B]]"),
        page("Loop B", "#REDIRECT [[Loop A]]"),
    );
    let dump = write_dump(tmp.path(), &xml);
    let store = tmp.path().join("store");
    run_extraction(&dump, &store, &ExtractOptions::default()).unwrap();

    let err = resolve(&store, "Loop A", true).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LookupError>(),
        Some(LookupError::CircularRedirect(title)) if title == "Loop A"
    ));

    // without following, the stub comes back as-is
    let doc = resolve(&store, "Loop A", false).unwrap();
    assert_eq!(doc.body.redirected_to.as_deref(), Some("Loop B"));
}

#[test]
fn lookup_unknown_title_fails() {
    let tmp = TempDir::new().unwrap();
    let dump = write_dump(tmp.path(), &sample_xml());
    let store = tmp.path().join("store");
    run_extraction(&dump, &store, &ExtractOptions::default()).unwrap();

    let err = resolve(&store, "No Such Page", true).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LookupError>(),
        Some(LookupError::TitleNotFound(title)) if title == "No Such Page"
    ));
}

#[test]
fn lookup_rejects_non_store_directory() {
    let tmp = TempDir::new().unwrap();
    let err = resolve(tmp.path(), "Anything", true).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LookupError>(),
        Some(LookupError::NotADestination(_))
    ));
}

#[test]
fn rerun_skips_stored_pages_and_appends() {
    let tmp = TempDir::new().unwrap();
    let store = tmp.path().join("store");

    let dump = write_dump(tmp.path(), &sample_xml());
    let stats = run_extraction(&dump, &store, &ExtractOptions::default()).unwrap();
    assert_eq!(stats.written(), 3);

    let shard = store.join("00/0.jsonl");
    let before = fs::read(&shard).unwrap();

    // second snapshot of the same wiki with one new article
    let dump = write_dump(tmp.path(), &extended_xml());
    let stats = run_extraction(&dump, &store, &ExtractOptions::default()).unwrap();
    assert_eq!(stats.skipped(), 3);
    assert_eq!(stats.written(), 1);

    // the rerun appended; everything the first run wrote is untouched
    let after = fs::read(&shard).unwrap();
    assert!(after.starts_with(&before));
    assert_eq!(after.len(), before.len() + stats.bytes() as usize);

    assert!(resolve(&store, "Ada Lovelace", true).is_ok());
    let doc = resolve(&store, "Mary Somerville", true).unwrap();
    assert!(doc.body.leading.contains("polymath"));
}

#[test]
fn rerun_discards_a_partial_trailing_line() {
    let tmp = TempDir::new().unwrap();
    let store = tmp.path().join("store");

    let dump = write_dump(tmp.path(), &sample_xml());
    run_extraction(&dump, &store, &ExtractOptions::default()).unwrap();

    // simulate a crash mid-append: unindexed, unterminated bytes at the tail
    let shard = store.join("00/0.jsonl");
    let mut file = fs::OpenOptions::new().append(true).open(&shard).unwrap();
    file.write_all(b"{\"title\":\"Torn").unwrap();
    drop(file);

    let dump = write_dump(tmp.path(), &extended_xml());
    let stats = run_extraction(&dump, &store, &ExtractOptions::default()).unwrap();
    assert_eq!(stats.skipped(), 3);
    assert_eq!(stats.written(), 1);

    // the torn tail is gone and every remaining line is valid JSON
    let content = fs::read_to_string(&shard).unwrap();
    assert!(!content.contains("Torn"));
    assert_eq!(content.lines().count(), 4);
    for line in content.lines() {
        serde_json::from_str::<serde_json::Value>(line).unwrap();
    }

    assert!(resolve(&store, "Mary Somerville", true).is_ok());
}

#[test]
fn tiny_rotation_caps_spread_records_across_files() {
    let tmp = TempDir::new().unwrap();
    let dump = write_dump(tmp.path(), &sample_xml());
    let store = tmp.path().join("store");

    let opts = ExtractOptions {
        workers: 1,
        max_shard_bytes: 64,
        max_files_per_dir: 2,
        dir_length: 1,
    };
    let stats = run_extraction(&dump, &store, &opts).unwrap();
    assert_eq!(stats.written(), 3);

    // every record is larger than the cap, so each lands in its own file
    assert!(store.join("00/0.jsonl").is_file());
    assert!(store.join("00/1.jsonl").is_file());
    assert!(store.join("01/0.jsonl").is_file());

    // lookups still resolve across the rotated layout
    for title in ["Ada Lovelace", "Ada", "Charles Babbage"] {
        assert!(resolve(&store, title, false).is_ok());
    }
}

#[test]
fn store_layout_is_self_describing() {
    let tmp = TempDir::new().unwrap();
    let dump = write_dump(tmp.path(), &sample_xml());
    let store = tmp.path().join("store");
    run_extraction(&dump, &store, &ExtractOptions::default()).unwrap();

    assert!(store.join("index.json").is_file());
    // default key length of 2 hex chars means 256 index shards
    let shards = fs::read_dir(store.join("index")).unwrap().count();
    assert_eq!(shards, 256);

    let metadata: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(store.join("index.json")).unwrap()).unwrap();
    assert_eq!(metadata["index_path"], "index");
    assert_eq!(metadata["dir_length"], 2);
    assert!(metadata["_progress"].is_array());
}
