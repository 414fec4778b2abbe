//! End-to-end tests over the public API, against real directories.

use folio::config::load_config;
use folio::io::{FileSystem, Globber};
use folio::modules::{FromPipeline, ReadFiles};
use folio::{Document, Engine, FnModule, MapModule, Module, Pipeline};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn project(config: &str, files: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("folio.toml"), config).unwrap();
    for (relative, content) in files {
        write(tmp.path(), relative, content);
    }
    tmp
}

fn texts(docs: &[Document]) -> Vec<String> {
    docs.iter().map(|d| d.text().into_owned()).collect()
}

// =========================================================================
// Two pipelines
// =========================================================================

#[test]
fn second_pipeline_uppercases_first_pipelines_output() {
    let tmp = project(
        r#"
[[pipelines]]
name = "a"
modules = [{ type = "read_files", patterns = ["x.md"] }]
"#,
        &[("input/x.md", "hello")],
    );
    let config = load_config(tmp.path()).unwrap();
    let mut engine = config.build_engine(tmp.path()).unwrap();
    engine
        .add_pipeline(
            Pipeline::new("b")
                .with_module(FromPipeline::new(["a"]))
                .with_module(MapModule::new("Uppercase", |doc, _| {
                    Ok(doc.with_content(doc.text().to_uppercase()))
                })),
        )
        .unwrap();

    let summary = engine.execute().unwrap();
    assert!(!summary.has_failures());

    let a = engine.documents().get("a").unwrap();
    assert_eq!(texts(&a), vec!["hello"]);
    let b = engine.documents().get("b").unwrap();
    assert_eq!(texts(&b), vec!["HELLO"]);
    assert_eq!(b[0].source(), a[0].source());
}

#[test]
fn pipeline_output_is_visible_only_to_later_pipelines() {
    let tmp = TempDir::new().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let observe = |label: &'static str, seen: Arc<Mutex<Vec<(&'static str, bool)>>>| {
        FnModule::new("Observe", move |inputs, ctx| {
            seen.lock().unwrap().push((label, ctx.documents().contains("one")));
            Ok(inputs.to_vec())
        })
    };

    let mut engine = Engine::new(FileSystem::local(tmp.path().to_string_lossy().into_owned()));
    engine
        .add_pipeline(
            Pipeline::new("one")
                .with_module(observe("one/first", seen.clone()))
                .with_module(observe("one/second", seen.clone())),
        )
        .unwrap();
    engine
        .add_pipeline(Pipeline::new("two").with_module(observe("two", seen.clone())))
        .unwrap();
    engine.execute().unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![("one/first", false), ("one/second", false), ("two", true)]
    );
}

// =========================================================================
// Globbing over disk
// =========================================================================

fn glob_matches(root: &Path, patterns: &[&str]) -> Vec<String> {
    let fs = FileSystem::local(root.to_string_lossy().into_owned()).with_input_paths(["a"]);
    let input = fs.input_paths().remove(0);
    let mut matched: Vec<String> = fs
        .match_input_files(&Globber::new(patterns).unwrap())
        .unwrap()
        .iter()
        .map(|f| f.path().relative_to(&input).unwrap().as_str().to_string())
        .collect();
    matched.sort();
    matched
}

#[test]
fn recursive_glob_with_exclusion() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a/b/c/foo.txt", "foo");
    write(tmp.path(), "a/b/d/baz.txt", "baz");

    assert_eq!(glob_matches(tmp.path(), &["**/baz.txt"]), vec!["b/d/baz.txt"]);
    assert!(glob_matches(tmp.path(), &["**/baz.txt", "!**/d/*"]).is_empty());

    write(tmp.path(), "a/b/c/baz.txt", "baz");
    assert_eq!(
        glob_matches(tmp.path(), &["**/baz.txt"]),
        vec!["b/c/baz.txt", "b/d/baz.txt"]
    );
}

#[test]
fn earlier_input_root_shadows_later_one() {
    let tmp = project(
        r#"
input = ["input", "theme"]

[[pipelines]]
name = "pages"
modules = [
  { type = "read_files", patterns = ["*.html"] },
  { type = "write_files" },
]
"#,
        &[
            ("input/index.html", "mine"),
            ("theme/index.html", "theme"),
            ("theme/about.html", "about"),
        ],
    );
    let mut engine = load_config(tmp.path())
        .unwrap()
        .build_engine(tmp.path())
        .unwrap();
    engine.execute().unwrap();

    let out = tmp.path().join("output");
    assert_eq!(fs::read_to_string(out.join("index.html")).unwrap(), "mine");
    assert_eq!(fs::read_to_string(out.join("about.html")).unwrap(), "about");
}

// =========================================================================
// Repeated passes
// =========================================================================

#[test]
fn rebuild_picks_up_changed_files() {
    let tmp = project(
        r#"
[[pipelines]]
name = "content"
modules = [
  { type = "read_files", patterns = ["**/*.md"] },
  { type = "set_metadata", key = "layout", value = "post" },
  { type = "write_files", extension = "html" },
]
"#,
        &[("input/posts/one.md", "first"), ("input/two.md", "second")],
    );
    let mut engine = load_config(tmp.path())
        .unwrap()
        .build_engine(tmp.path())
        .unwrap();

    let first = engine.execute().unwrap();
    assert_eq!(first.pass, 1);
    assert_eq!(first.total_documents(), 2);
    let one = tmp.path().join("output/posts/one.html");
    assert_eq!(fs::read_to_string(&one).unwrap(), "first");

    write(tmp.path(), "input/posts/one.md", "edited");
    let second = engine.execute().unwrap();
    assert_eq!(second.pass, 2);
    assert_eq!(fs::read_to_string(&one).unwrap(), "edited");
    // the unchanged document was not rewritten
    assert!(second.cache.hits >= 1);

    let docs = engine.documents().get("content").unwrap();
    assert!(
        docs.iter()
            .all(|d| d.get_string("layout").as_deref() == Some("post"))
    );
}

#[test]
fn cache_entries_for_deleted_files_are_evicted() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "input/a.txt", "a");
    write(tmp.path(), "input/b.txt", "b");

    let computed = Arc::new(Mutex::new(0usize));
    let counter = computed.clone();
    let expensive = MapModule::new("Expensive", move |doc, ctx| {
        if let Some(cached) = ctx.cache().try_get_document_value::<String>(doc, None) {
            return Ok(doc.with_content(cached));
        }
        *counter.lock().unwrap() += 1;
        let result = format!("<{}>", doc.text());
        ctx.cache().set_document(doc, None, result.clone());
        Ok(doc.with_content(result))
    });

    let mut engine = Engine::new(
        FileSystem::local(tmp.path().to_string_lossy().into_owned()).with_input_paths(["input"]),
    );
    engine
        .add_pipeline(
            Pipeline::new("p")
                .with_module(ReadFiles::new(&["*.txt"]).unwrap())
                .with_module(expensive),
        )
        .unwrap();

    let first = engine.execute().unwrap();
    assert_eq!(*computed.lock().unwrap(), 2);
    assert_eq!(first.cache.entries, 2);

    fs::remove_file(tmp.path().join("input/b.txt")).unwrap();
    let second = engine.execute().unwrap();
    assert_eq!(*computed.lock().unwrap(), 2);
    assert_eq!(second.cache.hits, 1);
    assert_eq!(second.cache.entries, 1);
    assert_eq!(second.cache.evicted, 1);
    assert_eq!(texts(&engine.documents().get("p").unwrap()), vec!["<a>"]);
}

#[test]
fn process_once_pipeline_builds_on_its_previous_output() {
    let tmp = TempDir::new().unwrap();
    let mut engine = Engine::new(FileSystem::local(tmp.path().to_string_lossy().into_owned()));
    let append: Arc<dyn Module> = Arc::new(MapModule::new("Append", |doc, _| {
        Ok(doc.with_content(format!("{}+", doc.text())))
    }));
    engine
        .add_pipeline(
            Pipeline::new("once")
                .process_documents_once(true)
                .with_modules([append]),
        )
        .unwrap();

    for expected in ["+", "++", "+++"] {
        engine.execute().unwrap();
        assert_eq!(texts(&engine.documents().get("once").unwrap()), vec![expected]);
    }
}
