// tests/download_tests.rs

mod common;

use std::sync::Arc;

use common::{MockRequests, runnable};
use parking_lot::Mutex;
use pickaxe_lang::http::{DownloadError, HttpRequest, RequestFactory, Wire};
use pickaxe_lang::{
    FailurePolicy, Runnable, RuntimeConfig, RuntimeError, ScraperDomFactory, Value, compile,
};

fn links_script(urls: &[&str], hints: &str) -> String {
    let mut code = String::from("create buffer links(url string)\n");
    for url in urls {
        code.push_str(&format!("insert into links select '{}'\n", url));
    }
    code.push_str(&format!(
        "select url, pick '.center' from download page (select url from links) {}\n",
        hints
    ));
    code
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn test_rows_follow_wire_order_not_completion_order() {
    let urls = [
        "http://mock.com/1?delay=80",
        "http://mock.com/2?delay=40",
        "http://mock.com/3?delay=0",
        "http://mock.com/4?delay=20",
        "http://mock.com/5?delay=0",
    ];
    let requests = MockRequests::new();
    let fetched = Arc::clone(&requests.fetched);
    let tables = runnable(&links_script(&urls, "with thread 4"), requests)
        .collect()
        .unwrap();

    let table = &tables[0];
    let got: Vec<_> = table.rows().map(|r| r[0].to_string()).collect();
    assert_eq!(got, urls);
    assert!(table.rows().all(|r| r[1].to_string() == "here"));
    assert_eq!(fetched.lock().len(), urls.len());
}

#[test]
fn test_statement_level_thread_hint() {
    let urls = ["http://mock.com/a?delay=30", "http://mock.com/b"];
    let code = links_script(&urls, "with (thread(2))");
    let tables = runnable(&code, MockRequests::new()).collect().unwrap();
    assert_eq!(tables[0].text(0, 0).as_deref(), Some(urls[0]));
    assert_eq!(tables[0].text(1, 0).as_deref(), Some(urls[1]));
}

#[test]
fn test_null_urls_are_skipped() {
    let code = r#"
create buffer links(url string, note string)
insert into links(note) select 'no url'
insert into links(url) select 'http://mock.com'
select url from download page (select url from links)
"#;
    let tables = runnable(code, MockRequests::new()).collect().unwrap();
    assert_eq!(tables[0].row_count(), 1);
    assert_eq!(tables[0].text(0, 0).as_deref(), Some("http://mock.com"));
}

#[test]
fn test_empty_url_query_gives_empty_table() {
    let code = r#"
create buffer links(url string)
select url from download page (select url from links)
"#;
    let tables = runnable(code, MockRequests::new()).collect().unwrap();
    assert_eq!(tables.len(), 1);
    assert!(tables[0].is_empty());
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_failure_aborts_statement() {
    let urls = ["http://mock.com/ok", "http://mock.com/fail", "http://mock.com/ok2"];
    let mut code = String::from("select 'before'\n");
    code.push_str(&links_script(&urls, "with thread 2"));
    code.push_str("select 'after'\n");

    let mut delivered = Vec::new();
    let err = runnable(&code, MockRequests::new())
        .run(|table| delivered.push(table))
        .unwrap_err();

    match err {
        RuntimeError::Download { index, url, source } => {
            assert_eq!(index, 1);
            assert_eq!(url, "http://mock.com/fail");
            assert!(matches!(source, DownloadError::Status(500)));
        }
        other => panic!("expected download error, got {:?}", other),
    }
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].text(0, 0).as_deref(), Some("before"));
}

#[test]
fn test_failure_stops_claiming_wires() {
    let urls = ["http://mock.com/fail", "http://mock.com/a", "http://mock.com/b"];
    let requests = MockRequests::new();
    let fetched = Arc::clone(&requests.fetched);
    let result = runnable(&links_script(&urls, ""), requests).collect();

    assert!(matches!(result, Err(RuntimeError::Download { index: 0, .. })));
    assert_eq!(*fetched.lock(), vec!["http://mock.com/fail".to_string()]);
}

#[test]
fn test_null_row_policy_keeps_going() {
    let urls = ["http://mock.com/ok", "http://mock.com/fail", "http://mock.com/ok2"];
    let config = RuntimeConfig {
        download_failure: FailurePolicy::NullRow,
        ..RuntimeConfig::default()
    };
    let tables = runnable(&links_script(&urls, "with thread 3"), MockRequests::new())
        .with_config(config)
        .collect()
        .unwrap();

    let table = &tables[0];
    assert_eq!(table.row_count(), 3);
    assert_eq!(table.text(1, 0).as_deref(), Some("http://mock.com/fail"));
    assert_eq!(table.cell(1, 1), None);
    assert_eq!(table.text(2, 1).as_deref(), Some("here"));
}

#[test]
fn test_null_row_goes_through_filter() {
    let urls = ["http://mock.com/ok", "http://mock.com/fail"];
    let config = RuntimeConfig {
        download_failure: FailurePolicy::NullRow,
        ..RuntimeConfig::default()
    };

    let mut code = links_script(&urls, "");
    code = code.replace(
        "(select url from links) \n",
        "(select url from links) where pick '.center' = 'here'\n",
    );
    let tables = runnable(&code, MockRequests::new())
        .with_config(config.clone())
        .collect()
        .unwrap();
    assert_eq!(tables[0].row_count(), 1);
    assert_eq!(tables[0].text(0, 0).as_deref(), Some("http://mock.com/ok"));

    let mut code = links_script(&urls, "");
    code = code.replace(
        "(select url from links) \n",
        "(select url from links) where url = 'http://mock.com/fail'\n",
    );
    let tables = runnable(&code, MockRequests::new())
        .with_config(config)
        .collect()
        .unwrap();
    assert_eq!(tables[0].row_count(), 1);
    assert_eq!(tables[0].text(0, 0).as_deref(), Some("http://mock.com/fail"));
    assert_eq!(tables[0].cell(0, 1), None);
}

#[test]
fn test_bad_selector_fails_before_fetching() {
    let requests = MockRequests::new();
    let fetched = Arc::clone(&requests.fetched);
    let result = runnable("select pick 'div[' from download page 'http://mock.com'", requests).collect();

    assert!(matches!(result, Err(RuntimeError::Selector { .. })));
    assert!(fetched.lock().is_empty());
}

#[test]
fn test_bad_pattern_is_runtime_error() {
    let result = runnable(
        "select pick '.center' match '(' from download page 'http://mock.com'",
        MockRequests::new(),
    )
    .collect();
    assert!(matches!(result, Err(RuntimeError::Regex { .. })));
}

#[test]
fn test_malformed_json_is_download_error() {
    let requests = MockRequests::new().with_body("http://api.mock", "{nope");
    let result = runnable("select a from download json 'http://api.mock'", requests).collect();
    assert!(matches!(
        result,
        Err(RuntimeError::Download {
            source: DownloadError::Json(_),
            ..
        })
    ));
}

// ============================================================================
// Images
// ============================================================================

#[test]
fn test_image_rows() {
    let code = r#"
create buffer images(url string)
insert into images select 'http://img.mock/logo.png'
insert into images select 'http://img.mock/blank.gif?v=2'
select url, size, filename, date from download image (select url from images) with thread 2
"#;
    let requests = MockRequests::new()
        .with_body("http://img.mock/logo.png", "\u{89}PNG\r\n")
        .with_body("http://img.mock/blank.gif?v=2", "");
    let tables = runnable(code, requests).collect().unwrap();

    let table = &tables[0];
    assert_eq!(table.labels(), vec!["url", "size", "filename", "date"]);
    assert_eq!(table.row_count(), 2);

    assert_eq!(table.text(0, 0).as_deref(), Some("http://img.mock/logo.png"));
    assert_eq!(table.value(0, 1), Some(&Value::Integer(7)));
    let filename = table.text(0, 2).unwrap();
    assert!(filename.ends_with(".png"));
    assert_eq!(filename.len(), 32 + ".png".len());
    assert!(table.text(0, 3).unwrap().ends_with('Z'));

    assert_eq!(table.value(1, 1), Some(&Value::Integer(0)));
    assert_eq!(table.text(1, 2).as_deref(), Some(""));
}

#[test]
fn test_image_filenames_are_unique() {
    let code = r#"
create buffer images(url string)
insert into images select 'http://img.mock/a.jpg'
insert into images select 'http://img.mock/a.jpg'
select filename from download image (select url from images)
"#;
    let tables = runnable(code, MockRequests::new()).collect().unwrap();
    let names: Vec<_> = tables[0].rows().map(|r| r[0].to_string()).collect();
    assert_eq!(names.len(), 2);
    assert_ne!(names[0], names[1]);
    assert!(names.iter().all(|n| n.ends_with(".jpg")));
}

#[test]
fn test_failed_image_keeps_url_under_null_row() {
    let config = RuntimeConfig {
        download_failure: FailurePolicy::NullRow,
        ..RuntimeConfig::default()
    };
    let tables = runnable("select * from download image 'http://img.mock/fail.png'", MockRequests::new())
        .with_config(config)
        .collect()
        .unwrap();
    assert_eq!(tables[0].labels(), vec!["url", "size", "date", "filename"]);
    assert_eq!(tables[0].text(0, 0).as_deref(), Some("http://img.mock/fail.png"));
    assert_eq!(tables[0].cell(0, 1), None);
    assert_eq!(tables[0].cell(0, 3), None);
}

// ============================================================================
// Hints reach the request factory
// ============================================================================

#[derive(Default)]
struct Recorder {
    wires: Arc<Mutex<Vec<Wire>>>,
}

struct Empty;

impl HttpRequest for Empty {
    fn download(&self) -> Result<Vec<u8>, DownloadError> {
        Ok(b"<p></p>".to_vec())
    }
}

impl RequestFactory for Recorder {
    fn create(&self, wire: &Wire) -> Box<dyn HttpRequest> {
        self.wires.lock().push(wire.clone());
        Box::new(Empty)
    }
}

#[test]
fn test_wires_carry_hints() {
    let recorder = Recorder::default();
    let wires = Arc::clone(&recorder.wires);
    let plan = compile("select url from download page 'http://mock.com' with js, thread 3").unwrap();
    Runnable::new(plan, Arc::new(recorder), Arc::new(ScraperDomFactory::new()))
        .collect()
        .unwrap();

    let wires = wires.lock();
    assert_eq!(wires.len(), 1);
    assert!(wires[0].js);
    assert_eq!(wires[0].threads, Some(3));
}
