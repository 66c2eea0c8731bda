// tests/select_tests.rs

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{MockRequests, run, runnable};
use pickaxe_lang::dom::{Document, DomError, DomFactory, Element};
use pickaxe_lang::{Runnable, RuntimeTable, ScraperDomFactory, Value, ValueType, compile};

// ============================================================================
// Selects without a download
// ============================================================================

#[test]
fn test_select_no_from() {
    let tables = run("select\n    1, 2 as num, 'test', 6.78 as measure\n");
    assert_eq!(tables.len(), 1);

    let table = &tables[0];
    assert_eq!(
        table.labels(),
        vec!["(No column name)", "num", "(No column name)", "measure"]
    );
    assert_eq!(table.row_count(), 1);
    assert_eq!(table.text(0, 0).as_deref(), Some("1"));
    assert_eq!(table.text(0, 1).as_deref(), Some("2"));
    assert_eq!(table.text(0, 2).as_deref(), Some("test"));
    assert_eq!(table.text(0, 3).as_deref(), Some("6.78"));
    assert_eq!(table.columns()[3].value_type, ValueType::Float);
}

#[test]
fn test_select_identity() {
    let code = r#"
create buffer temp(id identity, name string)

insert into temp
select 'test'

insert into temp
select 'test2'

select *
from temp
"#;
    let tables = run(code);
    assert_eq!(tables.len(), 1);

    let table = &tables[0];
    assert_eq!(table.labels(), vec!["id", "name"]);
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.text(0, 0).as_deref(), Some("1"));
    assert_eq!(table.text(1, 0).as_deref(), Some("2"));
    assert_eq!(table.text(1, 1).as_deref(), Some("test2"));
}

#[test]
fn test_case_multiple() {
    let code = r#"
create buffer temp(id int)

insert into temp
select 3

insert into temp
select 2

insert into temp
select 5

insert into temp
select 10

select
    id,
    case id
        when 5 then 'five'
        when 2 then 'two'
        when 3 then 'three'
        else 'no'
        end as description
    from temp
"#;
    let tables = run(code);
    let table = &tables[0];
    assert_eq!(table.labels(), vec!["id", "description"]);
    assert_eq!(table.row_count(), 4);

    let expected = [("3", "three"), ("2", "two"), ("5", "five"), ("10", "no")];
    for (row, (id, description)) in expected.iter().enumerate() {
        assert_eq!(table.text(row, 0).as_deref(), Some(*id));
        assert_eq!(table.text(row, 1).as_deref(), Some(*description));
    }
}

#[test]
fn test_case_boolean() {
    let code = r#"
create buffer temp(id int)

insert into temp
select 3

insert into temp
select 2

insert into temp
select 5

select
    id,
    case when id < 5 and id > 2 then 'hit' end
    from temp
"#;
    let tables = run(code);
    let table = &tables[0];
    assert_eq!(table.column_count(), 2);
    assert_eq!(table.row_count(), 3);
    assert_eq!(table.text(0, 0).as_deref(), Some("3"));
    assert_eq!(table.text(0, 1).as_deref(), Some("hit"));
    assert_eq!(table.cell(1, 1), None);
    assert_eq!(table.cell(2, 1), None);
}

#[test]
fn test_where_filters_buffer_rows() {
    let code = r#"
create buffer temp(id identity, name string)
insert into temp select 'a'
insert into temp select 'b'
insert into temp select 'c'
select name from temp where id >= 2
"#;
    let table = &run(code)[0];
    let names: Vec<_> = table.rows().map(|r| r[0].clone()).collect();
    assert_eq!(names, vec![Value::from("b"), Value::from("c")]);
}

#[test]
fn test_insert_from_buffer_snapshot() {
    let code = r#"
create buffer temp(id identity, name string)
insert into temp select 'a'
insert into temp select name + '!' from temp
select * from temp
"#;
    let table = &run(code)[0];
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.text(1, 0).as_deref(), Some("2"));
    assert_eq!(table.text(1, 1).as_deref(), Some("a!"));
}

#[test]
fn test_insert_named_columns_leaves_others_null() {
    let code = r#"
create buffer temp(id identity, name string, price float)
insert into temp(price) select '6566.00'
select * from temp
"#;
    let table = &run(code)[0];
    assert_eq!(table.cell(0, 1), None);
    assert_eq!(table.value(0, 2), Some(&Value::Float(6566.0)));
}

#[test]
fn test_every_select_is_delivered_in_order() {
    let code = "select 'first' select 'second'; select 'third'";
    let tables = run(code);
    let firsts: Vec<_> = tables.iter().map(|t| t.text(0, 0).unwrap()).collect();
    assert_eq!(firsts, vec!["first", "second", "third"]);
}

#[test]
fn test_runs_start_with_empty_buffers() {
    let code = r#"
create buffer temp(id identity, name string)
insert into temp select 'once'
select * from temp
"#;
    let runnable = runnable(code, MockRequests::new());
    let first = runnable.collect().unwrap();
    let second = runnable.collect().unwrap();
    assert_eq!(first, second);
    assert_eq!(second[0].row_count(), 1);
    assert_eq!(second[0].text(0, 0).as_deref(), Some("1"));
}

#[test]
fn test_division_yields_float() {
    let table = &run("select 7 / 2 as half, 8 / 2 as whole, 7 % 2 as rest")[0];
    assert_eq!(table.columns()[0].value_type, ValueType::Float);
    assert_eq!(table.value(0, 0), Some(&Value::Float(3.5)));
    assert_eq!(table.value(0, 1), Some(&Value::Float(4.0)));
    assert_eq!(table.value(0, 2), Some(&Value::Integer(1)));
}

// ============================================================================
// Picks against a downloaded page
// ============================================================================

#[test]
fn test_string_concat() {
    let code = r#"
select
    pick '#match-tests li:nth-child(2)' take text + 'concat'
    from download page 'http://mock.com'
"#;
    let table = &run(code)[0];
    assert_eq!(table.labels(), vec!["(No column name)"]);
    assert_eq!(table.row_count(), 1);
    assert_eq!(table.text(0, 0).as_deref(), Some("6concat"));
}

#[test]
fn test_replace() {
    let code = r#"
select
    pick '.address' take html match '(.*)<br>(.*)' replace '$1'
    from download page 'http://mock.com'
"#;
    let table = &run(code)[0];
    assert_eq!(table.text(0, 0).as_deref(), Some("4332 Forest Hill Blvd"));
}

#[test]
fn test_match() {
    let code = r#"
select
    pick 'div.dollar' take text match '[\d\.]+'
    from download page 'http://mock.com'
"#;
    let table = &run(code)[0];
    assert_eq!(table.text(0, 0).as_deref(), Some("6566.00"));
}

#[test]
fn test_pick_take_attribute() {
    let code = r#"
select
    pick 'a' take attribute 'href'
    from download page 'http://mock.com'
"#;
    let table = &run(code)[0];
    assert_eq!(table.row_count(), 1);
    assert_eq!(table.text(0, 0).as_deref(), Some("http://google.com"));
}

#[test]
fn test_pick_take_text() {
    let code = r#"
select
    pick '.center' take text
    from download page 'http://mock.com'
"#;
    let table = &run(code)[0];
    assert_eq!(table.text(0, 0).as_deref(), Some("here"));
}

#[test]
fn test_pick_defaults_to_text() {
    let code = "select pick '.center' as center from download page 'http://mock.com'";
    let table = &run(code)[0];
    assert_eq!(table.labels(), vec!["center"]);
    assert_eq!(table.text(0, 0).as_deref(), Some("here"));
}

#[test]
fn test_pick_first_case() {
    let code = r#"
select
    case pick 'li:first-child' take text match '[\d\.]+' when 6566 then 2 end
    from download page 'http://mock.com'
    where nodes = '#match-tests'
"#;
    let table = &run(code)[0];
    assert_eq!(table.column_count(), 1);
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.text(0, 0).as_deref(), Some("2"));
    assert_eq!(table.cell(1, 0), None);
}

#[test]
fn test_case_boolean_pick() {
    let code = r#"
select
    case when pick 'li:first-child' take text match '[\d\.]+' < 9000 then 2 end
    from download page 'http://mock.com'
    where nodes = '#match-tests'
"#;
    let table = &run(code)[0];
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.text(0, 0).as_deref(), Some("2"));
    assert_eq!(table.cell(1, 0), None);
}

#[test]
fn test_nulls() {
    let code = r#"
select
    pick 'td:nth-child(2)'
    from download page 'http://mock.com'
    where nodes = 'table tr'
"#;
    let table = &run(code)[0];
    assert_eq!(table.labels(), vec!["(No column name)"]);
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.cell(0, 0), None);
    assert_eq!(table.text(1, 0).as_deref(), Some("3"));
}

#[test]
fn test_missing_match_is_null() {
    let code = r#"
select pick '.center' take text match '\d+'
from download page 'http://mock.com'
"#;
    let table = &run(code)[0];
    assert_eq!(table.cell(0, 0), None);
}

#[test]
fn test_nodes_with_remaining_filter() {
    let code = r#"
select pick 'li:first-child' take text
from download page 'http://mock.com'
where nodes = '#match-tests' and pick 'li:nth-child(2)' take text = '3'
"#;
    let table = &run(code)[0];
    assert_eq!(table.row_count(), 1);
    assert_eq!(table.text(0, 0).as_deref(), Some("10,566"));
}

#[test]
fn test_page_columns() {
    let code = "select url, size, date from download page 'http://mock.com'";
    let table = &run(code)[0];
    assert_eq!(table.labels(), vec!["url", "size", "date"]);
    assert_eq!(table.text(0, 0).as_deref(), Some("http://mock.com"));
    assert_eq!(
        table.value(0, 1),
        Some(&Value::Integer(common::PAGE.len() as i64))
    );
    assert!(table.text(0, 2).unwrap().ends_with('Z'));
}

#[test]
fn test_select_star_from_page() {
    let table = &run("select * from download page 'http://mock.com'")[0];
    assert_eq!(table.labels(), vec!["url", "size", "date"]);
    assert_eq!(table.row_count(), 1);
}

// ============================================================================
// Downloads driven by queries and JSON
// ============================================================================

#[test]
fn test_download_urls_from_buffer() {
    let code = r#"
create buffer links(url string)
insert into links select 'http://a.com'
insert into links select 'http://b.com'

select url, pick '.center'
from download page (select url from links) with thread 2
"#;
    let requests = MockRequests::new().with_body("http://b.com", "<p class='center'>bee</p>");
    let tables = runnable(code, requests).collect().unwrap();
    let table = &tables[0];
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.text(0, 0).as_deref(), Some("http://a.com"));
    assert_eq!(table.text(0, 1).as_deref(), Some("here"));
    assert_eq!(table.text(1, 0).as_deref(), Some("http://b.com"));
    assert_eq!(table.text(1, 1).as_deref(), Some("bee"));
}

#[test]
fn test_download_json() {
    let code = r#"
create buffer people(id identity, name string, age int)

insert into people
select name, age from download json 'http://api.mock/people'

select * from people where age > 30
"#;
    let requests = MockRequests::new().with_body(
        "http://api.mock/people",
        r#"[{"name":"ada","age":36},{"name":"tim","age":12}]"#,
    );
    let tables = runnable(code, requests).collect().unwrap();
    let table = &tables[0];
    assert_eq!(table.row_count(), 1);
    assert_eq!(table.text(0, 0).as_deref(), Some("1"));
    assert_eq!(table.text(0, 1).as_deref(), Some("ada"));
    assert_eq!(table.value(0, 2), Some(&Value::Integer(36)));
}

#[test]
fn test_json_missing_property_is_null() {
    let code = "select title, missing from download json 'http://api.mock/one'";
    let requests = MockRequests::new().with_body("http://api.mock/one", r#"{"title":"x"}"#);
    let tables = runnable(code, requests).collect().unwrap();
    assert_eq!(tables[0].text(0, 0).as_deref(), Some("x"));
    assert_eq!(tables[0].cell(0, 1), None);
}

#[test]
fn test_picked_number_fills_integer_column() {
    let code = r#"
create buffer totals(n int)
insert into totals
select pick 'li' take text match '[0-9]+' * 1
from download page 'http://mock.com'
select n from totals
"#;
    let table = &run(code)[0];
    assert_eq!(table.columns()[0].value_type, ValueType::Integer);
    assert_eq!(table.value(0, 0), Some(&Value::Integer(6566)));
}

// ============================================================================
// CASE evaluates its subject once per row
// ============================================================================

struct CountingFactory {
    inner: ScraperDomFactory,
    selects: Arc<AtomicUsize>,
}

struct CountingDocument {
    inner: Box<dyn Document>,
    selects: Arc<AtomicUsize>,
}

struct CountingElement<'a> {
    inner: Box<dyn Element + 'a>,
    selects: Arc<AtomicUsize>,
}

impl DomFactory for CountingFactory {
    fn create(&self) -> Box<dyn Document> {
        Box::new(CountingDocument {
            inner: self.inner.create(),
            selects: Arc::clone(&self.selects),
        })
    }

    fn validate_selector(&self, selector: &str) -> Result<(), DomError> {
        self.inner.validate_selector(selector)
    }
}

impl Document for CountingDocument {
    fn load(&mut self, html: &str) -> Result<(), DomError> {
        self.inner.load(html)
    }

    fn root(&self) -> Box<dyn Element + '_> {
        Box::new(CountingElement {
            inner: self.inner.root(),
            selects: Arc::clone(&self.selects),
        })
    }

    fn select(&self, selector: &str) -> Result<Vec<Box<dyn Element + '_>>, DomError> {
        self.inner.select(selector)
    }
}

impl Element for CountingElement<'_> {
    fn select<'s>(&'s self, selector: &str) -> Result<Vec<Box<dyn Element + 's>>, DomError> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        self.inner.select(selector)
    }

    fn text(&self) -> String {
        self.inner.text()
    }

    fn inner_html(&self) -> String {
        self.inner.inner_html()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.inner.attribute(name)
    }
}

fn count_selects(code: &str) -> (Vec<RuntimeTable>, usize) {
    let selects = Arc::new(AtomicUsize::new(0));
    let dom = CountingFactory {
        inner: ScraperDomFactory::new(),
        selects: Arc::clone(&selects),
    };
    let plan = compile(code).unwrap();
    let tables = Runnable::new(plan, Arc::new(MockRequests::new()), Arc::new(dom))
        .collect()
        .unwrap();
    (tables, selects.load(Ordering::SeqCst))
}

#[test]
fn test_case_subject_evaluated_once() {
    let code = r#"
select
    case pick '.center' take text
        when 'a' then 1
        when 'b' then 2
        when 'c' then 3
    end
    from download page 'http://mock.com'
"#;
    let (tables, selects) = count_selects(code);
    assert_eq!(tables[0].row_count(), 1);
    assert_eq!(tables[0].cell(0, 0), None);
    assert_eq!(selects, 1);
}

#[test]
fn test_searched_case_evaluates_each_condition() {
    let code = r#"
select
    case
        when pick '.center' = 'a' then 1
        when pick '.center' = 'b' then 2
        when pick '.center' = 'c' then 3
    end
    from download page 'http://mock.com'
"#;
    let (tables, selects) = count_selects(code);
    assert_eq!(tables[0].cell(0, 0), None);
    assert_eq!(selects, 3);
}
