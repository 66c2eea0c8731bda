// tests/resolver_tests.rs

use pickaxe_lang::codegen::{SourceStep, Step};
use pickaxe_lang::{CompileError, Error, Position, ValueType, compile};

fn compile_error(code: &str) -> CompileError {
    match compile(code) {
        Err(Error::Compile(e)) => e,
        other => panic!("Expected compile error, got {:?}", other),
    }
}

// ============================================================================
// Buffers and inserts
// ============================================================================

#[test]
fn test_unknown_buffer() {
    let err = compile_error("insert into nowhere select 1");
    assert!(matches!(err, CompileError::UnknownBuffer { ref name, .. } if name == "nowhere"));

    let err = compile_error("select * from nowhere");
    assert!(matches!(err, CompileError::UnknownBuffer { .. }));
}

#[test]
fn test_duplicate_buffer() {
    let err = compile_error("create buffer t(a int) create buffer t(b int)");
    assert!(matches!(err, CompileError::DuplicateBuffer { ref name, .. } if name == "t"));
}

#[test]
fn test_unknown_column_type() {
    let err = compile_error("create buffer t(a money)");
    assert!(matches!(
        err,
        CompileError::UnknownType { ref type_name, .. } if type_name == "money"
    ));
}

#[test]
fn test_identity_rules() {
    let err = compile_error("create buffer t(a identity, b int identity)");
    assert!(matches!(err, CompileError::MultipleIdentity { .. }));

    let err = compile_error("create buffer t(a string identity)");
    assert!(matches!(err, CompileError::TypeMismatch { .. }));

    let err = compile_error("create buffer t(id identity, name string) insert into t(id) select 1");
    assert!(matches!(err, CompileError::IdentityInsert { ref column, .. } if column == "id"));
}

#[test]
fn test_insert_shape() {
    let err = compile_error("create buffer t(id identity, name string) insert into t select 'a', 'b'");
    assert!(matches!(
        err,
        CompileError::ColumnCountMismatch {
            expected: 1,
            found: 2,
            ..
        }
    ));

    let err = compile_error("create buffer t(name string) insert into t(nope) select 'a'");
    assert!(matches!(err, CompileError::UnknownColumn { ref column, .. } if column == "nope"));
}

#[test]
fn test_insert_names_column_twice() {
    let err = compile_error("create buffer t(a int, b int) insert into t(a, a) select 1, 2");
    assert!(matches!(
        err,
        CompileError::DuplicateColumn { ref buffer, ref column, .. } if buffer == "t" && column == "a"
    ));

    assert!(compile("create buffer t(a int, b int) insert into t(b, a) select 1, 2").is_ok());
}

#[test]
fn test_insert_type_check() {
    let err = compile_error("create buffer t(a int) insert into t select true");
    assert!(matches!(
        err,
        CompileError::TypeMismatch {
            expected: ValueType::Integer,
            found: ValueType::Boolean,
            ..
        }
    ));

    // Strings convert at insert time, integers widen to floats
    assert!(compile("create buffer t(a int, b float) insert into t select '1', 2").is_ok());
}

#[test]
fn test_division_types_as_float() {
    let plan = compile("select 7 / 2 as half, 7 % 2 as rest").unwrap();
    let Step::Select(select) = &plan.steps[0] else {
        panic!("Expected select step");
    };
    assert_eq!(select.columns[0].value_type, ValueType::Float);
    assert_eq!(select.columns[1].value_type, ValueType::Integer);

    let err = compile_error("create buffer b(n int) insert into b select 7 / 2");
    assert!(matches!(
        err,
        CompileError::TypeMismatch {
            expected: ValueType::Integer,
            found: ValueType::Float,
            ..
        }
    ));
    assert!(compile("create buffer b(n float) insert into b select 7 / 2").is_ok());
}

#[test]
fn test_string_arithmetic_fits_integer_column() {
    let code = "create buffer t(n int) \
                insert into t select pick 'li' take text match '[0-9]+' * 1 \
                from download page 'http://x'";
    assert!(compile(code).is_ok());

    let code = "create buffer t(n int) insert into t select '6' * 1.5";
    assert!(matches!(compile_error(code), CompileError::TypeMismatch { .. }));
}

// ============================================================================
// Selects
// ============================================================================

#[test]
fn test_unknown_identifier() {
    let err = compile_error("create buffer t(a int) select b from t");
    assert!(matches!(err, CompileError::UnknownIdentifier { ref name, .. } if name == "b"));

    let err = compile_error("select missing");
    assert!(matches!(err, CompileError::UnknownIdentifier { .. }));
}

#[test]
fn test_pick_needs_page() {
    let err = compile_error("select pick '.a'");
    assert!(matches!(err, CompileError::PickWithoutDocument { .. }));

    let err = compile_error("select a from download json 'http://x' where pick 'b' = '1'");
    assert!(matches!(err, CompileError::PickWithoutDocument { .. }));
}

#[test]
fn test_star_needs_columns() {
    assert!(matches!(
        compile_error("select *"),
        CompileError::StarWithoutSource { .. }
    ));
    assert!(matches!(
        compile_error("select * from download json 'http://x'"),
        CompileError::StarWithoutSource { .. }
    ));
}

#[test]
fn test_image_columns() {
    let plan = compile("select *, filename as name from download image 'http://x/logo.png'").unwrap();
    let Step::Select(select) = &plan.steps[0] else {
        panic!("Expected select step");
    };
    let labels: Vec<_> = select.columns.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["url", "size", "date", "filename", "name"]);
    assert_eq!(select.columns[1].value_type, ValueType::Integer);

    let err = compile_error("select pick 'img' from download image 'http://x/logo.png'");
    assert!(matches!(err, CompileError::PickWithoutDocument { .. }));

    let err = compile_error("select filename from download page 'http://x'");
    assert!(matches!(err, CompileError::UnknownIdentifier { ref name, .. } if name == "filename"));
}

#[test]
fn test_thread_hint_must_be_positive() {
    let err = compile_error("select url from download page 'http://x' with thread 0");
    assert!(matches!(err, CompileError::InvalidThreadHint { count: 0, .. }));
}

#[test]
fn test_url_query_needs_one_column() {
    let err = compile_error(
        "create buffer l(a string, b string) select url from download page (select a, b from l)",
    );
    assert!(matches!(err, CompileError::WireColumnCount { found: 2, .. }));
}

#[test]
fn test_type_errors() {
    let err = compile_error("select case 1 when 1 then 'a' else 2 end");
    assert!(matches!(err, CompileError::TypeMismatch { .. }));

    let err = compile_error("select true + 1");
    assert!(matches!(err, CompileError::TypeMismatch { .. }));
}

#[test]
fn test_errors_carry_positions() {
    let err = compile_error("create buffer t(a int)\nselect b from t");
    assert_eq!(err.position().line, 2);
    assert!(err.to_string().contains("unknown column 'b'"));
}

#[test]
fn test_operator_errors_point_at_operator() {
    let err = compile_error("select 1,\n    2 + true");
    assert!(matches!(err, CompileError::TypeMismatch { .. }));
    assert_eq!(err.position(), Position::new(2, 7));
}

// ============================================================================
// Resolved plans
// ============================================================================

#[test]
fn test_hints_and_nodes_reach_the_plan() {
    let plan = compile(
        "select url from download page 'http://x' with thread 2, js \
         where nodes = 'li' and url = 'http://x' with (thread(7))",
    )
    .unwrap();

    let Step::Select(select) = &plan.steps[0] else {
        panic!("Expected select step");
    };
    let SourceStep::Download(download) = &select.source else {
        panic!("Expected download source");
    };
    assert_eq!(download.threads, Some(2));
    assert!(download.js);
    assert_eq!(download.nodes.as_deref(), Some("li"));
    assert!(select.filter.is_some());
}

#[test]
fn test_output_column_labels() {
    let plan = compile("create buffer t(id identity, name string) select *, name as n, 1 from t").unwrap();
    let Step::Select(select) = &plan.steps[1] else {
        panic!("Expected select step");
    };
    let labels: Vec<_> = select.columns.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["id", "name", "n", "(No column name)"]);
    assert_eq!(select.columns[0].value_type, ValueType::Integer);
}
