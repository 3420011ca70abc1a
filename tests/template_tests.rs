mod common;

use alertfold::render::{CompileError, RenderError};
use alertfold::template::strip_indent;
use alertfold::{Renderer, Template, TemplateError};
use common::read;
use serde_json::json;
use std::fs;
use tempfile::tempdir;

fn render(source: &str, state: serde_json::Value) -> Result<String, TemplateError> {
    Template::compile(source).unwrap().render(&state)
}

// --- template language ---

#[test]
fn test_plain_text_renders_verbatim() {
    assert_eq!(render("no placeholders", json!({})).unwrap(), "no placeholders");
    assert_eq!(render("", json!({})).unwrap(), "");
}

#[test]
fn test_state_prefix_is_optional() {
    let state = json!({"total": 42, "goal": {"name": "mic"}});
    assert_eq!(render("{{ state.total }}/{{total}}", state.clone()).unwrap(), "42/42");
    assert_eq!(render("{{ goal.name }}", state).unwrap(), "mic");
}

#[test]
fn test_whole_state_renders_as_json() {
    assert_eq!(render("{{ state }}", json!({"total": 1})).unwrap(), r#"{"total":1}"#);
}

#[test]
fn test_fixed_filter() {
    let state = json!({"total": 9.999, "text": "3.14159"});
    assert_eq!(render("{{ total | fixed(2) }}", state.clone()).unwrap(), "10.00");
    assert_eq!(render("{{ total | fixed(0) }}", state.clone()).unwrap(), "10");
    assert_eq!(render("{{ text | fixed(3) }}", state).unwrap(), "3.142");
}

#[test]
fn test_default_filter() {
    let state = json!({"top": null});
    assert_eq!(
        render(r#"{{ top | default("nobody") | upper }}"#, state.clone()).unwrap(),
        "NOBODY"
    );
    assert_eq!(render("{{ missing | default(0) | fixed(2) }}", state.clone()).unwrap(), "0.00");
    assert_eq!(render("{{ missing | default(n/a) }}", state).unwrap(), "n/a");
}

#[test]
fn test_case_filters() {
    let state = json!({"name": "Ada"});
    assert_eq!(render("{{ name | upper }} {{ name | lower }}", state).unwrap(), "ADA ada");
}

#[test]
fn test_escaped_braces() {
    assert_eq!(render("{{{{ literal }}", json!({})).unwrap(), "{{ literal }}");
}

#[test]
fn test_missing_value_is_a_render_error() {
    assert_eq!(
        render("{{ state.nope }}", json!({})),
        Err(TemplateError::Missing {
            path: "state.nope".into()
        })
    );
}

#[test]
fn test_fixed_on_text_is_a_render_error() {
    assert!(matches!(
        render("{{ name | fixed(2) }}", json!({"name": "Ada"})),
        Err(TemplateError::NotANumber { filter: "fixed", .. })
    ));
}

#[test]
fn test_compile_errors() {
    assert_eq!(
        Template::compile("abc {{ total"),
        Err(TemplateError::Unterminated { offset: 4 })
    );
    assert_eq!(
        Template::compile("{{   }}"),
        Err(TemplateError::EmptyExpression { offset: 0 })
    );
    assert_eq!(
        Template::compile("{{ total | shout }}"),
        Err(TemplateError::UnknownFilter("shout".into()))
    );
    assert!(matches!(
        Template::compile("{{ total | fixed(two) }}"),
        Err(TemplateError::InvalidArgument { .. })
    ));
    assert!(matches!(
        Template::compile("{{ total | fixed }}"),
        Err(TemplateError::InvalidArgument { .. })
    ));
    assert!(matches!(
        Template::compile("{{ total | upper(1) }}"),
        Err(TemplateError::InvalidArgument { .. })
    ));
}

// --- strip_indent ---

#[test]
fn test_strip_indent_ignores_blank_lines() {
    let text = "\n    Total: 5\n\n      Goal: 10\n    ";
    assert_eq!(strip_indent(text), "\nTotal: 5\n\n  Goal: 10\n");
}

#[test]
fn test_strip_indent_without_common_indent() {
    assert_eq!(strip_indent("a\n  b"), "a\n  b");
}

// --- renderer ---

#[test]
fn test_render_all_writes_every_file() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("files");
    let renderer = Renderer::compile(
        &out,
        [
            ("total.txt", "{{ total | fixed(2) }}"),
            ("summary.txt", "\n    Raised: {{ total }}\n    Goal: {{ goal | default(100) }}\n"),
        ],
    )
    .unwrap();

    let report = renderer.render_all(&json!({"total": 12.5}));

    assert!(report.is_ok());
    assert_eq!(report.written.len(), 2);
    assert_eq!(read(out.join("total.txt")), "12.50");
    assert_eq!(read(out.join("summary.txt")), "\nRaised: 12.5\nGoal: 100\n");
}

#[test]
fn test_render_failure_is_isolated() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("files");
    let renderer = Renderer::compile(
        &out,
        [
            ("broken.txt", "{{ state.not_there }}"),
            ("total.txt", "{{ total }}"),
        ],
    )
    .unwrap();

    let report = renderer.render_all(&json!({"total": 3}));

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "broken.txt");
    assert!(matches!(
        report.failures[0].error,
        RenderError::Template(TemplateError::Missing { .. })
    ));
    assert_eq!(read(out.join("total.txt")), "3");
    assert!(!out.join("broken.txt").exists());
}

#[test]
fn test_render_overwrites_previous_output() {
    let dir = tempdir().unwrap();
    let renderer = Renderer::compile(dir.path(), [("total.txt", "{{ total }}")]).unwrap();

    renderer.render_all(&json!({"total": 1}));
    renderer.render_all(&json!({"total": 2}));

    assert_eq!(read(dir.path().join("total.txt")), "2");
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1, "no scratch files left behind");
}

#[test]
fn test_compile_reports_template_name() {
    let err =
        Renderer::compile("out", [("ok.txt", "{{ total }}"), ("bad.txt", "{{ total")]).unwrap_err();
    match err {
        CompileError::Template { name, source } => {
            assert_eq!(name, "bad.txt");
            assert_eq!(source, TemplateError::Unterminated { offset: 0 });
        }
        other => panic!("expected a template error, got {other:?}"),
    }
}

#[test]
fn test_compile_rejects_paths_as_names() {
    for name in ["../escape.txt", "nested/file.txt", "", "/abs.txt"] {
        assert!(
            matches!(
                Renderer::compile("out", [(name, "x")]),
                Err(CompileError::InvalidName(_))
            ),
            "{name:?} should be rejected"
        );
    }
}
