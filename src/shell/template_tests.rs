//! Tests for the shell templating façade.

use anyhow::Result;
use serde_json::{json, Value};

use crate::shell::Template;
use crate::Error;

fn render(template: &str, data: &Value) -> crate::Result<String> {
    let mut tmpl = Template::new("test");
    tmpl.parse(template).expect("template must parse");
    tmpl.render(data)
}

enum Expect {
    Clean,
    InvalidTemplate,
    Injection,
}

#[test]
fn injection_detection_table() {
    use Expect::*;

    let cases: Vec<(&str, Value, Expect)> = vec![
        ("echo {{ addressee }}", json!({ "addressee": "hello" }), Clean),
        ("echo \"{{ addressee }}\"", json!({ "addressee": "hello hello" }), Clean),
        // Loop-produced argument lists keep their arity.
        (
            "ls {% for p in paths %}{{ p }} {% endfor %}",
            json!({ "paths": ["/tmp", "/bla"] }),
            Clean,
        ),
        ("echo `cat {{ file }}`", json!({ "file": "hello" }), Clean),
        (
            "#! /bin/bash\nend=$((SECONDS+{{ wait }}))\n\nwhile [ $SECONDS -lt $end ]; do\n  sleep 1\ndone",
            json!({ "wait": 3 }),
            Clean,
        ),
        // Arithmetic operands are value positions.
        ("echo \"$(( {{ a }} + {{ b }} ))\"", json!({ "a": "12", "b": "10" }), Clean),
        (
            "for VARIABLE in file1 {{ a }} file3\ndo\n    cat $VARIABLE\ndone",
            json!({ "a": "bla" }),
            Clean,
        ),
        // Test-command operands may change value.
        ("if [ {{ c }} ] ; then\ncommand\nfi", json!({ "c": "condition" }), Clean),
        // Annotated opt-outs.
        ("echo {{ x | StructuralData }}", json!({ "x": "`./command`" }), Clean),
        ("bla > {{ x | StructuralData }}", json!({ "x": "filename" }), Clean),
        ("bla {{ addressee | AllowFlags }}", json!({ "addressee": "-flag" }), Clean),
        // Command substitution smuggled into an arithmetic slot.
        ("echo $(({{ addressee }}))", json!({ "addressee": "./command" }), Injection),
        ("echo {{ addressee }}", json!({ "addressee": "`./command`" }), Injection),
        ("echo {{ addressee }}", json!({ "addressee": "$(./command)" }), Injection),
        ("echo {{ addressee }}", json!({ "addressee": "foobar\ncommand" }), Injection),
        ("echo {{ addressee }} foobar", json!({ "addressee": ";" }), Injection),
        ("echo {{ addressee }}", json!({ "addressee": "foo$(./command)bar" }), Injection),
        ("echo {{ addressee }}", json!({ "addressee": "foo`./command`bar" }), Injection),
        ("echo {{ addressee }}", json!({ "addressee": "\"foo$(./command)bar\"" }), Injection),
        // Cross check: plain value with the same shape passes.
        ("echo {{ addressee }}", json!({ "addressee": "foo/commandbar" }), Clean),
        ("echo \"{{ addressee }}\"", json!({ "addressee": "foo$(./command)bar" }), Injection),
        ("echo '{{ addressee }}'", json!({ "addressee": "foo' ./command 'bar" }), Injection),
        // Splitting one argument into several.
        ("cat {{ addressee }}", json!({ "addressee": "one two three" }), Injection),
        // Unannotated flags.
        ("cat {{ addressee }}", json!({ "addressee": "-flag" }), Injection),
        // Unannotated filenames: redirection targets are pinned.
        ("bla > {{ addressee }}", json!({ "addressee": "filename" }), Injection),
        // Redirection smuggled through an argument.
        ("bla {{ addressee }}>out", json!({ "addressee": "x>evil#" }), Injection),
        // New expressions in a test command.
        (
            "if [ -e {{ x }} ] ; then\n  echo \"File exists\"\nfi",
            json!({ "x": "file" }),
            Clean,
        ),
        (
            "if [ -e {{ x }} ] ; then\n  echo \"File exists\"\nfi",
            json!({ "x": "file || (1==1)" }),
            Injection,
        ),
        // Glob characters in literal argument positions.
        (
            "touch {{ a }}; echo {{ b }}",
            json!({ "a": "./--some-param=value", "b": "*value" }),
            Injection,
        ),
        // Substituted heredoc bodies cannot be validated.
        ("cat <<EOF\n{{ x }}\nEOF\n", json!({ "x": "hello" }), Injection),
        // Outside the supported grammar: C-style loops.
        (
            "for (( c=1; c<={{ a }}; c++ ))\ndo\n  shell_COMMANDS\ndone",
            json!({ "a": "5" }),
            InvalidTemplate,
        ),
    ];

    for (template, data, expect) in cases {
        let result = render(template, &data);
        match expect {
            Clean => assert!(
                result.is_ok(),
                "template {template:?} with {data}: expected success, got {result:?}"
            ),
            InvalidTemplate => assert!(
                matches!(result, Err(Error::InvalidShTemplate)),
                "template {template:?} with {data}: expected invalid-template, got {result:?}"
            ),
            Injection => assert!(
                matches!(result, Err(Error::ShInjection)),
                "template {template:?} with {data}: expected injection, got {result:?}"
            ),
        }
    }
}

#[test]
fn clean_renders_match_the_engine_byte_for_byte() -> Result<()> {
    let mut tmpl = Template::new("test");
    tmpl.parse("echo {{ x }}")?;
    assert_eq!(tmpl.render(&json!({ "x": "hello" }))?, "echo hello");

    tmpl.parse("cat {{ x | AllowFlags }}")?;
    assert_eq!(tmpl.render(&json!({ "x": "-flag" }))?, "cat -flag");

    tmpl.parse("echo {{ x | StructuralData }}")?;
    assert_eq!(tmpl.render(&json!({ "x": "`./c`" }))?, "echo `./c`");
    Ok(())
}

#[test]
fn allow_flags_only_lifts_the_flag_rule() {
    // A permitted flag must not open the door to other structure changes.
    let result = render("cat {{ x | AllowFlags }}", &json!({ "x": "-f; rm -rf /" }));
    assert!(matches!(result, Err(Error::ShInjection)), "got {result:?}");
}

#[test]
fn nothing_is_written_on_rejection() -> Result<()> {
    let mut tmpl = Template::new("test");
    tmpl.parse("echo {{ x }}")?;

    let mut buf = Vec::new();
    let err = tmpl.execute(&mut buf, &json!({ "x": "a; rm -rf /" }));
    assert!(matches!(err, Err(Error::ShInjection)));
    assert!(buf.is_empty());

    tmpl.execute(&mut buf, &json!({ "x": "safe" }))?;
    assert_eq!(String::from_utf8(buf)?, "echo safe");
    Ok(())
}

#[test]
fn null_data_delegates_to_the_engine() -> Result<()> {
    let mut tmpl = Template::new("test");
    tmpl.parse("echo literal")?;
    assert_eq!(tmpl.render(&Value::Null)?, "echo literal");
    Ok(())
}

#[test]
fn associated_templates_render() -> Result<()> {
    let mut tmpl = Template::new("root");
    tmpl.parse("echo {{ x }}")?;
    tmpl.add_template("other", "printf {{ x }}")?;

    let mut buf = Vec::new();
    tmpl.execute_template(&mut buf, "other", &json!({ "x": "ok" }))?;
    assert_eq!(String::from_utf8(buf)?, "printf ok");
    Ok(())
}

#[test]
fn environment_assignments_keep_their_names() {
    // The assignment value is a value position; the name is not.
    assert!(render("FOO={{ v }} cmd", &json!({ "v": "bar" })).is_ok());
    assert!(matches!(
        render("FOO={{ v }} cmd", &json!({ "v": "bar BAR=baz" })),
        Err(Error::ShInjection)
    ));
}
