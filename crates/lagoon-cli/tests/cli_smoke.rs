use assert_cmd::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn lagoon_cli() -> Command {
    Command::new(assert_cmd::cargo_bin!("lagoon-cli"))
}

/// Shell script standing in for `mmdc`. Arguments: -i IN -o OUT -c CFG -I ID -q
#[cfg(unix)]
fn fake_compiler(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-mmdc");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = fs::metadata(&path).expect("stat script").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod script");
    path
}

#[cfg(unix)]
const EMIT_FLOWCHART: &str = r#"printf '<svg xmlns="http://www.w3.org/2000/svg" id="%s" width="40" height="20" viewBox="0 0 40 20"><g id="flowchart-A-0" class="node"><rect width="40" height="20"/></g></svg>' "$8" > "$4""#;

#[test]
fn themes_lists_builtins() {
    let output = lagoon_cli().arg("themes").output().expect("run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 8);
    assert!(stdout.contains("darkMinimal\tDark Minimal"));
}

#[test]
fn empty_input_exits_with_no_diagram() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let input = tmp.path().join("empty.mmd");
    fs::write(&input, "  \n").expect("write input");
    lagoon_cli()
        .args(["render", input.to_string_lossy().as_ref()])
        .assert()
        .code(3);
}

#[test]
fn unknown_theme_fails() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let input = tmp.path().join("d.mmd");
    fs::write(&input, "graph TD\n  A --> B\n").expect("write input");
    lagoon_cli()
        .args(["render", "--theme", "vaporwave", input.to_string_lossy().as_ref()])
        .assert()
        .code(1);
}

#[cfg(unix)]
#[test]
fn render_exports_jpeg_with_recolored_node() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let compiler = fake_compiler(tmp.path(), EMIT_FLOWCHART);
    let input = tmp.path().join("d.mmd");
    fs::write(&input, "graph TD\n  A --> B\n").expect("write input");
    let out_dir = tmp.path().join("out");
    let svg_out = tmp.path().join("shown.svg");

    let output = lagoon_cli()
        .args([
            "render",
            "--theme",
            "darkMinimal",
            "--color",
            "A=#ff0000",
            "--compiler",
            compiler.to_string_lossy().as_ref(),
            "--out-dir",
            out_dir.to_string_lossy().as_ref(),
            "--svg-out",
            svg_out.to_string_lossy().as_ref(),
            input.to_string_lossy().as_ref(),
        ])
        .output()
        .expect("run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let printed = String::from_utf8_lossy(&output.stdout).trim().to_string();
    assert!(printed.ends_with(".jpg"), "unexpected output path: {printed}");
    let bytes = fs::read(&printed).expect("read jpg");
    assert!(bytes.starts_with(&[0xFF, 0xD8, 0xFF]), "output is not a JPG");

    let shown = fs::read_to_string(&svg_out).expect("read svg");
    assert!(shown.contains(r#"id="flowchart-A-0""#));
}

#[cfg(unix)]
#[test]
fn transparent_render_exports_png() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let compiler = fake_compiler(tmp.path(), EMIT_FLOWCHART);
    let input = tmp.path().join("d.mmd");
    fs::write(&input, "graph TD\n  A --> B\n").expect("write input");
    let out_dir = tmp.path().join("out");

    let output = lagoon_cli()
        .args([
            "render",
            "--transparent",
            "--compiler",
            compiler.to_string_lossy().as_ref(),
            "--out-dir",
            out_dir.to_string_lossy().as_ref(),
            input.to_string_lossy().as_ref(),
        ])
        .output()
        .expect("run");
    assert!(output.status.success());

    let printed = String::from_utf8_lossy(&output.stdout).trim().to_string();
    assert!(printed.ends_with(".png"));
    let bytes = fs::read(&printed).expect("read png");
    assert!(bytes.starts_with(b"\x89PNG\r\n\x1a\n"), "output is not a PNG");
}

#[cfg(unix)]
#[test]
fn compiler_rejection_reports_syntax_error() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let compiler = fake_compiler(tmp.path(), "echo 'Parse error on line 2' >&2; exit 1");
    let input = tmp.path().join("d.mmd");
    fs::write(&input, "graph TD\n  A -->\n").expect("write input");

    let output = lagoon_cli()
        .args([
            "render",
            "--compiler",
            compiler.to_string_lossy().as_ref(),
            input.to_string_lossy().as_ref(),
        ])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Syntax Error: Please check your Mermaid syntax."));
    assert!(stderr.contains("Parse error on line 2"));
}
