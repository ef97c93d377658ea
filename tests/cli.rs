// Command-line guard rails for pytcatalog and validate-config.
mod support;

use anyhow::{Context, Result};
use std::fs;
use std::process::{Command, Output};
use support::{TempWorkspace, write_file, write_tool};

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn ok(ws: &TempWorkspace, args: &[&str]) -> Result<String> {
    let output = ws.cli(args)?;
    anyhow::ensure!(
        output.status.success(),
        "pytcatalog {} failed: {}",
        args.join(" "),
        stderr(&output)
    );
    Ok(stdout(&output))
}

#[test]
fn init_assign_and_generate() -> Result<()> {
    let ws = TempWorkspace::new()?;
    write_tool(&ws.source_root(), "tools/buf")?;
    let source_root = ws.source_root().display().to_string();

    ok(&ws, &["init"])?;
    assert!(ws.catalog_path().is_file());
    ok(&ws, &["source", "add", "s1", "Shared", "--type", "local", "--path", &source_root])?;
    ok(&ws, &["toolbox", "add", "tb1", "Analysis", "analysis.pyt"])?;
    ok(&ws, &["tool", "add", "tb1", "s1", "tools/buf", "--alias", "Buffer"])?;

    let listed = ok(&ws, &["tool", "list", "tb1"])?;
    assert_eq!(listed.trim(), "s1:tools/buf as Buffer");

    let scanned = ok(&ws, &["scan", "s1"])?;
    assert!(scanned.contains("s1: 1 tool(s)"), "{scanned}");

    ok(&ws, &["validate", "tb1"])?;
    ok(&ws, &["generate", "tb1"])?;
    let pyt = ws.workspace().join("toolboxes").join("analysis.pyt");
    let text = fs::read_to_string(&pyt).with_context(|| format!("reading {}", pyt.display()))?;
    assert!(text.contains("\"Buffer\""));
    assert!(pyt.with_extension("pyt.xml").is_file());
    Ok(())
}

#[test]
fn failures_exit_non_zero_with_a_message() -> Result<()> {
    let ws = TempWorkspace::new()?;
    ok(&ws, &["init"])?;

    let output = ws.cli(&["init"])?;
    assert!(!output.status.success());
    assert!(stderr(&output).contains("already exists"), "{}", stderr(&output));

    let output = ws.cli(&["tool", "add", "missing", "s1", "tools/buf"])?;
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Toolbox 'missing' not found"));

    ok(&ws, &["toolbox", "add", "tb1", "Analysis", "analysis.pyt"])?;
    ok(&ws, &["source", "add", "s1", "Shared", "--type", "local", "--path", "/nonexistent"])?;
    ok(&ws, &["tool", "add", "tb1", "s1", "tools/buf"])?;
    let output = ws.cli(&["generate", "tb1"])?;
    assert!(!output.status.success());
    assert!(!ws.workspace().join("toolboxes").join("analysis.pyt").exists());
    Ok(())
}

#[test]
fn source_add_requires_the_type_specific_field() -> Result<()> {
    let ws = TempWorkspace::new()?;
    ok(&ws, &["init"])?;
    let output = ws.cli(&["source", "add", "g1", "Remote", "--type", "git"])?;
    assert!(!output.status.success());
    assert!(stderr(&output).contains("url"), "{}", stderr(&output));

    ok(&ws, &["source", "add", "g1", "Remote", "--type", "git", "--url", "https://example.com/t.git"])?;
    let listed = ok(&ws, &["source", "list"])?;
    assert!(listed.contains("g1\tgit\tenabled"), "{listed}");
    Ok(())
}

#[test]
fn check_reports_dangling_references() -> Result<()> {
    let ws = TempWorkspace::new()?;
    let source_root = ws.source_root().display().to_string();
    ok(&ws, &["init"])?;
    ok(&ws, &["source", "add", "s1", "Shared", "--type", "local", "--path", &source_root])?;
    ok(&ws, &["toolbox", "add", "tb1", "Analysis", "analysis.pyt"])?;
    ok(&ws, &["tool", "add", "tb1", "s1", "tools/buf"])?;
    assert_eq!(ok(&ws, &["check"])?.trim(), "OK");

    let output = ws.cli(&["source", "remove", "s1"])?;
    assert!(!output.status.success());
    ok(&ws, &["source", "remove", "s1", "--force"])?;
    let report = ok(&ws, &["check"])?;
    assert!(report.contains("non-existent source 's1'"), "{report}");
    Ok(())
}

#[test]
fn validate_config_reports_each_file() -> Result<()> {
    let ws = TempWorkspace::new()?;
    let good = write_tool(ws.root(), "tools/buf")?;
    let bad = write_file(ws.root(), "tools/clip/tool.yml", "tool: {}\n")?;

    let output = Command::new(env!("CARGO_BIN_EXE_validate-config"))
        .arg(&good)
        .output()
        .context("running validate-config")?;
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).starts_with("OK "));

    let output = Command::new(env!("CARGO_BIN_EXE_validate-config"))
        .arg(&good)
        .arg(&bad)
        .output()
        .context("running validate-config")?;
    assert_eq!(output.status.code(), Some(1));
    let lines: Vec<String> = stdout(&output).lines().map(str::to_string).collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("OK "));
    assert!(lines[1].starts_with("FAIL "));
    Ok(())
}

#[test]
fn validate_config_accepts_flat_tool_files() -> Result<()> {
    let ws = TempWorkspace::new()?;
    let flat = write_file(ws.root(), "flat/buf.yml", &support::tool_yaml("buf"))?;
    let output = Command::new(env!("CARGO_BIN_EXE_validate-config"))
        .arg(&flat)
        .output()
        .context("running validate-config")?;
    assert!(output.status.success(), "{}", stdout(&output));
    assert!(stdout(&output).starts_with("OK "));
    Ok(())
}
