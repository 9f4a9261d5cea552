use anyhow::{Context, Result, bail};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub const PY_PRELUDE: &str = r#"import sys

_stack = []


def _read():
    line = sys.stdin.readline()
    return line[:-1] if line.endswith("\n") else line


def _show(value):
    if value is True:
        return "true"
    if value is False:
        return "false"
    return str(value)


def _div(lhs, rhs):
    quotient = abs(lhs) // abs(rhs)
    return quotient if (lhs < 0) == (rhs < 0) else -quotient
"#;

pub const PY_ENTRY: &str = r#"if __name__ == "__main__":
    main()
"#;

/// Interpreter named by `PYTHON`, falling back to `python3`.
pub fn interpreter() -> String {
    std::env::var("PYTHON").unwrap_or_else(|_| "python3".to_string())
}

pub fn write_temp_file(contents: &str) -> Result<PathBuf> {
    let mut dir = std::env::temp_dir();
    dir.push("scriptc");
    fs::create_dir_all(&dir).context("Creating temp directory")?;

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let path = dir.join(format!("program_{}_{nanos}.py", std::process::id()));
    fs::write(&path, contents).context("Writing Python source")?;
    Ok(path)
}

pub fn run_script(code: &str, input: &str) -> Result<String> {
    let path = write_temp_file(code)?;
    let python = interpreter();
    let mut child = Command::new(&python)
        .arg(&path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Starting {python}"))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .context("Writing program input")?;
    }
    let output = child
        .wait_with_output()
        .context("Running generated Python")?;
    let _ = fs::remove_file(&path);
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("Python program failed: {stderr}");
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.strip_suffix('\n').unwrap_or(&stdout).to_string())
}
