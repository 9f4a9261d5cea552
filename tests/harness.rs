use anyhow::{Context, Result, ensure};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use scriptc::{CompileOptions, Target, compile};

/// One program under `tests/programs`: `NAME.sc` plus either `NAME.out`
/// (expected stdout) or `NAME.err` (expected diagnostic substring), and an
/// optional `NAME.in` fed to the program's stdin.
struct Case {
    name: String,
    source: PathBuf,
}

enum Expectation {
    Output(String),
    Error(String),
}

impl Case {
    fn sibling(&self, extension: &str) -> PathBuf {
        self.source.with_extension(extension)
    }

    fn read_optional(&self, extension: &str) -> Result<Option<String>> {
        let path = self.sibling(extension);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .with_context(|| format!("Reading {}", path.display()))
    }

    fn expectation(&self) -> Result<Expectation> {
        if let Some(output) = self.read_optional("out")? {
            return Ok(Expectation::Output(output));
        }
        let error = self
            .read_optional("err")?
            .with_context(|| format!("Case {} has neither .out nor .err", self.name))?;
        Ok(Expectation::Error(error.trim().to_string()))
    }

    fn input(&self) -> Result<String> {
        Ok(self.read_optional("in")?.unwrap_or_default())
    }
}

fn load_cases(dir: &Path) -> Result<Vec<Case>> {
    let mut cases = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Listing {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "sc") {
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            cases.push(Case { name, source: path });
        }
    }
    cases.sort_by(|a, b| a.name.cmp(&b.name));
    ensure!(!cases.is_empty(), "No programs found in {}", dir.display());
    Ok(cases)
}

fn normalize_output(output: &str) -> String {
    output.replace("\r\n", "\n").trim_end().to_string()
}

fn parity_required(env_var: &str) -> bool {
    std::env::var(env_var)
        .map(|value| value == "1")
        .unwrap_or(false)
}

fn python_available() -> Result<bool> {
    let python = std::env::var("PYTHON").unwrap_or_else(|_| "python3".to_string());
    let runnable = Command::new(&python)
        .args(["-c", "pass"])
        .status()
        .is_ok_and(|status| status.success());
    if !runnable && parity_required("PYTHON_PARITY_REQUIRED") {
        anyhow::bail!("Python parity required but '{python}' is not runnable. Set PYTHON.");
    }
    if !runnable {
        eprintln!("Skipping Python backend programs: '{python}' is not runnable.");
    }
    Ok(runnable)
}

fn run_programs_for_target(target: Target, registers: Option<usize>) -> Result<()> {
    let backend = target.backend();
    let options = CompileOptions { target, registers };

    for case in load_cases(Path::new("tests/programs"))? {
        let source = fs::read_to_string(&case.source)
            .with_context(|| format!("Reading {}", case.name))?;
        let compiled = compile(&source, &options);
        match case.expectation()? {
            Expectation::Output(expected) => {
                let code = compiled.with_context(|| format!("Compiling {}", case.name))?;
                let output = backend.run(&code, &case.input()?).with_context(|| {
                    format!("Backend {} failed for {}", backend.name(), case.name)
                })?;
                assert_eq!(
                    normalize_output(&output),
                    normalize_output(&expected),
                    "Backend {} mismatch for {}",
                    backend.name(),
                    case.name
                );
            }
            Expectation::Error(expected) => {
                let Err(error) = compiled else {
                    anyhow::bail!("Expected {} to fail with '{expected}'", case.name);
                };
                let actual = error.to_string();
                ensure!(
                    actual.contains(&expected),
                    "Expected error containing '{expected}' in {}, got '{actual}'",
                    case.name
                );
            }
        }
    }

    Ok(())
}

#[test]
fn runs_programs_asm_backend() -> Result<()> {
    run_programs_for_target(Target::Asm, None)
}

#[test]
fn runs_programs_asm_backend_with_two_registers() -> Result<()> {
    run_programs_for_target(Target::Asm, Some(2))
}

#[test]
fn runs_programs_python_backend() -> Result<()> {
    if !python_available()? {
        return Ok(());
    }
    run_programs_for_target(Target::Python, None)
}

#[test]
fn mips_backend_compiles_every_program() -> Result<()> {
    let options = CompileOptions {
        target: Target::Mips,
        registers: None,
    };
    for case in load_cases(Path::new("tests/programs"))? {
        if matches!(case.expectation()?, Expectation::Error(_)) {
            continue;
        }
        let source = fs::read_to_string(&case.source)?;
        let code = compile(&source, &options).with_context(|| format!("Compiling {}", case.name))?;
        ensure!(code.contains("main:"), "No entry point for {}", case.name);
    }
    Ok(())
}
