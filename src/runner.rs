//! Recipe test runner integration
//!
//! This module provides:
//! - The TestRunner capability used by the update orchestrator
//! - ConanTestRunner, which runs `conan create` in the recipe folder
//! - Error detail extraction from failed test output

use crate::domain::RecipeName;
use crate::error::RunnerError;
use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::LazyLock;

/// Default test command; `{name}` and `{version}` are substituted
pub const DEFAULT_TEST_COMMAND: &[&str] = &["conan", "create", ".", "{name}/{version}@"];

/// Patterns tried in order to pull the relevant error out of test output
static ERROR_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?m)^\[HOOK.*\].*:\s*ERROR:\s*(.*)$",
        r"(?ms)^ERROR:.*?(Error in.*)",
        r"(?ms)^ERROR:.*?(Invalid configuration.*)",
        r"(?ms)^ERROR:\s*(.*)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid error pattern"))
    .collect()
});

/// One test invocation for one updated line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRequest {
    /// Recipe under test
    pub recipe: RecipeName,
    /// Version that was pinned
    pub version: String,
    /// Recipe folder the test runs in
    pub folder: PathBuf,
}

/// Result of a test run
#[derive(Debug, Clone)]
pub struct TestReport {
    /// The command that was executed
    pub command: String,
    /// Whether the command succeeded
    pub success: bool,
    /// Combined standard output and error
    pub output: String,
}

impl TestReport {
    /// Create a successful report
    pub fn success(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            success: true,
            output: output.into(),
        }
    }

    /// Create a failed report
    pub fn failure(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            success: false,
            output: output.into(),
        }
    }

    /// Error lines extracted from the output, or "no details"
    pub fn details(&self) -> String {
        for pattern in ERROR_PATTERNS.iter() {
            let errors: Vec<&str> = pattern
                .captures_iter(&self.output)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str().trim_end())
                .collect();
            if !errors.is_empty() {
                return errors.join("\n");
            }
        }
        "no details".to_string()
    }
}

/// Capability that builds and tests a recipe version
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Run the test for one updated version
    async fn run_test(&self, request: &TestRequest) -> Result<TestReport, RunnerError>;
}

/// Runs a conan build in the recipe folder
#[derive(Debug, Clone)]
pub struct ConanTestRunner {
    command: Vec<String>,
}

impl Default for ConanTestRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TEST_COMMAND.iter().map(|s| s.to_string()).collect())
    }
}

impl ConanTestRunner {
    /// Create a runner with a custom command template
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    /// Command line for `request` with placeholders substituted
    pub fn command_for(&self, request: &TestRequest) -> Vec<String> {
        self.command
            .iter()
            .map(|arg| {
                arg.replace("{name}", request.recipe.as_str())
                    .replace("{version}", &request.version)
            })
            .collect()
    }
}

#[async_trait]
impl TestRunner for ConanTestRunner {
    async fn run_test(&self, request: &TestRequest) -> Result<TestReport, RunnerError> {
        let command = self.command_for(request);
        let (program, args) = command.split_first().ok_or(RunnerError::EmptyCommand)?;
        let shown = command.join(" ");

        tracing::info!(recipe = %request.recipe, version = %request.version, command = %shown, "running test");
        let started = std::time::Instant::now();

        let output = tokio::process::Command::new(program)
            .args(args)
            .current_dir(&request.folder)
            .env("CONAN_HOOK_ERROR_LEVEL", "40")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| RunnerError::Spawn {
                command: shown.clone(),
                source: e,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        tracing::debug!(
            recipe = %request.recipe,
            elapsed_ms = started.elapsed().as_millis() as u64,
            status = %output.status,
            "test finished"
        );

        if output.status.success() {
            Ok(TestReport::success(shown, combined))
        } else {
            Ok(TestReport::failure(shown, combined))
        }
    }
}
