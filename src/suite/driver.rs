//! Suite driver
//!
//! Walks the selected groups in order. Each step builds, acts on the
//! target, then waits for console output; the first failure anywhere
//! aborts the whole run because later scenarios depend on device state.

use std::fmt;
use std::time::{Duration, Instant};

use colored::Colorize;
use tokio::sync::mpsc;

use super::table::{TestGroup, TestStep};
use crate::common::{Error, Result};
use crate::exec;
use crate::expect::expect;
use crate::runlog::RunLog;

/// Knobs that apply to every step of a run
#[derive(Debug, Clone)]
pub struct SuiteOptions {
    /// Expectation timeout for steps without their own
    pub expect_timeout: Duration,
    /// Per-command limit; `None` waits for commands indefinitely
    pub command_timeout: Option<Duration>,
    /// Skip build commands because images were built beforehand
    pub skip_build: bool,
}

impl Default for SuiteOptions {
    fn default() -> Self {
        Self {
            expect_timeout: Duration::from_secs(10),
            command_timeout: None,
            skip_build: false,
        }
    }
}

/// Part of a step being executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    Build,
    Run,
    Expect,
}

impl StepPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepPhase::Build => "build",
            StepPhase::Run => "run",
            StepPhase::Expect => "expect",
        }
    }
}

impl fmt::Display for StepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the driver is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuiteState {
    Idle,
    RunningGroup { group: String },
    RunningStep { group: String, step: usize, phase: StepPhase },
    Done,
    Aborted { group: String, step: usize, phase: StepPhase },
}

/// Outcome of a run where everything passed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteSummary {
    pub groups_passed: usize,
    pub steps_passed: usize,
    pub elapsed: Duration,
}

/// Sequences groups and steps against one target
pub struct SuiteDriver {
    log: RunLog,
    options: SuiteOptions,
    state: SuiteState,
}

impl SuiteDriver {
    pub fn new(log: RunLog, options: SuiteOptions) -> Self {
        Self {
            log,
            options,
            state: SuiteState::Idle,
        }
    }

    pub fn state(&self) -> &SuiteState {
        &self.state
    }

    /// Give back the run log, e.g. to append a trailer
    pub fn into_log(self) -> RunLog {
        self.log
    }

    /// Run `groups` in order, stopping at the first failure
    ///
    /// The returned error is an [`Error::StepFailed`] naming the group,
    /// step and phase, wrapping the command or expectation error.
    pub async fn run(
        &mut self,
        groups: &[&TestGroup],
        lines: &mut mpsc::Receiver<String>,
    ) -> Result<SuiteSummary> {
        let started = Instant::now();
        let mut steps_passed = 0;

        for group in groups {
            match self.run_group(group, lines).await {
                Ok(steps) => steps_passed += steps,
                Err(e) => {
                    if let SuiteState::RunningStep { group, step, phase } = self.state.clone() {
                        self.state = SuiteState::Aborted { group, step, phase };
                    }
                    tracing::error!("Run aborted: {}", e);
                    println!("    {} {}", "Failed:".red().bold(), e);
                    if let Err(log_err) = self.log.failed(&e).and_then(|()| self.log.flush()) {
                        tracing::warn!(
                            "Failed to record the failure in {}: {}",
                            self.log.path().display(),
                            log_err
                        );
                    }
                    return Err(e);
                }
            }
        }

        self.state = SuiteState::Done;
        self.log.flush()?;

        Ok(SuiteSummary {
            groups_passed: groups.len(),
            steps_passed,
            elapsed: started.elapsed(),
        })
    }

    async fn run_group(
        &mut self,
        group: &TestGroup,
        lines: &mut mpsc::Receiver<String>,
    ) -> Result<usize> {
        self.state = SuiteState::RunningGroup {
            group: group.name.clone(),
        };
        tracing::info!(group = %group.id(), steps = group.steps.len(), "Starting group");
        println!("Running {:?}", group.name);
        self.log.group_start(&group.name)?;

        for (i, step) in group.steps.iter().enumerate() {
            let step_num = i + 1;
            self.run_step(group, step_num, step, lines)
                .await
                .map_err(|e| {
                    let phase = match &self.state {
                        SuiteState::RunningStep { phase, .. } => *phase,
                        _ => StepPhase::Build,
                    };
                    Error::step_failed(&group.name, step_num, phase.as_str(), e)
                })?;
        }

        self.log.group_passed(&group.name)?;
        println!("    {}", "Passed!".green());
        tracing::info!(group = %group.id(), "Group passed");
        Ok(group.steps.len())
    }

    async fn run_step(
        &mut self,
        group: &TestGroup,
        step_num: usize,
        step: &TestStep,
        lines: &mut mpsc::Receiver<String>,
    ) -> Result<()> {
        self.enter(group, step_num, StepPhase::Build);
        if self.options.skip_build {
            for cmd in &step.build {
                self.log.skipped(&cmd.to_string())?;
            }
        } else {
            exec::run_commands(&step.build, &mut self.log, self.options.command_timeout).await?;
        }

        self.enter(group, step_num, StepPhase::Run);
        exec::run_commands(&step.commands, &mut self.log, self.options.command_timeout).await?;

        self.enter(group, step_num, StepPhase::Expect);
        let timeout = step.timeout(self.options.expect_timeout);
        let line = expect(lines, &step.expect, timeout, &mut self.log).await?;

        self.log.passed()?;
        tracing::debug!(group = %group.id(), step = step_num, line = %line, "Step passed");
        Ok(())
    }

    fn enter(&mut self, group: &TestGroup, step: usize, phase: StepPhase) {
        tracing::debug!(group = %group.id(), step, phase = %phase, "Entering phase");
        self.state = SuiteState::RunningStep {
            group: group.name.clone(),
            step,
            phase,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::table::TestTable;

    fn driver(dir: &std::path::Path, options: SuiteOptions) -> SuiteDriver {
        SuiteDriver::new(RunLog::create(&dir.join("tests.log")).unwrap(), options)
    }

    fn fast() -> SuiteOptions {
        SuiteOptions {
            expect_timeout: Duration::from_millis(200),
            ..SuiteOptions::default()
        }
    }

    fn read_log(driver: SuiteDriver) -> String {
        let log = driver.into_log();
        let path = log.path().to_path_buf();
        drop(log);
        std::fs::read_to_string(path).unwrap()
    }

    #[tokio::test]
    async fn test_all_steps_pass() {
        let dir = tempfile::tempdir().unwrap();
        let table = TestTable::from_yaml(
            r#"
groups:
  - name: Good RSA
    steps:
      - commands: [["true"]]
        expect: Unable to find bootable image
      - commands: [["true"]]
        expect: Hello World from hello1
"#,
        )
        .unwrap();
        let (tx, mut rx) = mpsc::channel(30);
        for line in ["Unable to find bootable image", "noise", "Hello World from hello1"] {
            tx.send(line.to_string()).await.unwrap();
        }

        let mut driver = driver(dir.path(), fast());
        let groups = table.select(&[]).unwrap();
        let summary = driver.run(&groups, &mut rx).await.unwrap();
        assert_eq!(summary.groups_passed, 1);
        assert_eq!(summary.steps_passed, 2);
        assert_eq!(driver.state(), &SuiteState::Done);

        let log = read_log(driver);
        assert_eq!(log.matches("---- Passed\n").count(), 2);
        assert!(log.contains("---- Group passed: \"Good RSA\""));
    }

    #[tokio::test]
    async fn test_build_failure_skips_rest_of_run() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("flashed");
        let table = TestTable::from_yaml(&format!(
            r#"
groups:
  - name: First
    steps:
      - build: [["false"]]
        commands: [[touch, "{marker}"]]
        expect: never
  - name: Second
    steps:
      - commands: [[touch, "{marker}"]]
        expect: never
"#,
            marker = marker.display()
        ))
        .unwrap();
        let (_tx, mut rx) = mpsc::channel::<String>(30);

        let mut driver = driver(dir.path(), fast());
        let groups = table.select(&[]).unwrap();
        let err = driver.run(&groups, &mut rx).await.unwrap_err();

        assert!(!marker.exists());
        assert!(matches!(err.root(), Error::CommandFailed { .. }));
        assert!(err.to_string().starts_with("First step 1 (build): "));
        assert_eq!(
            driver.state(),
            &SuiteState::Aborted {
                group: "First".to_string(),
                step: 1,
                phase: StepPhase::Build,
            }
        );

        let log = read_log(driver);
        assert!(!log.contains("---- expect:"));
        assert!(!log.contains("Second"));
        assert!(log.contains("---- Failed: First step 1 (build)"));
    }

    #[tokio::test]
    async fn test_timeout_aborts_with_expected_string() {
        let dir = tempfile::tempdir().unwrap();
        let table = TestTable::from_yaml(
            r#"
groups:
  - name: Wrong RSA
    steps:
      - commands: [["true"]]
        expect: Hello World from hello1
      - commands: [["true"]]
        expect: unreachable
"#,
        )
        .unwrap();
        let (tx, mut rx) = mpsc::channel(30);
        tx.send("Hello World from hello2".to_string()).await.unwrap();

        let mut driver = driver(dir.path(), fast());
        let groups = table.select(&[]).unwrap();
        let err = driver.run(&groups, &mut rx).await.unwrap_err();

        assert_eq!(
            err.root().to_string(),
            "timeout, didn't receive expected string: \"Hello World from hello1\""
        );
        assert!(matches!(
            driver.state(),
            SuiteState::Aborted { step: 1, phase: StepPhase::Expect, .. }
        ));
        assert!(!read_log(driver).contains("unreachable"));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_step_failure_survives_run_log_write_error() {
        // Writes to /dev/full fail with ENOSPC once the buffer is flushed.
        let log = RunLog::create(std::path::Path::new("/dev/full")).unwrap();
        let table = TestTable {
            groups: vec![TestGroup {
                name: "Good RSA".to_string(),
                short_name: None,
                steps: vec![TestStep {
                    build: Vec::new(),
                    commands: vec![crate::suite::CommandVector::new(Vec::<String>::new())],
                    expect: "never".to_string(),
                    timeout_secs: None,
                }],
            }],
        };
        let (_tx, mut rx) = mpsc::channel::<String>(30);

        let mut driver = SuiteDriver::new(log, fast());
        let groups = table.select(&[]).unwrap();
        let err = driver.run(&groups, &mut rx).await.unwrap_err();
        assert!(matches!(err.root(), Error::EmptyCommand), "{err}");
        assert!(err.to_string().starts_with("Good RSA step 1 (run): "));
    }

    #[tokio::test]
    async fn test_prebuilt_skips_build_commands() {
        let dir = tempfile::tempdir().unwrap();
        let table = TestTable::from_yaml(
            r#"
groups:
  - name: Overwrite
    steps:
      - build: [["false"]]
        commands: [["true"]]
        expect: Hello World from hello2
"#,
        )
        .unwrap();
        let (tx, mut rx) = mpsc::channel(30);
        tx.send("Hello World from hello2".to_string()).await.unwrap();

        let mut driver = driver(
            dir.path(),
            SuiteOptions {
                skip_build: true,
                ..fast()
            },
        );
        let groups = table.select(&[]).unwrap();
        driver.run(&groups, &mut rx).await.unwrap();
        assert!(read_log(driver).contains("---- Skip (prebuilt): [false]"));
    }

    #[tokio::test]
    async fn test_step_timeout_override() {
        let dir = tempfile::tempdir().unwrap();
        let table = TestTable::from_yaml(
            r#"
groups:
  - name: Slow boot
    steps:
      - commands: [["true"]]
        expect: booted
        timeout_secs: 5
"#,
        )
        .unwrap();
        let (tx, mut rx) = mpsc::channel(30);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let _ = tx.send("booted".to_string()).await;
        });

        // The run default (200ms) alone would miss the line.
        let mut driver = driver(dir.path(), fast());
        let groups = table.select(&[]).unwrap();
        driver.run(&groups, &mut rx).await.unwrap();
    }
}
