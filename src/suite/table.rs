//! Declarative test table
//!
//! Defines the data structures for deserializing the YAML table of test
//! groups. A table is loaded once, validated, and then only read.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::common::config::MAX_TIMEOUT_SECS;
use crate::common::{display_command, Error, Result};

/// Table shipped with the crate: the MCUboot Zephyr sample scenarios
const BUILTIN_TABLE: &str = include_str!("../../tables/mcuboot-zephyr.yaml");

/// A complete, validated test table
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TestTable {
    /// Test groups in execution order
    pub groups: Vec<TestGroup>,
}

/// One end-to-end scenario, e.g. "upgrade with a corrupted ECDSA signature"
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TestGroup {
    /// Display name
    pub name: String,
    /// Identifier used to select the group from the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    /// Steps, run strictly in order
    pub steps: Vec<TestStep>,
}

/// One action followed by one verification
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TestStep {
    /// Commands that produce the images (skipped with prebuilt images)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build: Vec<CommandVector>,
    /// Commands that act on the target (erase, flash, reset)
    pub commands: Vec<CommandVector>,
    /// Substring the console must show afterwards
    pub expect: String,
    /// Overrides the run's expectation timeout for this step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Executable followed by its arguments, passed to the OS without a shell
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct CommandVector(Vec<String>);

impl CommandVector {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(argv.into_iter().map(Into::into).collect())
    }

    /// The executable, if the vector is not empty
    pub fn program(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[String]> for CommandVector {
    fn as_ref(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for CommandVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&display_command(&self.0))
    }
}

impl TestTable {
    /// Parse and validate a table from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let table: TestTable =
            serde_yaml::from_str(content).map_err(|e| Error::TableParse(e.to_string()))?;
        table.validate()?;
        Ok(table)
    }

    /// Load a table from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_yaml(&content).map_err(|e| match e {
            Error::TableParse(msg) => Error::TableParse(format!("{}: {}", path.display(), msg)),
            Error::InvalidTable(msg) => Error::InvalidTable(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// The table shipped with the crate
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_TABLE)
    }

    /// Load `path` if given, the built-in table otherwise
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    /// Check the structural invariants the driver relies on
    pub fn validate(&self) -> Result<()> {
        if self.groups.is_empty() {
            return Err(Error::invalid_table("no test groups"));
        }

        let mut short_names = HashSet::new();
        for group in &self.groups {
            if group.name.trim().is_empty() {
                return Err(Error::invalid_table("group with an empty name"));
            }
            if let Some(short) = &group.short_name {
                if !short_names.insert(short.as_str()) {
                    return Err(Error::invalid_table(format!(
                        "duplicate short name '{}'",
                        short
                    )));
                }
            }
            if group.steps.is_empty() {
                return Err(Error::invalid_table(format!(
                    "group '{}' has no steps",
                    group.name
                )));
            }

            for (i, step) in group.steps.iter().enumerate() {
                let at = || format!("group '{}' step {}", group.name, i + 1);
                if step.commands.is_empty() {
                    return Err(Error::invalid_table(format!("{} has no commands", at())));
                }
                if step.expect.is_empty() {
                    return Err(Error::invalid_table(format!(
                        "{} has an empty expected string",
                        at()
                    )));
                }
                if step.build.iter().chain(&step.commands).any(CommandVector::is_empty) {
                    return Err(Error::invalid_table(format!(
                        "{} has an empty command vector",
                        at()
                    )));
                }
                if step.timeout_secs == Some(0) {
                    return Err(Error::invalid_table(format!("{} has a zero timeout", at())));
                }
                if matches!(step.timeout_secs, Some(secs) if secs > MAX_TIMEOUT_SECS) {
                    return Err(Error::invalid_table(format!(
                        "{} has a timeout above {} seconds",
                        at(),
                        MAX_TIMEOUT_SECS
                    )));
                }
            }
        }

        Ok(())
    }

    /// Groups to run, in table order
    ///
    /// An empty `only` selects everything. Otherwise each entry must name a
    /// group by short name (or full name when it has none).
    pub fn select(&self, only: &[String]) -> Result<Vec<&TestGroup>> {
        if only.is_empty() {
            return Ok(self.groups.iter().collect());
        }

        for name in only {
            if !self.groups.iter().any(|g| g.id() == name) {
                let available: Vec<&str> = self.groups.iter().map(TestGroup::id).collect();
                return Err(Error::UnknownGroup {
                    name: name.clone(),
                    available: available.join(", "),
                });
            }
        }

        Ok(self
            .groups
            .iter()
            .filter(|g| only.iter().any(|name| name == g.id()))
            .collect())
    }

    /// Every command vector in the table, build commands included
    pub fn commands(&self) -> impl Iterator<Item = &CommandVector> {
        self.groups
            .iter()
            .flat_map(|g| &g.steps)
            .flat_map(|s| s.build.iter().chain(&s.commands))
    }
}

impl TestGroup {
    /// Short name if present, display name otherwise
    pub fn id(&self) -> &str {
        self.short_name.as_deref().unwrap_or(&self.name)
    }
}

impl TestStep {
    /// Expectation timeout for this step
    pub fn timeout(&self, default: Duration) -> Duration {
        self.timeout_secs.map(Duration::from_secs).unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"
groups:
  - name: Good RSA
    short_name: good-rsa
    steps:
      - build:
          - [make, test-good-rsa]
        commands:
          - [make, flash_boot]
        expect: Unable to find bootable image
      - commands:
          - [make, flash_hello1]
        expect: Hello World from hello1
        timeout_secs: 30
  - name: Overwrite
    steps:
      - commands:
          - [pyocd, commander, -c, reset]
        expect: Hello World from hello2
"#;

    #[test]
    fn test_parse() {
        let table = TestTable::from_yaml(SMALL).unwrap();
        assert_eq!(table.groups.len(), 2);

        let good = &table.groups[0];
        assert_eq!(good.id(), "good-rsa");
        assert_eq!(good.steps[0].build, vec![CommandVector::new(["make", "test-good-rsa"])]);
        assert_eq!(good.steps[0].commands[0].program(), Some("make"));
        assert_eq!(good.steps[1].timeout(Duration::from_secs(10)), Duration::from_secs(30));
        assert_eq!(good.steps[0].timeout(Duration::from_secs(10)), Duration::from_secs(10));

        let overwrite = &table.groups[1];
        assert_eq!(overwrite.id(), "Overwrite");
        assert!(overwrite.steps[0].build.is_empty());
        assert_eq!(
            overwrite.steps[0].commands[0].to_string(),
            "[pyocd commander -c reset]"
        );
    }

    #[test]
    fn test_builtin_table() {
        let table = TestTable::builtin().unwrap();
        let ids: Vec<&str> = table.groups.iter().map(TestGroup::id).collect();
        assert_eq!(
            ids,
            vec![
                "good-rsa",
                "good-ecdsa",
                "overwrite",
                "bad-rsa-upgrade",
                "bad-ecdsa-upgrade",
                "no-bootcheck",
                "wrong-rsa",
                "wrong-ecdsa",
            ]
        );
        for group in &table.groups {
            assert_eq!(group.steps.len(), 4);
            assert_eq!(group.steps[0].expect, "Unable to find bootable image");
            assert_eq!(group.steps[0].commands[0], CommandVector::new(["pyocd", "erase", "--chip"]));
        }

        // A rejected upgrade keeps running hello1.
        let wrong = table.select(&["wrong-rsa".to_string()]).unwrap()[0];
        assert_eq!(wrong.steps[2].commands[0], CommandVector::new(["make", "flash_hello2"]));
        assert_eq!(wrong.steps[2].expect, "Hello World from hello1");
    }

    #[test]
    fn test_select_keeps_table_order() {
        let table = TestTable::builtin().unwrap();
        let picked = table
            .select(&["wrong-ecdsa".to_string(), "good-rsa".to_string()])
            .unwrap();
        let ids: Vec<&str> = picked.iter().map(|g| g.id()).collect();
        assert_eq!(ids, vec!["good-rsa", "wrong-ecdsa"]);
    }

    #[test]
    fn test_select_unknown() {
        let table = TestTable::from_yaml(SMALL).unwrap();
        let err = table.select(&["bad-rsa".to_string()]).unwrap_err();
        match err {
            Error::UnknownGroup { name, available } => {
                assert_eq!(name, "bad-rsa");
                assert_eq!(available, "good-rsa, Overwrite");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_structural_problems() {
        let cases = [
            "groups: []",
            "groups:\n  - name: Empty\n    steps: []",
            "groups:\n  - name: A\n    steps:\n      - commands: []\n        expect: x",
            "groups:\n  - name: A\n    steps:\n      - commands: [[make]]\n        expect: ''",
            "groups:\n  - name: A\n    steps:\n      - commands: [[]]\n        expect: x",
            "groups:\n  - name: A\n    steps:\n      - build: [[]]\n        commands: [[make]]\n        expect: x",
            "groups:\n  - name: A\n    steps:\n      - commands: [[make]]\n        expect: x\n        timeout_secs: 0",
            "groups:\n  - name: A\n    short_name: a\n    steps:\n      - commands: [[make]]\n        expect: x\n  - name: B\n    short_name: a\n    steps:\n      - commands: [[make]]\n        expect: x",
        ];
        for case in cases {
            let err = TestTable::from_yaml(case).unwrap_err();
            assert!(matches!(err, Error::InvalidTable(_)), "{case}: {err}");
        }
    }

    #[test]
    fn test_rejects_huge_step_timeout() {
        let err = TestTable::from_yaml(
            "groups:\n  - name: A\n    steps:\n      - commands: [[make]]\n        expect: x\n        timeout_secs: 18446744073709551615",
        )
        .unwrap_err();
        assert!(err.to_string().contains("timeout above"), "{err}");

        let table = TestTable::from_yaml(&format!(
            "groups:\n  - name: A\n    steps:\n      - commands: [[make]]\n        expect: x\n        timeout_secs: {}",
            MAX_TIMEOUT_SECS
        ))
        .unwrap();
        assert_eq!(
            table.groups[0].steps[0].timeout(Duration::from_secs(10)),
            Duration::from_secs(MAX_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let err = TestTable::from_yaml(
            "groups:\n  - name: A\n    steps:\n      - command: [[make]]\n        expect: x",
        )
        .unwrap_err();
        assert!(matches!(err, Error::TableParse(_)));
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.yaml");
        std::fs::write(&path, "groups: []").unwrap();
        let err = TestTable::load(&path).unwrap_err();
        assert!(err.to_string().contains("table.yaml"));
    }

    #[test]
    fn test_commands_iterates_build_and_run() {
        let table = TestTable::from_yaml(SMALL).unwrap();
        let programs: Vec<&str> = table.commands().filter_map(CommandVector::program).collect();
        assert_eq!(programs, vec!["make", "make", "make", "pyocd"]);
    }
}
