use super::*;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, Result};
use rusqlite::Connection;
use semver::Version;
use versionup_core::UpgradePackage;

type CallLog = Rc<RefCell<Vec<String>>>;

#[derive(Default)]
struct MemorySource {
    entries: Vec<PackageEntry>,
    scripts: BTreeMap<PathBuf, String>,
}

impl MemorySource {
    fn with_package(mut self, name: &str, hook: bool, sql: Option<&str>) -> Self {
        let code_hook = hook.then(|| PathBuf::from(format!("{name}/{CODE_HOOK_FILE}")));
        let sql_script = sql.map(|script| {
            let path = PathBuf::from(format!("{name}/{SQL_SCRIPT_FILE}"));
            self.scripts.insert(path.clone(), script.to_string());
            path
        });
        self.entries.push(PackageEntry {
            name: name.to_string(),
            code_hook,
            sql_script,
        });
        self
    }
}

impl PackageSource for MemorySource {
    fn candidate_entries(&self) -> Result<Vec<PackageEntry>> {
        Ok(self.entries.clone())
    }

    fn read_sql_script(&self, path: &Path) -> Result<String> {
        self.scripts
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("missing script {}", path.display()))
    }
}

struct RecordingHooks {
    log: CallLog,
    fault_on: Option<Version>,
}

impl CodeHookRunner for RecordingHooks {
    fn run_hook(&self, package: &UpgradePackage, _hook: &Path) -> Result<()> {
        self.log
            .borrow_mut()
            .push(format!("hook {}", package.version));
        if self.fault_on.as_ref() == Some(&package.version) {
            return Err(anyhow!("hook exploded"));
        }
        Ok(())
    }
}

struct RecordingDatabase {
    log: CallLog,
    fail_marker: &'static str,
}

impl SqlExecutor for RecordingDatabase {
    fn execute_statement(&mut self, statement: &str) -> Result<()> {
        self.log.borrow_mut().push(format!("sql {statement}"));
        if statement.contains(self.fail_marker) {
            return Err(anyhow!("syntax error near {}", self.fail_marker));
        }
        Ok(())
    }
}

fn recorders(fault_on: Option<Version>) -> (CallLog, RecordingHooks, RecordingDatabase) {
    let log: CallLog = Rc::new(RefCell::new(Vec::new()));
    let hooks = RecordingHooks {
        log: Rc::clone(&log),
        fault_on,
    };
    let database = RecordingDatabase {
        log: Rc::clone(&log),
        fail_marker: "BROKEN",
    };
    (log, hooks, database)
}

fn v(raw: &str) -> Version {
    Version::parse(raw).expect("test version must parse")
}

static TEST_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_root() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let sequence = TEST_ROOT_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut path = std::env::temp_dir();
    path.push(format!(
        "versionup-migrate-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        sequence
    ));
    path
}

#[test]
fn discovery_filters_and_orders_eligible_versions() {
    let source = MemorySource::default()
        .with_package("1.5.0", false, None)
        .with_package("v1.6", false, None)
        .with_package("1.1.0", false, None)
        .with_package("1.3.0", false, None)
        .with_package("1.2.0", false, None)
        .with_package("1.4.0", false, None);

    let packages =
        discover_packages(&source, &v("1.2.0"), &v("1.5.0")).expect("discovery must succeed");
    let versions = packages
        .iter()
        .map(|package| package.version.to_string())
        .collect::<Vec<_>>();
    assert_eq!(versions, vec!["1.3.0", "1.4.0", "1.5.0"]);
}

#[test]
fn discovery_ignores_non_version_names_anywhere_in_listing() {
    let source = MemorySource::default()
        .with_package("notes", true, Some("SELECT 1;"))
        .with_package("2.0.0", false, None)
        .with_package("2.0.0-rc1", true, None)
        .with_package("2.1", true, None);

    let packages =
        discover_packages(&source, &v("1.0.0"), &v("3.0.0")).expect("discovery must succeed");
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].version, v("2.0.0"));
}

#[test]
fn discovery_keeps_one_package_per_version() {
    let source = MemorySource::default()
        .with_package("1.2.3", false, None)
        .with_package("01.2.3", false, None);

    let packages =
        discover_packages(&source, &v("1.0.0"), &v("2.0.0")).expect("discovery must succeed");
    assert_eq!(packages.len(), 1);
}

#[test]
fn run_applies_hook_then_sql_for_each_package_in_order() {
    let source = MemorySource::default()
        .with_package("1.4.0", true, Some("UPDATE <<prefix>>ads SET active = 1;"))
        .with_package("1.3.0", true, Some("CREATE TABLE <<prefix>>ads (id INTEGER);"));
    let (log, hooks, mut database) = recorders(None);

    let report = Migrator::new(&source, &hooks, &mut database, "lc_")
        .run(&v("1.2.0"), &v("1.4.0"))
        .expect("run must complete");

    assert!(report.is_success());
    assert_eq!(report.applied, vec![v("1.3.0"), v("1.4.0")]);
    assert_eq!(
        *log.borrow(),
        vec![
            "hook 1.3.0".to_string(),
            "sql CREATE TABLE lc_ads (id INTEGER)".to_string(),
            "hook 1.4.0".to_string(),
            "sql UPDATE lc_ads SET active = 1".to_string(),
        ]
    );
}

#[test]
fn sql_failure_is_recorded_and_later_packages_still_run() {
    let source = MemorySource::default()
        .with_package("1.3.0", false, Some("BROKEN STATEMENT;"))
        .with_package("1.4.0", true, Some("SELECT 1;"));
    let (log, hooks, mut database) = recorders(None);

    let report = Migrator::new(&source, &hooks, &mut database, "")
        .run(&v("1.2.0"), &v("1.5.0"))
        .expect("run must complete");

    assert!(!report.is_success());
    assert!(report.applied.contains(&v("1.4.0")));
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].version, v("1.3.0"));
    assert!(report.errors[0].message.contains("statement 1 failed"));
    assert!(report.fault.is_none());
    assert!(log.borrow().contains(&"hook 1.4.0".to_string()));
}

#[test]
fn code_hook_fault_halts_remaining_packages() {
    let source = MemorySource::default()
        .with_package("1.3.0", true, Some("SELECT 3;"))
        .with_package("1.4.0", true, Some("BROKEN;"))
        .with_package("1.2.5", false, Some("SELECT 2;"));
    let (log, hooks, mut database) = recorders(Some(v("1.3.0")));

    let report = Migrator::new(&source, &hooks, &mut database, "")
        .run(&v("1.2.0"), &v("1.5.0"))
        .expect("run must complete");

    let fault = report.fault.clone().expect("fault must be surfaced");
    assert_eq!(fault.version, v("1.3.0"));
    assert!(fault.message.contains("hook exploded"));
    assert_eq!(report.applied, vec![v("1.2.5")]);
    assert!(report.errors.is_empty());
    assert!(!report.is_success());
    assert_eq!(
        *log.borrow(),
        vec!["sql SELECT 2".to_string(), "hook 1.3.0".to_string()]
    );
}

#[test]
fn unreadable_script_is_a_soft_failure() {
    let mut source = MemorySource::default().with_package("1.3.0", false, None);
    source.entries[0].sql_script = Some(PathBuf::from("1.3.0/missing.sql"));
    let (_log, hooks, mut database) = recorders(None);

    let report = Migrator::new(&source, &hooks, &mut database, "")
        .run(&v("1.0.0"), &v("2.0.0"))
        .expect("run must complete");

    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].message.contains("missing script"));
}

#[test]
fn nothing_to_apply_when_no_versions_are_eligible() {
    let source = MemorySource::default().with_package("1.0.0", true, Some("BROKEN;"));
    let (log, hooks, mut database) = recorders(None);

    let report = Migrator::new(&source, &hooks, &mut database, "")
        .run(&v("1.0.0"), &v("1.0.0"))
        .expect("run must complete");

    assert!(report.is_success());
    assert!(report.applied.is_empty());
    assert!(log.borrow().is_empty());
}

#[test]
fn split_handles_delimiters_inside_literals_and_comments() {
    let script = r#"
-- leading comment; with a semicolon
INSERT INTO t (a, b) VALUES ('x;y', "q;r");
/* block; comment */
UPDATE t SET a = 'it''s; fine' WHERE `b;c` = 1; # trailing; note
SELECT 1
"#;

    let statements = split_sql_statements(script);
    assert_eq!(
        statements,
        vec![
            r#"INSERT INTO t (a, b) VALUES ('x;y', "q;r")"#.to_string(),
            "UPDATE t SET a = 'it''s; fine' WHERE `b;c` = 1".to_string(),
            "SELECT 1".to_string(),
        ]
    );
}

#[test]
fn split_honors_delimiter_directive() {
    let script = "DELIMITER $$\nCREATE TRIGGER trg AFTER INSERT ON t BEGIN\n  UPDATE c SET n = n + 1;\nEND$$\nDELIMITER ;\nSELECT 2;\n";

    let statements = split_sql_statements(script);
    assert_eq!(statements.len(), 2);
    assert!(statements[0].starts_with("CREATE TRIGGER trg"));
    assert!(statements[0].ends_with("END"));
    assert!(statements[0].contains("UPDATE c SET n = n + 1;"));
    assert_eq!(statements[1], "SELECT 2");
}

#[test]
fn split_keeps_native_trigger_body_in_one_statement() {
    let script = "CREATE TEMP TRIGGER trg AFTER INSERT ON t BEGIN\n  UPDATE c SET n = CASE WHEN n > 9 THEN 0 ELSE n + 1 END;\n  DELETE FROM log;\nEND;\nSELECT 'end; begin';\n";

    let statements = split_sql_statements(script);
    assert_eq!(statements.len(), 2, "{statements:?}");
    assert!(statements[0].starts_with("CREATE TEMP TRIGGER trg"));
    assert!(statements[0].contains("DELETE FROM log;"));
    assert!(statements[0].ends_with("END"));
    assert_eq!(statements[1], "SELECT 'end; begin'");
}

#[test]
fn split_does_not_treat_begin_transaction_as_trigger_body() {
    let statements = split_sql_statements("BEGIN;\nINSERT INTO t VALUES (1);\nEND;\n");
    assert_eq!(statements, vec!["BEGIN", "INSERT INTO t VALUES (1)", "END"]);
}

#[test]
fn split_skips_empty_statements() {
    assert!(split_sql_statements(" ;; \n -- only a comment\n").is_empty());
}

#[test]
fn import_substitutes_prefix_and_executes_against_sqlite() {
    let mut connection = Connection::open_in_memory().expect("must open sqlite");
    let script = "CREATE TABLE <<prefix>>settings (key TEXT, value TEXT);\nINSERT INTO <<prefix>>settings VALUES ('app.name', 'Ads; Inc');\n";

    let report = import_sql_script(&mut connection, script, "lc_");
    assert!(report.is_success(), "unexpected failures: {}", report.summary());
    assert_eq!(report.executed, 2);

    let value: String = connection
        .query_row(
            "SELECT value FROM lc_settings WHERE key = 'app.name'",
            [],
            |row| row.get(0),
        )
        .expect("row must exist");
    assert_eq!(value, "Ads; Inc");
}

#[test]
fn import_creates_native_sqlite_trigger_that_fires() {
    let mut connection = Connection::open_in_memory().expect("must open sqlite");
    let script = "CREATE TABLE <<prefix>>ads (id INTEGER);\nCREATE TABLE <<prefix>>counter (n INTEGER);\nINSERT INTO <<prefix>>counter VALUES (0);\nCREATE TRIGGER <<prefix>>count_ads AFTER INSERT ON <<prefix>>ads BEGIN\n  UPDATE <<prefix>>counter SET n = n + 1;\nEND;\nINSERT INTO <<prefix>>ads VALUES (1);\n";

    let report = import_sql_script(&mut connection, script, "lc_");
    assert!(report.is_success(), "unexpected failures: {}", report.summary());
    assert_eq!(report.executed, 5);

    let count: i64 = connection
        .query_row("SELECT n FROM lc_counter", [], |row| row.get(0))
        .expect("counter must exist");
    assert_eq!(count, 1);
}

#[test]
fn import_reports_failing_statements_and_continues() {
    let mut connection = Connection::open_in_memory().expect("must open sqlite");
    let script = "CREATE TABLE a (id INTEGER);\nINSERT INTO missing VALUES (1);\nINSERT INTO a VALUES (7);\n";

    let report = import_sql_script(&mut connection, script, "");
    assert!(!report.is_success());
    assert_eq!(report.executed, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 2);
    assert!(report.summary().starts_with("statement 2 failed:"));

    let count: i64 = connection
        .query_row("SELECT COUNT(*) FROM a", [], |row| row.get(0))
        .expect("count must succeed");
    assert_eq!(count, 1);
}

#[test]
fn dir_source_lists_version_directories_with_package_files() {
    let root = test_root();
    fs::create_dir_all(root.join("1.3.0")).expect("must create dir");
    fs::create_dir_all(root.join("1.4.0")).expect("must create dir");
    fs::write(root.join("1.3.0").join(SQL_SCRIPT_FILE), "SELECT 1;").expect("must write sql");
    fs::write(root.join("1.4.0").join(CODE_HOOK_FILE), "#!/bin/sh\n").expect("must write hook");
    fs::write(root.join("README.md"), "not a package").expect("must write file");

    let source = DirPackageSource::new(&root);
    let entries = source.candidate_entries().expect("must list entries");

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "1.3.0");
    assert!(entries[0].code_hook.is_none());
    assert_eq!(
        entries[0].sql_script.as_deref(),
        Some(root.join("1.3.0").join(SQL_SCRIPT_FILE).as_path())
    );
    assert_eq!(entries[1].name, "1.4.0");
    assert!(entries[1].code_hook.is_some());
    assert!(entries[1].sql_script.is_none());

    let _ = fs::remove_dir_all(&root);
}

#[cfg(unix)]
#[test]
fn dir_source_follows_symlinked_version_directories() {
    let root = test_root();
    let shared = root.with_extension("shared");
    fs::create_dir_all(&shared).expect("must create target dir");
    fs::write(shared.join(SQL_SCRIPT_FILE), "SELECT 1;").expect("must write sql");
    fs::create_dir_all(&root).expect("must create root");
    std::os::unix::fs::symlink(&shared, root.join("1.3.0")).expect("must link");

    let entries = DirPackageSource::new(&root)
        .candidate_entries()
        .expect("must list entries");

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "1.3.0");
    assert!(entries[0].sql_script.is_some());

    let _ = fs::remove_dir_all(&root);
    let _ = fs::remove_dir_all(&shared);
}

#[test]
fn dir_source_missing_root_lists_nothing() {
    let source = DirPackageSource::new(test_root());
    assert!(source
        .candidate_entries()
        .expect("missing root is not an error")
        .is_empty());
}

#[test]
fn command_hook_runner_builds_interpreter_command() {
    let runner = CommandHookRunner::new("/srv/app")
        .with_interpreter(vec!["sh".to_string(), "-e".to_string()])
        .with_env("VERSIONUP_TABLE_PREFIX", "lc_");
    let package = UpgradePackage::new(v("1.3.0"));

    let command = runner.build_command(&package, Path::new("/srv/app/database/upgrade/1.3.0/update"));
    assert_eq!(command.get_program(), "sh");
    let args = command
        .get_args()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    assert_eq!(args, vec!["-e", "/srv/app/database/upgrade/1.3.0/update"]);
    assert_eq!(command.get_current_dir(), Some(Path::new("/srv/app")));

    let envs = command
        .get_envs()
        .map(|(key, value)| {
            (
                key.to_string_lossy().into_owned(),
                value.map(|value| value.to_string_lossy().into_owned()),
            )
        })
        .collect::<Vec<_>>();
    assert!(envs.contains(&("VERSIONUP_VERSION".to_string(), Some("1.3.0".to_string()))));
    assert!(envs.contains(&("VERSIONUP_TABLE_PREFIX".to_string(), Some("lc_".to_string()))));
}

#[cfg(unix)]
#[test]
fn command_hook_runner_reports_non_zero_exit() {
    let root = test_root();
    fs::create_dir_all(&root).expect("must create root");
    let hook = root.join(CODE_HOOK_FILE);
    fs::write(&hook, "echo 'migration step failed' >&2\nexit 3\n").expect("must write hook");

    let runner = CommandHookRunner::new(&root).with_interpreter(vec!["sh".to_string()]);
    let err = runner
        .run_hook(&UpgradePackage::new(v("1.3.0")), &hook)
        .expect_err("non-zero exit must fail");
    let message = format!("{err:#}");
    assert!(message.contains("migration step failed"), "{message}");

    let _ = fs::remove_dir_all(&root);
}

#[cfg(unix)]
#[test]
fn command_hook_runner_succeeds_on_zero_exit() {
    let root = test_root();
    fs::create_dir_all(&root).expect("must create root");
    let hook = root.join(CODE_HOOK_FILE);
    fs::write(&hook, "test \"$VERSIONUP_VERSION\" = \"1.3.0\"\n").expect("must write hook");

    let runner = CommandHookRunner::new(&root).with_interpreter(vec!["sh".to_string()]);
    runner
        .run_hook(&UpgradePackage::new(v("1.3.0")), &hook)
        .expect("hook must succeed");

    let _ = fs::remove_dir_all(&root);
}
