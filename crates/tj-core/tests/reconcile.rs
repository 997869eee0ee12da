//! Scenario tests for the reconciliation loop against in-memory collaborators.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, TimeZone, Utc};
use thiserror::Error;

use tj_core::{
    ClientConfig, ClientIdentity, ClientRef, ClientSection, ConfigError, GlobalConfig,
    MAX_PERIOD_DAYS, Project, ProjectRef, ReconcileError, Reconciler, RunMode, RuntimeOverrides,
    TagNames, TagSet, TimeEntry, TimeSource, WorkLogRecord, WorklogConfirmation, WorklogSink,
};

#[derive(Debug, Error)]
#[error("{0}")]
struct FakeError(String);

#[derive(Default)]
struct FakeToggl {
    entries: RefCell<BTreeMap<u64, TimeEntry>>,
    projects: BTreeMap<u64, Project>,
    clients: BTreeMap<u64, ClientIdentity>,
    broken_projects: HashSet<u64>,
    fail_fetch: bool,
    fail_updates: bool,
    updates: Cell<usize>,
    fetched_window: Cell<Option<(DateTime<Utc>, DateTime<Utc>)>>,
}

impl FakeToggl {
    fn with_client(mut self, client_id: u64, name: &str) -> Self {
        self.clients.insert(
            client_id,
            ClientIdentity {
                name: name.to_string(),
            },
        );
        self
    }

    fn with_project(mut self, project_id: u64, name: &str, client_id: Option<u64>) -> Self {
        self.projects.insert(
            project_id,
            Project {
                name: name.to_string(),
                client: client_id.map(|client_id| ClientRef {
                    workspace_id: 1,
                    client_id,
                }),
            },
        );
        self
    }

    fn with_entry(self, entry: TimeEntry) -> Self {
        self.entries.borrow_mut().insert(entry.id, entry);
        self
    }

    fn tags(&self, id: u64) -> TagSet {
        self.entries.borrow()[&id].tags.clone()
    }
}

impl TimeSource for FakeToggl {
    type Error = FakeError;

    fn fetch_entries(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeEntry>, Self::Error> {
        if self.fail_fetch {
            return Err(FakeError("toggl is down".to_string()));
        }
        self.fetched_window.set(Some((start, end)));
        Ok(self.entries.borrow().values().cloned().collect())
    }

    fn resolve_project(&self, project: ProjectRef) -> Result<Project, Self::Error> {
        if self.broken_projects.contains(&project.project_id) {
            return Err(FakeError(format!("project {} not found", project.project_id)));
        }
        self.projects
            .get(&project.project_id)
            .cloned()
            .ok_or_else(|| FakeError(format!("project {} not found", project.project_id)))
    }

    fn resolve_client(&self, client: ClientRef) -> Result<ClientIdentity, Self::Error> {
        self.clients
            .get(&client.client_id)
            .cloned()
            .ok_or_else(|| FakeError(format!("client {} not found", client.client_id)))
    }

    fn update_entry(&self, entry: &TimeEntry) -> Result<(), Self::Error> {
        if self.fail_updates {
            return Err(FakeError("update rejected".to_string()));
        }
        self.updates.set(self.updates.get() + 1);
        self.entries.borrow_mut().insert(entry.id, entry.clone());
        Ok(())
    }
}

#[derive(Default)]
struct FakeJira {
    submitted: RefCell<Vec<(String, WorkLogRecord)>>,
    failing_issues: RefCell<HashSet<String>>,
}

impl FakeJira {
    fn fail_issue(&self, key: &str) {
        self.failing_issues.borrow_mut().insert(key.to_string());
    }

    fn heal_issue(&self, key: &str) {
        self.failing_issues.borrow_mut().remove(key);
    }

    fn issues(&self) -> Vec<String> {
        self.submitted
            .borrow()
            .iter()
            .map(|(_, record)| record.issue_key.clone())
            .collect()
    }
}

impl WorklogSink for FakeJira {
    type Error = FakeError;

    fn submit(
        &self,
        client: &ClientConfig,
        record: &WorkLogRecord,
    ) -> Result<WorklogConfirmation, Self::Error> {
        if self.failing_issues.borrow().contains(&record.issue_key) {
            return Err(FakeError(format!("issue {} does not exist", record.issue_key)));
        }
        let mut submitted = self.submitted.borrow_mut();
        submitted.push((client.host.clone(), record.clone()));
        Ok(WorklogConfirmation {
            id: submitted.len().to_string(),
        })
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 3, 18, 0, 0).unwrap()
}

fn entry(id: u64, description: &str, project_id: Option<u64>, tags: &[&str]) -> TimeEntry {
    let start = Utc.with_ymd_and_hms(2026, 3, 3, 9, 0, 0).unwrap()
        + Duration::hours(i64::try_from(id).unwrap());
    TimeEntry {
        id,
        workspace_id: 1,
        description: description.to_string(),
        start,
        stop: Some(start + Duration::minutes(50)),
        project: project_id.map(|project_id| ProjectRef {
            workspace_id: 1,
            project_id,
        }),
        tags: tags.iter().copied().collect(),
    }
}

fn config(clients: &[(&str, ClientSection)]) -> GlobalConfig {
    let default_client = ClientSection {
        jira_username: Some("me@example.com".to_string()),
        jira_password: Some("hunter2".to_string()),
        jira_client_user: Some("me".to_string()),
        jira_host: Some("https://default.atlassian.net".to_string()),
        rounding_minutes: Some(15),
        ..ClientSection::default()
    };
    let clients = clients
        .iter()
        .map(|(name, section)| ((*name).to_string(), section.clone()))
        .collect();
    GlobalConfig::new(default_client, clients, 1, TagNames::default()).unwrap()
}

fn acme_only() -> GlobalConfig {
    config(&[(
        "acme",
        ClientSection {
            jira_host: Some("https://acme.atlassian.net".to_string()),
            enabled: Some(true),
            ..ClientSection::default()
        },
    )])
}

fn acme_toggl() -> FakeToggl {
    FakeToggl::default()
        .with_client(100, "ACME")
        .with_project(10, "Website", Some(100))
        .with_project(11, "Backoffice", Some(100))
}

fn reconciler(config: GlobalConfig, mode: RunMode) -> Reconciler {
    Reconciler::new(config, RuntimeOverrides::default(), mode).unwrap()
}

#[test]
fn apply_submits_and_tags_eligible_entries() {
    let toggl = acme_toggl()
        .with_entry(entry(1, "WEB-1 landing page", Some(10), &[]))
        .with_entry(entry(2, "OPS-7", Some(11), &["billable"]));
    let jira = FakeJira::default();

    let report = reconciler(acme_only(), RunMode::Apply)
        .run(&toggl, &jira, &mut Vec::new(), now())
        .unwrap();

    assert_eq!(report.fetched, 2);
    assert_eq!(report.submitted, 2);
    assert_eq!(jira.issues(), vec!["WEB-1", "OPS-7"]);

    let submitted = jira.submitted.borrow();
    let (host, record) = &submitted[0];
    assert_eq!(host, "https://acme.atlassian.net");
    assert_eq!(record.comment, "landing page");
    assert_eq!(record.time_spent_seconds, 45 * 60);
    assert_eq!(
        record.started,
        Utc.with_ymd_and_hms(2026, 3, 3, 10, 0, 0).unwrap() + Duration::milliseconds(1)
    );

    assert_eq!(toggl.tags(1).to_vec(), vec!["logged"]);
    assert_eq!(toggl.tags(2).to_vec(), vec!["billable", "logged"]);
}

#[test]
fn second_apply_run_submits_nothing() {
    let toggl = acme_toggl()
        .with_entry(entry(1, "WEB-1 a", Some(10), &[]))
        .with_entry(entry(2, "WEB-2 b", Some(10), &[]))
        .with_entry(entry(3, "WEB-3 c", Some(11), &[]));
    let jira = FakeJira::default();
    let reconciler = reconciler(acme_only(), RunMode::Apply);

    let first = reconciler
        .run(&toggl, &jira, &mut Vec::new(), now())
        .unwrap();
    assert_eq!(first.submitted, 3);

    let second = reconciler
        .run(&toggl, &jira, &mut Vec::new(), now())
        .unwrap();
    assert_eq!(second.submitted, 0);
    assert_eq!(second.ineligible, 3);
    assert_eq!(jira.submitted.borrow().len(), 3);
}

#[test]
fn previously_failed_entry_ends_logged_without_failed_tag() {
    let toggl = acme_toggl().with_entry(entry(
        1,
        "WEB-1 retry",
        Some(10),
        &["jira-migration-failed"],
    ));
    let jira = FakeJira::default();

    let report = reconciler(acme_only(), RunMode::Apply)
        .run(&toggl, &jira, &mut Vec::new(), now())
        .unwrap();

    assert_eq!(report.submitted, 1);
    let tags = toggl.tags(1);
    assert!(tags.contains("logged"));
    assert!(!tags.contains("jira-migration-failed"));
}

#[test]
fn failed_submission_is_tagged_and_retried_next_run() {
    let toggl = acme_toggl().with_entry(entry(1, "WEB-404 missing issue", Some(10), &[]));
    let jira = FakeJira::default();
    jira.fail_issue("WEB-404");
    let reconciler = reconciler(acme_only(), RunMode::Apply);

    let first = reconciler
        .run(&toggl, &jira, &mut Vec::new(), now())
        .unwrap();
    assert_eq!(first.submission_failed, 1);
    assert_eq!(toggl.tags(1).to_vec(), vec!["jira-migration-failed"]);

    let again = reconciler
        .run(&toggl, &jira, &mut Vec::new(), now())
        .unwrap();
    assert_eq!(again.submission_failed, 1);
    assert_eq!(toggl.tags(1).to_vec(), vec!["jira-migration-failed"]);

    jira.heal_issue("WEB-404");
    let healed = reconciler
        .run(&toggl, &jira, &mut Vec::new(), now())
        .unwrap();
    assert_eq!(healed.submitted, 1);
    assert_eq!(toggl.tags(1).to_vec(), vec!["logged"]);
}

#[test]
fn project_lookup_failure_does_not_abort_the_batch() {
    let mut toggl = acme_toggl()
        .with_project(12, "Broken", Some(100))
        .with_entry(entry(1, "WEB-1 first", Some(10), &[]))
        .with_entry(entry(2, "WEB-2 second", Some(12), &[]))
        .with_entry(entry(3, "WEB-3 third", Some(11), &[]));
    toggl.broken_projects.insert(12);
    let jira = FakeJira::default();

    let report = reconciler(acme_only(), RunMode::Apply)
        .run(&toggl, &jira, &mut Vec::new(), now())
        .unwrap();

    assert_eq!(report.submitted, 2);
    assert_eq!(report.lookup_failed, 1);
    assert_eq!(jira.issues(), vec!["WEB-1", "WEB-3"]);
    assert!(toggl.tags(1).contains("logged"));
    assert!(toggl.tags(2).is_empty());
    assert!(toggl.tags(3).contains("logged"));
}

#[test]
fn entries_without_project_or_client_are_skipped_untagged() {
    let toggl = acme_toggl()
        .with_project(20, "Internal", None)
        .with_entry(entry(1, "WEB-1 no project", None, &[]))
        .with_entry(entry(2, "INT-1 no client", Some(20), &[]));
    let jira = FakeJira::default();

    let report = reconciler(acme_only(), RunMode::Apply)
        .run(&toggl, &jira, &mut Vec::new(), now())
        .unwrap();

    assert_eq!(report.lookup_failed, 2);
    assert!(jira.submitted.borrow().is_empty());
    assert_eq!(toggl.updates.get(), 0);
}

#[test]
fn preview_reports_without_side_effects() {
    let toggl = acme_toggl()
        .with_entry(entry(1, "WEB-1 landing page", Some(10), &["jira-migration-failed"]))
        .with_entry(entry(2, "WEB-2", Some(11), &[]))
        .with_entry(entry(3, "WEB-3 done", Some(11), &["logged"]));
    let jira = FakeJira::default();
    let mut output = Vec::new();

    let report = reconciler(acme_only(), RunMode::Preview)
        .run(&toggl, &jira, &mut output, now())
        .unwrap();

    assert_eq!(report.previewed, 2);
    assert_eq!(report.ineligible, 1);
    assert!(jira.submitted.borrow().is_empty());
    assert_eq!(toggl.updates.get(), 0);
    assert_eq!(toggl.tags(1).to_vec(), vec!["jira-migration-failed"]);

    let output = String::from_utf8(output).unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("WEB-1 [acme/website] 45m (tracked 50m)"));
    assert!(lines[0].ends_with(": landing page"));
    assert!(lines[1].starts_with("WEB-2 [acme/backoffice]"));
}

#[test]
fn skip_tag_is_never_submitted() {
    let toggl = acme_toggl()
        .with_entry(entry(1, "WEB-1", Some(10), &["jira-skip"]))
        .with_entry(entry(2, "WEB-2", Some(10), &["jira-skip", "jira-migration-failed"]));
    let jira = FakeJira::default();

    let report = reconciler(acme_only(), RunMode::Apply)
        .run(&toggl, &jira, &mut Vec::new(), now())
        .unwrap();

    assert_eq!(report.ineligible, 2);
    assert!(jira.submitted.borrow().is_empty());
}

#[test]
fn unconfigured_and_disabled_clients_are_skipped() {
    let toggl = acme_toggl()
        .with_client(200, "Globex")
        .with_client(300, "Initech")
        .with_client(400, "Umbrella")
        .with_project(30, "Rebrand", Some(200))
        .with_project(40, "TPS", Some(300))
        .with_project(50, "Labs", Some(400))
        .with_entry(entry(1, "GLX-1", Some(30), &[]))
        .with_entry(entry(2, "GLX-2", Some(30), &[]))
        .with_entry(entry(3, "TPS-1", Some(40), &[]))
        .with_entry(entry(4, "UMB-1", Some(50), &[]))
        .with_entry(entry(5, "WEB-1", Some(10), &[]));
    let config = config(&[
        (
            "acme",
            ClientSection {
                enabled: Some(true),
                ..ClientSection::default()
            },
        ),
        (
            "initech",
            ClientSection {
                enabled: Some(false),
                ..ClientSection::default()
            },
        ),
        (
            "umbrella",
            ClientSection {
                config_check: Some("(Remove it after fill client config)".to_string()),
                ..ClientSection::default()
            },
        ),
    ]);
    let jira = FakeJira::default();

    let report = reconciler(config, RunMode::Apply)
        .run(&toggl, &jira, &mut Vec::new(), now())
        .unwrap();

    assert_eq!(report.unconfigured, 2);
    assert_eq!(
        report.unconfigured_clients.iter().collect::<Vec<_>>(),
        vec!["globex"]
    );
    assert_eq!(report.disabled, 2);
    assert_eq!(report.submitted, 1);
    assert_eq!(jira.issues(), vec!["WEB-1"]);
    assert!(toggl.tags(1).is_empty());
}

#[test]
fn incomplete_client_configuration_only_skips_that_client() {
    let default_client = ClientSection {
        jira_username: Some("me@example.com".to_string()),
        jira_password: Some("hunter2".to_string()),
        jira_client_user: Some("me".to_string()),
        rounding_minutes: Some(1),
        ..ClientSection::default()
    };
    let clients = BTreeMap::from([
        (
            "acme".to_string(),
            ClientSection {
                jira_host: Some("https://acme.atlassian.net".to_string()),
                ..ClientSection::default()
            },
        ),
        ("globex".to_string(), ClientSection::default()),
    ]);
    let config = GlobalConfig::new(default_client, clients, 1, TagNames::default()).unwrap();
    let toggl = acme_toggl()
        .with_client(200, "Globex")
        .with_project(30, "Rebrand", Some(200))
        .with_entry(entry(1, "GLX-1", Some(30), &[]))
        .with_entry(entry(2, "WEB-1", Some(10), &[]));
    let jira = FakeJira::default();

    let report = reconciler(config, RunMode::Apply)
        .run(&toggl, &jira, &mut Vec::new(), now())
        .unwrap();

    assert_eq!(report.misconfigured, 1);
    assert_eq!(jira.issues(), vec!["WEB-1"]);
}

#[test]
fn invalid_and_running_entries_are_skipped() {
    let mut running = entry(3, "WEB-3 still going", Some(10), &[]);
    running.stop = None;
    let mut backwards = entry(4, "WEB-4", Some(10), &[]);
    backwards.stop = Some(backwards.start - Duration::minutes(1));
    let toggl = acme_toggl()
        .with_entry(entry(1, "   ", Some(10), &[]))
        .with_entry(entry(2, "WEB-2 fine", Some(10), &[]))
        .with_entry(running)
        .with_entry(backwards);
    let jira = FakeJira::default();

    let report = reconciler(acme_only(), RunMode::Apply)
        .run(&toggl, &jira, &mut Vec::new(), now())
        .unwrap();

    assert_eq!(report.invalid, 2);
    assert_eq!(report.running, 1);
    assert_eq!(report.submitted, 1);
    assert!(toggl.tags(1).is_empty());
    assert!(toggl.tags(3).is_empty());
    assert!(toggl.tags(4).is_empty());
}

#[test]
fn failed_tag_update_keeps_the_submission() {
    let mut toggl = acme_toggl()
        .with_entry(entry(1, "WEB-1", Some(10), &[]))
        .with_entry(entry(2, "WEB-2", Some(10), &[]));
    toggl.fail_updates = true;
    let jira = FakeJira::default();

    let report = reconciler(acme_only(), RunMode::Apply)
        .run(&toggl, &jira, &mut Vec::new(), now())
        .unwrap();

    assert_eq!(report.submitted, 2);
    assert_eq!(report.tag_updates_failed, 2);
    assert_eq!(jira.submitted.borrow().len(), 2);
}

#[test]
fn fetch_failure_aborts_the_run() {
    let toggl = FakeToggl {
        fail_fetch: true,
        ..FakeToggl::default()
    };
    let jira = FakeJira::default();

    let err = reconciler(acme_only(), RunMode::Apply)
        .run(&toggl, &jira, &mut Vec::new(), now())
        .unwrap_err();

    assert!(matches!(err, ReconcileError::Fetch(_)));
    assert_eq!(err.to_string(), "failed to fetch time entries: toggl is down");
}

#[test]
fn fetch_window_follows_period_override() {
    let toggl = FakeToggl::default();
    let jira = FakeJira::default();
    let overrides = RuntimeOverrides {
        period_days: Some(7),
        ..RuntimeOverrides::default()
    };

    Reconciler::new(acme_only(), overrides, RunMode::Preview)
        .unwrap()
        .run(&toggl, &jira, &mut Vec::new(), now())
        .unwrap();

    assert_eq!(
        toggl.fetched_window.get(),
        Some((now() - Duration::days(7), now()))
    );
}

#[test]
fn rounding_override_applies_to_submissions() {
    let toggl = acme_toggl().with_entry(entry(1, "WEB-1", Some(10), &[]));
    let jira = FakeJira::default();
    let overrides = RuntimeOverrides {
        rounding_minutes: Some(60),
        ..RuntimeOverrides::default()
    };

    Reconciler::new(acme_only(), overrides, RunMode::Apply)
        .unwrap()
        .run(&toggl, &jira, &mut Vec::new(), now())
        .unwrap();

    assert_eq!(jira.submitted.borrow()[0].1.time_spent_seconds, 3600);
}

#[test]
fn invalid_rounding_override_is_rejected_before_running() {
    let overrides = RuntimeOverrides {
        rounding_minutes: Some(0),
        ..RuntimeOverrides::default()
    };
    assert!(Reconciler::new(acme_only(), overrides, RunMode::Apply).is_err());
}

#[test]
fn period_override_beyond_date_range_is_rejected_before_running() {
    let toggl = FakeToggl::default();
    let overrides = RuntimeOverrides {
        period_days: Some(1_000_000_000),
        ..RuntimeOverrides::default()
    };

    let err = Reconciler::new(acme_only(), overrides, RunMode::Preview).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidPeriod(1_000_000_000)));
    assert_eq!(toggl.fetched_window.get(), None);

    let longest = RuntimeOverrides {
        period_days: Some(i64::from(MAX_PERIOD_DAYS)),
        ..RuntimeOverrides::default()
    };
    Reconciler::new(acme_only(), longest, RunMode::Preview)
        .unwrap()
        .run(&toggl, &FakeJira::default(), &mut Vec::new(), now())
        .unwrap();
    assert_eq!(
        toggl.fetched_window.get(),
        Some((now() - Duration::days(i64::from(MAX_PERIOD_DAYS)), now()))
    );
}
