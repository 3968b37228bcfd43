//! Verification reports.
//!
//! Verification fails closed: a report starts as FAIL and is only promoted to
//! PASS by [`decide_status`] when the index positively shows a non-empty,
//! dated mailbox. Every other outcome, including checks that could not run,
//! is FAIL.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::runner::RunResult;
use crate::FILE_STAMP_FORMAT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pass,
    Fail,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Pass => write!(f, "PASS"),
            Status::Fail => write!(f, "FAIL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub total_message_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coverage {
    pub oldest_message: Option<String>,
    pub newest_message: Option<String>,
}

/// Outcome of one verification run. Only [`build_report`] constructs it.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub account: String,
    pub notmuch: IndexStats,
    pub coverage: Coverage,
    status: Status,
    #[serde(skip)]
    created_at: DateTime<Utc>,
}

impl VerificationReport {
    pub fn status(&self) -> Status {
        self.status
    }

    pub fn passed(&self) -> bool {
        self.status == Status::Pass
    }

    /// Why the report failed, most specific first; `None` on PASS
    pub fn failure_reason(&self) -> Option<&'static str> {
        if self.passed() {
            return None;
        }
        Some(match self.notmuch.total_message_count {
            None => "Could not determine message count (notmuch may not be configured).",
            Some(0) => "No messages found in the index.",
            Some(_) => "Oldest or newest message date is missing.",
        })
    }

    /// Fixed-field text form, one field per line
    pub fn to_text(&self) -> String {
        fn field(value: Option<&str>) -> &str {
            value.unwrap_or("unknown")
        }
        let count = self
            .notmuch
            .total_message_count
            .map(|c| c.to_string());

        [
            format!("Timestamp: {}", self.timestamp),
            format!("Account:   {}", self.account),
            format!("Status:    {}", self.status),
            format!("Messages:  {}", field(count.as_deref())),
            format!("Oldest:    {}", field(self.coverage.oldest_message.as_deref())),
            format!("Newest:    {}", field(self.coverage.newest_message.as_deref())),
        ]
        .join("\n")
            + "\n"
    }
}

/// PASS iff the count query succeeded, produced a positive count, and both
/// boundary dates were found. Evaluated in that order; anything else is FAIL.
pub fn decide_status(
    count_ok: bool,
    message_count: Option<u64>,
    oldest: Option<&str>,
    newest: Option<&str>,
) -> Status {
    let mut status = Status::Fail;

    if !count_ok {
        return status;
    }
    let Some(count) = message_count else {
        return status;
    };
    if count > 0 && oldest.is_some() && newest.is_some() {
        status = Status::Pass;
    }
    status
}

pub fn build_report(
    account: &str,
    count_result: &RunResult,
    message_count: Option<u64>,
    oldest: Option<String>,
    newest: Option<String>,
) -> VerificationReport {
    let created_at = Utc::now();
    let status = decide_status(
        count_result.ok(),
        message_count,
        oldest.as_deref(),
        newest.as_deref(),
    );

    VerificationReport {
        timestamp: created_at.to_rfc3339(),
        account: account.to_string(),
        notmuch: IndexStats {
            total_message_count: message_count,
        },
        coverage: Coverage {
            oldest_message: oldest,
            newest_message: newest,
        },
        status,
        created_at,
    }
}

/// Report files written by [`write_report`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub text: PathBuf,
}

/// Persist the report as `verify-<stamp>.json` and `verify-<stamp>.txt` under
/// `verification_dir/<account>/`, both stamped with the report's creation time.
pub fn write_report(report: &VerificationReport, verification_dir: &Path) -> io::Result<ReportPaths> {
    let dir = verification_dir.join(&report.account);
    fs::create_dir_all(&dir)?;

    let stamp = report.created_at.format(FILE_STAMP_FORMAT).to_string();
    let paths = ReportPaths {
        json: dir.join(format!("verify-{}.json", stamp)),
        text: dir.join(format!("verify-{}.txt", stamp)),
    };

    let json = serde_json::to_string_pretty(report).map_err(io::Error::other)?;
    fs::write(&paths.json, json + "\n")?;
    fs::write(&paths.text, report.to_text())?;
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OLDEST: &str = "2020-01-01T00:00:00+00:00";
    const NEWEST: &str = "2024-12-31T00:00:00+00:00";

    fn count_result(exit_code: i32, stdout: &str) -> RunResult {
        RunResult {
            command: vec!["notmuch".to_string(), "count".to_string()],
            exit_code,
            stdout: stdout.to_string(),
            stderr: String::new(),
            duration_seconds: 0.1,
        }
    }

    fn report(exit_code: i32, count: Option<u64>, oldest: Option<&str>, newest: Option<&str>) -> VerificationReport {
        build_report(
            "test",
            &count_result(exit_code, ""),
            count,
            oldest.map(String::from),
            newest.map(String::from),
        )
    }

    #[test]
    fn test_pass_when_all_checks_ok() {
        let r = report(0, Some(42), Some(OLDEST), Some(NEWEST));
        assert_eq!(r.status(), Status::Pass);
        assert_eq!(r.notmuch.total_message_count, Some(42));
        assert_eq!(r.account, "test");
        assert_eq!(r.failure_reason(), None);
    }

    #[test]
    fn test_fail_when_count_query_failed() {
        // Even with otherwise plausible values the failed query wins
        let r = report(1, Some(42), Some(OLDEST), Some(NEWEST));
        assert_eq!(r.status(), Status::Fail);
    }

    #[test]
    fn test_fail_when_count_is_none() {
        let r = report(0, None, Some(OLDEST), Some(NEWEST));
        assert_eq!(r.status(), Status::Fail);
        assert!(r.failure_reason().unwrap().contains("Could not determine"));
    }

    #[test]
    fn test_fail_when_count_is_zero() {
        let r = report(0, Some(0), Some(OLDEST), Some(NEWEST));
        assert_eq!(r.status(), Status::Fail);
        assert_eq!(r.failure_reason(), Some("No messages found in the index."));
    }

    #[test]
    fn test_fail_when_dates_missing() {
        assert_eq!(report(0, Some(10), None, Some(NEWEST)).status(), Status::Fail);
        assert_eq!(report(0, Some(10), Some(OLDEST), None).status(), Status::Fail);
        assert_eq!(report(0, Some(10), None, None).status(), Status::Fail);
    }

    #[test]
    fn test_decide_status_only_passes_with_full_evidence() {
        let counts = [None, Some(0), Some(1), Some(500)];
        let dates = [None, Some(OLDEST)];
        for count_ok in [false, true] {
            for count in counts {
                for oldest in dates {
                    for newest in dates {
                        let expected = count_ok
                            && count.is_some_and(|c| c > 0)
                            && oldest.is_some()
                            && newest.is_some();
                        let status = decide_status(count_ok, count, oldest, newest);
                        assert_eq!(
                            status == Status::Pass,
                            expected,
                            "{:?} {:?} {:?} {:?}",
                            count_ok,
                            count,
                            oldest,
                            newest
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_json_layout() {
        let r = report(0, Some(100), Some(OLDEST), None);
        let value = serde_json::to_value(&r).unwrap();
        assert_eq!(value["status"], "FAIL");
        assert_eq!(value["notmuch"]["total_message_count"], 100);
        assert_eq!(value["coverage"]["oldest_message"], OLDEST);
        assert!(value["coverage"]["newest_message"].is_null());
        assert!(value.get("created_at").is_none());
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let r = report(0, Some(100), Some(OLDEST), Some(NEWEST));
        let paths = write_report(&r, dir.path()).unwrap();

        assert_eq!(paths.json.parent().unwrap(), dir.path().join("test"));
        assert_eq!(paths.json.extension().unwrap(), "json");
        assert_eq!(paths.text.extension().unwrap(), "txt");
        assert_eq!(paths.json.file_stem(), paths.text.file_stem());

        let data: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&paths.json).unwrap()).unwrap();
        assert_eq!(data["status"], "PASS");
        assert_eq!(data["notmuch"]["total_message_count"], 100);

        let text = fs::read_to_string(&paths.text).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("Timestamp:"));
        assert_eq!(lines[1], "Account:   test");
        assert_eq!(lines[2], "Status:    PASS");
        assert_eq!(lines[3], "Messages:  100");
        assert!(lines[4].ends_with(OLDEST));
        assert!(lines[5].ends_with(NEWEST));
    }
}
