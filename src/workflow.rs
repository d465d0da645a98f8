//! `all` command: images, pages, aggregate, index, hexagons, migration, in that order

use anyhow::{anyhow, Result};
use std::fmt;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::drive::PhotoSource;
use crate::generate::{generate_aggregate, generate_index, generate_pages, WriteReport};
use crate::hexagons::generate_hexagons;
use crate::migrate::migrate_dir;
use crate::photos::{print_report, process_all};
use crate::responses::load_responses;
use crate::template::Template;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Importance {
    Critical,
    Optional,
}

#[derive(Debug)]
pub struct StepResult {
    pub name: &'static str,
    pub importance: Importance,
    /// Status line on success, error chain on failure
    pub outcome: Result<String, String>,
    pub duration: Duration,
}

impl StepResult {
    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Degraded,
    Failure,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Degraded => write!(f, "partial success (degraded)"),
            RunStatus::Failure => write!(f, "failure"),
        }
    }
}

impl RunStatus {
    pub fn from_steps(steps: &[StepResult]) -> Self {
        let failed = |importance: Importance| {
            steps
                .iter()
                .any(|s| s.importance == importance && !s.passed())
        };
        if failed(Importance::Critical) {
            RunStatus::Failure
        } else if failed(Importance::Optional) {
            RunStatus::Degraded
        } else {
            RunStatus::Success
        }
    }

    pub fn is_failure(self) -> bool {
        self == RunStatus::Failure
    }
}

struct Runner {
    steps: Vec<StepResult>,
    total: usize,
}

impl Runner {
    fn step<F>(&mut self, name: &'static str, importance: Importance, f: F)
    where
        F: FnOnce() -> Result<String>,
    {
        let label = match importance {
            Importance::Critical => "critical",
            Importance::Optional => "optional",
        };
        println!();
        println!(
            "=== [{}/{}] {} ({}) ===",
            self.steps.len() + 1,
            self.total,
            name,
            label
        );

        let start = Instant::now();
        let outcome = f().map_err(|e| format!("{:#}", e));
        let duration = start.elapsed();

        match (&outcome, importance) {
            (Ok(status), _) => println!("{}: OK in {:.1}s, {}", name, duration.as_secs_f64(), status),
            (Err(e), Importance::Critical) => {
                eprintln!("!!! {} FAILED after {:.1}s: {}", name, duration.as_secs_f64(), e)
            }
            (Err(e), Importance::Optional) => {
                eprintln!("{} failed after {:.1}s: {}", name, duration.as_secs_f64(), e)
            }
        }

        self.steps.push(StepResult {
            name,
            importance,
            outcome,
            duration,
        });
    }
}

fn pages_status(report: &WriteReport) -> String {
    format!("{} written, {} unchanged", report.written.len(), report.unchanged)
}

/// Run the whole pipeline with `source` providing the photos.
///
/// An unreadable or malformed CSV aborts before anything is written; every
/// other failure is recorded against its step and later steps still run.
pub fn run_pipeline(config: &Config, source: &dyn PhotoSource, quiet: bool) -> Result<Vec<StepResult>> {
    let records = load_responses(config)?;
    println!(
        "Loaded {} responses from {}",
        records.len(),
        config.csv.display()
    );
    let template = Template::load(&config.template);
    let template = || template.as_ref().map_err(|e| anyhow!("{:#}", e));

    let mut runner = Runner {
        steps: Vec::new(),
        total: 6,
    };

    runner.step("Images", Importance::Critical, || {
        let report = process_all(&records, source, config, quiet)?;
        print_report(&report);
        if report.is_total_failure() {
            return Err(anyhow!("none of {} photos could be fetched", report.failed.len()));
        }
        Ok(format!(
            "{} photos ready, {} failed, {} without a link",
            report.succeeded(),
            report.failed.len(),
            report.no_link.len()
        ))
    });

    runner.step("Slam pages", Importance::Critical, || {
        let report = generate_pages(config, &records, template()?, quiet)?;
        Ok(pages_status(&report))
    });

    runner.step("Slam book", Importance::Critical, || {
        let report = generate_aggregate(config, &records, template()?)?;
        Ok(pages_status(&report))
    });

    runner.step("Index", Importance::Optional, || {
        let report = generate_index(config, &records)?;
        Ok(pages_status(&report))
    });

    runner.step("Hexagons", Importance::Optional, || {
        let report = generate_hexagons(config, &records, quiet)?;
        Ok(pages_status(&report))
    });

    runner.step("Migration", Importance::Optional, || {
        let report = migrate_dir(&config.output_dir)?;
        Ok(format!(
            "{} files updated ({} references), {} unchanged",
            report.updated.len(),
            report.references(),
            report.unchanged
        ))
    });

    Ok(runner.steps)
}

pub fn print_summary(steps: &[StepResult]) -> RunStatus {
    let status = RunStatus::from_steps(steps);
    let total: Duration = steps.iter().map(|s| s.duration).sum();

    println!();
    println!("=== Summary ===");
    for step in steps {
        let mark = match (&step.outcome, step.importance) {
            (Ok(_), _) => "ok",
            (Err(_), Importance::Critical) => "FAILED",
            (Err(_), Importance::Optional) => "failed",
        };
        println!(
            "  {:<12} {:<7} {:.1}s",
            step.name,
            mark,
            step.duration.as_secs_f64()
        );
    }
    println!("Result: {} in {:.1}s", status, total.as_secs_f64());
    status
}

/// `all` command
pub fn run_all(config: &Config, quiet: bool) -> Result<RunStatus> {
    let client = crate::drive::DriveClient::new(&config.fetch)?;
    let steps = run_pipeline(config, &client, quiet)?;
    Ok(print_summary(&steps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::{placeholder_photo, AGGREGATE_PAGE, INDEX_PAGE};
    use crate::photos::tests::{png_bytes, test_config, FakeDrive};
    use crate::responses::tests::{header, row};
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;

    fn write_csv(config: &Config, rows: &[String]) {
        let mut csv = header();
        for r in rows {
            csv.push('\n');
            csv.push_str(r);
        }
        csv.push('\n');
        fs::write(&config.csv, csv).unwrap();
    }

    /// Every file under `dir`, keyed by its path relative to `dir`
    fn snapshot(dir: &Path) -> BTreeMap<String, Vec<u8>> {
        let mut files = BTreeMap::new();
        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            for entry in fs::read_dir(&current).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    let name = path.strip_prefix(dir).unwrap().to_string_lossy().to_string();
                    files.insert(name, fs::read(&path).unwrap());
                }
            }
        }
        files
    }

    fn step<'a>(steps: &'a [StepResult], name: &str) -> &'a StepResult {
        steps.iter().find(|s| s.name == name).unwrap()
    }

    #[test]
    fn test_pipeline_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        fs::write(&config.cover_image, png_bytes(8, 8)).unwrap();
        write_csv(
            &config,
            &[
                row(
                    "2025/07/07 4:02:26 pm GMT+5:30",
                    "John Doe",
                    &["", "Answer2"],
                    "https://drive.google.com/open?id=XYZ",
                ),
                row(
                    "2025/07/08 9:15:00 am GMT+5:30",
                    "Jane Roe",
                    &["Hello"],
                    "https://drive.google.com/file/d/ABC/view?usp=sharing",
                ),
            ],
        );

        let drive = FakeDrive::new("BROKEN");
        let steps = run_pipeline(&config, &drive, true).unwrap();
        assert_eq!(RunStatus::from_steps(&steps), RunStatus::Success);
        let first = snapshot(&config.output_dir);
        assert_eq!(drive.calls.get(), 2);

        let page = String::from_utf8(first["slam_page_01_John_Doe.html"].clone()).unwrap();
        assert!(page.contains("Answer2"));
        assert!(page.contains(r#"data-slot="2""#));
        assert!(!page.contains(r#"data-slot="1""#));
        assert!(page.contains(r#"src="photo_01_John_Doe.webp""#));
        assert!(page.contains("July 08, 2025 at 09:15 AM"));
        for name in [
            AGGREGATE_PAGE,
            INDEX_PAGE,
            "mainPage.png",
            "photo_02_Jane_Roe.webp",
            "hexagons/index.html",
            "hexagons/01_John_Doe/2.html",
        ] {
            assert!(first.contains_key(name), "{} missing", name);
        }

        let steps = run_pipeline(&config, &drive, true).unwrap();
        assert_eq!(RunStatus::from_steps(&steps), RunStatus::Success);
        assert_eq!(drive.calls.get(), 2);
        assert_eq!(snapshot(&config.output_dir), first);
    }

    #[test]
    fn test_one_failing_photo_still_yields_every_page() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write_csv(
            &config,
            &[
                row("t", "Ann", &["a"], "https://drive.google.com/open?id=A1"),
                row("t", "Bob", &["b"], "https://drive.google.com/open?id=BROKEN"),
                row("t", "Cy", &["c"], "https://drive.google.com/uc?id=C3&export=download"),
            ],
        );

        let steps = run_pipeline(&config, &FakeDrive::new("BROKEN"), true).unwrap();
        assert_eq!(RunStatus::from_steps(&steps), RunStatus::Success);

        let out = &config.output_dir;
        for page in ["slam_page_01_Ann.html", "slam_page_02_Bob.html", "slam_page_03_Cy.html"] {
            assert!(out.join(page).is_file(), "{} missing", page);
        }
        let bob = fs::read_to_string(out.join("slam_page_02_Bob.html")).unwrap();
        assert!(bob.contains(&placeholder_photo()));
        assert!(!out.join("photo_02_Bob.webp").exists());
    }

    #[test]
    fn test_all_photos_failing_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write_csv(
            &config,
            &[row("t", "Bob", &["b"], "https://drive.google.com/open?id=BROKEN")],
        );

        let steps = run_pipeline(&config, &FakeDrive::new("BROKEN"), true).unwrap();
        assert!(!step(&steps, "Images").passed());
        assert!(step(&steps, "Slam pages").passed());
        assert_eq!(RunStatus::from_steps(&steps), RunStatus::Failure);
    }

    #[test]
    fn test_bad_template_fails_critical_steps_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        fs::write(&config.template, "<html>{{generated}}</html>").unwrap();
        write_csv(&config, &[row("t", "Ann", &["a"], "")]);

        let steps = run_pipeline(&config, &FakeDrive::new("BROKEN"), true).unwrap();
        assert!(step(&steps, "Images").passed());
        assert!(!step(&steps, "Slam pages").passed());
        assert!(!step(&steps, "Slam book").passed());
        assert!(step(&steps, "Index").passed());
        assert!(step(&steps, "Hexagons").passed());
        assert_eq!(RunStatus::from_steps(&steps), RunStatus::Failure);
    }

    #[test]
    fn test_malformed_csv_aborts_before_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        fs::write(&config.csv, "Timestamp,Full Name\n").unwrap();

        assert!(run_pipeline(&config, &FakeDrive::new("BROKEN"), true).is_err());
        assert!(!config.output_dir.exists());
    }

    #[test]
    fn test_status_classification() {
        let result = |importance, ok: bool| StepResult {
            name: "x",
            importance,
            outcome: if ok { Ok(String::new()) } else { Err("boom".to_string()) },
            duration: Duration::ZERO,
        };
        let degraded = [result(Importance::Critical, true), result(Importance::Optional, false)];
        assert_eq!(RunStatus::from_steps(&degraded), RunStatus::Degraded);
        assert_eq!(RunStatus::Degraded.to_string(), "partial success (degraded)");
        let failed = [result(Importance::Critical, false), result(Importance::Optional, true)];
        assert_eq!(RunStatus::from_steps(&failed), RunStatus::Failure);
        assert_eq!(RunStatus::from_steps(&[]), RunStatus::Success);
    }
}
