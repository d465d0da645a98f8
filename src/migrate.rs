//! Repoint JPEG/PNG photo references in generated HTML at their WebP versions

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::types::CONVERTED_EXTENSION;
use crate::utils::{osc8_file_link, write_if_changed};

lazy_static! {
    /// A quoted `photo_NN_...` reference with a source-format extension
    static ref PHOTO_REF: Regex =
        Regex::new(r#"(?i)(["'])([^"'\s<>]*photo_\d{2,}_[^"'\s<>]*?)\.(jpe?g|png)(["'])"#).unwrap();
}

#[derive(Debug, Default)]
pub struct MigrationReport {
    /// (file, references rewritten in it)
    pub updated: Vec<(PathBuf, usize)>,
    pub unchanged: usize,
}

impl MigrationReport {
    pub fn references(&self) -> usize {
        self.updated.iter().map(|(_, n)| n).sum()
    }
}

/// Rewrite references in `html` whose WebP file exists in `output_dir`.
/// Returns the new text and the number of references changed.
pub fn rewrite_references(html: &str, output_dir: &Path) -> (String, usize) {
    let mut count = 0;
    let rewritten = PHOTO_REF.replace_all(html, |caps: &Captures| {
        let (open, target, close) = (&caps[1], &caps[2], &caps[4]);
        let file_stem = target.rsplit('/').next().unwrap_or(target);
        let webp = output_dir.join(format!("{}.{}", file_stem, CONVERTED_EXTENSION));

        if open != close || !webp.is_file() {
            return caps[0].to_string();
        }
        count += 1;
        format!("{}{}.{}{}", open, target, CONVERTED_EXTENSION, close)
    });
    (rewritten.into_owned(), count)
}

fn html_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Failed to read output directory: {}", dir.display()))?
    {
        let path = entry?.path();
        let is_html = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("html"));
        if is_html && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Migrate every `*.html` file in the output directory in place
pub fn migrate_dir(output_dir: &Path) -> Result<MigrationReport> {
    let mut report = MigrationReport::default();

    for path in html_files(output_dir)? {
        let html = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let (rewritten, count) = rewrite_references(&html, output_dir);

        if count > 0 && write_if_changed(&path, &rewritten)? {
            report.updated.push((path, count));
        } else {
            report.unchanged += 1;
        }
    }

    Ok(report)
}

/// `migrate` command
pub fn run_migrate(config: &Config, quiet: bool) -> Result<MigrationReport> {
    println!(
        "Updating photo references in {}/*.html",
        config.output_dir.display()
    );
    let report = migrate_dir(&config.output_dir)?;

    if !quiet {
        for (path, count) in &report.updated {
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            println!("  {}: {} references", osc8_file_link(path, &name), count);
        }
    }
    println!(
        "Migration: {} files updated ({} references), {} unchanged",
        report.updated.len(),
        report.references(),
        report.unchanged
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rewrites_only_when_webp_exists() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path();
        fs::write(out.join("photo_01_Ann.webp"), b"x").unwrap();

        let html = r#"<img src="photo_01_Ann.JPG"><img src='photo_02_Bob.png'><img src="mainPage.png">"#;
        let (rewritten, count) = rewrite_references(html, out);
        assert_eq!(count, 1);
        assert_eq!(
            rewritten,
            r#"<img src="photo_01_Ann.webp"><img src='photo_02_Bob.png'><img src="mainPage.png">"#
        );
    }

    #[test]
    fn test_path_prefix_and_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("photo_12_Cy_Z.webp"), b"x").unwrap();

        let (rewritten, count) =
            rewrite_references(r#"<a href="./photos/photo_12_Cy_Z.jpeg">"#, dir.path());
        assert_eq!(count, 1);
        assert_eq!(rewritten, r#"<a href="./photos/photo_12_Cy_Z.webp">"#);
    }

    #[test]
    fn test_mismatched_quotes_untouched() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("photo_01_Ann.webp"), b"x").unwrap();
        let html = r#"<img src="photo_01_Ann.jpg'>"#;
        assert_eq!(rewrite_references(html, dir.path()), (html.to_string(), 0));
    }

    #[test]
    fn test_second_run_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path();
        fs::write(out.join("photo_01_Ann.webp"), b"x").unwrap();
        fs::write(out.join("a.html"), r#"<img src="photo_01_Ann.jpg">"#).unwrap();
        fs::write(out.join("b.html"), "<p>no photos</p>").unwrap();
        fs::write(out.join("notes.txt"), r#""photo_01_Ann.jpg""#).unwrap();

        let first = migrate_dir(out).unwrap();
        assert_eq!(first.updated.len(), 1);
        assert_eq!(first.references(), 1);
        assert_eq!(first.unchanged, 1);
        let after_first = fs::read(out.join("a.html")).unwrap();
        assert_eq!(after_first, br#"<img src="photo_01_Ann.webp">"#);

        let second = migrate_dir(out).unwrap();
        assert!(second.updated.is_empty());
        assert_eq!(second.unchanged, 2);
        assert_eq!(fs::read(out.join("a.html")).unwrap(), after_first);
        assert_eq!(
            fs::read_to_string(out.join("notes.txt")).unwrap(),
            r#""photo_01_Ann.jpg""#
        );
    }
}
