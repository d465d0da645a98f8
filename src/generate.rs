//! Slam pages, the combined slam book and the beehive index

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::photos::{find_source_photo, webp_path};
use crate::template::{PageContext, Template};
use crate::types::ResponseRecord;
use crate::utils::{html_escape, osc8_file_link, write_if_changed};

pub const AGGREGATE_PAGE: &str = "main_slam_book.html";
pub const INDEX_PAGE: &str = "index.html";

const PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="200" viewBox="0 0 200 200"><rect width="200" height="200" fill="#fcd34d"/><text x="100" y="112" font-family="sans-serif" font-size="28" text-anchor="middle" fill="#78350f">Photo</text></svg>"##;

/// Inline placeholder image, so a missing photo never leaves a broken reference
pub fn placeholder_photo() -> String {
    format!("data:image/svg+xml;base64,{}", STANDARD.encode(PLACEHOLDER_SVG))
}

/// Photo reference for a record, relative to the output directory:
/// the WebP file, else a not-yet-converted source file, else the placeholder
pub fn photo_src(output_dir: &Path, record: &ResponseRecord) -> String {
    if webp_path(output_dir, record).is_file() {
        return record.photo_filename();
    }
    find_source_photo(output_dir, &record.photo_stem())
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(placeholder_photo)
}

/// "Generated on" text: the latest response time, so reruns on the same CSV are byte-identical
pub fn generated_stamp(records: &[ResponseRecord]) -> String {
    records
        .iter()
        .filter_map(|r| r.parsed_timestamp())
        .max()
        .map(|ts| ts.format("%B %d, %Y at %I:%M %p").to_string())
        .unwrap_or_else(|| "an unknown date".to_string())
}

/// Files written by one generation step
#[derive(Debug, Default)]
pub struct WriteReport {
    pub written: Vec<PathBuf>,
    pub unchanged: usize,
}

impl WriteReport {
    pub(crate) fn record(&mut self, path: PathBuf, changed: bool) {
        if changed {
            self.written.push(path);
        } else {
            self.unchanged += 1;
        }
    }

    pub fn print(&self, what: &str, quiet: bool) {
        if !quiet {
            for path in &self.written {
                let name = path.file_name().unwrap_or_default().to_string_lossy();
                println!("  Wrote {}", osc8_file_link(path, &name));
            }
        }
        println!(
            "{}: {} written, {} unchanged",
            what,
            self.written.len(),
            self.unchanged
        );
    }
}

pub(crate) fn write_page(path: &Path, html: &str) -> Result<bool> {
    write_if_changed(path, html).with_context(|| format!("Failed to write {}", path.display()))
}

/// Full HTML for one person's page
pub fn render_person_page(
    template: &Template,
    config: &Config,
    record: &ResponseRecord,
    generated: &str,
) -> String {
    let title = format!("{} - {}", config.title, record.name);
    let footer = format!("Page {}", record.index);
    let page = PageContext {
        title: &title,
        generated,
        footer: &footer,
    };
    let block = template.render_person(record, &photo_src(&config.output_dir, record));
    template.render_page(&page, &[block])
}

/// Write `slam_page_NN_Name.html` for every record
pub fn generate_pages(
    config: &Config,
    records: &[ResponseRecord],
    template: &Template,
    quiet: bool,
) -> Result<WriteReport> {
    fs::create_dir_all(&config.output_dir)?;
    let generated = generated_stamp(records);
    let mut report = WriteReport::default();

    for record in records {
        let html = render_person_page(template, config, record, &generated);
        let path = config.page_path(&record.page_filename());
        let changed = write_page(&path, &html)?;
        if !quiet {
            println!(
                "{} ({} questions answered)",
                record.page_filename(),
                record.answered().count()
            );
        }
        report.record(path, changed);
    }

    Ok(report)
}

/// Copy the cover image into the output directory; returns its file name there
pub fn copy_cover(config: &Config) -> Result<Option<String>> {
    let cover = &config.cover_image;
    let Some(name) = cover.file_name() else {
        return Ok(None);
    };
    let dest = config.output_dir.join(name);
    let name = name.to_string_lossy().to_string();

    if !cover.is_file() {
        return Ok(dest.is_file().then_some(name));
    }

    let bytes = fs::read(cover)
        .with_context(|| format!("Failed to read cover image: {}", cover.display()))?;
    if fs::read(&dest).ok().as_deref() != Some(bytes.as_slice()) {
        fs::write(&dest, &bytes)
            .with_context(|| format!("Failed to copy cover image to {}", dest.display()))?;
    }
    Ok(Some(name))
}

fn cover_block(title: &str, cover: &str) -> String {
    format!(
        r#"
      <div class="cover">
        <img src="{}" alt="{} Cover" />
      </div>
"#,
        html_escape(cover),
        html_escape(title)
    )
}

/// The combined slam book: every person's block, in CSV order
pub fn render_aggregate(
    template: &Template,
    config: &Config,
    records: &[ResponseRecord],
    cover: Option<&str>,
) -> String {
    let footer = format!("{} Entries", records.len());
    let generated = generated_stamp(records);
    let page = PageContext {
        title: &config.title,
        generated: &generated,
        footer: &footer,
    };

    let mut body = Vec::with_capacity(records.len() + 1);
    if let Some(cover) = cover {
        body.push(cover_block(&config.title, cover));
    }
    body.extend(
        records
            .iter()
            .map(|r| template.render_person(r, &photo_src(&config.output_dir, r))),
    );
    template.render_page(&page, &body)
}

pub fn generate_aggregate(
    config: &Config,
    records: &[ResponseRecord],
    template: &Template,
) -> Result<WriteReport> {
    fs::create_dir_all(&config.output_dir)?;
    let cover = copy_cover(config)?;
    let html = render_aggregate(template, config, records, cover.as_deref());
    let path = config.page_path(AGGREGATE_PAGE);
    let changed = write_page(&path, &html)?;

    let mut report = WriteReport::default();
    report.record(path, changed);
    Ok(report)
}

fn index_styles() -> &'static str {
    r#"
:root {
    --honey-gold: #ffb300;
    --dark-brown: #4a2e04;
    --bg-color: #fff8e1;
    --hex-size: 150px;
    --hex-gap: 6px;
}
* { box-sizing: border-box; }
body {
    margin: 0;
    padding: 32px 16px;
    font-family: "Inter", system-ui, sans-serif;
    background: var(--bg-color);
    color: var(--dark-brown);
    text-align: center;
}
h1 { font-size: 2.4rem; margin: 0 0 8px; }
.subtitle { margin: 0 0 32px; opacity: 0.8; }
.hive {
    display: flex;
    flex-wrap: wrap;
    justify-content: center;
    max-width: calc((var(--hex-size) + 2 * var(--hex-gap)) * 7);
    margin: 0 auto;
}
.hex {
    position: relative;
    width: var(--hex-size);
    height: calc(var(--hex-size) * 1.1547);
    margin: var(--hex-gap);
    margin-bottom: calc(var(--hex-size) * -0.2);
    clip-path: polygon(50% 0%, 100% 25%, 100% 75%, 50% 100%, 0% 75%, 0% 25%);
    background: var(--honey-gold);
    display: block;
    text-decoration: none;
    transition: transform 0.2s ease;
}
.hex:hover, .hex:focus { transform: scale(1.08); z-index: 2; }
.hex img {
    width: 100%;
    height: 100%;
    object-fit: cover;
}
.hex span {
    position: absolute;
    left: 0;
    right: 0;
    bottom: 22%;
    padding: 2px 6px;
    font-size: 0.8rem;
    font-weight: 700;
    color: #fff;
    background: rgba(74, 46, 4, 0.7);
}
.hex.prominent {
    width: calc(var(--hex-size) * 1.8);
    height: calc(var(--hex-size) * 1.8 * 1.1547);
    margin: 0 auto 24px;
}
.featured { display: flex; justify-content: center; }
footer { margin-top: 64px; font-size: 0.85rem; opacity: 0.7; }
@media (max-width: 640px) {
    :root { --hex-size: 24vw; }
}
"#
}

fn hex_tile(href: &str, image: &str, label: &str, class: &str) -> String {
    format!(
        r#"<a class="{}" href="{}" title="{}"><img src="{}" alt="{}" loading="lazy"><span>{}</span></a>"#,
        class,
        html_escape(href),
        html_escape(label),
        html_escape(image),
        html_escape(label),
        html_escape(label)
    )
}

/// Beehive index: a featured tile for the slam book, then one tile per person
pub fn render_index(config: &Config, records: &[ResponseRecord], cover: Option<&str>) -> String {
    let mut html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{}</title>
    <style>{}</style>
</head>
<body>
    <h1>{}</h1>
    <p class="subtitle">{} entries. Pick a cell to read their page.</p>
"#,
        html_escape(&config.title),
        index_styles(),
        html_escape(&config.title),
        records.len()
    );

    let cover_src = cover.map(str::to_string).unwrap_or_else(placeholder_photo);
    html.push_str(r#"    <div class="featured">"#);
    html.push_str(&hex_tile(AGGREGATE_PAGE, &cover_src, &config.title, "hex prominent"));
    html.push_str("</div>\n");

    html.push_str(r#"    <div class="hive">"#);
    html.push('\n');
    for record in records {
        html.push_str("        ");
        html.push_str(&hex_tile(
            &record.page_filename(),
            &photo_src(&config.output_dir, record),
            &record.name,
            "hex",
        ));
        html.push('\n');
    }
    html.push_str("    </div>\n");

    html.push_str(&format!(
        r#"    <footer>Generated on {}</footer>
</body>
</html>
"#,
        html_escape(&generated_stamp(records))
    ));
    html
}

pub fn generate_index(config: &Config, records: &[ResponseRecord]) -> Result<WriteReport> {
    fs::create_dir_all(&config.output_dir)?;
    let cover = copy_cover(config)?;
    let html = render_index(config, records, cover.as_deref());
    let path = config.page_path(INDEX_PAGE);
    let changed = write_page(&path, &html)?;

    let mut report = WriteReport::default();
    report.record(path, changed);
    Ok(report)
}

/// `pages` command
pub fn run_pages(config: &Config, quiet: bool) -> Result<WriteReport> {
    let records = crate::responses::load_responses(config)?;
    let template = Template::load(&config.template)?;
    println!("Generating {} slam pages...", records.len());
    let report = generate_pages(config, &records, &template, quiet)?;
    report.print("Slam pages", quiet);
    Ok(report)
}

/// `aggregate` command
pub fn run_aggregate(config: &Config, quiet: bool) -> Result<WriteReport> {
    let records = crate::responses::load_responses(config)?;
    let template = Template::load(&config.template)?;
    println!("Generating {}...", AGGREGATE_PAGE);
    let report = generate_aggregate(config, &records, &template)?;
    report.print("Slam book", quiet);
    Ok(report)
}

/// `index` command
pub fn run_index(config: &Config, quiet: bool) -> Result<WriteReport> {
    let records = crate::responses::load_responses(config)?;
    println!("Generating {}...", INDEX_PAGE);
    let report = generate_index(config, &records)?;
    report.print("Index", quiet);
    Ok(report)
}
