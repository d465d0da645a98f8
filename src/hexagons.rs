//! Hexagon cards: one small page per answered question, grouped per person

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::generate::{generated_stamp, write_page, WriteReport};
use crate::types::{Question, ResponseRecord};
use crate::utils::html_escape;

pub const HEXAGON_DIR: &str = "hexagons";

const CARD_COLORS: [&str; 15] = [
    "#e8f4f8", "#fce4ec", "#e8f5e8", "#fff3a0", "#f3e5f5", "#ffebb3", "#e6e6e6", "#f0f8ff",
    "#e0f2f1", "#f5e6d3", "#f0e6ff", "#ffe4e6", "#d4f4dd", "#ffe0cc", "#e6f3ff",
];

fn card_color(question: &Question) -> &'static str {
    CARD_COLORS[(question.slot - 1) % CARD_COLORS.len()]
}

/// Hexagon size class, picked from the answer length
fn size_class(answer: &str) -> &'static str {
    match answer.chars().count() {
        0..=30 => "short-text",
        31..=80 => "medium-text",
        81..=150 => "long-text",
        _ => "very-long-text",
    }
}

/// Folder for one person; the row number keeps namesakes apart
pub fn person_dir_name(record: &ResponseRecord) -> String {
    format!("{:02}_{}", record.index, record.safe_name())
}

fn card_filename(question: &Question) -> String {
    format!("{}.html", question.slot)
}

fn hexagon_styles() -> &'static str {
    r#"
@import url('https://fonts.googleapis.com/css2?family=Kalam:wght@400;700&display=swap');
* { box-sizing: border-box; }
body {
    margin: 0;
    min-height: 100vh;
    display: flex;
    flex-direction: column;
    align-items: center;
    justify-content: center;
    gap: 16px;
    font-family: "Kalam", cursive;
    background: #faf7f2;
    color: #2d2346;
}
.hexagon {
    width: 350px;
    height: 304px;
    clip-path: polygon(25% 0%, 75% 0%, 100% 50%, 75% 100%, 25% 100%, 0% 50%);
    display: flex;
    flex-direction: column;
    align-items: center;
    justify-content: center;
    padding: 24px 56px;
    text-align: center;
}
.hexagon.short-text { width: 280px; height: 243px; }
.hexagon.medium-text { width: 350px; height: 304px; }
.hexagon.long-text { width: 420px; height: 365px; }
.hexagon.very-long-text { width: 500px; height: 433px; }
.emoji { font-size: 2.4rem; margin-bottom: 8px; }
.text-section {
    font-size: 1.1rem;
    line-height: 1.3;
    overflow-wrap: break-word;
}
.caption { font-family: sans-serif; font-size: 0.85rem; opacity: 0.7; }
a { color: inherit; }
ul { list-style: none; padding: 0; font-family: sans-serif; }
li { margin: 8px 0; }
@media (max-width: 768px) {
    .hexagon, .hexagon.medium-text { width: 300px; height: 260px; }
    .hexagon.short-text { width: 250px; height: 217px; }
    .hexagon.long-text { width: 350px; height: 304px; }
    .hexagon.very-long-text { width: 400px; height: 347px; }
    .text-section { font-size: 1rem; }
}
"#
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{}</title>
    <style>{}</style>
</head>
<body>
{}</body>
</html>
"#,
        html_escape(title),
        hexagon_styles(),
        body
    )
}

/// A single answer on a coloured hexagon
pub fn render_card(record: &ResponseRecord, question: &Question, answer: &str) -> String {
    let body = format!(
        r#"    <div class="hexagon {}" style="background-color: {};" data-slot="{}">
        <div class="emoji">{}</div>
        <div class="text-section">{}</div>
    </div>
    <p class="caption">{} | <a href="index.html">{}</a></p>
"#,
        size_class(answer),
        card_color(question),
        question.slot,
        question.emoji,
        html_escape(answer),
        html_escape(question.text),
        html_escape(&record.name)
    );
    page(&format!("{} - {}", record.name, question.slot), &body)
}

/// Links to every card one person has
fn render_person_index(record: &ResponseRecord) -> String {
    let mut body = format!("    <h1>{}</h1>\n    <ul>\n", html_escape(&record.name));
    for (question, _) in record.answered() {
        body.push_str(&format!(
            "        <li><a href=\"{}\">{} {}</a></li>\n",
            card_filename(question),
            question.emoji,
            html_escape(question.text)
        ));
    }
    body.push_str("    </ul>\n    <p class=\"caption\"><a href=\"../index.html\">All people</a></p>\n");
    page(&record.name, &body)
}

/// Top-level list of people with at least one card
pub fn render_hexagon_index(config: &Config, records: &[ResponseRecord]) -> String {
    let mut body = format!(
        "    <h1>{} Hexagons</h1>\n    <ul>\n",
        html_escape(&config.title)
    );
    for record in records.iter().filter(|r| r.answered().next().is_some()) {
        body.push_str(&format!(
            "        <li><a href=\"{}/index.html\">{}</a> ({} cards)</li>\n",
            html_escape(&person_dir_name(record)),
            html_escape(&record.name),
            record.answered().count()
        ));
    }
    body.push_str(&format!(
        "    </ul>\n    <p class=\"caption\">Generated on {}</p>\n",
        html_escape(&generated_stamp(records))
    ));
    page(&format!("{} Hexagons", config.title), &body)
}

/// Delete `<slot>.html` cards whose answer is gone
fn remove_stale_cards(dir: &Path, record: &ResponseRecord) -> Result<()> {
    let keep: Vec<String> = record.answered().map(|(q, _)| card_filename(q)).collect();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let is_card = name
            .strip_suffix(".html")
            .is_some_and(|stem| !stem.is_empty() && stem.bytes().all(|b| b.is_ascii_digit()));
        if is_card && !keep.iter().any(|k| k == name) {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
    }
    Ok(())
}

/// Write `hexagons/NN_Name/<slot>.html` for every answered question, plus indexes
pub fn generate_hexagons(
    config: &Config,
    records: &[ResponseRecord],
    quiet: bool,
) -> Result<WriteReport> {
    let root = config.output_dir.join(HEXAGON_DIR);
    let mut report = WriteReport::default();

    for record in records.iter().filter(|r| r.answered().next().is_some()) {
        let dir = root.join(person_dir_name(record));
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        for (question, answer) in record.answered() {
            let path = dir.join(card_filename(question));
            let changed = write_page(&path, &render_card(record, question, answer))?;
            report.record(path, changed);
        }
        let path = dir.join("index.html");
        let changed = write_page(&path, &render_person_index(record))?;
        report.record(path, changed);
        remove_stale_cards(&dir, record)?;

        if !quiet {
            println!("{}: {} cards", record.name, record.answered().count());
        }
    }

    fs::create_dir_all(&root)?;
    let path = root.join("index.html");
    let changed = write_page(&path, &render_hexagon_index(config, records))?;
    report.record(path, changed);
    Ok(report)
}

/// `hexagons` command
pub fn run_hexagons(config: &Config, quiet: bool) -> Result<WriteReport> {
    let records = crate::responses::load_responses(config)?;
    println!("Generating hexagon cards in {}/{}/", config.output_dir.display(), HEXAGON_DIR);
    let report = generate_hexagons(config, &records, quiet)?;
    report.print("Hexagon cards", quiet);
    Ok(report)
}
