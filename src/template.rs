//! Slam page template: parsing, validation and rendering
//!
//! A template is a plain HTML document with `{{placeholder}}` tokens and two
//! nested repeatable regions:
//!
//! ```text
//! <!-- slam:person -->     ... {{name}} {{photo}} {{number}} {{page}} ...
//!   <!-- slam:question --> ... {{emoji}} {{question}} {{answer}} {{card}} {{slot}} ...
//!   <!-- /slam:question -->
//! <!-- /slam:person -->
//! ```
//!
//! Outside the person region the page-level placeholders are `{{title}}`,
//! `{{generated}}` and `{{footer}}`. Unknown placeholders are left untouched.

use anyhow::{Context, Result};
use scraper::{ElementRef, Html};
use std::fs;
use std::path::Path;

use crate::error::TemplateError;
use crate::types::{Question, ResponseRecord};
use crate::utils::html_escape;

const BUILTIN_TEMPLATE: &str = include_str!("../template.html");

/// Split `src` around `<!-- slam:NAME -->` ... `<!-- /slam:NAME -->`
fn split_region<'a>(
    src: &'a str,
    name: &'static str,
) -> Result<(&'a str, &'a str, &'a str), TemplateError> {
    let open = format!("<!-- slam:{} -->", name);
    let close = format!("<!-- /slam:{} -->", name);

    let start = src.find(&open).ok_or(TemplateError::MissingRegion(name))?;
    let body_start = start + open.len();
    if src[body_start..].contains(&open) {
        return Err(TemplateError::DuplicateRegion(name));
    }

    let end = body_start
        + src[body_start..]
            .find(&close)
            .ok_or(TemplateError::UnclosedRegion(name))?;
    let tail_start = end + close.len();
    if src[..start].contains(&close) || src[tail_start..].contains(&close) {
        return Err(TemplateError::DuplicateRegion(name));
    }

    Ok((&src[..start], &src[body_start..end], &src[tail_start..]))
}

/// Replace `{{key}}` tokens in one pass, so substituted values are never re-scanned
fn fill(segment: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let key = &after[..end];
        match vars.iter().find(|(k, _)| *k == key) {
            Some((_, value)) => out.push_str(value),
            None => {
                out.push_str("{{");
                out.push_str(key);
                out.push_str("}}");
            }
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

fn require(haystack: &str, placeholder: &'static str) -> Result<(), TemplateError> {
    if haystack.contains(&format!("{{{{{}}}}}", placeholder)) {
        Ok(())
    } else {
        Err(TemplateError::MissingPlaceholder(placeholder))
    }
}

fn has_photo_slot(src: &str) -> bool {
    let document = Html::parse_document(src);
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .any(|el| el.value().name() == "img" && el.value().attr("src") == Some("{{photo}}"))
}

/// Page-level values shared by every page rendered from the template
#[derive(Debug, Clone)]
pub struct PageContext<'a> {
    pub title: &'a str,
    pub generated: &'a str,
    pub footer: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    head: String,
    person_head: String,
    question: String,
    person_tail: String,
    tail: String,
}

impl Template {
    pub fn parse(src: &str) -> Result<Self, TemplateError> {
        let (head, person, tail) = split_region(src, "person")?;
        let (person_head, question, person_tail) = split_region(person, "question")?;

        let person_outer = format!("{}{}", person_head, person_tail);
        require(&person_outer, "name")?;
        require(&person_outer, "photo")?;
        require(question, "answer")?;
        require(&format!("{}{}", head, tail), "generated")?;

        if !has_photo_slot(src) {
            return Err(TemplateError::MissingPhotoSlot);
        }

        Ok(Self {
            head: head.to_string(),
            person_head: person_head.to_string(),
            question: question.to_string(),
            person_tail: person_tail.to_string(),
            tail: tail.to_string(),
        })
    }

    /// The template shipped with the binary
    pub fn builtin() -> Result<Self, TemplateError> {
        Self::parse(BUILTIN_TEMPLATE)
    }

    /// Load the template at `path`, or the built-in one when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            println!(
                "Template {} not found, using the built-in template",
                path.display()
            );
            return Ok(Self::builtin()?);
        }
        let src = fs::read_to_string(path)
            .with_context(|| format!("Failed to read template: {}", path.display()))?;
        Self::parse(&src).with_context(|| format!("Invalid template: {}", path.display()))
    }

    fn render_question(&self, question: &Question, answer: &str) -> String {
        let slot = question.slot.to_string();
        let text = html_escape(question.text);
        let answer = html_escape(answer);
        fill(
            &self.question,
            &[
                ("slot", slot.as_str()),
                ("emoji", question.emoji),
                ("question", text.as_str()),
                ("answer", answer.as_str()),
                ("card", question.card_class()),
            ],
        )
    }

    /// One person's block: header plus a card for every answered question
    pub fn render_person(&self, record: &ResponseRecord, photo_src: &str) -> String {
        let name = html_escape(&record.name);
        let photo = html_escape(photo_src);
        let number = format!("{:02}", record.index);
        let page = html_escape(&record.page_filename());
        let vars = [
            ("name", name.as_str()),
            ("photo", photo.as_str()),
            ("number", number.as_str()),
            ("page", page.as_str()),
        ];

        let mut html = fill(&self.person_head, &vars);
        for (question, answer) in record.answered() {
            html.push_str(&self.render_question(question, answer));
        }
        html.push_str(&fill(&self.person_tail, &vars));
        html
    }

    /// Wrap already-rendered person blocks (and any extra body HTML) in the page shell
    pub fn render_page(&self, page: &PageContext, body: &[String]) -> String {
        let title = html_escape(page.title);
        let generated = html_escape(page.generated);
        let footer = html_escape(page.footer);
        let vars = [
            ("title", title.as_str()),
            ("generated", generated.as_str()),
            ("footer", footer.as_str()),
        ];

        let mut html = fill(&self.head, &vars);
        for block in body {
            html.push_str(block);
        }
        html.push_str(&fill(&self.tail, &vars));
        html
    }
}
