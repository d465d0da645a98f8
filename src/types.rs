//! Response records, question slots and the filenames derived from them

use chrono::{DateTime, FixedOffset, NaiveDateTime};

/// A fixed question slot on the slam page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Question {
    pub slot: usize,
    pub emoji: &'static str,
    pub text: &'static str,
}

impl Question {
    /// CSS class for the answer card; the palette cycles every 11 slots
    pub fn card_class(&self) -> &'static str {
        const CARD_CLASSES: [&str; 11] = [
            "card-bg-blue",
            "card-bg-green",
            "card-bg-red",
            "card-bg-yellow",
            "card-bg-purple",
            "card-bg-pink",
            "card-bg-indigo",
            "card-bg-teal",
            "card-bg-orange",
            "card-bg-cyan",
            "card-bg-lime",
        ];
        CARD_CLASSES[(self.slot - 1) % CARD_CLASSES.len()]
    }
}

/// The questionnaire, in CSV column order
pub static QUESTIONS: [Question; 15] = [
    Question { slot: 1, emoji: "🔧", text: "If he were a gadget, what would he be?" },
    Question { slot: 2, emoji: "👴", text: "What kind of 40-year-old uncle will he turn into?" },
    Question { slot: 3, emoji: "🔄", text: "What was he in a past life?" },
    Question { slot: 4, emoji: "🏃", text: "His classic excuse to escape a party" },
    Question { slot: 5, emoji: "💬", text: "His signature dialogue" },
    Question { slot: 6, emoji: "⚠️", text: "If he came with a warning label, what would it say?" },
    Question { slot: 7, emoji: "💭", text: "Your fondest memory with him" },
    Question { slot: 8, emoji: "🎂", text: "Your birthday message for him" },
    Question { slot: 9, emoji: "🎵", text: "If his life were a song, what would the title be?" },
    Question { slot: 10, emoji: "🏆", text: "His secret talent" },
    Question { slot: 11, emoji: "📺", text: "Which reality show would he win?" },
    Question { slot: 12, emoji: "😎", text: "Cool or cringe: the one thing he does" },
    Question { slot: 13, emoji: "💎", text: "A quality of his you wish you had" },
    Question { slot: 14, emoji: "📝", text: "Describe him in three words" },
    Question { slot: 15, emoji: "😤", text: "His most annoying (yet lovable) habit" },
];

/// Source formats the converter replaces with WebP
pub const SOURCE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
pub const CONVERTED_EXTENSION: &str = "webp";

/// One respondent, parsed from one CSV row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRecord {
    /// 1-based position among the CSV data rows
    pub index: usize,
    pub timestamp: String,
    pub name: String,
    /// Cleaned answers, one per entry of `QUESTIONS`. `None` means unanswered.
    pub answers: Vec<Option<String>>,
    pub photo_url: String,
}

impl ResponseRecord {
    pub fn safe_name(&self) -> String {
        safe_name(&self.name)
    }

    /// `photo_NN_Name`, without extension
    pub fn photo_stem(&self) -> String {
        format!("photo_{:02}_{}", self.index, self.safe_name())
    }

    pub fn photo_filename(&self) -> String {
        format!("{}.{}", self.photo_stem(), CONVERTED_EXTENSION)
    }

    pub fn page_filename(&self) -> String {
        format!("slam_page_{:02}_{}.html", self.index, self.safe_name())
    }

    /// Answered questions in slot order
    pub fn answered(&self) -> impl Iterator<Item = (&'static Question, &str)> + '_ {
        QUESTIONS
            .iter()
            .zip(self.answers.iter())
            .filter_map(|(q, a)| a.as_deref().map(|a| (q, a)))
    }

    pub fn parsed_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        parse_response_timestamp(&self.timestamp)
    }
}

/// Filename-safe form of a person's name ("Mary-Jane  O'Neil" -> "Mary-Jane_ONeil").
/// Hyphens survive; each whitespace run becomes one `_`.
pub fn safe_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_space = false;
    for c in name.chars() {
        if c.is_whitespace() {
            in_space = true;
        } else if c.is_alphanumeric() || c == '_' || c == '-' {
            if in_space {
                out.push('_');
            }
            in_space = false;
            out.push(c);
        }
    }

    let out = out.trim_matches('_');
    if out.is_empty() {
        "Anonymous".to_string()
    } else {
        out.to_string()
    }
}

/// Clean a free-text answer: trim, strip wrapping quotes, collapse whitespace.
/// Returns None when nothing is left.
pub fn clean_answer(raw: &str) -> Option<String> {
    let text = raw.trim().trim_matches('"');
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Parse a Google Forms timestamp such as "2025/07/07 4:02:26 pm GMT+5:30".
/// Timestamps without a zone are taken as UTC.
pub fn parse_response_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    let (local, zone) = match raw.split_once(" GMT") {
        Some((local, zone)) => (local.trim(), Some(zone.trim())),
        None => (raw, None),
    };

    let naive = NaiveDateTime::parse_from_str(local, "%Y/%m/%d %I:%M:%S %p")
        .or_else(|_| NaiveDateTime::parse_from_str(local, "%Y/%m/%d %H:%M:%S"))
        .ok()?;

    let offset = match zone {
        Some(zone) if !zone.is_empty() => parse_gmt_offset(zone)?,
        _ => FixedOffset::east_opt(0)?,
    };
    naive.and_local_timezone(offset).single()
}

/// "+5:30" / "-3" / "+0100" -> FixedOffset
fn parse_gmt_offset(zone: &str) -> Option<FixedOffset> {
    let (sign, rest) = match zone.chars().next()? {
        '+' => (1, &zone[1..]),
        '-' => (-1, &zone[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None if rest.len() == 4 && rest.bytes().all(|b| b.is_ascii_digit()) => {
            (rest[..2].parse().ok()?, rest[2..].parse().ok()?)
        }
        None => (rest.parse::<i32>().ok()?, 0),
    };
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn record(index: usize, name: &str) -> ResponseRecord {
        ResponseRecord {
            index,
            timestamp: String::new(),
            name: name.to_string(),
            answers: vec![None; QUESTIONS.len()],
            photo_url: String::new(),
        }
    }

    #[test]
    fn test_safe_name() {
        assert_eq!(safe_name("John Doe"), "John_Doe");
        assert_eq!(safe_name("  Mary-Jane   O'Neil "), "Mary-Jane_ONeil");
        assert_eq!(safe_name("Mary-Jane Watson"), "Mary-Jane_Watson");
        assert_eq!(safe_name("a . b"), "a_b");
        assert_eq!(safe_name("Dr. Strange!!"), "Dr_Strange");
        assert_eq!(safe_name("Zoë Åberg"), "Zoë_Åberg");
        assert_eq!(safe_name("???"), "Anonymous");
        assert_eq!(safe_name(""), "Anonymous");
    }

    #[test]
    fn test_filenames() {
        let r = record(1, "John Doe");
        assert_eq!(r.page_filename(), "slam_page_01_John_Doe.html");
        assert_eq!(r.photo_filename(), "photo_01_John_Doe.webp");

        let r = record(112, "A B");
        assert_eq!(r.page_filename(), "slam_page_112_A_B.html");
    }

    #[test]
    fn test_clean_answer() {
        assert_eq!(clean_answer("  \"Hello   world\" "), Some("Hello world".to_string()));
        assert_eq!(clean_answer("line one\nline two"), Some("line one line two".to_string()));
        assert_eq!(clean_answer("   "), None);
        assert_eq!(clean_answer("\"\""), None);
    }

    #[test]
    fn test_card_class_cycles() {
        assert_eq!(QUESTIONS[0].card_class(), "card-bg-blue");
        assert_eq!(QUESTIONS[10].card_class(), "card-bg-lime");
        assert_eq!(QUESTIONS[11].card_class(), "card-bg-blue");
    }

    #[test]
    fn test_answered_skips_empty_slots() {
        let mut r = record(1, "A");
        r.answers[1] = Some("two".to_string());
        r.answers[4] = Some("five".to_string());
        let slots: Vec<usize> = r.answered().map(|(q, _)| q.slot).collect();
        assert_eq!(slots, vec![2, 5]);
    }

    #[test]
    fn test_parse_forms_timestamp() {
        let ts = parse_response_timestamp("2025/07/07 4:02:26 pm GMT+5:30").unwrap();
        assert_eq!(ts.year(), 2025);
        assert_eq!(ts.month(), 7);
        assert_eq!(ts.day(), 7);
        assert_eq!(ts.hour(), 16);
        assert_eq!(ts.minute(), 2);
        assert_eq!(ts.offset().local_minus_utc(), 5 * 3600 + 30 * 60);
    }

    #[test]
    fn test_parse_plain_timestamp() {
        let ts = parse_response_timestamp("2025/07/08 09:15:00").unwrap();
        assert_eq!(ts.hour(), 9);
        assert_eq!(ts.offset().local_minus_utc(), 0);
        assert!(parse_response_timestamp("yesterday").is_none());
        assert!(parse_response_timestamp("").is_none());
    }

    #[test]
    fn test_odd_offsets_do_not_panic() {
        assert!(parse_response_timestamp("2025/07/07 4:02:26 pm GMT+1é1").is_none());
        assert!(parse_response_timestamp("2025/07/07 4:02:26 pm GMT+ab12").is_none());
        let ts = parse_response_timestamp("2025/07/07 4:02:26 pm GMT+0100").unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 3600);
    }
}
