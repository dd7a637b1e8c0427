//! HTML side of the record pipeline: pull person sections out of a raw
//! results page and reduce them to `PersonRecord`s in the fixed field order.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::record::{format_records, PersonRecord};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\w.-]+@[\w.-]+").unwrap());

static PERSON_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.person").unwrap());
static NAME_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2 a").unwrap());
static H3_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3").unwrap());
static AKA_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#container-alt-names li").unwrap());
static LI_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("li").unwrap());
static A_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

const HEADING_PHONES: &str = "Associated Phone Numbers";
const HEADING_EMAILS: &str = "Associated Email Addresses";
const HEADING_CURRENT: &str = "Last Known Address";
const HEADING_PAST: &str = "Past Addresses";

const SECTION_HEADINGS: &[&str] =
    &[HEADING_PHONES, HEADING_EMAILS, HEADING_CURRENT, HEADING_PAST];

/// Transform a raw results page into the canonical serialized text.
/// A page with zero person sections yields an empty string, which the caller
/// must treat as non-persistable.
pub fn extract(raw_html: &str) -> String {
    format_records(&extract_records(raw_html))
}

pub fn extract_records(raw_html: &str) -> Vec<PersonRecord> {
    let doc = Html::parse_document(raw_html);
    doc.select(&PERSON_SEL).map(extract_person).collect()
}

fn extract_person(person: ElementRef<'_>) -> PersonRecord {
    let name = person
        .select(&NAME_SEL)
        .next()
        .map(|a| normalize_ws(&text_of(a)))
        .filter(|s| !s.is_empty());

    // The age heading is the one h3 that isn't a section title.
    let age = person
        .select(&H3_SEL)
        .map(|h| normalize_ws(&text_of(h)))
        .find(|t| !t.is_empty() && !SECTION_HEADINGS.contains(&t.as_str()))
        .map(|t| t.strip_prefix("Age:").map(|s| s.trim().to_string()).unwrap_or(t));

    let aka: Vec<String> = person
        .select(&AKA_SEL)
        .map(|li| normalize_ws(&text_of(li)))
        .filter(|s| !s.is_empty())
        .collect();

    let phones = heading_list(person, HEADING_PHONES)
        .map(|ul| {
            ul.select(&A_SEL)
                .map(|a| normalize_ws(&text_of(a)))
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    // Email items may be masking artifacts; keep only the local@domain token.
    let emails = heading_list(person, HEADING_EMAILS)
        .map(|ul| {
            ul.select(&LI_SEL)
                .filter_map(|li| {
                    let text = text_of(li);
                    if !text.contains('@') {
                        return None;
                    }
                    EMAIL_RE.find(&text).map(|m| m.as_str().to_string())
                })
                .collect()
        })
        .unwrap_or_default();

    let current_address = following_element(person, HEADING_CURRENT, "p")
        .map(|p| normalize_ws(&text_of(p)))
        .filter(|s| !s.is_empty());

    let past_addresses = heading_list(person, HEADING_PAST)
        .map(|ul| {
            ul.select(&LI_SEL)
                .map(|li| normalize_ws(&text_of(li)))
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    PersonRecord {
        name,
        age,
        aka,
        phones,
        emails,
        current_address,
        past_addresses,
    }
}

/// The `ul` following the h3 whose text equals `heading`.
fn heading_list<'a>(person: ElementRef<'a>, heading: &str) -> Option<ElementRef<'a>> {
    following_element(person, heading, "ul")
}

/// First `tag` element appearing after the named h3, in document order
/// within the person section.
fn following_element<'a>(
    person: ElementRef<'a>,
    heading: &str,
    tag: &str,
) -> Option<ElementRef<'a>> {
    let h3 = person
        .select(&H3_SEL)
        .find(|h| normalize_ws(&text_of(*h)) == heading)?;

    let mut past_heading = false;
    for node in person.descendants() {
        if node.id() == h3.id() {
            past_heading = true;
            continue;
        }
        if !past_heading {
            continue;
        }
        if let Some(el) = ElementRef::wrap(node) {
            if el.value().name() == tag {
                return Some(el);
            }
        }
    }
    None
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

/// Collapse newlines and repeated spaces into single spaces.
fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
