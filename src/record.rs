//! The canonical on-disk record format: produced once per successful query,
//! re-parsed later by the geographic analysis stage. `parse_records` is the
//! structural inverse of `format_records` for every field defined here;
//! anything outside the fixed label set is dropped on parse.

/// Separator line between person sections in a stored result file.
pub const SECTION_SEPARATOR: &str =
    "--------------------------------------------------";

const LABEL_NAME: &str = "Name";
const LABEL_AGE: &str = "Age";
const LABEL_AKA: &str = "AKA";
const LABEL_PHONES: &str = "Associated Phone Numbers";
const LABEL_EMAILS: &str = "Associated Email Addresses";
const LABEL_CURRENT: &str = "Last Known Address";
const LABEL_PAST: &str = "Past Addresses";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonRecord {
    pub name: Option<String>,
    pub age: Option<String>,
    pub aka: Vec<String>,
    pub phones: Vec<String>,
    pub emails: Vec<String>,
    pub current_address: Option<String>,
    pub past_addresses: Vec<String>,
}

impl PersonRecord {
    fn is_empty(&self) -> bool {
        *self == PersonRecord::default()
    }
}

/// Serialize records to the canonical text form. Absent fields produce no
/// line at all; zero records produce an empty string. Sections are joined by
/// a blank-padded 50-dash separator, with none after the final section.
pub fn format_records(records: &[PersonRecord]) -> String {
    let blocks: Vec<String> = records.iter().map(format_one).collect();
    blocks.join(&format!("\n\n{}\n\n", SECTION_SEPARATOR))
}

fn format_one(record: &PersonRecord) -> String {
    let mut lines = Vec::new();
    if let Some(name) = &record.name {
        lines.push(format!("{}: {}", LABEL_NAME, name));
    }
    if let Some(age) = &record.age {
        lines.push(format!("{}: {}", LABEL_AGE, age));
    }
    if !record.aka.is_empty() {
        lines.push(format!("{}: {}", LABEL_AKA, record.aka.join(", ")));
    }
    if !record.phones.is_empty() {
        lines.push(format!("{}: {}", LABEL_PHONES, record.phones.join(", ")));
    }
    if !record.emails.is_empty() {
        lines.push(format!("{}: {}", LABEL_EMAILS, record.emails.join(", ")));
    }
    if let Some(addr) = &record.current_address {
        lines.push(format!("{}: {}", LABEL_CURRENT, addr));
    }
    if !record.past_addresses.is_empty() {
        lines.push(format!("{}:", LABEL_PAST));
        lines.extend(record.past_addresses.iter().cloned());
    }
    lines.join("\n")
}

/// Parse stored text back into records. Blocks are delimited by the 50-dash
/// separator; within a block each line splits on the first colon. A block
/// missing the Name label is still emitted. Lines without a colon that follow
/// a `Past Addresses:` header are items of that list.
pub fn parse_records(text: &str) -> Vec<PersonRecord> {
    let mut records = Vec::new();
    let mut current = PersonRecord::default();
    // Tracks whether a colon-less line continues the past-address list.
    let mut in_past_addresses = false;

    for raw in text.lines() {
        let line = raw.trim();
        if line.starts_with(SECTION_SEPARATOR) {
            if !current.is_empty() {
                records.push(std::mem::take(&mut current));
            }
            in_past_addresses = false;
            continue;
        }
        if line.is_empty() {
            continue;
        }
        if let Some((label, value)) = line.split_once(':') {
            let label = label.trim();
            let value = value.trim();
            in_past_addresses = false;
            match label {
                LABEL_NAME => current.name = Some(value.to_string()),
                LABEL_AGE => current.age = Some(value.to_string()),
                LABEL_AKA => current.aka = split_list(value),
                LABEL_PHONES => current.phones = split_list(value),
                LABEL_EMAILS => current.emails = split_list(value),
                LABEL_CURRENT => current.current_address = Some(value.to_string()),
                LABEL_PAST => {
                    current.past_addresses = split_list(value);
                    in_past_addresses = true;
                }
                _ => {}
            }
        } else if in_past_addresses {
            current.past_addresses.push(line.to_string());
        }
    }

    if !current.is_empty() {
        records.push(current);
    }
    records
}

/// Split a comma-joined list value with the continuation repair: a fragment
/// that does not start with a digit extends the previous item rather than
/// starting a new one. Without this, addresses like "123 Main St, Apt 4"
/// would be mis-split.
fn split_list(value: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for part in value.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let starts_with_digit = part.chars().next().is_some_and(|c| c.is_ascii_digit());
        if starts_with_digit && !current.is_empty() {
            items.push(current.join(", "));
            current = vec![part];
        } else {
            current.push(part);
        }
    }
    if !current.is_empty() {
        items.push(current.join(", "));
    }
    items
}
