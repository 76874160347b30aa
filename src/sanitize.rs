//! Best-effort PII redaction for task descriptions.
//!
//! Task text is scrubbed before it leaves the device (and again on the
//! backend before it reaches the provider). This is a convenience filter over
//! a short, fixed list of names and places plus email/phone shapes. It is
//! **not** a security boundary and will miss most personal data.
//!
//! Order of passes:
//! 1. lower-case everything
//! 2. location phrases → generic placeholders
//! 3. personal names → `[user]`
//! 4. email addresses → `[email]`
//! 5. phone numbers → `[phone number]`
//! 6. capitalize the first character
//!
//! Placeholders are lower-case and contain no digits, and a rule whose phrase
//! matches a placeholder or a location replacement is dropped when the
//! sanitizer is built. Running the sanitizer twice therefore gives the same
//! result as running it once, whatever names are configured.

use regex::Regex;

pub const NAME_PLACEHOLDER: &str = "[user]";
pub const EMAIL_PLACEHOLDER: &str = "[email]";
pub const PHONE_PLACEHOLDER: &str = "[phone number]";

const DEFAULT_NAMES: &[&str] = &["Akshay", "Singh", "Rahul", "Priya"];

/// Longer phrases come before their suffixes ("nit silchar" before "silchar").
const DEFAULT_LOCATIONS: &[(&str, &str)] = &[
    ("my room", "a personal room"),
    ("my house", "the residence"),
    ("my kitchen", "the kitchen area"),
    ("nit silchar", "the campus"),
    ("silchar", "the local area"),
    ("guwahati", "the destination"),
];

const EMAIL_PATTERN: &str = r"[\w.-]+@[\w.-]+\.\w+";
/// Optional country code, then ten digits with an optional space or dash
/// between any two of them (98765 43210, 9876-543-210, 987-654-3210).
const PHONE_PATTERN: &str = r"(\+?[0-9]{1,3}[- ]?)?[0-9](?:[- ]?[0-9]){9}";

/// Replacement lists used by [`Sanitizer`].
///
/// A location key or name that whole-word-matches a placeholder or any
/// location replacement ("user", "campus") is ignored by [`Sanitizer::new`].
#[derive(Debug, Clone)]
pub struct SanitizerRules {
    /// Ordered `(phrase, placeholder)` pairs, matched as whole words.
    pub locations: Vec<(String, String)>,
    /// Personal names, matched as whole words.
    pub names: Vec<String>,
}

impl Default for SanitizerRules {
    fn default() -> Self {
        Self {
            locations: DEFAULT_LOCATIONS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            names: DEFAULT_NAMES.iter().map(|n| n.to_string()).collect(),
        }
    }
}

impl SanitizerRules {
    /// Default rules plus extra personal names.
    pub fn with_extra_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut rules = Self::default();
        for name in names {
            let name = name.into();
            let trimmed = name.trim();
            if !trimmed.is_empty() && !rules.names.iter().any(|n| n.eq_ignore_ascii_case(trimmed))
            {
                rules.names.push(trimmed.to_string());
            }
        }
        rules
    }
}

/// Compiled sanitizer. Cheap to clone; build once and share.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    locations: Vec<(Regex, String)>,
    /// All names in one alternation, longest first
    names: Option<Regex>,
    email: Regex,
    phone: Regex,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(&SanitizerRules::default())
    }
}

impl Sanitizer {
    pub fn new(rules: &SanitizerRules) -> Self {
        let mut written: Vec<String> = [NAME_PLACEHOLDER, EMAIL_PLACEHOLDER, PHONE_PLACEHOLDER]
            .iter()
            .map(|p| p.to_string())
            .collect();
        written.extend(rules.locations.iter().map(|(_, r)| r.to_lowercase()));

        let locations = rules
            .locations
            .iter()
            .filter_map(|(phrase, replacement)| {
                let re = whole_word(phrase)?;
                (!matches_output(&re, phrase, &written)).then(|| (re, replacement.to_lowercase()))
            })
            .collect();

        let mut names: Vec<&str> = rules
            .names
            .iter()
            .map(|n| n.trim())
            .filter(|n| whole_word(n).is_some_and(|re| !matches_output(&re, n, &written)))
            .collect();
        names.sort_by_key(|n| std::cmp::Reverse(n.chars().count()));

        Self {
            locations,
            names: any_word(&names),
            email: literal_regex(EMAIL_PATTERN),
            phone: literal_regex(PHONE_PATTERN),
        }
    }

    /// Scrub `text`. Never fails; empty input yields empty output.
    pub fn sanitize(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let mut cleaned = text.to_lowercase();

        for (re, placeholder) in &self.locations {
            cleaned = re.replace_all(&cleaned, placeholder.as_str()).into_owned();
        }
        if let Some(re) = &self.names {
            cleaned = re.replace_all(&cleaned, NAME_PLACEHOLDER).into_owned();
        }
        cleaned = self
            .email
            .replace_all(&cleaned, EMAIL_PLACEHOLDER)
            .into_owned();
        cleaned = self
            .phone
            .replace_all(&cleaned, PHONE_PLACEHOLDER)
            .into_owned();

        capitalize_first(&cleaned)
    }
}

/// Sanitize with the default rules.
pub fn sanitize(text: &str) -> String {
    Sanitizer::default().sanitize(text)
}

fn whole_word(phrase: &str) -> Option<Regex> {
    let phrase = phrase.trim();
    if phrase.is_empty() {
        return None;
    }
    match Regex::new(&format!(r"(?i)\b{}\b", regex::escape(phrase))) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!("Skipping sanitizer phrase {:?}: {}", phrase, e);
            None
        }
    }
}

/// One case-insensitive regex matching any of `phrases` as a whole word.
/// Leftmost alternative wins, so callers pass longer phrases first.
fn any_word(phrases: &[&str]) -> Option<Regex> {
    if phrases.is_empty() {
        return None;
    }
    let alternatives: Vec<String> = phrases.iter().map(|p| regex::escape(p)).collect();
    match Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|"))) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!("Skipping name redaction: {}", e);
            None
        }
    }
}

/// Whether `re` matches text the sanitizer itself writes. Such a rule would
/// rewrite its own output on the next pass, so it is dropped.
fn matches_output(re: &Regex, phrase: &str, written: &[String]) -> bool {
    match written.iter().find(|text| re.is_match(text)) {
        Some(text) => {
            tracing::warn!(
                "Ignoring sanitizer phrase {:?}: it matches replacement text {:?}",
                phrase.trim(),
                text
            );
            true
        }
        None => false,
    }
}

// Built-in patterns are constants covered by the tests below.
fn literal_regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in sanitizer pattern must compile")
}

/// Upper-case the first character, but only when that round-trips through
/// `to_lowercase` (so `ß` is left alone and a second pass changes nothing).
fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    let upper: String = first.to_uppercase().collect();
    let round_trips = upper.chars().count() == 1 && upper.to_lowercase() == first.to_string();
    if round_trips {
        let mut out = upper;
        out.push_str(chars.as_str());
        out
    } else {
        text.to_string()
    }
}
