use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("digit-run pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyToken {
    Text(String),
    /// Digit run with leading zeros stripped; compared by length, then lexically.
    Number(String),
}

impl Ord for KeyToken {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyToken::Number(a), KeyToken::Number(b)) => {
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            }
            (KeyToken::Text(a), KeyToken::Text(b)) => a.cmp(b),
            // Mirrors how a digit character sorts before letters.
            (KeyToken::Number(_), KeyToken::Text(_)) => Ordering::Less,
            (KeyToken::Text(_), KeyToken::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for KeyToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Comparable key for a file name: alternating text and number runs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NaturalKey(Vec<KeyToken>);

impl NaturalKey {
    pub fn new(name: &str) -> Self {
        let mut tokens = Vec::new();
        let mut last = 0;
        for run in DIGIT_RUN.find_iter(name) {
            if run.start() > last {
                tokens.push(KeyToken::Text(name[last..run.start()].to_lowercase()));
            }
            let trimmed = run.as_str().trim_start_matches('0');
            let digits = if trimmed.is_empty() { "0" } else { trimmed };
            tokens.push(KeyToken::Number(digits.to_string()));
            last = run.end();
        }
        if last < name.len() {
            tokens.push(KeyToken::Text(name[last..].to_lowercase()));
        }
        NaturalKey(tokens)
    }

    pub fn tokens(&self) -> &[KeyToken] {
        &self.0
    }
}

/// Total order: natural key first, raw string as the tie breaker.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    NaturalKey::new(a)
        .cmp(&NaturalKey::new(b))
        .then_with(|| a.cmp(b))
}

pub fn natural_sort(names: &mut [String]) {
    names.sort_by_cached_key(|name| (NaturalKey::new(name), name.clone()));
}
