//! Repairs for spaces the extraction engine inserts inside emails, URLs and
//! domain names, plus the punctuation spacing rules shared by the normalizer.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Top-level domains a repair may end in. Longer alternatives first.
const TLDS: &str = "info|biz|com|net|org|edu|gov|mil|int|nz|au|uk|us|ca|de|fr|jp|cn|io|co|me";

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)[A-Za-z0-9._%+-]+[ \t]*@[ \t]*(?:[A-Za-z0-9-]+[ \t]*\.[ \t]*)+(?:{TLDS})\b"
    ))
    .unwrap()
});

static WWW_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\bwww[ \t]*\.[ \t]*(?:[A-Za-z0-9-]+[ \t]*\.[ \t]*)+(?:{TLDS})\b"
    ))
    .unwrap()
});

static SCHEME_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\bhttps?[ \t]*:[ \t]*/[ \t]*/[ \t]*(?:[A-Za-z0-9-]+[ \t]*\.[ \t]*)+(?:{TLDS})\b"
    ))
    .unwrap()
});

// A gap counts as mangled only if whitespace precedes the dot; "us. me" is
// an ordinary sentence break and must survive.
static THREE_PART_DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b[A-Za-z0-9-]+(?:[ \t]+\.[ \t]*|\.)[A-Za-z0-9-]+(?:[ \t]+\.[ \t]*|\.)(?:{TLDS})\b"
    ))
    .unwrap()
});

static TWO_PART_DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b[A-Za-z0-9-]+[ \t]+\.[ \t]*(?:{TLDS})\b")).unwrap()
});

// Capitals and dots before the period are left alone so "U.S.A" survives.
static PERIOD_BEFORE_CAPITAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^\s.A-Z])\.([A-Z][A-Za-z]*)").unwrap());

static WRAP_GAP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([a-z]) {2,}([A-Z])").unwrap());

static SPACE_BEFORE_COMMA_PERIOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+([,.])").unwrap());

static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+([,.!?;:])").unwrap());

static SPACES_AFTER_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([,.!?;:]) {2,}").unwrap());

static MISSING_SPACE_AFTER_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([,;!?:])([A-Za-z])").unwrap());

static EXCESS_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{4,}").unwrap());

static SPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());

fn strip_inner_whitespace(caps: &Captures<'_>) -> String {
    caps[0].chars().filter(|c| *c != ' ' && *c != '\t').collect()
}

/// Closes spaces inside emails, `www.`/`http(s)://` hosts and bare domains
/// whose suffix is an allow-listed top-level domain.
pub fn fix_urls_and_emails(text: &str) -> String {
    let text = EMAIL.replace_all(text, strip_inner_whitespace);
    let text = SCHEME_URL.replace_all(&text, strip_inner_whitespace);
    let text = WWW_URL.replace_all(&text, strip_inner_whitespace);
    let text = THREE_PART_DOMAIN.replace_all(&text, strip_inner_whitespace);
    let text = TWO_PART_DOMAIN.replace_all(&text, strip_inner_whitespace);
    text.into_owned()
}

fn is_tld(word: &str) -> bool {
    TLDS.split('|').any(|tld| tld.eq_ignore_ascii_case(word))
}

/// Inserts the missing space in "end.Next". A capitalized word that is an
/// allow-listed suffix ("Example.Com") is taken for a domain and kept.
fn space_after_sentence_period(text: &str) -> String {
    PERIOD_BEFORE_CAPITAL
        .replace_all(text, |caps: &Captures<'_>| {
            if is_tld(&caps[2]) {
                caps[0].to_string()
            } else {
                format!("{}. {}", &caps[1], &caps[2])
            }
        })
        .into_owned()
}

/// Sentence and line-level spacing rules applied before line joining.
pub fn normalize_spacing(text: &str) -> String {
    let text = text.replace('\r', "").replace('\t', " ");
    let text = SPACE_BEFORE_COMMA_PERIOD.replace_all(&text, "$1");
    let text = space_after_sentence_period(&text);
    let text = WRAP_GAP.replace_all(&text, "$1 $2");
    let text = SPACES_AFTER_PUNCT.replace_all(&text, "$1 ");
    let text = MISSING_SPACE_AFTER_PUNCT.replace_all(&text, "$1 $2");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n\n");
    text.into_owned()
}

/// Final pass over the paragraph-joined text.
pub fn final_cleanup(text: &str) -> String {
    let text = fix_urls_and_emails(text);
    let text = SPACE_BEFORE_PUNCT.replace_all(&text, "$1");
    let text = space_after_sentence_period(&text);
    let text = MISSING_SPACE_AFTER_PUNCT.replace_all(&text, "$1 $2");
    let text = SPACE_RUNS.replace_all(&text, " ");
    text.trim().to_string()
}
