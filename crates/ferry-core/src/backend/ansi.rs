//! Terminal noise filter for interactive CLI output

use once_cell::sync::Lazy;
use regex::Regex;

/// Escape sequences and stray colour fragments, applied in order
static ESCAPE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // truecolor foreground/background
        r"\x1b\[(?:38|48);2;[\d;]+m",
        // OSC, terminated by BEL or ST
        r"\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)",
        // DCS, SOS, PM, APC
        r"\x1b[PX^_][^\x1b]*\x1b\\",
        // CSI
        r"\x1b\[[\x30-\x3f]*[\x20-\x2f]*[\x40-\x7e]",
        // charset selection, keypad modes and other two-byte escapes
        r"\x1b[()#][0-9A-Za-z]",
        r"\x1b[=><78cDEHMNOZ]",
        // colour fragments left behind when a sequence was split across reads
        r";2;\d+;\d+;\d+m",
        r"\b\d+;\d+;\d+m",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

static BLANK_LINES: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"[ \t]*\n\s*\n\s*").ok());

/// Output that is UI chrome rather than an answer
static NOISE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)do you want to connect",
        r"(?i)vs code",
        r"(?i)\[y/n\]",
        r"(?i)loading",
        r"(?i)tips for getting started",
        r"(?i)ask questions",
        r"(?i)no sandbox",
        r"(?i)qwen3-coder",
        r"(?i)context left",
        r"(?i)main\*",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Strip escape sequences, control characters and box drawing from raw output
pub fn clean_output(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let mut cleaned = raw.to_string();
    for pattern in ESCAPE_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }

    cleaned.retain(|c| match c {
        '\n' | '\t' => true,
        '╭' | '╮' | '╯' | '╰' | '─' | '│' | '●' => false,
        c => !c.is_control(),
    });

    if let Some(blank_lines) = BLANK_LINES.as_ref() {
        cleaned = blank_lines.replace_all(&cleaned, "\n").into_owned();
    }

    cleaned.trim().to_string()
}

/// Cleaned output worth showing to the user, or "" when there is none
pub fn extract_content(raw: &str) -> String {
    let cleaned = clean_output(raw);

    if cleaned.chars().count() < 3 {
        return String::new();
    }

    if NOISE_PATTERNS.iter().any(|pattern| pattern.is_match(&cleaned)) {
        return String::new();
    }

    cleaned
}

/// Whether a chunk is the editor-connection prompt the CLI shows on start
pub fn is_connect_prompt(raw: &str) -> bool {
    raw.contains("Do you want to connect") || raw.contains("VS Code")
}
