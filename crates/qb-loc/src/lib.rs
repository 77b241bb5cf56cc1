// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Localization extractor: parses CK3 `<name>_l_<language>.yml`
//! files into [`LocalizationEntry`] rows. Malformed lines are recorded as
//! diagnostics and skipped — this step never fails the item.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

use std::sync::LazyLock;

use qb_core::id::{ContentVersionId, FileId, LocId};
use qb_core::model::LocalizationEntry;
use qb_core::Diagnostic;
use regex::Regex;

/// `l_english:`
#[allow(clippy::expect_used)]
static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^l_([A-Za-z_]+):\s*$").expect("constant header pattern is valid"));

/// `  my_key:1 "Hello $PLAYER$!" # comment`
#[allow(clippy::expect_used)]
static ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*([^\s:"]+)(?::(\d+))?\s+"([^"]*)"\s*(?:#.*)?$"#).expect("constant entry pattern is valid")
});

#[allow(clippy::expect_used)]
static BRACKET_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[^\]]*\]").expect("constant bracket pattern is valid"));
#[allow(clippy::expect_used)]
static VARIABLE_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$[^$]*\$").expect("constant variable pattern is valid"));
/// CK3 format codes open with `#<tag> ` and close with the two-character
/// `#!`, not a bare `#` (so `#bold text#!` survives a stray `#` inside a
/// nested variable token).
#[allow(clippy::expect_used)]
static FORMAT_CODE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#[^#]*#!").expect("constant format code pattern is valid"));

/// Strip `[…]`, `$…$`, and `#…#` tokens from a raw localization value.
pub fn plain_text(raw_value: &str) -> String {
    let stripped = BRACKET_TOKEN.replace_all(raw_value, "");
    let stripped = VARIABLE_TOKEN.replace_all(&stripped, "");
    FORMAT_CODE_TOKEN.replace_all(&stripped, "").into_owned()
}

fn is_blank_or_comment(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Parse a `.yml` localization file's text into entries and per-line
/// diagnostics. Never fails outright: a missing or malformed header is
/// itself a diagnostic, and entry parsing continues regardless.
pub fn parse(
    text: &str,
    file_id: FileId,
    content_version_id: &ContentVersionId,
) -> (Vec<LocalizationEntry>, Vec<Diagnostic>) {
    let mut entries = Vec::new();
    let mut diagnostics = Vec::new();
    let mut language = String::new();
    let mut found_header = false;

    for (index, line) in text.lines().enumerate() {
        let line_number = (index + 1) as u32;

        if !found_header {
            if is_blank_or_comment(line) {
                continue;
            }
            found_header = true;
            match HEADER.captures(line) {
                Some(caps) => {
                    language = caps[1].to_string();
                    continue;
                }
                None => {
                    diagnostics.push(Diagnostic::new(
                        line_number,
                        1,
                        "expected a language header line (`l_<language>:`) before any entries",
                    ));
                    // Fall through: treat this line as a possible entry too,
                    // rather than discarding it.
                }
            }
        }

        if is_blank_or_comment(line) {
            continue;
        }

        match ENTRY.captures(line) {
            Some(caps) => {
                let loc_key = caps[1].to_string();
                let version: u32 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
                let raw_value = caps[3].to_string();
                let loc_id = LocId::new(format!("{file_id}:{loc_key}:{version}"));
                entries.push(LocalizationEntry {
                    loc_id,
                    file_id,
                    content_version_id: content_version_id.clone(),
                    language: language.clone(),
                    plain_text: plain_text(&raw_value),
                    loc_key,
                    version,
                    raw_value,
                });
            }
            None => {
                diagnostics.push(Diagnostic::new(
                    line_number,
                    1,
                    format!("malformed localization line: {}", line.trim()),
                ));
            }
        }
    }

    (entries, diagnostics)
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
