//! Response parsing: free-form model text → [`FieldRecord`].
//!
//! Parsing is best-effort. The model may add a preamble ("以下が抽出結果です"),
//! a closing remark, or blank lines; any line without a separator is skipped.
//! A line with a separator is split on the **first** separator only, so an
//! address that itself contains a colon survives intact.
//!
//! ## Unknown labels
//!
//! What happens to a `label: value` line whose label is not one of the four
//! requested fields is an explicit [`UnknownLabelPolicy`]:
//!
//! | Policy | Behaviour |
//! |--------|-----------|
//! | `Drop` (default) | line ignored |
//! | `Keep` | stored in [`FieldRecord::extra`] (non-empty values only) |
//! | `Reject` | whole response rejected with [`ParseError::UnknownLabel`] |
//!
//! Lines whose value is empty are skipped before the policy applies, so a
//! preamble ending in a colon never trips `Reject`.

use crate::error::ParseError;
use crate::pipeline::postprocess::clean_response;
use crate::record::{fold_width, Field, FieldRecord};
use serde::{Deserialize, Serialize};

/// Characters that separate a label from its value: ASCII and full-width colon.
pub const SEPARATORS: [char; 2] = [':', '：'];

/// Treatment of labels outside the recognised set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnknownLabelPolicy {
    #[default]
    Drop,
    Keep,
    Reject,
}

/// Parser knobs, derived from [`crate::config::ExtractionConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub unknown_labels: UnknownLabelPolicy,
    /// Fold full-width ASCII in values to half-width.
    pub normalize_width: bool,
}

/// Split a line on its first separator, trimming both halves.
///
/// Returns `None` when the line has no separator.
pub fn split_line(line: &str) -> Option<(&str, &str)> {
    let (idx, sep) = line.char_indices().find(|(_, c)| SEPARATORS.contains(c))?;
    let label = line[..idx].trim();
    let value = line[idx + sep.len_utf8()..].trim();
    Some((label, value))
}

/// Parse raw model text into a record without a file name.
///
/// Under `Drop` and `Keep` this never fails: empty or entirely malformed text
/// yields a record whose fields are all absent. An empty value is treated as
/// absent, and when a label repeats the last occurrence wins.
pub fn parse_response(text: &str, options: &ParseOptions) -> Result<FieldRecord, ParseError> {
    let cleaned = clean_response(text);
    let mut record = FieldRecord::default();

    for line in cleaned.lines() {
        let Some((label, value)) = split_line(line) else {
            continue;
        };
        if label.is_empty() {
            continue;
        }

        let value = if options.normalize_width {
            fold_width(value).trim().to_string()
        } else {
            value.to_string()
        };
        // A label with nothing after it carries no field, known or not.
        if value.is_empty() {
            continue;
        }

        match Field::from_label(label) {
            Some(field) => record.set(field, value),
            None => match options.unknown_labels {
                UnknownLabelPolicy::Drop => {}
                UnknownLabelPolicy::Keep => {
                    record.extra.insert(label.to_string(), value);
                }
                UnknownLabelPolicy::Reject => {
                    return Err(ParseError::UnknownLabel {
                        label: label.to_string(),
                    });
                }
            },
        }
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NO_DATA;

    const WELL_FORMED: &str =
        "名前: 山田 太郎\n住所: 東京都千代田区1-1\n電話番号: 記載なし\n免許証番号: 123456789012";

    fn parse(text: &str) -> FieldRecord {
        parse_response(text, &ParseOptions::default()).expect("default policy never fails")
    }

    #[test]
    fn well_formed_response() {
        let record = parse(WELL_FORMED);
        assert_eq!(record.value(Field::Name), "山田 太郎");
        assert_eq!(record.value(Field::Address), "東京都千代田区1-1");
        assert_eq!(record.value(Field::Phone), "記載なし");
        assert_eq!(record.value(Field::LicenseNumber), "123456789012");
        assert!(record.extra.is_empty());
    }

    #[test]
    fn preamble_and_postamble_are_ignored() {
        let text = format!("以下が抽出結果です\n\n{WELL_FORMED}\n\nご確認ください。");
        assert_eq!(parse(&text), parse(WELL_FORMED));
    }

    #[test]
    fn values_are_trimmed() {
        let record = parse("  名前 :   山田 太郎   \n住所:\t東京都  ");
        assert_eq!(record.name.as_deref(), Some("山田 太郎"));
        assert_eq!(record.address.as_deref(), Some("東京都"));
    }

    #[test]
    fn splits_on_first_separator_only() {
        let record = parse("住所: 東京都港区: 芝公園4-2-8\n名前：佐藤 花子：様");
        assert_eq!(record.value(Field::Address), "東京都港区: 芝公園4-2-8");
        assert_eq!(record.value(Field::Name), "佐藤 花子：様");
    }

    #[test]
    fn missing_fields_resolve_to_sentinel() {
        let record = parse("名前: 山田 太郎");
        assert_eq!(record.value(Field::Address), NO_DATA);
        assert_eq!(record.value(Field::Phone), NO_DATA);
        assert_eq!(record.value(Field::LicenseNumber), NO_DATA);
    }

    #[test]
    fn empty_and_garbage_input_yield_empty_record() {
        assert!(parse("").is_empty());
        assert!(parse("読み取れませんでした").is_empty());
        assert!(parse(":\n: value\n\n").is_empty());
    }

    #[test]
    fn empty_value_counts_as_absent() {
        let record = parse("電話番号:\n電話番号:   ");
        assert_eq!(record.phone, None);
    }

    #[test]
    fn last_duplicate_wins() {
        let record = parse("名前: 一郎\n名前: 二郎");
        assert_eq!(record.value(Field::Name), "二郎");
    }

    #[test]
    fn decorated_markdown_response() {
        let text = "```\n- **名前**: 山田 太郎\n- **住所**: 東京都千代田区1-1\n```";
        let record = parse(text);
        assert_eq!(record.value(Field::Name), "山田 太郎");
        assert_eq!(record.value(Field::Address), "東京都千代田区1-1");
    }

    #[test]
    fn unknown_labels_dropped_by_default() {
        let record = parse("名前: 山田 太郎\n生年月日: 昭和60年1月1日");
        assert!(record.extra.is_empty());
        assert_eq!(record.value(Field::Name), "山田 太郎");
    }

    #[test]
    fn unknown_labels_kept_under_keep_policy() {
        let options = ParseOptions {
            unknown_labels: UnknownLabelPolicy::Keep,
            ..Default::default()
        };
        let record =
            parse_response("以下が抽出結果です：\n生年月日: 昭和60年1月1日\n名前: 山田", &options)
                .unwrap();
        assert_eq!(record.extra.len(), 1);
        assert_eq!(record.extra["生年月日"], "昭和60年1月1日");
        assert_eq!(record.value(Field::Name), "山田");
    }

    #[test]
    fn unknown_labels_rejected_under_reject_policy() {
        let options = ParseOptions {
            unknown_labels: UnknownLabelPolicy::Reject,
            ..Default::default()
        };
        let err = parse_response("名前: 山田\n有効期限: 2030年", &options).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownLabel {
                label: "有効期限".into()
            }
        );
        // Lines without a separator are still fine under Reject.
        assert!(parse_response("以下が抽出結果です\n名前: 山田", &options).is_ok());
    }

    #[test]
    fn preamble_ending_in_colon_passes_reject_policy() {
        let options = ParseOptions {
            unknown_labels: UnknownLabelPolicy::Reject,
            ..Default::default()
        };
        let record = parse_response("以下が抽出結果です：\n名前: 山田 太郎", &options).unwrap();
        assert_eq!(record.value(Field::Name), "山田 太郎");

        let record = parse_response("Here is the result:\n名前: 山田 太郎", &options).unwrap();
        assert_eq!(record.value(Field::Name), "山田 太郎");
    }

    #[test]
    fn width_normalisation_is_opt_in() {
        let text = "免許証番号: １２３４５６７８９０１２";
        assert_eq!(parse(text).value(Field::LicenseNumber), "１２３４５６７８９０１２");

        let options = ParseOptions {
            normalize_width: true,
            ..Default::default()
        };
        let record = parse_response(text, &options).unwrap();
        assert_eq!(record.value(Field::LicenseNumber), "123456789012");
    }

    #[test]
    fn split_line_cases() {
        assert_eq!(split_line("a: b"), Some(("a", "b")));
        assert_eq!(split_line("a：b"), Some(("a", "b")));
        assert_eq!(split_line("no separator"), None);
        assert_eq!(split_line("a: b: c"), Some(("a", "b: c")));
    }
}
