//! Prompts for licence-field extraction.
//!
//! Every prompt lives here so prompt changes touch exactly one file and unit
//! tests can inspect them without a model. Callers can override either
//! string via [`crate::config::ExtractionConfig::system_prompt`] and
//! [`crate::config::ExtractionConfig::instruction`]; these constants are used
//! only when no override is provided.

/// Default system-role message.
pub const DEFAULT_SYSTEM_ROLE: &str = "あなたは画像から情報を抽出することができるAIアシスタントです。";

/// Default extraction instruction sent alongside the image.
///
/// The `label: value` layout it requests is what
/// [`crate::pipeline::parse::parse_response`] expects.
pub const DEFAULT_INSTRUCTION: &str = "この画像は運転免許証です。名前、住所、電話番号（あれば）、免許証番号を抽出し、以下の形式で1項目につき1行で返してください。\
英数字と記号は半角でお願いします。日本人の場合は苗字と名前の間に半角スペースを1つ入れてください。：\n\
名前: [抽出した名前]\n\
住所: [抽出した住所]\n\
電話番号: [抽出した電話番号]（なければ「記載なし」）\n\
免許証番号: [抽出した免許証番号]";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Field, NO_DATA};

    #[test]
    fn instruction_lists_every_field_in_label_value_form() {
        for field in Field::ALL {
            let line = format!("{}: ", field.label());
            assert!(DEFAULT_INSTRUCTION.contains(&line), "missing {line:?}");
        }
    }

    #[test]
    fn instruction_asks_for_half_width_and_name_spacing() {
        assert!(DEFAULT_INSTRUCTION.contains("半角"));
        assert!(DEFAULT_INSTRUCTION.contains("苗字と名前の間に半角スペース"));
        assert!(DEFAULT_INSTRUCTION.contains(NO_DATA));
    }
}
