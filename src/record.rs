//! The fixed-shape record extracted from one licence image.
//!
//! The model answers in free text; [`FieldRecord`] is what that text becomes.
//! It always carries the same four fields, so every row of a
//! [`crate::output::ResultTable`] has the same shape whether extraction
//! succeeded, found only some fields, or failed outright.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder rendered for a field the model did not return.
pub const NO_DATA: &str = "記載なし";

/// Column header of the source-file column.
pub const FILE_NAME_COLUMN: &str = "ファイル名";

/// The four fields requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    Name,
    Address,
    Phone,
    LicenseNumber,
}

impl Field {
    /// All fields in column order.
    pub const ALL: [Field; 4] = [Field::Name, Field::Address, Field::Phone, Field::LicenseNumber];

    /// The label the model is instructed to use, which is also the column header.
    pub fn label(self) -> &'static str {
        match self {
            Field::Name => "名前",
            Field::Address => "住所",
            Field::Phone => "電話番号",
            Field::LicenseNumber => "免許証番号",
        }
    }

    /// Resolve a label from a response line to a field.
    ///
    /// Matching ignores ASCII case, whitespace and full-width forms, and
    /// accepts the synonyms models commonly substitute for the requested label.
    pub fn from_label(label: &str) -> Option<Field> {
        let key: String = label
            .chars()
            .map(fold_char)
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "名前" | "氏名" | "name" | "fullname" => Some(Field::Name),
            "住所" | "address" => Some(Field::Address),
            "電話番号" | "電話" | "phone" | "phonenumber" | "tel" => Some(Field::Phone),
            "免許証番号" | "免許番号" | "運転免許証番号" | "licensenumber" | "licencenumber"
            | "licenseno" | "licenceno" => Some(Field::LicenseNumber),
            _ => None,
        }
    }
}

/// Fold a full-width ASCII form (U+FF01–U+FF5E) or the ideographic space to
/// its half-width equivalent; every other character is returned unchanged.
pub fn fold_char(c: char) -> char {
    match c {
        '\u{3000}' => ' ',
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        _ => c,
    }
}

/// Apply [`fold_char`] to every character of `s`.
pub fn fold_width(s: &str) -> String {
    s.chars().map(fold_char).collect()
}

/// Fields extracted from one image, keyed by source file name.
///
/// A field the model did not return is `None` internally and reads as
/// [`NO_DATA`] through [`FieldRecord::value`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub file_name: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub license_number: Option<String>,
    /// Labels outside the recognised set, kept only under
    /// [`crate::pipeline::parse::UnknownLabelPolicy::Keep`].
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl FieldRecord {
    /// A record with every field absent.
    pub fn empty(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Self::default()
        }
    }

    /// Attach the source file name.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::Name => self.name.as_deref(),
            Field::Address => self.address.as_deref(),
            Field::Phone => self.phone.as_deref(),
            Field::LicenseNumber => self.license_number.as_deref(),
        }
    }

    /// The field value, or [`NO_DATA`] when absent.
    pub fn value(&self, field: Field) -> &str {
        self.get(field).unwrap_or(NO_DATA)
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let slot = match field {
            Field::Name => &mut self.name,
            Field::Address => &mut self.address,
            Field::Phone => &mut self.phone,
            Field::LicenseNumber => &mut self.license_number,
        };
        *slot = Some(value.into());
    }

    /// True when none of the four fields was found.
    pub fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|f| self.get(*f).is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_from_label() {
        for field in Field::ALL {
            assert_eq!(Field::from_label(field.label()), Some(field));
        }
    }

    #[test]
    fn label_aliases() {
        assert_eq!(Field::from_label("氏名"), Some(Field::Name));
        assert_eq!(Field::from_label("Full Name"), Some(Field::Name));
        assert_eq!(Field::from_label("TEL"), Some(Field::Phone));
        assert_eq!(Field::from_label("License Number"), Some(Field::LicenseNumber));
        assert_eq!(Field::from_label("ｎａｍｅ"), Some(Field::Name));
        assert_eq!(Field::from_label("生年月日"), None);
        assert_eq!(Field::from_label(""), None);
    }

    #[test]
    fn missing_fields_read_as_sentinel() {
        let mut record = FieldRecord::empty("a.png");
        record.set(Field::Name, "山田 太郎");
        assert_eq!(record.value(Field::Name), "山田 太郎");
        assert_eq!(record.value(Field::Address), NO_DATA);
        assert_eq!(record.get(Field::Address), None);
        assert!(!record.is_empty());
        assert!(FieldRecord::empty("b.png").is_empty());
    }

    #[test]
    fn fold_width_converts_full_width_ascii() {
        assert_eq!(fold_width("１２３ＡＢｃ－"), "123ABc-");
        assert_eq!(fold_width("山田\u{3000}太郎"), "山田 太郎");
        assert_eq!(fold_width("東京都"), "東京都");
    }
}
