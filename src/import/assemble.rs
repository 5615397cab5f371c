use std::collections::HashSet;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::classes::{resolve_class, ClassRef, ClassResolution};
use super::csv::{RawRow, RowReader, TokenizeError};
use super::fields::{map_row, Role};

pub const AUTO_PHONE_PREFIX: &str = "9999";

/// Supplies placeholder phone numbers for students imported without one.
pub trait PhoneSource {
    fn next_phone(&mut self) -> String;
}

/// `9999` followed by six random zero-padded digits. Numbers are not repeated
/// within one source, but nothing checks them against existing users.
pub struct RandomPhones<R: Rng> {
    rng: R,
    issued: HashSet<String>,
}

impl RandomPhones<StdRng> {
    pub fn from_os_rng() -> Self {
        Self::new(StdRng::from_os_rng())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomPhones<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            issued: HashSet::new(),
        }
    }
}

impl<R: Rng> PhoneSource for RandomPhones<R> {
    fn next_phone(&mut self) -> String {
        let mut phone = String::new();
        for _ in 0..64 {
            let n: u32 = self.rng.random_range(0..1_000_000);
            phone = format!("{AUTO_PHONE_PREFIX}{n:06}");
            if self.issued.insert(phone.clone()) {
                break;
            }
        }
        phone
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    MissingName,
    ClassNotFound,
    UnknownRole,
}

impl WarningCode {
    pub fn as_str(self) -> &'static str {
        match self {
            WarningCode::MissingName => "missing_name",
            WarningCode::ClassNotFound => "class_not_found",
            WarningCode::UnknownRole => "unknown_role",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowWarning {
    pub line: usize,
    pub code: WarningCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftUserRecord {
    pub line: usize,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_display_name: Option<String>,
}

/// What actually goes over the wire. There is no display name field, so it
/// cannot leak into the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRecord {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
}

impl From<&DraftUserRecord> for SubmitRecord {
    fn from(d: &DraftUserRecord) -> Self {
        Self {
            first_name: d.first_name.clone(),
            last_name: d.last_name.clone(),
            email: d.email.clone(),
            phone: d.phone.clone(),
            role: d.role,
            roll_number: d.roll_number.clone(),
            employee_id: d.employee_id.clone(),
            class_id: d.class_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Fixed role for every record, e.g. when importing from the students page.
    pub user_type: Option<Role>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedImport {
    pub rows_total: usize,
    pub records: Vec<DraftUserRecord>,
    pub warnings: Vec<RowWarning>,
}

impl ParsedImport {
    pub fn dropped(&self) -> usize {
        self.rows_total - self.records.len()
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

pub fn assemble_row(
    header: &[String],
    row: &RawRow,
    roster: &[ClassRef],
    opts: &ImportOptions,
    phones: &mut dyn PhoneSource,
    warnings: &mut Vec<RowWarning>,
) -> Option<DraftUserRecord> {
    let fields = map_row(header, &row.cells);
    if fields.first_name.is_empty() || fields.last_name.is_empty() {
        warnings.push(RowWarning {
            line: row.line,
            code: WarningCode::MissingName,
            message: "first and last name are required; row skipped".to_string(),
        });
        return None;
    }

    let role = opts.user_type.or(fields.role);
    if opts.user_type.is_none() {
        if let Some(raw) = &fields.unknown_role {
            warnings.push(RowWarning {
                line: row.line,
                code: WarningCode::UnknownRole,
                message: format!("unrecognized role \"{raw}\""),
            });
        }
    }

    let (class_id, class_display_name) = match fields.class.as_ref() {
        None => (None, None),
        Some(label) => match resolve_class(label, roster) {
            ClassResolution::Matched {
                class_id,
                display_name,
            } => (Some(class_id), Some(display_name)),
            ClassResolution::NotFound { display_name } => {
                warnings.push(RowWarning {
                    line: row.line,
                    code: WarningCode::ClassNotFound,
                    message: format!("class \"{}\" not found", label.raw()),
                });
                (None, Some(display_name))
            }
        },
    };

    let phone = if role == Some(Role::Student) && fields.phone.is_empty() {
        phones.next_phone()
    } else {
        fields.phone
    };

    Some(DraftUserRecord {
        line: row.line,
        first_name: fields.first_name,
        last_name: fields.last_name,
        email: fields.email,
        phone,
        role,
        roll_number: non_empty(fields.roll_number),
        employee_id: non_empty(fields.employee_id),
        class_id,
        class_display_name,
    })
}

/// Parses and assembles rows as they are read. `cancel` is checked between
/// rows; a cancelled parse yields no records.
pub fn parse_import<R: BufRead>(
    reader: R,
    roster: &[ClassRef],
    opts: &ImportOptions,
    phones: &mut dyn PhoneSource,
    cancel: &AtomicBool,
) -> Result<ParsedImport, TokenizeError> {
    let mut rows = RowReader::new(reader)?;
    let header = rows.header().to_vec();
    let mut out = ParsedImport::default();
    for row in rows.by_ref() {
        if cancel.load(Ordering::Relaxed) {
            return Err(TokenizeError::Cancelled);
        }
        let row = row?;
        out.rows_total += 1;
        if let Some(rec) = assemble_row(&header, &row, roster, opts, phones, &mut out.warnings) {
            out.records.push(rec);
        }
    }
    if out.rows_total == 0 {
        return Err(TokenizeError::NoDataRows);
    }
    Ok(out)
}

pub fn parse_import_text(
    text: &str,
    roster: &[ClassRef],
    opts: &ImportOptions,
    phones: &mut dyn PhoneSource,
) -> Result<ParsedImport, TokenizeError> {
    parse_import(text.as_bytes(), roster, opts, phones, &AtomicBool::new(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPhones(u32);

    impl PhoneSource for FixedPhones {
        fn next_phone(&mut self) -> String {
            self.0 += 1;
            format!("9999{:06}", self.0)
        }
    }

    fn roster() -> Vec<ClassRef> {
        vec![ClassRef {
            id: "class-10a".into(),
            name: "10".into(),
            section: "A".into(),
        }]
    }

    fn is_auto_phone(p: &str) -> bool {
        p.len() == 10 && p.starts_with(AUTO_PHONE_PREFIX) && p.chars().all(|c| c.is_ascii_digit())
    }

    #[test]
    fn random_phones_match_format_and_do_not_repeat() {
        let mut phones = RandomPhones::seeded(7);
        let mut seen = HashSet::new();
        for _ in 0..500 {
            let p = phones.next_phone();
            assert!(is_auto_phone(&p), "bad phone {p}");
            assert!(seen.insert(p));
        }
    }

    #[test]
    fn incomplete_rows_are_dropped_with_warning() {
        let csv = "first name,last name\nAsha,\n,Rao\nRavi,Kumar\n";
        let parsed =
            parse_import_text(csv, &[], &ImportOptions::default(), &mut FixedPhones(0))
                .expect("parse");
        assert_eq!(parsed.rows_total, 3);
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.dropped(), 2);
        assert_eq!(
            parsed
                .warnings
                .iter()
                .map(|w| (w.line, w.code))
                .collect::<Vec<_>>(),
            vec![(2, WarningCode::MissingName), (3, WarningCode::MissingName)]
        );
    }

    #[test]
    fn user_type_overrides_csv_role_and_triggers_auto_phone() {
        let csv = "name,phone,role\nJohn Doe,-,teacher\n";
        let opts = ImportOptions {
            user_type: Some(Role::Student),
        };
        let parsed = parse_import_text(csv, &[], &opts, &mut FixedPhones(41)).expect("parse");
        let rec = &parsed.records[0];
        assert_eq!(rec.role, Some(Role::Student));
        assert_eq!(rec.phone, "9999000042");
    }

    #[test]
    fn teachers_without_phone_keep_it_empty() {
        let csv = "name,phone,role,employee id\nPriya Verma,-,teacher,EMP7\n";
        let parsed =
            parse_import_text(csv, &[], &ImportOptions::default(), &mut FixedPhones(0))
                .expect("parse");
        let rec = &parsed.records[0];
        assert_eq!(rec.phone, "");
        assert_eq!(rec.employee_id.as_deref(), Some("EMP7"));
    }

    #[test]
    fn class_resolution_is_annotated() {
        let csv = "name,role,class\nJohn Doe,student,10 A\nJane Roe,student,10 Z\n";
        let parsed = parse_import_text(
            csv,
            &roster(),
            &ImportOptions::default(),
            &mut FixedPhones(0),
        )
        .expect("parse");
        assert_eq!(parsed.records[0].class_id.as_deref(), Some("class-10a"));
        assert_eq!(parsed.records[0].class_display_name.as_deref(), Some("10 A"));
        assert_eq!(parsed.records[1].class_id, None);
        assert_eq!(
            parsed.records[1].class_display_name.as_deref(),
            Some("10 Z (Not Found)")
        );
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].code, WarningCode::ClassNotFound);
        assert_eq!(parsed.warnings[0].line, 3);
    }

    #[test]
    fn all_rows_dropped_still_parses() {
        let parsed = parse_import_text(
            "email\na@x.in\n",
            &[],
            &ImportOptions::default(),
            &mut FixedPhones(0),
        )
        .expect("parse");
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.rows_total, 1);
    }

    #[test]
    fn cancelled_parse_stops_before_assembly() {
        let cancel = AtomicBool::new(true);
        let res = parse_import(
            "name\nJohn Doe\n".as_bytes(),
            &[],
            &ImportOptions::default(),
            &mut FixedPhones(0),
            &cancel,
        );
        assert!(matches!(res, Err(TokenizeError::Cancelled)));
    }

    #[test]
    fn submit_projection_drops_display_name() {
        let csv = "name,role,class\nJohn Doe,student,10 A\n";
        let parsed = parse_import_text(
            csv,
            &roster(),
            &ImportOptions::default(),
            &mut FixedPhones(0),
        )
        .expect("parse");
        let payload = serde_json::to_value(SubmitRecord::from(&parsed.records[0])).expect("json");
        let obj = payload.as_object().expect("object");
        assert!(!obj.contains_key("classDisplayName"));
        assert!(!obj.contains_key("line"));
        assert_eq!(obj["classId"], "class-10a");
        assert_eq!(obj["role"], "student");
    }
}
