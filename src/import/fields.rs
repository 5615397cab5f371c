use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SchoolAdmin,
    Principal,
    Teacher,
    Student,
    Parent,
    FinanceOfficer,
    SupportStaff,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::SchoolAdmin,
        Role::Principal,
        Role::Teacher,
        Role::Student,
        Role::Parent,
        Role::FinanceOfficer,
        Role::SupportStaff,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::SchoolAdmin => "school_admin",
            Role::Principal => "principal",
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::Parent => "parent",
            Role::FinanceOfficer => "finance_officer",
            Role::SupportStaff => "support_staff",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let key = s.trim().to_ascii_lowercase();
        Role::ALL.into_iter().find(|r| r.as_str() == key)
    }
}

/// Lower-cases a role cell and joins its first two words with an underscore,
/// so "School Admin" becomes "school_admin".
pub fn normalize_role_text(raw: &str) -> String {
    raw.trim().to_lowercase().replacen(' ', "_", 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    FirstName,
    LastName,
    Email,
    Phone,
    Role,
    RollNumber,
    Class,
    EmployeeId,
}

const HEADER_ALIASES: &[(&str, Field)] = &[
    ("name", Field::Name),
    ("first name", Field::FirstName),
    ("firstname", Field::FirstName),
    ("last name", Field::LastName),
    ("lastname", Field::LastName),
    ("email", Field::Email),
    ("phone", Field::Phone),
    ("phone number", Field::Phone),
    ("role", Field::Role),
    ("roll number", Field::RollNumber),
    ("rollnumber", Field::RollNumber),
    ("class", Field::Class),
    ("employee id", Field::EmployeeId),
    ("employeeid", Field::EmployeeId),
];

pub fn canonical_field(header: &str) -> Option<Field> {
    let key = header.trim().to_lowercase();
    HEADER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, f)| *f)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassLabel {
    /// "10", "10 A", "10b". Section defaults to "A" when omitted.
    Numbered {
        raw: String,
        number: String,
        section: String,
    },
    /// Anything else that is not a dash, e.g. "Nursery".
    Named(String),
}

impl ClassLabel {
    pub fn raw(&self) -> &str {
        match self {
            ClassLabel::Numbered { raw, .. } => raw,
            ClassLabel::Named(raw) => raw,
        }
    }
}

pub fn parse_class_label(value: &str) -> Option<ClassLabel> {
    let v = value.trim();
    if v.is_empty() || v == "-" {
        return None;
    }
    let digits_len = v.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits_len == 0 {
        return Some(ClassLabel::Named(v.to_string()));
    }
    let number = &v[..digits_len];
    let rest = v[digits_len..].trim_start();
    let mut chars = rest.chars();
    let section = match (chars.next(), chars.next()) {
        (None, _) => "A".to_string(),
        (Some(c), None) if c.is_ascii_alphabetic() => c.to_ascii_uppercase().to_string(),
        _ => return Some(ClassLabel::Named(v.to_string())),
    };
    Some(ClassLabel::Numbered {
        raw: v.to_string(),
        number: number.to_string(),
        section,
    })
}

/// First-stage output of the mapper. Only fields a CSV can carry live here;
/// resolution against the roster happens later.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFields {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub role: Option<Role>,
    pub unknown_role: Option<String>,
    pub roll_number: String,
    pub employee_id: String,
    pub class: Option<ClassLabel>,
}

fn dash_to_empty(v: &str) -> String {
    if v == "-" {
        String::new()
    } else {
        v.to_string()
    }
}

pub fn split_full_name(value: &str) -> (String, String) {
    let (first, rest) = match value.split_once(' ') {
        Some((first, rest)) => (first, rest.trim()),
        None => (value, ""),
    };
    let last = if rest.is_empty() { "Student" } else { rest };
    (first.to_string(), last.to_string())
}

pub fn map_row(header: &[String], cells: &[String]) -> ParsedFields {
    let mut out = ParsedFields::default();
    for (i, h) in header.iter().enumerate() {
        let Some(field) = canonical_field(h) else {
            continue;
        };
        let value = cells.get(i).map(|s| s.trim()).unwrap_or("");
        match field {
            Field::Name => {
                let (first, last) = split_full_name(value);
                out.first_name = first;
                out.last_name = last;
            }
            Field::FirstName => out.first_name = value.to_string(),
            Field::LastName => out.last_name = value.to_string(),
            Field::Email => out.email = dash_to_empty(value),
            Field::Phone => out.phone = dash_to_empty(value),
            Field::Role => {
                let normalized = normalize_role_text(&dash_to_empty(value));
                out.role = Role::parse(&normalized);
                out.unknown_role = if out.role.is_none() && !normalized.is_empty() {
                    Some(value.to_string())
                } else {
                    None
                };
            }
            Field::RollNumber => out.roll_number = value.to_string(),
            Field::Class => out.class = parse_class_label(value),
            Field::EmployeeId => out.employee_id = dash_to_empty(value),
        }
    }
    out
}
