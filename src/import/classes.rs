use serde::{Deserialize, Serialize};

use super::fields::ClassLabel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub section: String,
}

impl ClassRef {
    pub fn display_name(&self) -> String {
        let section = self.section.trim();
        if section.is_empty() {
            self.name.trim().to_string()
        } else {
            format!("{} {}", self.name.trim(), section)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassResolution {
    Matched {
        class_id: String,
        display_name: String,
    },
    NotFound {
        display_name: String,
    },
}

fn same(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

pub fn resolve_class(label: &ClassLabel, roster: &[ClassRef]) -> ClassResolution {
    let found = match label {
        ClassLabel::Numbered {
            number, section, ..
        } => roster
            .iter()
            .find(|c| same(&c.name, number) && same(&c.section, section)),
        ClassLabel::Named(name) => roster.iter().find(|c| same(&c.name, name)),
    };
    match found {
        Some(c) => ClassResolution::Matched {
            class_id: c.id.clone(),
            display_name: c.display_name(),
        },
        None => ClassResolution::NotFound {
            display_name: format!("{} (Not Found)", label.raw()),
        },
    }
}
