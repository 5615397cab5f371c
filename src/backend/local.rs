use std::collections::HashSet;

use rand::Rng;
use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::import::{BulkCreate, BulkCreateError, CreatedUser, ImportResult, Role, RowError, SubmitRecord};

/// Bulk-create against the workspace database. Accepted and rejected rows are
/// reported per row; accepted rows are committed together.
pub struct LocalBackend<'a> {
    conn: &'a Connection,
}

impl<'a> LocalBackend<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn storage(e: rusqlite::Error) -> BulkCreateError {
    BulkCreateError::Storage(e.to_string())
}

pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

fn default_password(first_name: &str) -> String {
    let stem = first_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    let stem = if stem.is_empty() { "user".to_string() } else { stem };
    let digits: u32 = rand::rng().random_range(1000..10000);
    format!("{stem}@{digits}")
}

fn non_blank(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl LocalBackend<'_> {
    fn exists(&self, sql: &str, value: &str) -> Result<bool, BulkCreateError> {
        let hit: Option<i64> = self
            .conn
            .query_row(sql, [value], |r| r.get(0))
            .optional()
            .map_err(storage)?;
        Ok(hit.is_some())
    }

    fn validate(
        &self,
        u: &SubmitRecord,
        batch_emails: &HashSet<String>,
        batch_phones: &HashSet<String>,
    ) -> Result<Role, String> {
        if u.first_name.trim().is_empty() || u.last_name.trim().is_empty() {
            return Err("first and last name are required".to_string());
        }
        let Some(role) = u.role else {
            return Err("role is required".to_string());
        };
        let email = u.email.trim().to_lowercase();
        if !email.is_empty() {
            if !email.contains('@') {
                return Err(format!("invalid email: {}", u.email));
            }
            let taken = batch_emails.contains(&email)
                || self
                    .exists("SELECT 1 FROM users WHERE lower(email) = ?", &email)
                    .map_err(|e| e.to_string())?;
            if taken {
                return Err(format!("email already exists: {}", u.email));
            }
        }
        let phone = u.phone.trim();
        if role == Role::Student && phone.is_empty() {
            return Err("phone is required for students".to_string());
        }
        if !phone.is_empty() {
            let taken = batch_phones.contains(phone)
                || self
                    .exists("SELECT 1 FROM users WHERE phone = ?", phone)
                    .map_err(|e| e.to_string())?;
            if taken {
                return Err(format!("phone already exists: {phone}"));
            }
        }
        if let Some(class_id) = non_blank(&u.class_id) {
            let known = self
                .exists("SELECT 1 FROM classes WHERE id = ?", class_id)
                .map_err(|e| e.to_string())?;
            if !known {
                return Err(format!("class not found: {class_id}"));
            }
        }
        Ok(role)
    }
}

impl BulkCreate for LocalBackend<'_> {
    fn bulk_create(&mut self, users: &[SubmitRecord]) -> Result<ImportResult, BulkCreateError> {
        if users.is_empty() {
            return Err(BulkCreateError::Rejected("Users array is required".to_string()));
        }
        let tx = self.conn.unchecked_transaction().map_err(storage)?;
        let now = chrono::Utc::now().to_rfc3339();
        let mut result = ImportResult::default();
        let mut batch_emails = HashSet::new();
        let mut batch_phones = HashSet::new();

        for (i, u) in users.iter().enumerate() {
            let role = match self.validate(u, &batch_emails, &batch_phones) {
                Ok(r) => r,
                Err(message) => {
                    result.errors.push(RowError {
                        row: i + 1,
                        data: serde_json::to_value(u).unwrap_or_default(),
                        error: message,
                    });
                    continue;
                }
            };

            let password = default_password(&u.first_name);
            let email = u.email.trim();
            let phone = u.phone.trim();
            tx.execute(
                "INSERT INTO users(id, first_name, last_name, email, phone, role, roll_number,
                                   employee_id, class_id, password_hash, created_at, must_change_password)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
                rusqlite::params![
                    Uuid::new_v4().to_string(),
                    u.first_name.trim(),
                    u.last_name.trim(),
                    (!email.is_empty()).then_some(email),
                    (!phone.is_empty()).then_some(phone),
                    role.as_str(),
                    non_blank(&u.roll_number),
                    non_blank(&u.employee_id),
                    non_blank(&u.class_id),
                    hash_password(&password),
                    now,
                ],
            )
            .map_err(storage)?;

            if !email.is_empty() {
                batch_emails.insert(email.to_lowercase());
            }
            if !phone.is_empty() {
                batch_phones.insert(phone.to_string());
            }
            result.created.push(CreatedUser {
                name: format!("{} {}", u.first_name.trim(), u.last_name.trim()),
                role: role.as_str().to_string(),
                default_password: password,
            });
        }

        tx.commit().map_err(storage)?;
        tracing::info!(
            created = result.created.len(),
            failed = result.errors.len(),
            "local bulk-create finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_is_sha256_hex() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn default_password_uses_first_name_stem() {
        let pw = default_password("Aarav-K");
        assert!(pw.starts_with("aaravk@"), "{pw}");
        assert_eq!(pw.len(), "aaravk@".len() + 4);
        assert!(default_password("").starts_with("user@"));
    }
}
