use std::io::BufRead;
use std::sync::atomic::AtomicBool;

use thiserror::Error;

use super::assemble::{parse_import, ImportOptions, ParsedImport, PhoneSource, SubmitRecord};
use super::classes::ClassRef;
use super::csv::TokenizeError;
use super::fields::Role;
use super::report::ImportResult;

pub const SUBMIT_FALLBACK_MESSAGE: &str = "Failed to import users";

#[derive(Debug, Error)]
pub enum BulkCreateError {
    /// The endpoint answered with an error and said why.
    #[error("{0}")]
    Rejected(String),
    #[error("bulk-create request failed: {0}")]
    Transport(String),
    #[error("unexpected bulk-create response: {0}")]
    Protocol(String),
    #[error("bulk-create storage failed: {0}")]
    Storage(String),
}

impl BulkCreateError {
    /// Message shown to the operator: the server's own text when it sent one.
    pub fn user_message(&self) -> String {
        match self {
            BulkCreateError::Rejected(m) => m.clone(),
            _ => SUBMIT_FALLBACK_MESSAGE.to_string(),
        }
    }
}

/// The bulk-create endpoint: one call per batch, per-row outcome in the result.
pub trait BulkCreate {
    fn bulk_create(&mut self, users: &[SubmitRecord]) -> Result<ImportResult, BulkCreateError>;
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("import is in {actual} stage, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
    #[error(transparent)]
    Parse(#[from] TokenizeError),
    #[error(transparent)]
    Submit(#[from] BulkCreateError),
}

#[derive(Debug, Clone)]
pub enum ImportStage {
    Upload,
    Preview(ParsedImport),
    Results(ImportResult),
}

impl ImportStage {
    pub fn name(&self) -> &'static str {
        match self {
            ImportStage::Upload => "upload",
            ImportStage::Preview(_) => "preview",
            ImportStage::Results(_) => "results",
        }
    }
}

/// Upload -> Preview -> Results. A failed load stays in Upload, a failed
/// submit stays in Preview with the parsed rows intact.
#[derive(Debug, Clone)]
pub struct ImportSession {
    opts: ImportOptions,
    stage: ImportStage,
}

impl ImportSession {
    pub fn new(user_type: Option<Role>) -> Self {
        Self {
            opts: ImportOptions { user_type },
            stage: ImportStage::Upload,
        }
    }

    pub fn user_type(&self) -> Option<Role> {
        self.opts.user_type
    }

    pub fn stage(&self) -> &ImportStage {
        &self.stage
    }

    pub fn preview(&self) -> Option<&ParsedImport> {
        match &self.stage {
            ImportStage::Preview(p) => Some(p),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&ImportResult> {
        match &self.stage {
            ImportStage::Results(r) => Some(r),
            _ => None,
        }
    }

    fn expect_stage(&self, expected: &'static str) -> Result<(), SessionError> {
        let actual = self.stage.name();
        if actual == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState { expected, actual })
        }
    }

    pub fn load<R: BufRead>(
        &mut self,
        reader: R,
        roster: &[ClassRef],
        phones: &mut dyn PhoneSource,
        cancel: &AtomicBool,
    ) -> Result<(), SessionError> {
        self.expect_stage("upload")?;
        let parsed = parse_import(reader, roster, &self.opts, phones, cancel)?;
        self.stage = ImportStage::Preview(parsed);
        Ok(())
    }

    pub fn back(&mut self) -> Result<(), SessionError> {
        self.expect_stage("preview")?;
        self.stage = ImportStage::Upload;
        Ok(())
    }

    pub fn payload(&self) -> Result<Vec<SubmitRecord>, SessionError> {
        let Some(parsed) = self.preview() else {
            return Err(SessionError::InvalidState {
                expected: "preview",
                actual: self.stage.name(),
            });
        };
        Ok(parsed.records.iter().map(SubmitRecord::from).collect())
    }

    /// On success the outcome is available through [`ImportSession::result`].
    pub fn submit(&mut self, backend: &mut dyn BulkCreate) -> Result<(), SessionError> {
        let payload = self.payload()?;
        self.stage = ImportStage::Results(backend.bulk_create(&payload)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::assemble::RandomPhones;
    use super::super::report::CreatedUser;
    use super::*;

    const CSV: &str = "NAME,PHONE,CLASS\nJohn Doe,-,10 A\nJane Roe,9876543210,10 A\n";

    struct Recorder {
        seen: Vec<SubmitRecord>,
        fail_with: Option<BulkCreateError>,
    }

    impl BulkCreate for Recorder {
        fn bulk_create(&mut self, users: &[SubmitRecord]) -> Result<ImportResult, BulkCreateError> {
            if let Some(e) = self.fail_with.take() {
                return Err(e);
            }
            self.seen.extend_from_slice(users);
            Ok(ImportResult {
                created: users
                    .iter()
                    .map(|u| CreatedUser {
                        name: format!("{} {}", u.first_name, u.last_name),
                        role: "student".into(),
                        default_password: "pw".into(),
                    })
                    .collect(),
                errors: Vec::new(),
            })
        }
    }

    fn roster() -> Vec<ClassRef> {
        vec![ClassRef {
            id: "c1".into(),
            name: "10".into(),
            section: "A".into(),
        }]
    }

    fn loaded() -> ImportSession {
        let mut s = ImportSession::new(Some(Role::Student));
        s.load(
            CSV.as_bytes(),
            &roster(),
            &mut RandomPhones::seeded(1),
            &AtomicBool::new(false),
        )
        .expect("load");
        s
    }

    #[test]
    fn header_only_file_keeps_upload_stage() {
        let mut s = ImportSession::new(None);
        let res = s.load(
            "NAME,EMAIL\n".as_bytes(),
            &[],
            &mut RandomPhones::seeded(1),
            &AtomicBool::new(false),
        );
        assert!(matches!(res, Err(SessionError::Parse(TokenizeError::NoDataRows))));
        assert_eq!(s.stage().name(), "upload");
    }

    #[test]
    fn back_discards_preview() {
        let mut s = loaded();
        assert_eq!(s.preview().map(|p| p.records.len()), Some(2));
        s.back().expect("back");
        assert_eq!(s.stage().name(), "upload");
        assert!(s.back().is_err());
    }

    #[test]
    fn failed_submit_stays_in_preview() {
        let mut s = loaded();
        let mut backend = Recorder {
            seen: Vec::new(),
            fail_with: Some(BulkCreateError::Transport("connection refused".into())),
        };
        let err = s.submit(&mut backend).expect_err("should fail");
        match err {
            SessionError::Submit(e) => assert_eq!(e.user_message(), SUBMIT_FALLBACK_MESSAGE),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(s.stage().name(), "preview");

        s.submit(&mut backend).expect("retry");
        assert_eq!(s.result().map(|r| r.created.len()), Some(2));
        assert_eq!(s.stage().name(), "results");
        assert_eq!(backend.seen.len(), 2);
        assert!(backend.seen.iter().all(|u| u.class_id.as_deref() == Some("c1")));
    }

    #[test]
    fn submit_is_rejected_outside_preview() {
        let mut s = ImportSession::new(None);
        let mut backend = Recorder {
            seen: Vec::new(),
            fail_with: None,
        };
        assert!(matches!(
            s.submit(&mut backend),
            Err(SessionError::InvalidState {
                expected: "preview",
                actual: "upload"
            })
        ));
    }

    #[test]
    fn server_message_is_preferred() {
        let e = BulkCreateError::Rejected("Users array is required".into());
        assert_eq!(e.user_message(), "Users array is required");
    }
}
