//! crates/skilllens_core/src/validation.rs
//!
//! Input checks applied before anything reaches the store: the job-description
//! form and the upload allow-list.

use std::fmt;

/// Default upload limit, 10 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// A job-description form field that must not be blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobField {
    PublicDescription,
    SpecialConditions,
}

impl fmt::Display for JobField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobField::PublicDescription => f.write_str("publicDescription"),
            JobField::SpecialConditions => f.write_str("specialConditions"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Required fields are empty: {}", join_fields(.0))]
    MissingFields(Vec<JobField>),
    #[error("File '{name}' has an unsupported type; allowed: {allowed}")]
    UnsupportedExtension { name: String, allowed: String },
    #[error("File '{name}' is {size} bytes, above the {max} byte limit")]
    FileTooLarge { name: String, size: u64, max: u64 },
    #[error("File '{0}' is empty")]
    EmptyFile(String),
}

fn join_fields(fields: &[JobField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Checks both job-description fields, reporting every blank one at once so
/// each can be flagged next to its input.
pub fn validate_job_description(
    public_description: &str,
    special_conditions: &str,
) -> Result<(), ValidationError> {
    let mut missing = Vec::new();
    if public_description.trim().is_empty() {
        missing.push(JobField::PublicDescription);
    }
    if special_conditions.trim().is_empty() {
        missing.push(JobField::SpecialConditions);
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingFields(missing))
    }
}

/// Size and extension rules for accepted uploads.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadPolicy {
    pub max_file_size: u64,
    /// Lower-case extensions without the leading dot.
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_extensions: vec!["pdf".to_string()],
        }
    }
}

impl UploadPolicy {
    pub fn new(max_file_size: u64, allowed_extensions: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    /// Validates a file and returns its normalized extension.
    pub fn check(&self, name: &str, size: u64) -> Result<String, ValidationError> {
        let extension = extension_of(name).unwrap_or_default();
        if !self.allowed_extensions.iter().any(|ext| *ext == extension) {
            return Err(ValidationError::UnsupportedExtension {
                name: name.to_string(),
                allowed: self.allowed_extensions.join(", "),
            });
        }
        if size == 0 {
            return Err(ValidationError::EmptyFile(name.to_string()));
        }
        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                name: name.to_string(),
                size,
                max: self.max_file_size,
            });
        }
        Ok(extension)
    }
}

/// The lower-cased text after the last dot, if the name has one.
pub fn extension_of(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Renders a byte count the way the upload list shows it, e.g. `1.5 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_are_all_reported() {
        let err = validate_job_description("  ", "").unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingFields(vec![
                JobField::PublicDescription,
                JobField::SpecialConditions
            ])
        );
        assert!(validate_job_description("Backend Engineer", "5+ years Go").is_ok());
        assert_eq!(
            validate_job_description("Backend Engineer", "\n"),
            Err(ValidationError::MissingFields(vec![JobField::SpecialConditions]))
        );
    }

    #[test]
    fn fifteen_megabyte_pdf_is_rejected() {
        let policy = UploadPolicy::default();
        let err = policy.check("cv.pdf", 15 * 1024 * 1024).unwrap_err();
        assert!(matches!(err, ValidationError::FileTooLarge { .. }));
    }

    #[test]
    fn two_megabyte_pdf_is_accepted_case_insensitively() {
        let policy = UploadPolicy::default();
        assert_eq!(policy.check("Resume.PDF", 2 * 1024 * 1024).unwrap(), "pdf");
    }

    #[test]
    fn wrong_or_missing_extension_is_rejected() {
        let policy = UploadPolicy::default();
        assert!(matches!(
            policy.check("cv.docx", 10),
            Err(ValidationError::UnsupportedExtension { .. })
        ));
        assert!(matches!(
            policy.check("cv", 10),
            Err(ValidationError::UnsupportedExtension { .. })
        ));
        assert!(matches!(policy.check("cv.pdf", 0), Err(ValidationError::EmptyFile(_))));
    }

    #[test]
    fn policy_normalizes_configured_extensions() {
        let policy = UploadPolicy::new(100, vec![".PDF".into(), " docx ".into(), "".into()]);
        assert_eq!(policy.allowed_extensions, vec!["pdf", "docx"]);
    }

    #[test]
    fn file_sizes_render_with_units() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(2 * 1024 * 1024), "2 MB");
    }
}
