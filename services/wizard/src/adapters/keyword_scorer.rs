//! services/wizard/src/adapters/keyword_scorer.rs
//!
//! Default `CandidateScorer`: a deterministic keyword matcher. It reads the CV
//! text, compares it with the job description and pulls contact details out
//! with regexes. Swap it for a model-backed scorer without touching callers.

use async_trait::async_trait;
use regex::Regex;
use skilllens_core::domain::{
    clamp_score, CandidateInfo, Document, EvaluationResult, JobDescription, ScoreBreakdown,
};
use skilllens_core::ports::{CandidateScorer, PortError, PortResult};
use std::collections::BTreeSet;

const KNOWN_SKILLS: &[&str] = &[
    "rust", "go", "golang", "python", "java", "javascript", "typescript", "react", "angular",
    "vue", "node.js", "sql", "postgresql", "mysql", "mongodb", "docker", "kubernetes", "aws",
    "azure", "gcp", "git", "html", "css", "c++", "c#", ".net", "kotlin", "swift", "scala",
    "terraform", "linux", "graphql", "redis", "kafka", "spark",
];

const DEGREE_MARKERS: &[(&str, f32)] = &[
    ("phd", 5.0),
    ("doctorado", 5.0),
    ("doctorat", 5.0),
    ("master", 4.5),
    ("máster", 4.5),
    ("màster", 4.5),
    ("bachelor", 3.5),
    ("grado", 3.5),
    ("grau", 3.5),
    ("licenciatura", 3.5),
    ("ingeniería", 3.5),
    ("enginyeria", 3.5),
    ("degree", 3.5),
    ("university", 2.5),
    ("universidad", 2.5),
    ("universitat", 2.5),
    ("certificate", 2.0),
    ("bootcamp", 2.0),
];

const EXPERIENCE_MARKERS: &[&str] = &[
    "experience", "experiencia", "experiència", "worked", "developer", "engineer", "desarrollador",
    "ingeniero", "lead", "manager",
];

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "you", "our", "are", "will", "that", "this", "from", "have",
    "your", "years", "year", "los", "las", "del", "con", "por", "para", "una", "que", "como",
    "años", "anys", "amb", "per", "des",
];

/// Pure-Rust keyword scorer. Fast, deterministic, no network call.
///
/// Sub-scores, each on 0–5:
/// - compatibility: weighted share of job-description keywords found in the CV
///   (special-condition keywords count double)
/// - skills: share of the known skills the job asks for that the CV mentions
/// - experience: stated years, relative to the years the job asks for
/// - education: strongest degree marker found
///
/// Overall = 0.30·experience + 0.30·skills + 0.15·education + 0.25·compatibility.
pub struct KeywordScorer {
    email: Regex,
    phone: Regex,
    years: Regex,
}

impl KeywordScorer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            email: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")?,
            phone: Regex::new(r"\+?\d[\d\s().-]{7,}\d")?,
            years: Regex::new(r"(?i)(\d{1,2})\s*\+?\s*(?:years|year|yrs|años|anys)")?,
        })
    }

    fn max_years(&self, text: &str) -> Option<u32> {
        self.years
            .captures_iter(text)
            .filter_map(|c| c.get(1)?.as_str().parse::<u32>().ok())
            .max()
    }

    fn extract_info(&self, text: &str, fallback_name: &str) -> CandidateInfo {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        let name = lines
            .iter()
            .find(|l| {
                l.len() <= 60 && !l.contains('@') && !l.chars().any(|c| c.is_ascii_digit())
            })
            .map(|l| l.to_string())
            .unwrap_or_else(|| fallback_name.to_string());
        let email = self
            .email
            .find(text)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let phone = self
            .phone
            .find(text)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();

        let experience = lines
            .iter()
            .filter(|l| {
                let lower = l.to_lowercase();
                self.years.is_match(l) || EXPERIENCE_MARKERS.iter().any(|m| lower.contains(m))
            })
            .take(5)
            .map(|l| l.to_string())
            .collect();
        let education = lines
            .iter()
            .filter(|l| {
                let lower = l.to_lowercase();
                DEGREE_MARKERS.iter().any(|(m, _)| lower.contains(m))
            })
            .take(5)
            .map(|l| l.to_string())
            .collect();
        let skills = mentioned_skills(&text.to_lowercase()).into_iter().collect();

        CandidateInfo {
            name,
            email,
            phone,
            experience,
            skills,
            education,
        }
    }
}

#[async_trait]
impl CandidateScorer for KeywordScorer {
    async fn evaluate(
        &self,
        job: &JobDescription,
        document: &Document,
        contents: &[u8],
        position: usize,
    ) -> PortResult<EvaluationResult> {
        let text = extract_text(contents)?;
        let cv_lower = text.to_lowercase();
        let job_text = format!("{}\n{}", job.public_description, job.special_conditions);
        let job_lower = job_text.to_lowercase();

        let compatibility = keyword_coverage(job, &cv_lower) * 5.0;

        let wanted_skills = mentioned_skills(&job_lower);
        let found_skills = mentioned_skills(&cv_lower);
        let skills = if wanted_skills.is_empty() {
            (found_skills.len().min(10) as f32) / 2.0
        } else {
            let covered = wanted_skills.intersection(&found_skills).count();
            covered as f32 / wanted_skills.len() as f32 * 5.0
        };

        let cv_years = self.max_years(&text).unwrap_or(0) as f32;
        let experience = match self.max_years(&job_text) {
            Some(required) if required > 0 => (cv_years / required as f32).min(1.0) * 5.0,
            _ => cv_years.min(10.0) / 2.0,
        };

        let education = DEGREE_MARKERS
            .iter()
            .filter(|(marker, _)| cv_lower.contains(marker))
            .map(|(_, score)| *score)
            .fold(0.0_f32, f32::max);

        let details = ScoreBreakdown {
            experience: round_score(experience),
            skills: round_score(skills),
            education: round_score(education),
            compatibility: round_score(compatibility),
        };
        let score = round_score(
            0.30 * details.experience
                + 0.30 * details.skills
                + 0.15 * details.education
                + 0.25 * details.compatibility,
        );

        let stem = document
            .original_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&document.original_name);
        let extracted_info = self.extract_info(&text, stem);

        Ok(EvaluationResult {
            candidate_id: format!("candidate-{}", position + 1),
            candidate_name: extracted_info.name.clone(),
            document_id: document.id,
            score,
            details,
            extracted_info,
        })
    }
}

/// Reads the CV text: PDFs through `pdf-extract`, anything else as UTF-8.
fn extract_text(contents: &[u8]) -> PortResult<String> {
    if contents.starts_with(b"%PDF-") {
        pdf_extract::extract_text_from_mem(contents)
            .map_err(|e| PortError::Validation(format!("Could not read PDF text: {}", e)))
    } else {
        Ok(String::from_utf8_lossy(contents).into_owned())
    }
}

fn keywords(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() >= 3 && !w.chars().all(|c| c.is_ascii_digit()))
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Weighted share (0–1) of job keywords present in the CV.
fn keyword_coverage(job: &JobDescription, cv_lower: &str) -> f32 {
    let public = keywords(&job.public_description);
    let special = keywords(&job.special_conditions);
    let mut total = 0.0_f32;
    let mut matched = 0.0_f32;
    for keyword in public.union(&special) {
        let weight = if special.contains(keyword) { 2.0 } else { 1.0 };
        total += weight;
        if cv_lower.contains(keyword.as_str()) {
            matched += weight;
        }
    }
    if total > 0.0 {
        matched / total
    } else {
        0.0
    }
}

fn mentioned_skills(lower: &str) -> BTreeSet<String> {
    let tokens: BTreeSet<&str> = lower
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '/' | '(' | ')' | ':'))
        .map(|t| t.trim_end_matches('.'))
        .filter(|t| !t.is_empty())
        .collect();
    KNOWN_SKILLS
        .iter()
        .filter(|skill| tokens.contains(**skill))
        .map(|skill| skill.to_string())
        .collect()
}

fn round_score(raw: f32) -> f32 {
    clamp_score((raw * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const CV: &str = "Jane Doe\n\
        jane.doe@example.com\n\
        +34 612 345 678\n\
        Backend developer with 6 years of experience in Go, Docker and PostgreSQL.\n\
        Master in Computer Science, Universidad de Barcelona\n";

    fn job(public: &str, special: &str) -> JobDescription {
        JobDescription::from_form(None, public, special, Utc::now())
    }

    #[tokio::test]
    async fn strong_match_scores_high_and_extracts_contact_details() {
        let scorer = KeywordScorer::new().unwrap();
        let doc = Document::pending("jane.pdf", "pdf", CV.len() as u64);
        let result = scorer
            .evaluate(
                &job("Backend Engineer, Go and Docker", "5+ years Go"),
                &doc,
                CV.as_bytes(),
                0,
            )
            .await
            .unwrap();

        assert_eq!(result.candidate_id, "candidate-1");
        assert_eq!(result.candidate_name, "Jane Doe");
        assert_eq!(result.document_id, doc.id);
        assert_eq!(result.extracted_info.email, "jane.doe@example.com");
        assert_eq!(result.extracted_info.phone, "+34 612 345 678");
        assert!(result.extracted_info.skills.contains(&"go".to_string()));
        assert_eq!(result.details.experience, 5.0);
        assert_eq!(result.details.skills, 5.0);
        assert_eq!(result.details.education, 4.5);
        assert!(result.scores_in_range());
        assert!(result.score >= 3.5, "expected a strong score, got {}", result.score);
    }

    #[tokio::test]
    async fn unrelated_cv_scores_low_but_in_range() {
        let scorer = KeywordScorer::new().unwrap();
        let doc = Document::pending("chef.pdf", "pdf", 10);
        let result = scorer
            .evaluate(
                &job("Backend Engineer, Rust and Kubernetes", "10 years Rust"),
                &doc,
                b"Pastry chef\nCroissants and bread",
                4,
            )
            .await
            .unwrap();
        assert_eq!(result.candidate_id, "candidate-5");
        assert_eq!(result.details.skills, 0.0);
        assert_eq!(result.details.experience, 0.0);
        assert!(result.score < 1.0);
        assert!(result.scores_in_range());
    }

    #[tokio::test]
    async fn name_falls_back_to_file_stem() {
        let scorer = KeywordScorer::new().unwrap();
        let doc = Document::pending("ana_garcia.pdf", "pdf", 10);
        let result = scorer
            .evaluate(&job("Data Engineer", "SQL"), &doc, b"ana@example.com 2024", 0)
            .await
            .unwrap();
        assert_eq!(result.candidate_name, "ana_garcia");
    }

    #[test]
    fn special_conditions_weigh_double() {
        let jd = job("alpha", "bravo");
        let only_special = keyword_coverage(&jd, "bravo");
        let only_public = keyword_coverage(&jd, "alpha");
        assert!(only_special > only_public);
        assert!((only_special - 2.0 / 3.0).abs() < 1e-6);
    }
}
