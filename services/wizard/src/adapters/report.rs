//! services/wizard/src/adapters/report.rs
//!
//! Renders a finished batch into a downloadable report: a CSV sheet for
//! spreadsheet tools, or a single-page PDF listing the ranking.

use bytes::Bytes;
use skilllens_core::domain::{EvaluationResult, JobDescription};
use skilllens_core::ports::{Report, ReportFormat};
use skilllens_core::ranking::{sort_results, SortKey, SortOrder};

const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";
const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Lines that fit on one A4 page at 11pt.
const PDF_MAX_LINES: usize = 60;

pub fn render_report(
    format: ReportFormat,
    job: Option<&JobDescription>,
    results: &[EvaluationResult],
) -> Report {
    let ranked = sort_results(results, SortKey::Score, SortOrder::Desc);
    match format {
        ReportFormat::Excel => Report {
            format,
            content_type: CSV_CONTENT_TYPE.to_string(),
            bytes: Bytes::from(render_csv(&ranked)),
        },
        ReportFormat::Pdf => Report {
            format,
            content_type: PDF_CONTENT_TYPE.to_string(),
            bytes: Bytes::from(render_pdf(job, &ranked)),
        },
    }
}

fn render_csv(ranked: &[&EvaluationResult]) -> String {
    let mut out = String::from(
        "rank,candidate_id,candidate_name,email,phone,score,experience,skills,education,compatibility\n",
    );
    for (rank, r) in ranked.iter().enumerate() {
        let row = [
            (rank + 1).to_string(),
            csv_field(&r.candidate_id),
            csv_field(&r.candidate_name),
            csv_field(&r.extracted_info.email),
            csv_field(&r.extracted_info.phone),
            format!("{:.2}", r.score),
            format!("{:.2}", r.details.experience),
            format!("{:.2}", r.details.skills),
            format!("{:.2}", r.details.education),
            format!("{:.2}", r.details.compatibility),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn render_pdf(job: Option<&JobDescription>, ranked: &[&EvaluationResult]) -> Vec<u8> {
    let mut lines = vec!["SkillLens AI - Evaluation Report".to_string(), String::new()];
    if let Some(job) = job {
        let title = job.public_description.lines().next().unwrap_or_default();
        lines.push(format!("Position: {}", title));
        lines.push(String::new());
    }
    for (rank, r) in ranked.iter().enumerate() {
        lines.push(format!(
            "{}. {}  score {:.2}  (exp {:.1}, skills {:.1}, edu {:.1}, fit {:.1})",
            rank + 1,
            r.candidate_name,
            r.score,
            r.details.experience,
            r.details.skills,
            r.details.education,
            r.details.compatibility
        ));
    }
    lines.truncate(PDF_MAX_LINES);

    let mut stream = String::from("BT\n/F1 11 Tf\n14 TL\n50 800 Td\n");
    for line in &lines {
        stream.push_str(&format!("({}) Tj\nT*\n", pdf_escape(line)));
    }
    stream.push_str("ET\n");

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] \
         /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}endstream",
            stream.len(),
            stream
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
    }
    let xref_at = pdf.len();
    pdf.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
        pdf.push_str(&format!("{:010} 00000 n \n", offset));
    }
    pdf.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    ));
    pdf.into_bytes()
}

/// Escapes a line for a PDF literal string; non-ASCII characters become `?`
/// since the base font has no encoding for them.
fn pdf_escape(line: &str) -> String {
    line.chars()
        .map(|c| match c {
            '(' | ')' | '\\' => format!("\\{}", c),
            c if c.is_ascii() && !c.is_ascii_control() => c.to_string(),
            _ => "?".to_string(),
        })
        .collect()
}
