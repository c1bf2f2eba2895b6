//! Document report of the questions resolved in a run.
//!
//! Every section is inserted at the start of the document body. The inserts
//! are emitted last question first, so once the batch is applied the document
//! reads in ascending question order, above whatever it held before.

use crate::ports::TextInsert;
use crate::Question;

/// Index of the first character of a document body.
pub const DOCUMENT_START: u32 = 1;

/// Renders one question's final-step outputs as a report section.
///
/// Returns `None` when the question has no outputs to report.
pub fn question_section(question: &Question) -> Option<String> {
    let last = question.model_outputs.iter().rev().find(|step| step.has_content())?;
    let mut section = format!("# Question {}: {}\n\n", question.question_number, question.text);
    for (model, output) in last.iter() {
        section.push_str(&format!("## Results from {model}\n\n{}\n\n", output.trim()));
    }
    Some(section)
}

/// Builds the batch of inserts reporting `questions`.
pub fn document_inserts(questions: &[Question]) -> Vec<TextInsert> {
    let mut ordered: Vec<&Question> = questions.iter().collect();
    ordered.sort_by_key(|q| std::cmp::Reverse(q.question_number));
    ordered
        .into_iter()
        .filter_map(question_section)
        .map(|text| TextInsert {
            index: DOCUMENT_START,
            text,
        })
        .collect()
}
