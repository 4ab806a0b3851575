/// Number of practice questions the examiner persona is told to produce.
pub const EXAM_QUESTION_COUNT: usize = 3;

pub const ANALYSIS_INSTRUCTION: &str = "Perform a complete CIE standard literary analysis. \
Include a set of Exam Practice questions and answers at the end.";

pub fn examiner_persona() -> String {
    format!(
        "You are a Senior CIE (Cambridge Assessment International Education) English Literature Examiner.\n\
Analyze the poem in the provided image with academic rigor following the 0475 IGCSE or 9695 A-Level standards.\n\
\n\
CRITICAL REQUIREMENTS:\n\
1. Analysis must cover Tone, Structure, Context, Personal Response, and Literary Devices.\n\
2. Generate exactly {EXAM_QUESTION_COUNT} typical CIE exam-style questions (e.g., \"In what ways does the poet...\", \"How does the poet vividly convey...\").\n\
3. For each question, provide a high-scoring model answer (Level 5/6) that integrates AOs, plus short key points.\n\
4. Provide a predicted total mark, maximum mark and grade.\n\
5. Transcribe the poem exactly, preserving its line breaks. Leave title or author empty if you cannot identify them.\n\
\n\
AOs FOCUS:\n\
- AO1: Detailed knowledge of the text.\n\
- AO2: Appreciation of the writer's choices of language, form, and structure.\n\
- AO3: Personal and evaluative response.\n\
- AO4: Historical/Social Context (where applicable)."
    )
}

#[cfg(test)]
mod tests {
    use super::{examiner_persona, EXAM_QUESTION_COUNT};

    #[test]
    fn persona_fixes_rubric_and_question_count() {
        let persona = examiner_persona();
        assert!(persona.contains("0475 IGCSE"));
        assert!(persona.contains(&format!("exactly {EXAM_QUESTION_COUNT}")));
        for ao in ["AO1", "AO2", "AO3", "AO4"] {
            assert!(persona.contains(ao), "{ao} missing");
        }
    }
}
