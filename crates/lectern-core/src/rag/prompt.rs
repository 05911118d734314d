//! Fixed prompt templates for the answer and feedback workflows.

use std::fmt::Write;

use super::types::SourceSlide;

/// Full slide texts in rank order, each under a `--- SLIDE n ---` banner.
#[must_use]
pub fn format_answer_context(slides: &[SourceSlide]) -> String {
    slides
        .iter()
        .map(|s| format!("--- SLIDE {} ---\n{}\n", s.page, s.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full slide texts in rank order as `Slide n: text` paragraphs.
#[must_use]
pub fn format_reference_material(slides: &[SourceSlide]) -> String {
    slides
        .iter()
        .map(|s| format!("Slide {}: {}", s.page, s.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[must_use]
pub fn answer_prompt(context: &str, question: &str) -> String {
    let mut prompt = String::with_capacity(context.len() + question.len() + 640);
    prompt.push_str(
        "You are an expert teaching assistant. Answer the student's question using ONLY \
         the information from the lecture slides provided below.\n\n",
    );
    prompt.push_str("IMPORTANT INSTRUCTIONS:\n");
    prompt.push_str("- Provide a detailed, comprehensive answer (at least 3-4 sentences)\n");
    prompt.push_str("- Use specific information and examples from the slides\n");
    prompt.push_str("- Explain concepts clearly as if teaching a student\n");
    prompt.push_str(
        "- If the slides mention specific components, gates, or mechanisms, explain them\n",
    );
    prompt.push_str("- Do NOT make up information not in the slides\n\n");
    let _ = write!(
        prompt,
        "LECTURE SLIDES CONTENT:\n{context}\n\nSTUDENT QUESTION: {question}\n\n"
    );
    prompt.push_str("DETAILED ANSWER (3-4 sentences minimum):");
    prompt
}

#[must_use]
pub fn feedback_prompt(question: &str, student_answer: &str, reference: &str) -> String {
    let mut prompt =
        String::with_capacity(question.len() + student_answer.len() + reference.len() + 640);
    prompt.push_str(
        "You are a helpful teaching assistant providing detailed feedback to a student.\n\n",
    );
    let _ = write!(
        prompt,
        "QUESTION: {question}\n\nSTUDENT'S ANSWER:\n{student_answer}\n\n\
         CORRECT INFORMATION FROM LECTURE SLIDES:\n{reference}\n\n"
    );
    prompt.push_str("Provide detailed, constructive feedback following this structure:\n\n");
    prompt.push_str(
        "CORRECT POINTS: What the student understood correctly (be specific)\n\n",
    );
    prompt.push_str(
        "MISSING INFORMATION: What important points they missed from the slides \
         (list specific concepts)\n\n",
    );
    prompt.push_str("IMPROVEMENT HINT: One specific suggestion to improve their answer\n\n");
    prompt.push_str("SCORE: X/10 (with brief justification)\n\n");
    prompt.push_str("DETAILED FEEDBACK:");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slide(page: u32, text: &str) -> SourceSlide {
        SourceSlide {
            text: text.into(),
            page,
            source: "deck.pdf".into(),
        }
    }

    #[test]
    fn answer_context_keeps_rank_order() {
        let ctx = format_answer_context(&[slide(7, "LSTM gates"), slide(2, "RNN basics")]);
        assert_eq!(
            ctx,
            "--- SLIDE 7 ---\nLSTM gates\n\n--- SLIDE 2 ---\nRNN basics\n"
        );
    }

    #[test]
    fn empty_context_is_empty_string() {
        assert_eq!(format_answer_context(&[]), "");
        assert_eq!(format_reference_material(&[]), "");
    }

    #[test]
    fn reference_material_format() {
        let refs = format_reference_material(&[slide(1, "a"), slide(4, "b")]);
        assert_eq!(refs, "Slide 1: a\n\nSlide 4: b");
    }

    #[test]
    fn answer_prompt_embeds_context_and_question() {
        let prompt = answer_prompt("--- SLIDE 1 ---\nParis\n", "Capital?");
        assert!(prompt.contains("ONLY"));
        assert!(prompt.contains("Do NOT make up information"));
        assert!(prompt.contains("LECTURE SLIDES CONTENT:\n--- SLIDE 1 ---\nParis\n"));
        assert!(prompt.contains("STUDENT QUESTION: Capital?"));
        assert!(prompt.ends_with("DETAILED ANSWER (3-4 sentences minimum):"));
    }

    #[test]
    fn feedback_sections_in_order() {
        let prompt = feedback_prompt("Q", "A", "Slide 1: x");
        let order = [
            "CORRECT POINTS:",
            "MISSING INFORMATION:",
            "IMPROVEMENT HINT:",
            "SCORE: X/10",
        ];
        let positions: Vec<usize> = order.iter().map(|s| prompt.find(s).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(prompt.contains("STUDENT'S ANSWER:\nA\n"));
    }

    #[test]
    fn feedback_prompt_tolerates_empty_answer() {
        let prompt = feedback_prompt("Q", "", "");
        assert!(prompt.contains("STUDENT'S ANSWER:\n\n"));
    }
}
