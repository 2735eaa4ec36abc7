//! Prompts for grounded answering and comparative judging.

/// Collection of prompt builders.
pub struct Prompts;

impl Prompts {
    /// Grounded answer prompt for one pipeline.
    pub fn rag_answer(context: &str, question: &str) -> String {
        format!(
            "You are a helpful assistant answering questions based on the provided context.\n\
             Use the context below to answer the question. If the context contains relevant information, provide a detailed answer.\n\
             If the context doesn't contain enough information to fully answer the question, provide the best answer you can based on what is available.\n\
             Only say 'I am not sure' if the context is completely irrelevant or empty.\n\n\
             Context:\n{context}\n\nQuestion: {question}\n\nAnswer:"
        )
    }

    /// System prompt for the judge.
    pub fn judge_system() -> &'static str {
        "You are an evaluator for Retrieval-Augmented Generation systems. Always respond with a single valid JSON object."
    }

    /// Comparative judge prompt covering every submitted pipeline.
    ///
    /// `answers` holds `(id, description, answer_text)` in configuration order.
    pub fn judge(question: &str, answers: &[(&str, &str, &str)]) -> String {
        let ids: Vec<&str> = answers.iter().map(|(id, _, _)| *id).collect();

        let schema_lines = ids
            .iter()
            .map(|id| {
                format!(
                    "  \"{}\": {{\"accuracy\": int, \"relevance\": int, \"cost_efficiency\": int}},",
                    id
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let winner_choices = ids
            .iter()
            .map(|id| format!("\"{}\"", id))
            .collect::<Vec<_>>()
            .join(" | ");

        let answers_block = answers
            .iter()
            .map(|(id, description, text)| {
                format!("Pipeline {} ({}):\nAnswer: {}\n", id, description, text)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            r#"Question: {question}

You will see answers from {count} different pipelines. For each pipeline, score:
- accuracy (1-10)
- relevance (1-10)
- cost_efficiency (1-10; shorter but still accurate answers are better).

Then pick a single winner: {choices}.

Return STRICT JSON only, with this structure:

{{
{schema}
  "winner": {winner_choices}
}}

Answers:
{answers_block}
"#,
            count = answers.len(),
            choices = ids.join(", "),
            schema = schema_lines,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rag_answer_embeds_context_and_question() {
        let prompt = Prompts::rag_answer("The sky is blue.", "What color is the sky?");
        assert!(prompt.contains("Context:\nThe sky is blue.\n\nQuestion: What color is the sky?"));
        assert!(prompt.ends_with("Answer:"));
    }

    #[test]
    fn test_judge_lists_every_pipeline() {
        let prompt = Prompts::judge(
            "Why?",
            &[("A", "small chunks", "Because."), ("B", "large chunks", "No idea.")],
        );
        assert!(prompt.contains("answers from 2 different pipelines"));
        assert!(prompt.contains("\"A\": {\"accuracy\": int"));
        assert!(prompt.contains("\"winner\": \"A\" | \"B\""));
        assert!(prompt.contains("Pipeline B (large chunks):\nAnswer: No idea."));
    }
}
