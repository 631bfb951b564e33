//! Prompt construction for grounded grading

use evalrag_core::{Assignment, ChatMessage, ReferenceChunk};

/// System instruction sent with every grading request
pub const GRADER_SYSTEM_PROMPT: &str =
    "You are an academic evaluator who strictly grades based on the provided reference material.";

/// Builder for chat prompts with tagged sections
#[derive(Debug, Default)]
pub struct PromptBuilder {
    system_instruction: String,
    header_lines: Vec<String>,
    context_sections: Vec<String>,
    question: String,
    instructions: Vec<String>,
}

impl PromptBuilder {
    /// Create a new prompt builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set system instruction
    pub fn system(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    /// Add a `Label: value` line ahead of the context
    pub fn header(mut self, label: &str, value: impl std::fmt::Display) -> Self {
        self.header_lines.push(format!("{label}: {value}"));
        self
    }

    /// Add a context section
    pub fn add_context(mut self, context: impl Into<String>) -> Self {
        self.context_sections.push(context.into());
        self
    }

    /// Set the question
    pub fn question(mut self, q: impl Into<String>) -> Self {
        self.question = q.into();
        self
    }

    /// Add an instruction
    pub fn add_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instructions.push(instruction.into());
        self
    }

    /// Build the user prompt
    pub fn build(&self) -> String {
        let mut prompt = String::new();

        for line in &self.header_lines {
            prompt.push_str(line);
            prompt.push('\n');
        }
        if !self.header_lines.is_empty() {
            prompt.push('\n');
        }

        if !self.context_sections.is_empty() {
            prompt.push_str("<context>\n");
            prompt.push_str(&self.context_sections.join("\n\n"));
            prompt.push_str("\n</context>\n\n");
        }

        if !self.question.is_empty() {
            prompt.push_str("<submission>\n");
            prompt.push_str(&self.question);
            prompt.push_str("\n</submission>\n\n");
        }

        if !self.instructions.is_empty() {
            prompt.push_str("<instructions>\n");
            for (i, inst) in self.instructions.iter().enumerate() {
                prompt.push_str(&format!("{}. {}\n", i + 1, inst));
            }
            prompt.push_str("</instructions>\n");
        }

        prompt
    }

    /// Build system and user messages
    pub fn build_messages(self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if !self.system_instruction.is_empty() {
            messages.push(ChatMessage::system(self.system_instruction.clone()));
        }
        messages.push(ChatMessage::user(self.build()));
        messages
    }
}

/// First `budget` characters of `text`
pub fn truncate_chars(text: &str, budget: usize) -> &str {
    match text.char_indices().nth(budget) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// One line per excerpt, tagged with its similarity score
pub fn format_reference_context(chunks: &[ReferenceChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("Context {} (score {:.3}): {}", i + 1, chunk.score, chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Messages asking the model to grade a submission against reference excerpts
pub fn grading_messages(
    assignment: &Assignment,
    chunks: &[ReferenceChunk],
    submission_text: &str,
    submission_char_budget: usize,
) -> Vec<ChatMessage> {
    PromptBuilder::new()
        .system(GRADER_SYSTEM_PROMPT)
        .header("Assignment Title", &assignment.title)
        .header("Maximum Marks", assignment.max_marks)
        .add_context(format!(
            "Reference Material Extracts:\n{}",
            format_reference_context(chunks)
        ))
        .question(truncate_chars(submission_text, submission_char_budget))
        .add_instruction("Only award marks for points grounded in the reference extracts.")
        .add_instruction("Penalize fabricated or irrelevant information.")
        .add_instruction(format!(
            "Respond in JSON with {{\"grade\": number between 0 and {}, \"feedback\": \"string summary of correctness and gaps\"}}",
            assignment.max_marks
        ))
        .build_messages()
}

#[cfg(test)]
mod tests {
    use super::*;
    use evalrag_core::ChatRole;

    fn chunk(score: f32, text: &str) -> ReferenceChunk {
        ReferenceChunk {
            score,
            chunk_index: Some(0),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_prompt_builder() {
        let prompt = PromptBuilder::new()
            .system("You are a helpful assistant.")
            .header("Assignment Title", "Cells")
            .add_context("Context from document A")
            .add_context("Context from document B")
            .question("What is the answer?")
            .add_instruction("Be concise")
            .add_instruction("Cite sources")
            .build();

        assert!(prompt.starts_with("Assignment Title: Cells\n"));
        assert!(prompt.contains("<context>"));
        assert!(prompt.contains("What is the answer?"));
        assert!(prompt.contains("1. Be concise"));
        assert!(prompt.contains("2. Cite sources"));
        assert!(!prompt.contains("helpful assistant"));
    }

    #[test]
    fn test_reference_context_scores_rounded() {
        let context = format_reference_context(&[
            chunk(0.91234, "Mitochondria produce ATP."),
            chunk(0.5, "Ribosomes build proteins."),
        ]);
        assert_eq!(
            context,
            "Context 1 (score 0.912): Mitochondria produce ATP.\n\nContext 2 (score 0.500): Ribosomes build proteins."
        );
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("héllo", 2), "hé");
    }

    #[test]
    fn test_grading_messages() {
        let assignment = Assignment::new("a1", "Cell Biology", 100.0);
        let submission = "x".repeat(7000);
        let messages = grading_messages(&assignment, &[chunk(0.8, "Cells divide.")], &submission, 6000);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[0].content, GRADER_SYSTEM_PROMPT);

        let user = &messages[1].content;
        assert!(user.contains("Assignment Title: Cell Biology"));
        assert!(user.contains("Maximum Marks: 100"));
        assert!(user.contains("Context 1 (score 0.800): Cells divide."));
        assert!(user.contains(&"x".repeat(6000)));
        assert!(!user.contains(&"x".repeat(6001)));
        assert!(user.contains("\"grade\""));
    }
}
