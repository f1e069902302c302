//! Prompt templates for the AI collaborator.

/// Instruction for structured CV analysis. The model must answer with a
/// bare JSON array so `extract_json_array` can decode it.
pub const ANALYZE_CV_INSTRUCTION: &str = "You are a career assistant that extracts CV \
improvement suggestions. Output ONLY a compact JSON array of objects shaped \
{\"id\": string, \"type\": one of [\"quantification\", \"weak_action_verbs\", \
\"missing_keywords\"], \"content\": string, \"applied\": false}. \
No markdown, no extra text.";

/// Builds the full analysis prompt for a CV text.
pub fn analyze_cv_prompt(raw_text: &str) -> String {
    format!("{ANALYZE_CV_INSTRUCTION}\nCV:\n{raw_text}")
}
