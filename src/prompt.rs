//! Article prompt construction

use crate::provider::GenerationRequest;

/// Writer persona sent as the system message
pub const SYSTEM_PROMPT: &str = "You are a professional content writer specializing in \
high-quality articles on wellness, traditional Chinese medicine and mindful practice. \
Write SEO-friendly content from the keyword and requirements the user provides.";

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default completion budget
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Build the user prompt for one keyword
///
/// # Arguments
/// * `keyword` - Main keyword the article is written around
/// * `min_length` / `max_length` - Target article length in characters
pub fn build_article_prompt(keyword: &str, min_length: usize, max_length: usize) -> String {
    let mut prompt = String::from(
        "Write a high-quality article on wellness, traditional Chinese medicine or mindful practice \
for the following keyword.\n\n",
    );

    prompt.push_str(&format!("Main keyword: {}\n\n", keyword.trim()));

    prompt.push_str("## Requirements\n\n");
    prompt.push_str("1. The title must contain the main keyword and invite the click\n");
    prompt.push_str(&format!(
        "2. Length between {} and {} characters\n",
        min_length, max_length
    ));
    prompt.push_str("3. Clear paragraphs, none longer than 300 characters\n");
    prompt.push_str("4. Organize the content with level-2 (##) and level-3 (###) headings\n");
    prompt.push_str("5. Professional, accurate and in depth\n");
    prompt.push_str("6. Cite classical texts or scientific research where it supports a point\n");
    prompt.push_str("7. End with a summary and practical advice\n\n");

    prompt.push_str("## Format\n\n");
    prompt.push_str("- Markdown\n");
    prompt.push_str("- Exactly one level-1 heading (#) as the title, on the first line\n");
    prompt.push_str("- Separate paragraphs with a blank line\n");
    prompt.push_str("- Mark key concepts in **bold**\n");
    prompt.push_str("- Use lists for steps or key points where helpful\n\n");

    prompt.push_str("Keep the content original and valuable; avoid false or misleading claims.\n");
    prompt
}

/// Full generation request for one keyword
pub fn article_request(
    keyword: &str,
    min_length: usize,
    max_length: usize,
    temperature: f32,
    max_tokens: u32,
) -> GenerationRequest {
    GenerationRequest {
        prompt: build_article_prompt(keyword, min_length, max_length),
        system: SYSTEM_PROMPT.to_string(),
        temperature,
        max_tokens,
    }
}
