//! Keyword heuristic deciding whether a prompt gets a thought and a plan

/// Words that signal substantial work
const SUBSTANTIAL_KEYWORDS: [&str; 7] = [
    "implement",
    "create",
    "build",
    "refactor",
    "restructure",
    "migrate",
    "optimize",
];

/// Words that signal a multi-step request
const MULTI_STEP_KEYWORDS: [&str; 7] = ["first", "then", "next", "after", "finally", "step", "phase"];

/// Prompts longer than this many characters count as long
pub const LONG_PROMPT_CHARS: usize = 200;

const SUMMARY_MAX_WORDS: usize = 15;
const SUMMARY_MAX_CHARS: usize = 100;

/// Outcome of classifying one prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptAnalysis {
    pub is_complex: bool,
    pub needs_plan: bool,
    pub summary: String,
    pub estimated_steps: u32,
}

/// Classify a prompt
///
/// Keywords match as case-insensitive substrings.
pub fn analyze_prompt(prompt: &str) -> PromptAnalysis {
    let lower = prompt.to_lowercase();

    let substantial_matches = SUBSTANTIAL_KEYWORDS
        .iter()
        .filter(|keyword| lower.contains(*keyword))
        .count();
    let substantial = substantial_matches > 0;
    let multi_step = MULTI_STEP_KEYWORDS.iter().any(|keyword| lower.contains(keyword));
    let long = prompt.chars().count() > LONG_PROMPT_CHARS;

    let is_complex = substantial || multi_step || long;
    let needs_plan = is_complex && (multi_step || long || substantial_matches > 1);

    let mut estimated_steps = 1;
    if multi_step {
        estimated_steps += 2;
    }
    if substantial {
        estimated_steps += 1;
    }
    if long {
        estimated_steps += 1;
    }

    PromptAnalysis {
        is_complex,
        needs_plan,
        summary: summarize(prompt, is_complex),
        estimated_steps,
    }
}

fn summarize(prompt: &str, is_complex: bool) -> String {
    if !is_complex {
        return "Processing simple request".to_string();
    }

    if prompt.split_whitespace().count() <= SUMMARY_MAX_WORDS {
        return prompt.to_string();
    }

    let first_sentence = prompt.split(['.', '!', '?']).next().unwrap_or(prompt);
    if first_sentence.chars().count() <= SUMMARY_MAX_CHARS {
        first_sentence.to_string()
    } else {
        let truncated: String = first_sentence.chars().take(SUMMARY_MAX_CHARS - 3).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_prompt() {
        let analysis = analyze_prompt("what does this function return?");
        assert!(!analysis.is_complex);
        assert!(!analysis.needs_plan);
        assert_eq!(analysis.estimated_steps, 1);
        assert_eq!(analysis.summary, "Processing simple request");
    }

    #[test]
    fn test_multi_step_and_substantial() {
        let analysis = analyze_prompt("first implement X then optimize Y");
        assert!(analysis.is_complex);
        assert!(analysis.needs_plan);
        assert_eq!(analysis.estimated_steps, 4);
        assert_eq!(analysis.summary, "first implement X then optimize Y");
    }

    #[test]
    fn test_single_substantial_keyword_needs_no_plan() {
        let analysis = analyze_prompt("Refactor the parser");
        assert!(analysis.is_complex);
        assert!(!analysis.needs_plan);
        assert_eq!(analysis.estimated_steps, 2);
    }

    #[test]
    fn test_two_substantial_keywords_need_a_plan() {
        let analysis = analyze_prompt("create a cache and migrate callers");
        assert!(analysis.needs_plan);
        assert_eq!(analysis.estimated_steps, 2);
    }

    #[test]
    fn test_long_prompt_is_complex() {
        let prompt = "word ".repeat(41);
        let analysis = analyze_prompt(prompt.trim_end());
        assert!(analysis.is_complex);
        assert!(analysis.needs_plan);
        assert_eq!(analysis.estimated_steps, 2);
    }

    #[test]
    fn test_summary_uses_first_sentence() {
        let prompt = "Please implement the retry logic for uploads. It should back off \
                      exponentially and give up after five attempts, logging each one.";
        let analysis = analyze_prompt(prompt);
        assert_eq!(analysis.summary, "Please implement the retry logic for uploads");
    }

    #[test]
    fn test_summary_truncates_long_sentence() {
        let prompt = format!("implement {}", "abcdefghij ".repeat(20));
        let analysis = analyze_prompt(&prompt);
        assert_eq!(analysis.summary.chars().count(), 100);
        assert!(analysis.summary.ends_with("..."));
    }
}
