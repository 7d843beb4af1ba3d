//! Answer Extraction - Heuristic answers from a transcript
//!
//! Used when the provider returned a transcript but no structured answer for
//! a configured question. Matching is keyword and pattern based; anything it
//! produces is unscored.

use std::sync::OnceLock;

use regex::Regex;

pub const NOT_ANSWERED: &str = "Not answered";

const AGENT_ROLES: &[&str] = &["agent", "assistant", "ai", "bot"];
const SYMPTOMS: &[(&[&str], &str)] = &[
    (&["headache"], "headaches"),
    (&["dizziness", "dizzy"], "dizziness"),
    (&["swelling", "swollen"], "swelling"),
    (&["fatigue", "tired"], "fatigue"),
    (&["nausea"], "nausea"),
];

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

fn name_patterns() -> &'static [Regex] {
    static CELL: OnceLock<Vec<Regex>> = OnceLock::new();
    CELL.get_or_init(|| {
        compile(&[
            r"my name is ([^.!?\n,]+)",
            r"call me ([^.!?\n,]+)",
            r"\bi'm ([^.!?\n,]+)",
            r"\bi am ([^.!?\n,]+)",
        ])
    })
}

fn email_pattern() -> &'static [Regex] {
    static CELL: OnceLock<Vec<Regex>> = OnceLock::new();
    CELL.get_or_init(|| compile(&[r"([a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,})"]))
}

fn rating_patterns() -> &'static [Regex] {
    static CELL: OnceLock<Vec<Regex>> = OnceLock::new();
    CELL.get_or_init(|| {
        compile(&[
            r"(\d+)\s*out of\s*\d+",
            r"(\d+)\s*/\s*\d+",
            r"rate.*?(\d+)",
            r"(\d+)\s*(?:stars?|points?)",
            r"scale.*?(\d+)",
            r"feeling.*?(\d+)",
            r"\b(\d+)\b",
        ])
    })
}

fn frequency_patterns() -> &'static [Regex] {
    static CELL: OnceLock<Vec<Regex>> = OnceLock::new();
    CELL.get_or_init(|| {
        compile(&[
            r"(\d+\s*times?\s*(?:a|per)\s*(?:day|week|month))",
            r"((?:every|each)\s*\w+)",
            r"\b(daily|weekly|monthly|rarely|never|always|often|sometimes)\b",
        ])
    })
}

fn medication_classes() -> &'static [(Regex, &'static str)] {
    static CELL: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    CELL.get_or_init(|| {
        [
            (
                r"\b(sometimes|occasionally|forget|forgot)\b",
                "Taking inconsistently",
            ),
            (r"\b(stopped|not taking|quit)\b", "No, not taking medication"),
            (
                r"\b(yes|taking|keep up|keeping up|continue|prescribed)\b",
                "Yes, taking as prescribed",
            ),
            (r"\bno\b", "No, not taking medication"),
        ]
        .into_iter()
        .filter_map(|(p, label)| Regex::new(p).ok().map(|re| (re, label)))
        .collect()
    })
}

fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

/// Text spoken by the person called.
///
/// Transcripts with `role: text` lines are reduced to the non-agent lines so
/// the agent's own introduction is not mistaken for an answer.
pub fn respondent_text(transcript: &str) -> String {
    let mut saw_roles = false;
    let mut respondent = Vec::new();

    for line in transcript.lines() {
        let Some((role, body)) = line.split_once(':') else {
            continue;
        };
        let role = role.trim().to_lowercase();
        if role.is_empty() || role.contains(' ') {
            continue;
        }
        saw_roles = true;
        if !AGENT_ROLES.contains(&role.as_str()) {
            respondent.push(body.trim());
        }
    }

    if saw_roles {
        respondent.join("\n")
    } else {
        transcript.to_string()
    }
}

/// Best-effort answer to `question` found in `transcript`
pub fn extract_answer(question: &str, transcript: &str) -> String {
    let text = respondent_text(transcript);
    let lower = text.to_lowercase();
    let q = question.to_lowercase();

    let answer = if q.contains("name") {
        first_capture(name_patterns(), &lower)
    } else if q.contains("email") {
        first_capture(email_pattern(), &text)
    } else if contains_any(&q, &["satisfied", "satisfaction", "rating", "scale"]) {
        first_capture(rating_patterns(), &lower).map(|n| format!("{}/10", n))
    } else if contains_any(&q, &["medication", "medicine", "lisinopril", "losartan"]) {
        medication_classes()
            .iter()
            .find(|(re, _)| re.is_match(&lower))
            .map(|(_, label)| label.to_string())
    } else if q.contains("symptom") {
        let found: Vec<&str> = SYMPTOMS
            .iter()
            .filter(|(words, _)| contains_any(&lower, words))
            .map(|(_, label)| *label)
            .collect();
        Some(if found.is_empty() {
            "No specific symptoms mentioned".to_string()
        } else {
            found.join(", ")
        })
    } else if q.contains("how often") || q.contains("frequency") {
        first_capture(frequency_patterns(), &lower)
    } else {
        None
    };

    answer
        .or_else(|| keyword_fallback(&q, &lower))
        .unwrap_or_else(|| NOT_ANSWERED.to_string())
}

/// Rest of the sentence following the first significant question word
fn keyword_fallback(question: &str, text: &str) -> Option<String> {
    question
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.len() > 3)
        .find_map(|word| {
            let re = Regex::new(&format!(r"{}[^.!?\n]*?([^.!?\n]+)", regex::escape(word))).ok()?;
            let captured = re.captures(text)?.get(1)?.as_str().trim();
            (captured.len() > 5).then(|| captured.chars().take(100).collect())
        })
}
