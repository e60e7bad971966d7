//! Extraction of typed decisions from free-form model output.
//!
//! Everything that reads model text goes through this module: the ReAct
//! markers (`Thought:` / `Action:` / `Action Input:` / `Final Answer:`),
//! hypothesis lists (JSON preferred, labelled blocks as fallback) and the
//! labelled verdicts produced by the evaluation prompt. Labels accept either
//! `:` or the full-width `：` and are matched case-insensitively.

use rootcause_core::{HypothesisStatus, ToolAction, ToolParameters};
use serde_json::Value;
use std::sync::LazyLock;

static THOUGHT_MARKER: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)\bthought\s*[:：]").expect("thought marker regex")
});
static ACTION_MARKER: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)\baction\s*[:：]").expect("action marker regex")
});
static ACTION_INPUT_MARKER: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)\baction\s+input\s*[:：]").expect("action input marker regex")
});
static FINAL_ANSWER_MARKER: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)\bfinal\s+answer\s*[:：]").expect("final answer marker regex")
});
static STATUS_LABEL: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?im)^[\s*_#>-]*(?:status|verdict|状態|判定)[\s*_]*[:：][\s*_]*(.+)$")
        .expect("status label regex")
});
static CONFIDENCE_LABEL: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?im)^[\s*_#>-]*(?:confidence|certainty|確信度|信頼度)[\s*_]*[:：][\s*_]*(.+)$",
    )
    .expect("confidence label regex")
});
static NEGATED_AFFIRMATIVE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"\b(?:not|un|no|never)\s*(?:been\s+|yet\s+)?(?:confirm|verifi|true|likely|support|validat|proven)",
    )
    .expect("negated affirmative regex")
});
static REASONING_LABEL: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?im)^[\s*_#>-]*(?:reasoning|rationale|explanation|根拠|理由)[\s*_]*[:：][\s*_]*",
    )
    .expect("reasoning label regex")
});
static HYPOTHESIS_LINE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"(?i)^[\s*_#>-]*(?:\d+[.)]\s*)?(hypothesis(?:\s*#?\d+)?|description|cause|仮説(?:\s*\d+)?|confidence|certainty|確信度|信頼度|reasoning|rationale|根拠|理由)[\s*_]*[:：][\s*_]*(.*)$",
    )
    .expect("hypothesis block regex")
});
static CONFIDENCE_NUMBER: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(-?\d+(?:\.\d+)?)\s*(%)?").expect("confidence number regex")
});
static CONFIDENCE_LEVEL: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)\b(high|medium|moderate|low)\b").expect("confidence level regex")
});

/// What the model decided during a `Thinking` turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ReactDecision {
    Action { thought: String, action: ToolAction },
    FinalAnswer { thought: String, answer: String },
    /// Neither marker was usable. The engine records the thought and
    /// completes rather than guessing.
    Malformed { thought: String, reason: String },
}

pub fn parse_react_response(text: &str) -> ReactDecision {
    let action_at = ACTION_MARKER.find(text);
    let final_at = FINAL_ANSWER_MARKER.find(text);
    let decision_start = match (action_at, final_at) {
        (Some(a), Some(f)) => Some(a.start().min(f.start())),
        (Some(a), None) => Some(a.start()),
        (None, Some(f)) => Some(f.start()),
        (None, None) => None,
    };
    let thought = extract_thought(text, decision_start);

    match (action_at, final_at) {
        (Some(f_action), Some(f_final)) if f_final.start() < f_action.start() => {
            final_decision(thought, &text[f_final.end()..])
        }
        (None, Some(f_final)) => final_decision(thought, &text[f_final.end()..]),
        (Some(f_action), _) => action_decision(thought, text, f_action.end()),
        (None, None) => ReactDecision::Malformed {
            thought,
            reason: "response contains neither an Action nor a Final Answer".to_string(),
        },
    }
}

fn extract_thought(text: &str, decision_start: Option<usize>) -> String {
    let end = decision_start.unwrap_or(text.len());
    let head = &text[..end];
    let body = match THOUGHT_MARKER.find(head) {
        Some(m) => &head[m.end()..],
        None => head,
    };
    body.trim().to_string()
}

fn final_decision(thought: String, rest: &str) -> ReactDecision {
    let answer = rest.trim();
    if answer.is_empty() {
        return ReactDecision::Malformed {
            thought,
            reason: "final answer is empty".to_string(),
        };
    }
    ReactDecision::FinalAnswer {
        thought,
        answer: answer.to_string(),
    }
}

fn action_decision(thought: String, text: &str, name_start: usize) -> ReactDecision {
    let after = &text[name_start..];
    let input_marker = ACTION_INPUT_MARKER.find(after);
    let name_region = match input_marker {
        Some(m) => &after[..m.start()],
        None => after,
    };
    let tool = name_region
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(clean_tool_name)
        .unwrap_or_default();
    if tool.is_empty() {
        return ReactDecision::Malformed {
            thought,
            reason: "action is missing a tool name".to_string(),
        };
    }

    let parameters = match input_marker {
        None => ToolParameters::new(),
        Some(m) => {
            let raw = after[m.end()..].trim();
            if raw.is_empty() {
                ToolParameters::new()
            } else {
                match extract_json_object(raw)
                    .and_then(|obj| serde_json::from_str::<Value>(obj).ok())
                {
                    Some(Value::Object(map)) => map,
                    _ => {
                        return ReactDecision::Malformed {
                            thought,
                            reason: format!("action input for '{tool}' is not a JSON object"),
                        };
                    }
                }
            }
        }
    };

    ReactDecision::Action {
        thought,
        action: ToolAction::new(tool, parameters),
    }
}

fn clean_tool_name(line: &str) -> String {
    let stripped = line.trim_matches(|c: char| matches!(c, '`' | '"' | '\'' | '[' | ']' | '*'));
    stripped
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default()
        .trim_matches(|c: char| matches!(c, '`' | '"' | '\'' | '[' | ']' | '*'))
        .to_string()
}

/// Text the model offered as its conclusion in a closing turn, if usable.
///
/// `Final Answer:` wins; a reply that merely proposes another tool call is
/// not an answer.
pub fn extract_closing_answer(text: &str) -> Option<String> {
    if let Some(m) = FINAL_ANSWER_MARKER.find(text) {
        let answer = text[m.end()..].trim();
        return (!answer.is_empty()).then(|| answer.to_string());
    }
    if ACTION_MARKER.is_match(text) {
        return None;
    }
    let answer = text.trim();
    (!answer.is_empty()).then(|| answer.to_string())
}

/// Extract the first valid JSON object from freeform text.
///
/// Handles markdown fences and commentary around the object.
pub fn extract_json_object(text: &str) -> Option<&str> {
    extract_balanced(text, b'{', b'}')
}

pub fn extract_json_array(text: &str) -> Option<&str> {
    extract_balanced(text, b'[', b']')
}

fn extract_balanced(text: &str, open: u8, close: u8) -> Option<&str> {
    let cleaned = strip_code_fences(text);
    let bytes = cleaned.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != open {
            continue;
        }
        if let Some(end) = find_matching(cleaned, i, open, close) {
            let candidate = &cleaned[i..=end];
            if serde_json::from_str::<Value>(candidate).is_ok() {
                return Some(candidate);
            }
        }
    }
    None
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    for fence in ["```json", "```"] {
        if let Some(inner) = trimmed
            .strip_prefix(fence)
            .and_then(|rest| rest.strip_suffix("```"))
        {
            return inner.trim();
        }
    }
    trimmed
}

/// Index of the byte closing the bracket opened at `start`, skipping strings.
fn find_matching(text: &str, start: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, &b) in text.as_bytes().iter().enumerate().skip(start) {
        if escape_next {
            escape_next = false;
            continue;
        }
        if b == b'\\' && in_string {
            escape_next = true;
            continue;
        }
        if b == b'"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Candidate root cause as read from the generation reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedHypothesis {
    pub description: String,
    pub confidence: f64,
    pub reasoning: String,
}

const DEFAULT_HYPOTHESIS_CONFIDENCE: f64 = 0.5;

pub fn parse_hypotheses(text: &str) -> Vec<ParsedHypothesis> {
    let from_json = parse_hypotheses_json(text);
    if !from_json.is_empty() {
        return from_json;
    }
    parse_hypotheses_blocks(text)
}

fn parse_hypotheses_json(text: &str) -> Vec<ParsedHypothesis> {
    let items = match extract_json_array(text).and_then(|raw| serde_json::from_str::<Value>(raw).ok())
    {
        Some(Value::Array(items)) => items,
        _ => match extract_json_object(text).and_then(|raw| serde_json::from_str::<Value>(raw).ok())
        {
            Some(Value::Object(mut obj)) => match obj.remove("hypotheses") {
                Some(Value::Array(items)) => items,
                _ => return Vec::new(),
            },
            _ => return Vec::new(),
        },
    };

    items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let description = ["description", "hypothesis", "cause", "title"]
                .iter()
                .find_map(|key| obj.get(*key).and_then(Value::as_str))
                .map(str::trim)
                .filter(|d| !d.is_empty())?;
            let confidence = obj
                .get("confidence")
                .and_then(|v| match v {
                    Value::Number(n) => n.as_f64().map(|f| normalize_number(f, false)),
                    Value::String(s) => normalize_confidence(s),
                    _ => None,
                })
                .unwrap_or(DEFAULT_HYPOTHESIS_CONFIDENCE);
            let reasoning = ["reasoning", "rationale", "evidence"]
                .iter()
                .find_map(|key| obj.get(*key).and_then(Value::as_str))
                .unwrap_or_default()
                .trim()
                .to_string();
            Some(ParsedHypothesis {
                description: description.to_string(),
                confidence,
                reasoning,
            })
        })
        .collect()
}

#[derive(Default)]
struct BlockDraft {
    description: Option<String>,
    confidence: Option<f64>,
    reasoning: Vec<String>,
}

impl BlockDraft {
    fn finish(self) -> Option<ParsedHypothesis> {
        let description = self.description.filter(|d| !d.is_empty())?;
        Some(ParsedHypothesis {
            description,
            confidence: self.confidence.unwrap_or(DEFAULT_HYPOTHESIS_CONFIDENCE),
            reasoning: self.reasoning.join(" "),
        })
    }
}

fn parse_hypotheses_blocks(text: &str) -> Vec<ParsedHypothesis> {
    let mut out = Vec::new();
    let mut draft = BlockDraft::default();

    for line in text.lines() {
        let Some(caps) = HYPOTHESIS_LINE.captures(line) else {
            continue;
        };
        let label = caps[1].to_lowercase();
        let value = caps
            .get(2)
            .map(|m| m.as_str().trim().trim_matches('*').trim())
            .unwrap_or_default();

        if label.starts_with("hypothesis")
            || label.starts_with("仮説")
            || label == "description"
            || label == "cause"
        {
            if label.starts_with("hypothesis") || label.starts_with("仮説") {
                // A numbered heading always opens a new block.
                if draft.description.is_some() {
                    out.extend(std::mem::take(&mut draft).finish());
                }
                if !value.is_empty() {
                    draft.description = Some(value.to_string());
                }
            } else if draft.description.is_some() && !value.is_empty() {
                let previous = std::mem::take(&mut draft);
                out.extend(previous.finish());
                draft.description = Some(value.to_string());
            } else if !value.is_empty() {
                draft.description = Some(value.to_string());
            }
        } else if matches!(label.as_str(), "confidence" | "certainty" | "確信度" | "信頼度") {
            draft.confidence = normalize_confidence(value);
        } else if !value.is_empty() {
            draft.reasoning.push(value.to_string());
        }
    }
    out.extend(draft.finish());
    out
}

/// Verdict read from an evaluation reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvaluation {
    pub status: HypothesisStatus,
    pub confidence: f64,
    pub reasoning: String,
}

const INCONCLUSIVE_PHRASES: &[&str] = &[
    "inconclusive",
    "unconfirmed",
    "not confirmed",
    "unverified",
    "not verified",
    "unproven",
    "not proven",
    "cannot confirm",
    "can't confirm",
    "undetermined",
    "uncertain",
    "unclear",
    "insufficient",
    "unknown",
    "未確認",
    "未検証",
    "確認できない",
    "確認できず",
    "不明",
    "判断できない",
    "保留",
];
const NEGATIVE_PHRASES: &[&str] = &[
    "rejected",
    "reject",
    "refuted",
    "disproved",
    "untrue",
    "false",
    "not supported",
    "unsupported",
    "unlikely",
    "ruled out",
    "否定",
    "棄却",
    "誤り",
];
const AFFIRMATIVE_PHRASES: &[&str] = &[
    "confirmed",
    "confirm",
    "verified",
    "supported",
    "validated",
    "true",
    "likely",
    "確認",
    "肯定",
    "支持",
];

/// Map a status label value onto a hypothesis status.
///
/// Inconclusive phrases are checked first so that "not confirmed" or
/// "未確認" never read as a confirmation. A negated affirmative that is not
/// itself a rejection ("not true", "not likely") is inconclusive.
pub fn classify_status(value: &str) -> HypothesisStatus {
    let lowered = value.to_lowercase();
    let contains_any = |phrases: &[&str]| phrases.iter().any(|p| lowered.contains(p));
    if contains_any(INCONCLUSIVE_PHRASES) {
        HypothesisStatus::Inconclusive
    } else if contains_any(NEGATIVE_PHRASES) {
        HypothesisStatus::Rejected
    } else if NEGATED_AFFIRMATIVE.is_match(&lowered) {
        HypothesisStatus::Inconclusive
    } else if contains_any(AFFIRMATIVE_PHRASES) {
        HypothesisStatus::Confirmed
    } else {
        HypothesisStatus::Inconclusive
    }
}

/// Normalise a confidence value to `[0, 1]`.
///
/// Numbers above 1 (or with a `%` sign) are percentages. Textual levels map
/// to fixed values. Returns `None` when nothing usable is present.
pub fn normalize_confidence(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if let Some(caps) = CONFIDENCE_NUMBER.captures(trimmed)
        && let Ok(value) = caps[1].parse::<f64>()
    {
        return Some(normalize_number(value, caps.get(2).is_some()));
    }
    if let Some(caps) = CONFIDENCE_LEVEL.captures(trimmed) {
        return Some(match caps[1].to_ascii_lowercase().as_str() {
            "high" => 0.8,
            "low" => 0.2,
            _ => 0.5,
        });
    }
    if trimmed.contains('高') {
        Some(0.8)
    } else if trimmed.contains('中') {
        Some(0.5)
    } else if trimmed.contains('低') {
        Some(0.2)
    } else {
        None
    }
}

fn normalize_number(value: f64, percent: bool) -> f64 {
    let scaled = if percent || value > 1.0 {
        value / 100.0
    } else {
        value
    };
    scaled.clamp(0.0, 1.0)
}

pub fn parse_evaluation(text: &str, prior_confidence: f64) -> ParsedEvaluation {
    let status = STATUS_LABEL
        .captures(text)
        .map(|caps| classify_status(&caps[1]))
        .unwrap_or(HypothesisStatus::Inconclusive);
    let confidence = CONFIDENCE_LABEL
        .captures(text)
        .and_then(|caps| normalize_confidence(&caps[1]))
        .unwrap_or_else(|| prior_confidence.clamp(0.0, 1.0));
    let reasoning = match REASONING_LABEL.find(text) {
        Some(m) => text[m.end()..].trim(),
        None => text.trim(),
    };
    ParsedEvaluation {
        status,
        confidence,
        reasoning: reasoning.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_action_with_json_input() {
        let text = "Thought: latency points at the database\nAction: metrics_tool\nAction Input: {\"service\": \"checkout\", \"window\": {\"minutes\": 30}}\nObservation: (pending)";
        match parse_react_response(text) {
            ReactDecision::Action { thought, action } => {
                assert_eq!(thought, "latency points at the database");
                assert_eq!(action.tool, "metrics_tool");
                assert_eq!(action.parameters["service"], json!("checkout"));
                assert_eq!(action.parameters["window"]["minutes"], json!(30));
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn action_input_inside_code_fence() {
        let text = "Thought: check logs\nAction: `logs_tool`\nAction Input:\n```json\n{\"query\": \"timeout\"}\n```";
        match parse_react_response(text) {
            ReactDecision::Action { action, .. } => {
                assert_eq!(action.tool, "logs_tool");
                assert_eq!(action.parameters["query"], json!("timeout"));
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn action_without_input_has_empty_parameters() {
        match parse_react_response("Thought: list deploys\nAction: deploy_history") {
            ReactDecision::Action { action, .. } => {
                assert_eq!(action.tool, "deploy_history");
                assert!(action.parameters.is_empty());
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn unparseable_input_is_malformed() {
        let decision =
            parse_react_response("Thought: x\nAction: metrics_tool\nAction Input: service=checkout");
        assert!(matches!(decision, ReactDecision::Malformed { .. }));
    }

    #[test]
    fn parses_final_answer_with_fullwidth_colon() {
        match parse_react_response("Thought：証拠は十分\nFinal Answer：DB接続プールの枯渇") {
            ReactDecision::FinalAnswer { thought, answer } => {
                assert_eq!(thought, "証拠は十分");
                assert_eq!(answer, "DB接続プールの枯渇");
            }
            other => panic!("expected final answer, got {other:?}"),
        }
    }

    #[test]
    fn earliest_marker_wins() {
        let text = "Thought: done\nFinal Answer: pool exhausted\nAction: metrics_tool";
        assert!(matches!(
            parse_react_response(text),
            ReactDecision::FinalAnswer { .. }
        ));
        let text = "Thought: more\nAction: metrics_tool\nAction Input: {}\nFinal Answer: guess";
        assert!(matches!(
            parse_react_response(text),
            ReactDecision::Action { .. }
        ));
    }

    #[test]
    fn prose_without_markers_is_malformed_and_keeps_thought() {
        match parse_react_response("I think it is the network.") {
            ReactDecision::Malformed { thought, .. } => {
                assert_eq!(thought, "I think it is the network.");
            }
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn closing_answer_rejects_tool_calls() {
        assert_eq!(
            extract_closing_answer("Final Answer: disk full"),
            Some("disk full".to_string())
        );
        assert_eq!(
            extract_closing_answer("The disk filled up."),
            Some("The disk filled up.".to_string())
        );
        assert_eq!(
            extract_closing_answer("Action: metrics_tool\nAction Input: {}"),
            None
        );
        assert_eq!(extract_closing_answer("   "), None);
    }

    #[test]
    fn extract_json_object_skips_invalid_braces() {
        let text = "use {braces} then {\"a\": \"}\"}";
        assert_eq!(extract_json_object(text), Some("{\"a\": \"}\"}"));
    }

    #[test]
    fn hypotheses_from_json_array() {
        let text = r#"Here are my candidates:
```json
[
  {"description": "connection pool exhausted", "confidence": 0.7, "reasoning": "timeouts"},
  {"description": "bad deploy", "confidence": "85%"},
  {"description": "", "confidence": 0.9}
]
```"#;
        let parsed = parse_hypotheses(text);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].description, "connection pool exhausted");
        assert_eq!(parsed[0].reasoning, "timeouts");
        assert!((parsed[1].confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn hypotheses_from_wrapped_object() {
        let text = r#"{"hypotheses": [{"hypothesis": "DNS failure", "confidence": 40}]}"#;
        let parsed = parse_hypotheses(text);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].description, "DNS failure");
        assert!((parsed[0].confidence - 0.4).abs() < 1e-9);
    }

    #[test]
    fn hypotheses_from_labelled_blocks() {
        let text = "Hypothesis 1: Database connection pool exhausted\nConfidence: 70%\nReasoning: errors mention pool timeouts\n\nHypothesis 2: Recent deploy regressed a query\nConfidence: low\nReasoning: deploy at 14:00";
        let parsed = parse_hypotheses(text);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].description, "Database connection pool exhausted");
        assert!((parsed[0].confidence - 0.7).abs() < 1e-9);
        assert_eq!(parsed[1].reasoning, "deploy at 14:00");
        assert!((parsed[1].confidence - 0.2).abs() < 1e-9);
    }

    #[test]
    fn hypotheses_from_japanese_blocks() {
        let text = "仮説1：ディスク容量不足\n確信度：高\n根拠：書き込みエラー";
        let parsed = parse_hypotheses(text);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].description, "ディスク容量不足");
        assert!((parsed[0].confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn nothing_parseable_yields_no_hypotheses() {
        assert!(parse_hypotheses("I am not sure what happened.").is_empty());
    }

    #[test]
    fn confidence_normalisation() {
        assert_eq!(normalize_confidence("85"), Some(0.85));
        assert_eq!(normalize_confidence("0.4"), Some(0.4));
        assert_eq!(normalize_confidence("140"), Some(1.0));
        assert_eq!(normalize_confidence("60%"), Some(0.6));
        assert_eq!(normalize_confidence("1"), Some(1.0));
        assert_eq!(normalize_confidence("-3"), Some(0.0));
        assert_eq!(normalize_confidence("High"), Some(0.8));
        assert_eq!(normalize_confidence("moderate"), Some(0.5));
        assert_eq!(normalize_confidence("低い"), Some(0.2));
        assert_eq!(normalize_confidence("n/a"), None);
    }

    #[test]
    fn status_classification_prefers_inconclusive_then_negative() {
        assert_eq!(classify_status("Confirmed"), HypothesisStatus::Confirmed);
        assert_eq!(classify_status("not confirmed"), HypothesisStatus::Inconclusive);
        assert_eq!(classify_status("未確認"), HypothesisStatus::Inconclusive);
        assert_eq!(classify_status("確認済み"), HypothesisStatus::Confirmed);
        assert_eq!(classify_status("unlikely"), HypothesisStatus::Rejected);
        assert_eq!(classify_status("REJECTED"), HypothesisStatus::Rejected);
        assert_eq!(classify_status("棄却"), HypothesisStatus::Rejected);
        assert_eq!(classify_status("maybe"), HypothesisStatus::Inconclusive);
    }

    #[test]
    fn negated_affirmatives_never_confirm() {
        for value in [
            "unverified",
            "Not verified",
            "not true",
            "not likely",
            "unproven",
            "not yet confirmed",
            "no, cannot confirm",
            "never validated",
            "未検証",
            "確認できない",
        ] {
            assert_eq!(
                classify_status(value),
                HypothesisStatus::Inconclusive,
                "{value}"
            );
        }
        assert_eq!(classify_status("not supported"), HypothesisStatus::Rejected);
        assert_eq!(classify_status("verified"), HypothesisStatus::Confirmed);
        assert_eq!(classify_status("likely true"), HypothesisStatus::Confirmed);

        let parsed =
            parse_evaluation("Status: unverified\nConfidence: 0.3\nReasoning: no logs", 0.5);
        assert_eq!(parsed.status, HypothesisStatus::Inconclusive);
    }

    #[test]
    fn evaluation_labels_in_english_and_japanese() {
        let english = "**Status:** confirmed\n**Confidence:** 90\nReasoning: pool metrics match the spike";
        let parsed = parse_evaluation(english, 0.3);
        assert_eq!(parsed.status, HypothesisStatus::Confirmed);
        assert!((parsed.confidence - 0.9).abs() < 1e-9);
        assert_eq!(parsed.reasoning, "pool metrics match the spike");

        let japanese = "判定：否定\n信頼度：0.7\n理由：デプロイは無関係";
        let parsed = parse_evaluation(japanese, 0.3);
        assert_eq!(parsed.status, HypothesisStatus::Rejected);
        assert!((parsed.confidence - 0.7).abs() < 1e-9);
        assert_eq!(parsed.reasoning, "デプロイは無関係");
    }

    #[test]
    fn evaluation_defaults_to_prior_confidence_and_inconclusive() {
        let parsed = parse_evaluation("The data was ambiguous.", 0.45);
        assert_eq!(parsed.status, HypothesisStatus::Inconclusive);
        assert!((parsed.confidence - 0.45).abs() < 1e-9);
        assert_eq!(parsed.reasoning, "The data was ambiguous.");
    }
}
