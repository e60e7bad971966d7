use anyhow::Result;
use rootcause_core::AppConfig;
use serde::Serialize;
use serde_json::json;

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

pub(crate) fn redact_config_for_display(cfg: &AppConfig) -> Result<serde_json::Value> {
    let mut value = serde_json::to_value(cfg)?;
    if let Some(llm) = value.get_mut("llm").and_then(|entry| entry.as_object_mut())
        && llm.get("api_key").is_some_and(|key| !key.is_null())
    {
        llm.insert("api_key".to_string(), json!("***REDACTED***"));
    }
    Ok(value)
}

/// Shorten `text` to `max` characters for table cells.
pub(crate) fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_is_redacted_only_when_set() {
        let mut cfg = AppConfig::default();
        let shown = redact_config_for_display(&cfg).expect("redact");
        assert!(shown["llm"]["api_key"].is_null());

        cfg.llm.api_key = Some("sk-secret".to_string());
        let shown = redact_config_for_display(&cfg).expect("redact");
        assert_eq!(shown["llm"]["api_key"], "***REDACTED***");
        assert!(!shown.to_string().contains("sk-secret"));
    }

    #[test]
    fn clip_marks_truncation() {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("a much longer sentence", 10), "a much ...");
    }
}
