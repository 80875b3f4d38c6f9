//! Test-taker identity normalization.
//!
//! Raw agent names ("HAL Generalist Agent (o4-mini High)") and model strings
//! ("openrouter/anthropic/claude-3.7-sonnet-20250219") collapse into one
//! `scaffold:model[_effort...]` key. The mapping is a pure function of the
//! raw pair and the injected [`NormalizerConfig`]; it never fails.

use crate::config::{ModelAlias, NormalizerConfig};
use crate::error::ConfigError;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CanonicalIdentity {
    pub scaffold: String,
    pub model: String,
    pub reasoning_effort: BTreeSet<String>,
}

impl CanonicalIdentity {
    pub fn test_taker_id(&self) -> String {
        format!("{}:{}", self.scaffold, self.model_key())
    }

    /// Model segment of the id: model name followed by the sorted efforts.
    pub fn model_key(&self) -> String {
        let mut key = self.model.clone();
        for effort in &self.reasoning_effort {
            key.push('_');
            key.push_str(effort);
        }
        key
    }
}

impl fmt::Display for CanonicalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.test_taker_id())
    }
}

const MAX_RESOLVE_PASSES: usize = 8;
/// Spreadsheet exports spell a missing model as `nan`.
const MISSING_MARKER: &str = "nan";

struct CompiledScaffold {
    regex: Regex,
    tag: String,
}

struct CompiledEffort {
    regex: Regex,
    tag: String,
}

struct CompiledRewrite {
    regex: Regex,
    replacement: String,
}

pub struct NameNormalizer {
    scaffolds: Vec<CompiledScaffold>,
    efforts: Vec<CompiledEffort>,
    canonical_prefixes: Vec<String>,
    rewrites: Vec<CompiledRewrite>,
    aliases: BTreeMap<String, ModelAlias>,
    unknown_model: String,
    date: Regex,
    paren: Regex,
}

impl NameNormalizer {
    pub fn new(config: NormalizerConfig) -> Result<Self, ConfigError> {
        config.check_schema_version()?;

        let mut scaffolds = Vec::with_capacity(config.scaffold_patterns.len());
        for entry in config.scaffold_patterns {
            if canonicalize(&entry.tag).is_empty() {
                return Err(ConfigError::EmptyScaffoldTag(entry.pattern));
            }
            scaffolds.push(CompiledScaffold {
                regex: compile("scaffold", &entry.pattern)?,
                tag: entry.tag,
            });
        }

        let mut efforts = Vec::with_capacity(config.effort_keywords.len());
        for entry in config.effort_keywords {
            let words: Vec<String> = entry
                .keyword
                .to_lowercase()
                .split_whitespace()
                .map(regex::escape)
                .collect();
            if words.is_empty() || canonicalize(&entry.tag).is_empty() {
                return Err(ConfigError::EmptyEffortKeyword(entry.keyword));
            }
            efforts.push(CompiledEffort {
                regex: compile("effort", &words.join("[^a-z0-9]+"))?,
                tag: entry.tag,
            });
        }

        let mut rewrites = Vec::with_capacity(config.rewrites.len());
        for rule in config.rewrites {
            rewrites.push(CompiledRewrite {
                regex: compile("rewrite", &rule.pattern)?,
                replacement: rule.replacement,
            });
        }

        for (alias, target) in &config.model_aliases {
            if let Some(date) = &target.release_date {
                if parse_release_date(date).is_none() {
                    return Err(ConfigError::InvalidReleaseDate {
                        alias: alias.clone(),
                        value: date.clone(),
                    });
                }
            }
        }

        Ok(Self {
            scaffolds,
            efforts,
            canonical_prefixes: config.canonical_prefixes,
            rewrites,
            aliases: config.model_aliases,
            unknown_model: config.unknown_model,
            date: compile(
                "date",
                r"(?:^|[^0-9])(202[0-9])[-_/]?([01][0-9])[-_/]?([0-3][0-9])(?:[^0-9]|$)",
            )?,
            paren: compile("paren", r"\((.*?)\)")?,
        })
    }

    pub fn unknown_model(&self) -> &str {
        &self.unknown_model
    }

    pub fn normalize(&self, scaffold_raw: &str, model_raw: Option<&str>) -> CanonicalIdentity {
        let scaffold = self.resolve_scaffold(scaffold_raw);
        let model_text = self.model_source(scaffold_raw, model_raw);

        let mut reasoning_effort = self.extract_efforts(scaffold_raw);
        let model = self.resolve_model(&model_text, &mut reasoning_effort);

        CanonicalIdentity {
            scaffold,
            model,
            reasoning_effort,
        }
    }

    /// Model segment (name plus efforts) for a bare model string.
    pub fn normalize_model(&self, model_raw: &str) -> String {
        let mut efforts = BTreeSet::new();
        let model = self.resolve_model(model_raw, &mut efforts);
        CanonicalIdentity {
            scaffold: String::new(),
            model,
            reasoning_effort: efforts,
        }
        .model_key()
    }

    /// Re-normalizes a stored row key. Accepts canonical `scaffold:model` ids,
    /// legacy `Agent__model` keys, and legacy `<scaffold>_<model>` keys whose
    /// scaffold prefix is recognizable.
    pub fn parse_row_key(&self, key: &str) -> CanonicalIdentity {
        let key = key.trim();
        if let Some((scaffold, model)) = key.split_once(':') {
            return self.normalize(scaffold, Some(model));
        }
        if key.contains("__") {
            let parts: Vec<&str> = key.split("__").collect();
            let model = parts.last().copied().filter(|m| !m.trim().is_empty());
            return self.normalize(parts[0], model);
        }
        if !key.contains('(') {
            if let Some((scaffold, model)) = self.split_scaffold_prefix(key) {
                return self.normalize(&scaffold, Some(&model));
            }
        }
        self.normalize(key, None)
    }

    /// Empty scaffolds and all-sentinel identities carry no test-taker.
    pub fn is_degenerate(&self, identity: &CanonicalIdentity) -> bool {
        identity.scaffold.is_empty()
            || (identity.scaffold == self.unknown_model
                && identity.model == self.unknown_model
                && identity.reasoning_effort.is_empty())
    }

    /// Declared position of a scaffold tag; undeclared tags rank last.
    pub fn scaffold_priority(&self, tag: &str) -> usize {
        self.scaffolds
            .iter()
            .position(|s| s.tag == tag)
            .unwrap_or(self.scaffolds.len())
    }

    pub fn resolve_scaffold(&self, scaffold_raw: &str) -> String {
        let lower = scaffold_raw.to_lowercase();
        for entry in &self.scaffolds {
            if entry.regex.is_match(&lower) {
                return entry.tag.clone();
            }
        }
        let head = match scaffold_raw.find('(') {
            Some(idx) => &scaffold_raw[..idx],
            None => scaffold_raw,
        };
        canonicalize(head)
    }

    fn model_source(&self, scaffold_raw: &str, model_raw: Option<&str>) -> String {
        if let Some(raw) = model_raw {
            let trimmed = raw.trim();
            if !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case(MISSING_MARKER) {
                return trimmed.to_string();
            }
        }
        self.paren
            .captures(scaffold_raw)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.unknown_model.clone())
    }

    fn extract_efforts(&self, text: &str) -> BTreeSet<String> {
        let lower = text.to_lowercase();
        self.efforts
            .iter()
            .filter(|e| e.regex.is_match(&lower))
            .map(|e| e.tag.clone())
            .collect()
    }

    /// Resolves until the name stops changing, so a resolved `name[_date]` plus
    /// its efforts resolves to itself when a stored id is parsed again.
    fn resolve_model(&self, model_text: &str, efforts: &mut BTreeSet<String>) -> String {
        let mut model = self.resolve_model_once(model_text, efforts);
        for _ in 0..MAX_RESOLVE_PASSES {
            let key = CanonicalIdentity {
                scaffold: String::new(),
                model: model.clone(),
                reasoning_effort: efforts.clone(),
            }
            .model_key();
            let next = self.resolve_model_once(&key, efforts);
            if next == model {
                break;
            }
            model = next;
        }
        model
    }

    fn resolve_model_once(&self, model_text: &str, efforts: &mut BTreeSet<String>) -> String {
        let mut text = model_text.trim().to_lowercase();
        for effort in &self.efforts {
            if effort.regex.is_match(&text) {
                efforts.insert(effort.tag.clone());
                text = effort.regex.replace_all(&text, " ").into_owned();
            }
        }

        // Dates may use `/`, so they come out before the provider path is cut.
        let (text, mut date) = self.extract_date(&text);
        let slug = text.rsplit('/').next().unwrap_or("");
        let mut name = canonicalize(slug);

        while let Some(rest) = self
            .canonical_prefixes
            .iter()
            .find_map(|prefix| name.strip_prefix(prefix.as_str()).filter(|r| !r.is_empty()))
        {
            name = rest.to_string();
        }
        for rule in &self.rewrites {
            name = rule
                .regex
                .replace(&name, rule.replacement.as_str())
                .into_owned();
        }
        if let Some(alias) = self.aliases.get(&name) {
            name = alias.canonical.clone();
            if date.is_none() {
                date = alias.release_date.clone();
            }
        }

        if name.is_empty() || name == MISSING_MARKER {
            name = self.unknown_model.clone();
        }
        match date {
            Some(date) => format!("{}_{}", name, date),
            None => name,
        }
    }

    /// Removes the last valid calendar date and returns it as `YYYY_MM_DD`.
    /// Taking the last one keeps the reattached trailing date a fixed point.
    fn extract_date(&self, text: &str) -> (String, Option<String>) {
        let mut found: Option<(usize, usize, String)> = None;
        let mut start = 0;
        while start < text.len() {
            let Some(caps) = self.date.captures_at(text, start) else {
                break;
            };
            let (Some(y), Some(m), Some(d)) = (caps.get(1), caps.get(2), caps.get(3)) else {
                break;
            };
            let formatted = format!("{}_{}_{}", y.as_str(), m.as_str(), d.as_str());
            if parse_release_date(&formatted).is_some() {
                found = Some((y.start(), d.end(), formatted));
            }
            start = y.start() + 1;
        }
        match found {
            Some((from, to, date)) => (format!("{} {}", &text[..from], &text[to..]), Some(date)),
            None => (text.to_string(), None),
        }
    }

    /// Splits `hal_generalist_gpt_4_1` style keys into scaffold and model
    /// by locating a declared scaffold at the start of the key.
    fn split_scaffold_prefix(&self, key: &str) -> Option<(String, String)> {
        let canonical = canonicalize(key);
        for entry in &self.scaffolds {
            if let Some(rest) = canonical.strip_prefix(&format!("{}_", entry.tag)) {
                return Some((entry.tag.clone(), rest.to_string()));
            }
        }
        for entry in &self.scaffolds {
            if let Some(m) = entry.regex.find(&canonical) {
                if m.start() != 0 {
                    continue;
                }
                let rest = canonical[m.end()..].trim_matches('_');
                if !rest.is_empty() {
                    return Some((entry.tag.clone(), rest.to_string()));
                }
            }
        }
        None
    }
}

/// Lower-case, map every non `[a-z0-9]` character to `_`, collapse runs of
/// `_`, trim `_` at both ends.
pub fn canonicalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_sep = false;
    for ch in text.to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch);
        } else {
            pending_sep = true;
        }
    }
    out
}

fn parse_release_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y_%m_%d").ok()
}

fn compile(kind: &'static str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        kind,
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScaffoldPattern;

    fn normalizer() -> NameNormalizer {
        NameNormalizer::new(NormalizerConfig::default()).expect("default config")
    }

    fn id(scaffold: &str, model: Option<&str>) -> String {
        normalizer().normalize(scaffold, model).test_taker_id()
    }

    #[test]
    fn canonicalize_collapses_punctuation() {
        assert_eq!(canonicalize("  Claude-3.7 Sonnet!! "), "claude_3_7_sonnet");
        assert_eq!(canonicalize("__a__b__"), "a_b");
        assert_eq!(canonicalize("_"), "");
        assert_eq!(canonicalize("Modèle"), "mod_le");
    }

    #[test]
    fn scaffold_patterns_are_first_match_wins() {
        let n = normalizer();
        assert_eq!(n.resolve_scaffold("HAL Generalist Agent (GPT-4.1)"), "hal_generalist_agent");
        assert_eq!(n.resolve_scaffold("CORE-Agent"), "core_agent");
        assert_eq!(n.resolve_scaffold("Browser-Use Test"), "browser_use_test");
        assert_eq!(n.resolve_scaffold("browser use"), "browser_use");
        assert_eq!(n.resolve_scaffold("TAU-bench FewShot"), "taubench_fewshot");
        assert_eq!(n.resolve_scaffold("taubench tool-calling"), "taubench_toolcalling");
        assert_eq!(
            n.resolve_scaffold("AssistantBench Browser Agent"),
            "assistantbench_browser_agent"
        );
        // "core" and "agent" beat the later "my agent" row.
        assert_eq!(n.resolve_scaffold("My Core Agent"), "core_agent");
        assert_eq!(n.resolve_scaffold("My Agent"), "my_agent");
    }

    #[test]
    fn scaffold_fallback_strips_parenthesized_suffix() {
        let n = normalizer();
        assert_eq!(n.resolve_scaffold("Custom Harness v2 (o3 high)"), "custom_harness_v2");
        assert_eq!(n.resolve_scaffold("(only parens)"), "");
    }

    #[test]
    fn case_and_punctuation_invariance() {
        assert_eq!(
            id("CoreAgent", Some("Claude-3.7 Sonnet")),
            id("core_agent", Some("claude_3_7_sonnet"))
        );
        assert_eq!(
            id("CoreAgent", Some("Claude-3.7 Sonnet")),
            "core_agent:claude_3_7_sonnet_2025_02_19"
        );
    }

    #[test]
    fn date_spellings_collapse() {
        let expected = "core_agent:claude_3_7_sonnet_2025_02_19";
        assert_eq!(id("Core Agent", Some("claude-3-7-sonnet-20250219")), expected);
        assert_eq!(id("Core Agent", Some("claude-3-7-sonnet-2025-02-19")), expected);
        assert_eq!(id("Core Agent", Some("claude_3_7_sonnet_2025_02_19")), expected);
        assert_eq!(id("Core Agent", Some("claude-3-7-sonnet 2025/02/19")), expected);
    }

    #[test]
    fn invalid_dates_stay_in_the_name() {
        assert_eq!(
            id("Core Agent", Some("model-20251345")),
            "core_agent:model_20251345"
        );
        assert_eq!(id("Core Agent", Some("x-120250219")), "core_agent:x_120250219");
        assert_eq!(id("Core Agent", Some("gpt-4o-2019-05-01")), "core_agent:gpt_4o_2019_05_01");
    }

    #[test]
    fn effort_order_invariance() {
        let a = id("SWE-Agent", Some("o3 high thinking"));
        let b = id("SWE-Agent", Some("o3_thinking_high"));
        assert_eq!(a, b);
        assert_eq!(a, "swe_agent:o3_high_thinking");
    }

    #[test]
    fn no_reasoning_matches_any_separator() {
        assert_eq!(
            id("SWE-Agent", Some("gpt-5 No Reasoning")),
            "swe_agent:gpt_5_2025_08_07_no_reasoning"
        );
        assert_eq!(
            id("swe_agent", Some("gpt_5_2025_08_07_no_reasoning")),
            "swe_agent:gpt_5_2025_08_07_no_reasoning"
        );
    }

    #[test]
    fn efforts_are_collected_from_the_agent_name() {
        assert_eq!(
            id("HAL Generalist Agent (o4-mini High)", Some("o4-mini-2025-04-16")),
            "hal_generalist_agent:o4_mini_2025_04_16_high"
        );
    }

    #[test]
    fn provider_prefixes_are_stripped() {
        assert_eq!(
            id("Core Agent", Some("openrouter/anthropic/claude-3.7-sonnet")),
            "core_agent:claude_3_7_sonnet_2025_02_19"
        );
        assert_eq!(
            id("Core Agent", Some("together_ai/deepseek-ai/DeepSeek-R1")),
            "core_agent:deepseek_r1"
        );
        assert_eq!(
            id("Core Agent", Some("together_ai_deepseek_ai_deepseek_r1")),
            "core_agent:deepseek_r1"
        );
    }

    #[test]
    fn slash_dates_survive_provider_paths() {
        let expected = "core_agent:claude_3_7_sonnet_2025_02_19";
        assert_eq!(
            id("Core Agent", Some("openrouter/anthropic/claude-3-7-sonnet-2025/02/19")),
            expected
        );
        assert_eq!(id("Core Agent", Some("anthropic/claude-3-7-sonnet 2025/02/19")), expected);
        assert_eq!(id("Core Agent", Some("2025/01/05/2025/01/06")), "core_agent:unknown_2025_01_06");
    }

    #[test]
    fn stacked_provider_prefixes_are_all_stripped() {
        let n = normalizer();
        let first = n.normalize("SeeAct", Some("openrouter-together-ai-x"));
        assert_eq!(first.test_taker_id(), "seeact:x");
        assert_eq!(n.parse_row_key(&first.test_taker_id()), first);
    }

    #[test]
    fn dates_exposed_by_effort_removal_are_extracted() {
        let n = normalizer();
        for raw in ["2025high0219", "x 2025.02.19", "Nan.", "nan high"] {
            let first = n.normalize("SeeAct", Some(raw));
            let again = n.parse_row_key(&first.test_taker_id());
            assert_eq!(again, first, "not a fixed point for {:?}", raw);
        }
        assert_eq!(id("SeeAct", Some("2025high0219")), "seeact:unknown_2025_02_19_high");
        assert_eq!(id("SeeAct", Some("x 2025.02.19")), "seeact:x_2025_02_19");
        assert_eq!(id("SeeAct", Some("Nan.")), "seeact:unknown");
    }

    #[test]
    fn aliases_and_rewrites_apply() {
        assert_eq!(id("SeeAct", Some("gpt-o3")), "seeact:o3");
        assert_eq!(id("SeeAct", Some("gpt-oss-120b")), "seeact:gpt_oss_120b");
        assert_eq!(id("SeeAct", Some("gemini/gemini-2.0-flash-001")), "seeact:gemini_2_0_flash");
        assert_eq!(id("SeeAct", Some("deepseek-chat")), "seeact:deepseek_v3");
        // An explicit date beats the alias default.
        assert_eq!(
            id("SeeAct", Some("gpt-5-2025-09-01")),
            "seeact:gpt_5_2025_09_01"
        );
    }

    #[test]
    fn missing_model_falls_back_to_parens_then_sentinel() {
        assert_eq!(id("HAL Generalist Agent (GPT-4.1)", None), "hal_generalist_agent:gpt_4_1_2025_04_14");
        assert_eq!(id("HAL Generalist Agent (GPT-4.1)", Some("nan")), "hal_generalist_agent:gpt_4_1_2025_04_14");
        assert_eq!(id("Core Agent", None), "core_agent:unknown");
        assert_eq!(id("Core Agent", Some("   ")), "core_agent:unknown");
    }

    #[test]
    fn effort_only_model_keeps_sentinel_name() {
        assert_eq!(id("Core Agent", Some("High")), "core_agent:unknown_high");
        assert_eq!(id("core_agent", Some("unknown_high")), "core_agent:unknown_high");
    }

    #[test]
    fn normalization_is_a_fixed_point() {
        let n = normalizer();
        let raw = [
            ("Core Agent", Some("claude-3-7-sonnet-20250219")),
            ("HAL Generalist Agent (o4-mini High)", None),
            ("Browser-Use", Some("openrouter/openai/gpt-4.1-2025-04-14")),
            ("Weird Harness", Some("m-20250219-20250301 low")),
            ("TAU-bench FewShot", Some("DeepSeek V3 no-reasoning")),
            ("thinking bot", Some("qwen3")),
            ("Core Agent", Some("openrouter/anthropic/claude-3-7-sonnet-2025/02/19")),
            ("SeeAct", Some("openrouter-together-ai-x")),
        ];
        for (scaffold, model) in raw {
            let first = n.normalize(scaffold, model);
            let again = n.parse_row_key(&first.test_taker_id());
            assert_eq!(again, first, "not idempotent for {:?}/{:?}", scaffold, model);
            assert_eq!(n.normalize(scaffold, model), first);
        }
    }

    #[test]
    fn reasoning_effort_distinguishes_identities() {
        let plain = id("Core Agent", Some("claude-3-7-sonnet-20250219"));
        let high = id("core_agent", Some("Claude 3.7 Sonnet High 2025-02-19"));
        assert_eq!(plain, "core_agent:claude_3_7_sonnet_2025_02_19");
        assert_eq!(high, "core_agent:claude_3_7_sonnet_2025_02_19_high");
    }

    #[test]
    fn parse_row_key_handles_legacy_shapes() {
        let n = normalizer();
        assert_eq!(
            n.parse_row_key("CORE-Agent__claude-3-7-sonnet-20250219").test_taker_id(),
            "core_agent:claude_3_7_sonnet_2025_02_19"
        );
        assert_eq!(
            n.parse_row_key("AssistantBench-Agent__openai__gpt-4.1").test_taker_id(),
            "assistantbench_agent:gpt_4_1_2025_04_14"
        );
        assert_eq!(
            n.parse_row_key("hal_generalist_gpt_4_1").test_taker_id(),
            "hal_generalist_agent:gpt_4_1_2025_04_14"
        );
        assert_eq!(
            n.parse_row_key("hal_generalist_agent_o3_high").test_taker_id(),
            "hal_generalist_agent:o3_high"
        );
        assert_eq!(
            n.parse_row_key("Some Harness (o3)").test_taker_id(),
            "some_harness:o3"
        );
    }

    #[test]
    fn degenerate_keys_are_flagged() {
        let n = normalizer();
        assert!(n.is_degenerate(&n.parse_row_key("")));
        assert!(n.is_degenerate(&n.parse_row_key("_")));
        assert!(n.is_degenerate(&n.parse_row_key("unknown__unknown")));
        assert!(!n.is_degenerate(&n.parse_row_key("core_agent:unknown")));
    }

    #[test]
    fn normalize_model_matches_id_suffix() {
        let n = normalizer();
        let identity = n.normalize("Core Agent", Some("o3-2025-04-16 medium"));
        assert_eq!(n.normalize_model("o3-2025-04-16 medium"), identity.model_key());
        assert_eq!(identity.model_key(), "o3_2025_04_16_medium");
    }

    #[test]
    fn scaffold_priority_follows_declaration_order() {
        let n = normalizer();
        assert_eq!(n.scaffold_priority("assistantbench_browser_agent"), 0);
        assert!(n.scaffold_priority("core_agent") < n.scaffold_priority("my_agent"));
        assert_eq!(n.scaffold_priority("undeclared"), 17);
    }

    #[test]
    fn injected_tables_replace_defaults() {
        let mut config = NormalizerConfig::default();
        config.scaffold_patterns = vec![ScaffoldPattern {
            pattern: "^acme".to_string(),
            tag: "acme".to_string(),
        }];
        config.model_aliases.clear();
        let n = NameNormalizer::new(config).expect("config");
        assert_eq!(
            n.normalize("ACME runner", Some("claude-3.7-sonnet")).test_taker_id(),
            "acme:claude_3_7_sonnet"
        );
        assert_eq!(n.resolve_scaffold("Core Agent"), "core_agent");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = NormalizerConfig::default();
        config.scaffold_patterns.push(ScaffoldPattern {
            pattern: "(unclosed".to_string(),
            tag: "broken".to_string(),
        });
        assert!(matches!(
            NameNormalizer::new(config),
            Err(ConfigError::InvalidPattern { kind: "scaffold", .. })
        ));

        let mut config = NormalizerConfig::default();
        config.model_aliases.insert(
            "gpt_x".to_string(),
            ModelAlias {
                canonical: "gpt_x".to_string(),
                release_date: Some("2025-13-01".to_string()),
            },
        );
        assert!(matches!(
            NameNormalizer::new(config),
            Err(ConfigError::InvalidReleaseDate { .. })
        ));
    }
}
