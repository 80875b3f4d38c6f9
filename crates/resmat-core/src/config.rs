//! Normalizer decision tables.
//!
//! Every table the [`crate::identity::NameNormalizer`] consults lives here as
//! plain data. The defaults reproduce the naming corpus seen in HAL uploads;
//! a YAML or JSON file can replace any table wholesale.

use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const NORMALIZER_CONFIG_SCHEMA: &str = "normalizer_config_v1";
pub const UNKNOWN_MODEL: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaffoldPattern {
    pub pattern: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffortKeyword {
    /// Words separated by spaces; any run of separators matches between them.
    pub keyword: String,
    pub tag: String,
}

/// Regex rewrite applied to the canonical model name, e.g. undoing the
/// `o3 -> gpt-o3` corruption of an earlier export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRule {
    pub pattern: String,
    pub replacement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelAlias {
    pub canonical: String,
    /// `YYYY_MM_DD`; used only when the raw name carried no date itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Checked top to bottom; the first match wins.
    #[serde(default = "default_scaffold_patterns")]
    pub scaffold_patterns: Vec<ScaffoldPattern>,
    #[serde(default = "default_effort_keywords")]
    pub effort_keywords: Vec<EffortKeyword>,
    /// Provider prefixes as they look after canonicalization.
    #[serde(default = "default_canonical_prefixes")]
    pub canonical_prefixes: Vec<String>,
    #[serde(default = "default_rewrites")]
    pub rewrites: Vec<RewriteRule>,
    #[serde(default = "default_model_aliases")]
    pub model_aliases: BTreeMap<String, ModelAlias>,
    #[serde(default = "default_unknown_model")]
    pub unknown_model: String,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            scaffold_patterns: default_scaffold_patterns(),
            effort_keywords: default_effort_keywords(),
            canonical_prefixes: default_canonical_prefixes(),
            rewrites: default_rewrites(),
            model_aliases: default_model_aliases(),
            unknown_model: default_unknown_model(),
        }
    }
}

impl NormalizerConfig {
    pub fn from_yaml_str(data: &str) -> std::result::Result<Self, ConfigError> {
        let config: NormalizerConfig =
            serde_yaml::from_str(data).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.check_schema_version()?;
        Ok(config)
    }

    pub fn from_json_str(data: &str) -> std::result::Result<Self, ConfigError> {
        let config: NormalizerConfig =
            serde_json::from_str(data).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.check_schema_version()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn check_schema_version(&self) -> std::result::Result<(), ConfigError> {
        if self.schema_version != NORMALIZER_CONFIG_SCHEMA {
            return Err(ConfigError::UnsupportedSchemaVersion(
                self.schema_version.clone(),
            ));
        }
        Ok(())
    }
}

/// Loads a config file, picking the parser from the extension (`.json` is
/// JSON, anything else is YAML).
pub fn load_config(path: &Path) -> Result<NormalizerConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read normalizer config {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let config = if is_json {
        NormalizerConfig::from_json_str(&data)
    } else {
        NormalizerConfig::from_yaml_str(&data)
    };
    config.with_context(|| format!("invalid normalizer config {}", path.display()))
}

fn default_schema_version() -> String {
    NORMALIZER_CONFIG_SCHEMA.to_string()
}

fn default_unknown_model() -> String {
    UNKNOWN_MODEL.to_string()
}

fn default_scaffold_patterns() -> Vec<ScaffoldPattern> {
    [
        (r"assistant.*bench.*browser.*agent", "assistantbench_browser_agent"),
        (r"hal.*generalist", "hal_generalist_agent"),
        (r"browser.*use.*test", "browser_use_test"),
        (r"browser.*use", "browser_use"),
        (r"colbench.*example.*agent", "colbench_example_agent"),
        (r"colbench.*text", "colbench_text"),
        (r"core.*agent", "core_agent"),
        (r"hf.*open.*deep.*research", "hf_open_deep_research"),
        (r"scicode.*tool.*calling.*agent", "scicode_tool_calling_agent"),
        (r"scicode.*zero.*shot.*agent", "scicode_zero_shot_agent"),
        (r"sab.*self.*debug", "sab_self_debug"),
        (r"taubench.*tool.*calling", "taubench_toolcalling"),
        (r"tau.*bench.*few.*shot", "taubench_fewshot"),
        (r"usaco.*episodic.*semantic", "usaco_episodic_semantic"),
        (r"swe.*agent", "swe_agent"),
        (r"my.*agent", "my_agent"),
        (r"seeact", "seeact"),
    ]
    .into_iter()
    .map(|(pattern, tag)| ScaffoldPattern {
        pattern: pattern.to_string(),
        tag: tag.to_string(),
    })
    .collect()
}

fn default_effort_keywords() -> Vec<EffortKeyword> {
    [
        ("high", "high"),
        ("medium", "medium"),
        ("low", "low"),
        ("minimal", "minimal"),
        ("thinking", "thinking"),
        ("no reasoning", "no_reasoning"),
    ]
    .into_iter()
    .map(|(keyword, tag)| EffortKeyword {
        keyword: keyword.to_string(),
        tag: tag.to_string(),
    })
    .collect()
}

fn default_canonical_prefixes() -> Vec<String> {
    ["together_ai_deepseek_ai_", "together_ai_", "openrouter_"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_rewrites() -> Vec<RewriteRule> {
    vec![RewriteRule {
        pattern: r"^gpt_o(\d)".to_string(),
        replacement: "o$1".to_string(),
    }]
}

fn default_model_aliases() -> BTreeMap<String, ModelAlias> {
    let dated = [
        ("claude_3_7_sonnet", "claude_3_7_sonnet", Some("2025_02_19")),
        ("claude_sonnet_4_5", "claude_sonnet_4_5", Some("2025_09_29")),
        ("claude_sonnet_4", "claude_sonnet_4", Some("2025_05_14")),
        ("gpt_5", "gpt_5", Some("2025_08_07")),
        ("gpt_4_1", "gpt_4_1", Some("2025_04_14")),
        ("gemini_2_0_flash_001", "gemini_2_0_flash", None),
        ("gemini_gemini_2_0_flash", "gemini_2_0_flash", None),
        ("deepseek_chat", "deepseek_v3", None),
    ];
    dated
        .into_iter()
        .map(|(alias, canonical, date)| {
            (
                alias.to_string(),
                ModelAlias {
                    canonical: canonical.to_string(),
                    release_date: date.map(str::to_string),
                },
            )
        })
        .collect()
}
