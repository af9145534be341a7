use anyhow::{Context, Result};
use extract::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub model: ModelConfig,
    pub ner: NerConfig,
    pub queue: QueueConfig,
    pub concurrency: ConcurrencyConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub ollama_url: String,
    pub name: String,
    pub temperature: f32,
    pub enrichment_max_tokens: u32,
    pub relationship_max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NerConfig {
    pub url: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub ingress: String,
    pub egress: String,
    /// Only 1 is honoured; deliveries are handled one at a time.
    pub prefetch_count: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub max_concurrent_llm_calls: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let pipeline = PipelineConfig::default();
        Self {
            model: ModelConfig {
                ollama_url: "http://localhost:11434".to_string(),
                name: "openhermes".to_string(),
                temperature: pipeline.temperature,
                enrichment_max_tokens: pipeline.enrichment_max_tokens,
                relationship_max_tokens: pipeline.relationship_max_tokens,
            },
            ner: NerConfig {
                url: "http://localhost:8001".to_string(),
                model: "en_core_web_sm".to_string(),
            },
            queue: QueueConfig {
                ingress: "scene_analysis_queue".to_string(),
                egress: "scene_analysis_results_queue".to_string(),
                prefetch_count: 1,
            },
            concurrency: ConcurrencyConfig {
                max_concurrent_llm_calls: pipeline.max_concurrent_llm_calls,
            },
            log: LogConfig {
                level: "info".to_string(),
                format: LogFormat::Compact,
            },
        }
    }
}

impl WorkerConfig {
    /// Default settings with `n` completion calls in flight per stage.
    pub fn parallel(n: usize) -> Self {
        Self {
            concurrency: ConcurrencyConfig {
                max_concurrent_llm_calls: n.max(1),
            },
            ..Self::default()
        }
    }

    /// Reads the process environment, after loading `.env` if one exists.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let format = match lookup("LOG_FORMAT") {
            Some(value) if value.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        };

        Ok(Self {
            model: ModelConfig {
                ollama_url: lookup("OLLAMA_URL").unwrap_or(defaults.model.ollama_url),
                name: lookup("MODEL_NAME").unwrap_or(defaults.model.name),
                temperature: parse_or(&lookup, "MODEL_TEMPERATURE", defaults.model.temperature)?,
                ..defaults.model
            },
            ner: NerConfig {
                url: lookup("NER_URL").unwrap_or(defaults.ner.url),
                model: lookup("NER_MODEL").unwrap_or(defaults.ner.model),
            },
            queue: QueueConfig {
                ingress: lookup("SCENE_ANALYSIS_QUEUE").unwrap_or(defaults.queue.ingress),
                egress: lookup("SCENE_ANALYSIS_RESULTS_QUEUE").unwrap_or(defaults.queue.egress),
                prefetch_count: parse_or(&lookup, "PREFETCH_COUNT", defaults.queue.prefetch_count)?,
            },
            concurrency: ConcurrencyConfig {
                max_concurrent_llm_calls: parse_or(
                    &lookup,
                    "MAX_CONCURRENT_LLM_CALLS",
                    defaults.concurrency.max_concurrent_llm_calls,
                )?
                .max(1),
            },
            log: LogConfig {
                level: lookup("LOG_LEVEL").unwrap_or(defaults.log.level),
                format,
            },
        })
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            enrichment_max_tokens: self.model.enrichment_max_tokens,
            relationship_max_tokens: self.model.relationship_max_tokens,
            temperature: self.model.temperature,
            max_concurrent_llm_calls: self.concurrency.max_concurrent_llm_calls,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = WorkerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, WorkerConfig::default());
        assert_eq!(config.pipeline_config(), PipelineConfig::default());
        assert_eq!(config.model.name, "openhermes");
        assert_eq!(config.queue.prefetch_count, 1);
    }

    #[test]
    fn test_overrides() {
        let config = WorkerConfig::from_lookup(lookup_from(&[
            ("MODEL_NAME", "llama3"),
            ("MODEL_TEMPERATURE", "0.3"),
            ("NER_URL", "http://ner:9000"),
            ("SCENE_ANALYSIS_QUEUE", "in"),
            ("MAX_CONCURRENT_LLM_CALLS", "4"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.model.name, "llama3");
        assert_eq!(config.model.temperature, 0.3);
        assert_eq!(config.ner.url, "http://ner:9000");
        assert_eq!(config.queue.ingress, "in");
        assert_eq!(config.queue.egress, "scene_analysis_results_queue");
        assert_eq!(config.pipeline_config().max_concurrent_llm_calls, 4);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_number_is_error() {
        let err = WorkerConfig::from_lookup(lookup_from(&[("PREFETCH_COUNT", "many")])).unwrap_err();
        assert!(err.to_string().contains("PREFETCH_COUNT"));
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        let config = WorkerConfig::from_lookup(lookup_from(&[("MAX_CONCURRENT_LLM_CALLS", "0")])).unwrap();
        assert_eq!(config.concurrency.max_concurrent_llm_calls, 1);
        assert_eq!(WorkerConfig::parallel(0).concurrency.max_concurrent_llm_calls, 1);
        assert_eq!(WorkerConfig::parallel(8).concurrency.max_concurrent_llm_calls, 8);
    }
}
