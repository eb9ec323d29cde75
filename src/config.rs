use crate::openai::OpenAiConfig;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub openai: Option<OpenAiConfig>,
    pub default_prompt: Option<String>,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            openai: None,
            default_prompt: None,
            verbose: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let default_prompt = env::var("RIMAGEN_PROMPT").ok();
        let verbose = env::var("RIMAGEN_VERBOSE")
            .ok()
            .map_or(false, |val| val == "true");

        Config {
            openai: Some(OpenAiConfig::from_env()),
            default_prompt,
            verbose,
        }
    }

    pub fn with_openai(mut self, config: OpenAiConfig) -> Self {
        self.openai = Some(config);
        self
    }

    pub fn with_default_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.default_prompt = Some(prompt.into());
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder_chain() {
        let config = Config::new()
            .with_openai(OpenAiConfig::new().with_api_key("sk-test"))
            .with_default_prompt("a lighthouse at dusk")
            .with_verbose(true);

        assert!(config.verbose);
        assert_eq!(config.default_prompt.as_deref(), Some("a lighthouse at dusk"));
        assert_eq!(
            config.openai.unwrap().api_key.as_deref(),
            Some("sk-test")
        );
    }
}
