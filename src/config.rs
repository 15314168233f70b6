//! Configuration for thinkstream.
//!
//! There are no flags and no configuration file.  Everything is read from the environment
//! (optionally seeded from a `.env` file by the binary) and resolved into a [`Config`] with
//! defaults applied.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default maximum tokens per response.
const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Default thread for the session.
const DEFAULT_THREAD_ID: &str = "1";

/// Which fragment source to talk to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProviderKind {
    /// Anthropic Messages API with extended thinking.
    #[default]
    Anthropic,
    /// Google Gemini with thought parts.
    Gemini,
    /// A JSON-lines script on disk.
    Replay,
}

impl ProviderKind {
    /// Model used when none is configured.
    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "claude-3-7-sonnet-latest",
            ProviderKind::Gemini => "gemini-2.5-flash",
            ProviderKind::Replay => "replay",
        }
    }

    /// Reasoning budget used when none is configured.
    pub fn default_thinking_budget(self) -> u32 {
        match self {
            ProviderKind::Anthropic => 4096,
            ProviderKind::Gemini => 1024,
            ProviderKind::Replay => 0,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Anthropic => write!(f, "anthropic"),
            ProviderKind::Gemini => write!(f, "gemini"),
            ProviderKind::Replay => write!(f, "replay"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "replay" => Ok(ProviderKind::Replay),
            other => Err(Error::configuration(
                format!("unknown provider {other:?}; expected anthropic, gemini, or replay"),
                Some("THINKSTREAM_PROVIDER".to_string()),
            )),
        }
    }
}

/// Configuration for a session.
///
/// This struct holds the resolved values after reading the environment with defaults applied.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// The fragment source.
    pub provider: ProviderKind,
    /// The model to use for generating responses.
    pub model: String,
    /// Reasoning budget in tokens.  Zero disables reasoning.
    pub thinking_budget: u32,
    /// Maximum tokens per response.
    pub max_tokens: u32,
    /// Overrides the provider's endpoint.
    pub base_url: Option<String>,
    /// Conversation thread handed to the checkpointer.
    pub thread_id: String,
    /// Script replayed by the replay provider.
    pub replay_path: Option<PathBuf>,
    /// Pause between replayed fragments.
    pub replay_delay: Duration,
    /// Log destination.  Logging is off when unset.
    pub log_file: Option<PathBuf>,
    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
    /// Key for the Anthropic API.
    pub anthropic_api_key: Option<String>,
    /// Key for the Gemini API.
    pub google_api_key: Option<String>,
}

impl Config {
    /// Creates a configuration for `provider` with default values.
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            model: provider.default_model().to_string(),
            thinking_budget: provider.default_thinking_budget(),
            max_tokens: DEFAULT_MAX_TOKENS,
            base_url: None,
            thread_id: DEFAULT_THREAD_ID.to_string(),
            replay_path: None,
            replay_delay: Duration::ZERO,
            log_file: None,
            use_color: true,
            anthropic_api_key: None,
            google_api_key: None,
        }
    }

    /// Reads the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to its value.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let provider = match get("THINKSTREAM_PROVIDER") {
            Some(value) => value.parse()?,
            None => ProviderKind::default(),
        };
        let mut config = Config::new(provider);
        if let Some(model) = get("THINKSTREAM_MODEL") {
            config.model = model;
        }
        if let Some(budget) = get("THINKSTREAM_THINKING_BUDGET") {
            config.thinking_budget = parse_number("THINKSTREAM_THINKING_BUDGET", &budget)?;
        }
        if let Some(max_tokens) = get("THINKSTREAM_MAX_TOKENS") {
            config.max_tokens = parse_number("THINKSTREAM_MAX_TOKENS", &max_tokens)?;
        }
        if let Some(base_url) = get("THINKSTREAM_BASE_URL") {
            url::Url::parse(&base_url).map_err(|err| {
                Error::configuration(
                    format!("invalid URL {base_url:?}: {err}"),
                    Some("THINKSTREAM_BASE_URL".to_string()),
                )
            })?;
            config.base_url = Some(base_url);
        }
        if let Some(thread_id) = get("THINKSTREAM_THREAD_ID") {
            config.thread_id = thread_id;
        }
        config.replay_path = get("THINKSTREAM_REPLAY").map(PathBuf::from);
        if let Some(delay) = get("THINKSTREAM_REPLAY_DELAY_MS") {
            let millis: u64 = parse_number("THINKSTREAM_REPLAY_DELAY_MS", &delay)?;
            config.replay_delay = Duration::from_millis(millis);
        }
        config.log_file = get("THINKSTREAM_LOG").map(PathBuf::from);
        config.use_color = get("NO_COLOR").is_none();
        config.anthropic_api_key = get("ANTHROPIC_API_KEY");
        config.google_api_key = get("GOOGLE_API_KEY");
        config.validate()?;
        Ok(config)
    }

    /// Checks the values a provider needs before the session starts.
    pub fn validate(&self) -> Result<()> {
        match self.provider {
            ProviderKind::Anthropic => {
                if self.anthropic_api_key.is_none() {
                    return Err(missing("ANTHROPIC_API_KEY", "the anthropic provider"));
                }
                if self.thinking_budget > 0 && self.thinking_budget >= self.max_tokens {
                    return Err(Error::configuration(
                        format!(
                            "thinking budget {} must be below max tokens {}",
                            self.thinking_budget, self.max_tokens
                        ),
                        Some("THINKSTREAM_THINKING_BUDGET".to_string()),
                    ));
                }
            }
            ProviderKind::Gemini => {
                if self.google_api_key.is_none() {
                    return Err(missing("GOOGLE_API_KEY", "the gemini provider"));
                }
            }
            ProviderKind::Replay => {
                if self.replay_path.is_none() {
                    return Err(missing("THINKSTREAM_REPLAY", "the replay provider"));
                }
            }
        }
        if self.max_tokens == 0 {
            return Err(Error::configuration(
                "max tokens must be positive",
                Some("THINKSTREAM_MAX_TOKENS".to_string()),
            ));
        }
        Ok(())
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the reasoning budget.
    pub fn with_thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = budget;
        self
    }

    /// Sets the maximum tokens per response.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the thread id.
    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = thread_id.into();
        self
    }

    /// Sets the replay script.
    pub fn with_replay_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.replay_path = Some(path.into());
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

fn parse_number<T: FromStr>(variable: &str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|err| {
        Error::configuration(
            format!("invalid number {value:?}: {err}"),
            Some(variable.to_string()),
        )
    })
}

fn missing(variable: &str, what: &str) -> Error {
    Error::configuration(
        format!("{what} requires {variable} to be set"),
        Some(variable.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn default_config() {
        let config = from_pairs(&[("ANTHROPIC_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.provider, ProviderKind::Anthropic);
        assert_eq!(config.model, "claude-3-7-sonnet-latest");
        assert_eq!(config.thinking_budget, 4096);
        assert_eq!(config.max_tokens, 8192);
        assert_eq!(config.thread_id, "1");
        assert!(config.use_color);
        assert!(config.base_url.is_none());
        assert_eq!(config.replay_delay, Duration::ZERO);
    }

    #[test]
    fn gemini_defaults() {
        let config =
            from_pairs(&[("THINKSTREAM_PROVIDER", "Gemini"), ("GOOGLE_API_KEY", "g")]).unwrap();
        assert_eq!(config.provider, ProviderKind::Gemini);
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.thinking_budget, 1024);
    }

    #[test]
    fn replay_settings() {
        let config = from_pairs(&[
            ("THINKSTREAM_PROVIDER", "replay"),
            ("THINKSTREAM_REPLAY", "turn.jsonl"),
            ("THINKSTREAM_REPLAY_DELAY_MS", "25"),
            ("THINKSTREAM_THREAD_ID", "abc"),
            ("NO_COLOR", "1"),
        ])
        .unwrap();
        assert_eq!(config.replay_path, Some(PathBuf::from("turn.jsonl")));
        assert_eq!(config.replay_delay, Duration::from_millis(25));
        assert_eq!(config.thread_id, "abc");
        assert!(!config.use_color);
    }

    #[test]
    fn empty_values_are_unset() {
        let config = from_pairs(&[("ANTHROPIC_API_KEY", "k"), ("NO_COLOR", "")]).unwrap();
        assert!(config.use_color);
    }

    #[test]
    fn unknown_provider() {
        let err = from_pairs(&[("THINKSTREAM_PROVIDER", "bedrock")]).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("THINKSTREAM_PROVIDER"));
    }

    #[test]
    fn bad_number_names_variable() {
        let err = from_pairs(&[
            ("ANTHROPIC_API_KEY", "k"),
            ("THINKSTREAM_MAX_TOKENS", "lots"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("THINKSTREAM_MAX_TOKENS"));
    }

    #[test]
    fn missing_key() {
        let err = from_pairs(&[]).unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
        let err = from_pairs(&[("THINKSTREAM_PROVIDER", "replay")]).unwrap_err();
        assert!(err.to_string().contains("THINKSTREAM_REPLAY"));
    }

    #[test]
    fn budget_must_fit_in_max_tokens() {
        let err = from_pairs(&[
            ("ANTHROPIC_API_KEY", "k"),
            ("THINKSTREAM_MAX_TOKENS", "2048"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("THINKSTREAM_THINKING_BUDGET"));
        let config = from_pairs(&[
            ("ANTHROPIC_API_KEY", "k"),
            ("THINKSTREAM_MAX_TOKENS", "2048"),
            ("THINKSTREAM_THINKING_BUDGET", "0"),
        ])
        .unwrap();
        assert_eq!(config.thinking_budget, 0);
    }

    #[test]
    fn invalid_base_url() {
        let err = from_pairs(&[
            ("ANTHROPIC_API_KEY", "k"),
            ("THINKSTREAM_BASE_URL", "not a url"),
        ])
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn config_builder_pattern() {
        let config = Config::new(ProviderKind::Replay)
            .with_model("m")
            .with_thinking_budget(10)
            .with_max_tokens(20)
            .with_thread_id("t")
            .with_replay_path("x.jsonl")
            .without_color();
        assert_eq!(config.model, "m");
        assert_eq!(config.thinking_budget, 10);
        assert_eq!(config.max_tokens, 20);
        assert_eq!(config.thread_id, "t");
        assert!(!config.use_color);
        assert!(config.validate().is_ok());
    }
}
