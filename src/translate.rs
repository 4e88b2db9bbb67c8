// Translation with an ordered chain of providers
// When every provider fails the original text comes back, flagged as degraded

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("{0}")]
    Provider(String),
    #[error("Provider returned an empty translation")]
    Empty,
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait Translator: Send + Sync {
    fn name(&self) -> &str;
    async fn translate(&self, text: &str, target_locale: &str) -> Result<String, TranslateError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "provider", rename_all = "camelCase")]
pub enum TranslationSource {
    Provider(String),
    /// No provider succeeded; the text is untranslated
    Original,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFailure {
    pub provider: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub text: String,
    pub source: TranslationSource,
    pub failures: Vec<ProviderFailure>,
}

impl Translation {
    /// True when providers were tried and all of them failed
    pub fn is_degraded(&self) -> bool {
        self.source == TranslationSource::Original && !self.failures.is_empty()
    }
}

/// Tries each provider in order until one succeeds
pub struct FallbackTranslator {
    providers: Vec<Box<dyn Translator>>,
    timeout: Option<Duration>,
}

impl Default for FallbackTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackTranslator {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Translator + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Per-provider time limit
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn attempt(
        &self,
        provider: &dyn Translator,
        text: &str,
        target: &str,
    ) -> Result<String, TranslateError> {
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, provider.translate(text, target))
                .await
                .map_err(|_| TranslateError::Timeout(limit))?,
            None => provider.translate(text, target).await,
        };

        match result {
            Ok(translated) if translated.trim().is_empty() => Err(TranslateError::Empty),
            other => other,
        }
    }

    pub async fn translate(&self, text: &str, target_locale: &str) -> Translation {
        let mut failures = Vec::new();

        if !text.trim().is_empty() {
            for provider in &self.providers {
                match self.attempt(provider.as_ref(), text, target_locale).await {
                    Ok(translated) => {
                        debug!(provider = provider.name(), target_locale, "Translated text");
                        return Translation {
                            text: translated,
                            source: TranslationSource::Provider(provider.name().to_string()),
                            failures,
                        };
                    }
                    Err(e) => {
                        warn!(
                            provider = provider.name(),
                            error = %e,
                            "Translation provider failed"
                        );
                        failures.push(ProviderFailure {
                            provider: provider.name().to_string(),
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        Translation {
            text: text.to_string(),
            source: TranslationSource::Original,
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    enum Behavior {
        Succeed(&'static str),
        Fail(&'static str),
        Hang,
    }

    struct FakeTranslator {
        name: &'static str,
        behavior: Behavior,
        calls: Arc<AtomicUsize>,
    }

    impl FakeTranslator {
        fn new(name: &'static str, behavior: Behavior) -> Self {
            Self {
                name,
                behavior,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Translator for FakeTranslator {
        fn name(&self) -> &str {
            self.name
        }

        async fn translate(&self, _text: &str, _target: &str) -> Result<String, TranslateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed(out) => Ok(out.to_string()),
                Behavior::Fail(msg) => Err(TranslateError::Provider(msg.to_string())),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok("too late".to_string())
                }
            }
        }
    }

    #[tokio::test]
    async fn test_first_provider_wins() {
        let fallback = FakeTranslator::new("llm", Behavior::Succeed("unused"));
        let fallback_calls = fallback.calls.clone();
        let chain = FallbackTranslator::new()
            .with_provider(FakeTranslator::new("fast", Behavior::Succeed("Bonjour")))
            .with_provider(fallback);

        let result = chain.translate("Hello", "fr").await;
        assert_eq!(result.text, "Bonjour");
        assert_eq!(result.source, TranslationSource::Provider("fast".to_string()));
        assert!(!result.is_degraded());
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_falls_back_after_failure_and_empty_output() {
        let chain = FallbackTranslator::new()
            .with_provider(FakeTranslator::new("fast", Behavior::Fail("quota exceeded")))
            .with_provider(FakeTranslator::new("blank", Behavior::Succeed("  ")))
            .with_provider(FakeTranslator::new("llm", Behavior::Succeed("Hola")));

        let result = chain.translate("Hello", "es").await;
        assert_eq!(result.text, "Hola");
        assert_eq!(result.source, TranslationSource::Provider("llm".to_string()));
        assert_eq!(result.failures.len(), 2);
        assert_eq!(result.failures[0].message, "quota exceeded");
    }

    #[tokio::test]
    async fn test_total_failure_returns_original_flagged() {
        let chain = FallbackTranslator::new()
            .with_provider(FakeTranslator::new("fast", Behavior::Fail("offline")))
            .with_provider(FakeTranslator::new("llm", Behavior::Fail("no key")));

        let result = chain.translate("Hello", "de").await;
        assert_eq!(result.text, "Hello");
        assert_eq!(result.source, TranslationSource::Original);
        assert!(result.is_degraded());
        assert_eq!(result.failures.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_moves_to_next_provider() {
        let chain = FallbackTranslator::new()
            .with_timeout(Duration::from_secs(5))
            .with_provider(FakeTranslator::new("slow", Behavior::Hang))
            .with_provider(FakeTranslator::new("llm", Behavior::Succeed("Ciao")));

        let result = chain.translate("Hello", "it").await;
        assert_eq!(result.text, "Ciao");
        assert!(result.failures[0].message.starts_with("Timed out"));
    }

    #[tokio::test]
    async fn test_blank_text_skips_providers() {
        let provider = FakeTranslator::new("fast", Behavior::Succeed("x"));
        let calls = provider.calls.clone();
        let chain = FallbackTranslator::new().with_provider(provider);

        let result = chain.translate("   ", "fr").await;
        assert_eq!(result.text, "   ");
        assert!(!result.is_degraded());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
