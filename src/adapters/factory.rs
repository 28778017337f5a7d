//! Adapter factory with a per-endpoint cache.

use super::{
    ChatCompletionAdapter, EndpointAdapter, FileValidator, FsFileValidator, ImageEditAdapter,
    ImageGenerationAdapter, ImageVariationAdapter, ResponseApiAdapter, SpeechAdapter,
    TranscriptionAdapter, TranslationAdapter,
};
use crate::endpoint::Endpoint;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Resolves one adapter per endpoint kind and memoizes it for the factory's lifetime.
///
/// Adapters hold no per-call state, so the cache is read-mostly and shared by all turns.
pub struct AdapterFactory {
    validator: Arc<dyn FileValidator>,
    cache: RwLock<HashMap<Endpoint, Arc<dyn EndpointAdapter>>>,
}

impl AdapterFactory {
    pub fn new(validator: Arc<dyn FileValidator>) -> Self {
        Self {
            validator,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn make(&self, endpoint: Endpoint) -> Arc<dyn EndpointAdapter> {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(adapter) = cache.get(&endpoint) {
                return adapter.clone();
            }
        }
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache
            .entry(endpoint)
            .or_insert_with(|| {
                debug!(endpoint = endpoint.as_str(), "creating adapter");
                self.build(endpoint)
            })
            .clone()
    }

    pub fn cached(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn build(&self, endpoint: Endpoint) -> Arc<dyn EndpointAdapter> {
        let v = self.validator.clone();
        match endpoint {
            Endpoint::AudioTranscription => Arc::new(TranscriptionAdapter::new(v)),
            Endpoint::AudioTranslation => Arc::new(TranslationAdapter::new(v)),
            Endpoint::AudioSpeech => Arc::new(SpeechAdapter),
            Endpoint::ImageGeneration => Arc::new(ImageGenerationAdapter),
            Endpoint::ImageEdit => Arc::new(ImageEditAdapter::new(v)),
            Endpoint::ImageVariation => Arc::new(ImageVariationAdapter::new(v)),
            Endpoint::ChatCompletion => Arc::new(ChatCompletionAdapter),
            Endpoint::ResponseApi => Arc::new(ResponseApiAdapter),
        }
    }
}

impl Default for AdapterFactory {
    fn default() -> Self {
        Self::new(Arc::new(FsFileValidator))
    }
}

impl std::fmt::Debug for AdapterFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterFactory")
            .field("validator", &self.validator)
            .field("cached", &self.cached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memoizes_one_adapter_per_endpoint() {
        let factory = AdapterFactory::default();
        let a = factory.make(Endpoint::ChatCompletion);
        let b = factory.make(Endpoint::ChatCompletion);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.cached(), 1);

        for e in Endpoint::ALL {
            assert_eq!(factory.make(e).endpoint(), e);
        }
        assert_eq!(factory.cached(), 8);
    }
}
