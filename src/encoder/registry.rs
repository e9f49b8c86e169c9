use super::{EncoderFactory, SyntheticFactory};
use crate::dataset::OutputShape;
use crate::error::EncodeError;
use std::collections::HashMap;
use std::sync::Arc;

type FactoryBuilder = Box<dyn Fn(&OutputShape) -> Arc<dyn EncoderFactory> + Send + Sync>;

/// Registry of available encoder backends, selected by name from config
pub struct EncoderRegistry {
    builders: HashMap<String, FactoryBuilder>,
}

impl EncoderRegistry {
    pub fn new() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Registry with the built-in `synthetic` backend
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("synthetic", |shape| {
            Arc::new(SyntheticFactory::new(*shape)) as Arc<dyn EncoderFactory>
        });
        registry
    }

    pub fn register<F>(&mut self, name: &str, builder: F)
    where
        F: Fn(&OutputShape) -> Arc<dyn EncoderFactory> + Send + Sync + 'static,
    {
        self.builders.insert(name.to_string(), Box::new(builder));
    }

    pub fn create(
        &self,
        name: &str,
        shape: &OutputShape,
    ) -> Result<Arc<dyn EncoderFactory>, EncodeError> {
        self.builders
            .get(name)
            .map(|builder| builder(shape))
            .ok_or_else(|| EncodeError::UnknownEncoder(name.to_string()))
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.builders.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for EncoderRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_synthetic() {
        let registry = EncoderRegistry::with_builtin();
        assert_eq!(registry.list(), vec!["synthetic".to_string()]);
        assert!(registry.create("synthetic", &OutputShape::default()).is_ok());
    }

    #[test]
    fn test_unknown_encoder() {
        let registry = EncoderRegistry::new();
        let err = registry
            .create("clip-vit-l14", &OutputShape::default())
            .err()
            .unwrap();
        assert!(matches!(err, EncodeError::UnknownEncoder(name) if name == "clip-vit-l14"));
    }
}
