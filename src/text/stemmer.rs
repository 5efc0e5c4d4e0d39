//! Pluggable token stemming

use std::fmt;

use rust_stemmers::{Algorithm, Stemmer as SnowballStemmer};

/// Reduces a normalized token to its stem
pub trait Stemmer: Send + Sync {
    fn stem(&self, token: &str) -> String;
}

/// Snowball English stemmer
pub struct EnglishStemmer {
    inner: SnowballStemmer,
}

impl EnglishStemmer {
    pub fn new() -> Self {
        Self {
            inner: SnowballStemmer::create(Algorithm::English),
        }
    }
}

impl Default for EnglishStemmer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EnglishStemmer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EnglishStemmer")
    }
}

impl Stemmer for EnglishStemmer {
    fn stem(&self, token: &str) -> String {
        self.inner.stem(token).into_owned()
    }
}

/// Leaves tokens unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityStemmer;

impl Stemmer for IdentityStemmer {
    fn stem(&self, token: &str) -> String {
        token.to_string()
    }
}
