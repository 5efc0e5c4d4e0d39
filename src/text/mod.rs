//! Text handling shared by the registry and the per-domain indexes

mod normalize;
mod stemmer;

pub use normalize::{
    build_index_string, determine_data_type, has_vowel_and_alpha, normalize, pad, split_tokens,
    truncate, DataType,
};
pub use stemmer::{EnglishStemmer, IdentityStemmer, Stemmer};
