//! Savefile text format for class models
//!
//! ```text
//! <genome_count_bits> <feature_total_bits> <n_features> [<key> <feature_bits>] x n_features
//! ```
//!
//! Every `*_bits` token is the IEEE-754 bit pattern of an `f64` written as an
//! unsigned decimal integer, so values survive a round-trip bit for bit.

use std::fmt::{Display, Write};
use std::str::FromStr;

use crate::core::errors::{ClassModelError, Result};

/// Consolidated class parameters as stored on disk
#[derive(Debug, Clone, PartialEq)]
pub struct SavedState<K> {
    pub genome_count_log: f64,
    pub feature_total_log: f64,
    pub features: Vec<(K, f64)>,
}

/// Render consolidated parameters as a single savefile line.
pub fn encode<'a, K, I>(genome_count_log: f64, feature_total_log: f64, features: I) -> String
where
    K: Display + 'a,
    I: ExactSizeIterator<Item = (&'a K, f64)>,
{
    let mut out = String::with_capacity(48 + features.len() * 28);
    // Writing into a String cannot fail
    let _ = write!(
        out,
        "{} {} {}",
        genome_count_log.to_bits(),
        feature_total_log.to_bits(),
        features.len()
    );
    for (key, log_value) in features {
        let _ = write!(out, " {} {}", key, log_value.to_bits());
    }
    out
}

/// Parse a savefile. Fails without partial output on any malformed token.
pub fn decode<K: FromStr>(text: &str) -> Result<SavedState<K>> {
    let mut tokens = text.split_ascii_whitespace();

    let genome_count_log = next_bits(&mut tokens, "genome count")?;
    let feature_total_log = next_bits(&mut tokens, "feature total")?;
    let declared = next_token(&mut tokens, "feature count")?;
    let declared: usize = declared.parse().map_err(|_| {
        ClassModelError::format(format!("invalid feature count '{}'", declared))
    })?;

    let mut features = Vec::with_capacity(declared.min(text.len() / 4));
    for index in 0..declared {
        let key = tokens.next().ok_or_else(|| truncated(declared, index))?;
        let key = key
            .parse::<K>()
            .map_err(|_| ClassModelError::format(format!("invalid feature key '{}'", key)))?;
        let bits = tokens.next().ok_or_else(|| truncated(declared, index))?;
        features.push((key, parse_bits(bits, "feature value")?));
    }

    if let Some(extra) = tokens.next() {
        return Err(ClassModelError::format(format!(
            "unexpected token '{}' after {} declared features",
            extra, declared
        )));
    }

    Ok(SavedState {
        genome_count_log,
        feature_total_log,
        features,
    })
}

fn next_token<'a>(tokens: &mut impl Iterator<Item = &'a str>, field: &str) -> Result<&'a str> {
    tokens
        .next()
        .ok_or_else(|| ClassModelError::format(format!("missing {} in savefile header", field)))
}

fn next_bits<'a>(tokens: &mut impl Iterator<Item = &'a str>, field: &str) -> Result<f64> {
    let token = next_token(tokens, field)?;
    parse_bits(token, field)
}

fn parse_bits(token: &str, field: &str) -> Result<f64> {
    token
        .parse::<u64>()
        .map(f64::from_bits)
        .map_err(|_| ClassModelError::format(format!("invalid {} bit pattern '{}'", field, token)))
}

fn truncated(declared: usize, index: usize) -> ClassModelError {
    ClassModelError::format(format!(
        "savefile declares {} features but ends after {}",
        declared, index
    ))
}
