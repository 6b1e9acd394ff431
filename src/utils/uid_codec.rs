//! Short code ("UID") encoding and validation.
//!
//! Codes are produced with a salted Hashids encoder: the same id, salt and
//! minimum length always give the same code, while a different salt gives a
//! different one. This obscures sequential ids from casual enumeration but is
//! not a security boundary.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

#[cfg(test)]
use crate::utils::nonce_generator::Clock;
use crate::utils::nonce_generator::NonceGenerator;

const DEFAULT_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890";
const DEFAULT_SEPARATORS: &str = "cfhistuCFHISTU";
const SEPARATOR_DIV: f64 = 3.5;
const GUARD_DIV: f64 = 12.0;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to compile code pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("cannot encode negative id {0}")]
    NegativeId(i64),
}

/// What a generated code is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UidStrategy {
    /// Encode the store-assigned record id.
    #[default]
    Sequential,
    /// Encode a millisecond nonce from [`NonceGenerator`].
    Timestamp,
}

impl FromStr for UidStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "timestamp" => Ok(Self::Timestamp),
            other => Err(format!(
                "unknown uid strategy '{other}', expected 'sequential' or 'timestamp'"
            )),
        }
    }
}

impl fmt::Display for UidStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => f.write_str("sequential"),
            Self::Timestamp => f.write_str("timestamp"),
        }
    }
}

/// Encodes record ids into short codes and validates code syntax.
pub struct UidCodec {
    hashids: Hashids,
    min_length: usize,
    strategy: UidStrategy,
    nonces: NonceGenerator,
    matcher: Regex,
}

impl UidCodec {
    /// Builds a codec for the given salt and minimum code length.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Pattern`] if the validation pattern fails to compile.
    pub fn new(
        salt: &str,
        min_length: usize,
        strategy: UidStrategy,
    ) -> Result<Self, CodecError> {
        Self::build(salt, min_length, strategy, NonceGenerator::new())
    }

    /// Timestamp codec reading nonces from `clock`.
    #[cfg(test)]
    pub(crate) fn with_clock(
        salt: &str,
        min_length: usize,
        clock: impl Clock + 'static,
    ) -> Result<Self, CodecError> {
        Self::build(
            salt,
            min_length,
            UidStrategy::Timestamp,
            NonceGenerator::with_clock(clock),
        )
    }

    fn build(
        salt: &str,
        min_length: usize,
        strategy: UidStrategy,
        nonces: NonceGenerator,
    ) -> Result<Self, CodecError> {
        let matcher = Regex::new(&format!("^(?:{})$", pattern_for(min_length)))?;

        Ok(Self {
            hashids: Hashids::new(salt.as_bytes(), min_length),
            min_length,
            strategy,
            nonces,
            matcher,
        })
    }

    pub fn strategy(&self) -> UidStrategy {
        self.strategy
    }

    /// Deterministically encodes a non-negative integer.
    pub fn encode(&self, value: u64) -> String {
        self.hashids.encode(&[value])
    }

    /// Produces the code for a freshly assigned record id.
    ///
    /// With [`UidStrategy::Sequential`] this is `encode(id)`; with
    /// [`UidStrategy::Timestamp`] the id is ignored and a nonce is encoded.
    pub fn code_for(&self, id: i64) -> Result<String, CodecError> {
        match self.strategy {
            UidStrategy::Sequential => {
                let value = u64::try_from(id).map_err(|_| CodecError::NegativeId(id))?;
                Ok(self.encode(value))
            }
            UidStrategy::Timestamp => Ok(self.encode(self.nonces.next_nonce())),
        }
    }

    /// Regex fragment matching every code this codec can produce.
    ///
    /// Unanchored, for embedding in route patterns.
    pub fn pattern(&self) -> String {
        pattern_for(self.min_length)
    }

    /// Checks code syntax. Does not check that a record exists.
    pub fn is_valid(&self, code: &str) -> bool {
        self.matcher.is_match(code)
    }
}

fn pattern_for(min_length: usize) -> String {
    format!("[0-9a-zA-Z]{{{},}}", min_length.max(1))
}

/// Hashids encoder (v1 algorithm, default alphabet).
struct Hashids {
    salt: Vec<u8>,
    min_length: usize,
    alphabet: Vec<u8>,
    separators: Vec<u8>,
    guards: Vec<u8>,
}

impl Hashids {
    fn new(salt: &[u8], min_length: usize) -> Self {
        let mut separators: Vec<u8> = DEFAULT_SEPARATORS
            .bytes()
            .filter(|c| DEFAULT_ALPHABET.as_bytes().contains(c))
            .collect();
        let mut alphabet: Vec<u8> = DEFAULT_ALPHABET
            .bytes()
            .filter(|c| !separators.contains(c))
            .collect();

        consistent_shuffle(&mut separators, salt);

        if separators.is_empty()
            || alphabet.len() as f64 / separators.len() as f64 > SEPARATOR_DIV
        {
            let mut wanted = (alphabet.len() as f64 / SEPARATOR_DIV).ceil() as usize;
            if wanted == 1 {
                wanted = 2;
            }

            if wanted > separators.len() {
                let diff = wanted - separators.len();
                separators.extend(alphabet.drain(..diff));
            } else {
                separators.truncate(wanted);
            }
        }

        consistent_shuffle(&mut alphabet, salt);

        let guard_count = (alphabet.len() as f64 / GUARD_DIV).ceil() as usize;
        let guards = if alphabet.len() < 3 {
            separators.drain(..guard_count).collect()
        } else {
            alphabet.drain(..guard_count).collect()
        };

        Self {
            salt: salt.to_vec(),
            min_length,
            alphabet,
            separators,
            guards,
        }
    }

    fn encode(&self, numbers: &[u64]) -> String {
        let mut alphabet = self.alphabet.clone();

        let numbers_hash: u64 = numbers
            .iter()
            .enumerate()
            .map(|(i, n)| n % (i as u64 + 100))
            .sum();

        let lottery = alphabet[(numbers_hash % alphabet.len() as u64) as usize];
        let mut result = vec![lottery];

        for (i, &number) in numbers.iter().enumerate() {
            let mut buffer = Vec::with_capacity(1 + self.salt.len() + alphabet.len());
            buffer.push(lottery);
            buffer.extend_from_slice(&self.salt);
            buffer.extend_from_slice(&alphabet);

            let len = alphabet.len();
            consistent_shuffle(&mut alphabet, &buffer[..len]);

            let last = hash(number, &alphabet);
            result.extend_from_slice(&last);

            if i + 1 < numbers.len() {
                let reduced = number % (last[0] as u64 + i as u64);
                result.push(self.separators[(reduced % self.separators.len() as u64) as usize]);
            }
        }

        if result.len() < self.min_length {
            let index = (numbers_hash + result[0] as u64) % self.guards.len() as u64;
            result.insert(0, self.guards[index as usize]);

            if result.len() < self.min_length {
                let index = (numbers_hash + result[2] as u64) % self.guards.len() as u64;
                result.push(self.guards[index as usize]);
            }
        }

        let half = alphabet.len() / 2;
        while result.len() < self.min_length {
            let key = alphabet.clone();
            consistent_shuffle(&mut alphabet, &key);

            let mut padded = Vec::with_capacity(alphabet.len() + result.len());
            padded.extend_from_slice(&alphabet[half..]);
            padded.extend_from_slice(&result);
            padded.extend_from_slice(&alphabet[..half]);
            result = padded;

            if result.len() > self.min_length {
                let start = (result.len() - self.min_length) / 2;
                result = result[start..start + self.min_length].to_vec();
            }
        }

        result.into_iter().map(char::from).collect()
    }
}

fn consistent_shuffle(alphabet: &mut [u8], salt: &[u8]) {
    if salt.is_empty() || alphabet.len() < 2 {
        return;
    }

    let mut v = 0usize;
    let mut p = 0usize;
    let mut i = alphabet.len() - 1;

    while i > 0 {
        v %= salt.len();
        let integer = salt[v] as usize;
        p += integer;
        let j = (integer + v + p) % i;
        alphabet.swap(i, j);

        i -= 1;
        v += 1;
    }
}

fn hash(mut input: u64, alphabet: &[u8]) -> Vec<u8> {
    let len = alphabet.len() as u64;
    let mut out = Vec::new();

    loop {
        out.push(alphabet[(input % len) as usize]);
        input /= len;
        if input == 0 {
            break;
        }
    }

    out.reverse();
    out
}
