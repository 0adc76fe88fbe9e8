use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::ops::Range;

// Seeded draw stream using the provably-fair HMAC construction:
// server_seed (key) + "client_seed:nonce" -> HMAC-SHA256 -> 4-byte chunks -> floats in [0,1)
// The nonce advances each time a block of floats is used up, so a whole session
// replays from its two seeds. Not meant to be unpredictable.

pub type HmacSha256 = Hmac<Sha256>;

const FLOATS_PER_BLOCK: usize = 8;

pub fn derive_hash_hex(input: &[u8]) -> String {
    hex::encode(Sha256::digest(input))
}

pub fn derive_floats(hmac_bytes: &[u8], count: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(count);
    let mut buffer = hmac_bytes.to_vec();
    let mut i = 0usize;
    while out.len() < count {
        if i + 4 > buffer.len() {
            // extend deterministically by hashing the previous buffer
            buffer = Sha256::digest(&buffer).to_vec();
            i = 0;
            continue;
        }
        let v = u32::from_be_bytes([buffer[i], buffer[i + 1], buffer[i + 2], buffer[i + 3]]);
        out.push((v as f64) / (u32::MAX as f64 + 1.0));
        i += 4;
    }
    out
}

/// Source of uniform randomness for the engine. Every draw the policy and the
/// reel generator make goes through here, in a fixed order.
pub trait Draws {
    /// Uniform in `[0, 1)`.
    fn next_unit(&mut self) -> f64;

    /// Uniform in `[0, 100)`.
    fn percent(&mut self) -> f64 {
        self.next_unit() * 100.0
    }

    /// Uniform index inside `range`. Panics on an empty range.
    fn pick(&mut self, range: Range<usize>) -> usize {
        let len = range.end - range.start;
        assert!(len > 0, "pick from empty range");
        let offset = (self.next_unit() * len as f64).floor() as usize;
        range.start + offset.min(len - 1)
    }
}

impl<D: Draws + ?Sized> Draws for &mut D {
    fn next_unit(&mut self) -> f64 {
        (**self).next_unit()
    }
}

#[derive(Debug, Clone)]
pub struct SeededDraws {
    server_seed: String,
    client_seed: String,
    nonce: u64,
    block: Vec<f64>,
    cursor: usize,
}

impl SeededDraws {
    pub fn new(server_seed: impl Into<String>, client_seed: impl Into<String>, nonce: u64) -> Self {
        Self {
            server_seed: server_seed.into(),
            client_seed: client_seed.into(),
            nonce,
            block: Vec::new(),
            cursor: 0,
        }
    }

    /// Fresh random server seed; the client seed is fixed.
    pub fn from_entropy() -> Self {
        let seed: [u8; 32] = rand::thread_rng().gen();
        Self::new(hex::encode(seed), "reelbias", 0)
    }

    pub fn server_seed_hash_hex(&self) -> String {
        derive_hash_hex(self.server_seed.as_bytes())
    }

    pub fn client_seed(&self) -> &str {
        &self.client_seed
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hmac_bytes(&self) -> [u8; 32] {
        let mut mac = HmacSha256::new_from_slice(self.server_seed.as_bytes())
            .expect("HMAC accepts keys of any length");
        let msg = format!("{}:{}", self.client_seed, self.nonce);
        mac.update(msg.as_bytes());
        let res = mac.finalize().into_bytes();
        let mut out = [0u8; 32];
        out.copy_from_slice(&res);
        out
    }

    fn refill(&mut self) {
        self.block = derive_floats(&self.hmac_bytes(), FLOATS_PER_BLOCK);
        self.cursor = 0;
        self.nonce += 1;
    }
}

impl Draws for SeededDraws {
    fn next_unit(&mut self) -> f64 {
        if self.cursor >= self.block.len() {
            self.refill();
        }
        let v = self.block[self.cursor];
        self.cursor += 1;
        v
    }
}

/// Plays back a fixed list of unit draws, then continues from a seeded stream.
#[derive(Debug, Clone)]
pub struct ScriptedDraws {
    script: VecDeque<f64>,
    fallback: SeededDraws,
    consumed: usize,
}

impl ScriptedDraws {
    pub fn new(script: impl IntoIterator<Item = f64>) -> Self {
        Self {
            script: script.into_iter().collect(),
            fallback: SeededDraws::new("scripted", "fallback", 0),
            consumed: 0,
        }
    }

    /// Unit draw that lands on `index` when picking from `0..len`.
    pub fn unit_for_index(index: usize, len: usize) -> f64 {
        (index as f64 + 0.5) / len as f64
    }

    /// Unit draw for a `[0, 100)` percent draw of `value`.
    pub fn unit_for_percent(value: f64) -> f64 {
        value / 100.0
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

impl Draws for ScriptedDraws {
    fn next_unit(&mut self) -> f64 {
        self.consumed += 1;
        match self.script.pop_front() {
            Some(v) => v,
            None => self.fallback.next_unit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinism() {
        let mut a = SeededDraws::new("server", "client", 1);
        let mut b = SeededDraws::new("server", "client", 1);
        assert_eq!(a.server_seed_hash_hex(), b.server_seed_hash_hex());
        assert_eq!(a.hmac_bytes(), b.hmac_bytes());
        let xs: Vec<f64> = (0..20).map(|_| a.next_unit()).collect();
        let ys: Vec<f64> = (0..20).map(|_| b.next_unit()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn nonce_advances_per_block() {
        let mut draws = SeededDraws::new("server", "client", 0);
        for _ in 0..FLOATS_PER_BLOCK {
            draws.next_unit();
        }
        assert_eq!(draws.nonce(), 1);
        draws.next_unit();
        assert_eq!(draws.nonce(), 2);
    }

    #[test]
    fn units_stay_in_range() {
        let mut draws = SeededDraws::new("s", "c", 42);
        for _ in 0..500 {
            let v = draws.next_unit();
            assert!((0.0..1.0).contains(&v));
            let idx = draws.pick(4..8);
            assert!((4..8).contains(&idx));
        }
    }

    #[test]
    fn derive_floats_extends_past_block() {
        let bytes = [7u8; 32];
        let floats = derive_floats(&bytes, 20);
        assert_eq!(floats.len(), 20);
        assert_eq!(&floats[..8], &derive_floats(&bytes, 8)[..]);
    }

    #[test]
    fn scripted_plays_back_then_falls_back() {
        let mut draws = ScriptedDraws::new([0.25, 0.5]);
        assert_eq!(draws.next_unit(), 0.25);
        assert_eq!(draws.percent(), 50.0);
        assert_eq!(draws.remaining(), 0);
        let v = draws.next_unit();
        assert!((0.0..1.0).contains(&v));
        assert_eq!(draws.consumed(), 3);
    }

    #[test]
    fn unit_for_index_picks_that_index() {
        for i in 0..8 {
            let mut draws = ScriptedDraws::new([ScriptedDraws::unit_for_index(i, 8)]);
            assert_eq!(draws.pick(0..8), i);
        }
        let mut draws = ScriptedDraws::new([ScriptedDraws::unit_for_index(2, 4)]);
        assert_eq!(draws.pick(4..8), 6);
    }
}
