// Minimal PRNG (no external crates).
//
// This is NOT cryptographically secure.
// It drives the decorative random walk, status flips and alert rolls, and keeps
// seeded runs reproducible in tests.

#[derive(Debug, Clone)]
pub struct Prng {
    state: u64,
}

impl Prng {
    pub fn new(seed: u64) -> Self {
        // Avoid a zero state.
        let seed = if seed == 0 { 0x9E3779B97F4A7C15 } else { seed };
        Self { state: seed }
    }

    /// Derive an independent stream from this one (store and simulator each own one).
    pub fn fork(&mut self, salt: u64) -> Self {
        Self::new(self.next_u64() ^ salt.rotate_left(17))
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    #[inline]
    pub fn next_f32_01(&mut self) -> f32 {
        // Convert to [0,1).
        let x = self.next_u32() >> 8;
        (x as f32) / ((1u32 << 24) as f32)
    }

    #[inline]
    pub fn gen_range_f32(&mut self, low: f32, high: f32) -> f32 {
        low + (high - low) * self.next_f32_01()
    }

    /// Uniform integer in `[low, high]` (inclusive).
    #[inline]
    pub fn gen_range_u32(&mut self, low: u32, high: u32) -> u32 {
        if high <= low {
            return low;
        }
        let span = high - low + 1;
        low + self.next_u32() % span
    }

    #[inline]
    pub fn gen_index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        (self.next_u32() as usize) % len
    }

    /// Bernoulli trial with probability `p` (clamped to [0,1]).
    #[inline]
    pub fn chance(&mut self, p: f32) -> bool {
        self.next_f32_01() < p.clamp(0.0, 1.0)
    }

    /// Symmetric jitter in `[-span/2, span/2)`.
    #[inline]
    pub fn jitter(&mut self, span: f32) -> f32 {
        (self.next_f32_01() - 0.5) * span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = Prng::new(7);
        let mut b = Prng::new(7);
        for _ in 0..64 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn ranges_are_respected() {
        let mut rng = Prng::new(42);
        for _ in 0..1000 {
            let f = rng.next_f32_01();
            assert!((0.0..1.0).contains(&f));
            let j = rng.jitter(0.01);
            assert!((-0.005..0.005).contains(&j));
            let v = rng.gen_range_u32(10, 90);
            assert!((10..=90).contains(&v));
            assert!(rng.gen_index(5) < 5);
        }
        assert!(!rng.chance(0.0));
        assert!(rng.chance(1.0));
    }
}
