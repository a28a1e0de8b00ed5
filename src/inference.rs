//! Inference rate limiter.
//!
//! Remote mood scoring is slow and metered, so every call goes through
//! [`InferenceCache`]:
//!
//! ```text
//!  lock ─▶ fresh hit? ─yes─▶ return
//!    │no
//!    ├─▶ token available? ─no─▶ stale entry? ─yes─▶ return stale
//!  unlock
//!  compute()                      (remote call, lock NOT held)
//!  lock ─▶ fresh entry appeared meanwhile? ─yes─▶ return it, drop ours
//!    └─▶ insert ours, return
//! ```
//!
//! Two callers that miss at the same moment may both compute; the cache
//! keeps whichever value landed first, so every later caller sees one value.
//!
//! The cache is the only state in the core mutated from several threads. A
//! single mutex guards both the entries and the token bucket.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use burster::Limiter;
use heapless::Deque;
use log::{debug, warn};

use crate::app::ports::{Clock, EmotionClassifier};
use crate::config::SystemConfig;

/// Entries kept per cache; the oldest is evicted first.
pub const CACHE_CAPACITY: usize = 8;

// ── Emotion score ──────────────────────────────────────────────

/// Mood score on a 1..=10 scale (1 = extremely negative, 10 = extremely
/// positive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EmotionScore(u8);

impl EmotionScore {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;
    pub const NEUTRAL: Self = Self(5);

    /// Clamp into range.
    pub fn new(value: i64) -> Self {
        Self(value.clamp(i64::from(Self::MIN), i64::from(Self::MAX)) as u8)
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// First standalone integer in a model answer ("Score: 7/10" → 7),
    /// clamped. `None` when the answer has no number.
    pub fn parse(answer: &str) -> Option<Self> {
        answer
            .split(|c: char| !c.is_ascii_digit())
            .find(|w| !w.is_empty())
            .map(|w| w.parse::<i64>().unwrap_or(i64::MAX))
            .map(Self::new)
    }
}

impl Default for EmotionScore {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl core::fmt::Display for EmotionScore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/10", self.0)
    }
}

// ── Cache ──────────────────────────────────────────────────────

struct CacheEntry<V> {
    key: u64,
    value: V,
    computed_at_ms: u64,
}

struct CacheInner<V> {
    entries: Deque<CacheEntry<V>, CACHE_CAPACITY>,
    bucket: burster::TokenBucket<fn() -> Duration>,
}

impl<V: Clone> CacheInner<V> {
    fn find(&self, key: u64) -> Option<&CacheEntry<V>> {
        self.entries.iter().find(|e| e.key == key)
    }

    fn fresh(&self, key: u64, now_ms: u64, ttl_ms: u64) -> Option<V> {
        self.find(key)
            .filter(|e| now_ms.saturating_sub(e.computed_at_ms) < ttl_ms)
            .map(|e| e.value.clone())
    }

    fn insert(&mut self, key: u64, value: V, now_ms: u64) {
        if let Some(e) = self.entries.iter_mut().find(|e| e.key == key) {
            e.value = value;
            e.computed_at_ms = now_ms;
            return;
        }
        if self.entries.is_full() {
            self.entries.pop_front();
        }
        let _ = self.entries.push_back(CacheEntry {
            key,
            value,
            computed_at_ms: now_ms,
        });
    }
}

/// TTL cache with a token-bucket throttle in front of the compute call.
pub struct InferenceCache<V, C: Clock> {
    inner: Mutex<CacheInner<V>>,
    clock: C,
}

impl<V: Clone, C: Clock> InferenceCache<V, C> {
    /// `rate_per_sec` tokens refill per second, up to `burst`.
    pub fn new(clock: C, rate_per_sec: u32, burst: u32) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: Deque::new(),
                bucket: burster::TokenBucket::new_with_time_provider(
                    u64::from(rate_per_sec),
                    u64::from(burst),
                    platform_now as fn() -> Duration,
                ),
            }),
            clock,
        }
    }

    pub fn from_config(cfg: &SystemConfig, clock: C) -> Self {
        Self::new(clock, cfg.inference_rate_per_sec, cfg.inference_burst)
    }

    /// Return the cached value for `key` if younger than `ttl`, otherwise run
    /// `compute` (without holding the lock) and cache its result.
    ///
    /// When the throttle is exhausted a stale value for the same key is
    /// served instead; with no stale value the call computes anyway.
    pub fn get_or_compute<F>(&self, key: &str, compute: F, ttl: Duration) -> V
    where
        F: FnOnce() -> V,
    {
        let hash = key_hash(key);
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);

        {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(v) = inner.fresh(hash, self.clock.now_ms(), ttl_ms) {
                debug!("Inference: cache hit");
                return v;
            }
            if inner.bucket.try_consume(1).is_err() {
                if let Some(stale) = inner.find(hash) {
                    debug!("Inference: throttled, serving stale value");
                    return stale.value.clone();
                }
                warn!("Inference: throttled with nothing cached, calling anyway");
            }
        }

        let value = compute();

        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let now_ms = self.clock.now_ms();
        if let Some(existing) = inner.fresh(hash, now_ms, ttl_ms) {
            debug!("Inference: concurrent result already cached, discarding ours");
            return existing;
        }
        inner.insert(hash, value.clone(), now_ms);
        value
    }

    /// Number of cached entries (fresh or stale).
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn key_hash(key: &str) -> u64 {
    let mut h = DefaultHasher::new();
    key.hash(&mut h);
    h.finish()
}

/// Time base for the token bucket.
fn platform_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}

// ── Classifiers ────────────────────────────────────────────────

/// Routes `classify` through an [`InferenceCache`]; `summarize` is passed
/// through uncached.
pub struct CachedClassifier<E, C: Clock> {
    inner: E,
    cache: InferenceCache<EmotionScore, C>,
    ttl: Duration,
}

impl<E: EmotionClassifier, C: Clock> CachedClassifier<E, C> {
    pub fn new(inner: E, cache: InferenceCache<EmotionScore, C>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }

    pub fn from_config(cfg: &SystemConfig, inner: E, clock: C) -> Self {
        Self::new(
            inner,
            InferenceCache::from_config(cfg, clock),
            Duration::from_secs(u64::from(cfg.emotion_cache_ttl_secs)),
        )
    }

    pub fn cache(&self) -> &InferenceCache<EmotionScore, C> {
        &self.cache
    }
}

impl<E: EmotionClassifier, C: Clock> EmotionClassifier for CachedClassifier<E, C> {
    fn classify(&self, text: &str) -> EmotionScore {
        self.cache
            .get_or_compute(text, || self.inner.classify(text), self.ttl)
    }

    fn summarize(&self, text: &str) -> String {
        self.inner.summarize(text)
    }
}

/// Local keyword estimate, used when no remote model is reachable.
///
/// Tiers are checked from most negative to most positive; intensifiers
/// ("very", "so") push the score outward, softeners ("a bit") inward.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

const INTENSIFIERS: &[&str] = &["extremely", "incredibly", "absolutely", "really", "very", "so", "super"];
const SOFTENERS: &[&str] = &["slightly", "a bit", "a little", "somewhat", "kind of", "sort of"];

/// (phrases, base score, intensified score, softened score)
const TIERS: &[(&[&str], u8, u8, u8)] = &[
    (
        &["want to die", "hopeless", "worthless", "can't go on", "give up", "hurt myself"],
        2,
        1,
        2,
    ),
    (
        &[
            "sad", "depressed", "anxious", "stressed", "overwhelmed", "worried", "scared",
            "afraid", "panic", "angry", "upset", "lonely", "exhausted", "struggling",
        ],
        3,
        2,
        4,
    ),
    (
        &["not great", "not good", "not okay", "not fine", "meh", "tired", "bored", "confused", "lost"],
        4,
        3,
        5,
    ),
    (&["okay", "fine", "normal", "alright", "ok", "usual", "nothing much"], 5, 5, 5),
    (&["good", "nice", "decent", "not bad", "better", "improving"], 6, 7, 6),
    (
        &["happy", "glad", "content", "grateful", "thankful", "excited", "proud", "motivated"],
        7,
        8,
        7,
    ),
    (&["great", "wonderful", "amazing", "fantastic", "awesome", "excellent", "perfect"], 8, 9, 8),
    (&["ecstatic", "euphoric", "overjoyed", "elated", "best day ever", "blessed"], 10, 10, 9),
];

impl EmotionClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> EmotionScore {
        let words = normalise(text);
        let has = |p: &&str| contains_words(&words, p);
        let intense = INTENSIFIERS.iter().any(has);
        let soft = SOFTENERS.iter().any(has);

        for &(phrases, base, up, down) in TIERS {
            if phrases.iter().any(has) {
                let score = if intense {
                    up
                } else if soft {
                    down
                } else {
                    base
                };
                return EmotionScore::new(i64::from(score));
            }
        }
        EmotionScore::NEUTRAL
    }

    fn summarize(&self, text: &str) -> String {
        const MAX_CHARS: usize = 80;
        let first = text
            .split(['.', '!', '?', '\n'])
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or_default();
        if first.chars().count() <= MAX_CHARS {
            first.to_string()
        } else {
            let mut out: String = first.chars().take(MAX_CHARS - 3).collect();
            out.push_str("...");
            out
        }
    }
}

/// Lowercased words joined by single spaces, padded so phrase matching can
/// require word boundaries.
fn normalise(text: &str) -> String {
    let mut out = String::from(" ");
    for w in text
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
    {
        out.push_str(&w.to_lowercase());
        out.push(' ');
    }
    out
}

fn contains_words(normalised: &str, phrase: &str) -> bool {
    normalised.contains(&format!(" {phrase} "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

    #[derive(Clone, Default)]
    struct TestClock(Arc<AtomicU64>);

    impl TestClock {
        fn advance(&self, ms: u64) {
            self.0.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl Clock for TestClock {
        fn now_ms(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    const TTL: Duration = Duration::from_secs(15);

    #[test]
    fn hit_within_ttl_skips_compute() {
        let clock = TestClock::default();
        let cache = InferenceCache::new(clock.clone(), 1, 10);
        let calls = AtomicU32::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            7u8
        };
        assert_eq!(cache.get_or_compute("hello", compute, TTL), 7);
        clock.advance(14_999);
        assert_eq!(cache.get_or_compute("hello", compute, TTL), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(1);
        assert_eq!(cache.get_or_compute("hello", || 3u8, TTL), 3);
    }

    #[test]
    fn concurrent_callers_after_first_compute_share_one_value() {
        let cache = Arc::new(InferenceCache::new(TestClock::default(), 1, 10));
        let calls = Arc::new(AtomicU32::new(0));
        let first = {
            let calls = calls.clone();
            cache.get_or_compute("same", move || {
                calls.fetch_add(1, Ordering::SeqCst);
                5u8
            }, TTL)
        };
        assert_eq!(first, 5);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                std::thread::spawn(move || {
                    cache.get_or_compute("same", || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        9u8
                    }, TTL)
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 5);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn overlapping_miss_converges_on_first_completed_value() {
        // The second caller misses while the first is still computing
        // (lock released), finishes first, and wins.
        let cache = InferenceCache::new(TestClock::default(), 1, 10);
        let outer = cache.get_or_compute(
            "k",
            || {
                let inner = cache.get_or_compute("k", || 2u8, TTL);
                assert_eq!(inner, 2);
                8u8
            },
            TTL,
        );
        assert_eq!(outer, 2);
        assert_eq!(cache.get_or_compute("k", || 99u8, TTL), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn throttled_miss_serves_stale_value() {
        let clock = TestClock::default();
        let cache = InferenceCache::new(clock.clone(), 0, 1);
        assert_eq!(cache.get_or_compute("k", || 4u8, TTL), 4);
        clock.advance(60_000);
        // Bucket is empty and never refills: stale value wins.
        assert_eq!(cache.get_or_compute("k", || 6u8, TTL), 4);
        // Unknown key with no stale value still gets computed.
        assert_eq!(cache.get_or_compute("other", || 6u8, TTL), 6);
    }

    #[test]
    fn oldest_entry_is_evicted() {
        let cache = InferenceCache::new(TestClock::default(), 100, 100);
        for i in 0..=CACHE_CAPACITY as u8 {
            cache.get_or_compute(&format!("k{i}"), || i, TTL);
        }
        assert_eq!(cache.len(), CACHE_CAPACITY);
        assert_eq!(cache.get_or_compute("k0", || 200, TTL), 200);
        assert_eq!(cache.get_or_compute("k8", || 200, TTL), 8);
    }

    #[test]
    fn score_parse_and_clamp() {
        assert_eq!(EmotionScore::parse("7"), Some(EmotionScore::new(7)));
        assert_eq!(EmotionScore::parse("Score: 3/10"), Some(EmotionScore::new(3)));
        assert_eq!(EmotionScore::parse("42").map(EmotionScore::get), Some(10));
        assert_eq!(EmotionScore::parse("0").map(EmotionScore::get), Some(1));
        assert_eq!(EmotionScore::parse("no idea"), None);
        assert_eq!(EmotionScore::default().get(), 5);
    }

    #[test]
    fn keyword_tiers() {
        let k = KeywordClassifier;
        assert_eq!(k.classify("I feel hopeless").get(), 2);
        assert_eq!(k.classify("I'm so stressed").get(), 2);
        assert_eq!(k.classify("a bit worried").get(), 4);
        assert_eq!(k.classify("not good today").get(), 4);
        assert_eq!(k.classify("fine").get(), 5);
        assert_eq!(k.classify("really happy!").get(), 8);
        assert_eq!(k.classify("best day ever").get(), 10);
        assert_eq!(k.classify("the weather").get(), 5);
        // "sadness" is not "sad"
        assert_eq!(k.classify("sadness").get(), 5);
    }

    #[test]
    fn cached_classifier_hits_inner_once() {
        struct Counting(AtomicU32);
        impl EmotionClassifier for Counting {
            fn classify(&self, _text: &str) -> EmotionScore {
                self.0.fetch_add(1, Ordering::SeqCst);
                EmotionScore::new(6)
            }
            fn summarize(&self, text: &str) -> String {
                text.to_uppercase()
            }
        }

        let c = CachedClassifier::new(
            Counting(AtomicU32::new(0)),
            InferenceCache::new(TestClock::default(), 1, 3),
            TTL,
        );
        assert_eq!(c.classify("hi").get(), 6);
        assert_eq!(c.classify("hi").get(), 6);
        assert_eq!(c.inner.0.load(Ordering::SeqCst), 1);
        assert_eq!(c.summarize("hi"), "HI");
    }

    #[test]
    fn summary_is_first_sentence_truncated() {
        let k = KeywordClassifier;
        assert_eq!(k.summarize("  I fell. It hurts."), "I fell");
        let long = "a".repeat(200);
        let s = k.summarize(&long);
        assert_eq!(s.chars().count(), 80);
        assert!(s.ends_with("..."));
    }
}
