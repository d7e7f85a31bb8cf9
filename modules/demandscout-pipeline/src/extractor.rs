// Demand Extractor — cheap lexical pre-filter, independent of the LLM judge.
//
// A configurable set of phrasal signals maps to a base confidence in [0, 1];
// urgency derives from a disjoint time-pressure signal set. Items matching no
// signal are dropped, not errored.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use demandscout_common::text;
use demandscout_common::types::{DemandCandidate, NormalizedItem};

/// Raw signal hits at or above this count saturate confidence at 1.0.
const CONFIDENCE_SATURATION: f64 = 5.0;
/// Urgency hits at or above this count saturate urgency at 1.0.
const URGENCY_SATURATION: f64 = 2.0;
/// Demand statements are shortened to this many characters for summaries.
const DEMAND_TEXT_MAX_LEN: usize = 170;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).expect("static pattern must compile"))
        .collect()
}

static DEMAND_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\bi need\b",
        r"\bi wish\b",
        r"\blooking for\b",
        r"\bdoes anyone know\b",
        r"\bany app\b",
        r"\bany tool\b",
        r"\bhow do i\b",
        r"\bstruggling with\b",
        r"\bproblem with\b",
        r"\bfrustrat(?:e|ed|ing)\b",
        r"\bwant (?:an|a) (?:app|tool|way)\b",
        r"\bthere should be\b",
    ])
});

static ASK_INTENT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\bi need\b",
        r"\blooking for\b",
        r"\bdoes anyone know\b",
        r"\bneed advice\b",
        r"\bany recommendation\b",
        r"\bany app\b",
        r"\bany tool\b",
        r"\bany software\b",
        r"\bis there (?:any|a)\b",
        r"\bhow do i\b",
        r"\bcan anyone\b",
    ])
});

static PRODUCT_INTENT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\bapp\b",
        r"\btool\b",
        r"\bsoftware\b",
        r"\bplatform\b",
        r"\bautomation\b",
        r"\bautomate\b",
        r"\bworkflow\b",
        r"\bintegration\b",
        r"\bplugin\b",
        r"\bdashboard\b",
        r"\bextension\b",
    ])
});

static EXCLUDE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\bi will not promote\b",
        r"\blooking for (?:cofounder|co-founder|founder|partner|job)\b",
        r"\blooking for feedback\b",
        r"\broast my\b",
        r"\brate my\b",
    ])
});

static SELF_PROMO_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\bi built\b",
        r"\bi'm building\b",
        r"\bwe built\b",
        r"\blaunched\b",
        r"\blaunching\b",
        r"\bmvp\b",
        r"\bwaitlist\b",
        r"\bcofounder\b",
        r"\bco-founder\b",
    ])
});

static URGENCY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\burgent\b",
        r"\basap\b",
        r"\bright now\b",
        r"\bimmediately\b",
        r"\bdeadline\b",
        r"\bblocked\b",
    ])
});

static FIRST_PERSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(i|we)\b").unwrap());
static NEED_VERB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(need|wish|want|looking)\b").unwrap());

fn pattern_hits(patterns: &[Regex], text: &str) -> usize {
    patterns.iter().filter(|p| p.is_match(text)).count()
}

pub struct DemandExtractor {
    min_confidence: f64,
    exclude_self_promo: bool,
}

impl DemandExtractor {
    pub fn new(min_confidence: f64) -> Self {
        Self {
            min_confidence,
            exclude_self_promo: true,
        }
    }

    /// Keep self-promotional founder posts instead of dropping them.
    pub fn include_self_promo(mut self) -> Self {
        self.exclude_self_promo = false;
        self
    }

    /// Classify one normalized item. `None` means "not a demand", not an error.
    pub fn extract(&self, item: NormalizedItem) -> Option<DemandCandidate> {
        let combined = &item.canonical_text;

        if pattern_hits(&EXCLUDE_PATTERNS, combined) > 0 {
            debug!(source_id = %item.raw.source_id, "Dropped by exclusion pattern");
            return None;
        }
        if self.exclude_self_promo && pattern_hits(&SELF_PROMO_PATTERNS, combined) > 0 {
            debug!(source_id = %item.raw.source_id, "Dropped as self-promotion");
            return None;
        }

        let confidence = self.confidence_score(combined);
        if confidence < self.min_confidence {
            return None;
        }

        let demand_text = best_demand_sentence(&item);
        let intent_scope = format!("{} {}", item.raw.title, demand_text);
        if pattern_hits(&ASK_INTENT_PATTERNS, &intent_scope) == 0 {
            return None;
        }
        if pattern_hits(&PRODUCT_INTENT_PATTERNS, &intent_scope) == 0 {
            return None;
        }

        let urgency = urgency_score(combined);
        Some(DemandCandidate {
            demand_text: text::shorten(&demand_text, DEMAND_TEXT_MAX_LEN),
            confidence,
            urgency,
            item,
        })
    }

    fn confidence_score(&self, combined: &str) -> f64 {
        let mut raw = pattern_hits(&DEMAND_PATTERNS, combined);
        if combined.contains('?') {
            raw += 1;
        }
        if FIRST_PERSON_RE.is_match(combined) && NEED_VERB_RE.is_match(combined) {
            raw += 1;
        }
        if combined.chars().count() > 220 {
            raw += 1;
        }
        (raw as f64 / CONFIDENCE_SATURATION).min(1.0)
    }
}

fn urgency_score(combined: &str) -> f64 {
    (pattern_hits(&URGENCY_PATTERNS, combined) as f64 / URGENCY_SATURATION).min(1.0)
}

/// The first sentence carrying a demand signal, falling back to the first
/// sentence, falling back to the title.
fn best_demand_sentence(item: &NormalizedItem) -> String {
    let sentences = text::split_sentences(&format!("{}. {}", item.raw.title, item.raw.body));
    for sentence in &sentences {
        if pattern_hits(&DEMAND_PATTERNS, sentence) > 0 {
            return sentence.clone();
        }
    }
    sentences
        .into_iter()
        .next()
        .unwrap_or_else(|| text::compact_text(&item.raw.title))
}
