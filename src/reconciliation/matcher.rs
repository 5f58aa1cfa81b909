//! Greedy pairwise matching between two transaction collections
//!
//! Matching runs in two passes over the inputs, in input order with collection A as
//! the outer loop: an exact-key pass, then a tolerance-based fuzzy pass over whatever
//! is left. The first eligible unclaimed record wins, so the result depends on input
//! order and is not a globally optimal assignment.

use bigdecimal::BigDecimal;
use std::collections::HashSet;

use crate::settings::ReconConfig;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{day_distance, has_utc_offset, parse_timestamp};

/// Confidence assigned to key-based matches
pub const EXACT_CONFIDENCE: f64 = 1.0;
/// Confidence assigned to amount matches qualified by the date window
pub const AMOUNT_DATE_CONFIDENCE: f64 = 0.8;
/// Confidence assigned to amount-only matches
pub const AMOUNT_CONFIDENCE: f64 = 0.7;

/// Which key and labels a matching run uses
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchRule {
    pub key: MatchKey,
    pub exact_type: MatchType,
    pub fuzzy_type: MatchType,
    pub fuzzy_confidence: f64,
    /// Whether the fuzzy pass also requires timestamps to fall within the date window
    pub date_qualified: bool,
}

impl MatchRule {
    /// MPR against the internal log: transaction id, then amount and date
    pub const MPR_INTERNAL: MatchRule = MatchRule {
        key: MatchKey::TransactionId,
        exact_type: MatchType::ExactId,
        fuzzy_type: MatchType::AmountDate,
        fuzzy_confidence: AMOUNT_DATE_CONFIDENCE,
        date_qualified: true,
    };

    /// Resolved pairs against bank credits: UTR, then amount alone
    pub const BANK: MatchRule = MatchRule {
        key: MatchKey::Utr,
        exact_type: MatchType::Utr,
        fuzzy_type: MatchType::Amount,
        fuzzy_confidence: AMOUNT_CONFIDENCE,
        date_qualified: false,
    };
}

/// An MPR/internal linkage from the first stage, matched against the bank by its MPR side
#[derive(Debug, Clone, Copy)]
pub struct ResolvedPair<'a> {
    pub mpr: &'a MprTransaction,
    pub internal_id: RecordId,
}

impl Matchable for ResolvedPair<'_> {
    fn record_id(&self) -> RecordId {
        self.mpr.id
    }

    fn amount(&self) -> Option<&BigDecimal> {
        self.mpr.amount.as_ref()
    }

    fn timestamp(&self) -> Option<&str> {
        self.mpr.transaction_time.as_deref()
    }

    fn key(&self, key: MatchKey) -> Option<&str> {
        self.mpr.key(key)
    }
}

/// Record ids already used on each side of a matching run
#[derive(Debug, Clone, Default)]
pub struct Claims {
    pub a: HashSet<RecordId>,
    pub b: HashSet<RecordId>,
}

impl Claims {
    /// Start with some B-side records already taken
    pub fn with_claimed_b(claimed_b: HashSet<RecordId>) -> Self {
        Self {
            a: HashSet::new(),
            b: claimed_b,
        }
    }

    fn claim(&mut self, a: RecordId, b: RecordId) {
        self.a.insert(a);
        self.b.insert(b);
    }
}

/// Pairwise matcher bound to the deployment tolerances
#[derive(Debug, Clone, Copy)]
pub struct Matcher<'c> {
    config: &'c ReconConfig,
}

impl<'c> Matcher<'c> {
    pub fn new(config: &'c ReconConfig) -> Self {
        Self { config }
    }

    /// Run both passes; every record appears in at most one returned candidate
    pub fn match_records<A: Matchable, B: Matchable>(
        &self,
        a: &[A],
        b: &[B],
        rule: &MatchRule,
    ) -> Vec<MatchCandidate> {
        let mut claims = Claims::default();
        self.match_with_claims(a, b, rule, &mut claims)
    }

    /// Run both passes, honouring and extending the given claims
    pub fn match_with_claims<A: Matchable, B: Matchable>(
        &self,
        a: &[A],
        b: &[B],
        rule: &MatchRule,
        claims: &mut Claims,
    ) -> Vec<MatchCandidate> {
        let mut candidates = self.exact_pass(a, b, rule, claims);
        let exact = candidates.len();
        candidates.extend(self.fuzzy_pass(a, b, rule, claims));

        tracing::debug!(
            exact,
            fuzzy = candidates.len() - exact,
            key = ?rule.key,
            "Matching passes completed"
        );
        candidates
    }

    /// Pair records sharing a non-null key whose amounts agree within tolerance
    pub fn exact_pass<A: Matchable, B: Matchable>(
        &self,
        a: &[A],
        b: &[B],
        rule: &MatchRule,
        claims: &mut Claims,
    ) -> Vec<MatchCandidate> {
        let mut candidates = Vec::new();

        for left in a {
            if claims.a.contains(&left.record_id()) {
                continue;
            }
            let Some(left_key) = left.key(rule.key) else {
                continue;
            };

            let found = b.iter().find(|right| {
                !claims.b.contains(&right.record_id())
                    && right.key(rule.key) == Some(left_key)
                    && self.amounts_match(left.amount(), right.amount())
            });

            if let Some(right) = found {
                claims.claim(left.record_id(), right.record_id());
                candidates.push(MatchCandidate {
                    source_a_id: left.record_id(),
                    source_b_id: right.record_id(),
                    match_type: rule.exact_type,
                    confidence: EXACT_CONFIDENCE,
                });
            }
        }

        candidates
    }

    /// Pair remaining records by amount, and by date window when the rule asks for it
    pub fn fuzzy_pass<A: Matchable, B: Matchable>(
        &self,
        a: &[A],
        b: &[B],
        rule: &MatchRule,
        claims: &mut Claims,
    ) -> Vec<MatchCandidate> {
        let mut candidates = Vec::new();

        for left in a {
            if claims.a.contains(&left.record_id()) {
                continue;
            }

            let found = b.iter().find(|right| {
                !claims.b.contains(&right.record_id())
                    && self.amounts_match(left.amount(), right.amount())
                    && (!rule.date_qualified
                        || self.dates_match(left.timestamp(), right.timestamp()))
            });

            if let Some(right) = found {
                claims.claim(left.record_id(), right.record_id());
                candidates.push(MatchCandidate {
                    source_a_id: left.record_id(),
                    source_b_id: right.record_id(),
                    match_type: rule.fuzzy_type,
                    confidence: rule.fuzzy_confidence,
                });
            }
        }

        candidates
    }

    /// Link resolved MPR/internal pairs to bank credits.
    ///
    /// Debits and zero amounts are ignored. Bank records in `claimed_bank` are never
    /// linked again.
    pub fn match_bank(
        &self,
        pairs: &[ResolvedPair<'_>],
        bank: &[BankTransaction],
        claimed_bank: &HashSet<RecordId>,
    ) -> Vec<BankMatch> {
        let credits: Vec<&BankTransaction> = bank.iter().filter(|b| b.is_credit()).collect();
        let mut claims = Claims::with_claimed_b(claimed_bank.clone());

        self.match_with_claims(pairs, &credits, &MatchRule::BANK, &mut claims)
            .into_iter()
            .filter_map(|candidate| {
                pairs
                    .iter()
                    .find(|pair| pair.mpr.id == candidate.source_a_id)
                    .map(|pair| BankMatch {
                        mpr_id: pair.mpr.id,
                        internal_id: pair.internal_id,
                        bank_id: candidate.source_b_id,
                        match_type: candidate.match_type,
                        confidence: candidate.confidence,
                    })
            })
            .collect()
    }

    /// Missing amounts never match
    fn amounts_match(&self, a: Option<&BigDecimal>, b: Option<&BigDecimal>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => self.config.amounts_within_tolerance(a, b),
            _ => false,
        }
    }

    /// Absent, unparsable or incomparable timestamps count as a date match
    fn dates_match(&self, a: Option<&str>, b: Option<&str>) -> bool {
        let (Some(a), Some(b)) = (a, b) else {
            return true;
        };
        // An offset-aware instant cannot be compared with a naive one.
        if has_utc_offset(a) != has_utc_offset(b) {
            return true;
        }
        match (parse_timestamp(a), parse_timestamp(b)) {
            (Some(a), Some(b)) => {
                day_distance(a, b) <= i64::from(self.config.date_tolerance_days)
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn amount(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    fn config() -> ReconConfig {
        ReconConfig::with_tolerance("0.05", 1).unwrap()
    }

    fn mpr(id: RecordId, value: &str) -> MprTransaction {
        MprTransaction::new(id, 1, amount(value))
    }

    fn internal(id: RecordId, value: &str) -> InternalTransaction {
        InternalTransaction::new(id, 2, amount(value))
    }

    fn assert_claims_unique(candidates: &[MatchCandidate]) {
        let a: HashSet<_> = candidates.iter().map(|c| c.source_a_id).collect();
        let b: HashSet<_> = candidates.iter().map(|c| c.source_b_id).collect();
        assert_eq!(a.len(), candidates.len());
        assert_eq!(b.len(), candidates.len());
    }

    #[test]
    fn test_exact_id_match() {
        let config = config();
        let matcher = Matcher::new(&config);
        let a = vec![mpr(1, "100.00").with_transaction_id("T1")];
        let b = vec![internal(1, "100.00").with_transaction_id("T1")];

        let candidates = matcher.match_records(&a, &b, &MatchRule::MPR_INTERNAL);

        assert_eq!(
            candidates,
            vec![MatchCandidate {
                source_a_id: 1,
                source_b_id: 1,
                match_type: MatchType::ExactId,
                confidence: 1.0,
            }]
        );
    }

    #[test]
    fn test_exact_pass_requires_amount_within_tolerance() {
        let config = config();
        let matcher = Matcher::new(&config);
        let a = vec![mpr(1, "100.00").with_transaction_id("T1")];
        let b = vec![
            internal(7, "150.00").with_transaction_id("T1"),
            internal(8, "100.01"),
        ];

        let candidates = matcher.match_records(&a, &b, &MatchRule::MPR_INTERNAL);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].source_b_id, 8);
        assert_eq!(candidates[0].match_type, MatchType::AmountDate);
    }

    #[test]
    fn test_fuzzy_amount_match() {
        let config = config();
        let matcher = Matcher::new(&config);
        let a = vec![mpr(1, "100.00")];
        let b = vec![internal(1, "100.02")];

        let candidates = matcher.match_records(&a, &b, &MatchRule::MPR_INTERNAL);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].match_type, MatchType::AmountDate);
        assert_eq!(candidates[0].confidence, 0.8);
    }

    #[test]
    fn test_tolerance_boundary_is_inclusive() {
        let config = config();
        let matcher = Matcher::new(&config);

        let at_edge = matcher.match_records(
            &[mpr(1, "100.00")],
            &[internal(1, "100.05")],
            &MatchRule::MPR_INTERNAL,
        );
        assert_eq!(at_edge.len(), 1);

        let past_edge = matcher.match_records(
            &[mpr(1, "100.00")],
            &[internal(1, "100.051")],
            &MatchRule::MPR_INTERNAL,
        );
        assert!(past_edge.is_empty());
    }

    #[test]
    fn test_null_amount_never_matches() {
        let config = config();
        let matcher = Matcher::new(&config);
        let mut blank = mpr(1, "0").with_transaction_id("T1");
        blank.amount = None;
        let b = vec![internal(1, "0").with_transaction_id("T1")];

        assert!(matcher
            .match_records(&[blank], &b, &MatchRule::MPR_INTERNAL)
            .is_empty());
    }

    #[test]
    fn test_date_window_limits_fuzzy_match() {
        let config = config();
        let matcher = Matcher::new(&config);
        let a = vec![mpr(1, "50.00").with_time("2024-03-10T10:00:00")];
        let b = vec![
            internal(1, "50.00").with_time("2024-03-14 10:00:00"),
            internal(2, "50.00").with_time("2024-03-11 09:00:00"),
        ];

        let candidates = matcher.match_records(&a, &b, &MatchRule::MPR_INTERNAL);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].source_b_id, 2);
    }

    #[test]
    fn test_offset_aware_timestamps_compare_in_utc() {
        let config = config();
        let matcher = Matcher::new(&config);
        // 2024-03-10 01:00 at +05:30 is still 2024-03-09 in UTC.
        let a = vec![mpr(1, "50.00").with_time("2024-03-10T01:00:00+05:30")];
        let b = vec![
            internal(1, "50.00").with_time("2024-03-11T12:00:00Z"),
            internal(2, "50.00").with_time("2024-03-09T20:00:00Z"),
        ];

        let candidates = matcher.match_records(&a, &b, &MatchRule::MPR_INTERNAL);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].source_b_id, 2);
    }

    #[test]
    fn test_mixed_offset_and_naive_timestamps_are_lenient() {
        let config = config();
        let matcher = Matcher::new(&config);
        let a = vec![mpr(1, "50.00").with_time("2024-03-10T10:00:00Z")];
        let b = vec![internal(1, "50.00").with_time("2024-03-20 10:00:00")];

        let candidates = matcher.match_records(&a, &b, &MatchRule::MPR_INTERNAL);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].match_type, MatchType::AmountDate);
    }

    #[test]
    fn test_unparsable_or_missing_dates_are_lenient() {
        let config = config();
        let matcher = Matcher::new(&config);
        let a = vec![
            mpr(1, "10.00").with_time("not a date"),
            mpr(2, "20.00").with_time("2024-03-10"),
        ];
        let b = vec![
            internal(1, "10.00").with_time("2020-01-01"),
            internal(2, "20.00"),
        ];

        let candidates = matcher.match_records(&a, &b, &MatchRule::MPR_INTERNAL);

        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn test_greedy_first_found_wins() {
        let config = config();
        let matcher = Matcher::new(&config);
        // mpr 1 takes the first eligible record, leaving nothing within tolerance for mpr 2
        // even though pairing 1-11 and 2-10 would have matched both.
        let a = vec![mpr(1, "100.00"), mpr(2, "100.06")];
        let b = vec![internal(10, "100.03"), internal(11, "100.00")];

        let candidates = matcher.match_records(&a, &b, &MatchRule::MPR_INTERNAL);

        assert_eq!(candidates.len(), 1);
        assert_eq!((candidates[0].source_a_id, candidates[0].source_b_id), (1, 10));

        let reordered = matcher.match_records(
            &a,
            &[internal(11, "100.00"), internal(10, "100.03")],
            &MatchRule::MPR_INTERNAL,
        );
        assert_eq!(reordered.len(), 2);
        assert_eq!((reordered[0].source_a_id, reordered[0].source_b_id), (1, 11));
        assert_eq!((reordered[1].source_a_id, reordered[1].source_b_id), (2, 10));
    }

    #[test]
    fn test_duplicate_transaction_ids_claim_once() {
        let config = config();
        let matcher = Matcher::new(&config);
        let a = vec![
            mpr(1, "10.00").with_transaction_id("DUP"),
            mpr(2, "10.00").with_transaction_id("DUP"),
            mpr(3, "10.00").with_transaction_id("DUP"),
        ];
        let b = vec![
            internal(1, "10.00").with_transaction_id("DUP"),
            internal(2, "10.00").with_transaction_id("DUP"),
        ];

        let candidates = matcher.match_records(&a, &b, &MatchRule::MPR_INTERNAL);

        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.match_type == MatchType::ExactId));
        assert_claims_unique(&candidates);
    }

    #[test]
    fn test_exact_pass_is_deterministic() {
        let config = config();
        let matcher = Matcher::new(&config);
        let a = vec![
            mpr(1, "10.00").with_transaction_id("A"),
            mpr(2, "20.00").with_transaction_id("B"),
            mpr(3, "30.00").with_transaction_id("C"),
        ];
        let b = vec![
            internal(3, "30.00").with_transaction_id("C"),
            internal(1, "10.01").with_transaction_id("A"),
            internal(2, "25.00").with_transaction_id("B"),
        ];

        let first = matcher.exact_pass(&a, &b, &MatchRule::MPR_INTERNAL, &mut Claims::default());
        let second = matcher.exact_pass(&a, &b, &MatchRule::MPR_INTERNAL, &mut Claims::default());

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_claim_uniqueness_over_mixed_inputs() {
        let config = config();
        let matcher = Matcher::new(&config);
        let a: Vec<_> = (1..=20)
            .map(|i| mpr(i, &format!("{}.00", i % 4)).with_transaction_id(format!("T{}", i % 3)))
            .collect();
        let b: Vec<_> = (1..=15)
            .map(|i| internal(i, &format!("{}.02", i % 4)).with_transaction_id(format!("T{}", i % 5)))
            .collect();

        let candidates = matcher.match_records(&a, &b, &MatchRule::MPR_INTERNAL);

        assert!(!candidates.is_empty());
        assert_claims_unique(&candidates);
    }

    #[test]
    fn test_bank_matching_prefers_utr_then_amount() {
        let config = config();
        let matcher = Matcher::new(&config);
        let m1 = mpr(1, "500.00").with_utr("UTR1");
        let m2 = mpr(2, "75.00");
        let pairs = vec![
            ResolvedPair { mpr: &m1, internal_id: 11 },
            ResolvedPair { mpr: &m2, internal_id: 12 },
        ];
        let bank = vec![
            BankTransaction::new(100, 3, amount("75.00")),
            BankTransaction::new(101, 3, amount("500.00")).with_utr("UTR1"),
        ];

        let matches = matcher.match_bank(&pairs, &bank, &HashSet::new());

        assert_eq!(
            matches,
            vec![
                BankMatch {
                    mpr_id: 1,
                    internal_id: 11,
                    bank_id: 101,
                    match_type: MatchType::Utr,
                    confidence: 1.0,
                },
                BankMatch {
                    mpr_id: 2,
                    internal_id: 12,
                    bank_id: 100,
                    match_type: MatchType::Amount,
                    confidence: 0.7,
                },
            ]
        );
    }

    #[test]
    fn test_bank_matching_ignores_debits_and_claimed_credits() {
        let config = config();
        let matcher = Matcher::new(&config);
        let m1 = mpr(1, "40.00");
        let pairs = vec![ResolvedPair { mpr: &m1, internal_id: 11 }];
        let bank = vec![
            BankTransaction::new(100, 3, amount("-40.00")),
            BankTransaction::new(101, 3, amount("40.00")),
            BankTransaction::new(102, 3, amount("40.01")),
        ];

        let claimed: HashSet<RecordId> = [101].into_iter().collect();
        let matches = matcher.match_bank(&pairs, &bank, &claimed);

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].bank_id, 102);
    }
}
