//! Plural rules from real-world catalogs
//!
//! Every rule here is a verbatim Plural-Forms value shipped by a real
//! translation project. For each one, the selected index must stay in
//! `[0, nplurals)` across a wide range of counts, and caching must
//! never change the selection.

use pomo::cache::{CacheBackend, CacheConfig, RuleCache};
use pomo::plural::PluralRule;
use rstest::rstest;

const REAL_WORLD_RULES: &[&str] = &[
	"nplurals=1; plural=0;",
	"nplurals=2; plural=(n != 1);",
	"nplurals=2; plural=(n > 1);",
	"nplurals=3; plural=(n%10==1 && n%100!=11 ? 0 : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2);",
	"nplurals=3; plural=(n==1 ? 0 : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2);",
	"nplurals=3; plural=(n==1 ? 0 : n>=2 && n<=4 ? 1 : 2);",
	"nplurals=4; plural=(n%100==1 ? 0 : n%100==2 ? 1 : n%100==3 || n%100==4 ? 2 : 3);",
	"nplurals=6; plural=(n==0 ? 0 : n==1 ? 1 : n==2 ? 2 : n%100>=3 && n%100<=10 ? 3 : n%100>=11 ? 4 : 5);",
];

fn sample_counts() -> impl Iterator<Item = u64> {
	(0..500).chain([1_000, 1_001, 1_011, 1_000_000, u64::MAX])
}

#[test]
fn every_rule_stays_in_range() {
	for declaration in REAL_WORLD_RULES {
		let rule = PluralRule::parse(declaration).unwrap();
		for n in sample_counts() {
			let index = rule.plural_index(n).unwrap();
			assert!(
				index < rule.nplurals(),
				"{declaration}: n={n} gave index {index}"
			);
		}
	}
}

#[test]
fn evaluation_is_deterministic() {
	for declaration in REAL_WORLD_RULES {
		let first = PluralRule::parse(declaration).unwrap();
		let second = PluralRule::parse(declaration).unwrap();
		for n in sample_counts() {
			assert_eq!(first.plural_index(n).unwrap(), second.plural_index(n).unwrap());
		}
	}
}

#[rstest]
#[case(CacheBackend::None)]
#[case(CacheBackend::Memoize)]
#[case(CacheBackend::Lru)]
fn cached_rules_select_like_fresh_ones(#[case] backend: CacheBackend) {
	let cache = RuleCache::new(CacheConfig::new().with_backend(backend)).unwrap();
	for declaration in REAL_WORLD_RULES {
		let fresh = PluralRule::parse(declaration).unwrap();
		// Twice, so the second pass exercises the hit path.
		for _ in 0..2 {
			let cached = cache.rule_from_declaration(declaration).unwrap();
			for n in sample_counts().take(200) {
				assert_eq!(
					cached.plural_index(n).unwrap(),
					fresh.plural_index(n).unwrap(),
					"{declaration}: n={n}"
				);
			}
		}
	}
}
