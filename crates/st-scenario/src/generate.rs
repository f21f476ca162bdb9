//! Scenario selection policies.

use std::collections::{BTreeMap, HashSet};

use rand::Rng;
use rand::seq::index;

use crate::scenario::{Scenario, TreatmentSpec};
use crate::{ScenarioError, ScenarioResult};

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionPolicy {
    /// One scenario per candidate junction.
    RankJunctions,
    /// Sample preferentially from junctions serving the preferred land uses.
    LandUsePrioritized {
        preferred: Vec<String>,
        samples: usize,
        scenarios: usize,
    },
    /// User-given junction sets.
    Explicit(Vec<Vec<String>>),
    UniformRandom { samples: usize, scenarios: usize },
}

fn ensure_feasible(requested: usize, available: usize) -> ScenarioResult<()> {
    if requested > available {
        return Err(ScenarioError::SamplingInfeasible {
            requested,
            available,
        });
    }
    Ok(())
}

/// Draw `amount` distinct elements in random order.
fn sample<R: Rng + ?Sized>(
    rng: &mut R,
    pool: &[String],
    amount: usize,
) -> ScenarioResult<Vec<String>> {
    ensure_feasible(amount, pool.len())?;
    Ok(index::sample(rng, pool.len(), amount)
        .into_iter()
        .map(|i| pool[i].clone())
        .collect())
}

fn preferred_pool(
    preferred: &[String],
    land_use_pools: &BTreeMap<String, Vec<String>>,
    known_land_uses: &[String],
) -> ScenarioResult<Vec<String>> {
    let mut pool: Vec<String> = Vec::new();
    for land_use in preferred {
        if !known_land_uses.contains(land_use) {
            return Err(ScenarioError::UnknownLandUse {
                land_use: land_use.clone(),
            });
        }
        for junction in land_use_pools.get(land_use).into_iter().flatten() {
            if !pool.contains(junction) {
                pool.push(junction.clone());
            }
        }
    }
    Ok(pool)
}

/// Junction sets for every non-baseline scenario.
fn junction_sets<R: Rng + ?Sized>(
    candidates: &[String],
    land_use_pools: &BTreeMap<String, Vec<String>>,
    known_land_uses: &[String],
    policy: &SelectionPolicy,
    rng: &mut R,
) -> ScenarioResult<Vec<Vec<String>>> {
    match policy {
        SelectionPolicy::RankJunctions => Ok(candidates.iter().map(|j| vec![j.clone()]).collect()),
        SelectionPolicy::LandUsePrioritized {
            preferred,
            samples,
            scenarios,
        } => {
            let pool = preferred_pool(preferred, land_use_pools, known_land_uses)?;
            let others: Vec<String> = candidates
                .iter()
                .filter(|j| !pool.contains(j))
                .cloned()
                .collect();
            ensure_feasible(*samples, pool.len() + others.len())?;
            (0..*scenarios)
                .map(|_| {
                    if *samples < pool.len() {
                        sample(rng, &pool, *samples)
                    } else {
                        let mut set = sample(rng, &pool, pool.len())?;
                        set.extend(sample(rng, &others, samples - pool.len())?);
                        Ok(set)
                    }
                })
                .collect()
        }
        SelectionPolicy::Explicit(sets) => {
            for (n, set) in sets.iter().enumerate() {
                if let Some(junction) = set.iter().find(|j| !candidates.contains(*j)) {
                    return Err(ScenarioError::UnknownJunction {
                        junction: junction.clone(),
                        scenario: n + 1,
                    });
                }
            }
            Ok(sets.clone())
        }
        SelectionPolicy::UniformRandom { samples, scenarios } => {
            ensure_feasible(*samples, candidates.len())?;
            (0..*scenarios)
                .map(|_| sample(rng, candidates, *samples))
                .collect()
        }
    }
}

/// Build the ordered scenario list, baseline first.
///
/// `candidates` are the manhole junctions as named in the network being
/// simulated; `land_use_pools` and explicit sets must use the same names.
/// Feasibility is checked before any scenario is drawn, so an impossible sample
/// size fails even when zero scenarios are requested. Any failure yields no
/// scenarios at all.
pub fn generate<R: Rng + ?Sized>(
    candidates: &[String],
    land_use_pools: &BTreeMap<String, Vec<String>>,
    known_land_uses: &[String],
    policy: &SelectionPolicy,
    treatment: &TreatmentSpec,
    rng: &mut R,
) -> ScenarioResult<Vec<Scenario>> {
    let sets = junction_sets(candidates, land_use_pools, known_land_uses, policy, rng)?;

    let mut scenarios = Vec::with_capacity(sets.len() + 1);
    scenarios.push(Scenario::baseline());
    for (n, set) in sets.into_iter().enumerate() {
        let index = n + 1;
        let mut seen = HashSet::new();
        let mut scenario = Scenario {
            index,
            ..Default::default()
        };
        for junction in set {
            if !seen.insert(junction.clone()) {
                return Err(ScenarioError::DuplicateJunction { junction, scenario: index });
            }
            scenario.assignments.insert(junction, treatment.clone());
        }
        scenarios.push(scenario);
    }
    tracing::info!(scenarios = scenarios.len(), "created treatment scenarios");
    Ok(scenarios)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScenarioRng;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn spec() -> TreatmentSpec {
        TreatmentSpec {
            pollutant: "TSS".into(),
            function: "R = 0.8".into(),
        }
    }

    fn pools() -> BTreeMap<String, Vec<String>> {
        let mut pools = BTreeMap::new();
        pools.insert("Roads".to_string(), ids(&["J1_m", "J2_m"]));
        pools.insert("Roofs".to_string(), ids(&["J2_m", "J3_m"]));
        pools
    }

    fn land_uses() -> Vec<String> {
        ids(&["Roads", "Roofs", "Grass"])
    }

    #[test]
    fn rank_junctions_one_per_candidate() {
        let candidates = ids(&["J1_m", "J2_m", "J3_m"]);
        let mut rng = ScenarioRng::from_seed_u64(1);
        let out = generate(
            &candidates,
            &pools(),
            &land_uses(),
            &SelectionPolicy::RankJunctions,
            &spec(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(out.len(), 4);
        assert!(out[0].is_baseline());
        assert_eq!(out[2].nodes().collect::<Vec<_>>(), vec!["J2_m"]);
        assert_eq!(out[2].index, 2);
        assert_eq!(out[3].treatments()[0].function, "R = 0.8");
    }

    #[test]
    fn prioritized_fills_from_other_junctions() {
        let candidates = ids(&["J1_m", "J2_m", "J3_m", "J4_m", "J5_m"]);
        let policy = SelectionPolicy::LandUsePrioritized {
            preferred: ids(&["Roads"]),
            samples: 4,
            scenarios: 5,
        };
        let mut rng = ScenarioRng::from_seed_u64(7);
        let out = generate(&candidates, &pools(), &land_uses(), &policy, &spec(), &mut rng).unwrap();
        assert_eq!(out.len(), 6);
        for scenario in &out[1..] {
            assert_eq!(scenario.len(), 4);
            assert!(scenario.assignments.contains_key("J1_m"));
            assert!(scenario.assignments.contains_key("J2_m"));
        }
    }

    #[test]
    fn prioritized_small_sample_stays_in_pool() {
        let candidates = ids(&["J1_m", "J2_m", "J3_m", "J4_m"]);
        let policy = SelectionPolicy::LandUsePrioritized {
            preferred: ids(&["Roads", "Roofs"]),
            samples: 2,
            scenarios: 10,
        };
        let mut rng = ScenarioRng::from_seed_u64(3);
        let out = generate(&candidates, &pools(), &land_uses(), &policy, &spec(), &mut rng).unwrap();
        for scenario in &out[1..] {
            assert!(!scenario.assignments.contains_key("J4_m"));
            assert_eq!(scenario.len(), 2);
        }
    }

    #[test]
    fn infeasible_sample_fails() {
        let candidates = ids(&["J1_m", "J2_m"]);
        let policy = SelectionPolicy::UniformRandom {
            samples: 3,
            scenarios: 2,
        };
        let mut rng = ScenarioRng::from_seed_u64(0);
        let err = generate(&candidates, &pools(), &land_uses(), &policy, &spec(), &mut rng)
            .unwrap_err();
        assert_eq!(
            err,
            ScenarioError::SamplingInfeasible {
                requested: 3,
                available: 2
            }
        );
    }

    #[test]
    fn infeasible_sample_fails_without_scenarios() {
        let candidates = ids(&["J1_m"]);
        let mut rng = ScenarioRng::from_seed_u64(0);
        let policy = SelectionPolicy::UniformRandom {
            samples: 5,
            scenarios: 0,
        };
        assert_eq!(
            generate(&candidates, &pools(), &land_uses(), &policy, &spec(), &mut rng),
            Err(ScenarioError::SamplingInfeasible {
                requested: 5,
                available: 1
            })
        );

        let policy = SelectionPolicy::LandUsePrioritized {
            preferred: ids(&["Roads"]),
            samples: 4,
            scenarios: 0,
        };
        let candidates = ids(&["J1_m", "J2_m", "J3_m"]);
        assert!(matches!(
            generate(&candidates, &pools(), &land_uses(), &policy, &spec(), &mut rng),
            Err(ScenarioError::SamplingInfeasible { requested: 4, available: 3 })
        ));
    }

    #[test]
    fn explicit_sets_must_name_candidates() {
        let candidates = ids(&["J1_m", "J2_m"]);
        let mut rng = ScenarioRng::from_seed_u64(0);
        let policy = SelectionPolicy::Explicit(vec![ids(&["J1_m"]), ids(&["J2_m", "J9_m"])]);
        assert_eq!(
            generate(&candidates, &pools(), &land_uses(), &policy, &spec(), &mut rng),
            Err(ScenarioError::UnknownJunction {
                junction: "J9_m".into(),
                scenario: 2
            })
        );
    }

    #[test]
    fn unknown_land_use_and_duplicates_fail() {
        let candidates = ids(&["J1_m"]);
        let mut rng = ScenarioRng::from_seed_u64(0);
        let policy = SelectionPolicy::LandUsePrioritized {
            preferred: ids(&["Forest"]),
            samples: 1,
            scenarios: 1,
        };
        assert!(matches!(
            generate(&candidates, &pools(), &land_uses(), &policy, &spec(), &mut rng),
            Err(ScenarioError::UnknownLandUse { .. })
        ));

        let policy = SelectionPolicy::Explicit(vec![ids(&["J1_m", "J1_m"])]);
        assert!(matches!(
            generate(&candidates, &pools(), &land_uses(), &policy, &spec(), &mut rng),
            Err(ScenarioError::DuplicateJunction { scenario: 1, .. })
        ));
    }

    #[test]
    fn same_seed_same_scenarios() {
        let candidates = ids(&["J1_m", "J2_m", "J3_m", "J4_m", "J5_m", "J6_m"]);
        let policy = SelectionPolicy::UniformRandom {
            samples: 3,
            scenarios: 8,
        };
        let run = |seed| {
            let mut rng = ScenarioRng::from_seed_u64(seed);
            generate(&candidates, &pools(), &land_uses(), &policy, &spec(), &mut rng).unwrap()
        };
        assert_eq!(run(11), run(11));
    }
}
