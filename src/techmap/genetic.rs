// SPDX-License-Identifier: Apache-2.0

//! Genetic search over per-entry candidate choices.
//!
//! A chromosome holds, for every entry reachable from the outputs, the index
//! of the candidate realizing it. Unreachable entries carry no gene. Every
//! operator is followed by a repair pass so that the genes always describe a
//! complete cover.

use std::time::Instant;

use rand::Rng;
use rand::SeedableRng;
use rand::distributions::{Distribution, WeightedIndex};
use rand_pcg::Pcg64Mcg;

use crate::techmap::mapper::{BestReplacement, MapContext, Selection};
use crate::techmap::{area, min_delay};

#[derive(Debug, Clone, PartialEq)]
pub struct GeneticOptions {
    pub population: usize,
    pub generations: usize,
    /// Probability that a gene is redrawn after crossover.
    pub mutation_rate: f64,
    pub seed: u64,
    /// Chromosomes above either bound are dropped before reproduction.
    pub max_area: Option<f32>,
    pub max_arrival: Option<f32>,
}

impl Default for GeneticOptions {
    fn default() -> Self {
        Self {
            population: 32,
            generations: 40,
            mutation_rate: 0.05,
            seed: 0,
            max_area: None,
            max_arrival: None,
        }
    }
}

type Genes = Vec<Option<usize>>;

#[derive(Debug, Clone)]
struct Individual {
    genes: Genes,
    area: f32,
    arrival: Vec<f32>,
    delay: f32,
    fitness: f64,
}

impl Individual {
    fn within(&self, options: &GeneticOptions) -> bool {
        options.max_area.is_none_or(|a| self.area <= a)
            && options.max_arrival.is_none_or(|d| self.delay <= d)
    }
}

/// Fills the genes of every entry needed by the outputs, from `donor` where
/// it has one and at random otherwise, and clears the genes of entries no
/// longer needed. `false` when a needed entry has no candidate at all.
fn complete(ctx: &MapContext, genes: &mut Genes, donor: Option<&Genes>, rng: &mut Pcg64Mcg) -> bool {
    let size = ctx.subnet.size();
    let mut needed = vec![false; size];
    let mut stack: Vec<u32> = ctx.output_entries().collect();
    while let Some(idx) = stack.pop() {
        let i = idx as usize;
        if needed[i] {
            continue;
        }
        needed[i] = true;
        let replacement = match ctx.fixed(idx) {
            Some(r) => r,
            None => {
                let candidates = &ctx.candidates[i];
                if candidates.is_empty() {
                    return false;
                }
                if genes[i].is_none() {
                    genes[i] = donor
                        .and_then(|d| d[i])
                        .or_else(|| Some(rng.gen_range(0..candidates.len())));
                }
                let Some(g) = genes[i] else {
                    return false;
                };
                candidates[g].replacement.clone()
            }
        };
        stack.extend(replacement.leaves());
    }
    for (gene, needed) in genes.iter_mut().zip(needed) {
        if !needed {
            *gene = None;
        }
    }
    true
}

fn choice(ctx: &MapContext, genes: &Genes) -> Vec<Option<BestReplacement>> {
    (0..ctx.subnet.size())
        .map(|idx| match ctx.fixed(idx as u32) {
            Some(r) => Some(r),
            None => genes[idx].map(|g| ctx.candidates[idx][g].replacement.clone()),
        })
        .collect()
}

fn evaluate(ctx: &MapContext, genes: Genes) -> Individual {
    let choice = choice(ctx, &genes);
    let mut arrival = vec![f32::INFINITY; choice.len()];
    let mut area = 0.0f32;
    for (idx, r) in choice.iter().enumerate() {
        let Some(r) = r else { continue };
        arrival[idx] = ctx.arrival(r, &arrival);
        area += ctx.area(r);
    }
    let delay = ctx
        .output_entries()
        .map(|o| arrival[o as usize])
        .fold(0.0, f32::max);
    let cost = f64::from(area) * f64::from(delay);
    let fitness = if cost.is_finite() {
        1.0 / cost.max(1e-9)
    } else {
        0.0
    };
    Individual {
        genes,
        area,
        arrival,
        delay,
        fitness,
    }
}

/// Genes reproducing a selection made by another strategy.
fn genes_of(ctx: &MapContext, selection: &Selection) -> Genes {
    selection
        .choice
        .iter()
        .enumerate()
        .map(|(idx, r)| {
            let r = r.as_ref()?;
            ctx.candidates[idx]
                .iter()
                .position(|c| c.replacement == *r)
        })
        .collect()
}

fn mutate(ctx: &MapContext, genes: &mut Genes, rate: f64, rng: &mut Pcg64Mcg) {
    for (idx, gene) in genes.iter_mut().enumerate() {
        if gene.is_some() && rng.gen_bool(rate) {
            *gene = Some(rng.gen_range(0..ctx.candidates[idx].len()));
        }
    }
}

pub fn select(ctx: &MapContext, options: &GeneticOptions) -> Selection {
    let t0 = Instant::now();
    let mut rng = Pcg64Mcg::seed_from_u64(options.seed);
    let size = ctx.subnet.size();
    let rate = options.mutation_rate.clamp(0.0, 1.0);

    let delay_optimal = min_delay::select(ctx);
    let mut population: Vec<Individual> = Vec::with_capacity(options.population.max(2));
    for seed in [delay_optimal.clone(), area::select_simple(ctx)] {
        let mut genes = genes_of(ctx, &seed);
        if !complete(ctx, &mut genes, None, &mut rng) {
            log::debug!("techmap: genetic search has no complete cover to start from");
            return delay_optimal;
        }
        population.push(evaluate(ctx, genes));
    }
    while population.len() < options.population {
        let mut genes = vec![None; size];
        complete(ctx, &mut genes, None, &mut rng);
        population.push(evaluate(ctx, genes));
    }

    let fittest = |population: &[Individual]| -> Individual {
        let mut best = &population[0];
        for individual in &population[1..] {
            if individual.fitness > best.fitness {
                best = individual;
            }
        }
        best.clone()
    };
    let mut best = fittest(&population);

    for generation in 0..options.generations {
        let survivors: Vec<&Individual> = {
            let within: Vec<&Individual> =
                population.iter().filter(|i| i.within(options)).collect();
            if within.is_empty() {
                population.iter().collect()
            } else {
                within
            }
        };
        let weights: Vec<f64> = survivors.iter().map(|i| i.fitness).collect();
        let roulette = WeightedIndex::new(&weights).ok();
        let spin = |rng: &mut Pcg64Mcg| match &roulette {
            Some(dist) => dist.sample(rng),
            None => rng.gen_range(0..survivors.len()),
        };

        let mut next = vec![best.clone()];
        while next.len() < options.population.max(2) {
            let a = &survivors[spin(&mut rng)].genes;
            let b = &survivors[spin(&mut rng)].genes;
            let point = rng.gen_range(0..=size);
            let first: Genes = a[..point].iter().chain(&b[point..]).copied().collect();
            let second: Genes = b[..point].iter().chain(&a[point..]).copied().collect();
            for (mut child, donor) in [(first.clone(), second.clone()), (second, first)] {
                complete(ctx, &mut child, Some(&donor), &mut rng);
                mutate(ctx, &mut child, rate, &mut rng);
                complete(ctx, &mut child, None, &mut rng);
                next.push(evaluate(ctx, child));
            }
        }
        population = next;
        let candidate = fittest(&population);
        if candidate.fitness > best.fitness {
            best = candidate;
        }
        log::trace!(
            "techmap: genetic generation={} area={:.3} delay={:.3}",
            generation,
            best.area,
            best.delay
        );
    }

    log::debug!(
        "techmap: genetic done area={:.3} delay={:.3} elapsed_ms={}",
        best.area,
        best.delay,
        t0.elapsed().as_millis()
    );
    Selection {
        choice: choice(ctx, &best.genes),
        arrival: best.arrival,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::eval::evaluate as evaluate_subnet;
    use crate::model::object::ObjectStore;
    use crate::model::parser::parse_subnet;
    use crate::techmap::library::tests::sample_library;
    use crate::techmap::mapper::tests::{ADDER, map_text};
    use crate::techmap::mapper::{MapOptions, Strategy, select_cover};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fixed_seed_is_reproducible() {
        let mut store = ObjectStore::new();
        let library = sample_library(&mut store);
        let id = parse_subnet(&mut store, ADDER).unwrap();
        let ctx = MapContext::new(&store, store.subnet(id), &library, MapOptions::default());
        let options = GeneticOptions {
            seed: 17,
            ..GeneticOptions::default()
        };
        let first = select(&ctx, &options);
        let second = select(&ctx, &options);
        assert_eq!(first.choice, second.choice);
        select_cover(ctx.subnet, &first.choice).unwrap();
    }

    #[test]
    fn test_never_worse_than_seeds() {
        let mut store = ObjectStore::new();
        let library = sample_library(&mut store);
        let id = parse_subnet(&mut store, ADDER).unwrap();
        let ctx = MapContext::new(&store, store.subnet(id), &library, MapOptions::default());
        let mut rng = Pcg64Mcg::seed_from_u64(0);
        let mut seed_genes = genes_of(&ctx, &min_delay::select(&ctx));
        assert!(complete(&ctx, &mut seed_genes, None, &mut rng));
        let seed = evaluate(&ctx, seed_genes);

        let selection = select(&ctx, &GeneticOptions::default());
        let found = evaluate(&ctx, genes_of(&ctx, &selection));
        assert!(found.fitness >= seed.fitness);
    }

    #[test]
    fn test_bounds_that_nothing_meets_still_map() {
        let options = GeneticOptions {
            seed: 5,
            max_area: Some(0.0),
            max_arrival: Some(0.0),
            ..GeneticOptions::default()
        };
        let (store, id, mapped) = map_text(ADDER, &Strategy::Genetic(options));
        assert_eq!(
            evaluate_subnet(&store, store.subnet(id)),
            evaluate_subnet(&store, store.subnet(mapped))
        );
    }

    #[test]
    fn test_different_seeds_preserve_function() {
        for seed in 0..4 {
            let options = GeneticOptions {
                seed,
                population: 8,
                generations: 10,
                mutation_rate: 0.3,
                ..GeneticOptions::default()
            };
            let (store, id, mapped) = map_text(ADDER, &Strategy::Genetic(options));
            assert_eq!(
                evaluate_subnet(&store, store.subnet(id)),
                evaluate_subnet(&store, store.subnet(mapped)),
                "seed {}",
                seed
            );
        }
    }
}
