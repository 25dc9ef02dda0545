use crate::config::LengthBounds;
use crate::engines::generation::individual::{length_gene, Genes, ScoredIndividual, GENE_COUNT};
use rand::Rng;

/// Roulette wheel selection: probability proportional to `score + 1`.
///
/// The `+1` per member keeps zero-score members selectable and the wheel
/// non-empty. Returns the index of the selected member; falls back to the first
/// member if rounding leaves the spin unclaimed. `population` must not be empty.
pub fn roulette_selection<R: Rng>(population: &[ScoredIndividual], rng: &mut R) -> usize {
    let total_score: u64 = population.iter().map(|m| u64::from(m.score)).sum();
    let total_fitness = (total_score + population.len() as u64) as f64;

    let spin = rng.gen::<f64>() * total_fitness;
    let mut partial = 0.0;

    for (idx, member) in population.iter().enumerate() {
        partial += f64::from(member.score) + 1.0;
        if partial >= spin {
            return idx;
        }
    }

    // Fallback
    0
}

/// Single-point crossover at a random point in `1..GENE_COUNT`, so each child
/// keeps at least one gene from each parent.
pub fn crossover<R: Rng>(parent1: &Genes, parent2: &Genes, rng: &mut R) -> (Genes, Genes) {
    let point = rng.gen_range(1..GENE_COUNT);
    crossover_at(parent1, parent2, point)
}

/// Child A takes `parent1[..point]` and `parent2[point..]`; child B the
/// complement.
pub fn crossover_at(parent1: &Genes, parent2: &Genes, point: usize) -> (Genes, Genes) {
    let mut child1 = *parent1;
    let mut child2 = *parent2;

    child1[point..].copy_from_slice(&parent2[point..]);
    child2[point..].copy_from_slice(&parent1[point..]);

    (child1, child2)
}

/// Mutation: each gene is redrawn independently with probability
/// `mutation_rate`.
///
/// Weights are redrawn in `[0, 1)`. `min_len` is redrawn inside `bounds`.
/// `max_len` is redrawn between the current (possibly just mutated) `min_len`
/// and `bounds.max`, so a mutated `max_len` never falls below `min_len`.
pub fn mutate<R: Rng>(genes: &mut Genes, mutation_rate: f64, bounds: LengthBounds, rng: &mut R) {
    for gene in genes.iter_mut().take(3) {
        if rng.gen_bool(mutation_rate) {
            *gene = rng.gen();
        }
    }

    if rng.gen_bool(mutation_rate) {
        genes[3] = rng.gen_range(bounds.min..=bounds.max) as f64;
    }

    let floor = length_gene(genes[3]).min(bounds.max);
    if rng.gen_bool(mutation_rate) {
        genes[4] = rng.gen_range(floor..=bounds.max) as f64;
    }
}
