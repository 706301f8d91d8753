use crate::genome::Genome;

/// Evaluates the genomes of a population by setting their fitness.
///
/// Implemented for every `FnMut(&mut Genome)`, which is invoked once per genome, and for
/// `Batch`, which hands out the population in partitions.
pub trait FitnessFn {
    fn evaluate(&mut self, genomes: &mut [&mut Genome]);
}

impl<F> FitnessFn for F
where
    F: FnMut(&mut Genome),
{
    fn evaluate(&mut self, genomes: &mut [&mut Genome]) {
        for genome in genomes.iter_mut() {
            (self)(&mut **genome);
        }
    }
}

/// A fitness function receiving many genomes per invocation.
pub struct Batch<F> {
    /// The function invoked to calculate fitness for members of the population.
    ///
    /// The function will be invoked with batches of size `batch_size`, partitioning the total
    /// population if necessary. It is assumed that the genomes of a batch are independent so
    /// the function may evaluate them in parallel.
    fitness_fn: F,

    /// The size of the batches to partition the total population into, `0` hands out the
    /// whole population at once.
    batch_size: usize,
}

impl<F> Batch<F>
where
    F: FnMut(&mut [&mut Genome]),
{
    pub fn new(fitness_fn: F) -> Batch<F> {
        Batch {
            fitness_fn,
            batch_size: 0,
        }
    }

    pub fn set_batch_size(mut self, batch_size: usize) -> Batch<F> {
        self.batch_size = batch_size;
        self
    }
}

impl<F> FitnessFn for Batch<F>
where
    F: FnMut(&mut [&mut Genome]),
{
    fn evaluate(&mut self, genomes: &mut [&mut Genome]) {
        if self.batch_size == 0 {
            (self.fitness_fn)(genomes);
            return;
        }
        for batch in genomes.chunks_mut(self.batch_size) {
            (self.fitness_fn)(batch);
        }
    }
}
