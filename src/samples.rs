use std::{iter::Zip, num::NonZeroUsize, ops::Range, slice};

use rand::Rng;

use crate::{Result, TrainErr};

/// Splits `0..len` into consecutive ranges of `batch_size` indices.
///
/// Every range is full except possibly the last one, which holds the remaining
/// `len % batch_size` indices. An empty `len` yields no ranges at all.
pub fn batch_ranges(len: usize, batch_size: NonZeroUsize) -> BatchRanges {
    BatchRanges {
        len,
        batch_size,
        cursor: 0,
    }
}

/// Iterator over the index ranges of consecutive batches, see `batch_ranges`.
#[derive(Debug, Clone)]
pub struct BatchRanges {
    len: usize,
    batch_size: NonZeroUsize,
    cursor: usize,
}

impl Iterator for BatchRanges {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.len {
            return None;
        }

        let start = self.cursor;
        self.cursor = (start + self.batch_size.get()).min(self.len);
        Some(start..self.cursor)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.len - self.cursor).div_ceil(self.batch_size.get());
        (n, Some(n))
    }
}

impl ExactSizeIterator for BatchRanges {}

/// An ordered set of (input, expected output) pairs.
///
/// Inputs and outputs are kept in two index-aligned buffers: the `i`-th output is
/// always the expected output of the `i`-th input.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSet<I, O> {
    inputs: Vec<I>,
    outputs: Vec<O>,
}

impl<I, O> SampleSet<I, O> {
    /// Creates a new sample set from owned buffers.
    ///
    /// # Args
    /// * `inputs` - The samples' inputs.
    /// * `outputs` - The expected output for each input, in the same order.
    ///
    /// # Errors
    /// Returns `TrainErr::SampleLengthMismatch` if both buffers differ in length.
    pub fn new(inputs: Vec<I>, outputs: Vec<O>) -> Result<Self> {
        if inputs.len() != outputs.len() {
            return Err(TrainErr::SampleLengthMismatch {
                inputs: inputs.len(),
                outputs: outputs.len(),
            });
        }

        Ok(Self { inputs, outputs })
    }

    /// Creates an empty sample set.
    pub fn empty() -> Self {
        Self {
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Builds a sample set out of (input, output) pairs.
    pub fn from_pairs<P>(pairs: P) -> Self
    where
        P: IntoIterator<Item = (I, O)>,
    {
        let (inputs, outputs) = pairs.into_iter().unzip();
        Self { inputs, outputs }
    }

    /// Appends a single sample.
    pub fn push(&mut self, input: I, output: O) {
        self.inputs.push(input);
        self.outputs.push(output);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Returns the sample at `idx`, or `None` if out of bounds.
    pub fn get(&self, idx: usize) -> Option<(&I, &O)> {
        Some((self.inputs.get(idx)?, self.outputs.get(idx)?))
    }

    #[inline]
    pub fn inputs(&self) -> &[I] {
        &self.inputs
    }

    #[inline]
    pub fn outputs(&self) -> &[O] {
        &self.outputs
    }

    pub fn iter(&self) -> Zip<slice::Iter<'_, I>, slice::Iter<'_, O>> {
        self.inputs.iter().zip(self.outputs.iter())
    }

    /// Randomly permutes the samples in place.
    ///
    /// The same permutation is applied to inputs and outputs, so every pair stays
    /// together.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for i in (1..self.len()).rev() {
            let j = rng.random_range(0..=i);
            self.inputs.swap(i, j);
            self.outputs.swap(i, j);
        }
    }

    /// Returns a borrowed view over the samples in `range`.
    ///
    /// # Panics
    /// If `range` is out of bounds.
    pub fn batch(&self, range: Range<usize>) -> Batch<'_, I, O> {
        Batch {
            inputs: &self.inputs[range.clone()],
            outputs: &self.outputs[range],
        }
    }

    /// Iterates the set in consecutive batches of `batch_size` samples.
    pub fn batches(&self, batch_size: NonZeroUsize) -> Batches<'_, I, O> {
        Batches {
            samples: self,
            ranges: batch_ranges(self.len(), batch_size),
        }
    }
}

impl<I: Clone, O: Clone> SampleSet<I, O> {
    /// Copies the samples in `range` into a new, independent set.
    ///
    /// # Panics
    /// If `range` is out of bounds.
    pub fn subset(&self, range: Range<usize>) -> Self {
        self.batch(range).to_owned_set()
    }
}

impl<I, O> Default for SampleSet<I, O> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<I, O> FromIterator<(I, O)> for SampleSet<I, O> {
    fn from_iter<T: IntoIterator<Item = (I, O)>>(iter: T) -> Self {
        Self::from_pairs(iter)
    }
}

/// Borrowed batch view (zero-copy) over a contiguous range of a `SampleSet`.
#[derive(Debug)]
pub struct Batch<'a, I, O> {
    inputs: &'a [I],
    outputs: &'a [O],
}

impl<I, O> Clone for Batch<'_, I, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I, O> Copy for Batch<'_, I, O> {}

impl<'a, I, O> Batch<'a, I, O> {
    #[inline]
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    #[inline]
    pub fn inputs(&self) -> &'a [I] {
        self.inputs
    }

    #[inline]
    pub fn outputs(&self) -> &'a [O] {
        self.outputs
    }

    pub fn iter(&self) -> Zip<slice::Iter<'a, I>, slice::Iter<'a, O>> {
        self.inputs.iter().zip(self.outputs.iter())
    }
}

impl<I: Clone, O: Clone> Batch<'_, I, O> {
    pub fn to_owned_set(&self) -> SampleSet<I, O> {
        SampleSet {
            inputs: self.inputs.to_vec(),
            outputs: self.outputs.to_vec(),
        }
    }
}

/// Iterator over the consecutive batches of a `SampleSet`.
#[derive(Debug)]
pub struct Batches<'a, I, O> {
    samples: &'a SampleSet<I, O>,
    ranges: BatchRanges,
}

impl<'a, I, O> Iterator for Batches<'a, I, O> {
    type Item = Batch<'a, I, O>;

    fn next(&mut self) -> Option<Self::Item> {
        let range = self.ranges.next()?;
        Some(self.samples.batch(range))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ranges.size_hint()
    }
}

impl<I, O> ExactSizeIterator for Batches<'_, I, O> {}
