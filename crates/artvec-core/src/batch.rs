/// Iterator adapter yielding consecutive `Vec`s of at most `size` items.
/// The last batch may be shorter; no empty batch is ever produced.
pub struct Batched<I: Iterator> {
    iter: I,
    size: usize,
}

impl<I: Iterator> Iterator for Batched<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<I::Item> = self.iter.by_ref().take(self.size).collect();
        if batch.is_empty() { None } else { Some(batch) }
    }
}

/// Split `items` into consecutive batches of `size` (a size of 0 is treated as 1).
pub fn batched<I: IntoIterator>(items: I, size: usize) -> Batched<I::IntoIter> {
    Batched { iter: items.into_iter(), size: size.max(1) }
}
