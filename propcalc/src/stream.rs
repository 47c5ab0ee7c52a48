//! Optional caching on top of single-pass producers.

/// A caching wrapper around an iterator.
///
/// The producers of this crate (truth tables, CNF and Tseitin clause
/// streams) are single-pass. Wrapping one in `Cached` records every yielded
/// item, so the sequence can be iterated again from the start via
/// [`replay`](Cached::replay) — even before the producer is exhausted, in
/// which case the replay transparently extends the cache on demand.
///
/// The cache is a bolt-on: the wrapped producer keeps its own state and
/// never learns that it is being recorded.
pub struct Cached<I: Iterator> {
    source: I,
    cache: Vec<I::Item>,
    exhausted: bool,
}

impl<I: Iterator> Cached<I>
where
    I::Item: Clone,
{
    pub fn new(source: I) -> Cached<I> {
        Cached {
            source,
            cache: Vec::new(),
            exhausted: false,
        }
    }

    /// Number of items recorded so far.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Consumes the rest of the producer into the cache and returns the
    /// total number of items.
    pub fn fill(&mut self) -> usize {
        while self.pull().is_some() {}
        self.cache.len()
    }

    /// Iterates the sequence from the start, pulling unconsumed items from
    /// the producer as needed.
    pub fn replay(&mut self) -> Replay<'_, I> {
        Replay {
            cached: self,
            pos: 0,
        }
    }

    /// Exhausts the producer and returns the recorded sequence.
    pub fn into_vec(mut self) -> Vec<I::Item> {
        self.fill();
        self.cache
    }

    fn pull(&mut self) -> Option<&I::Item> {
        if self.exhausted {
            return None;
        }
        match self.source.next() {
            Some(item) => {
                self.cache.push(item);
                self.cache.last()
            }
            None => {
                self.exhausted = true;
                None
            }
        }
    }
}

/// Iterator over a [`Cached`] sequence from its start.
pub struct Replay<'a, I: Iterator> {
    cached: &'a mut Cached<I>,
    pos: usize,
}

impl<I: Iterator> Iterator for Replay<'_, I>
where
    I::Item: Clone,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        let item = if self.pos < self.cached.cache.len() {
            self.cached.cache[self.pos].clone()
        } else {
            self.cached.pull()?.clone()
        };
        self.pos += 1;
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_records_everything() {
        let mut cached = Cached::new(10..13);
        assert_eq!(cached.fill(), 3);
        assert_eq!(cached.replay().collect::<Vec<_>>(), vec![10, 11, 12]);
        assert_eq!(cached.replay().collect::<Vec<_>>(), vec![10, 11, 12]);
    }

    #[test]
    fn replay_with_restart_in_between() {
        let mut cached = Cached::new(10..13);

        // Reiterate before the stream is consumed: starts at the beginning
        // of the cache and consumes only as much more as requested.
        let first: Vec<_> = cached.replay().take(2).collect();
        assert_eq!(first, vec![10, 11]);
        assert_eq!(cached.len(), 2);

        // Same again, consuming nothing new.
        let again: Vec<_> = cached.replay().take(2).collect();
        assert_eq!(again, vec![10, 11]);
        assert_eq!(cached.len(), 2);

        // Finally everything.
        let all: Vec<_> = cached.replay().collect();
        assert_eq!(all, vec![10, 11, 12]);
        assert_eq!(cached.len(), 3);
    }

    #[test]
    fn into_vec_materializes() {
        let cached = Cached::new("a b c".split_whitespace());
        assert_eq!(cached.into_vec(), vec!["a", "b", "c"]);
    }
}
