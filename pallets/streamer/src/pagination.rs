//! Bounded iteration with weighted steps.

/// Minimal cursor contract consumed by [`paginate`].
pub trait PaginationIterator {
  type Item;

  fn valid(&self) -> bool;
  /// Moves to the next element. Must only be called while `valid()`.
  fn next(&mut self);
  /// Current element, `None` once the iterator is exhausted.
  fn value(&self) -> Option<Self::Item>;
}

/// Outcome of visiting one element.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Step {
  pub stop: bool,
  pub weight: u64,
}

impl Step {
  pub const fn proceed(weight: u64) -> Self {
    Self {
      stop: false,
      weight,
    }
  }

  pub const fn stop(weight: u64) -> Self {
    Self { stop: true, weight }
  }
}

/// Feeds elements to `f` until `max_steps` is spent, the iterator runs dry or
/// `f` asks to stop. Returns the consumed steps.
///
/// The iterator is left on the element that requested the stop. A step weight
/// of zero never exhausts the budget, so callers must make sure the iterator
/// itself terminates.
pub fn paginate<I, F>(iter: &mut I, max_steps: u64, mut f: F) -> u64
where
  I: PaginationIterator,
  F: FnMut(I::Item) -> Step,
{
  let mut steps: u64 = 0;
  while steps < max_steps && iter.valid() {
    let Some(item) = iter.value() else {
      break;
    };
    let step = f(item);
    steps = steps.saturating_add(step.weight);
    if step.stop {
      break;
    }
    iter.next();
  }
  steps
}

#[cfg(test)]
mod tests {
  use super::*;
  use alloc::{vec, vec::Vec};

  struct SliceIter {
    data: Vec<i32>,
    index: usize,
  }

  impl SliceIter {
    fn new(data: Vec<i32>) -> Self {
      Self { data, index: 0 }
    }
  }

  impl PaginationIterator for SliceIter {
    type Item = i32;

    fn valid(&self) -> bool {
      self.index < self.data.len()
    }

    fn next(&mut self) {
      self.index += 1;
    }

    fn value(&self) -> Option<i32> {
      self.data.get(self.index).copied()
    }
  }

  fn run(data: Vec<i32>, max_steps: u64, stop_value: i32, weight: u64) -> u64 {
    let mut iter = SliceIter::new(data);
    paginate(&mut iter, max_steps, |v| Step {
      stop: v == stop_value,
      weight,
    })
  }

  #[test]
  fn unit_weight_cases() {
    assert_eq!(run(vec![], 5, -1, 1), 0);
    assert_eq!(run(vec![1, 2, 3], 10, -1, 1), 3);
    assert_eq!(run(vec![1, 2, 3, 4, 5, 6, 7], 5, -1, 1), 5);
    assert_eq!(run(vec![1, 2, 3, 4, 5, 6, 7], 0, 6, 1), 0);
    assert_eq!(run(vec![1, 2, 3, 4, 5, 6, 7], 10, 3, 1), 3);
  }

  #[test]
  fn heavy_steps_may_overshoot_by_one_element() {
    assert_eq!(run(vec![], 5, -1, 3), 0);
    assert_eq!(run(vec![1, 2, 3], 10, -1, 3), 9);
    assert_eq!(run(vec![1, 2, 3, 4, 5, 6, 7], 5, -1, 3), 6);
    assert_eq!(run(vec![1, 2, 3, 4, 5, 6, 7], 0, 6, 3), 0);
    assert_eq!(run(vec![1, 2, 3, 4, 5, 6, 7], 10, 3, 3), 9);
  }

  #[test]
  fn zero_weight_steps_consume_nothing() {
    assert_eq!(run(vec![], 5, -1, 0), 0);
    assert_eq!(run(vec![1, 2, 3], 10, -1, 0), 0);
    assert_eq!(run(vec![1, 2, 3, 4, 5, 6, 7], 5, -1, 0), 0);
    assert_eq!(run(vec![1, 2, 3, 4, 5, 6, 7], 0, 6, 0), 0);
    assert_eq!(run(vec![1, 2, 3, 4, 5, 6, 7], 10, 3, 0), 0);
  }

  #[test]
  fn stop_leaves_iterator_on_the_stopping_element() {
    let mut iter = SliceIter::new(vec![1, 2, 3, 4]);
    let mut seen = Vec::new();
    let steps = paginate(&mut iter, 10, |v| {
      seen.push(v);
      if v == 2 { Step::stop(1) } else { Step::proceed(1) }
    });
    assert_eq!(steps, 2);
    assert_eq!(seen, vec![1, 2]);
    assert_eq!(iter.value(), Some(2));
  }

  #[test]
  fn zero_budget_makes_no_calls() {
    let mut iter = SliceIter::new(vec![1, 2, 3]);
    let mut calls = 0;
    let steps = paginate(&mut iter, 0, |_| {
      calls += 1;
      Step::proceed(1)
    });
    assert_eq!((steps, calls), (0, 0));
    assert_eq!(iter.value(), Some(1));
  }
}
