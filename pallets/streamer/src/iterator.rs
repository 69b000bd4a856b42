//! Resumable traversal of `(stream, gauge)` pairs for one epoch identifier.

use crate::{
  pagination::{PaginationIterator, Step, paginate},
  types::{DistrRecord, EpochPointer, GaugeId, Stream, StreamId},
};

/// Cursor over a snapshot of streams sorted by id, visiting the gauge records
/// of every stream whose epoch identifier matches.
pub struct StreamIterator<'a> {
  data: &'a [Stream],
  stream_idx: usize,
  gauge_idx: usize,
  epoch_identifier: &'a [u8],
}

impl<'a> StreamIterator<'a> {
  /// Positions the cursor on the first matching pair at or after
  /// `(start_stream_id, start_gauge_id)`.
  pub fn new(
    data: &'a [Stream],
    start_stream_id: StreamId,
    start_gauge_id: GaugeId,
    epoch_identifier: &'a [u8],
  ) -> Self {
    let stream_idx = data
      .binary_search_by_key(&start_stream_id, |s| s.id)
      .unwrap_or_else(|idx| idx);

    let mut iter = Self {
      data,
      stream_idx,
      gauge_idx: 0,
      epoch_identifier,
    };

    let Some(stream) = data.get(stream_idx) else {
      return iter;
    };

    iter.gauge_idx = stream
      .distribute_to
      .records()
      .binary_search_by_key(&start_gauge_id, |r| r.gauge_id)
      .unwrap_or_else(|idx| idx);

    if !iter.valid_invariants() {
      iter.find_next_stream();
    }
    iter
  }

  fn valid_invariants(&self) -> bool {
    let Some(stream) = self.data.get(self.stream_idx) else {
      return false;
    };
    let records = stream.distribute_to.records();
    !records.is_empty()
      && stream.distr_epoch_identifier.as_slice() == self.epoch_identifier
      && self.gauge_idx < records.len()
  }

  fn find_next_stream(&mut self) {
    self.gauge_idx = 0;
    self.stream_idx = self.stream_idx.saturating_add(1);
    while self.stream_idx < self.data.len() {
      if self.valid_invariants() {
        return;
      }
      self.stream_idx += 1;
    }
  }

  pub fn stream(&self) -> Option<&'a Stream> {
    if self.valid_invariants() {
      self.data.get(self.stream_idx)
    } else {
      None
    }
  }

  pub fn gauge(&self) -> Option<&'a DistrRecord> {
    self
      .stream()
      .and_then(|s| s.distribute_to.records().get(self.gauge_idx))
  }
}

impl<'a> PaginationIterator for StreamIterator<'a> {
  type Item = (&'a Stream, DistrRecord);

  fn valid(&self) -> bool {
    self.valid_invariants()
  }

  fn next(&mut self) {
    self.gauge_idx = self.gauge_idx.saturating_add(1);
    if !self.valid_invariants() {
      self.find_next_stream();
    }
  }

  fn value(&self) -> Option<Self::Item> {
    let stream = self.stream()?;
    let record = self.gauge()?;
    Some((stream, *record))
  }
}

/// Advances `pointer` over at most `max_steps` steps of `streams`, invoking `f`
/// on every visited pair.
///
/// The returned pointer names the first unvisited pair, or is exhausted once
/// the last matching pair has been visited.
pub fn iterate_epoch_pointer<F>(
  mut pointer: EpochPointer,
  streams: &[Stream],
  max_steps: u64,
  f: F,
) -> (EpochPointer, u64)
where
  F: FnMut((&Stream, DistrRecord)) -> Step,
{
  let mut iter = StreamIterator::new(
    streams,
    pointer.stream_id,
    pointer.gauge_id,
    &pointer.epoch_identifier,
  );
  let steps = paginate(&mut iter, max_steps, f);
  let position = iter.value().map(|(stream, record)| (stream.id, record.gauge_id));

  match position {
    Some((stream_id, gauge_id)) => {
      pointer.stream_id = stream_id;
      pointer.gauge_id = gauge_id;
    }
    None => pointer.set_to_last_gauge(),
  }
  (pointer, steps)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::{Coins, DistrInfo, DistributionTarget, EpochIdentifier};
  use alloc::{vec, vec::Vec};
  use frame::prelude::BoundedVec;

  fn ident(s: &[u8]) -> EpochIdentifier {
    BoundedVec::truncate_from(s.to_vec())
  }

  fn stream(id: StreamId, epoch: &[u8], gauges: &[GaugeId]) -> Stream {
    let records = gauges
      .iter()
      .map(|g| DistrRecord {
        gauge_id: *g,
        weight: 1,
      })
      .collect();
    Stream {
      id,
      distribute_to: DistributionTarget::Gauges(DistrInfo::new(records).unwrap()),
      coins: Coins::new(),
      start_time: 0,
      distr_epoch_identifier: ident(epoch),
      num_epochs_paid_over: 1,
      filled_epochs: 0,
      distributed_coins: Coins::new(),
      sponsored: false,
      epoch_coins: Coins::new(),
    }
  }

  fn fixture() -> Vec<Stream> {
    vec![
      stream(1, b"day", &[1, 2, 3]),
      stream(2, b"hour", &[2, 3, 4]),
      stream(3, b"hour", &[1, 5, 6]),
      stream(4, b"day", &[2, 5, 7]),
    ]
  }

  fn drive(
    pointer: EpochPointer,
    streams: &[Stream],
    max: u64,
  ) -> (EpochPointer, u64, Vec<(u64, u64)>) {
    let mut visited = Vec::new();
    let (p, steps) = iterate_epoch_pointer(pointer, streams, max, |(s, r)| {
      visited.push((s.id, r.gauge_id));
      Step::proceed(1)
    });
    (p, steps, visited)
  }

  #[test]
  fn day_epoch_is_drained_over_two_calls() {
    let streams = fixture();
    let (p, steps, visited) = drive(EpochPointer::new(ident(b"day")), &streams, 4);
    assert_eq!(visited, vec![(1, 1), (1, 2), (1, 3), (4, 2)]);
    assert_eq!(steps, 4);
    assert_eq!((p.stream_id, p.gauge_id), (4, 5));

    let (p, steps, visited) = drive(p, &streams, 100);
    assert_eq!(visited, vec![(4, 5), (4, 7)]);
    assert_eq!(steps, 2);
    assert!(p.is_exhausted());
  }

  #[test]
  fn exhausted_pointer_is_idempotent() {
    let streams = fixture();
    let mut exhausted = EpochPointer::new(ident(b"hour"));
    exhausted.set_to_last_gauge();
    for max in [0, 1, 100] {
      let (p, steps, visited) = drive(exhausted.clone(), &streams, max);
      assert_eq!(steps, 0);
      assert!(visited.is_empty());
      assert_eq!(p, exhausted);
    }
  }

  #[test]
  fn zero_budget_moves_pointer_to_first_match_without_visiting() {
    let streams = fixture();
    let (p, steps, visited) = drive(EpochPointer::new(ident(b"hour")), &streams, 0);
    assert_eq!(steps, 0);
    assert!(visited.is_empty());
    assert_eq!((p.stream_id, p.gauge_id), (2, 2));
  }

  #[test]
  fn every_pair_is_visited_once_for_any_budget() {
    let streams = fixture();
    let expected = vec![(2, 2), (2, 3), (2, 4), (3, 1), (3, 5), (3, 6)];
    for budget in 1..=7 {
      let mut pointer = EpochPointer::new(ident(b"hour"));
      let mut all = Vec::new();
      let mut calls = 0;
      while !pointer.is_exhausted() {
        let (p, steps, visited) = drive(pointer, &streams, budget);
        assert!(steps <= budget);
        all.extend(visited);
        pointer = p;
        calls += 1;
        assert!(calls < 20, "pointer must converge");
      }
      assert_eq!(all, expected, "budget {budget}");
    }
  }

  #[test]
  fn resumes_at_next_gauge_when_resume_gauge_vanished() {
    let streams = fixture();
    let mut pointer = EpochPointer::new(ident(b"day"));
    pointer.stream_id = 4;
    pointer.gauge_id = 3;
    let (_, _, visited) = drive(pointer, &streams, 100);
    assert_eq!(visited, vec![(4, 5), (4, 7)]);
  }

  #[test]
  fn resumes_at_next_stream_when_resume_stream_vanished() {
    let streams = vec![stream(1, b"day", &[1]), stream(5, b"day", &[9])];
    let mut pointer = EpochPointer::new(ident(b"day"));
    pointer.stream_id = 3;
    pointer.gauge_id = 7;
    let (p, _, visited) = drive(pointer, &streams, 100);
    assert_eq!(visited, vec![(5, 9)]);
    assert!(p.is_exhausted());
  }

  #[test]
  fn skips_empty_and_mismatching_streams() {
    let streams = vec![
      stream(1, b"day", &[]),
      stream(2, b"week", &[1, 2]),
      stream(3, b"day", &[4]),
    ];
    let (p, steps, visited) = drive(EpochPointer::new(ident(b"day")), &streams, 10);
    assert_eq!(visited, vec![(3, 4)]);
    assert_eq!(steps, 1);
    assert!(p.is_exhausted());
  }

  #[test]
  fn empty_snapshot_exhausts_immediately() {
    let (p, steps, visited) = drive(EpochPointer::new(ident(b"day")), &[], 10);
    assert_eq!(steps, 0);
    assert!(visited.is_empty());
    assert!(p.is_exhausted());
  }

  #[test]
  fn stop_keeps_pointer_on_unprocessed_pair() {
    let streams = fixture();
    let start = EpochPointer::new(ident(b"day"));
    let (p, steps) = iterate_epoch_pointer(start, &streams, 10, |(_, r)| {
      if r.gauge_id == 3 { Step::stop(1) } else { Step::proceed(1) }
    });
    assert_eq!(steps, 3);
    assert_eq!((p.stream_id, p.gauge_id), (1, 3));
  }
}
