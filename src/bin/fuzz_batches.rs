//! AFL fuzz harness for batch joins, splits and updates.
//!
//! The input bytes choose tower heights and then a sequence of batches. A
//! plain array of level-0 links and values is kept alongside as the model.
//! After every batch the skip list must pass every invariant check and agree
//! with the model on neighbors and list sums.

use afl::fuzz;
use tandem::check;
use tandem::{AugmentedSkipList, ElemId};

const NUM_ELEMENTS: usize = 48;

/// Batch types the fuzzer can generate
#[derive(Debug, Clone, Copy)]
enum FuzzOp {
    /// Join the list holding `left` onto the end of the list holding `right`
    Join { left: u8, right: u8 },
    /// Pair up every open list and join each pair in one batch
    JoinAll { shift: u8 },
    /// Close the list holding `element` into a cycle
    Close { element: u8 },
    /// Split after each of up to three elements in one batch
    Split { elements: [u8; 3], count: u8 },
    /// Assign a value to one element
    Update { element: u8, value: i8 },
}

impl FuzzOp {
    fn from_bytes(bytes: &[u8]) -> Option<(FuzzOp, &[u8])> {
        if bytes.is_empty() {
            return None;
        }

        let op_type = bytes[0] % 5;
        let rest = &bytes[1..];
        let n = NUM_ELEMENTS as u8;

        match op_type {
            0 if rest.len() >= 2 => Some((FuzzOp::Join { left: rest[0] % n, right: rest[1] % n }, &rest[2..])),
            1 if !rest.is_empty() => Some((FuzzOp::JoinAll { shift: rest[0] }, &rest[1..])),
            2 if !rest.is_empty() => Some((FuzzOp::Close { element: rest[0] % n }, &rest[1..])),
            3 if rest.len() >= 4 => {
                let op = FuzzOp::Split {
                    elements: [rest[0] % n, rest[1] % n, rest[2] % n],
                    count: rest[3] % 3 + 1,
                };
                Some((op, &rest[4..]))
            }
            4 if rest.len() >= 2 => Some((FuzzOp::Update { element: rest[0] % n, value: rest[1] as i8 }, &rest[2..])),
            _ => None,
        }
    }
}

/// Level-0 links and values, updated one element at a time.
struct Model {
    next: Vec<Option<usize>>,
    prev: Vec<Option<usize>>,
    values: Vec<i64>,
}

impl Model {
    fn new() -> Model {
        return Model {
            next: vec![None; NUM_ELEMENTS],
            prev: vec![None; NUM_ELEMENTS],
            values: vec![1; NUM_ELEMENTS],
        };
    }

    /// Last element of `v`'s list, or `None` if the list is circular.
    fn tail(&self, v: usize) -> Option<usize> {
        let mut current = v;
        while let Some(next) = self.next[current] {
            if next == v {
                return None;
            }
            current = next;
        }
        return Some(current);
    }

    fn head(&self, v: usize) -> Option<usize> {
        let mut current = v;
        while let Some(prev) = self.prev[current] {
            if prev == v {
                return None;
            }
            current = prev;
        }
        return Some(current);
    }

    fn members(&self, v: usize) -> Vec<usize> {
        let start = self.head(v).unwrap_or(v);
        let mut members = vec![start];
        let mut current = start;
        while let Some(next) = self.next[current] {
            if next == start {
                break;
            }
            members.push(next);
            current = next;
        }
        return members;
    }

    fn link(&mut self, left: usize, right: usize) {
        self.next[left] = Some(right);
        self.prev[right] = Some(left);
    }

    fn cut(&mut self, v: usize) {
        if let Some(next) = self.next[v].take() {
            self.prev[next] = None;
        }
    }
}

fn main() {
    fuzz!(|data: &[u8]| {
        if data.len() < NUM_ELEMENTS {
            return;
        }
        let (height_bytes, mut remaining) = data.split_at(NUM_ELEMENTS);
        // Low bits set make tall towers; three bits caps heights at four.
        let randoms: Vec<u64> = height_bytes.iter().map(|&b| (b & 0b111) as u64).collect();
        let Ok(list) = AugmentedSkipList::new(&randoms) else {
            return;
        };
        let mut model = Model::new();

        while let Some((op, rest)) = FuzzOp::from_bytes(remaining) {
            remaining = rest;

            match op {
                FuzzOp::Join { left, right } => {
                    let (Some(tail), Some(head)) = (model.tail(left as usize), model.head(right as usize)) else {
                        continue;
                    };
                    if model.head(tail) == Some(head) {
                        continue;
                    }
                    list.join(ElemId::new(tail), ElemId::new(head));
                    model.link(tail, head);
                }

                FuzzOp::JoinAll { shift } => {
                    let mut heads: Vec<usize> = (0..NUM_ELEMENTS)
                        .filter(|&v| model.prev[v].is_none())
                        .collect();
                    if heads.is_empty() {
                        continue;
                    }
                    let shift = shift as usize % heads.len();
                    heads.rotate_left(shift);
                    let mut joins = Vec::new();
                    for pair in heads.chunks_exact(2) {
                        // Heads of open lists always have a tail.
                        if let Some(tail) = model.tail(pair[0]) {
                            joins.push((tail, pair[1]));
                        }
                    }
                    let batch: Vec<(ElemId, ElemId)> = joins
                        .iter()
                        .map(|&(l, r)| (ElemId::new(l), ElemId::new(r)))
                        .collect();
                    list.batch_join(&batch);
                    for (l, r) in joins {
                        model.link(l, r);
                    }
                }

                FuzzOp::Close { element } => {
                    let v = element as usize;
                    if let (Some(tail), Some(head)) = (model.tail(v), model.head(v)) {
                        list.join(ElemId::new(tail), ElemId::new(head));
                        model.link(tail, head);
                    }
                }

                FuzzOp::Split { elements, count } => {
                    let chosen = &elements[..count as usize];
                    let batch: Vec<ElemId> = chosen.iter().map(|&e| ElemId::new(e as usize)).collect();
                    list.batch_split(&batch);
                    for &e in chosen {
                        model.cut(e as usize);
                    }
                }

                FuzzOp::Update { element, value } => {
                    list.update(ElemId::new(element as usize), value as i64);
                    model.values[element as usize] = value as i64;
                }
            }

            // CRITICAL INVARIANT: structure and cached sums stay consistent
            check::check_links(list.skip_list()).unwrap();
            check::check_unset(list.skip_list()).unwrap();
            check::check_values(&list).unwrap();

            for v in 0..NUM_ELEMENTS {
                let id = ElemId::new(v);
                assert_eq!(list.next(id), model.next[v].map(ElemId::new), "next of {}", v);
                assert_eq!(list.prev(id), model.prev[v].map(ElemId::new), "prev of {}", v);
                let expected: i64 = model.members(v).iter().map(|&m| model.values[m]).sum();
                assert_eq!(list.get_sum(id), expected, "sum of {}", v);
            }
        }
    });
}
