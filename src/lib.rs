//! Tandem - batch-parallel skip lists with cached span sums.
//!
//! An arena of elements, each starting as its own list. Batches of joins and
//! splits reshape the lists in parallel; the augmented variant keeps a sum per
//! tower level so list and range sums stay logarithmic after every batch.
//!
//! # Quick Start
//!
//! ```
//! use tandem::{AugmentedSkipList, ElemId};
//!
//! // One random integer per element decides its tower height.
//! let list = AugmentedSkipList::new(&[5, 0, 2, 1, 0, 3]).unwrap();
//!
//! // Chain everything together, then close it into a cycle.
//! let joins: Vec<_> = (0..5).map(|i| (ElemId::new(i), ElemId::new(i + 1))).collect();
//! list.batch_join(&joins);
//! list.join(ElemId::new(5), ElemId::new(0));
//! assert_eq!(list.get_sum(ElemId::new(3)), 6);
//!
//! // Cutting a cycle twice leaves two open lists.
//! list.batch_split(&[ElemId::new(1), ElemId::new(3)]);
//! assert_eq!(list.get_sum(ElemId::new(2)), 2);
//! assert_eq!(list.get_sum(ElemId::new(0)), 4);
//! assert_eq!(list.get_subsequence_sum(ElemId::new(4), ElemId::new(1)), 4);
//! ```

mod aggregate;
mod coordination;
mod traversal;

pub mod augmented;
pub mod check;
pub mod config;
pub mod error;
pub mod profiling;
pub mod skip_list;
pub mod tower;

pub use augmented::AugmentedSkipList;
pub use config::Config;
pub use error::Error;
pub use levels::LevelPool;
pub use levels::PoolError;
pub use skip_list::SkipList;
pub use tower::ElemId;
pub use tower::Link;
pub use tower::MAX_HEIGHT;
pub use tower::height_for;
