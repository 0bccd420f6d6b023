//! Client-side query synchronization.
//!
//! - [`filter`]: FilterState codec and cache keys
//! - [`cache`]: sequence-checked cache store with keep-previous-data
//! - [`cursor`]: cursor history for backward navigation
//! - [`list`]: list query coordinator
//! - [`detail`]: single-incident query
//! - [`debounce`]: debounced search input
//! - [`clock`]: injectable wall clock

pub mod cache;
pub mod clock;
pub mod cursor;
pub mod debounce;
pub mod detail;
pub mod filter;
pub mod list;

pub use cache::{CacheEntry, CacheStore, FetchStatus, QueryData};
pub use clock::{Clock, ManualClock, SystemClock};
pub use cursor::CursorHistory;
pub use debounce::DebouncedInput;
pub use detail::{DetailQuery, DetailView};
pub use filter::{CacheKey, FilterCodec, FilterState, ListLocation, DEFAULT_LIMIT, MAX_LIMIT};
pub use list::{ListQuery, ListView, ViewState};
