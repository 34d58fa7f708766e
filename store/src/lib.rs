//! Persistence for users, symbols, watchlists, rules and alert history.
//!
//! Repositories are `async_trait` traits so the dispatch loop can be driven
//! by any backend; the SQLite implementations live in [`repository_sqlx`].

pub mod db;
pub mod model;
pub mod repository;
pub mod repository_sqlx;

pub use db::Db;
pub use model::{AlertRecord, NewAlert, NewUser, Symbol, User};
pub use repository::{
    AlertHistoryRepository, Repositories, RuleRepository, SymbolRepository, UserRepository,
    WatchlistRepository,
};
