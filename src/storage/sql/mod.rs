//! SQL storage backends built on sqlx.
//!
//! Both backends keep a single `properties` table: the id column, the
//! attribute set as a JSON document, and the two managed timestamps.

mod mysql;
mod postgres;

use chrono::{DateTime, SubsecRound, Utc};

pub use mysql::MySqlStorage;
pub use postgres::PostgresStorage;

/// Current time at the microsecond precision both databases store.
fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
