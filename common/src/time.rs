// Wall clock helpers used for post identifiers and timestamps.
// Values come from the local system clock and are not trusted by anyone
// else: two browsers or two machines never agree on a feed anyway.

use chrono::{DateTime, Utc};

#[inline]
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
