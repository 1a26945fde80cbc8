use std::sync::Mutex;

use chrono::{TimeZone, Utc};
use sonyflake::Sonyflake;

use crate::{errors, Result};

// built on first use, a host without a private IPv4 gets an error here on
// every call instead of a poisoned static
static SF: Mutex<Option<Sonyflake>> = Mutex::new(None);

fn generator() -> Result<Sonyflake> {
    let mut slot = SF.lock().map_err(errors::any)?;
    if let Some(sf) = slot.as_ref() {
        return Ok(sf.clone());
    }
    let start_time = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| errors::configuration("invalid id epoch"))?;
    let sf = Sonyflake::builder()
        .start_time(start_time)
        .finalize()
        .map_err(errors::any)?;
    *slot = Some(sf.clone());
    Ok(sf)
}

pub fn next_id() -> Result<u64> {
    generator()?.next_id().map_err(errors::any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Code;

    #[test]
    fn next_id_reports_instead_of_panicking() {
        match next_id() {
            Ok(first) => {
                let second = next_id().unwrap();
                assert!(second > first);
            }
            // no private IPv4 on this host
            Err(err) => assert!(matches!(err.kind(), Code::Any(_))),
        }
    }
}
