//! Plan generation
//!
//! Works out which versions have to be visited to move from the current
//! version to a target. Pure: no I/O.

use crate::migration::{Direction, MigrationError};

/// Ordered versions to traverse in one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub direction: Direction,
    pub versions: Vec<i64>,
}

impl Plan {
    pub fn versions(&self) -> &[i64] {
        &self.versions
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }
}

/// Compute the plan for moving from `current` to `target`
///
/// - down and `0 <= target < current`: `[current, current-1, ..., target+1]`
/// - up and `current <= target <= max_known`: `[current+1, ..., target]`
///
/// Going up to the current version is an empty plan. Going down to the current
/// version is rejected.
pub fn plan(
    current: i64,
    max_known: i64,
    target: i64,
    direction: Direction,
) -> Result<Plan, MigrationError> {
    let versions: Vec<i64> = match direction {
        Direction::Down if 0 <= target && target < current => {
            ((target + 1)..=current).rev().collect()
        }
        Direction::Up if current <= target && target <= max_known => {
            ((current + 1)..=target).collect()
        }
        _ => {
            return Err(MigrationError::InvalidTarget {
                target,
                current,
                max_known,
                direction,
            })
        }
    };
    log::debug!("plan {direction} from {current} to {target} (max {max_known}): {versions:?}");
    Ok(Plan {
        direction,
        versions,
    })
}
