/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Score, in centipawns, that a repetition or fifty-move draw is worth to the side that is ahead.
///
/// Drawn lines are scored as `-contempt` for the side to move when it is winning,
/// and `+contempt` when it is losing.
macro_rules! contempt {
    () => {
        25
    };
}
pub(crate) use contempt;

/// Divisor for computing the soft timeout of a search.
macro_rules! soft_timeout_divisor {
    () => {
        30
    };
}
pub(crate) use soft_timeout_divisor;

/// Divisor for computing the hard timeout of a search.
macro_rules! hard_timeout_divisor {
    () => {
        6
    };
}
pub(crate) use hard_timeout_divisor;

/// Divisor for computing how much of the time increment to use.
macro_rules! time_inc_divisor {
    () => {
        2
    };
}
pub(crate) use time_inc_divisor;

/// Nodes between time checks, as a mask.
macro_rules! time_check_mask {
    () => {
        2047
    };
}
pub(crate) use time_check_mask;

/// Nodes between time checks when less than [`low_time_threshold`] remains.
macro_rules! low_time_check_mask {
    () => {
        255
    };
}
pub(crate) use low_time_check_mask;

/// Milliseconds on the clock below which the time is checked more often.
macro_rules! low_time_threshold {
    () => {
        1_000
    };
}
pub(crate) use low_time_threshold;

/// Initial Aspiration Window size
macro_rules! initial_aspiration_window_delta {
    () => {
        25
    };
}
pub(crate) use initial_aspiration_window_delta;

/// Smallest Aspiration Window size
macro_rules! min_aspiration_window_delta {
    () => {
        10
    };
}
pub(crate) use min_aspiration_window_delta;

/// Minimum depth to incorporate Aspiration Windows into the Iterative Deepening search.
macro_rules! min_aspiration_window_depth {
    () => {
        2
    };
}
pub(crate) use min_aspiration_window_depth;

/// Number of times an Aspiration Window may widen before the search falls back to an infinite window.
macro_rules! max_aspiration_window_widenings {
    () => {
        4
    };
}
pub(crate) use max_aspiration_window_widenings;

/// Largest value a history entry may reach.
macro_rules! max_history_bonus {
    () => {
        16_384
    };
}
pub(crate) use max_history_bonus;

/// Minimum depth at which null move pruning can be applied.
macro_rules! min_nmp_depth {
    () => {
        3
    };
}
pub(crate) use min_nmp_depth;

/// Value to subtract from `depth` when applying null move pruning.
macro_rules! nmp_reduction {
    () => {
        2
    };
}
pub(crate) use nmp_reduction;

/// Maximum depth at which to apply reverse futility pruning.
macro_rules! max_rfp_depth {
    () => {
        6
    };
}
pub(crate) use max_rfp_depth;

/// Safety margin, per ply of depth, when applying reverse futility pruning.
macro_rules! rfp_margin {
    () => {
        80
    };
}
pub(crate) use rfp_margin;

/// Maximum depth at which to apply razoring.
macro_rules! max_razoring_depth {
    () => {
        3
    };
}
pub(crate) use max_razoring_depth;

/// Razoring margins, indexed by depth.
macro_rules! razoring_margins {
    () => {
        [0, 300, 400, 600]
    };
}
pub(crate) use razoring_margins;

/// Maximum depth at which to apply futility pruning.
macro_rules! max_futility_depth {
    () => {
        3
    };
}
pub(crate) use max_futility_depth;

/// Futility margins, indexed by depth.
macro_rules! futility_margins {
    () => {
        [0, 150, 300, 500]
    };
}
pub(crate) use futility_margins;

/// Minimum depth at which to apply late move reductions.
macro_rules! min_lmr_depth {
    () => {
        3
    };
}
pub(crate) use min_lmr_depth;

/// Minimum moves that must be made before late move reductions can be applied.
macro_rules! min_lmr_moves {
    () => {
        4
    };
}
pub(crate) use min_lmr_moves;

/// Base value in the LMR formula.
macro_rules! lmr_offset {
    () => {
        0.75
    };
}
pub(crate) use lmr_offset;

/// Divisor in the LMR formula.
macro_rules! lmr_divisor {
    () => {
        2.25
    };
}
pub(crate) use lmr_divisor;

/// Margin added to the captured piece's value during delta pruning in quiescence.
macro_rules! delta_margin {
    () => {
        200
    };
}
pub(crate) use delta_margin;

/// Minimum exchange value for a capture to be searched in quiescence.
macro_rules! qsearch_see_threshold {
    () => {
        0
    };
}
pub(crate) use qsearch_see_threshold;
