//! Grid enumeration for the parameter sweep.

/// Next value of a swept parameter after `curr`, bounded by `sup`.
///
/// Returns `sup + 1` once `curr` has reached `sup`, which ends the sweep.
/// When `sup` is a multiple of `step`, values snap onto multiples of `step`;
/// a multiple closer than half a step to `curr` is skipped in favour of the
/// following one. The returned value never exceeds `sup` and the sequence
/// always visits `sup` itself.
pub fn next_value(curr: u64, sup: u64, step: u64) -> u64 {
    if curr >= sup {
        return curr.saturating_add(1);
    }

    let step = step.max(1);
    let next = curr.saturating_add(step).min(sup);
    if next == sup || step == 1 {
        return next;
    }

    if sup % step == 0 {
        let first_multiple = (curr / step + 1) * step;
        if first_multiple <= sup {
            // strict `m - curr > step / 2` without rounding the half step
            return if 2 * (first_multiple - curr) > step {
                first_multiple
            } else {
                (first_multiple + step).min(sup)
            };
        }
    }

    next
}

/// Every value visited between `inf` and `sup` inclusive
pub fn sweep_values(inf: u64, sup: u64, step: u64) -> Vec<u64> {
    let mut values = Vec::new();
    let mut curr = inf;
    while curr <= sup {
        values.push(curr);
        curr = next_value(curr, sup, step);
    }
    values
}
