//! Best-match selection between resource variants and a device configuration.
//!
//! Two phases: candidates that contradict the device are eliminated, then an
//! ordered qualifier-priority filter narrows the survivors. Ties keep the
//! earliest-declared candidate.

use crate::structs::{DeviceConfig, ResTableConfig};

/// Select the best-matching candidate for `device`.
///
/// Returns the index into `candidates`, or `None` when every candidate
/// contradicts the device. A single candidate wins immediately without
/// running any filter.
pub fn best_match(candidates: &[&ResTableConfig], device: &DeviceConfig) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }
    if candidates.len() == 1 {
        return Some(0);
    }

    let mut remaining: Vec<usize> = (0..candidates.len())
        .filter(|&i| !contradicts(candidates[i], device))
        .collect();

    if remaining.is_empty() {
        return None;
    }

    for filter in FILTERS {
        if remaining.len() == 1 {
            break;
        }
        filter(candidates, device, &mut remaining);
    }

    remaining.first().copied()
}

/// A candidate contradicts the device when it demands a qualifier value the
/// device cannot satisfy. Unset qualifiers (zero / empty) never contradict.
fn contradicts(candidate: &ResTableConfig, device: &DeviceConfig) -> bool {
    if !candidate.language.is_empty() && candidate.language != device.language {
        return true;
    }
    if !candidate.country.is_empty() && candidate.country != device.country {
        return true;
    }
    if candidate.orientation != 0 && candidate.orientation != device.orientation {
        return true;
    }
    if candidate.night_mode() != 0 && candidate.night_mode() != device.night_mode {
        return true;
    }
    if candidate.screen_size_class() != 0 && candidate.screen_size_class() > device.screen_size {
        return true;
    }
    if candidate.sdk_version != 0 && candidate.sdk_version > device.sdk_version {
        return true;
    }

    false
}

type Filter = fn(&[&ResTableConfig], &DeviceConfig, &mut Vec<usize>);

/// Fixed priority order: locale, night mode, density, orientation, screen
/// size, SDK.
const FILTERS: [Filter; 6] = [
    filter_locale,
    filter_night_mode,
    filter_density,
    filter_orientation,
    filter_screen_size,
    filter_sdk,
];

/// Keep candidates matching on a predicate; an empty result keeps everyone
fn retain_if_any(
    candidates: &[&ResTableConfig],
    remaining: &mut Vec<usize>,
    pred: impl Fn(&ResTableConfig) -> bool,
) {
    let matched: Vec<usize> = remaining
        .iter()
        .copied()
        .filter(|&i| pred(candidates[i]))
        .collect();

    if !matched.is_empty() {
        *remaining = matched;
    }
}

fn filter_locale(candidates: &[&ResTableConfig], device: &DeviceConfig, remaining: &mut Vec<usize>) {
    retain_if_any(candidates, remaining, |c| c.language == device.language);
}

fn filter_night_mode(
    candidates: &[&ResTableConfig],
    device: &DeviceConfig,
    remaining: &mut Vec<usize>,
) {
    retain_if_any(candidates, remaining, |c| {
        c.night_mode() == device.night_mode
    });
}

/// Distance to the device density: down-scaling costs the gap, up-scaling
/// costs it twice, so a denser variant wins when both are off-target
fn density_distance(candidate: u16, device: u16) -> u32 {
    let (d, target) = (candidate as u32, device as u32);
    if d >= target { d - target } else { 2 * (target - d) }
}

fn filter_density(
    candidates: &[&ResTableConfig],
    device: &DeviceConfig,
    remaining: &mut Vec<usize>,
) {
    let best = remaining
        .iter()
        .filter(|&&i| candidates[i].density != 0)
        .map(|&i| density_distance(candidates[i].density, device.density))
        .min();

    let Some(best) = best else {
        return;
    };

    *remaining = remaining
        .iter()
        .copied()
        .filter(|&i| {
            candidates[i].density != 0
                && density_distance(candidates[i].density, device.density) == best
        })
        .collect();
}

fn filter_orientation(
    candidates: &[&ResTableConfig],
    device: &DeviceConfig,
    remaining: &mut Vec<usize>,
) {
    retain_if_any(candidates, remaining, |c| {
        c.orientation == device.orientation
    });
}

fn filter_screen_size(
    candidates: &[&ResTableConfig],
    device: &DeviceConfig,
    remaining: &mut Vec<usize>,
) {
    // declared sizes above the device were already eliminated; prefer the
    // largest remaining declared size
    let best = remaining
        .iter()
        .map(|&i| candidates[i].screen_size_class())
        .filter(|&s| s != 0 && s <= device.screen_size)
        .max();

    let Some(best) = best else {
        return;
    };

    *remaining = remaining
        .iter()
        .copied()
        .filter(|&i| candidates[i].screen_size_class() == best)
        .collect();
}

fn filter_sdk(candidates: &[&ResTableConfig], _device: &DeviceConfig, remaining: &mut Vec<usize>) {
    let best = remaining
        .iter()
        .map(|&i| candidates[i].sdk_version)
        .filter(|&v| v != 0)
        .max();

    let Some(best) = best else {
        return;
    };

    *remaining = remaining
        .iter()
        .copied()
        .filter(|&i| candidates[i].sdk_version == best)
        .collect();
}
