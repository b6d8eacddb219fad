//! Turns the raw format catalog into resolution choices.

use std::collections::BTreeMap;

use crate::{
    error::{Error, Result},
    model::{ResolutionChoice, StreamVariant},
};

/// Group MP4 variants by height, keep the highest-bitrate variant of each
/// height and return one choice per height, tallest first.
///
/// A missing bitrate counts as zero; on equal bitrates the first variant wins.
pub fn select_formats(variants: &[StreamVariant]) -> Result<Vec<ResolutionChoice>> {
    let mut best: BTreeMap<u32, &StreamVariant> = BTreeMap::new();

    for variant in variants {
        if variant.container_ext != "mp4" {
            continue;
        }
        let Some(height) = variant.vertical_resolution.filter(|h| *h > 0) else {
            continue;
        };
        match best.get(&height) {
            Some(current) if bitrate(variant) <= bitrate(current) => {}
            _ => {
                best.insert(height, variant);
            }
        }
    }

    if best.is_empty() {
        return Err(Error::NoFormatsFound);
    }

    Ok(best
        .into_iter()
        .rev()
        .map(|(height, variant)| ResolutionChoice {
            label: format!("{height}p"),
            variant_id: variant.id.clone(),
            resolution: height,
        })
        .collect())
}

fn bitrate(variant: &StreamVariant) -> f64 {
    variant.bitrate.unwrap_or(0.0)
}
