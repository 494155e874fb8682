//! Maximum-information item selection with top-K exposure control.
//!
//! Always serving the single most informative item makes the item sequence
//! predictable for examinees with similar trajectories, so the selector draws
//! uniformly among the K most informative unanswered items instead.

use std::cmp::Ordering;
use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::CatError;
use crate::irt;
use crate::model::Item;

/// Default size of the randomization band.
pub const DEFAULT_TOP_K: usize = 3;

/// An item paired with its information at the current ability.
#[derive(Debug, Clone, Copy)]
pub struct RankedItem<'a> {
    pub item: &'a Item,
    pub information: f64,
}

/// Top-K randomized maximum-information selector.
#[derive(Debug, Clone, Copy)]
pub struct ItemSelector {
    top_k: usize,
}

impl Default for ItemSelector {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_K)
    }
}

impl ItemSelector {
    /// Create a selector drawing from the `top_k` most informative items.
    ///
    /// A band of 0 is treated as 1 (pure maximum information).
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k: top_k.max(1),
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Rank unanswered items by information at `theta`, most informative first.
    ///
    /// Ties are broken by item id so the order is reproducible.
    pub fn rank<'a>(
        &self,
        items: &'a [Item],
        answered: &HashSet<&str>,
        theta: f64,
    ) -> Vec<RankedItem<'a>> {
        let mut ranked: Vec<RankedItem<'a>> = items
            .iter()
            .filter(|item| !answered.contains(item.id.as_str()))
            .map(|item| RankedItem {
                item,
                information: irt::information(&item.params, theta),
            })
            .collect();

        ranked.sort_by(|x, y| {
            y.information
                .partial_cmp(&x.information)
                .unwrap_or(Ordering::Equal)
                .then_with(|| x.item.id.cmp(&y.item.id))
        });
        ranked
    }

    /// Pick the next item for an examinee at `theta`.
    ///
    /// Fails with [`CatError::ExhaustedPool`] when every item is answered.
    pub fn select_next<'a, R: Rng + ?Sized>(
        &self,
        items: &'a [Item],
        answered: &HashSet<&str>,
        theta: f64,
        rng: &mut R,
    ) -> Result<&'a Item, CatError> {
        let ranked = self.rank(items, answered, theta);
        let band = &ranked[..ranked.len().min(self.top_k)];

        let Some(choice) = band.choose(rng) else {
            return Err(CatError::ExhaustedPool {
                assignment_id: items
                    .first()
                    .map(|i| i.assignment_id.clone())
                    .unwrap_or_default(),
                theta,
            });
        };

        tracing::debug!(
            item_id = %choice.item.id,
            information = choice.information,
            band = band.len(),
            remaining = ranked.len(),
            "selected next item"
        );
        Ok(choice.item)
    }
}
