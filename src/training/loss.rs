//! Typed loss inputs handed to the training framework
//!
//! The loss mathematics lives in the framework. This module only carries the
//! weights and bounds it needs and combines the components it reports.

use serde::{Deserialize, Serialize};

use crate::config::{Configuration, PcBounds};

/// Loss-related parameters passed with every step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossParameters {
    pub collision_loss_weight: f64,
    pub point_match_loss_weight: f64,
    pub collision_loss_margin: f64,
    pub pc_bounds: PcBounds,
    pub hard_negative_ratio: Option<f64>,
    pub gradient_clip_val: f64,
}

/// Unweighted loss terms reported by one training step
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LossComponents {
    pub collision: f64,
    pub point_match: f64,
}

impl LossParameters {
    /// Weighted sum of the loss terms
    pub fn weighted_total(&self, components: &LossComponents) -> f64 {
        self.collision_loss_weight * components.collision
            + self.point_match_loss_weight * components.point_match
    }

    /// Hard negatives to mine from a batch of `batch_size`; zero when mining is disabled
    pub fn hard_negative_count(&self, batch_size: usize) -> usize {
        match self.hard_negative_ratio {
            Some(ratio) => (ratio * batch_size as f64).floor() as usize,
            None => 0,
        }
    }
}

impl From<&Configuration> for LossParameters {
    fn from(config: &Configuration) -> Self {
        let tm = config.training_model_parameters();
        Self {
            collision_loss_weight: tm.collision_loss_weight,
            point_match_loss_weight: tm.point_match_loss_weight,
            collision_loss_margin: tm.collision_loss_margin,
            pc_bounds: tm.pc_bounds,
            hard_negative_ratio: tm.hard_negative_ratio,
            gradient_clip_val: config.run().gradient_clip_val,
        }
    }
}
