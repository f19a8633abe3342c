//! Episode metrics
//!
//! Rolling window over completed episodes used for the reported
//! `episode_reward_*` statistics.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::worker::EpisodeSummary;

/// Smoothed statistics over the window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpisodeStats {
    pub reward_mean: f64,
    pub reward_min: f64,
    pub reward_max: f64,
    pub len_mean: f64,
}

/// Sliding window of the most recent episodes
#[derive(Debug, Clone)]
pub struct EpisodeWindow {
    capacity: usize,
    episodes: VecDeque<EpisodeSummary>,
    total: u64,
}

impl EpisodeWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            episodes: VecDeque::with_capacity(capacity),
            total: 0,
        }
    }

    pub fn push(&mut self, episode: EpisodeSummary) {
        if self.episodes.len() == self.capacity {
            self.episodes.pop_front();
        }
        self.episodes.push_back(episode);
        self.total += 1;
    }

    pub fn extend<I: IntoIterator<Item = EpisodeSummary>>(&mut self, episodes: I) {
        for episode in episodes {
            self.push(episode);
        }
    }

    /// Episodes completed since creation
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    /// `None` until the first episode completes
    pub fn stats(&self) -> Option<EpisodeStats> {
        if self.episodes.is_empty() {
            return None;
        }

        let n = self.episodes.len() as f64;
        let mut sum = 0.0;
        let mut len_sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for episode in &self.episodes {
            sum += episode.reward;
            len_sum += episode.length as f64;
            min = min.min(episode.reward);
            max = max.max(episode.reward);
        }

        Some(EpisodeStats {
            reward_mean: sum / n,
            reward_min: min,
            reward_max: max,
            len_mean: len_sum / n,
        })
    }

    /// Restore the counter after loading a checkpoint
    pub(crate) fn set_total(&mut self, total: u64) {
        self.total = total;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(reward: f64, length: usize) -> EpisodeSummary {
        EpisodeSummary { reward, length }
    }

    #[test]
    fn test_empty_window_has_no_stats() {
        let window = EpisodeWindow::new(10);
        assert!(window.stats().is_none());
        assert_eq!(window.total(), 0);
    }

    #[test]
    fn test_window_smoothing() {
        let mut window = EpisodeWindow::new(2);
        window.extend([ep(1.0, 10), ep(3.0, 20), ep(5.0, 30)]);

        let stats = window.stats().unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window.total(), 3);
        assert_eq!(stats.reward_mean, 4.0);
        assert_eq!(stats.reward_min, 3.0);
        assert_eq!(stats.reward_max, 5.0);
        assert_eq!(stats.len_mean, 25.0);
    }
}
