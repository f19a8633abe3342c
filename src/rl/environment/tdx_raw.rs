//! TDX raw-bar trading environment
//!
//! One long-only instrument traded at the close of each bar. The agent
//! observes the normalized bar plus its account state, and is rewarded
//! with the change of net worth until the next bar.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{EnvConfig, EnvContext, EnvCreator, Environment, StepInfo, StepResult};
use crate::data::MarketFrame;
use crate::error::{DrlError, Result};
use crate::rl::config::TradingEnvSettings;
use crate::rl::core::{AccountState, ObservationEncoder, TradeAction, NUM_ACTIONS};

/// Net worth fraction below which the episode ends
const BANKRUPTCY_RATIO: f64 = 0.1;

/// Trading environment over a market frame
pub struct TdxRawEnv {
    frame: Arc<MarketFrame>,
    settings: TradingEnvSettings,
    encoder: ObservationEncoder,
    close_idx: usize,
    rng: StdRng,
    cursor: usize,
    cash: f64,
    shares: f64,
    entry_price: f64,
    step_count: usize,
    num_trades: usize,
    done: bool,
}

impl TdxRawEnv {
    /// Create a new environment
    pub fn new(config: &EnvConfig, seed: Option<u64>) -> Result<Self> {
        let frame = Arc::clone(&config.data);
        if frame.len() < 2 {
            return Err(DrlError::Validation(format!(
                "environment needs at least 2 bars, got {}",
                frame.len()
            )));
        }
        let close_idx = frame.column_index("close").ok_or_else(|| {
            DrlError::Validation(format!(
                "market data has no 'close' column (columns: {:?})",
                frame.columns()
            ))
        })?;
        if config.settings.initial_capital <= 0.0 {
            return Err(DrlError::Validation(
                "initial_capital must be positive".to_string(),
            ));
        }

        let encoder = ObservationEncoder::fit(&frame, config.settings.normalization);
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let initial_capital = config.settings.initial_capital;

        Ok(Self {
            frame,
            settings: config.settings.clone(),
            encoder,
            close_idx,
            rng,
            cursor: 0,
            cash: initial_capital,
            shares: 0.0,
            entry_price: 0.0,
            step_count: 0,
            num_trades: 0,
            done: true,
        })
    }

    /// Environment factory for algorithm configs
    pub fn creator() -> EnvCreator {
        Arc::new(|config: &EnvConfig, ctx: &EnvContext| {
            let env = TdxRawEnv::new(config, ctx.seed)?;
            Ok(Box::new(env) as Box<dyn Environment>)
        })
    }

    fn price(&self, index: usize) -> f64 {
        self.frame.rows()[index][self.close_idx]
    }

    fn net_worth_at(&self, price: f64) -> f64 {
        self.cash + self.shares * price
    }

    fn account(&self, price: f64) -> AccountState {
        let holding = self.shares > 0.0;
        AccountState {
            holding,
            unrealized_return: if holding && self.entry_price > 0.0 {
                price / self.entry_price - 1.0
            } else {
                0.0
            },
            cash_ratio: self.cash / self.settings.initial_capital,
        }
    }

    fn observation(&self) -> Vec<f32> {
        let price = self.price(self.cursor);
        self.encoder
            .encode(&self.frame.rows()[self.cursor], &self.account(price))
    }

    /// Execute trading action at the given price
    fn execute(&mut self, action: TradeAction, price: f64) {
        let cost = self.settings.transaction_cost;

        match action {
            TradeAction::Hold => {}
            TradeAction::Buy => {
                if self.shares > 0.0 || price <= 0.0 {
                    return; // Already have position
                }
                let shares = self.cash / (price * (1.0 + cost));
                if shares <= 0.0 {
                    return;
                }
                self.cash -= shares * price * (1.0 + cost);
                self.shares = shares;
                self.entry_price = price;
            }
            TradeAction::Sell => {
                if self.shares <= 0.0 {
                    return; // No position to sell
                }
                let proceeds = self.shares * price;
                self.cash += proceeds - proceeds * cost;
                self.shares = 0.0;
                self.entry_price = 0.0;
                self.num_trades += 1;
            }
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn shares(&self) -> f64 {
        self.shares
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn num_trades(&self) -> usize {
        self.num_trades
    }

    pub fn net_worth(&self) -> f64 {
        self.net_worth_at(self.price(self.cursor))
    }
}

impl Environment for TdxRawEnv {
    fn observation_dim(&self) -> usize {
        self.encoder.dim()
    }

    fn num_actions(&self) -> usize {
        NUM_ACTIONS
    }

    fn reset(&mut self, seed: Option<u64>) -> Vec<f32> {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }

        self.cursor = if self.settings.random_start {
            self.rng.gen_range(0..self.frame.len() - 1)
        } else {
            0
        };
        self.cash = self.settings.initial_capital;
        self.shares = 0.0;
        self.entry_price = 0.0;
        self.step_count = 0;
        self.num_trades = 0;
        self.done = false;

        self.observation()
    }

    fn step(&mut self, action: usize) -> Result<StepResult> {
        if self.done {
            return Err(DrlError::InvalidState(
                "step() called on a finished episode; call reset() first".to_string(),
            ));
        }
        if action >= NUM_ACTIONS {
            return Err(DrlError::Validation(format!(
                "action {} out of range 0..{}",
                action, NUM_ACTIONS
            )));
        }

        let price = self.price(self.cursor);
        let before = self.net_worth_at(price);

        self.execute(TradeAction::from(action), price);

        self.cursor += 1;
        self.step_count += 1;

        let next_price = self.price(self.cursor);
        let after = self.net_worth_at(next_price);
        let initial = self.settings.initial_capital;
        let reward = ((after - before) / initial) as f32;

        let terminated =
            self.cursor >= self.frame.len() - 1 || after < initial * BANKRUPTCY_RATIO;
        let truncated = !terminated
            && self
                .settings
                .max_episode_steps
                .is_some_and(|max| self.step_count >= max);
        self.done = terminated || truncated;

        Ok(StepResult {
            observation: self.observation(),
            reward,
            terminated,
            truncated,
            info: StepInfo {
                net_worth: after,
                position: self.shares,
                cash: self.cash,
                step: self.step_count,
                num_trades: self.num_trades,
            },
        })
    }
}
